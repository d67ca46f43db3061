//! # epub2md
//!
//! Converts EPUB ebooks into a single, well-formed Markdown document.
//!
//! ## Features
//!
//! - Reads EPUB 2/3 packages (spine, NCX or nav outline, metadata, images)
//! - Renders chapter content to CommonMark with GFM tables
//! - Infers headings in books that style titles instead of tagging them
//! - Generates a linked table of contents from the native outline plus
//!   discovered headings
//! - Extracts images next to the Markdown file and rewrites their references
//!
//! ## Quick Start
//!
//! ```no_run
//! use epub2md::{ConversionOptions, Pipeline, read_epub};
//!
//! let input = read_epub("input.epub")?;
//! let result = Pipeline::new(ConversionOptions::default()).write(&input, "output.md")?;
//! for warning in &result.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! # Ok::<(), epub2md::Error>(())
//! ```
//!
//! ## Converting Without an EPUB
//!
//! The converter only needs chapter trees in reading order, so any source
//! that can produce HTML can feed it:
//!
//! ```
//! use epub2md::{ChapterDocument, ConversionInput, ConversionOptions, Metadata, Pipeline};
//! use epub2md::html::parse_html;
//!
//! let chapters = vec![
//!     ChapterDocument::new("ch1", 0, parse_html("<h2>Intro</h2><p>Hello <b>world</b>.</p>")),
//! ];
//! let input = ConversionInput::new(chapters, Metadata::new("My Book"));
//! let options = ConversionOptions::default().with_generate_toc(false);
//! let result = Pipeline::new(options).convert(&input)?;
//! assert!(result.markdown.contains("## Intro\n\nHello **world**."));
//! # Ok::<(), epub2md::Error>(())
//! ```

pub mod assemble;
pub mod config;
pub mod epub;
pub mod error;
pub mod html;
pub mod markdown;
pub mod model;
pub mod outline;
pub mod pipeline;
pub(crate) mod util;

pub use assemble::{Assembler, ConversionResult};
pub use config::{ConversionOptions, HeuristicConfig, IMAGE_DIR};
pub use epub::{read_epub, read_epub_from_reader};
pub use error::{Error, RenderWarning, Result};
pub use model::{
    AssetSet, ChapterDocument, ChapterKind, ContentTree, MediaAsset, Metadata, NodeId, NodeKind,
    OutlineEntry,
};
pub use outline::{HeadingClassifier, Outline, TocEntry};
pub use pipeline::{CancellationToken, ChapterProgress, ConversionInput, Pipeline, ProgressObserver};
