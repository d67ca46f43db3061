//! Conversion pipeline: one book in, one Markdown document out.
//!
//! ```no_run
//! use epub2md::{ConversionOptions, Pipeline, epub};
//!
//! let input = epub::read_epub("book.epub")?;
//! let result = Pipeline::new(ConversionOptions::default()).write(&input, "book.md")?;
//! println!("{} headings, {} images", result.heading_count, result.image_count);
//! # Ok::<(), epub2md::Error>(())
//! ```
//!
//! Chapters are processed strictly in reading order on the calling thread.
//! Progress is reported and cancellation checked between chapters only.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::assemble::{Assembler, ConversionResult};
use crate::config::{ConversionOptions, HeuristicConfig};
use crate::error::{Error, Result};
use crate::model::{AssetSet, ChapterDocument, Metadata, OutlineEntry};
use crate::outline::{AnchorRegistry, HeadingClassifier, build_outline, scan_chapter};

/// Everything the converter needs to know about one book.
#[derive(Debug, Clone, Default)]
pub struct ConversionInput {
    /// Chapter documents; their `order` fields define the reading order.
    pub chapters: Vec<ChapterDocument>,
    /// The book's own table of contents, if it has one.
    pub outline: Vec<OutlineEntry>,
    pub metadata: Metadata,
    pub assets: AssetSet,
}

impl ConversionInput {
    pub fn new(chapters: Vec<ChapterDocument>, metadata: Metadata) -> Self {
        Self {
            chapters,
            metadata,
            ..Default::default()
        }
    }

    pub fn with_outline(mut self, outline: Vec<OutlineEntry>) -> Self {
        self.outline = outline;
        self
    }

    pub fn with_assets(mut self, assets: AssetSet) -> Self {
        self.assets = assets;
        self
    }
}

/// Progress notification sent after each chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterProgress<'a> {
    /// Number of chapters completed so far (1-based).
    pub completed: usize,
    pub total: usize,
    pub chapter_id: &'a str,
}

/// Receives one notification per completed chapter.
pub trait ProgressObserver {
    fn chapter_completed(&self, progress: &ChapterProgress<'_>);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ChapterProgress<'_>),
{
    fn chapter_completed(&self, progress: &ChapterProgress<'_>) {
        self(progress)
    }
}

/// Cooperative cancellation flag, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The conversion engine.
pub struct Pipeline<'a> {
    options: ConversionOptions,
    classifier: HeadingClassifier,
    observer: Option<&'a dyn ProgressObserver>,
    cancellation: Option<CancellationToken>,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            classifier: HeadingClassifier::default(),
            observer: None,
            cancellation: None,
        }
    }

    /// Replace the heading heuristics' thresholds.
    pub fn with_heuristics(mut self, config: HeuristicConfig) -> Self {
        self.classifier = HeadingClassifier::new(config);
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Convert a book to Markdown in memory.
    pub fn convert(&self, input: &ConversionInput) -> Result<ConversionResult> {
        validate(input)?;
        self.check_cancelled()?;

        let mut chapters: Vec<&ChapterDocument> = input.chapters.iter().collect();
        chapters.sort_by_key(|chapter| chapter.order);
        let total = chapters.len();

        let mut registry = AnchorRegistry::new();
        let headings: Vec<_> = chapters
            .iter()
            .map(|chapter| {
                let found = scan_chapter(chapter, &self.classifier, &mut registry);
                debug!(
                    "chapter {}: {} heading candidates",
                    chapter.id,
                    found.candidates.len()
                );
                found
            })
            .collect();

        let outline = build_outline(
            &chapters,
            &headings,
            &input.outline,
            &self.options,
            &mut registry,
        );
        debug!("outline has {} entries", outline.len());

        let assembler = Assembler::new(&input.metadata, &input.assets, self.options);
        let result = assembler.assemble_with(&chapters, &headings, &outline, |index, chapter| {
            if let Some(observer) = self.observer {
                observer.chapter_completed(&ChapterProgress {
                    completed: index + 1,
                    total,
                    chapter_id: &chapter.id,
                });
            }
            self.check_cancelled()
        })?;

        info!(
            "converted {} chapters: {} headings, {} images, {} warnings",
            total,
            result.heading_count,
            result.image_count,
            result.warnings.len()
        );
        Ok(result)
    }

    /// Convert a book and publish it at `output`.
    ///
    /// The Markdown file only appears once it is complete; a failed or
    /// cancelled run leaves no file behind. With `extract_images`, asset
    /// bytes are written under the output's directory at their output paths.
    pub fn write(&self, input: &ConversionInput, output: impl AsRef<Path>) -> Result<ConversionResult> {
        let output = output.as_ref();
        let result = self.convert(input)?;

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        if self.options.extract_images {
            let written = write_assets(&input.assets, dir)?;
            debug!("wrote {written} assets under {}", dir.display());
        }

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(result.markdown.as_bytes())?;
        temp.flush()?;
        temp.persist(output).map_err(|e| e.error)?;
        info!("wrote {}", output.display());

        Ok(result)
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Write every asset that carries bytes to `dir/<output_path>`.
fn write_assets(assets: &AssetSet, dir: &Path) -> Result<usize> {
    let mut written = 0;
    for asset in assets.iter().filter(|a| !a.data.is_empty()) {
        let path = dir.join(&asset.output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &asset.data)?;
        written += 1;
    }
    Ok(written)
}

/// Reject structurally invalid input before any work is done.
fn validate(input: &ConversionInput) -> Result<()> {
    if input.chapters.is_empty() {
        return Err(Error::load_input("the book has no chapter documents"));
    }

    let mut ids = HashSet::new();
    let mut orders = HashSet::new();
    for chapter in &input.chapters {
        if chapter.id.trim().is_empty() {
            return Err(Error::load_input(format!(
                "chapter at reading position {} has an empty id",
                chapter.order
            )));
        }
        if !ids.insert(chapter.id.as_str()) {
            return Err(Error::load(&chapter.id, "duplicate chapter id"));
        }
        if !orders.insert(chapter.order) {
            return Err(Error::load(
                &chapter.id,
                format!("duplicate reading order {}", chapter.order),
            ));
        }
    }

    let mut output_paths = HashSet::new();
    for asset in input.assets.iter() {
        let path = asset.output_path.as_str();
        if asset.original_ref.is_empty() {
            return Err(Error::load_input(format!(
                "asset '{path}' has an empty original reference"
            )));
        }
        if path.is_empty() {
            return Err(Error::load_input(format!(
                "asset '{}' has an empty output path",
                asset.original_ref
            )));
        }
        if path.starts_with('/') || path.starts_with('\\') || path.split(['/', '\\']).any(|c| c == "..") {
            return Err(Error::load_input(format!(
                "asset output path '{path}' must stay inside the output directory"
            )));
        }
        if !output_paths.insert(path) {
            return Err(Error::load_input(format!(
                "asset output path '{path}' is assigned twice"
            )));
        }
    }

    Ok(())
}
