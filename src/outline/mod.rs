//! Structure inference: headings and the generated outline.
//!
//! - [`classifier`]: decides which nodes are headings and at what level
//! - [`anchors`]: document-wide unique anchor allocation
//! - [`toc`]: merges the native outline with classified headings

mod anchors;
mod classifier;
mod toc;

pub use anchors::AnchorRegistry;
pub use classifier::{
    ChapterHeadings, HeadingCandidate, HeadingClassifier, HeadingContext, HeadingMatch,
    HeadingRule, scan_chapter,
};
pub use toc::{AnchorTargets, Outline, TocEntry, build_outline, render_outline};
