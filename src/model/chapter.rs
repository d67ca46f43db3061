//! Chapter documents in reading order.

use crate::config::HeuristicConfig;
use crate::util::is_external;

use super::node::NodeKind;
use super::tree::ContentTree;

/// What part of the book a chapter document plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterKind {
    /// Regular reading content.
    #[default]
    Body,
    /// Cover page.
    Cover,
    /// The book's own table-of-contents page.
    Contents,
}

/// One chapter document of the book.
#[derive(Debug, Clone)]
pub struct ChapterDocument {
    /// Stable identifier derived from the source href.
    pub id: String,
    /// Source href relative to the package root (used to resolve relative references).
    pub href: String,
    /// Position in the reading sequence. Unique across the book.
    pub order: usize,
    pub kind: ChapterKind,
    /// The chapter's content.
    pub tree: ContentTree,
}

impl ChapterDocument {
    pub fn new(id: impl Into<String>, order: usize, tree: ContentTree) -> Self {
        let id = id.into();
        Self {
            href: id.clone(),
            id,
            order,
            kind: ChapterKind::Body,
            tree,
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = href.into();
        self
    }

    pub fn with_kind(mut self, kind: ChapterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Cover and contents pages contribute nothing to the outline.
    pub fn is_excluded_from_outline(&self) -> bool {
        self.kind != ChapterKind::Body
    }

    /// The href without directories, e.g. `Text/ch01.xhtml` -> `ch01.xhtml`.
    pub fn file_name(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or(&self.href)
    }
}

impl ChapterKind {
    /// Classify a chapter from its href and content.
    ///
    /// A document linking to more than `toc_page_link_threshold` other
    /// documents is a contents page; a file named after the cover is a cover.
    pub fn detect(href: &str, tree: &ContentTree, config: &HeuristicConfig) -> ChapterKind {
        let file = href.rsplit('/').next().unwrap_or(href).to_ascii_lowercase();
        let stem = file.split('.').next().unwrap_or(&file);

        let outbound_links = tree
            .iter_dfs()
            .filter(|&id| tree.kind(id) == Some(NodeKind::Link))
            .filter_map(|id| tree.attributes.href(id))
            .filter(|href| is_document_link(href))
            .count();
        if outbound_links > config.toc_page_link_threshold {
            return ChapterKind::Contents;
        }

        if is_cover_name(stem) {
            return ChapterKind::Cover;
        }
        if stem == "toc" || stem == "nav" || stem == "contents" {
            return ChapterKind::Contents;
        }

        ChapterKind::Body
    }
}

/// Whether a file stem names a cover page: `cover`, `cover1`, `Cover_Page`,
/// `front-cover`, but not `discovery` or `recovery_ch3`.
fn is_cover_name(stem: &str) -> bool {
    stem.split(|c: char| !c.is_ascii_alphabetic())
        .any(|word| matches!(word, "cover" | "coverpage" | "frontcover" | "titlecover"))
}

/// Whether an href points at another document of the same book.
fn is_document_link(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && !href.starts_with('#') && !is_external(href)
}
