//! Heading detection over non-semantic markup.
//!
//! Many converted ebooks never use `<h1>`..`<h6>`: chapter and section
//! titles are paragraphs styled bold through a class. The classifier
//! recognises three patterns, tried in priority order:
//!
//! 1. Real heading tags.
//! 2. Short, isolated, bold-looking paragraphs or spans.
//! 3. Chinese parenthesised section markers such as `（一）`.
//!
//! Classification of a node only looks at the node, its subtree, its
//! siblings and the last assigned heading level, so scanning the same tree
//! twice gives the same candidates.

use crate::config::HeuristicConfig;
use crate::error::RenderWarning;
use crate::markdown::slugify;
use crate::model::{ChapterDocument, ContentTree, NodeId, NodeKind};

use super::anchors::AnchorRegistry;

/// Nodes below these kinds are never headings.
const EXCLUDED_ANCESTORS: &[NodeKind] = &[
    NodeKind::Table,
    NodeKind::CodeBlock,
    NodeKind::Code,
    NodeKind::ListItem,
];

/// Level given to emphasised-paragraph headings.
const EMPHASIS_HEADING_LEVEL: u8 = 2;

/// Level assumed before the first real heading of a chapter.
const DEFAULT_PREVIOUS_LEVEL: u8 = 2;

/// A heading found in a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingCandidate {
    /// Heading level, always within `1..=6`.
    pub level: u8,
    /// Normalized (whitespace-collapsed) heading text.
    pub text: String,
    /// Document-unique anchor.
    pub anchor: String,
    /// The node the heading was found on.
    pub source: NodeId,
}

/// Which rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingRule {
    /// `<h1>`..`<h6>`.
    Tag,
    /// Short, isolated, emphasised text.
    Emphasis,
    /// `（一）`-style section marker.
    SectionMarker,
}

impl HeadingRule {
    /// Rules 2 and 3 guess; rule 1 reads the markup.
    pub fn is_heuristic(self) -> bool {
        self != HeadingRule::Tag
    }
}

/// Result of classifying one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub level: u8,
    pub text: String,
    pub rule: HeadingRule,
}

/// Local context for one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadingContext {
    /// The node has no meaningful inline siblings in its containing block.
    pub isolated: bool,
    /// Level of the last heading assigned by rules 1 or 2 in this chapter.
    pub previous_level: Option<u8>,
    /// Heuristic headings already found in this chapter.
    pub chapter_heading_count: usize,
}

impl HeadingContext {
    /// Context for `id` within `tree`.
    pub fn for_node(tree: &ContentTree, id: NodeId) -> Self {
        Self {
            isolated: is_isolated(tree, id),
            ..Self::default()
        }
    }
}

/// Stateless heading predicate parameterised by [`HeuristicConfig`].
#[derive(Debug, Clone, Default)]
pub struct HeadingClassifier {
    config: HeuristicConfig,
}

impl HeadingClassifier {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// Decide whether `id` is a heading and at what level.
    pub fn classify(
        &self,
        tree: &ContentTree,
        id: NodeId,
        context: &HeadingContext,
    ) -> Option<HeadingMatch> {
        let kind = tree.kind(id)?;
        if EXCLUDED_ANCESTORS.contains(&kind) || tree.has_ancestor_kind(id, EXCLUDED_ANCESTORS) {
            return None;
        }

        if let NodeKind::Heading(level) = kind {
            let text = tree.collect_text(id);
            return (!text.is_empty()).then(|| HeadingMatch {
                level: level.clamp(1, 6),
                text,
                rule: HeadingRule::Tag,
            });
        }

        if !matches!(kind, NodeKind::Paragraph | NodeKind::Span)
            || !context.isolated
            || context.chapter_heading_count >= self.config.max_heuristic_headings
        {
            return None;
        }

        let text = tree.collect_text(id);
        if text.is_empty() || text.chars().count() >= self.config.max_title_chars {
            return None;
        }

        if self.has_emphasis_signal(tree, id)
            && !looks_like_toc_entry(&text, &tree.collect_text_verbatim(id))
            && !self.config.is_excluded_title(&text)
            && !starts_with_date(&text)
        {
            return Some(HeadingMatch {
                level: EMPHASIS_HEADING_LEVEL,
                text,
                rule: HeadingRule::Emphasis,
            });
        }

        if is_section_marker(&text) {
            let previous = context.previous_level.unwrap_or(DEFAULT_PREVIOUS_LEVEL);
            return Some(HeadingMatch {
                level: (previous + 1).min(6),
                text,
                rule: HeadingRule::SectionMarker,
            });
        }

        None
    }

    /// Bold styling, a heading-like class, or every piece of text inside bold markup.
    fn has_emphasis_signal(&self, tree: &ContentTree, id: NodeId) -> bool {
        if self.is_styled_as_heading(tree, id) {
            return true;
        }

        let mut saw_text = false;
        for node in tree.descendants(id) {
            if tree.kind(node) != Some(NodeKind::Text) || tree.node_text(node).trim().is_empty() {
                continue;
            }
            saw_text = true;
            let emphasised = tree
                .ancestors(node)
                .take_while(|&ancestor| ancestor != id)
                .any(|ancestor| {
                    tree.kind(ancestor) == Some(NodeKind::Strong)
                        || self.is_styled_as_heading(tree, ancestor)
                });
            if !emphasised {
                return false;
            }
        }
        saw_text
    }

    fn is_styled_as_heading(&self, tree: &ContentTree, id: NodeId) -> bool {
        if tree
            .attributes
            .class(id)
            .is_some_and(|class| self.config.is_heading_class(class))
        {
            return true;
        }
        tree.attributes.style(id).is_some_and(is_bold_style)
    }
}

/// Headings found in one chapter.
#[derive(Debug, Clone, Default)]
pub struct ChapterHeadings {
    pub candidates: Vec<HeadingCandidate>,
    pub warnings: Vec<RenderWarning>,
}

/// Run the classifier over a chapter in document order.
///
/// Matched nodes are not descended into, nor are tables, code and list
/// items. Chapters excluded from the outline yield nothing.
pub fn scan_chapter(
    chapter: &ChapterDocument,
    classifier: &HeadingClassifier,
    registry: &mut AnchorRegistry,
) -> ChapterHeadings {
    let mut headings = ChapterHeadings::default();
    if chapter.is_excluded_from_outline() {
        return headings;
    }

    let mut scan = Scan {
        tree: &chapter.tree,
        chapter_slug: slugify(&chapter.id),
        classifier,
        registry,
        previous_level: None,
        heuristic_count: 0,
        over_limit: false,
        headings: &mut headings,
    };
    scan.visit_children(NodeId::ROOT);
    let (over_limit, heuristic_count) = (scan.over_limit, scan.heuristic_count);

    if over_limit {
        headings.warnings.push(RenderWarning::AmbiguousHeadings {
            chapter: chapter.id.clone(),
            count: heuristic_count,
        });
    }
    headings
}

struct Scan<'a> {
    tree: &'a ContentTree,
    chapter_slug: String,
    classifier: &'a HeadingClassifier,
    registry: &'a mut AnchorRegistry,
    previous_level: Option<u8>,
    heuristic_count: usize,
    over_limit: bool,
    headings: &'a mut ChapterHeadings,
}

impl Scan<'_> {
    fn visit_children(&mut self, id: NodeId) {
        for child in self.tree.children(id) {
            self.visit(child);
        }
    }

    fn visit(&mut self, id: NodeId) {
        let Some(kind) = self.tree.kind(id) else {
            return;
        };
        if EXCLUDED_ANCESTORS.contains(&kind) {
            return;
        }

        if matches!(
            kind,
            NodeKind::Heading(_) | NodeKind::Paragraph | NodeKind::Span
        ) {
            let context = HeadingContext {
                isolated: is_isolated(self.tree, id),
                previous_level: self.previous_level,
                chapter_heading_count: self.heuristic_count,
            };

            if let Some(found) = self.classifier.classify(self.tree, id, &context) {
                self.accept(id, found);
                return;
            }

            if context.chapter_heading_count >= self.classifier.config().max_heuristic_headings {
                // Would it have matched without the cap?
                let uncapped = HeadingContext {
                    chapter_heading_count: 0,
                    ..context
                };
                if self.classifier.classify(self.tree, id, &uncapped).is_some() {
                    self.over_limit = true;
                }
            }
        }

        self.visit_children(id);
    }

    fn accept(&mut self, id: NodeId, found: HeadingMatch) {
        if found.rule.is_heuristic() {
            self.heuristic_count += 1;
        }
        if found.rule != HeadingRule::SectionMarker {
            self.previous_level = Some(found.level);
        }

        let text_slug = slugify(&found.text);
        let base = match (self.chapter_slug.is_empty(), text_slug.is_empty()) {
            (_, true) => format!("{}-n{}", self.chapter_slug, id.0),
            (true, false) => text_slug,
            (false, false) => format!("{}-{}", self.chapter_slug, text_slug),
        };
        let anchor = self.registry.register(&base);

        self.headings.candidates.push(HeadingCandidate {
            level: found.level,
            text: found.text,
            anchor,
            source: id,
        });
    }
}

/// No sibling carries inline content next to this node.
fn is_isolated(tree: &ContentTree, id: NodeId) -> bool {
    let Some(parent) = tree.node(id).and_then(|n| n.parent) else {
        return true;
    };

    tree.children(parent).filter(|&s| s != id).all(|sibling| {
        match tree.kind(sibling) {
            Some(NodeKind::Text) => tree.node_text(sibling).trim().is_empty(),
            Some(NodeKind::Image) => false,
            Some(NodeKind::Break) | None => true,
            Some(kind) if kind.is_block() => true,
            Some(_) => tree.collect_text(sibling).is_empty(),
        }
    })
}

fn is_bold_style(style: &str) -> bool {
    let style: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    ["font-weight:bold", "font-weight:bolder", "font-weight:700", "font-weight:800", "font-weight:900"]
        .iter()
        .any(|decl| style.contains(decl))
}

/// Trailing page number after a dot leader, a tab or a wide gap.
fn looks_like_toc_entry(text: &str, raw: &str) -> bool {
    let trimmed = text.trim_end();
    let before_number = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    if before_number.len() == trimmed.len() {
        return false;
    }
    if before_number.trim().is_empty() {
        return true;
    }

    let without_gap = before_number.trim_end();
    let leader: Vec<char> = without_gap
        .chars()
        .rev()
        .take_while(|c| matches!(c, '.' | '·' | '…' | '．' | '⋯'))
        .collect();
    if leader.len() >= 2 || leader.iter().any(|c| matches!(c, '…' | '⋯')) {
        return true;
    }

    let raw_before = raw
        .trim_end()
        .trim_end_matches(|c: char| c.is_ascii_digit());
    raw_before.ends_with('\t') || raw_before.ends_with("  ")
}

/// `2019年...`
fn starts_with_date(text: &str) -> bool {
    let mut chars = text.chars();
    chars.by_ref().take(4).filter(char::is_ascii_digit).count() == 4 && chars.next() == Some('年')
}

/// `（一）`, `(12)`, `（三）标题`
fn is_section_marker(text: &str) -> bool {
    let mut chars = text.chars();
    if !matches!(chars.next(), Some('（' | '(')) {
        return false;
    }

    let mut numerals = 0;
    for c in chars {
        match c {
            '）' | ')' => return numerals > 0,
            c if c.is_ascii_digit() || "一二三四五六七八九十百零〇".contains(c) => numerals += 1,
            _ => return false,
        }
    }
    false
}
