//! Outline (table of contents) synthesis.
//!
//! The native outline, when the book has one, supplies chapter-level
//! entries; classified headings fill in the structure inside each chapter.
//! Entries are ordered by reading order and by position within their
//! chapter, then nested by level.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::config::ConversionOptions;
use crate::markdown::{RenderContext, slugify};
use crate::model::{ChapterDocument, ContentTree, NodeId, NodeKind, OutlineEntry};
use crate::util::{file_name, split_fragment};

use super::anchors::AnchorRegistry;
use super::classifier::{ChapterHeadings, HeadingCandidate};

/// Anchors to emit before nodes, keyed by node.
pub type AnchorTargets = HashMap<NodeId, Vec<String>>;

/// One entry of the generated outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub anchor: String,
    /// Heading level (1-6) the entry was built from.
    pub level: u8,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, anchor: impl Into<String>, level: u8) -> Self {
        Self {
            title: title.into(),
            anchor: anchor.into(),
            level,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }
}

/// The generated outline plus the anchors its links need.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    pub entries: Vec<TocEntry>,
    /// Heading candidates consumed into the outline.
    pub heading_count: usize,
    targets: HashMap<String, AnchorTargets>,
}

impl Outline {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries at all depths.
    pub fn len(&self) -> usize {
        fn count(entries: &[TocEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.entries)
    }

    /// Anchors that must be emitted in a chapter for the outline links to resolve.
    pub fn targets(&self, chapter_id: &str) -> Option<&AnchorTargets> {
        self.targets.get(chapter_id)
    }
}

/// A native outline entry attached to its chapter.
struct NativeEntry<'a> {
    title: &'a str,
    fragment: Option<&'a str>,
    depth: u8,
}

/// A flat entry waiting to be nested.
struct Placed {
    position: usize,
    is_native: bool,
    entry: TocEntry,
}

/// Build the document outline.
///
/// `chapters` must be in reading order and `headings[i]` must belong to
/// `chapters[i]`. Returns an empty outline when `generate_toc` is off.
pub fn build_outline(
    chapters: &[&ChapterDocument],
    headings: &[ChapterHeadings],
    native: &[OutlineEntry],
    options: &ConversionOptions,
    registry: &mut AnchorRegistry,
) -> Outline {
    let mut outline = Outline::default();
    if !options.generate_toc {
        return outline;
    }

    let mut native_by_chapter: Vec<Vec<NativeEntry>> = chapters.iter().map(|_| Vec::new()).collect();
    attach_native(native, 1, chapters, &mut native_by_chapter);

    let mut emitted = HashSet::new();
    let mut flat = Vec::new();

    for (index, &chapter) in chapters.iter().enumerate() {
        if chapter.is_excluded_from_outline() {
            continue;
        }
        let candidates = headings
            .get(index)
            .map(|h| h.candidates.as_slice())
            .unwrap_or_default();

        let mut pass = ChapterPass {
            chapter,
            candidates,
            registry: &mut *registry,
            emitted: &mut emitted,
            targets: AnchorTargets::new(),
            positions: chapter
                .tree
                .iter_dfs()
                .enumerate()
                .map(|(position, id)| (id, position))
                .collect(),
            consumed: vec![false; candidates.len()],
            chapter_anchor: None,
        };
        let mut entries = pass.run(&native_by_chapter[index]);
        outline.heading_count += pass.consumed.iter().filter(|&&c| c).count();

        if !pass.targets.is_empty() {
            outline.targets.insert(chapter.id.clone(), pass.targets);
        }
        flat.append(&mut entries);
    }

    let mut flat = flat.into_iter().peekable();
    outline.entries = nest(&mut flat, 0);
    outline
}

/// Flatten the native tree depth-first, grouping entries by target chapter.
fn attach_native<'a>(
    entries: &'a [OutlineEntry],
    depth: u8,
    chapters: &[&ChapterDocument],
    by_chapter: &mut [Vec<NativeEntry<'a>>],
) {
    for entry in entries {
        let (path, fragment) = split_fragment(&entry.href);
        match find_chapter(chapters, path) {
            Some(index) => by_chapter[index].push(NativeEntry {
                title: entry.title.trim(),
                fragment,
                depth: depth.min(6),
            }),
            None => debug!("outline entry '{}' points outside the book: {}", entry.title, entry.href),
        }
        attach_native(&entry.children, depth.saturating_add(1), chapters, by_chapter);
    }
}

fn find_chapter(chapters: &[&ChapterDocument], path: &str) -> Option<usize> {
    if path.is_empty() {
        return None;
    }
    chapters
        .iter()
        .position(|c| c.href == path)
        .or_else(|| {
            let name = file_name(path);
            chapters.iter().position(|c| c.file_name() == name)
        })
}

struct ChapterPass<'a> {
    chapter: &'a ChapterDocument,
    candidates: &'a [HeadingCandidate],
    registry: &'a mut AnchorRegistry,
    emitted: &'a mut HashSet<String>,
    targets: AnchorTargets,
    positions: HashMap<NodeId, usize>,
    consumed: Vec<bool>,
    chapter_anchor: Option<String>,
}

impl ChapterPass<'_> {
    fn run(&mut self, natives: &[NativeEntry]) -> Vec<Placed> {
        let candidates = self.candidates;
        let mut placed = Vec::new();

        for native in natives {
            let (anchor, node) = self.native_target(native);
            placed.push(Placed {
                position: self.position(node),
                is_native: true,
                entry: TocEntry::new(native.title, anchor, native.depth.max(1)),
            });
        }

        // Headings repeating a native title are already represented
        for (i, candidate) in candidates.iter().enumerate() {
            if !self.consumed[i] && natives.iter().any(|n| same_title(n.title, &candidate.text)) {
                self.consumed[i] = true;
                self.claim(candidate.source, candidate.anchor.clone());
            }
        }

        let deepest_native = natives.iter().map(|n| n.depth).max();
        let shallowest = candidates
            .iter()
            .zip(&self.consumed)
            .filter(|(_, consumed)| !**consumed)
            .map(|(c, _)| c.level)
            .min()
            .unwrap_or(1);

        for (i, candidate) in candidates.iter().enumerate() {
            if self.consumed[i] {
                continue;
            }
            self.consumed[i] = true;

            let level = match deepest_native {
                Some(depth) => (depth + 1 + (candidate.level - shallowest)).min(6),
                None => candidate.level,
            };
            let anchor = self.claim(candidate.source, candidate.anchor.clone());
            placed.push(Placed {
                position: self.position(candidate.source),
                is_native: false,
                entry: TocEntry::new(candidate.text.clone(), anchor, level),
            });
        }

        placed.sort_by_key(|p| (p.position, !p.is_native));
        placed
    }

    /// Anchor and node for a native entry.
    fn native_target(&mut self, native: &NativeEntry) -> (String, NodeId) {
        let chapter = self.chapter;
        let candidates = self.candidates;

        if let Some(node) = native.fragment.and_then(|f| chapter.tree.find_by_element_id(f)) {
            if let Some(i) = self.candidate_at(node) {
                self.consumed[i] = true;
                let source = candidates[i].source;
                return (self.claim(source, candidates[i].anchor.clone()), source);
            }

            let node = renderable_target(&chapter.tree, node);
            let fragment_slug = slugify(native.fragment.unwrap_or_default());
            let base = self
                .registry
                .register(&join_slug(&slugify(&chapter.id), &fragment_slug));
            return (self.claim(node, base), node);
        }

        if let Some(i) = (0..candidates.len())
            .find(|&i| !self.consumed[i] && same_title(native.title, &candidates[i].text))
        {
            self.consumed[i] = true;
            let source = candidates[i].source;
            return (self.claim(source, candidates[i].anchor.clone()), source);
        }

        let base = match &self.chapter_anchor {
            Some(anchor) => anchor.clone(),
            None => {
                let anchor = self.registry.register(&slugify(&chapter.id));
                self.chapter_anchor = Some(anchor.clone());
                anchor
            }
        };
        (self.claim(NodeId::ROOT, base), NodeId::ROOT)
    }

    /// The unconsumed candidate that is, or contains, `node`.
    fn candidate_at(&self, node: NodeId) -> Option<usize> {
        let tree = &self.chapter.tree;
        self.candidates.iter().enumerate().find_map(|(i, c)| {
            let hit = c.source == node || tree.ancestors(node).any(|a| a == c.source);
            (hit && !self.consumed[i]).then_some(i)
        })
    }

    /// Record `anchor` as emitted before `node`, renaming it if another entry already uses it.
    fn claim(&mut self, node: NodeId, anchor: String) -> String {
        let anchor = if self.emitted.contains(&anchor) {
            self.registry.register(&anchor)
        } else {
            anchor
        };
        self.emitted.insert(anchor.clone());
        self.targets.entry(node).or_default().push(anchor.clone());
        anchor
    }

    fn position(&self, node: NodeId) -> usize {
        self.positions.get(&node).copied().unwrap_or_default()
    }
}

/// The renderer does not walk into tables and code; anchor those as a whole.
fn renderable_target(tree: &ContentTree, node: NodeId) -> NodeId {
    tree.ancestors(node)
        .filter(|&a| {
            matches!(
                tree.kind(a),
                Some(NodeKind::Table | NodeKind::CodeBlock | NodeKind::Code)
            )
        })
        .last()
        .unwrap_or(node)
}

fn join_slug(chapter_slug: &str, slug: &str) -> String {
    match (chapter_slug.is_empty(), slug.is_empty()) {
        (true, _) => slug.to_string(),
        (false, true) => chapter_slug.to_string(),
        (false, false) => format!("{chapter_slug}-{slug}"),
    }
}

fn same_title(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

/// Nest a flat, ordered entry list: each entry becomes a child of the most
/// recent entry with a lower level.
fn nest(flat: &mut std::iter::Peekable<std::vec::IntoIter<Placed>>, parent_level: u8) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    while let Some(placed) = flat.next_if(|p| p.entry.level > parent_level) {
        let mut entry = placed.entry;
        entry.children = nest(flat, entry.level);
        entries.push(entry);
    }
    entries
}

/// Render the outline as a nested Markdown list of anchor links.
pub fn render_outline(entries: &[TocEntry]) -> String {
    let mut tree = ContentTree::new();
    push_entries(&mut tree, NodeId::ROOT, entries);
    RenderContext::new(&tree, "contents")
        .keep_fragment_links()
        .render()
        .content
}

fn push_entries(tree: &mut ContentTree, parent: NodeId, entries: &[TocEntry]) {
    if entries.is_empty() {
        return;
    }
    let list = tree.push_element(parent, NodeKind::UnorderedList);
    for entry in entries {
        let item = tree.push_element(list, NodeKind::ListItem);
        let link = tree.push_element(item, NodeKind::Link);
        tree.attributes.set(link, "href", &format!("#{}", entry.anchor));
        tree.push_text(link, &entry.title);
        push_entries(tree, item, &entry.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;
    use crate::outline::{HeadingClassifier, scan_chapter};

    struct Book {
        chapters: Vec<ChapterDocument>,
    }

    impl Book {
        fn new(pages: &[(&str, &str)]) -> Self {
            let chapters = pages
                .iter()
                .enumerate()
                .map(|(order, (href, html))| {
                    let id = file_name(href).trim_end_matches(".xhtml");
                    ChapterDocument::new(id, order, parse_html(html)).with_href(*href)
                })
                .collect();
            Self { chapters }
        }

        fn outline(&self, native: &[OutlineEntry], options: ConversionOptions) -> Outline {
            let chapters: Vec<&ChapterDocument> = self.chapters.iter().collect();
            let mut registry = AnchorRegistry::new();
            let classifier = HeadingClassifier::default();
            let headings: Vec<_> = chapters
                .iter()
                .map(|c| scan_chapter(c, &classifier, &mut registry))
                .collect();
            build_outline(&chapters, &headings, native, &options, &mut registry)
        }
    }

    fn shape(entries: &[TocEntry]) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(entries: &[TocEntry], depth: usize, out: &mut Vec<String>) {
            for e in entries {
                out.push(format!("{}{} #{}", "  ".repeat(depth), e.title, e.anchor));
                walk(&e.children, depth + 1, out);
            }
        }
        walk(entries, 0, &mut out);
        out
    }

    #[test]
    fn test_disabled_outline_is_empty() {
        let book = Book::new(&[("ch1.xhtml", "<h1>One</h1>")]);
        let outline = book.outline(&[], ConversionOptions::new().with_generate_toc(false));
        assert!(outline.is_empty());
        assert!(outline.targets("ch1").is_none());
    }

    #[test]
    fn test_headings_only() {
        let book = Book::new(&[
            ("ch1.xhtml", "<h1>One</h1><h2>Alpha</h2><h3>Deep</h3><h2>Beta</h2>"),
            ("ch2.xhtml", "<h1>Two</h1>"),
        ]);
        let outline = book.outline(&[], ConversionOptions::new());
        assert_eq!(
            shape(&outline.entries),
            vec![
                "One #ch1-one",
                "  Alpha #ch1-alpha",
                "    Deep #ch1-deep",
                "  Beta #ch1-beta",
                "Two #ch2-two",
            ]
        );
        assert_eq!(outline.heading_count, 5);
        assert_eq!(outline.len(), 5);
    }

    #[test]
    fn test_native_with_nested_headings() {
        let book = Book::new(&[
            ("Text/ch1.xhtml", "<p>Intro text that is not a heading at all, long enough.</p><h2>Part A</h2><p>（一）Detail</p>"),
            ("Text/ch2.xhtml", "<h1>Chapter Two</h1><p>body</p>"),
        ]);
        let native = vec![
            OutlineEntry::new("Chapter One", "Text/ch1.xhtml"),
            OutlineEntry::new("Chapter Two", "Text/ch2.xhtml"),
        ];
        let outline = book.outline(&native, ConversionOptions::new());

        assert_eq!(
            shape(&outline.entries),
            vec![
                "Chapter One #ch1",
                "  Part A #ch1-part-a",
                "    （一）Detail #ch1-一detail",
                "Chapter Two #ch2-chapter-two",
            ]
        );
        // the matching <h1> was merged into the native entry
        assert_eq!(outline.heading_count, 3);

        let targets = outline.targets("ch1").unwrap();
        assert_eq!(targets.get(&NodeId::ROOT), Some(&vec!["ch1".to_string()]));
    }

    #[test]
    fn test_native_fragment_target() {
        let book = Book::new(&[(
            "ch1.xhtml",
            "<p id=\"s1\">First section starts here with plain text.</p><p id=\"s2\">Second.</p>",
        )]);
        let native = vec![
            OutlineEntry::new("One", "ch1.xhtml#s1"),
            OutlineEntry::new("Two", "ch1.xhtml#s2"),
        ];
        let outline = book.outline(&native, ConversionOptions::new());

        assert_eq!(shape(&outline.entries), vec!["One #ch1-s1", "Two #ch1-s2"]);
        let tree = &book.chapters[0].tree;
        let s2 = tree.find_by_element_id("s2").unwrap();
        assert_eq!(
            outline.targets("ch1").unwrap().get(&s2),
            Some(&vec!["ch1-s2".to_string()])
        );
    }

    #[test]
    fn test_fragment_on_heading_reuses_its_anchor() {
        let book = Book::new(&[("ch1.xhtml", "<h2 id=\"x\">Setup</h2>")]);
        let native = vec![OutlineEntry::new("Getting set up", "ch1.xhtml#x")];
        let outline = book.outline(&native, ConversionOptions::new());
        assert_eq!(shape(&outline.entries), vec!["Getting set up #ch1-setup"]);
        assert_eq!(outline.heading_count, 1);
    }

    #[test]
    fn test_duplicate_targets_get_distinct_anchors() {
        let book = Book::new(&[("ch1.xhtml", "<p>text</p>")]);
        let native = vec![
            OutlineEntry::new("Part I", "ch1.xhtml"),
            OutlineEntry::new("Chapter 1", "ch1.xhtml"),
        ];
        let outline = book.outline(&native, ConversionOptions::new());
        assert_eq!(
            shape(&outline.entries),
            vec!["Part I #ch1", "Chapter 1 #ch1-1"]
        );
        assert_eq!(
            outline.targets("ch1").unwrap().get(&NodeId::ROOT),
            Some(&vec!["ch1".to_string(), "ch1-1".to_string()])
        );
    }

    #[test]
    fn test_excluded_chapters_dropped() {
        let mut book = Book::new(&[
            ("cover.xhtml", "<h1>Cover</h1>"),
            ("ch1.xhtml", "<h1>One</h1>"),
        ]);
        book.chapters[0].kind = crate::model::ChapterKind::Cover;
        let native = vec![OutlineEntry::new("Cover", "cover.xhtml")];
        let outline = book.outline(&native, ConversionOptions::new());
        assert_eq!(shape(&outline.entries), vec!["One #ch1-one"]);
    }

    #[test]
    fn test_child_levels_exceed_parent() {
        let book = Book::new(&[("ch1.xhtml", "<h3>c</h3><h1>a</h1><h4>d</h4><h2>b</h2><h6>e</h6>")]);
        let outline = book.outline(&[], ConversionOptions::new());

        fn check(entries: &[TocEntry]) {
            for e in entries {
                assert!(e.children.iter().all(|c| c.level > e.level));
                check(&e.children);
            }
        }
        check(&outline.entries);
        assert_eq!(outline.entries.len(), 2);
    }

    #[test]
    fn test_render_outline() {
        let entries = vec![
            TocEntry::new("One", "ch1-one", 1).with_child(TocEntry::new("A*B", "ch1-a-b", 2)),
            TocEntry::new("Two", "ch2-two", 1),
        ];
        assert_eq!(
            render_outline(&entries),
            "- [One](#ch1-one)\n  - [A\\*B](#ch1-a-b)\n- [Two](#ch2-two)\n"
        );
    }
}
