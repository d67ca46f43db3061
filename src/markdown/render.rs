//! Content tree → Markdown rendering.
//!
//! Pure rendering logic: no I/O is performed here. A [`RenderContext`] is
//! created per chapter, walks the tree depth-first and accumulates text;
//! its traversal state is dropped with it, so nothing leaks from one
//! chapter into the next.

use std::collections::{BTreeSet, HashMap};

use crate::error::RenderWarning;
use crate::model::{AssetSet, ContentTree, NodeId, NodeKind};
use crate::outline::{AnchorTargets, HeadingCandidate};
use crate::util::file_name;

use super::escape::{
    calculate_fence_length, calculate_inline_code_ticks, escape_line_start, escape_markdown,
    escape_table_cell,
};

/// Result of rendering a chapter to markdown.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    /// The rendered markdown content, ending in a newline when non-empty.
    pub content: String,
    /// Recoverable problems, in the order they were found.
    pub warnings: Vec<RenderWarning>,
    /// Output paths of the assets referenced by the content.
    pub images: BTreeSet<String>,
}

/// Tracks list context for numbering.
#[derive(Debug, Clone)]
struct ListContext {
    is_ordered: bool,
    /// Number of items emitted so far.
    counter: usize,
    /// Whether this is a tight list (no blank lines between items).
    is_tight: bool,
}

/// Per-traversal nesting state.
#[derive(Debug, Default)]
struct RenderState {
    list_stack: Vec<ListContext>,
    blockquote_depth: usize,
    in_preformatted: bool,
    in_table_cell: bool,
}

/// Inline content rendered out of line, before its wrapper is known to be non-empty.
struct Fragment {
    text: String,
    leading_space: bool,
    trailing_space: bool,
}

/// Context for rendering one chapter (pure string accumulation, no I/O).
pub struct RenderContext<'a> {
    tree: &'a ContentTree,
    chapter_id: &'a str,
    chapter_href: &'a str,
    headings: HashMap<NodeId, &'a HeadingCandidate>,
    targets: Option<&'a AnchorTargets>,
    assets: Option<&'a AssetSet>,
    keep_fragment_links: bool,
    state: RenderState,
    // Accumulated output
    output: String,
    warnings: Vec<RenderWarning>,
    images: BTreeSet<String>,
    // Line formatting state
    line_prefix: String,
    at_line_start: bool,
    has_line_content: bool,
    pending_newline: bool,
    pending_space: bool,
    dropped_leading_space: bool,
    last_block_kind: Option<NodeKind>,
    /// Nesting depth of out-of-line fragment rendering.
    fragment_depth: usize,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context for a chapter's tree.
    pub fn new(tree: &'a ContentTree, chapter_id: &'a str) -> Self {
        Self {
            tree,
            chapter_id,
            chapter_href: chapter_id,
            headings: HashMap::new(),
            targets: None,
            assets: None,
            keep_fragment_links: false,
            state: RenderState::default(),
            output: String::new(),
            warnings: Vec::new(),
            images: BTreeSet::new(),
            line_prefix: String::new(),
            at_line_start: true,
            has_line_content: false,
            pending_newline: false,
            pending_space: false,
            dropped_leading_space: false,
            last_block_kind: None,
            fragment_depth: 0,
        }
    }

    /// Href the chapter was loaded from; relative image sources resolve against it.
    pub fn with_href(mut self, href: &'a str) -> Self {
        self.chapter_href = href;
        self
    }

    /// Classified headings: their nodes render as Markdown headings.
    pub fn with_headings(mut self, headings: &'a [HeadingCandidate]) -> Self {
        self.headings = headings.iter().map(|h| (h.source, h)).collect();
        self
    }

    /// Nodes that need explicit `<a id>` anchors emitted before them.
    pub fn with_targets(mut self, targets: &'a AnchorTargets) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Rewrite image references to these assets' output paths.
    pub fn with_assets(mut self, assets: &'a AssetSet) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Keep `#fragment` links instead of unwrapping them to plain text.
    pub fn keep_fragment_links(mut self) -> Self {
        self.keep_fragment_links = true;
        self
    }

    /// Render the chapter, consuming the context and returning the result.
    pub fn render(mut self) -> RenderResult {
        self.write_anchor_if_targeted(NodeId::ROOT);
        self.walk_children(NodeId::ROOT);

        if !self.at_line_start {
            self.output.push('\n');
        }

        RenderResult {
            content: self.output,
            warnings: self.warnings,
            images: self.images,
        }
    }

    /// Check if a list is "tight" (items are single paragraphs, no blank lines between).
    fn is_tight_list(&self, list_id: NodeId) -> bool {
        for item_id in self.tree.children(list_id) {
            if self.tree.kind(item_id) != Some(NodeKind::ListItem) {
                continue;
            }

            let mut block_count = 0;
            for child_id in self.tree.children(item_id) {
                match self.tree.kind(child_id) {
                    Some(NodeKind::Paragraph) => block_count += 1,
                    Some(
                        NodeKind::BlockQuote
                        | NodeKind::CodeBlock
                        | NodeKind::Table
                        | NodeKind::Heading(_),
                    ) => return false,
                    _ => {}
                }
            }

            if block_count > 1 {
                return false;
            }
        }
        true
    }

    /// Whether an unknown element sits where blocks flow, rather than inside
    /// a paragraph, heading or inline wrapper.
    fn is_flow_context(&self, id: NodeId) -> bool {
        self.tree
            .ancestors(id)
            .find_map(|a| match self.tree.kind(a) {
                Some(NodeKind::Generic) => None,
                Some(kind) => Some(matches!(
                    kind,
                    NodeKind::Root | NodeKind::BlockQuote | NodeKind::ListItem
                )),
                None => Some(true),
            })
            .unwrap_or(true)
    }

    // ------------------------------------------------------------------
    // Line management
    // ------------------------------------------------------------------

    /// Write the line prefix if we are at the start of a line.
    fn ensure_line_started(&mut self) {
        if self.at_line_start {
            self.output.push_str(&self.line_prefix);
            self.at_line_start = false;
        }
    }

    fn write_newline(&mut self) {
        self.output.push('\n');
        self.at_line_start = true;
        self.has_line_content = false;
        self.pending_space = false;
    }

    /// Blank line that keeps blockquote markers (`>`) but no indentation.
    fn write_blank_line(&mut self) {
        self.output.push_str(self.line_prefix.trim_end());
        self.output.push('\n');
        self.at_line_start = true;
        self.has_line_content = false;
        self.pending_space = false;
    }

    /// Start a new block element.
    fn start_block(&mut self) {
        if !self.at_line_start && self.has_line_content {
            self.write_newline();
        }
        if self.pending_newline {
            if !self.output.is_empty() {
                self.write_blank_line();
            }
            self.pending_newline = false;
        }
        self.pending_space = false;
    }

    /// End a block element.
    fn end_block(&mut self, kind: NodeKind) {
        self.pending_newline = true;
        self.pending_space = false;
        self.last_block_kind = Some(kind);
    }

    /// Write inline text at the current position.
    fn write_inline(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.pending_newline {
            self.start_block();
        }
        self.ensure_line_started();
        if self.pending_space {
            if self.has_line_content {
                self.output.push(' ');
            } else {
                self.dropped_leading_space = true;
            }
        }
        self.pending_space = false;
        self.output.push_str(text);
        self.has_line_content = true;
        self.last_block_kind = None;
    }

    /// Whether inline text written now would begin a Markdown line.
    fn opens_line(&self) -> bool {
        self.fragment_depth == 0 && (self.pending_newline || !self.has_line_content)
    }

    /// Write a hard line break (backslash in markdown).
    fn write_hard_break(&mut self) {
        if self.has_line_content {
            self.output.push('\\');
            self.write_newline();
        }
    }

    /// Check if we need a separator between adjacent lists.
    fn needs_list_separator(&self, kind: NodeKind) -> bool {
        self.state.list_stack.is_empty()
            && matches!(
                (self.last_block_kind, kind),
                (Some(NodeKind::OrderedList), NodeKind::OrderedList)
                    | (Some(NodeKind::UnorderedList), NodeKind::UnorderedList)
            )
    }

    /// Write a list separator comment (for adjacent lists).
    fn write_list_separator(&mut self) {
        self.start_block();
        self.ensure_line_started();
        self.output.push_str("<!-- -->");
        self.has_line_content = true;
        self.pending_newline = true;
    }

    /// Write an HTML anchor if this node is the target of an outline entry.
    fn write_anchor_if_targeted(&mut self, id: NodeId) {
        let Some(anchors) = self
            .targets
            .and_then(|targets| targets.get(&id))
            .filter(|anchors| !anchors.is_empty())
        else {
            return;
        };
        let html: String = anchors
            .iter()
            .map(|anchor| format!("<a id=\"{anchor}\"></a>"))
            .collect();

        let is_block = match self.tree.kind(id) {
            Some(NodeKind::Generic) => self.is_flow_context(id),
            kind => kind.is_some_and(NodeKind::is_block),
        } || self.headings.contains_key(&id);
        if is_block {
            self.start_block();
            self.ensure_line_started();
            self.output.push_str(&html);
            self.has_line_content = true;
            self.pending_newline = true;
        } else {
            self.write_inline(&html);
        }
    }

    // ------------------------------------------------------------------
    // Tree walk
    // ------------------------------------------------------------------

    fn walk_children(&mut self, id: NodeId) {
        for child_id in self.tree.children(id) {
            self.walk_node(child_id);
        }
    }

    fn walk_node(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(node) = tree.node(id) else {
            return;
        };
        let kind = node.kind;

        if self.state.in_preformatted {
            match kind {
                NodeKind::Text => self.output.push_str(tree.text(node.text)),
                NodeKind::Break => self.output.push('\n'),
                _ => self.walk_children(id),
            }
            return;
        }

        self.write_anchor_if_targeted(id);

        if let Some(heading) = self.headings.get(&id).copied() {
            self.write_heading(heading.level, &heading.text);
            return;
        }

        match kind {
            NodeKind::Text => self.write_text(tree.text(node.text)),

            NodeKind::Heading(level) => {
                let text = tree.collect_text(id);
                if text.is_empty() {
                    // e.g. a heading that only wraps an image
                    self.start_block();
                    self.walk_children(id);
                    self.end_block(kind);
                } else {
                    self.write_heading(level.clamp(1, 6), &text);
                }
            }

            NodeKind::Paragraph => {
                self.start_block();
                self.walk_children(id);
                self.end_block(kind);
            }

            NodeKind::Strong => self.write_wrapped(id, "**", "**", "<strong>"),
            NodeKind::Emphasis => self.write_wrapped(id, "*", "*", "<em>"),
            NodeKind::Strike => self.write_wrapped(id, "~~", "~~", "<del>"),
            NodeKind::Underline => self.write_wrapped(id, "<u>", "</u>", "<u>"),
            NodeKind::Superscript => self.write_wrapped(id, "^", "^", "<sup>"),
            NodeKind::Subscript => self.write_wrapped(id, "~", "~", "<sub>"),

            NodeKind::Link => self.write_link(id),
            NodeKind::Image => self.write_image(id),

            NodeKind::UnorderedList | NodeKind::OrderedList => self.write_list(id, kind),
            NodeKind::ListItem => self.write_list_item(id),

            NodeKind::BlockQuote => {
                self.start_block();
                self.state.blockquote_depth += 1;
                if !self.at_line_start {
                    // Quote opening right after a list bullet
                    self.output.push_str("> ");
                }
                let old_prefix = self.line_prefix.clone();
                self.line_prefix.push_str("> ");

                self.walk_children(id);

                self.line_prefix = old_prefix;
                self.state.blockquote_depth -= 1;
                self.end_block(kind);
            }

            NodeKind::CodeBlock => self.write_code_block(id),

            NodeKind::Code => {
                let content = tree.collect_text_verbatim(id).replace('\n', " ");
                if content.trim().is_empty() {
                    return;
                }
                let ticks = "`".repeat(calculate_inline_code_ticks(&content));
                let spacer = if content.starts_with('`') || content.ends_with('`') {
                    " "
                } else {
                    ""
                };
                self.write_inline(&format!("{ticks}{spacer}{content}{spacer}{ticks}"));
            }

            NodeKind::Table if !self.state.in_table_cell => self.write_table(id),

            NodeKind::Table | NodeKind::TableRow | NodeKind::TableCell => {
                // Stray cells, or a table nested in a cell: keep the text.
                self.pending_space = true;
                self.walk_children(id);
                self.pending_space = true;
            }

            NodeKind::Rule => {
                self.start_block();
                self.ensure_line_started();
                self.output.push_str("---");
                self.has_line_content = true;
                self.end_block(kind);
            }

            NodeKind::Break => self.write_hard_break(),

            NodeKind::Generic if self.is_flow_context(id) => {
                // Transparent, but keeps its inline content off the neighbours' lines.
                if self.has_line_content {
                    self.pending_newline = true;
                }
                self.walk_children(id);
                if self.has_line_content {
                    self.pending_newline = true;
                }
            }

            NodeKind::Generic | NodeKind::Span | NodeKind::Root => self.walk_children(id),
        }
    }

    fn write_text(&mut self, text: &str) {
        let has_leading = text.starts_with(char::is_whitespace);
        let has_trailing = text.ends_with(char::is_whitespace);

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            if !text.is_empty() {
                self.pending_space = true;
            }
            return;
        }

        if has_leading {
            self.pending_space = true;
        }
        let escaped = escape_markdown(&words.join(" "));
        if self.opens_line() {
            self.write_inline(&escape_line_start(&escaped));
        } else {
            self.write_inline(&escaped);
        }
        if has_trailing {
            self.pending_space = true;
        }
    }

    fn write_heading(&mut self, level: u8, text: &str) {
        if text.is_empty() {
            return;
        }
        self.start_block();
        self.ensure_line_started();
        self.output.push_str(&"#".repeat(level as usize));
        self.output.push(' ');
        self.output.push_str(&escape_markdown(text));
        self.has_line_content = true;
        self.end_block(NodeKind::Heading(level));
    }

    /// Render a node's children out of line.
    fn render_fragment(&mut self, id: NodeId) -> Fragment {
        let saved_output = std::mem::take(&mut self.output);
        let saved = (
            self.at_line_start,
            self.has_line_content,
            self.pending_newline,
            self.pending_space,
            self.dropped_leading_space,
        );
        self.at_line_start = false;
        self.has_line_content = false;
        self.pending_newline = false;
        self.pending_space = false;
        self.dropped_leading_space = false;

        self.fragment_depth += 1;
        self.walk_children(id);
        self.fragment_depth -= 1;

        let fragment = Fragment {
            text: std::mem::replace(&mut self.output, saved_output),
            leading_space: self.dropped_leading_space,
            trailing_space: self.pending_space,
        };
        (
            self.at_line_start,
            self.has_line_content,
            self.pending_newline,
            self.pending_space,
            self.dropped_leading_space,
        ) = saved;
        fragment
    }

    /// Emit a fragment verbatim, keeping the whitespace around it.
    fn write_fragment(&mut self, fragment: &Fragment, open: &str, close: &str) {
        if fragment.leading_space {
            self.pending_space = true;
        }
        if !fragment.text.is_empty() {
            let text = if open.is_empty() && self.opens_line() {
                escape_line_start(&fragment.text)
            } else {
                fragment.text.clone()
            };
            self.write_inline(&format!("{open}{text}{close}"));
        }
        if fragment.trailing_space {
            self.pending_space = true;
        }
    }

    fn write_wrapped(&mut self, id: NodeId, open: &str, close: &str, element: &str) {
        let fragment = self.render_fragment(id);
        if fragment.text.contains("\n\n") {
            // Block content inside an inline wrapper cannot carry the markup.
            self.warn_nested(format!("block content inside {element}"));
            self.write_fragment(&fragment, "", "");
        } else {
            self.write_fragment(&fragment, open, close);
        }
    }

    fn write_link(&mut self, id: NodeId) {
        let tree = self.tree;
        let href = tree.attributes.href(id).unwrap_or("").trim();
        let fragment = self.render_fragment(id);

        let unwrap = href.is_empty() || (href.starts_with('#') && !self.keep_fragment_links);
        if unwrap || fragment.text.contains('\n') {
            self.write_fragment(&fragment, "", "");
        } else {
            let close = format!("]({})", encode_destination(href));
            self.write_fragment(&fragment, "[", &close);
        }
    }

    fn write_image(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(src) = tree
            .attributes
            .src(id)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return;
        };

        let (path, default_alt) = match self.assets {
            Some(assets) => match assets.resolve(src, self.chapter_href) {
                Some(asset) => {
                    self.images.insert(asset.output_path.clone());
                    (asset.output_path.clone(), asset.file_name().to_string())
                }
                None => {
                    self.warnings.push(RenderWarning::MissingAsset {
                        chapter: self.chapter_id.to_string(),
                        reference: src.to_string(),
                    });
                    (src.to_string(), file_name(src).to_string())
                }
            },
            None => (src.to_string(), file_name(src).to_string()),
        };

        let alt = tree
            .attributes
            .alt(id)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or(default_alt);

        self.write_inline(&format!(
            "![{}]({})",
            escape_markdown(&alt),
            encode_destination(&path)
        ));
    }

    fn write_list(&mut self, id: NodeId, kind: NodeKind) {
        let nested = !self.state.list_stack.is_empty();
        if nested {
            if !self.at_line_start && self.has_line_content {
                self.write_newline();
            }
        } else {
            if self.needs_list_separator(kind) {
                self.write_list_separator();
            }
            self.start_block();
        }

        let is_tight = self.is_tight_list(id);
        self.state.list_stack.push(ListContext {
            is_ordered: kind == NodeKind::OrderedList,
            counter: 0,
            is_tight,
        });
        self.walk_children(id);
        self.state.list_stack.pop();

        if nested {
            self.pending_newline = false;
        } else {
            self.end_block(kind);
        }
    }

    fn write_list_item(&mut self, id: NodeId) {
        let (is_tight, counter) = self
            .state
            .list_stack
            .last()
            .map(|ctx| (ctx.is_tight, ctx.counter))
            .unwrap_or((true, 0));

        if !self.at_line_start {
            self.write_newline();
        }
        if !is_tight && counter > 0 {
            self.write_blank_line();
        }
        self.pending_newline = false;
        self.pending_space = false;

        self.ensure_line_started();
        let bullet = match self.state.list_stack.last_mut() {
            Some(ctx) => {
                ctx.counter += 1;
                if ctx.is_ordered {
                    format!("{}. ", ctx.counter)
                } else {
                    "- ".to_string()
                }
            }
            None => "- ".to_string(),
        };
        self.output.push_str(&bullet);

        // Continuation lines align with the item text
        let old_prefix = self.line_prefix.clone();
        self.line_prefix.push_str(&" ".repeat(bullet.len()));

        self.walk_children(id);

        self.line_prefix = old_prefix;
        self.pending_newline = false;
        self.pending_space = false;
    }

    fn write_code_block(&mut self, id: NodeId) {
        self.start_block();

        let saved_output = std::mem::take(&mut self.output);
        self.state.in_preformatted = true;
        self.walk_children(id);
        self.state.in_preformatted = false;
        let raw = std::mem::replace(&mut self.output, saved_output);

        let content = raw.replace("\r\n", "\n");
        let content = content.trim_end_matches('\n');
        let language = self.code_language(id).unwrap_or_default();
        let fence = "`".repeat(calculate_fence_length(content, '`'));

        self.ensure_line_started();
        self.output.push_str(&fence);
        self.output.push_str(&language);
        self.write_newline();

        if !content.is_empty() {
            for line in content.split('\n') {
                self.ensure_line_started();
                self.output.push_str(line);
                self.write_newline();
            }
        }

        self.ensure_line_started();
        self.output.push_str(&fence);
        self.has_line_content = true;
        self.end_block(NodeKind::CodeBlock);
    }

    /// Language from a `language-x` / `lang-x` class on the block or its `<code>`.
    fn code_language(&self, id: NodeId) -> Option<String> {
        std::iter::once(id)
            .chain(self.tree.children(id))
            .filter_map(|node| self.tree.attributes.class(node))
            .flat_map(str::split_ascii_whitespace)
            .find_map(|class| {
                class
                    .strip_prefix("language-")
                    .or_else(|| class.strip_prefix("lang-"))
                    .filter(|lang| !lang.is_empty())
                    .map(str::to_string)
            })
    }

    fn write_table(&mut self, id: NodeId) {
        let rows = self.collect_table_rows(id);
        let Some(width) = rows.first().map(Vec::len).filter(|&w| w > 0) else {
            return;
        };

        self.start_block();

        let format_row = |cells: &[String]| -> String {
            let mut padded: Vec<&str> = cells.iter().take(width).map(String::as_str).collect();
            padded.resize(width, "");
            format!("| {} |", padded.join(" | "))
        };

        let mut lines = vec![format_row(&rows[0])];
        lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
        lines.extend(rows[1..].iter().map(|row| format_row(row)));

        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                self.write_newline();
            }
            self.ensure_line_started();
            self.output.push_str(line);
        }
        self.has_line_content = true;
        self.end_block(NodeKind::Table);
    }

    /// Rows of a table (skipping rows of nested tables), as rendered cell text.
    fn collect_table_rows(&mut self, table: NodeId) -> Vec<Vec<String>> {
        let tree = self.tree;
        let nearest = |id: NodeId, kind: NodeKind| {
            tree.ancestors(id).find(|&a| tree.kind(a) == Some(kind))
        };

        let mut has_nested_table = false;
        let mut rows = Vec::new();
        for row in tree.descendants(table).skip(1) {
            match tree.kind(row) {
                Some(NodeKind::Table) => has_nested_table = true,
                Some(NodeKind::TableRow) if nearest(row, NodeKind::Table) == Some(table) => {
                    let cell_ids: Vec<NodeId> = tree
                        .descendants(row)
                        .skip(1)
                        .filter(|&cell| {
                            tree.kind(cell) == Some(NodeKind::TableCell)
                                && nearest(cell, NodeKind::TableRow) == Some(row)
                        })
                        .collect();
                    let cells: Vec<String> =
                        cell_ids.into_iter().map(|cell| self.render_cell(cell)).collect();
                    if !cells.is_empty() {
                        rows.push(cells);
                    }
                }
                _ => {}
            }
        }

        if has_nested_table {
            self.warn_nested("nested table".to_string());
        }
        rows
    }

    /// Render a cell's inline content onto one line.
    fn render_cell(&mut self, cell: NodeId) -> String {
        let saved_prefix = std::mem::take(&mut self.line_prefix);
        let saved_in_cell = std::mem::replace(&mut self.state.in_table_cell, true);
        let fragment = self.render_fragment(cell);
        self.state.in_table_cell = saved_in_cell;
        self.line_prefix = saved_prefix;

        let line = fragment
            .text
            .lines()
            .map(|line| strip_hard_break(line.trim()))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        escape_table_cell(&line)
    }

    fn warn_nested(&mut self, construct: String) {
        self.warnings.push(RenderWarning::NestedConstruct {
            chapter: self.chapter_id.to_string(),
            construct,
        });
    }
}

/// Drop the backslash of a hard line break at the end of a line.
fn strip_hard_break(line: &str) -> &str {
    let backslashes = line.len() - line.trim_end_matches('\\').len();
    if backslashes % 2 == 1 {
        line[..line.len() - 1].trim_end()
    } else {
        line
    }
}

/// Make a link destination safe for `[text](dest)`.
fn encode_destination(dest: &str) -> String {
    dest.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

/// Render a single chapter tree to markdown with no headings, anchors or assets.
///
/// Convenience entry point mainly useful for fragments and tests; the
/// pipeline configures a [`RenderContext`] directly.
pub fn render_tree(tree: &ContentTree) -> RenderResult {
    RenderContext::new(tree, "").render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;
    use crate::model::MediaAsset;

    fn render(html: &str) -> String {
        render_tree(&parse_html(html)).content
    }

    #[test]
    fn test_heading_and_paragraph() {
        assert_eq!(
            render("<h2>Intro</h2><p>Hello <b>world</b>.</p>"),
            "## Intro\n\nHello **world**.\n"
        );
    }

    #[test]
    fn test_unordered_list() {
        assert_eq!(render("<ul><li>A</li><li>B</li></ul>"), "- A\n- B\n");
    }

    #[test]
    fn test_ordered_list_counts_per_list() {
        assert_eq!(
            render("<ol><li>one</li><li>two</li></ol><p>x</p><ol><li>again</li></ol>"),
            "1. one\n2. two\n\nx\n\n1. again\n"
        );
    }

    #[test]
    fn test_nested_list_indent() {
        assert_eq!(
            render("<ul><li>A<ul><li>A1</li></ul></li><li>B</li></ul>"),
            "- A\n  - A1\n- B\n"
        );
        assert_eq!(
            render("<ol><li>A<ul><li>A1</li></ul></li></ol>"),
            "1. A\n   - A1\n"
        );
    }

    #[test]
    fn test_list_with_whitespace_nodes() {
        assert_eq!(
            render("<ul>\n  <li>A</li>\n  <li> B </li>\n</ul>"),
            "- A\n- B\n"
        );
    }

    #[test]
    fn test_loose_list() {
        assert_eq!(
            render("<ul><li><p>a</p><p>b</p></li><li><p>c</p></li></ul>"),
            "- a\n\n  b\n\n- c\n"
        );
    }

    #[test]
    fn test_adjacent_lists_separated() {
        assert_eq!(
            render("<ul><li>A</li></ul><ul><li>B</li></ul>"),
            "- A\n\n<!-- -->\n\n- B\n"
        );
    }

    #[test]
    fn test_inline_wrappers() {
        assert_eq!(
            render("<p><i>it</i> <s>gone</s> <u>under</u> x<sup>2</sup> H<sub>2</sub>O</p>"),
            "*it* ~~gone~~ <u>under</u> x^2^ H~2~O\n"
        );
    }

    #[test]
    fn test_wrapper_whitespace_moves_outside() {
        assert_eq!(render("<p>a<b> bold </b>b</p>"), "a **bold** b\n");
        assert_eq!(render("<p>a<b> </b>b</p>"), "a b\n");
        assert_eq!(render("<p><b></b>b</p>"), "b\n");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            render(r#"<p><a href="https://example.com/a b">site</a></p>"#),
            "[site](https://example.com/a%20b)\n"
        );
        assert_eq!(render(r#"<p><a href="">bare</a></p>"#), "bare\n");
        assert_eq!(render(r##"<p><a href="#note1">[1]</a></p>"##), "\\[1\\]\n");
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            render("<blockquote><p>one</p><p>two</p></blockquote>"),
            "> one\n>\n> two\n"
        );
        assert_eq!(
            render("<blockquote><p>outer</p><blockquote><p>inner</p></blockquote></blockquote>"),
            "> outer\n>\n> > inner\n"
        );
    }

    #[test]
    fn test_code_block_verbatim() {
        assert_eq!(
            render("<pre><code class=\"language-rust\">fn main() {\n    let x = a*b_c;\n}\n</code></pre>"),
            "```rust\nfn main() {\n    let x = a*b_c;\n}\n```\n"
        );
    }

    #[test]
    fn test_code_block_fence_exceeds_content() {
        let output = render("<pre>```nested```</pre>");
        assert_eq!(output, "````\n```nested```\n````\n");
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(render("<p>run <code>ls -a</code></p>"), "run `ls -a`\n");
        assert_eq!(render("<p><code>a ` b</code></p>"), "``a ` b``\n");
        assert_eq!(render("<p><code>`x</code></p>"), "`` `x ``\n");
    }

    #[test]
    fn test_table() {
        let output = render(
            "<table><thead><tr><th>Name</th><th>Value</th></tr></thead>\
             <tbody><tr><td>a|b</td><td>1</td></tr><tr><td>only</td></tr></tbody></table>",
        );
        assert_eq!(
            output,
            "| Name | Value |\n| --- | --- |\n| a\\|b | 1 |\n| only |  |\n"
        );
    }

    #[test]
    fn test_nested_table_warns() {
        let result = render_tree(&parse_html(
            "<table><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table>",
        ));
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(result.warnings[0], RenderWarning::NestedConstruct { .. }));
        assert_eq!(result.content, "| outer inner |\n| --- |\n");
    }

    #[test]
    fn test_rule_and_break() {
        assert_eq!(render("<p>a<br/>b</p><hr/><p>c</p>"), "a\\\nb\n\n---\n\nc\n");
    }

    #[test]
    fn test_text_escaping_and_collapsing() {
        assert_eq!(
            render("<p>  2*3   =\n 6 and snake_case  </p>"),
            "2\\*3 = 6 and snake\\_case\n"
        );
    }

    #[test]
    fn test_generic_pass_through() {
        assert_eq!(
            render("<div>first</div><div><section>second</section></div>"),
            "first\n\nsecond\n"
        );
        assert_eq!(render("<p><span class=\"x\">plain</span> text</p>"), "plain text\n");
    }

    #[test]
    fn test_inline_elements_stay_on_the_line() {
        assert_eq!(render("<p>Hello <var>x</var> world</p>"), "Hello x world\n");
        assert_eq!(render("<p>See <time>today</time>.</p>"), "See today.\n");
        assert_eq!(render("<p>日本<ruby>漢<rp>(</rp><rt>かん</rt><rp>)</rp></ruby>字</p>"), "日本漢(かん)字\n");
        assert_eq!(render("<p>a <custom-tag>b</custom-tag> c</p>"), "a b c\n");
        assert_eq!(render("<h2>Part <bdi>two</bdi></h2>"), "## Part two\n");
    }

    #[test]
    fn test_line_start_markers_escaped() {
        assert_eq!(render("<p>- not a list</p>"), "\\- not a list\n");
        assert_eq!(render("<p>+ plus</p>"), "\\+ plus\n");
        assert_eq!(render("<p>1. Not a list</p>"), "1\\. Not a list\n");
        assert_eq!(render("<p>---</p>"), "\\---\n");
        assert_eq!(render("<p>a<br/>===</p>"), "a\\\n\\===\n");
        assert_eq!(render("<blockquote><p>- quoted</p></blockquote>"), "> \\- quoted\n");
        assert_eq!(render("<ul><li>1. first</li></ul>"), "- 1\\. first\n");
    }

    #[test]
    fn test_markers_inside_lines_untouched() {
        assert_eq!(render("<p>a - b, 1. c</p>"), "a - b, 1. c\n");
        assert_eq!(render("<p><a href=\"x.html\">1. Intro</a></p>"), "[1. Intro](x.html)\n");
        assert_eq!(render("<p><a href=\"#n1\">1. note</a></p>"), "1\\. note\n");
    }

    #[test]
    fn test_table_cells_keep_inline_content() {
        let tree = parse_html(
            r#"<table><tr><th>a*b*c</th><th><b>Bold</b></th></tr>
               <tr><td><img src="../Images/x.png"/></td><td>one<br/>two</td></tr></table>"#,
        );
        let mut assets = AssetSet::new();
        assets.insert(MediaAsset::new("OEBPS/Images/x.png", "images/x.png"));

        let result = RenderContext::new(&tree, "ch1")
            .with_href("OEBPS/Text/ch1.xhtml")
            .with_assets(&assets)
            .render();

        assert_eq!(
            result.content,
            "| a\\*b\\*c | **Bold** |\n| --- | --- |\n| ![x.png](images/x.png) | one two |\n"
        );
        assert!(result.warnings.is_empty());
        assert_eq!(result.images.len(), 1);
    }

    #[test]
    fn test_table_cell_missing_image_warns() {
        let tree = parse_html(r#"<table><tr><td><img src="gone.png"/></td></tr></table>"#);
        let assets = AssetSet::new();

        let result = RenderContext::new(&tree, "ch1").with_assets(&assets).render();

        assert_eq!(result.content, "| ![gone.png](gone.png) |\n| --- |\n");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_image_rewritten() {
        let tree = parse_html(r#"<p><img src="../Images/a.png"/></p>"#);
        let mut assets = AssetSet::new();
        assets.insert(MediaAsset::new("OEBPS/Images/a.png", "images/a.png"));

        let result = RenderContext::new(&tree, "ch1")
            .with_href("OEBPS/Text/ch1.xhtml")
            .with_assets(&assets)
            .render();

        assert_eq!(result.content, "![a.png](images/a.png)\n");
        assert!(result.warnings.is_empty());
        assert_eq!(result.images.len(), 1);
    }

    #[test]
    fn test_missing_image_keeps_reference() {
        let tree = parse_html(r#"<p><img src="../Images/missing.png" alt="Fig"/></p>"#);
        let assets = AssetSet::new();

        let result = RenderContext::new(&tree, "ch1")
            .with_href("OEBPS/Text/ch1.xhtml")
            .with_assets(&assets)
            .render();

        assert_eq!(result.content, "![Fig](../Images/missing.png)\n");
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].to_string().contains("../Images/missing.png"));
        assert!(result.images.is_empty());
    }

    #[test]
    fn test_targets_emit_anchors() {
        let tree = parse_html("<h1>Title</h1><p id=\"p1\">text</p>");
        let heading = tree.children(NodeId::ROOT).next().unwrap();
        let para = tree.find_by_element_id("p1").unwrap();
        let targets: AnchorTargets = [
            (NodeId::ROOT, vec!["ch1".to_string(), "part-1".to_string()]),
            (heading, vec!["ch1-title".to_string()]),
            (para, vec!["ch1-p1".to_string()]),
        ]
        .into_iter()
        .collect();

        let result = RenderContext::new(&tree, "ch1").with_targets(&targets).render();
        assert_eq!(
            result.content,
            "<a id=\"ch1\"></a><a id=\"part-1\"></a>\n\n<a id=\"ch1-title\"></a>\n\n# Title\n\n<a id=\"ch1-p1\"></a>\n\ntext\n"
        );
    }

    #[test]
    fn test_classified_heading_replaces_paragraph() {
        let tree = parse_html("<p class=\"bold\">（一）概述</p><p>正文</p>");
        let para = tree.children(NodeId::ROOT).next().unwrap();
        let headings = vec![HeadingCandidate {
            level: 3,
            text: "（一）概述".to_string(),
            anchor: "ch1-一概述".to_string(),
            source: para,
        }];

        let result = RenderContext::new(&tree, "ch1").with_headings(&headings).render();
        assert_eq!(result.content, "### （一）概述\n\n正文\n");
    }
}
