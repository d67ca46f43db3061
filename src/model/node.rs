//! Content node types and kinds.

/// Unique identifier for a node within a [`ContentTree`](super::ContentTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root node ID (always 0).
    pub const ROOT: NodeId = NodeId(0);
}

/// Closed set of node kinds the converter understands.
///
/// Every HTML element is mapped onto one of these by the element table in
/// [`crate::html`]; anything unrecognised becomes [`NodeKind::Generic`] and
/// renders transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    /// Leaf text content. References a range in the tree's text buffer.
    #[default]
    Text,
    /// Headings with level 1-6 (`<h1>`..`<h6>`).
    Heading(u8),
    /// Paragraph (`<p>`).
    Paragraph,
    /// `<strong>`, `<b>`.
    Strong,
    /// `<em>`, `<i>`, `<cite>`.
    Emphasis,
    /// `<s>`, `<strike>`, `<del>`.
    Strike,
    /// `<u>`, `<ins>`.
    Underline,
    /// `<sup>`.
    Superscript,
    /// `<sub>`.
    Subscript,
    /// Hyperlink. `href` lives in the attribute map.
    Link,
    /// Image. `src`/`alt` live in the attribute map.
    Image,
    /// `<ul>`.
    UnorderedList,
    /// `<ol>`.
    OrderedList,
    /// `<li>`.
    ListItem,
    /// `<blockquote>`.
    BlockQuote,
    /// Preformatted block (`<pre>`, with or without an inner `<code>`).
    CodeBlock,
    /// Inline code (`<code>`, `<kbd>`, `<samp>` outside a `<pre>`).
    Code,
    /// `<table>`.
    Table,
    /// `<tr>`.
    TableRow,
    /// `<td>`, `<th>`.
    TableCell,
    /// `<hr>`.
    Rule,
    /// `<br>`.
    Break,
    /// Generic inline container (`<span>`, `<font>`, `<ruby>`, ...).
    Span,
    /// Generic or unknown element (`<div>`, `<section>`, ...). Pass-through.
    Generic,
    /// Root of a chapter's tree.
    Root,
}

impl NodeKind {
    /// Map a lowercase HTML tag name onto a node kind.
    pub fn from_tag(tag: &str) -> NodeKind {
        match tag {
            "h1" => NodeKind::Heading(1),
            "h2" => NodeKind::Heading(2),
            "h3" => NodeKind::Heading(3),
            "h4" => NodeKind::Heading(4),
            "h5" => NodeKind::Heading(5),
            "h6" => NodeKind::Heading(6),
            "p" => NodeKind::Paragraph,
            "strong" | "b" => NodeKind::Strong,
            "em" | "i" | "cite" | "dfn" => NodeKind::Emphasis,
            "s" | "strike" | "del" => NodeKind::Strike,
            "u" | "ins" => NodeKind::Underline,
            "sup" => NodeKind::Superscript,
            "sub" => NodeKind::Subscript,
            "a" => NodeKind::Link,
            "img" | "image" => NodeKind::Image,
            "ul" => NodeKind::UnorderedList,
            "ol" => NodeKind::OrderedList,
            "li" => NodeKind::ListItem,
            "blockquote" => NodeKind::BlockQuote,
            "pre" => NodeKind::CodeBlock,
            "code" | "kbd" | "samp" | "tt" => NodeKind::Code,
            "table" => NodeKind::Table,
            "tr" => NodeKind::TableRow,
            "td" | "th" => NodeKind::TableCell,
            "hr" => NodeKind::Rule,
            "br" => NodeKind::Break,
            "span" | "font" | "small" | "big" | "mark" | "abbr" | "acronym" | "q" | "var"
            | "time" | "data" | "bdi" | "bdo" | "label" | "wbr" | "nobr" | "output" | "ruby"
            | "rb" | "rt" | "rtc" | "rp" => NodeKind::Span,
            _ => NodeKind::Generic,
        }
    }

    /// Whether the kind is laid out as a block in Markdown.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            NodeKind::Heading(_)
                | NodeKind::Paragraph
                | NodeKind::UnorderedList
                | NodeKind::OrderedList
                | NodeKind::ListItem
                | NodeKind::BlockQuote
                | NodeKind::CodeBlock
                | NodeKind::Table
                | NodeKind::TableRow
                | NodeKind::TableCell
                | NodeKind::Rule
                | NodeKind::Generic
                | NodeKind::Root
        )
    }
}

/// Range into the tree's text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRange {
    /// Byte offset into the text buffer.
    pub start: u32,
    /// Length in bytes.
    pub len: u32,
}

impl TextRange {
    pub fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A node in the content tree.
///
/// Links to relatives are arena indices, so the tree stays acyclic and is
/// owned by a single [`ContentTree`](super::ContentTree).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Parent node (None for root).
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Text content range (only for Text nodes).
    pub text: TextRange,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            next_sibling: None,
            text: TextRange::default(),
        }
    }

    /// Create a text node with the given range.
    pub fn text(range: TextRange) -> Self {
        Self {
            text: range,
            ..Self::new(NodeKind::Text)
        }
    }
}
