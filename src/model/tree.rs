//! Arena-owned content tree for one chapter.

use std::collections::HashMap;

use super::node::{Node, NodeId, NodeKind, TextRange};

/// A chapter's content as an arena of nodes.
///
/// The tree uses a parent-pointer / first-child / next-sibling layout;
/// all links are indices into `nodes`, and index 0 is always the root.
/// Text and attribute values live in shared buffers referenced by range.
#[derive(Debug, Clone)]
pub struct ContentTree {
    nodes: Vec<Node>,
    /// Sparse element attributes (href, src, alt, class, id, ...).
    pub attributes: AttributeMap,
    text: String,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree {
    /// Create a new empty tree with a root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Root)],
            attributes: AttributeMap::default(),
            text: String::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Kind of a node, or `None` for an unknown id.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Allocate a new detached node and return its ID.
    pub fn alloc_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Append text to the buffer and return the range.
    pub fn append_text(&mut self, text: &str) -> TextRange {
        let start = self.text.len() as u32;
        self.text.push_str(text);
        TextRange::new(start, text.len() as u32)
    }

    /// Get text from a range.
    pub fn text(&self, range: TextRange) -> &str {
        let start = range.start as usize;
        let end = (range.start + range.len) as usize;
        &self.text[start..end]
    }

    /// Text of a text node (empty for other kinds).
    pub fn node_text(&self, id: NodeId) -> &str {
        match self.node(id) {
            Some(node) if node.kind == NodeKind::Text => self.text(node.text),
            _ => "",
        }
    }

    /// Append a child node to a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(child_node) = self.nodes.get_mut(child.0 as usize) {
            child_node.parent = Some(parent);
        }

        let Some(parent_node) = self.nodes.get(parent.0 as usize) else {
            return;
        };

        match parent_node.first_child {
            Some(first_child) => {
                let mut current = first_child;
                while let Some(next) = self.nodes.get(current.0 as usize).and_then(|n| n.next_sibling)
                {
                    current = next;
                }
                if let Some(last_node) = self.nodes.get_mut(current.0 as usize) {
                    last_node.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(parent_node) = self.nodes.get_mut(parent.0 as usize) {
                    parent_node.first_child = Some(child);
                }
            }
        }
    }

    /// Allocate an element of `kind` and append it under `parent`.
    pub fn push_element(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc_node(Node::new(kind));
        self.append_child(parent, id);
        id
    }

    /// Allocate a text node and append it under `parent`.
    pub fn push_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let range = self.append_text(text);
        let id = self.alloc_node(Node::text(range));
        self.append_child(parent, id);
        id
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        let first_child = self
            .nodes
            .get(parent.0 as usize)
            .and_then(|n| n.first_child);
        ChildIter {
            tree: self,
            current: first_child,
        }
    }

    /// Iterate over the strict ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            current: self.node(id).and_then(|n| n.parent),
        }
    }

    /// Whether any strict ancestor has one of the given kinds.
    pub fn has_ancestor_kind(&self, id: NodeId, kinds: &[NodeKind]) -> bool {
        self.ancestors(id)
            .filter_map(|a| self.kind(a))
            .any(|kind| kinds.contains(&kind))
    }

    /// Iterate over all nodes in depth-first order.
    pub fn iter_dfs(&self) -> DfsIter<'_> {
        DfsIter {
            tree: self,
            stack: vec![NodeId::ROOT],
        }
    }

    /// Iterate over a subtree (including `id`) in depth-first order.
    pub fn descendants(&self, id: NodeId) -> DfsIter<'_> {
        DfsIter {
            tree: self,
            stack: vec![id],
        }
    }

    /// Find the element whose `id` attribute equals `element_id`.
    pub fn find_by_element_id(&self, element_id: &str) -> Option<NodeId> {
        self.iter_dfs()
            .find(|&id| self.attributes.get(id, "id") == Some(element_id))
    }

    /// Collect the text of a subtree with whitespace collapsed and trimmed.
    pub fn collect_text(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text_recursive(id, &mut result);
        let trimmed_len = result.trim_end().len();
        result.truncate(trimmed_len);
        result
    }

    fn collect_text_recursive(&self, id: NodeId, result: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };

        match node.kind {
            NodeKind::Text if !node.text.is_empty() => {
                let text = self.text(node.text);
                let has_leading = text.starts_with(char::is_whitespace);
                let has_trailing = text.ends_with(char::is_whitespace);
                let words: Vec<&str> = text.split_whitespace().collect();

                if !words.is_empty() {
                    if has_leading && !result.is_empty() && !result.ends_with(' ') {
                        result.push(' ');
                    }
                    result.push_str(&words.join(" "));
                    if has_trailing {
                        result.push(' ');
                    }
                } else if !result.is_empty() && !result.ends_with(' ') {
                    result.push(' ');
                }
            }
            NodeKind::Break if !result.is_empty() && !result.ends_with(' ') => {
                result.push(' ');
            }
            _ => {}
        }

        for child_id in self.children(id) {
            self.collect_text_recursive(child_id, result);
        }
    }

    /// Collect the text of a subtree exactly as written (line breaks from `<br>`).
    pub fn collect_text_verbatim(&self, id: NodeId) -> String {
        let mut result = String::new();
        for node_id in self.descendants(id) {
            match self.kind(node_id) {
                Some(NodeKind::Text) => result.push_str(self.node_text(node_id)),
                Some(NodeKind::Break) => result.push('\n'),
                _ => {}
            }
        }
        result
    }
}

/// Iterator over children of a node.
pub struct ChildIter<'a> {
    tree: &'a ContentTree,
    current: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator walking parent links toward the root.
pub struct AncestorIter<'a> {
    tree: &'a ContentTree,
    current: Option<NodeId>,
}

impl Iterator for AncestorIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.node(current).and_then(|n| n.parent);
        Some(current)
    }
}

/// Depth-first iterator over a subtree.
pub struct DfsIter<'a> {
    tree: &'a ContentTree,
    stack: Vec<NodeId>,
}

impl Iterator for DfsIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Push children in reverse order so they're visited left-to-right
        let mut children: Vec<NodeId> = self.tree.children(current).collect();
        children.reverse();
        self.stack.extend(children);

        Some(current)
    }
}

/// Sparse attribute storage.
///
/// Most nodes carry no attributes, so values are kept per node in a map,
/// with all strings stored in one contiguous buffer.
#[derive(Debug, Default, Clone)]
pub struct AttributeMap {
    buffer: String,
    entries: HashMap<NodeId, Vec<(TextRange, TextRange)>>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, s: &str) -> TextRange {
        let start = self.buffer.len() as u32;
        self.buffer.push_str(s);
        TextRange::new(start, s.len() as u32)
    }

    fn get_str(&self, range: TextRange) -> &str {
        let start = range.start as usize;
        let end = (range.start + range.len) as usize;
        &self.buffer[start..end]
    }

    /// Set an attribute. Later values for the same name win.
    pub fn set(&mut self, node: NodeId, name: &str, value: &str) {
        let name_range = self.append(&name.to_ascii_lowercase());
        let value_range = self.append(value);
        self.entries
            .entry(node)
            .or_default()
            .push((name_range, value_range));
    }

    /// Get an attribute value by (lowercase) name.
    pub fn get(&self, node: NodeId, name: &str) -> Option<&str> {
        self.entries.get(&node).and_then(|attrs| {
            attrs
                .iter()
                .rev()
                .find(|(n, _)| self.get_str(*n) == name)
                .map(|(_, v)| self.get_str(*v))
        })
    }

    /// Iterate over a node's attributes in insertion order.
    pub fn iter(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .get(&node)
            .into_iter()
            .flatten()
            .map(|(n, v)| (self.get_str(*n), self.get_str(*v)))
    }

    pub fn href(&self, node: NodeId) -> Option<&str> {
        self.get(node, "href")
    }

    pub fn src(&self, node: NodeId) -> Option<&str> {
        self.get(node, "src")
    }

    pub fn alt(&self, node: NodeId) -> Option<&str> {
        self.get(node, "alt")
    }

    pub fn class(&self, node: NodeId) -> Option<&str> {
        self.get(node, "class")
    }

    pub fn style(&self, node: NodeId) -> Option<&str> {
        self.get(node, "style")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_creation() {
        let tree = ContentTree::new();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.root(), NodeId::ROOT);

        let root = tree.node(NodeId::ROOT).unwrap();
        assert_eq!(root.kind, NodeKind::Root);
        assert!(root.parent.is_none());
    }

    #[test]
    fn test_node_tree() {
        let mut tree = ContentTree::new();
        let para = tree.push_element(NodeId::ROOT, NodeKind::Paragraph);
        let text = tree.push_text(para, "Test content");

        let children: Vec<_> = tree.children(NodeId::ROOT).collect();
        assert_eq!(children, vec![para]);
        assert_eq!(tree.node_text(text), "Test content");
        assert_eq!(tree.ancestors(text).collect::<Vec<_>>(), vec![para, NodeId::ROOT]);
    }

    #[test]
    fn test_dfs_iteration() {
        let mut tree = ContentTree::new();
        let para1 = tree.push_element(NodeId::ROOT, NodeKind::Paragraph);
        let para2 = tree.push_element(NodeId::ROOT, NodeKind::Paragraph);
        let text = tree.push_text(para1, "Text");

        let nodes: Vec<_> = tree.iter_dfs().collect();
        assert_eq!(nodes, vec![NodeId::ROOT, para1, text, para2]);
    }

    #[test]
    fn test_collect_text_normalizes_whitespace() {
        let mut tree = ContentTree::new();
        let para = tree.push_element(NodeId::ROOT, NodeKind::Paragraph);
        tree.push_text(para, "  Hello\n   ");
        let bold = tree.push_element(para, NodeKind::Strong);
        tree.push_text(bold, "big");
        tree.push_text(para, "   world  ");

        assert_eq!(tree.collect_text(para), "Hello big world");
    }

    #[test]
    fn test_collect_text_verbatim() {
        let mut tree = ContentTree::new();
        let pre = tree.push_element(NodeId::ROOT, NodeKind::CodeBlock);
        tree.push_text(pre, "fn main() {\n    run();\n");
        tree.push_element(pre, NodeKind::Break);
        tree.push_text(pre, "}");

        assert_eq!(tree.collect_text_verbatim(pre), "fn main() {\n    run();\n\n}");
    }

    #[test]
    fn test_attributes() {
        let mut tree = ContentTree::new();
        let img = tree.push_element(NodeId::ROOT, NodeKind::Image);
        tree.attributes.set(img, "SRC", "../Images/a.png");
        tree.attributes.set(img, "alt", "An image");

        assert_eq!(tree.attributes.src(img), Some("../Images/a.png"));
        assert_eq!(tree.attributes.alt(img), Some("An image"));
        assert_eq!(tree.attributes.href(img), None);
        assert_eq!(tree.attributes.iter(img).count(), 2);
    }

    #[test]
    fn test_find_by_element_id() {
        let mut tree = ContentTree::new();
        let section = tree.push_element(NodeId::ROOT, NodeKind::Generic);
        let heading = tree.push_element(section, NodeKind::Heading(2));
        tree.attributes.set(heading, "id", "sec2");

        assert_eq!(tree.find_by_element_id("sec2"), Some(heading));
        assert_eq!(tree.find_by_element_id("missing"), None);
        assert!(tree.has_ancestor_kind(heading, &[NodeKind::Generic]));
        assert!(!tree.has_ancestor_kind(heading, &[NodeKind::Table]));
    }
}
