//! HTML/XHTML chapter documents to [`ContentTree`].
//!
//! Parsing is lenient (html5ever, like a browser); the resulting DOM is
//! walked once and every element is mapped through the fixed element table
//! in [`NodeKind::from_tag`]. Non-content elements (`head`, `script`,
//! `style`, ...) are dropped with their subtrees.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::model::{ContentTree, Node, NodeId, NodeKind};
use crate::util::{decode_text, extract_xml_encoding};

/// Elements whose subtrees never carry readable content.
const SKIPPED_TAGS: &[&str] = &[
    "head", "title", "script", "style", "meta", "link", "noscript", "template",
];

/// Parse an HTML or XHTML document into a content tree.
///
/// When the document has a `<body>`, only its content is kept.
pub fn parse_html(html: &str) -> ContentTree {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    let content = find_element(&dom.document, "body").unwrap_or_else(|| dom.document.clone());

    let mut tree = ContentTree::new();
    for child in content.children.borrow().iter() {
        convert_node(&mut tree, child, NodeId::ROOT);
    }
    tree
}

/// Parse raw document bytes, honouring the XML declaration's encoding.
pub fn parse_html_bytes(bytes: &[u8]) -> ContentTree {
    let text = decode_text(bytes, extract_xml_encoding(bytes));
    parse_html(&text)
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let NodeData::Element { ref name, .. } = handle.data
        && &*name.local == tag
    {
        return Some(handle.clone());
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn convert_node(tree: &mut ContentTree, handle: &Handle, parent: NodeId) {
    match handle.data {
        NodeData::Text { ref contents } => {
            let contents = contents.borrow();
            if !contents.is_empty() {
                tree.push_text(parent, &contents);
            }
        }
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            let tag = name.local.to_ascii_lowercase();
            let tag: &str = &tag;
            if SKIPPED_TAGS.contains(&tag) {
                return;
            }

            let kind = NodeKind::from_tag(tag);
            let id = tree.alloc_node(Node::new(kind));
            tree.append_child(parent, id);

            for attr in attrs.borrow().iter() {
                tree.attributes.set(id, &attr.name.local, &attr.value);
            }
            // SVG <image> references its bitmap through (xlink:)href
            if kind == NodeKind::Image && tree.attributes.src(id).is_none() {
                if let Some(href) = tree.attributes.href(id).map(str::to_string) {
                    tree.attributes.set(id, "src", &href);
                }
            }

            for child in handle.children.borrow().iter() {
                convert_node(tree, child, id);
            }
        }
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                convert_node(tree, child, parent);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tree: &ContentTree) -> Vec<NodeKind> {
        tree.iter_dfs().filter_map(|id| tree.kind(id)).collect()
    }

    #[test]
    fn test_body_content_only() {
        let tree = parse_html(
            "<html><head><title>Ignored</title><style>p{}</style></head>\
             <body><h2>Intro</h2><p>Hello <b>world</b>.</p></body></html>",
        );

        assert_eq!(
            kinds(&tree),
            vec![
                NodeKind::Root,
                NodeKind::Heading(2),
                NodeKind::Text,
                NodeKind::Paragraph,
                NodeKind::Text,
                NodeKind::Strong,
                NodeKind::Text,
                NodeKind::Text,
            ]
        );
        assert_eq!(tree.collect_text(NodeId::ROOT), "IntroHello world.");
    }

    #[test]
    fn test_tag_names_case_insensitive() {
        let tree = parse_html("<P>Hello <VAR>x</VAR> <Ruby>漢<RT>かん</RT></Ruby></P>");
        assert_eq!(
            kinds(&tree),
            vec![
                NodeKind::Root,
                NodeKind::Paragraph,
                NodeKind::Text,
                NodeKind::Span,
                NodeKind::Text,
                NodeKind::Text,
                NodeKind::Span,
                NodeKind::Text,
                NodeKind::Span,
                NodeKind::Text,
            ]
        );
    }

    #[test]
    fn test_fragment_without_body() {
        let tree = parse_html("<ul><li>A</li><li>B</li></ul>");
        let list = tree.children(NodeId::ROOT).next().unwrap();
        assert_eq!(tree.kind(list), Some(NodeKind::UnorderedList));
        assert_eq!(tree.children(list).count(), 2);
    }

    #[test]
    fn test_attributes_kept() {
        let tree = parse_html(r#"<p class="calibre bold" id="p1"><img src="../Images/a.png" alt="A"/></p>"#);
        let para = tree.children(NodeId::ROOT).next().unwrap();
        let img = tree.children(para).next().unwrap();

        assert_eq!(tree.attributes.class(para), Some("calibre bold"));
        assert_eq!(tree.attributes.get(para, "id"), Some("p1"));
        assert_eq!(tree.kind(img), Some(NodeKind::Image));
        assert_eq!(tree.attributes.src(img), Some("../Images/a.png"));
    }

    #[test]
    fn test_svg_cover_image() {
        let tree = parse_html(
            r#"<div><svg xmlns:xlink="http://www.w3.org/1999/xlink"><image xlink:href="cover.jpeg"/></svg></div>"#,
        );
        let image = tree
            .iter_dfs()
            .find(|&id| tree.kind(id) == Some(NodeKind::Image))
            .unwrap();
        assert_eq!(tree.attributes.src(image), Some("cover.jpeg"));
    }

    #[test]
    fn test_xhtml_with_declaration() {
        let bytes = br#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head>
<body><p>Text</p><script>alert(1)</script></body></html>"#;
        let tree = parse_html_bytes(bytes);
        assert_eq!(tree.collect_text(NodeId::ROOT), "Text");
    }
}
