//! Core data model handed to the converter.
//!
//! This module contains:
//! - The arena-owned content tree of one chapter ([`ContentTree`])
//! - Node kinds (the closed element table) and attributes
//! - Chapter documents in reading order
//! - Book metadata and the native outline
//! - Media assets with their assigned output paths

mod assets;
mod book;
mod chapter;
mod node;
mod tree;

pub use assets::{AssetSet, MediaAsset};
pub use book::{Metadata, OutlineEntry};
pub use chapter::{ChapterDocument, ChapterKind};
pub use node::{Node, NodeId, NodeKind, TextRange};
pub use tree::{AncestorIter, AttributeMap, ChildIter, ContentTree, DfsIter};
