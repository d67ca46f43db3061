//! Media assets and image reference resolution.

use std::collections::{HashMap, HashSet};

use percent_encoding::percent_decode_str;

use crate::config::IMAGE_DIR;
use crate::util::{file_name, parent_dir, resolve_path, split_fragment};

/// A media file of the book with its assigned output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    /// Path of the asset inside the package, as the manifest names it.
    pub original_ref: String,
    /// Relative output path, e.g. `images/cover.jpg`. Collision-free within a set.
    pub output_path: String,
    pub media_type: String,
    /// Asset bytes (may be empty when the caller only needs references).
    pub data: Vec<u8>,
}

impl MediaAsset {
    pub fn new(original_ref: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            original_ref: original_ref.into(),
            output_path: output_path.into(),
            media_type: String::new(),
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.media_type = media_type.into();
        self.data = data;
        self
    }

    /// File name of the output path, used as default alt text.
    pub fn file_name(&self) -> &str {
        file_name(&self.output_path)
    }
}

/// The set of media assets, keyed by original reference.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    assets: Vec<MediaAsset>,
    by_ref: HashMap<String, usize>,
    output_paths: HashSet<String>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset with an already assigned output path.
    ///
    /// A later asset with the same original reference replaces the earlier one.
    pub fn insert(&mut self, asset: MediaAsset) {
        self.output_paths.insert(asset.output_path.clone());
        match self.by_ref.get(&asset.original_ref) {
            Some(&index) => self.assets[index] = asset,
            None => {
                self.by_ref
                    .insert(asset.original_ref.clone(), self.assets.len());
                self.assets.push(asset);
            }
        }
    }

    /// Add an image, assigning a collision-free `images/<name>` output path.
    ///
    /// Colliding names get a numeric suffix: `a.png`, `a_1.png`, `a_2.png`.
    pub fn insert_image(
        &mut self,
        original_ref: impl Into<String>,
        media_type: impl Into<String>,
        data: Vec<u8>,
    ) -> &MediaAsset {
        let original_ref = original_ref.into();
        let output_path = self.unique_output_path(file_name(&original_ref));
        self.insert(MediaAsset::new(original_ref.clone(), output_path).with_data(media_type, data));
        let index = self.by_ref[&original_ref];
        &self.assets[index]
    }

    fn unique_output_path(&self, name: &str) -> String {
        let candidate = format!("{IMAGE_DIR}/{name}");
        if !self.output_paths.contains(&candidate) {
            return candidate;
        }

        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (name, String::new()),
        };
        (1..)
            .map(|n| format!("{IMAGE_DIR}/{stem}_{n}{ext}"))
            .find(|path| !self.output_paths.contains(path))
            .unwrap_or(candidate)
    }

    pub fn get(&self, original_ref: &str) -> Option<&MediaAsset> {
        self.by_ref.get(original_ref).map(|&i| &self.assets[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Find the asset an image `src` in a chapter refers to.
    ///
    /// Tries, in order: the src resolved against the chapter's directory,
    /// the src as written, a unique file-name match, and a path-suffix match.
    pub fn resolve(&self, src: &str, chapter_href: &str) -> Option<&MediaAsset> {
        let (src, _) = split_fragment(src.trim());
        if src.is_empty() {
            return None;
        }

        let resolved = resolve_path(parent_dir(chapter_href), src);
        if let Some(asset) = self.get(&resolved) {
            return Some(asset);
        }

        let decoded = percent_decode_str(src).decode_utf8_lossy();
        if let Some(asset) = self.get(&decoded) {
            return Some(asset);
        }

        let name = file_name(&decoded);
        let mut by_name = self
            .assets
            .iter()
            .filter(|a| file_name(&a.original_ref) == name);
        if let (Some(asset), None) = (by_name.next(), by_name.next()) {
            return Some(asset);
        }

        let cleaned = decoded
            .trim_start_matches("../")
            .trim_start_matches("./");
        if cleaned.is_empty() {
            return None;
        }
        self.assets.iter().find(|a| {
            is_path_suffix(&a.original_ref, cleaned) || is_path_suffix(cleaned, &a.original_ref)
        })
    }
}

/// `suffix` equals `path` or ends it at a `/` boundary.
fn is_path_suffix(path: &str, suffix: &str) -> bool {
    path.strip_suffix(suffix)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('/'))
}
