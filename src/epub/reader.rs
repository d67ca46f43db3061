use std::collections::HashSet;
use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, warn};
use zip::ZipArchive;

use super::parser::{OpfData, parse_container_xml, parse_nav, parse_ncx, parse_opf};
use crate::config::HeuristicConfig;
use crate::error::{Error, Result};
use crate::html::parse_html_bytes;
use crate::model::{AssetSet, ChapterDocument, ChapterKind, OutlineEntry};
use crate::pipeline::ConversionInput;
use crate::util::{decode_text, file_name, parent_dir, resolve_path, split_fragment, strip_bom};

/// Read an EPUB file from disk into a [`ConversionInput`].
///
/// Supports EPUB 2 (NCX) and EPUB 3 (nav document) packages.
///
/// # Example
///
/// ```no_run
/// use epub2md::epub::read_epub;
///
/// let input = read_epub("path/to/book.epub")?;
/// println!("{} chapters", input.chapters.len());
/// # Ok::<(), epub2md::Error>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<ConversionInput> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file, &HeuristicConfig::default())
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
///
/// `config` decides which documents count as cover or contents pages.
///
/// ```no_run
/// use std::io::Cursor;
/// use epub2md::HeuristicConfig;
/// use epub2md::epub::read_epub_from_reader;
///
/// let epub_data: Vec<u8> = std::fs::read("book.epub")?;
/// let input = read_epub_from_reader(Cursor::new(epub_data), &HeuristicConfig::default())?;
/// # Ok::<(), epub2md::Error>(())
/// ```
pub fn read_epub_from_reader<R: Read + Seek>(
    reader: R,
    config: &HeuristicConfig,
) -> Result<ConversionInput> {
    let mut archive = ZipArchive::new(reader)?;

    // 1. Find the OPF file path from container.xml
    let container = read_archive_file_bytes(&mut archive, "META-INF/container.xml")?;
    let opf_path = parse_container_xml(&container)?;
    let opf_dir = parent_dir(&opf_path).to_string();

    // 2. Parse the OPF file
    let opf_bytes = read_archive_file_bytes(&mut archive, &opf_path)?;
    let opf = parse_opf(&decode_text(strip_bom(&opf_bytes), None))?;
    let package_path = |href: &str| resolve_path(&opf_dir, href);

    // 3. Native outline: EPUB 3 nav first, NCX as fallback
    let nav_path = opf.nav().map(|item| package_path(&item.href));
    let outline = read_outline(&mut archive, &opf, nav_path.as_deref(), &package_path);

    // 4. Chapters in reading order
    let mut chapters = Vec::new();
    let mut used_ids = HashSet::new();
    for (order, href) in reading_order(&opf, nav_path.as_deref(), &package_path)
        .into_iter()
        .enumerate()
    {
        let bytes = match read_archive_file_bytes(&mut archive, &href) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("skipping chapter {href}: {e}");
                continue;
            }
        };
        let tree = parse_html_bytes(&bytes);
        let kind = if nav_path.as_deref() == Some(href.as_str()) {
            ChapterKind::Contents
        } else {
            ChapterKind::detect(&href, &tree, config)
        };
        let id = unique_chapter_id(&href, &mut used_ids);
        debug!("chapter {id} ({href}): {kind:?}");
        chapters.push(ChapterDocument::new(id, order, tree).with_href(href).with_kind(kind));
    }
    if chapters.is_empty() {
        return Err(Error::InvalidEpub("package has no readable content documents".into()));
    }

    // 5. Images, in manifest order so output names are stable
    let mut assets = AssetSet::new();
    for item in opf.manifest.iter().filter(|item| item.is_image()) {
        let path = package_path(&item.href);
        match read_archive_file_bytes(&mut archive, &path) {
            Ok(data) => {
                assets.insert_image(path, item.media_type.clone(), data);
            }
            Err(e) => warn!("skipping image {path}: {e}"),
        }
    }

    debug!(
        "read {} chapters, {} outline entries, {} images",
        chapters.len(),
        outline.len(),
        assets.len()
    );

    Ok(ConversionInput::new(chapters, opf.metadata)
        .with_outline(outline)
        .with_assets(assets))
}

/// Spine documents, then manifest documents the spine leaves out (never the nav document).
fn reading_order(
    opf: &OpfData,
    nav_path: Option<&str>,
    package_path: &impl Fn(&str) -> String,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();

    let spine = opf.spine_ids.iter().filter_map(|id| opf.item(id));
    for item in spine.filter(|item| item.is_document()) {
        let path = package_path(&item.href);
        if seen.insert(path.clone()) {
            order.push(path);
        }
    }

    for item in opf.manifest.iter().filter(|item| item.is_document()) {
        let path = package_path(&item.href);
        if Some(path.as_str()) != nav_path && seen.insert(path.clone()) {
            order.push(path);
        }
    }

    order
}

fn read_outline<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    opf: &OpfData,
    nav_path: Option<&str>,
    package_path: &impl Fn(&str) -> String,
) -> Vec<OutlineEntry> {
    if let Some(nav_path) = nav_path {
        let parsed = read_archive_file_bytes(archive, nav_path)
            .and_then(|bytes| parse_nav(&decode_text(strip_bom(&bytes), None)));
        match parsed {
            Ok(entries) if !entries.is_empty() => return resolve_hrefs(entries, parent_dir(nav_path)),
            Ok(_) => debug!("nav document {nav_path} has no toc list"),
            Err(e) => warn!("ignoring unreadable nav document {nav_path}: {e}"),
        }
    }

    if let Some(item) = opf.ncx() {
        let ncx_path = package_path(&item.href);
        let parsed = read_archive_file_bytes(archive, &ncx_path)
            .and_then(|bytes| parse_ncx(&decode_text(strip_bom(&bytes), None)));
        match parsed {
            Ok(entries) => return resolve_hrefs(entries, parent_dir(&ncx_path)),
            Err(e) => warn!("ignoring unreadable NCX {ncx_path}: {e}"),
        }
    }

    Vec::new()
}

/// Rewrite outline hrefs from document-relative to package paths, keeping fragments.
fn resolve_hrefs(entries: Vec<OutlineEntry>, base_dir: &str) -> Vec<OutlineEntry> {
    entries
        .into_iter()
        .map(|entry| {
            let (path, fragment) = split_fragment(&entry.href);
            let mut href = resolve_path(base_dir, path);
            if let Some(fragment) = fragment {
                href.push('#');
                href.push_str(fragment);
            }
            OutlineEntry {
                title: entry.title,
                href,
                children: resolve_hrefs(entry.children, base_dir),
            }
        })
        .collect()
}

/// Chapter id from the file stem, made unique with a numeric suffix.
fn unique_chapter_id(href: &str, used: &mut HashSet<String>) -> String {
    let name = file_name(href);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let base = if stem.trim().is_empty() { "chapter" } else { stem };

    let mut id = base.to_string();
    let mut n = 1;
    while !used.insert(id.clone()) {
        id = format!("{base}-{n}");
        n += 1;
    }
    id
}

fn read_archive_file_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    // Try direct lookup first
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Manifest hrefs are decoded by resolve_path; some archives store the encoded name
    let encoded = percent_encoding::utf8_percent_encode(path, PATH_ENCODE_SET).to_string();
    let mut file = archive.by_name(&encoded)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

const PATH_ENCODE_SET: &percent_encoding::AsciiSet =
    &percent_encoding::CONTROLS.add(b' ').add(b'"').add(b'%').add(b'#');
