//! Package document parsing: container.xml, OPF, NCX and the EPUB 3 nav document.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::model::{Metadata, OutlineEntry};
use crate::util::strip_bom;

/// One `<item>` of the OPF manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Href relative to the OPF file.
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    /// XHTML or HTML content document.
    pub fn is_document(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "application/xhtml+xml" | "text/html" | "application/xml"
        )
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Parsed OPF package data.
#[derive(Debug, Clone, Default)]
pub struct OpfData {
    pub metadata: Metadata,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    pub spine_ids: Vec<String>,
    /// Manifest id named by `<spine toc="...">` (EPUB 2 NCX).
    pub toc_id: Option<String>,
}

impl OpfData {
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// The NCX document, from the spine's `toc` attribute or its media type.
    pub fn ncx(&self) -> Option<&ManifestItem> {
        self.toc_id
            .as_deref()
            .and_then(|id| self.item(id))
            .or_else(|| {
                self.manifest
                    .iter()
                    .find(|item| item.media_type == "application/x-dtbncx+xml")
            })
    }

    /// The EPUB 3 navigation document.
    pub fn nav(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.has_property("nav"))
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

/// Parse the OPF package document.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut opf = OpfData::default();
    let mut in_metadata = false;
    let mut current_element: Option<Vec<u8>> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    local @ (b"title" | b"creator" | b"language" | b"publisher" | b"description")
                        if in_metadata =>
                    {
                        current_element = Some(local.to_vec());
                        buf_text.clear();
                    }
                    b"spine" => opf.toc_id = attribute(&e, b"toc")?,
                    b"item" => opf.manifest.extend(manifest_item(&e)?),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => opf.manifest.extend(manifest_item(&e)?),
                    b"itemref" => opf.spine_ids.extend(attribute(&e, b"idref")?),
                    b"spine" => opf.toc_id = attribute(&e, b"toc")?,
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }

                if current_element.as_deref() == Some(local) {
                    let value = buf_text.trim().to_string();
                    let metadata = &mut opf.metadata;
                    // First occurrence wins, so the primary creator becomes the author.
                    let slot = match local {
                        b"title" => &mut metadata.title,
                        b"creator" => &mut metadata.author,
                        b"language" => &mut metadata.language,
                        b"publisher" => &mut metadata.publisher,
                        _ => &mut metadata.description,
                    };
                    if slot.is_none() && !value.is_empty() {
                        *slot = Some(value);
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(opf)
}

/// Parse an NCX `navMap` into outline entries. Hrefs are returned as written.
pub fn parse_ncx(content: &str) -> Result<Vec<OutlineEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    #[derive(Default)]
    struct NavPointState {
        children: Vec<OutlineEntry>,
        text: String,
        src: Option<String>,
    }

    let mut stack = vec![NavPointState::default()];
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(NavPointState::default()),
                b"text" => in_text = true,
                b"content" => {
                    if let Some(src) = attribute(&e, b"src")?
                        && let Some(state) = stack.last_mut()
                    {
                        state.src = Some(src);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content"
                    && let Some(src) = attribute(&e, b"src")?
                    && let Some(state) = stack.last_mut()
                {
                    state.src = Some(src);
                }
            }
            Event::Text(e) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text
                    && let Some(state) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    state.text.push_str(&resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navPoint" if stack.len() > 1 => {
                    if let Some(state) = stack.pop()
                        && let Some(parent) = stack.last_mut()
                    {
                        push_entry(&mut parent.children, state.text, state.src, state.children);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stack.into_iter().next().map(|s| s.children).unwrap_or_default())
}

/// Parse the `<nav epub:type="toc">` list of an EPUB 3 navigation document.
///
/// Hrefs are returned as written. Other `nav` elements (landmarks, page
/// lists) are ignored.
pub fn parse_nav(content: &str) -> Result<Vec<OutlineEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    #[derive(Default)]
    struct ItemState {
        children: Vec<OutlineEntry>,
        text: String,
        href: Option<String>,
    }

    let mut roots = Vec::new();
    let mut stack: Vec<ItemState> = Vec::new();
    let mut nav_depth = 0usize;
    let mut label_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"nav" {
                    if nav_depth > 0 {
                        nav_depth += 1;
                    } else if attribute(&e, b"type")?
                        .is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "toc"))
                    {
                        nav_depth = 1;
                    }
                    continue;
                }
                if nav_depth == 0 {
                    continue;
                }
                match local {
                    b"li" => stack.push(ItemState::default()),
                    b"a" | b"span" if !stack.is_empty() => {
                        label_depth += 1;
                        if local == b"a"
                            && let Some(href) = attribute(&e, b"href")?
                            && let Some(item) = stack.last_mut()
                            && item.href.is_none()
                        {
                            item.href = Some(href);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if nav_depth > 0
                    && label_depth > 0
                    && let Some(item) = stack.last_mut()
                {
                    item.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if nav_depth > 0
                    && label_depth > 0
                    && let Some(item) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    item.text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                if nav_depth == 0 {
                    continue;
                }
                match local_name(e.name().as_ref()) {
                    b"nav" => {
                        nav_depth -= 1;
                        if nav_depth == 0 {
                            break;
                        }
                    }
                    b"a" | b"span" if label_depth > 0 => label_depth -= 1,
                    b"li" => {
                        if let Some(item) = stack.pop() {
                            let siblings = match stack.last_mut() {
                                Some(parent) => &mut parent.children,
                                None => &mut roots,
                            };
                            push_entry(siblings, item.text, item.href, item.children);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(roots)
}

/// Append an entry; an entry without a target hands its children to its parent.
fn push_entry(
    siblings: &mut Vec<OutlineEntry>,
    text: String,
    href: Option<String>,
    children: Vec<OutlineEntry>,
) {
    let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match href.filter(|h| !h.trim().is_empty()) {
        Some(href) if !title.is_empty() => siblings.push(OutlineEntry {
            title,
            href,
            children,
        }),
        _ => siblings.extend(children),
    }
}

fn manifest_item(e: &BytesStart<'_>) -> Result<Option<ManifestItem>> {
    let mut item = ManifestItem {
        id: String::new(),
        href: String::new(),
        media_type: String::new(),
        properties: Vec::new(),
    };

    for attr in e.attributes().flatten() {
        let value = unescape_attribute(&String::from_utf8(attr.value.to_vec())?);
        match attr.key.as_ref() {
            b"id" => item.id = value,
            b"href" => item.href = value,
            b"media-type" => item.media_type = value.to_ascii_lowercase(),
            b"properties" => {
                item.properties = value.split_ascii_whitespace().map(String::from).collect()
            }
            _ => {}
        }
    }

    Ok((!item.id.is_empty() && !item.href.is_empty()).then_some(item))
}

/// Value of the attribute whose local name is `key`, unescaped.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == key {
            let raw = String::from_utf8(attr.value.to_vec())?;
            return Ok(Some(unescape_attribute(&raw)));
        }
    }
    Ok(None)
}

fn unescape_attribute(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(';').and_then(|end| Some((end, resolve_entity(&after[..end])?))) {
            Some((end, resolved)) => {
                out.push_str(&resolved);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references, plus the `nbsp` that XHTML nav documents use.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => entity.strip_prefix('#')?.parse().ok()?,
    };
    char::from_u32(code).map(|c| c.to_string())
}
