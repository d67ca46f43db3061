//! Document assembly.
//!
//! Sequences rendered chapters in reading order behind the front matter,
//! the title and the generated outline, then normalizes whitespace.

use std::collections::BTreeSet;

use log::debug;

use crate::config::ConversionOptions;
use crate::error::{Error, RenderWarning, Result};
use crate::markdown::{RenderContext, escape_markdown};
use crate::model::{AssetSet, ChapterDocument, ChapterKind, Metadata};
use crate::outline::{ChapterHeadings, Outline, render_outline};

/// Separator between consecutive chapters.
const CHAPTER_SEPARATOR: &str = "---";

/// Output of one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionResult {
    /// The complete Markdown document.
    pub markdown: String,
    /// Distinct assets referenced by the document.
    pub image_count: usize,
    /// Classified headings consumed into the outline.
    pub heading_count: usize,
    /// Recoverable problems, in the order they were found.
    pub warnings: Vec<RenderWarning>,
}

/// Assembles rendered chapters into the final document.
pub struct Assembler<'a> {
    metadata: &'a Metadata,
    assets: &'a AssetSet,
    options: ConversionOptions,
}

impl<'a> Assembler<'a> {
    pub fn new(metadata: &'a Metadata, assets: &'a AssetSet, options: ConversionOptions) -> Self {
        Self {
            metadata,
            assets,
            options,
        }
    }

    /// Assemble the document.
    ///
    /// `chapters` must be in reading order, with `headings[i]` found in
    /// `chapters[i]`.
    pub fn assemble(
        &self,
        chapters: &[&ChapterDocument],
        headings: &[ChapterHeadings],
        outline: &Outline,
    ) -> Result<ConversionResult> {
        self.assemble_with(chapters, headings, outline, |_, _| Ok(()))
    }

    /// Assemble the document, calling `after_chapter` once per chapter.
    ///
    /// An error returned by the callback aborts assembly and is returned
    /// unchanged.
    pub fn assemble_with<F>(
        &self,
        chapters: &[&ChapterDocument],
        headings: &[ChapterHeadings],
        outline: &Outline,
        mut after_chapter: F,
    ) -> Result<ConversionResult>
    where
        F: FnMut(usize, &ChapterDocument) -> Result<()>,
    {
        let mut blocks = Vec::new();

        let front_matter = front_matter(self.metadata)?;
        if !front_matter.is_empty() {
            blocks.push(front_matter);
        }

        if let Some(title) = self.metadata.title.as_deref() {
            let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
            if !title.is_empty() {
                blocks.push(format!("# {}", escape_markdown(&title)));
            }
        }

        if !outline.is_empty() {
            let heading = if self.metadata.is_chinese() {
                "## 目录"
            } else {
                "## Contents"
            };
            blocks.push(format!("{heading}\n\n{}", render_outline(&outline.entries)));
            blocks.push(CHAPTER_SEPARATOR.to_string());
        }

        let mut warnings = Vec::new();
        let mut images = BTreeSet::new();
        let mut rendered_chapters = Vec::new();

        for (index, &chapter) in chapters.iter().enumerate() {
            let chapter_headings = headings.get(index);
            if let Some(found) = chapter_headings {
                warnings.extend(found.warnings.iter().cloned());
            }

            if chapter.kind == ChapterKind::Contents {
                debug!("skipping contents page {}", chapter.id);
            } else {
                let mut context = RenderContext::new(&chapter.tree, &chapter.id)
                    .with_href(&chapter.href);
                if let Some(found) = chapter_headings {
                    context = context.with_headings(&found.candidates);
                }
                if let Some(targets) = outline.targets(&chapter.id) {
                    context = context.with_targets(targets);
                }
                if self.options.extract_images {
                    context = context.with_assets(self.assets);
                }

                let result = context.render();
                debug!(
                    "rendered chapter {} ({} bytes, {} warnings)",
                    chapter.id,
                    result.content.len(),
                    result.warnings.len()
                );
                warnings.extend(result.warnings);
                if !result.content.trim().is_empty() {
                    images.extend(result.images);
                    rendered_chapters.push(result.content);
                }
            }

            after_chapter(index, chapter)?;
        }

        for warning in &warnings {
            debug!("{warning}");
        }

        for (i, content) in rendered_chapters.into_iter().enumerate() {
            if i > 0 {
                blocks.push(CHAPTER_SEPARATOR.to_string());
            }
            blocks.push(content);
        }

        Ok(ConversionResult {
            markdown: cleanup(&blocks.join("\n\n")),
            image_count: images.len(),
            heading_count: outline.heading_count,
            warnings,
        })
    }
}

/// YAML front matter for the present metadata fields, or `""` when there are none.
pub fn front_matter(metadata: &Metadata) -> Result<String> {
    let fields = metadata.fields();
    if fields.is_empty() {
        return Ok(String::new());
    }

    let mut yaml = String::from("---\n");
    for (key, value) in fields {
        yaml.push_str(key);
        yaml.push_str(": \"");
        yaml.push_str(&yaml_escape(key, value)?);
        yaml.push_str("\"\n");
    }
    yaml.push_str("---");
    Ok(yaml)
}

/// Escape a value for a YAML double-quoted scalar.
fn yaml_escape(key: &str, value: &str) -> Result<String> {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\0' | '\u{FFFE}' | '\u{FFFF}' => {
                return Err(Error::assembly(format!(
                    "metadata field '{key}' contains U+{:04X}, which front matter cannot represent",
                    c as u32
                )));
            }
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\x{:02X}", c as u32)),
            c => escaped.push(c),
        }
    }
    Ok(escaped)
}

/// Normalize whitespace across the document.
///
/// Trailing whitespace is stripped from every line; runs of blank lines
/// collapse to one, except inside fenced code blocks; leading and trailing
/// blank lines are dropped and the result ends with a single newline.
/// Applying it twice gives the same result as applying it once.
pub fn cleanup(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut open_fence: Option<(char, usize)> = None;
    let mut previous_blank = false;

    for line in text.lines() {
        let line = line.trim_end();

        if let Some((fence_char, fence_len)) = open_fence {
            lines.push(line);
            if is_closing_fence(line, fence_char, fence_len) {
                open_fence = None;
            }
            previous_blank = false;
            continue;
        }

        if line.is_empty() {
            if previous_blank || lines.is_empty() {
                continue;
            }
            previous_blank = true;
        } else {
            previous_blank = false;
            open_fence = fence_opening(line);
        }
        lines.push(line);
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }

    let mut result = lines.join("\n");
    result.push('\n');
    result
}

/// Strip blockquote markers and indentation in front of a possible fence.
fn fence_candidate(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '>' || c == ' ')
}

fn fence_opening(line: &str) -> Option<(char, usize)> {
    let candidate = fence_candidate(line);
    let fence_char = candidate.chars().next().filter(|&c| c == '`' || c == '~')?;
    let len = candidate.chars().take_while(|&c| c == fence_char).count();
    // A backtick fence's info string cannot hold a backtick: that line is inline code.
    let info = &candidate[len * fence_char.len_utf8()..];
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    (len >= 3).then_some((fence_char, len))
}

fn is_closing_fence(line: &str, fence_char: char, fence_len: usize) -> bool {
    let candidate = fence_candidate(line);
    let len = candidate.chars().take_while(|&c| c == fence_char).count();
    len >= fence_len && candidate[len * fence_char.len_utf8()..].trim().is_empty()
}
