//! Conversion options and heading heuristics.

/// Directory (relative to the Markdown file) that extracted images land in.
pub const IMAGE_DIR: &str = "images";

/// Runtime options for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Rewrite image references to extracted assets and write the asset bytes.
    pub extract_images: bool,
    /// Generate an outline (table of contents) at the top of the document.
    pub generate_toc: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            extract_images: true,
            generate_toc: true,
        }
    }
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extract_images(mut self, extract_images: bool) -> Self {
        self.extract_images = extract_images;
        self
    }

    pub fn with_generate_toc(mut self, generate_toc: bool) -> Self {
        self.generate_toc = generate_toc;
        self
    }
}

/// Tunable thresholds for the heading classifier and chapter detection.
///
/// The defaults were picked empirically on Chinese and English trade
/// ebooks; they only need to separate "short title-like text" from body
/// text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicConfig {
    /// Text at or above this many characters is never a heuristic heading.
    pub max_title_chars: usize,
    /// Class-name fragments that mark an element as bold or title-like.
    pub heading_class_keywords: Vec<String>,
    /// Titles of front-matter pages that are never headings.
    pub excluded_titles: Vec<String>,
    /// Heuristic matches allowed per chapter before the rules back off.
    pub max_heuristic_headings: usize,
    /// A document linking to more than this many other documents is a
    /// table-of-contents page.
    pub toc_page_link_threshold: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            max_title_chars: 40,
            heading_class_keywords: ["bold", "title", "heading", "chapter"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_titles: [
                "版权信息",
                "目录",
                "封面",
                "扉页",
                "Contents",
                "Table of Contents",
                "Copyright",
                "Cover",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_heuristic_headings: 50,
            toc_page_link_threshold: 10,
        }
    }
}

impl HeuristicConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_title_chars(mut self, max_title_chars: usize) -> Self {
        self.max_title_chars = max_title_chars;
        self
    }

    pub fn with_heading_class(mut self, keyword: impl Into<String>) -> Self {
        self.heading_class_keywords.push(keyword.into());
        self
    }

    pub fn with_excluded_title(mut self, title: impl Into<String>) -> Self {
        self.excluded_titles.push(title.into());
        self
    }

    pub fn with_max_heuristic_headings(mut self, max: usize) -> Self {
        self.max_heuristic_headings = max;
        self
    }

    pub fn with_toc_page_link_threshold(mut self, threshold: usize) -> Self {
        self.toc_page_link_threshold = threshold;
        self
    }

    /// Whether a class attribute value contains a heading-like class name.
    pub fn is_heading_class(&self, class_attr: &str) -> bool {
        class_attr.split_ascii_whitespace().any(|class| {
            let class = class.to_ascii_lowercase();
            self.heading_class_keywords
                .iter()
                .any(|keyword| class.contains(keyword.as_str()))
        })
    }

    /// Whether a normalized title names a front-matter page.
    pub fn is_excluded_title(&self, text: &str) -> bool {
        self.excluded_titles
            .iter()
            .any(|title| title.eq_ignore_ascii_case(text))
    }
}
