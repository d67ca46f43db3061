//! Slug generation for heading anchors.

/// Generate a GitHub-style slug from text.
///
/// Lowercases, replaces whitespace, `-` and `_` with single hyphens and
/// drops punctuation. Non-ASCII letters and digits are kept so CJK titles
/// still produce usable anchors.
///
/// # Examples
///
/// ```
/// use epub2md::markdown::slugify;
///
/// assert_eq!(slugify("Chapter One"), "chapter-one");
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("（一）概述"), "一概述");
/// ```
pub fn slugify(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_lowercase().next().unwrap_or(c))
            } else if c.is_whitespace() || c == '-' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
