//! Markdown escaping utilities.
//!
//! These functions handle escaping special Markdown characters and calculating
//! appropriate fence/tick lengths for code blocks and inline code.

/// Escape special Markdown characters in text.
///
/// Escapes characters that have special meaning in Markdown:
/// - Backslash: `\\`
/// - Emphasis: `*`, `_`, `~`
/// - Links: `[`, `]`
/// - Code: `` ` ``
/// - Headings: `#` (only at line start)
/// - Tables: `|`
/// - HTML: `<`, `>`
/// - Images: `!` (when followed by `[`)
///
/// # Examples
///
/// ```
/// use epub2md::markdown::escape_markdown;
///
/// assert_eq!(escape_markdown("*bold*"), "\\*bold\\*");
/// assert_eq!(escape_markdown("[link]"), "\\[link\\]");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 10);
    let mut chars = text.chars().peekable();
    let mut at_line_start = true;

    while let Some(c) = chars.next() {
        match c {
            '\\' => result.push_str("\\\\"),
            '*' | '_' | '~' | '[' | ']' | '`' | '|' | '<' | '>' => {
                result.push('\\');
                result.push(c);
            }
            '#' if at_line_start => {
                result.push('\\');
                result.push(c);
            }
            '!' if chars.peek() == Some(&'[') => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
        at_line_start = c == '\n';
    }

    result
}

/// Escape a block marker at the start of a line of already-escaped text.
///
/// Text that opens a line could otherwise be read as a list item (`- `,
/// `+ `, `1. `, `1) `), a thematic break (`---`) or a setext underline
/// (`===`, `--`).
///
/// # Examples
///
/// ```
/// use epub2md::markdown::escape_line_start;
///
/// assert_eq!(escape_line_start("- not a list"), "\\- not a list");
/// assert_eq!(escape_line_start("1. Not a list"), "1\\. Not a list");
/// assert_eq!(escape_line_start("2024 was a year"), "2024 was a year");
/// ```
pub fn escape_line_start(text: &str) -> String {
    let Some(first) = text.chars().next() else {
        return String::new();
    };
    let rest = &text[first.len_utf8()..];
    let only_marker = |marker: char| rest.chars().all(|c| c == marker || c == ' ' || c == '\t');

    match first {
        '-' | '+' if rest.is_empty() || rest.starts_with([' ', '\t']) => format!("\\{text}"),
        '-' | '=' if only_marker(first) => format!("\\{text}"),
        '0'..='9' => {
            let digits = text.bytes().take_while(u8::is_ascii_digit).count();
            let tail = &text[digits..];
            let is_marker = digits <= 9
                && tail.starts_with(['.', ')'])
                && (tail.len() == 1 || tail[1..].starts_with([' ', '\t']));
            if is_marker {
                format!("{}\\{}", &text[..digits], tail)
            } else {
                text.to_string()
            }
        }
        _ => text.to_string(),
    }
}

/// Escape literal pipes so text can sit inside a table cell.
///
/// Pipes that are already backslash-escaped are left alone.
pub fn escape_table_cell(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        if c == '|' && !escaped {
            result.push('\\');
        }
        escaped = c == '\\' && !escaped;
        result.push(c);
    }
    result
}

/// Calculate the minimum fence length needed for a code block.
///
/// Returns the smallest number of fence characters (at least 3) that
/// is longer than every run of that character in the content.
///
/// # Examples
///
/// ```
/// use epub2md::markdown::calculate_fence_length;
///
/// // Normal content needs 3 backticks
/// assert_eq!(calculate_fence_length("let x = 1;", '`'), 3);
///
/// // Content with 3 backticks needs 4
/// assert_eq!(calculate_fence_length("```rust\ncode\n```", '`'), 4);
/// ```
pub fn calculate_fence_length(content: &str, fence_char: char) -> usize {
    longest_run(content, fence_char).max(2) + 1
}

/// Calculate the minimum backtick count needed for inline code.
///
/// Returns one more than the longest backtick run in the content.
///
/// # Examples
///
/// ```
/// use epub2md::markdown::calculate_inline_code_ticks;
///
/// assert_eq!(calculate_inline_code_ticks("code"), 1);
/// assert_eq!(calculate_inline_code_ticks("code with ` backtick"), 2);
/// ```
pub fn calculate_inline_code_ticks(content: &str) -> usize {
    longest_run(content, '`') + 1
}

fn longest_run(content: &str, target: char) -> usize {
    let mut max_run = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == target {
            current_run += 1;
            max_run = max_run.max(current_run);
        } else {
            current_run = 0;
        }
    }

    max_run
}
