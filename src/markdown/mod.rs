//! Pure markdown generation from content trees.
//!
//! - `escape`: Pure string transformation utilities for Markdown escaping
//! - `slugify`: Slug generation for heading anchors
//! - `render`: Core tree → Markdown rendering
//!
//! Nothing here touches the filesystem; the pipeline decides where the
//! output goes.
//!
//! ## Design Notes
//!
//! - **Text escaping**: Special Markdown characters (`*`, `_`, `[`, `` ` ``, etc.)
//!   are escaped to prevent unintended formatting
//! - **Tight/loose list detection**: Lists with single-paragraph items render
//!   without blank lines between items (tight), while lists with multiple blocks
//!   per item get blank line separation (loose)
//! - **Dynamic code fence length**: Code blocks use the minimum fence length
//!   that doesn't conflict with content
//! - **Whitespace around inline markup**: Leading and trailing spaces inside
//!   `<b>`, `<i>`, ... are moved outside the delimiters

mod escape;
mod render;
mod slugify;

pub use escape::{
    calculate_fence_length, calculate_inline_code_ticks, escape_line_start, escape_markdown,
    escape_table_cell,
};
pub use render::{RenderContext, RenderResult, render_tree};
pub use slugify::slugify;
