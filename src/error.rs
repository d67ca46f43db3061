//! Error types for epub2md operations.
//!
//! Fatal problems are reported through [`Error`] and abort the whole run.
//! Recoverable problems found while rendering are collected as
//! [`RenderWarning`]s and returned alongside a successful result.

use thiserror::Error;

/// Errors that abort a conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// The supplied chapters, outline, metadata or assets are structurally invalid.
    #[error("load error{}: {message}", chapter_suffix(.chapter))]
    Load {
        chapter: Option<String>,
        message: String,
    },

    /// The final document could not be assembled.
    #[error("assembly error: {message}")]
    Assembly { message: String },

    #[error("conversion cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Build a load error attributed to a chapter.
    pub fn load(chapter: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Load {
            chapter: Some(chapter.into()),
            message: message.into(),
        }
    }

    /// Build a load error that is not tied to a chapter.
    pub fn load_input(message: impl Into<String>) -> Self {
        Error::Load {
            chapter: None,
            message: message.into(),
        }
    }

    /// Build an assembly error.
    pub fn assembly(message: impl Into<String>) -> Self {
        Error::Assembly {
            message: message.into(),
        }
    }

    /// The chapter the error occurred in, if known.
    pub fn chapter(&self) -> Option<&str> {
        match self {
            Error::Load { chapter, .. } => chapter.as_deref(),
            _ => None,
        }
    }
}

fn chapter_suffix(chapter: &Option<String>) -> String {
    match chapter {
        Some(id) => format!(" in chapter '{id}'"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable problems found while rendering.
///
/// The renderer falls back to a pass-through or unrewritten rendering and
/// records one of these; the run still succeeds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderWarning {
    #[error("chapter '{chapter}': image '{reference}' is not in the asset set, keeping original path")]
    MissingAsset { chapter: String, reference: String },

    #[error("chapter '{chapter}': {construct} is not supported here, rendered as plain content")]
    NestedConstruct { chapter: String, construct: String },

    #[error("chapter '{chapter}': heading heuristics stopped after {count} matches")]
    AmbiguousHeadings { chapter: String, count: usize },
}
