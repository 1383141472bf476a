use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that abort an operation on a synctex file.
///
/// Recoverable problems (a single skipped record, a dropped sheet) do not
/// surface here; they accumulate as [`Diagnostic`]s on the scanner.
#[derive(Debug, Error)]
pub enum Error {
    /// No readable synctex candidate was found for the output file.
    #[error("no synctex file found for {output:?}")]
    NotFound { output: String },

    /// A record violated the line grammar and line-oriented recovery was
    /// not possible.
    #[error("malformed record at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// A node references a tag absent from the input table.
    #[error("tag {tag} does not resolve in the input table")]
    UnresolvedTag { tag: i32 },

    /// A closing record did not match the innermost open box.
    #[error("structural mismatch at byte {offset}: expected {expected}, found {found}")]
    StructuralMismatch {
        offset: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// The file declares a format version this parser does not speak.
    #[error("unsupported synctex version {version}")]
    Unsupported { version: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A recoverable problem met while parsing.
///
/// The scanner keeps parsing past these; callers that care (the `update`
/// workflow, editors surfacing sync quality) can inspect them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Byte offset of the offending record in the decoded stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            offset,
        }
    }

    pub fn error(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            offset,
        }
    }
}
