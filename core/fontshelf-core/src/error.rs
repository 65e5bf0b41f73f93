//! Error taxonomy for fontshelf-core (made by FontLab https://www.fontlab.com/)

use std::path::PathBuf;

use thiserror::Error;

/// Failures the catalog and install pipelines distinguish.
///
/// Everything here is scoped to a single face or file. The pipelines catch
/// these, record them against the file, and keep going.
#[derive(Debug, Error)]
pub enum ShelfError {
    /// The face could not be read: no family name, truncated container, bad sfnt.
    #[error("parse error: {0}")]
    Parse(String),

    /// Two version strings could not be ordered.
    #[error("version compare error: {candidate} / {existing}")]
    VersionCompare { candidate: String, existing: String },

    /// The subtitle bytes are in an encoding we cannot identify or decode.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The subtitle script breaks the section/format grammar.
    #[error("malformed script at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// A link could not be inspected or created.
    #[error("link error at {}: {source}", target.display())]
    Link {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An invariant of our own construction was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShelfError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        ShelfError::Malformed {
            line,
            message: message.into(),
        }
    }
}

pub type ShelfResult<T> = std::result::Result<T, ShelfError>;
