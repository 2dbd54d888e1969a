//! Application-level errors

use std::path::PathBuf;

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
///
/// Per-item conversion problems are not errors at this level; they are
/// recorded as [`crate::services::ConversionFailure`] data on the item.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input directory does not exist
    #[error("Input directory not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// No convertible files in the input directory
    #[error("No matching text files in {}", .0.display())]
    EmptyCatalog(PathBuf),

    /// Checkpoint ledger could not be read or written
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Filesystem error outside of a single item
    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// External service error
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Build a filesystem error from an I/O error
    pub fn filesystem(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether the error stems from how the run was configured
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::MissingInput(_))
    }
}
