//! Shared error mapping for the file-based persistence layer

use std::path::Path;

use application::error::ApplicationError;

/// Map an I/O error on the ledger to an application-layer error
pub fn map_io_error(path: &Path, e: &std::io::Error) -> ApplicationError {
    ApplicationError::Checkpoint(format!("{}: {e}", path.display()))
}

/// Map a serialization error to an application-layer error
pub fn map_json_error(path: &Path, e: &serde_json::Error) -> ApplicationError {
    ApplicationError::Checkpoint(format!("{}: malformed entry: {e}", path.display()))
}
