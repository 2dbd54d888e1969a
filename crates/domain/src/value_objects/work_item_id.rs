//! Work item identifier derived from the source file stem

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::natural_order::natural_cmp;

/// Identifier of a work item: the file stem of its source text
///
/// Ordering is natural (numeric-aware), so sets and maps of ids iterate in
/// the same order the catalog presents them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(String);

impl WorkItemId {
    /// Create an id from a raw stem
    ///
    /// # Errors
    /// Returns an error if the stem is empty or contains a path separator
    pub fn new(stem: impl Into<String>) -> Result<Self, DomainError> {
        let stem = stem.into();
        if stem.trim().is_empty() {
            return Err(DomainError::InvalidWorkItem("empty id".to_string()));
        }
        if stem.contains(['/', '\\']) {
            return Err(DomainError::InvalidWorkItem(format!(
                "id must not contain a path separator: {stem}"
            )));
        }
        Ok(Self(stem))
    }

    /// Derive the id from a source file path
    ///
    /// # Errors
    /// Returns an error if the path has no UTF-8 file stem
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
            DomainError::InvalidWorkItem(format!("no usable file stem: {}", path.display()))
        })?;
        Self::new(stem)
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for WorkItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for WorkItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
