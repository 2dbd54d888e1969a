//! Work item entity - One text-to-audio conversion and its lifecycle

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::WorkItemId;

/// Lifecycle state of a work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum WorkStatus {
    /// Waiting to be dispatched
    #[default]
    Pending,
    /// Conversion in flight
    InProgress,
    /// Output written and validated
    Succeeded,
    /// Conversion failed
    Failed {
        /// Why the conversion failed
        reason: String,
    },
}

impl WorkStatus {
    /// Check if this is a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }

    /// Get a lowercase label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single source text to be converted into an audio file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    id: WorkItemId,
    source_path: PathBuf,
    output_path: PathBuf,
    status: WorkStatus,
    attempts: u32,
}

impl WorkItem {
    /// Maximum conversion attempts per item within one run
    pub const MAX_ATTEMPTS: u32 = 2;

    /// Create a pending work item
    ///
    /// The output path is `output_dir/<id>.<audio_extension>`.
    ///
    /// # Errors
    /// Returns an error if the source path has no usable file stem
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_dir: &Path,
        audio_extension: &str,
    ) -> Result<Self, DomainError> {
        let source_path = source_path.into();
        let id = WorkItemId::from_path(&source_path)?;
        let output_path = Self::output_path_for(&id, output_dir, audio_extension);

        Ok(Self {
            id,
            source_path,
            output_path,
            status: WorkStatus::Pending,
            attempts: 0,
        })
    }

    /// Deterministic output location for an id
    #[must_use]
    pub fn output_path_for(id: &WorkItemId, output_dir: &Path, audio_extension: &str) -> PathBuf {
        output_dir.join(format!("{id}.{audio_extension}"))
    }

    /// Item identifier
    pub const fn id(&self) -> &WorkItemId {
        &self.id
    }

    /// Path of the source text
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Path the audio is written to
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Current status
    pub const fn status(&self) -> &WorkStatus {
        &self.status
    }

    /// Number of conversion attempts started so far
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the item finished successfully
    pub const fn is_succeeded(&self) -> bool {
        matches!(self.status, WorkStatus::Succeeded)
    }

    /// Failure reason, if the item failed
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            WorkStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Whether a failed item may be retried once more
    pub const fn can_retry(&self) -> bool {
        matches!(self.status, WorkStatus::Failed { .. }) && self.attempts < Self::MAX_ATTEMPTS
    }

    /// Dispatch the item: Pending -> InProgress
    ///
    /// # Errors
    /// Returns an error if the item is not pending
    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.status != WorkStatus::Pending {
            return Err(DomainError::illegal_transition(
                self.id.as_str(),
                &self.status,
                "in_progress",
            ));
        }
        self.status = WorkStatus::InProgress;
        self.attempts += 1;
        Ok(())
    }

    /// Record success: InProgress -> Succeeded
    ///
    /// # Errors
    /// Returns an error if the item is not in progress
    pub fn succeed(&mut self) -> Result<(), DomainError> {
        self.ensure_in_progress("succeeded")?;
        self.status = WorkStatus::Succeeded;
        Ok(())
    }

    /// Record failure: InProgress -> Failed
    ///
    /// # Errors
    /// Returns an error if the item is not in progress
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_in_progress("failed")?;
        self.status = WorkStatus::Failed {
            reason: reason.into(),
        };
        Ok(())
    }

    /// Re-arm a failed item for its single retry: Failed -> Pending
    ///
    /// # Errors
    /// Returns an error if the item has not failed or has used up its attempts
    pub fn reset_for_retry(&mut self) -> Result<(), DomainError> {
        if !self.can_retry() {
            return Err(DomainError::illegal_transition(
                self.id.as_str(),
                &self.status,
                "pending",
            ));
        }
        self.status = WorkStatus::Pending;
        Ok(())
    }

    fn ensure_in_progress(&self, to: &'static str) -> Result<(), DomainError> {
        if self.status == WorkStatus::InProgress {
            Ok(())
        } else {
            Err(DomainError::illegal_transition(
                self.id.as_str(),
                &self.status,
                to,
            ))
        }
    }
}
