//! Checkpoint port - Persistent record of an unfinished run

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{RunId, WorkItemId};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;

use crate::error::ApplicationError;

/// Contents of the checkpoint of an unfinished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointState {
    /// Run that created the checkpoint
    pub run_id: RunId,
    /// When that run started
    pub started_at: DateTime<Utc>,
    /// Items recorded as completed
    pub completed: BTreeSet<WorkItemId>,
}

impl CheckpointState {
    /// Fresh state for a new run
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            completed: BTreeSet::new(),
        }
    }
}

/// Port for the checkpoint store
///
/// The checkpoint exists exactly while a run is active or unfinished.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CheckpointPort: Send + Sync {
    /// Read the checkpoint without modifying it
    async fn load(&self) -> Result<Option<CheckpointState>, ApplicationError>;

    /// Acquire the checkpoint: create it if absent, keep it if present
    ///
    /// Returns the state the run continues from.
    async fn begin(&self, run_id: RunId) -> Result<CheckpointState, ApplicationError>;

    /// Append a completed item
    async fn record_completed(&self, id: &WorkItemId) -> Result<(), ApplicationError>;

    /// Delete the checkpoint after a clean run
    async fn release(&self) -> Result<(), ApplicationError>;
}
