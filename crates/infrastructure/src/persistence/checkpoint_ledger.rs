//! Append-only JSONL checkpoint ledger
//!
//! The first line records which run owns the ledger, every further line
//! records one completed item:
//!
//! ```text
//! {"entry":"run","run_id":"0192…","started_at":"2026-10-19T08:00:00Z"}
//! {"entry":"completed","id":"1"}
//! {"entry":"completed","id":"10"}
//! ```
//!
//! Resume is keyed by id, so reordering or adding input files between runs
//! never skips or repeats the wrong item. A torn final line left by a crash
//! is ignored on load. A ledger whose run entry is empty or unreadable still
//! marks an interrupted run; the next `begin` writes a new run entry.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use application::error::ApplicationError;
use application::ports::{CheckpointPort, CheckpointState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{RunId, WorkItemId};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::error::{map_io_error, map_json_error};

/// One line of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
enum LedgerEntry {
    Run {
        run_id: RunId,
        started_at: DateTime<Utc>,
    },
    Completed {
        id: WorkItemId,
    },
}

/// Parsed ledger contents
#[derive(Debug)]
struct Ledger {
    state: CheckpointState,
    // false when the run entry is missing or torn
    has_header: bool,
}

/// Checkpoint store backed by a JSONL file
#[derive(Debug)]
pub struct JsonlCheckpointStore {
    path: PathBuf,
    // serializes appends
    write_lock: Mutex<()>,
}

impl JsonlCheckpointStore {
    /// Create a store for the given ledger path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger location
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &LedgerEntry, create_new: bool) -> Result<(), ApplicationError> {
        let mut line = serde_json::to_string(entry).map_err(|e| map_json_error(&self.path, &e))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut options = OpenOptions::new();
        if create_new {
            options.write(true).create_new(true);
        } else {
            options.append(true);
        }

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| map_io_error(&self.path, &e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| map_io_error(&self.path, &e))?;
        file.sync_data()
            .await
            .map_err(|e| map_io_error(&self.path, &e))
    }

    /// Replace the ledger with a fresh header followed by the given completions
    async fn rewrite(&self, state: &CheckpointState) -> Result<(), ApplicationError> {
        let entries = std::iter::once(LedgerEntry::Run {
            run_id: state.run_id,
            started_at: state.started_at,
        })
        .chain(state.completed.iter().map(|id| LedgerEntry::Completed { id: id.clone() }));

        let mut contents = String::new();
        for entry in entries {
            let line = serde_json::to_string(&entry).map_err(|e| map_json_error(&self.path, &e))?;
            contents.push_str(&line);
            contents.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| map_io_error(&self.path, &e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| map_io_error(&self.path, &e))?;
        file.sync_data()
            .await
            .map_err(|e| map_io_error(&self.path, &e))
    }

    async fn read(&self) -> Result<Option<Ledger>, ApplicationError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(self.parse(&contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io_error(&self.path, &e)),
        }
    }

    fn parse(&self, contents: &str) -> Ledger {
        let lines = contents.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let mut header = None;
        let mut completed = BTreeSet::new();

        for (position, (number, line)) in lines.enumerate() {
            match serde_json::from_str(line) {
                Ok(LedgerEntry::Run { run_id, started_at }) if position == 0 => {
                    header = Some((run_id, started_at));
                },
                Ok(LedgerEntry::Run { .. }) => {
                    warn!(line = number + 1, "Ignoring repeated run entry in checkpoint");
                },
                Ok(LedgerEntry::Completed { id }) => {
                    completed.insert(id);
                },
                Err(e) => {
                    warn!(line = number + 1, error = %e, "Ignoring unreadable checkpoint entry");
                },
            }
        }

        match header {
            Some((run_id, started_at)) => Ledger {
                state: CheckpointState {
                    run_id,
                    started_at,
                    completed,
                },
                has_header: true,
            },
            None => {
                // The marker still means a run was interrupted.
                warn!(
                    path = %self.path.display(),
                    completed = completed.len(),
                    "Checkpoint has no readable run entry"
                );
                let mut state = CheckpointState::new(RunId::new());
                state.completed = completed;
                Ledger {
                    state,
                    has_header: false,
                }
            },
        }
    }
}

#[async_trait]
impl CheckpointPort for JsonlCheckpointStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<CheckpointState>, ApplicationError> {
        let ledger = self.read().await?;
        if let Some(ledger) = &ledger {
            debug!(completed = ledger.state.completed.len(), "Checkpoint loaded");
        }
        Ok(ledger.map(|ledger| ledger.state))
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn begin(&self, run_id: RunId) -> Result<CheckpointState, ApplicationError> {
        match self.read().await? {
            Some(ledger) if ledger.has_header => {
                debug!(run_id = %ledger.state.run_id, "Continuing existing checkpoint");
                return Ok(ledger.state);
            },
            Some(ledger) => {
                let mut state = CheckpointState::new(run_id);
                state.completed = ledger.state.completed;
                self.rewrite(&state).await?;
                info!(completed = state.completed.len(), "Checkpoint run entry rewritten");
                return Ok(state);
            },
            None => {},
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(parent, &e))?;
        }

        let state = CheckpointState::new(run_id);
        self.append(
            &LedgerEntry::Run {
                run_id: state.run_id,
                started_at: state.started_at,
            },
            true,
        )
        .await?;
        debug!("Checkpoint created");
        Ok(state)
    }

    async fn record_completed(&self, id: &WorkItemId) -> Result<(), ApplicationError> {
        self.append(&LedgerEntry::Completed { id: id.clone() }, false)
            .await
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn release(&self) -> Result<(), ApplicationError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(&self.path, &e)),
        }
    }
}
