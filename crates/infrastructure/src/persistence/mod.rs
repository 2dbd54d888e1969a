//! Persistence module
//!
//! File-based storage for the checkpoint of an unfinished run.

pub mod checkpoint_ledger;
mod error;

pub use checkpoint_ledger::JsonlCheckpointStore;
