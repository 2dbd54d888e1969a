//! Infrastructure layer - Adapters for external systems
//!
//! Implements ports defined in the application layer: configuration
//! loading, the checkpoint ledger, the speech adapter, operator decision
//! providers, progress rendering and tracing setup.

pub mod adapters;
pub mod config;
pub mod persistence;
pub mod telemetry;

pub use adapters::*;
pub use config::{AppConfig, ConfigOverrides, LogFormat};
pub use persistence::JsonlCheckpointStore;
pub use telemetry::{TelemetryConfig, TelemetryError, filter_for_verbosity, init_tracing};
