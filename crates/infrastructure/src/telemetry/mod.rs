//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry with an env filter and either a
//! human-readable or a JSON formatter, both writing to stderr.

mod subscriber;

pub use subscriber::{TelemetryConfig, TelemetryError, filter_for_verbosity, init_tracing};
