//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod decision_providers;
mod progress_sinks;
mod speech_adapter;

pub use decision_providers::{AlwaysAccept, ConsoleDecisions, ScriptedDecisions};
pub use progress_sinks::{LogProgress, TerminalProgress};
pub use speech_adapter::SpeechAdapter;
