//! Ports - Interfaces for external systems
//!
//! These traits define the boundaries between the application layer and
//! infrastructure adapters (hexagonal architecture).

pub mod checkpoint_port;
pub mod decision_port;
pub mod progress_port;
pub mod speech_port;

#[cfg(test)]
pub use checkpoint_port::MockCheckpointPort;
pub use checkpoint_port::{CheckpointPort, CheckpointState};
#[cfg(test)]
pub use decision_port::MockDecisionPort;
pub use decision_port::{DecisionPort, RunPlan};
#[cfg(test)]
pub use progress_port::MockProgressSink;
pub use progress_port::{ItemOutcome, ProgressEvent, ProgressSink};
#[cfg(test)]
pub use speech_port::MockSpeechSynthesisPort;
pub use speech_port::SpeechSynthesisPort;
