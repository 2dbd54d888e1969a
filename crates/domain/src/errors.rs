//! Domain-level errors

use thiserror::Error;

use crate::entities::WorkStatus;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// A source file cannot be turned into a work item
    #[error("Invalid work item: {0}")]
    InvalidWorkItem(String),

    /// A rate or volume adjustment could not be parsed or is out of range
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    /// A recovery decision could not be parsed
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    /// A work item was asked to move to a state it cannot reach
    #[error("Illegal transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: WorkStatus,
        to: &'static str,
    },
}

impl DomainError {
    /// Create an illegal transition error
    pub fn illegal_transition(id: impl Into<String>, from: &WorkStatus, to: &'static str) -> Self {
        Self::IllegalTransition {
            id: id.into(),
            from: from.clone(),
            to,
        }
    }
}
