//! Operator decision after a batch with failures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// What to do with the failed items of a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryDecision {
    /// Accept the failures as final and move on to the next batch
    #[default]
    Continue,
    /// Re-run only the failed items once, then move on
    Retry,
    /// Stop after this batch
    Abort,
}

impl RecoveryDecision {
    /// Get a lowercase label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Retry => "retry",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for RecoveryDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecoveryDecision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" | "continue" => Ok(Self::Continue),
            "r" | "retry" => Ok(Self::Retry),
            "a" | "abort" | "q" | "quit" => Ok(Self::Abort),
            _ => Err(DomainError::InvalidDecision(s.to_string())),
        }
    }
}
