//! Signed percentage adjustment for speech rate and volume
//!
//! Uses the `+N%` / `-N%` notation common to neural TTS services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

/// A relative adjustment in whole percent, e.g. `+10%` or `-25%`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Adjustment(i16);

impl Adjustment {
    /// No adjustment (`+0%`)
    pub const NEUTRAL: Self = Self(0);

    /// Create an adjustment from a percentage
    #[must_use]
    pub const fn from_percent(percent: i16) -> Self {
        Self(percent)
    }

    /// Get the percentage
    #[must_use]
    pub const fn percent(&self) -> i16 {
        self.0
    }

    /// Whether this is the neutral adjustment
    #[must_use]
    pub const fn is_neutral(&self) -> bool {
        self.0 == 0
    }

    /// Multiplicative factor, `+25%` is `1.25`
    #[must_use]
    pub fn factor(&self) -> f32 {
        1.0 + f32::from(self.0) / 100.0
    }

    /// Check the adjustment lies within `min..=max` percent
    ///
    /// # Errors
    /// Returns an error naming the allowed range when out of bounds
    pub fn ensure_within(&self, min: i16, max: i16) -> Result<(), DomainError> {
        if (min..=max).contains(&self.0) {
            Ok(())
        } else {
            Err(DomainError::InvalidAdjustment(format!(
                "{self} is outside {}..={}",
                Self(min),
                Self(max)
            )))
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}%", self.0)
    }
}

impl FromStr for Adjustment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();

        number
            .parse::<i16>()
            .map(Self)
            .map_err(|_| DomainError::InvalidAdjustment(s.to_string()))
    }
}

impl Serialize for Adjustment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Adjustment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
