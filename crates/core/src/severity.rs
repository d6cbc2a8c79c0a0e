//! INA-CBG severity tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Claim complexity tier used by the INA-CBG tariff scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Severity {
    /// Mild.
    #[default]
    I,
    /// Moderate.
    II,
    /// Severe.
    III,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::I => "I",
            Severity::II => "II",
            Severity::III => "III",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text is not one of `I`, `II`, `III`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid severity '{0}'")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Accepts the roman tier, case-insensitively and with surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "I" => Ok(Severity::I),
            "II" => Ok(Severity::II),
            "III" => Ok(Severity::III),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}
