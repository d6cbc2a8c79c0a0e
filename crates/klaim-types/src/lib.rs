//! Validated primitive types shared across the Klaim crates.
//!
//! Values of these types are checked once at construction, so code that receives
//! them does not need to re-validate.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    #[error("value must not be blank")]
    Empty,
    #[error("invalid diagnosis code: {0}")]
    InvalidCode(String),
}

/// Trimmed text with at least one visible character.
///
/// Used for names and descriptions that a claim cannot be submitted without.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if nothing is left after trimming.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        match input.as_ref().trim() {
            "" => Err(TextError::Empty),
            text => Ok(Self(text.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyText {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyText> for String {
    fn from(text: NonEmptyText) -> Self {
        text.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A diagnosis code in canonical form: trimmed and upper-cased.
///
/// Reference catalog keys, resolution requests and recorded diagnoses all compare
/// codes in this form, so `" j45.9 "` and `"J45.9"` name the same code.
///
/// Codes may contain ASCII letters, digits, `.` and `-`. Anything else is rejected
/// so that a stray separator from an import file cannot become part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiagnosisCode(String);

impl DiagnosisCode {
    const MAX_LEN: usize = 32;

    /// Normalises and validates a diagnosis code.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] for blank input and [`TextError::InvalidCode`] when the
    /// code is too long or contains characters outside `[A-Z0-9.-]`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let normalised = input.as_ref().trim().to_uppercase();
        if normalised.is_empty() {
            return Err(TextError::Empty);
        }

        if normalised.len() > Self::MAX_LEN {
            return Err(TextError::InvalidCode(format!(
                "code exceeds maximum length of {} characters",
                Self::MAX_LEN
            )));
        }

        let ok = normalised
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'Z' | b'.' | b'-'));
        if !ok {
            return Err(TextError::InvalidCode(normalised));
        }

        Ok(Self(normalised))
    }

    /// Returns the canonical code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `other`, once normalised, is this code.
    pub fn matches(&self, other: &str) -> bool {
        other.trim().eq_ignore_ascii_case(&self.0)
    }
}

impl std::fmt::Display for DiagnosisCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DiagnosisCode {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DiagnosisCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DiagnosisCode {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DiagnosisCode> for String {
    fn from(code: DiagnosisCode) -> Self {
        code.0
    }
}
