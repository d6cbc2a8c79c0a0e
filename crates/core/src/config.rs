//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Binaries read environment variables; the core never does, so request handling and tests
//! see one consistent view.

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_HOSPITAL_NAME, DEFAULT_LOOKUP_TIMEOUT};
use crate::{ClaimError, ClaimResult};
use klaim_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    lookup_timeout: Duration,
    hospital_name: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::InvalidInput`] if `lookup_timeout` is zero.
    pub fn new(
        data_dir: PathBuf,
        lookup_timeout: Duration,
        hospital_name: NonEmptyText,
    ) -> ClaimResult<Self> {
        if lookup_timeout.is_zero() {
            return Err(ClaimError::InvalidInput(
                "lookup_timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            data_dir,
            lookup_timeout,
            hospital_name,
        })
    }

    /// Builds a config from raw environment values, as read by the binaries.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`resolve_data_dir`], [`lookup_timeout_from_env_value`] and
    /// [`hospital_name_from_env_value`].
    pub fn from_env_values(
        data_dir: Option<String>,
        lookup_timeout: Option<String>,
        hospital_name: Option<String>,
    ) -> ClaimResult<Self> {
        Self::new(
            resolve_data_dir(data_dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from))?,
            lookup_timeout_from_env_value(lookup_timeout)?,
            hospital_name_from_env_value(hospital_name)?,
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    pub fn hospital_name(&self) -> &NonEmptyText {
        &self.hospital_name
    }
}

/// Resolve the record data directory without reading environment variables.
///
/// An override that exists must be a directory. An override that does not exist yet is
/// accepted; the file store creates it on first write. Without an override the default
/// relative directory is used.
///
/// # Errors
///
/// Returns [`ClaimError::InvalidInput`] if the override names an existing non-directory.
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> ClaimResult<PathBuf> {
    match override_dir {
        Some(dir) if dir.exists() && !dir.is_dir() => Err(ClaimError::InvalidInput(format!(
            "KLAIM_DATA_DIR is not a directory: {}",
            dir.display()
        ))),
        Some(dir) => Ok(dir),
        None => Ok(PathBuf::from(DEFAULT_DATA_DIR)),
    }
}

/// Parse the generative lookup timeout (whole seconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default timeout.
///
/// # Errors
///
/// Returns [`ClaimError::InvalidInput`] for a non-numeric or zero value.
pub fn lookup_timeout_from_env_value(value: Option<String>) -> ClaimResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let Some(value) = value else {
        return Ok(DEFAULT_LOOKUP_TIMEOUT);
    };

    let secs: u64 = value.parse().map_err(|_| {
        ClaimError::InvalidInput(format!("lookup timeout must be whole seconds, got '{value}'"))
    })?;
    if secs == 0 {
        return Err(ClaimError::InvalidInput(
            "lookup timeout must be greater than zero".into(),
        ));
    }

    Ok(Duration::from_secs(secs))
}

/// Parse the hospital name, falling back to [`DEFAULT_HOSPITAL_NAME`] when unset or blank.
pub fn hospital_name_from_env_value(value: Option<String>) -> ClaimResult<NonEmptyText> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(name) => Ok(NonEmptyText::new(name)?),
        None => Ok(NonEmptyText::new(DEFAULT_HOSPITAL_NAME)?),
    }
}
