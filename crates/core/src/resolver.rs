//! Diagnosis code resolution.
//!
//! A code is resolved against the reference catalog first. Only when the catalog has no
//! template for it is the [`GenerativeLookup`] collaborator asked, and whatever it returns
//! is validated before it can become a [`Resolution`]. A catalog hit never touches the
//! collaborator.
//!
//! Resolution is read-only: the catalog is borrowed, and callers decide whether to record
//! the result against a patient.

use crate::catalog::ReferenceCatalog;
use crate::error::{ClaimError, ClaimResult, ResolutionError};
use crate::Severity;
use klaim_types::{DiagnosisCode, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

/// The canonical description of a diagnosis code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDiagnosis {
    pub code: DiagnosisCode,
    pub description: NonEmptyText,
    pub severity: Severity,
    pub required_documents: Vec<String>,
}

/// Where a resolution came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Local,
    Generated,
}

impl ResolutionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionSource::Local => "local",
            ResolutionSource::Generated => "generated",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of resolving a code, tagged with its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Copied verbatim from the reference catalog.
    Local(ResolvedDiagnosis),
    /// Produced by the generative lookup and validated.
    Generated(ResolvedDiagnosis),
}

impl Resolution {
    pub fn details(&self) -> &ResolvedDiagnosis {
        match self {
            Resolution::Local(d) | Resolution::Generated(d) => d,
        }
    }

    pub fn into_details(self) -> ResolvedDiagnosis {
        match self {
            Resolution::Local(d) | Resolution::Generated(d) => d,
        }
    }

    pub fn source(&self) -> ResolutionSource {
        match self {
            Resolution::Local(_) => ResolutionSource::Local,
            Resolution::Generated(_) => ResolutionSource::Generated,
        }
    }
}

/// Unvalidated answer from a generative lookup.
///
/// Every field is optional so that a partial answer can be reported precisely
/// instead of failing inside the collaborator's deserialiser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPayload {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub required_documents: Option<Vec<String>>,
}

/// External service that can describe a diagnosis code the catalog does not know.
///
/// Implementations are expected to be slow and unreliable. They must enforce their own
/// timeout and report it as [`ResolutionError::Timeout`].
pub trait GenerativeLookup {
    fn generate(
        &self,
        code: &DiagnosisCode,
        hint: Option<&str>,
    ) -> impl Future<Output = Result<GeneratedPayload, ResolutionError>> + Send;
}

/// Resolves diagnosis codes, catalog first.
#[derive(Clone, Debug)]
pub struct CodeResolver<L> {
    lookup: L,
}

impl<L: GenerativeLookup> CodeResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Resolves `code`, optionally guided by a free-text `hint`.
    ///
    /// The code is trimmed and upper-cased. An exact catalog match is returned as
    /// [`Resolution::Local`] without calling the collaborator. Otherwise the collaborator is
    /// called exactly once with the normalised code and the hint as given.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Text`] if `code` is blank or not a valid code, and
    /// [`ClaimError::Resolution`] if the collaborator fails or returns a payload that does
    /// not describe a diagnosis.
    pub async fn resolve(
        &self,
        catalog: &ReferenceCatalog,
        code: &str,
        hint: Option<&str>,
    ) -> ClaimResult<Resolution> {
        let code = DiagnosisCode::parse(code)?;

        if let Some(template) = catalog.lookup(&code) {
            tracing::debug!("resolved {} from reference catalog", code);
            return Ok(Resolution::Local(ResolvedDiagnosis {
                code: template.code.clone(),
                description: template.description.clone(),
                severity: template.severity,
                required_documents: template.required_documents.clone(),
            }));
        }

        tracing::info!("{} not in reference catalog; asking generative lookup", code);
        let payload = self.lookup.generate(&code, hint).await.map_err(|e| {
            tracing::warn!("generative lookup for {} failed: {}", code, e);
            e
        })?;

        let details = validate_generated(code, payload)?;
        Ok(Resolution::Generated(details))
    }
}

/// Checks a generated payload against the resolution schema.
///
/// The requested code is kept even if the payload names a different one, so a diagnosis is
/// always recorded under the code the verifier typed. Document names are trimmed and blank
/// names dropped before the emptiness check.
pub fn validate_generated(
    requested: DiagnosisCode,
    payload: GeneratedPayload,
) -> Result<ResolvedDiagnosis, ResolutionError> {
    let returned_code = payload
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or(ResolutionError::MissingField("code"))?;
    if !requested.matches(&returned_code) {
        tracing::debug!(
            "generative lookup answered {} for requested {}; keeping requested code",
            returned_code.trim(),
            requested
        );
    }

    let description = payload
        .description
        .as_deref()
        .and_then(|d| NonEmptyText::new(d).ok())
        .ok_or(ResolutionError::MissingField("description"))?;

    let severity_text = payload
        .severity
        .ok_or(ResolutionError::MissingField("severity"))?;
    let severity: Severity = severity_text
        .parse()
        .map_err(|_| ResolutionError::InvalidSeverity(severity_text.clone()))?;

    let required_documents: Vec<String> = payload
        .required_documents
        .ok_or(ResolutionError::MissingField("requiredDocuments"))?
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    if required_documents.is_empty() {
        return Err(ResolutionError::EmptyDocuments);
    }

    Ok(ResolvedDiagnosis {
        code: requested,
        description,
        severity,
        required_documents,
    })
}

/// Tracks patients with a resolution in flight.
///
/// Only one resolution per patient may be outstanding. A second request for the same
/// patient is refused until the first [`PendingGuard`] is dropped.
#[derive(Debug, Default)]
pub struct PendingResolutions {
    in_flight: Mutex<HashSet<String>>,
}

impl PendingResolutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `patient_id` as having a resolution in flight.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::ResolutionPending`] if one is already in flight.
    pub fn try_begin(&self, patient_id: &str) -> ClaimResult<PendingGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(patient_id.to_string()) {
            return Err(ClaimError::ResolutionPending(patient_id.to_string()));
        }
        Ok(PendingGuard {
            owner: self,
            patient_id: patient_id.to_string(),
        })
    }

    pub fn is_pending(&self, patient_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(patient_id)
    }
}

/// Releases the patient's pending slot on drop.
#[derive(Debug)]
pub struct PendingGuard<'a> {
    owner: &'a PendingResolutions,
    patient_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.patient_id);
    }
}
