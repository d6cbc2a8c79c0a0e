//! Diagnosis history management.
//!
//! A patient's diagnoses are an append-only history, newest first. Recording a diagnosis
//! prepends it; nothing already recorded is changed or removed. The only later mutation is
//! ticking checklist items.

use crate::checklist;
use crate::constants::{GENERATED_PROVENANCE_NOTE, LOCAL_PROVENANCE_NOTE};
use crate::ids::new_record_id;
use crate::patient::{Diagnosis, Patient};
use crate::resolver::{Resolution, ResolutionSource};
use crate::{ClaimError, ClaimResult};
use chrono::{DateTime, Utc};

/// Records `resolution` as the patient's newest diagnosis.
///
/// `user_description`, when non-blank, replaces the resolved description. The diagnosis
/// notes record whether the resolution came from the local database or was generated, so
/// that claim justifications can be audited.
pub fn record(patient: &Patient, resolution: &Resolution, user_description: Option<&str>) -> Patient {
    record_at(patient, resolution, user_description, Utc::now())
}

/// Like [`record`], with an explicit timestamp.
pub fn record_at(
    patient: &Patient,
    resolution: &Resolution,
    user_description: Option<&str>,
    timestamp: DateTime<Utc>,
) -> Patient {
    let details = resolution.details();

    let description = user_description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| details.description.as_str().to_string());

    let diagnosis = Diagnosis {
        id: new_record_id(),
        code: details.code.clone(),
        description,
        severity: details.severity,
        timestamp,
        checklist: checklist::build(&details.required_documents),
        notes: Some(provenance_note(resolution.source()).to_string()),
    };

    tracing::info!(
        "recorded diagnosis {} ({}) for patient {} with {} checklist items",
        diagnosis.code,
        resolution.source(),
        patient.id,
        diagnosis.checklist.len()
    );

    let mut diagnoses = Vec::with_capacity(patient.diagnoses.len() + 1);
    diagnoses.push(diagnosis);
    diagnoses.extend(patient.diagnoses.iter().cloned());

    Patient {
        diagnoses,
        ..patient.clone()
    }
}

pub fn provenance_note(source: ResolutionSource) -> &'static str {
    match source {
        ResolutionSource::Local => LOCAL_PROVENANCE_NOTE,
        ResolutionSource::Generated => GENERATED_PROVENANCE_NOTE,
    }
}

/// Flips one checklist item's `is_checked` flag.
///
/// Applying the same toggle twice restores the original patient.
///
/// # Errors
///
/// Returns [`ClaimError::DiagnosisNotFound`] or [`ClaimError::ChecklistItemNotFound`] when
/// an id does not match; the patient is left unchanged.
pub fn toggle(patient: &Patient, diagnosis_id: &str, item_id: &str) -> ClaimResult<Patient> {
    let diagnosis_index = patient
        .diagnoses
        .iter()
        .position(|d| d.id == diagnosis_id)
        .ok_or_else(|| ClaimError::DiagnosisNotFound(diagnosis_id.to_string()))?;

    let item_index = patient.diagnoses[diagnosis_index]
        .checklist
        .iter()
        .position(|i| i.id == item_id)
        .ok_or_else(|| ClaimError::ChecklistItemNotFound(item_id.to_string()))?;

    let mut updated = patient.clone();
    let item = &mut updated.diagnoses[diagnosis_index].checklist[item_index];
    item.is_checked = !item.is_checked;

    Ok(updated)
}
