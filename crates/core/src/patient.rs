//! Patient and diagnosis records.
//!
//! These are plain records supplied and stored by the persistence collaborator. Field names
//! serialise in camelCase so records written by other tools load unchanged.
//!
//! Every mutation here is copy-on-write: it borrows the current value and returns an updated
//! one. Callers replace the stored collection with the result.

use crate::checklist::{ChecklistItem, Completion};
use crate::{ClaimError, ClaimResult, Severity};
use chrono::{DateTime, NaiveDate, Utc};
use klaim_types::DiagnosisCode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// Where the patient currently is in the care pathway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PatientStatus {
    #[default]
    Admitted,
    Outpatient,
    Discharged,
}

/// A recorded diagnosis with its claim document checklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub id: String,
    pub code: DiagnosisCode,
    pub description: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Diagnosis {
    pub fn completion(&self) -> Completion {
        Completion::of(&self.checklist)
    }

    /// Names of checklist documents not yet ticked, in display order.
    pub fn outstanding_documents(&self) -> Vec<&str> {
        self.checklist
            .iter()
            .filter(|item| !item.is_checked)
            .map(|item| item.name.as_str())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub mrn: String,
    #[serde(default)]
    pub bpjs_number: String,
    pub name: String,
    pub gender: Gender,
    pub dob: NaiveDate,
    #[serde(default)]
    pub status: PatientStatus,
    /// Newest first.
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
    /// Real hospital cost in the smallest monetary unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_amount: Option<u64>,
    /// Manual INA-CBG tariff override in the smallest monetary unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ina_cbg_amount: Option<u64>,
}

impl Patient {
    /// The diagnosis that drives the checklist and the tariff: the most recent one.
    pub fn active_diagnosis(&self) -> Option<&Diagnosis> {
        self.diagnoses.first()
    }

    pub fn diagnosis(&self, diagnosis_id: &str) -> Option<&Diagnosis> {
        self.diagnoses.iter().find(|d| d.id == diagnosis_id)
    }

    /// The override amount, only when it is set and positive.
    pub fn tariff_override(&self) -> Option<u64> {
        self.ina_cbg_amount.filter(|amount| *amount > 0)
    }

    pub fn with_billing_amount(&self, billing_amount: Option<u64>) -> Self {
        Self {
            billing_amount,
            ..self.clone()
        }
    }

    pub fn with_tariff_override(&self, ina_cbg_amount: Option<u64>) -> Self {
        Self {
            ina_cbg_amount,
            ..self.clone()
        }
    }

    pub fn with_status(&self, status: PatientStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Finds a patient by id.
pub fn find_patient<'a>(patients: &'a [Patient], patient_id: &str) -> ClaimResult<&'a Patient> {
    patients
        .iter()
        .find(|p| p.id == patient_id)
        .ok_or_else(|| ClaimError::PatientNotFound(patient_id.to_string()))
}

/// Returns a new collection with the patient sharing `updated.id` replaced by `updated`.
///
/// # Errors
///
/// Returns [`ClaimError::PatientNotFound`] if no patient has that id.
pub fn replace_patient(patients: &[Patient], updated: Patient) -> ClaimResult<Vec<Patient>> {
    let position = patients
        .iter()
        .position(|p| p.id == updated.id)
        .ok_or_else(|| ClaimError::PatientNotFound(updated.id.clone()))?;

    let mut next = patients.to_vec();
    next[position] = updated;
    Ok(next)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn patient(id: &str) -> Patient {
        Patient {
            id: id.to_string(),
            mrn: format!("RM-{id}"),
            bpjs_number: "0001234567890".into(),
            name: "Siti Aminah".into(),
            gender: Gender::Female,
            dob: NaiveDate::from_ymd_opt(1980, 4, 12).unwrap(),
            status: PatientStatus::Admitted,
            diagnoses: vec![],
            billing_amount: None,
            ina_cbg_amount: None,
        }
    }

    #[test]
    fn test_tariff_override_ignores_zero() {
        let p = patient("p1").with_tariff_override(Some(0));
        assert_eq!(p.tariff_override(), None);
        assert_eq!(p.with_tariff_override(Some(10)).tariff_override(), Some(10));
    }

    #[test]
    fn test_with_billing_amount_leaves_original() {
        let original = patient("p1");
        let billed = original.with_billing_amount(Some(1_000_000));
        assert_eq!(original.billing_amount, None);
        assert_eq!(billed.billing_amount, Some(1_000_000));
        assert_eq!(billed.with_status(PatientStatus::Discharged).status, PatientStatus::Discharged);
    }

    #[test]
    fn test_replace_patient_swaps_by_id() {
        let patients = vec![patient("p1"), patient("p2")];
        let updated = patients[1].with_billing_amount(Some(5));

        let next = replace_patient(&patients, updated).expect("replace should succeed");
        assert_eq!(next[1].billing_amount, Some(5));
        assert_eq!(next[0], patients[0]);
        assert_eq!(patients[1].billing_amount, None);

        let err = replace_patient(&patients, patient("p9")).expect_err("unknown id should fail");
        assert!(matches!(err, ClaimError::PatientNotFound(_)));
    }

    #[test]
    fn test_patient_deserialises_camel_case_record() {
        let yaml = r#"
id: p1
mrn: RM-001
bpjsNumber: "0001"
name: Budi
gender: Male
dob: 1975-01-02
status: Outpatient
inaCbgAmount: 500000
"#;
        let p: Patient = serde_yaml::from_str(yaml).expect("deserialise should succeed");
        assert_eq!(p.status, PatientStatus::Outpatient);
        assert_eq!(p.ina_cbg_amount, Some(500_000));
        assert!(p.diagnoses.is_empty());
        assert!(find_patient(&[p], "p1").is_ok());
    }
}
