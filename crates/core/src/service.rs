//! Claim verification service.
//!
//! Ties the pure core operations to a [`RecordStore`]: every operation loads the current
//! collections, computes the new state, and saves the whole collection back. This is the
//! entry point used by the REST API and the CLI.

use crate::catalog::{ReferenceCatalog, ReferenceTemplate};
use crate::config::CoreConfig;
use crate::costs::{self, CostSummary, PatientCost};
use crate::ids::new_record_id;
use crate::import::{self, ImportReport};
use crate::patient::{find_patient, replace_patient, Gender, Patient, PatientStatus};
use crate::recorder;
use crate::resolver::{CodeResolver, GenerativeLookup, PendingResolutions, Resolution, ResolutionSource};
use crate::store::{RecordStore, Records};
use crate::tariff::{effective_tariff, EffectiveTariff};
use crate::{ClaimError, ClaimResult};
use chrono::NaiveDate;
use klaim_types::{DiagnosisCode, NonEmptyText};
use std::sync::Arc;

/// Demographics for a patient being registered.
#[derive(Clone, Debug)]
pub struct NewPatient {
    pub mrn: NonEmptyText,
    pub bpjs_number: String,
    pub name: NonEmptyText,
    pub gender: Gender,
    pub dob: NaiveDate,
    pub status: PatientStatus,
}

/// Outcome of recording a diagnosis.
#[derive(Clone, Debug)]
pub struct RecordedDiagnosis {
    pub patient: Patient,
    pub source: ResolutionSource,
}

pub struct ClaimService<S, L> {
    cfg: Arc<CoreConfig>,
    records: Records<S>,
    resolver: CodeResolver<L>,
    pending: PendingResolutions,
}

impl<S: RecordStore, L: GenerativeLookup> ClaimService<S, L> {
    pub fn new(cfg: Arc<CoreConfig>, store: S, lookup: L) -> Self {
        Self {
            cfg,
            records: Records::new(store),
            resolver: CodeResolver::new(lookup),
            pending: PendingResolutions::new(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn records(&self) -> &Records<S> {
        &self.records
    }

    pub fn list_patients(&self) -> ClaimResult<Vec<Patient>> {
        self.records.patients()
    }

    pub fn patient(&self, patient_id: &str) -> ClaimResult<Patient> {
        let patients = self.records.patients()?;
        find_patient(&patients, patient_id).cloned()
    }

    pub fn add_patient(&self, new_patient: NewPatient) -> ClaimResult<Patient> {
        let patient = Patient {
            id: new_record_id(),
            mrn: new_patient.mrn.into_inner(),
            bpjs_number: new_patient.bpjs_number.trim().to_string(),
            name: new_patient.name.into_inner(),
            gender: new_patient.gender,
            dob: new_patient.dob,
            status: new_patient.status,
            diagnoses: vec![],
            billing_amount: None,
            ina_cbg_amount: None,
        };

        let mut patients = self.records.patients()?;
        patients.push(patient.clone());
        self.records.save_patients(&patients)?;

        tracing::info!("registered patient {} (MRN {})", patient.id, patient.mrn);
        Ok(patient)
    }

    /// Resolves a code without recording anything.
    pub async fn resolve(&self, code: &str, hint: Option<&str>) -> ClaimResult<Resolution> {
        let catalog = self.records.catalog()?;
        self.resolver.resolve(&catalog, code, hint).await
    }

    /// Resolves `code` and records it as the patient's newest diagnosis.
    ///
    /// Only one call per patient may be in flight. Nothing is written if resolution fails.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClaimError::ResolutionPending`] if a resolution for the patient is
    /// already running, [`crate::ClaimError::PatientNotFound`] for an unknown patient, and
    /// [`crate::ClaimError::Resolution`] if the code cannot be resolved.
    pub async fn record_diagnosis(
        &self,
        patient_id: &str,
        code: &str,
        hint: Option<&str>,
        user_description: Option<&str>,
    ) -> ClaimResult<RecordedDiagnosis> {
        let _pending = self.pending.try_begin(patient_id)?;

        // fail fast on unknown patients before paying for a lookup
        find_patient(&self.records.patients()?, patient_id)?;

        let resolution = self.resolve(code, hint).await?;

        // reload: the collection may have changed while the lookup was suspended
        let patients = self.records.patients()?;
        let patient = find_patient(&patients, patient_id)?;
        let updated = recorder::record(patient, &resolution, user_description);
        let next = replace_patient(&patients, updated.clone())?;
        self.records.save_patients(&next)?;

        Ok(RecordedDiagnosis {
            patient: updated,
            source: resolution.source(),
        })
    }

    pub fn toggle_checklist_item(
        &self,
        patient_id: &str,
        diagnosis_id: &str,
        item_id: &str,
    ) -> ClaimResult<Patient> {
        self.update_patient(patient_id, |patient| {
            recorder::toggle(patient, diagnosis_id, item_id)
        })
    }

    /// Sets the billed amount and the manual tariff override. `None` clears a value.
    pub fn update_costs(
        &self,
        patient_id: &str,
        billing_amount: Option<u64>,
        ina_cbg_amount: Option<u64>,
    ) -> ClaimResult<Patient> {
        self.update_patient(patient_id, |patient| {
            Ok(patient
                .with_billing_amount(billing_amount)
                .with_tariff_override(ina_cbg_amount))
        })
    }

    pub fn update_status(&self, patient_id: &str, status: PatientStatus) -> ClaimResult<Patient> {
        self.update_patient(patient_id, |patient| Ok(patient.with_status(status)))
    }

    fn update_patient(
        &self,
        patient_id: &str,
        change: impl FnOnce(&Patient) -> ClaimResult<Patient>,
    ) -> ClaimResult<Patient> {
        let patients = self.records.patients()?;
        let updated = change(find_patient(&patients, patient_id)?)?;
        let next = replace_patient(&patients, updated.clone())?;
        self.records.save_patients(&next)?;
        Ok(updated)
    }

    pub fn patient_tariff(&self, patient_id: &str) -> ClaimResult<EffectiveTariff> {
        let patients = self.records.patients()?;
        let catalog = self.records.catalog()?;
        Ok(effective_tariff(find_patient(&patients, patient_id)?, &catalog))
    }

    pub fn cost_summary(&self) -> ClaimResult<CostSummary> {
        Ok(costs::summarize(
            &self.records.patients()?,
            &self.records.catalog()?,
        ))
    }

    pub fn cost_breakdown(&self) -> ClaimResult<Vec<PatientCost>> {
        Ok(costs::breakdown(
            &self.records.patients()?,
            &self.records.catalog()?,
        ))
    }

    pub fn catalog(&self) -> ClaimResult<ReferenceCatalog> {
        self.records.catalog()
    }

    pub fn add_template(&self, template: ReferenceTemplate) -> ClaimResult<ReferenceCatalog> {
        self.add_templates(vec![template])
    }

    /// Appends `templates` to the stored catalog in order.
    ///
    /// Codes already present are appended too; lookups keep using the earlier entry.
    pub fn add_templates(&self, templates: Vec<ReferenceTemplate>) -> ClaimResult<ReferenceCatalog> {
        let count = templates.len();
        let catalog = self.records.catalog()?.with_templates(templates);
        self.records.save_catalog(&catalog)?;
        tracing::info!("added {} reference templates ({} total)", count, catalog.len());
        Ok(catalog)
    }

    /// Replaces the first template for `code`.
    pub fn replace_template(
        &self,
        code: &str,
        template: ReferenceTemplate,
    ) -> ClaimResult<ReferenceCatalog> {
        let code = DiagnosisCode::parse(code)?;
        let catalog = self.records.catalog()?.with_template_replaced(&code, template)?;
        self.records.save_catalog(&catalog)?;
        Ok(catalog)
    }

    /// Removes every template for `code`.
    ///
    /// Diagnoses already recorded under the code keep their checklist; only the catalog
    /// tariff stops applying.
    pub fn remove_template(&self, code: &str) -> ClaimResult<ReferenceCatalog> {
        let code = DiagnosisCode::parse(code)?;
        let current = self.records.catalog()?;
        if current.lookup(&code).is_none() {
            return Err(ClaimError::TemplateNotFound(code.to_string()));
        }
        let catalog = current.without_code(&code);
        self.records.save_catalog(&catalog)?;
        tracing::info!("removed reference template {}", code);
        Ok(catalog)
    }

    /// Appends the parseable rows of delimited `text` to the stored catalog.
    ///
    /// Malformed rows are reported, not fatal. Nothing is saved if no row parsed.
    pub fn import_catalog(&self, text: &str) -> ClaimResult<ImportReport> {
        let report = import::import_catalog(text);
        if !report.templates.is_empty() {
            let catalog = self
                .records
                .catalog()?
                .with_templates(report.templates.iter().cloned());
            self.records.save_catalog(&catalog)?;
        }
        Ok(report)
    }

    pub fn export_catalog(&self) -> ClaimResult<String> {
        import::export_catalog(&self.records.catalog()?)
    }

    /// Stores the sample catalog if no catalog has been saved yet.
    pub fn seed_catalog_if_empty(&self) -> ClaimResult<bool> {
        if !self.records.catalog()?.is_empty() {
            return Ok(false);
        }
        self.records.save_catalog(&ReferenceCatalog::sample())?;
        tracing::info!("seeded empty reference catalog with sample templates");
        Ok(true)
    }
}
