//! Effective INA-CBG tariff per patient.
//!
//! Precedence, strictly in order:
//! 1. the patient's manual override (`inaCbgAmount`) when set and positive;
//! 2. the catalog tariff for the *active* diagnosis's code when set and positive;
//! 3. nothing: amount `0`.
//!
//! Older diagnoses never contribute.

use crate::catalog::ReferenceCatalog;
use crate::patient::Patient;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rule produced an [`EffectiveTariff`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffSource {
    Override,
    Catalog,
    Unavailable,
}

impl TariffSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TariffSource::Override => "override",
            TariffSource::Catalog => "catalog",
            TariffSource::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for TariffSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveTariff {
    pub amount: u64,
    pub source: TariffSource,
}

impl EffectiveTariff {
    pub fn is_from_catalog(&self) -> bool {
        self.source == TariffSource::Catalog
    }

    fn unavailable() -> Self {
        Self {
            amount: 0,
            source: TariffSource::Unavailable,
        }
    }
}

pub fn effective_tariff(patient: &Patient, catalog: &ReferenceCatalog) -> EffectiveTariff {
    if let Some(amount) = patient.tariff_override() {
        return EffectiveTariff {
            amount,
            source: TariffSource::Override,
        };
    }

    patient
        .active_diagnosis()
        .and_then(|diagnosis| catalog.lookup(&diagnosis.code))
        .and_then(|template| template.claimable_tariff())
        .map(|amount| EffectiveTariff {
            amount,
            source: TariffSource::Catalog,
        })
        .unwrap_or_else(EffectiveTariff::unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::template;
    use crate::patient::tests::patient;
    use crate::patient::Diagnosis;
    use crate::Severity;
    use chrono::Utc;
    use klaim_types::DiagnosisCode;

    fn diagnosis(code: &str) -> Diagnosis {
        Diagnosis {
            id: format!("d-{code}"),
            code: DiagnosisCode::parse(code).unwrap(),
            description: code.to_string(),
            severity: Severity::I,
            timestamp: Utc::now(),
            checklist: vec![],
            notes: None,
        }
    }

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new(vec![
            template("J45.9", "Asthma", Some(2_114_700)),
            template("I10", "Hypertension", Some(300_000)),
            template("A09", "Diarrhoea", Some(0)),
        ])
    }

    #[test]
    fn test_override_beats_catalog() {
        let mut p = patient("p1").with_tariff_override(Some(500_000));
        p.diagnoses = vec![diagnosis("I10")];

        let tariff = effective_tariff(&p, &catalog());
        assert_eq!(tariff.amount, 500_000);
        assert!(!tariff.is_from_catalog());
        assert_eq!(tariff.source, TariffSource::Override);
    }

    #[test]
    fn test_catalog_tariff_for_active_diagnosis() {
        let mut p = patient("p1");
        p.diagnoses = vec![diagnosis("J45.9")];

        let tariff = effective_tariff(&p, &catalog());
        assert_eq!(tariff.amount, 2_114_700);
        assert!(tariff.is_from_catalog());
    }

    #[test]
    fn test_zero_override_falls_through_to_catalog() {
        let mut p = patient("p1").with_tariff_override(Some(0));
        p.diagnoses = vec![diagnosis("J45.9")];

        assert_eq!(effective_tariff(&p, &catalog()).amount, 2_114_700);
    }

    #[test]
    fn test_only_active_diagnosis_is_consulted() {
        let mut p = patient("p1");
        p.diagnoses = vec![diagnosis("Z99"), diagnosis("J45.9")];

        let tariff = effective_tariff(&p, &catalog());
        assert_eq!(tariff.amount, 0);
        assert_eq!(tariff.source, TariffSource::Unavailable);
    }

    #[test]
    fn test_zero_catalog_tariff_and_no_diagnosis_are_unavailable() {
        let mut p = patient("p1");
        assert_eq!(effective_tariff(&p, &catalog()).source, TariffSource::Unavailable);

        p.diagnoses = vec![diagnosis("A09")];
        let tariff = effective_tariff(&p, &catalog());
        assert_eq!(tariff.amount, 0);
        assert!(!tariff.is_from_catalog());
    }
}
