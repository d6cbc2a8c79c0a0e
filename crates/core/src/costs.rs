//! Billing versus tariff reconciliation.
//!
//! Amounts are whole numbers in the smallest monetary unit. Variance is
//! `tariff - billing`: positive means the claim exceeds the real cost (projected surplus),
//! negative means a loss.

use crate::catalog::ReferenceCatalog;
use crate::patient::Patient;
use crate::tariff::{effective_tariff, TariffSource};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_billing: u64,
    pub total_tariff: u64,
    pub variance: i64,
}

/// One patient's line in a cost report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientCost {
    pub patient_id: String,
    pub billing: u64,
    pub tariff: u64,
    pub tariff_source: TariffSource,
    pub variance: i64,
}

fn variance(tariff: u64, billing: u64) -> i64 {
    let diff = i128::from(tariff) - i128::from(billing);
    i64::try_from(diff).unwrap_or(if diff.is_negative() { i64::MIN } else { i64::MAX })
}

/// Totals billing and effective tariff over `patients`.
pub fn summarize(patients: &[Patient], catalog: &ReferenceCatalog) -> CostSummary {
    let (total_billing, total_tariff) =
        patients
            .iter()
            .fold((0u64, 0u64), |(billing, tariff), patient| {
                (
                    billing.saturating_add(patient.billing_amount.unwrap_or(0)),
                    tariff.saturating_add(effective_tariff(patient, catalog).amount),
                )
            });

    CostSummary {
        total_billing,
        total_tariff,
        variance: variance(total_tariff, total_billing),
    }
}

/// Per-patient lines in input order.
pub fn breakdown(patients: &[Patient], catalog: &ReferenceCatalog) -> Vec<PatientCost> {
    patients
        .iter()
        .map(|patient| {
            let billing = patient.billing_amount.unwrap_or(0);
            let tariff = effective_tariff(patient, catalog);
            PatientCost {
                patient_id: patient.id.clone(),
                billing,
                tariff: tariff.amount,
                tariff_source: tariff.source,
                variance: variance(tariff.amount, billing),
            }
        })
        .collect()
}
