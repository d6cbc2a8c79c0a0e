//! Claim document checklists.
//!
//! A checklist is created in one batch from a resolution's required documents. After that
//! its length and item identities never change; only [`ChecklistItem::is_checked`] does.

use crate::ids::new_record_id;
use serde::{Deserialize, Serialize};

/// One document the verifier must collect before submitting the claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_checked: bool,
    /// Always `true` for items built here; kept as data so stored records round-trip.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Builds a fresh checklist: one unchecked, required item per document name, in input order.
///
/// Names are trimmed but otherwise kept verbatim. An empty input gives an empty checklist.
pub fn build(document_names: &[String]) -> Vec<ChecklistItem> {
    document_names
        .iter()
        .map(|name| name.trim())
        .map(|name| ChecklistItem {
            id: new_record_id(),
            name: name.to_string(),
            is_checked: false,
            required: true,
        })
        .collect()
}

/// How far a checklist has progressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The checklist is empty. Treated as complete: nothing is outstanding.
    NoRequirements,
    /// `checked` of `total` items are ticked; `total` is never zero.
    Progress { checked: usize, total: usize },
}

impl Completion {
    pub fn of(items: &[ChecklistItem]) -> Self {
        if items.is_empty() {
            return Completion::NoRequirements;
        }
        Completion::Progress {
            checked: items.iter().filter(|i| i.is_checked).count(),
            total: items.len(),
        }
    }

    /// Fraction complete in `0.0..=1.0`; `1.0` when there are no requirements.
    pub fn ratio(self) -> f64 {
        match self {
            Completion::NoRequirements => 1.0,
            Completion::Progress { checked, total } => checked as f64 / total as f64,
        }
    }

    /// Whole-number percentage, rounded down.
    pub fn percent(self) -> u8 {
        match self {
            Completion::NoRequirements => 100,
            Completion::Progress { checked, total } => ((checked * 100) / total) as u8,
        }
    }

    pub fn is_complete(self) -> bool {
        match self {
            Completion::NoRequirements => true,
            Completion::Progress { checked, total } => checked == total,
        }
    }
}
