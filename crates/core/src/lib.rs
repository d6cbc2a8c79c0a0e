//! # Klaim Core
//!
//! Claim resolution and cost reconciliation for INA-CBG claim verification.
//!
//! This crate contains pure data operations:
//! - Resolving diagnosis codes against the reference catalog, falling back to a generative
//!   lookup ([`resolver`])
//! - Building document checklists and keeping each patient's diagnosis history
//!   ([`checklist`], [`recorder`])
//! - Effective tariff precedence and population cost summaries ([`tariff`], [`costs`])
//! - Catalog import/export in the delimited text layout ([`import`])
//! - A narrow load-all/save-all persistence capability ([`store`])
//!
//! **No API concerns**: HTTP servers, the generative service client and the CLI live in
//! `api-rest`, `klaim-genai` and `klaim-cli`.

pub mod catalog;
pub mod checklist;
pub mod config;
pub mod constants;
pub mod costs;
pub mod error;
pub mod ids;
pub mod import;
pub mod patient;
pub mod recorder;
pub mod resolver;
pub mod service;
pub mod severity;
pub mod store;
pub mod tariff;

pub use catalog::{CatalogInconsistency, ReferenceCatalog, ReferenceTemplate};
pub use checklist::{ChecklistItem, Completion};
pub use config::CoreConfig;
pub use constants::DEFAULT_DATA_DIR;
pub use costs::{CostSummary, PatientCost};
pub use error::{ClaimError, ClaimResult, ResolutionError};
pub use import::{ImportReport, MalformedImportRow};
pub use patient::{Diagnosis, Gender, Patient, PatientStatus};
pub use resolver::{
    CodeResolver, GeneratedPayload, GenerativeLookup, PendingResolutions, Resolution,
    ResolutionSource, ResolvedDiagnosis,
};
pub use service::{ClaimService, NewPatient, RecordedDiagnosis};
pub use severity::Severity;
pub use store::{Collection, FileStore, MemoryStore, RecordStore, Records, User, UserRole};
pub use tariff::{EffectiveTariff, TariffSource};

pub use klaim_types::{DiagnosisCode, NonEmptyText, TextError};
