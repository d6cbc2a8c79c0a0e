//! Constants used throughout the Klaim core crate.

use std::time::Duration;

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "klaim_data";

/// Hospital name used when none is configured.
pub const DEFAULT_HOSPITAL_NAME: &str = "RSUD";

/// Filename for the patients collection.
pub const PATIENTS_FILENAME: &str = "patients.yaml";

/// Filename for the reference templates collection.
pub const REFERENCE_TEMPLATES_FILENAME: &str = "reference_templates.yaml";

/// Filename for the users collection.
pub const USERS_FILENAME: &str = "users.yaml";

/// Default upper bound on a single generative lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Provenance note attached to diagnoses resolved from the reference catalog.
pub const LOCAL_PROVENANCE_NOTE: &str = "Resolved from local database";

/// Provenance note attached to diagnoses resolved by the generative lookup.
pub const GENERATED_PROVENANCE_NOTE: &str = "generated by AI lookup; verify before submission";

/// Separator written by catalog export.
pub const EXPORT_SEPARATOR: u8 = b';';

/// Candidate separators for catalog import, in tie-break order.
pub const IMPORT_SEPARATORS: &[u8] = b";\t|,";
