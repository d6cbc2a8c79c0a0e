//! Record identifiers.
//!
//! Identifiers allocated by the core (diagnoses, checklist items, patients created through
//! the API) use the canonical form: 32 lowercase hex characters, no hyphens. This is what
//! `Uuid::new_v4().simple().to_string()` produces.
//!
//! Identifiers supplied by the persistence collaborator are opaque strings and are never
//! re-validated; records imported from older stores keep whatever ids they had.

use uuid::Uuid;

/// Allocates a fresh canonical record identifier.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}
