//! Record persistence.
//!
//! The core consumes storage through a narrow capability: load or save one whole collection
//! as an opaque text payload. [`Records`] layers typed access on top and treats a missing or
//! empty payload as "no data yet".
//!
//! ## Storage Layout
//!
//! [`FileStore`] keeps one YAML file per collection:
//!
//! ```text
//! <data_dir>/
//!   patients.yaml
//!   reference_templates.yaml
//!   users.yaml
//! ```
//!
//! Saves write a sibling temporary file and rename it over the target, so readers see either
//! the old collection or the new one. Concurrent writers are not coordinated; the last one
//! wins.

use crate::catalog::ReferenceCatalog;
use crate::constants::{PATIENTS_FILENAME, REFERENCE_TEMPLATES_FILENAME, USERS_FILENAME};
use crate::patient::Patient;
use crate::{ClaimError, ClaimResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The top-level collections held by a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    ReferenceTemplates,
    Users,
}

impl Collection {
    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Patients => PATIENTS_FILENAME,
            Collection::ReferenceTemplates => REFERENCE_TEMPLATES_FILENAME,
            Collection::Users => USERS_FILENAME,
        }
    }
}

/// Load-all / save-all storage for opaque collection payloads.
pub trait RecordStore {
    /// Returns the stored payload, or `None` if nothing has been saved yet.
    fn load(&self, collection: Collection) -> ClaimResult<Option<String>>;

    /// Replaces the stored payload.
    fn save(&self, collection: Collection, payload: &str) -> ClaimResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn load(&self, collection: Collection) -> ClaimResult<Option<String>> {
        (**self).load(collection)
    }

    fn save(&self, collection: Collection, payload: &str) -> ClaimResult<()> {
        (**self).save(collection, payload)
    }
}

/// One YAML file per collection under a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }
}

impl RecordStore for FileStore {
    fn load(&self, collection: Collection) -> ClaimResult<Option<String>> {
        let path = self.path_for(collection);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClaimError::FileRead(e)),
        }
    }

    fn save(&self, collection: Collection, payload: &str) -> ClaimResult<()> {
        fs::create_dir_all(&self.data_dir).map_err(ClaimError::StorageDirCreation)?;

        let path = self.path_for(collection);
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, payload).map_err(ClaimError::FileWrite)?;
        fs::rename(&tmp, &path).map_err(ClaimError::FileWrite)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    payloads: Mutex<HashMap<Collection, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, collection: Collection) -> ClaimResult<Option<String>> {
        Ok(self
            .payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&collection)
            .cloned())
    }

    fn save(&self, collection: Collection, payload: &str) -> ClaimResult<()> {
        self.payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(collection, payload.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    #[default]
    Verifier,
}

/// An application user. Credentials live with the authentication collaborator, not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Typed access to the three collections of a [`RecordStore`].
#[derive(Clone, Debug)]
pub struct Records<S> {
    store: S,
}

impl<S: RecordStore> Records<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_vec<T: DeserializeOwned>(&self, collection: Collection) -> ClaimResult<Vec<T>> {
        match self.store.load(collection)? {
            Some(payload) if !payload.trim().is_empty() => {
                serde_yaml::from_str::<Option<Vec<T>>>(&payload)
                    .map(Option::unwrap_or_default)
                    .map_err(|e| {
                        tracing::warn!("stored {:?} collection is unreadable: {}", collection, e);
                        ClaimError::YamlDeserialization(e)
                    })
            }
            _ => Ok(Vec::new()),
        }
    }

    fn save_vec<T: Serialize>(&self, collection: Collection, items: &[T]) -> ClaimResult<()> {
        let payload = serde_yaml::to_string(items).map_err(ClaimError::YamlSerialization)?;
        self.store.save(collection, &payload)
    }

    pub fn patients(&self) -> ClaimResult<Vec<Patient>> {
        self.load_vec(Collection::Patients)
    }

    pub fn save_patients(&self, patients: &[Patient]) -> ClaimResult<()> {
        self.save_vec(Collection::Patients, patients)
    }

    pub fn catalog(&self) -> ClaimResult<ReferenceCatalog> {
        self.load_vec(Collection::ReferenceTemplates)
            .map(ReferenceCatalog::new)
    }

    pub fn save_catalog(&self, catalog: &ReferenceCatalog) -> ClaimResult<()> {
        self.save_vec(Collection::ReferenceTemplates, catalog.templates())
    }

    pub fn users(&self) -> ClaimResult<Vec<User>> {
        self.load_vec(Collection::Users)
    }

    pub fn save_users(&self, users: &[User]) -> ClaimResult<()> {
        self.save_vec(Collection::Users, users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::template;
    use crate::patient::tests::patient;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_store_is_no_data() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let records = Records::new(FileStore::new(temp_dir.path().join("missing")));

        assert!(records.patients().expect("load should succeed").is_empty());
        assert!(records.catalog().expect("load should succeed").is_empty());
        assert!(records.users().expect("load should succeed").is_empty());
    }

    #[test]
    fn test_file_store_round_trips_collections() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let records = Records::new(FileStore::new(temp_dir.path().join("data")));

        let patients = vec![
            patient("p1").with_billing_amount(Some(1_000_000)),
            patient("p2"),
        ];
        records
            .save_patients(&patients)
            .expect("save_patients should succeed");

        let catalog = ReferenceCatalog::new(vec![template("J45.9", "Asthma", Some(2_114_700))]);
        records
            .save_catalog(&catalog)
            .expect("save_catalog should succeed");

        assert_eq!(records.patients().expect("load should succeed"), patients);
        assert_eq!(records.catalog().expect("load should succeed"), catalog);
        assert!(temp_dir.path().join("data").join(PATIENTS_FILENAME).is_file());
        assert!(!temp_dir
            .path()
            .join("data")
            .join("patients.yaml.tmp")
            .exists());
    }

    #[test]
    fn test_blank_payload_is_no_data() {
        let store = MemoryStore::new();
        store
            .save(Collection::Users, "  \n")
            .expect("save should succeed");
        let records = Records::new(store);

        assert!(records.users().expect("load should succeed").is_empty());
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let store = MemoryStore::new();
        store
            .save(Collection::Patients, "invalid: yaml: content: [[[")
            .expect("save should succeed");
        let records = Records::new(store);

        assert!(matches!(
            records.patients(),
            Err(ClaimError::YamlDeserialization(_))
        ));
    }

    #[test]
    fn test_users_round_trip_through_memory_store() {
        let records = Records::new(MemoryStore::new());
        let users = vec![User {
            id: "u1".into(),
            username: "verifikator".into(),
            name: "Dewi".into(),
            role: UserRole::Verifier,
        }];

        records.save_users(&users).expect("save_users should succeed");
        assert_eq!(records.users().expect("load should succeed"), users);
    }
}
