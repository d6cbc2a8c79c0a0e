use klaim_types::TextError;

/// Failure to produce a [`crate::Resolution`] for a diagnosis code.
///
/// Raised only on the generative path: a catalog hit cannot fail. A resolution error
/// blocks diagnosis creation and is never retried automatically.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("generative lookup failed: {0}")]
    Lookup(String),
    #[error("generative lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("generative lookup returned no {0}")]
    MissingField(&'static str),
    #[error("generative lookup returned invalid severity '{0}' (expected I, II or III)")]
    InvalidSeverity(String),
    #[error("generative lookup returned an empty document list")]
    EmptyDocuments,
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),

    #[error("could not resolve diagnosis code: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("a diagnosis resolution is already pending for patient {0}")]
    ResolutionPending(String),

    #[error("patient not found: {0}")]
    PatientNotFound(String),
    #[error("diagnosis not found: {0}")]
    DiagnosisNotFound(String),
    #[error("checklist item not found: {0}")]
    ChecklistItemNotFound(String),
    #[error("reference template not found: {0}")]
    TemplateNotFound(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read store file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write store file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),

    #[error("failed to write catalog export: {0}")]
    CatalogExport(String),
}

pub type ClaimResult<T> = std::result::Result<T, ClaimError>;
