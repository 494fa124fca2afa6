/// Rejections raised at the assessment input boundary.
///
/// These are caller errors: the input is refused before classification and never coerced
/// to a default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("at least one symptom is required")]
    EmptySymptoms,
    #[error("symptom identifier cannot be blank")]
    BlankSymptom,
    #[error("unknown age group: '{0}'")]
    UnknownAgeGroup(String),
    #[error("unknown symptom duration: '{0}'")]
    UnknownDuration(String),
    #[error("unknown severity: '{0}'")]
    UnknownSeverity(String),
    #[error("unknown medicine option: '{0}'")]
    UnknownMedicine(String),
    #[error("unknown existing-conditions answer: '{0}'")]
    UnknownConditions(String),
    #[error("unknown risk tier: '{0}'")]
    UnknownRiskTier(String),
    #[error("unknown submission mode: '{0}'")]
    UnknownMode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid assessment: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid symptom taxonomy: {0}")]
    Taxonomy(String),
    #[error("failed to read taxonomy file: {0}")]
    TaxonomyRead(std::io::Error),
    #[error("failed to parse taxonomy YAML: {0}")]
    TaxonomyParse(serde_yaml::Error),

    #[error("failed to create store directory: {0}")]
    StoreDirCreation(std::io::Error),
    #[error("failed to read store entry '{key}': {source}")]
    StoreRead {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write store entry '{key}': {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid store key: '{0}'")]
    InvalidStoreKey(String),
    #[error("store lock at {path} could not be acquired", path = path.display())]
    StoreLockTimeout { path: std::path::PathBuf },
    #[error("pending queue kept changing underneath us after {attempts} attempts")]
    QueueContention { attempts: u32 },
    #[error("store task did not complete: {0}")]
    StoreTask(String),

    #[error("case not found: {0}")]
    CaseNotFound(String),
    #[error("failed to write case file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read case file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
    #[error("invalid identifier: {0}")]
    Identifier(#[from] swasth_uuid::UuidError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
