use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No record is stored under the requested id.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("attachment is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The backing store failed. Never retried.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored value exists but does not deserialize. Distinct from `NotFound`.
    #[error("corrupt record {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no free email id after {0}")]
    IdConflict(String),

    #[error("invalid origin for attachment urls: {0}")]
    InvalidOrigin(String),
}

pub type Result<T> = std::result::Result<T, Error>;
