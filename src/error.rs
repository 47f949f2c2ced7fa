use thiserror::Error;

/// Failures of the local key/value backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("record encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by a remote document store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("remote store rejected write: {0}")]
    Rejected(String),
    #[error("document encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Mine registration rejected at the input guard.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid email address")]
    InvalidEmail,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no user signed in")]
    SignedOut,
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
