use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid repository location {location}: {reason}")]
    #[diagnostic(help("use an absolute http(s):// or file:// URL"))]
    InvalidRepository { location: String, reason: String },

    #[error("invalid {kind} segment: {value:?}")]
    #[diagnostic(help("segments may contain letters, digits, '.', '_', '+' and '-'"))]
    InvalidSegment { kind: &'static str, value: String },

    #[error("no version given")]
    MissingVersion,

    #[error("invalid classifier: {0}")]
    InvalidClassifier(String),

    #[error("invalid archive format: {0}")]
    InvalidFormat(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("transfer failed for {url}: {message}")]
    Transfer { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("length mismatch for {url}: got {transferred} bytes, declared {total}")]
    LengthMismatch {
        url: String,
        transferred: u64,
        total: u64,
    },

    #[error("cannot write {target}: {message}")]
    Sink { target: String, message: String },

    #[error("cache path {path} is already claimed by {owner}")]
    #[diagnostic(help("module and classifier names flatten into one file name; rename one of them"))]
    CacheCollision { path: PathBuf, owner: String },

    #[error("loader rejected {path}: {message}")]
    Loader { path: PathBuf, message: String },

    #[error("cannot start fetch worker: {0}")]
    WorkerSpawn(String),

    #[error("fetch worker for {0} stopped without reporting")]
    Abandoned(String),

    #[error("finalize callback failed: {0}")]
    Callback(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl FetchError {
    pub(crate) fn sink(target: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        FetchError::Sink {
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn transfer(url: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        FetchError::Transfer {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Configuration problems abort a request before anything is dispatched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidRepository { .. }
                | FetchError::InvalidSegment { .. }
                | FetchError::MissingVersion
                | FetchError::InvalidClassifier(_)
                | FetchError::InvalidFormat(_)
                | FetchError::ConfigRead(_)
                | FetchError::ConfigParse(_)
        )
    }
}
