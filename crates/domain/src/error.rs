/// Shared error type used across all parallel-search crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// The knowledge source answered, but had nothing for the lookup term.
    /// The enrichment orchestrator treats this as retryable with the raw query.
    #[error("empty result for '{0}'")]
    EmptyResult(String),

    #[error("request id already exists: {0}")]
    DuplicateRequest(String),

    #[error("subprocess: {0}")]
    Subprocess(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the "knowledge source had nothing" failure.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResult(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
