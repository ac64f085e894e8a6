/// Shared error type used across all CloudWatch-assistant crates.
///
/// Variants map onto the taxonomy the core error-handling design separates
/// by recoverability: transient conditions a caller may retry
/// (`RateLimit`, `Network`, `Timeout`) versus conditions that end the
/// current turn (`InvalidRequest`, `NotFound`, `BudgetOverflow`,
/// `CacheCorruption`).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite: {0}")]
    Sqlite(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("cache corrupted: {0}")]
    CacheCorruption(String),

    #[error("context budget exceeded: {0}")]
    BudgetOverflow(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the operation that produced this error is ever
    /// worthwhile. Used by the orchestrator's backoff loop to decide
    /// whether to surface the error immediately or schedule a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit(_) | Error::Network(_) | Error::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
