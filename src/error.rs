use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error kinds surfaced by the core engine.
///
/// The API layer maps these onto HTTP status codes; components below it
/// never inspect status codes, only kinds.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-range request input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown session, chunk, or workflow memory id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A second feedback submission for an already-finalised session.
    #[error("feedback already finalised for session {0}")]
    AlreadyFinalised(i64),

    /// Embedding or LLM upstream failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Persistence failure in one of the backing stores.
    #[error("store error: {0}")]
    Store(String),

    /// Deadline exceeded on an external call.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Invariant violation; always a server-side bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable kind string used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::NotFound(_) => "not_found",
            CoreError::AlreadyFinalised(_) => "already_finalised",
            CoreError::Provider(_) => "provider_error",
            CoreError::Store(_) => "store_error",
            CoreError::Timeout(_) => "timeout",
            CoreError::Internal(_) => "internal",
        }
    }

    /// Whether a bounded in-component retry is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Provider(_) | CoreError::Store(_))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Store(e.to_string())
    }
}
