use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("invalid publication number: {0}")]
    InvalidPublicationNumber(String),

    #[error("invalid IPC subclass: {0}")]
    InvalidIpcSubclass(String),

    /// Fatal for a whole batch: without a bearer token nothing can be fetched.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    Api(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl OpsError {
    /// Transient errors are recorded per item and the batch continues;
    /// anything else aborts it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::RateLimit(_, _) | Self::Http(_) | Self::Api(_, _)
        )
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;
