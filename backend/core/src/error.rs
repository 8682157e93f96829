use thiserror::Error;

/// Top-level error type for the aquadash backend.
#[derive(Debug, Error)]
pub enum DashError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream model error ({provider}): {message}")]
    Upstream { provider: String, message: String },

    #[error("wework api error {code}: {message}")]
    WeWork { code: i64, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DashError {
    /// Wrap a provider failure that happened before any bytes were relayed.
    pub fn upstream(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: err.to_string(),
        }
    }
}
