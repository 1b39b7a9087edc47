use thiserror::Error;

/// Failure of a catalog or translation lookup.
///
/// Cloneable so a single upstream outcome can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("creature `{name}` not found")]
    NotFound { name: String },
    #[error("upstream rate limit reached")]
    TooManyRequests,
    #[error("upstream request failed: {message}")]
    Upstream { message: String },
    #[error("lookup deadline exceeded")]
    Timeout,
    #[error("shared upstream request was abandoned")]
    Abandoned,
}

impl LookupError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}
