use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodescopeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CodescopeError {
    /// True for failures a bulk pass is allowed to swallow (the entity is
    /// omitted, the pass continues).
    pub fn is_degradable(&self) -> bool {
        matches!(self, CodescopeError::Backend(_) | CodescopeError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CodescopeError>;
