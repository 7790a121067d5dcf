use thiserror::Error;

/// Errors produced by key derivation, prefix search and key-file handling
#[derive(Debug, Error)]
pub enum KeygenError {
    /// The secure random source cannot produce seeds. Fatal.
    #[error("secure random source unavailable: {0}")]
    RandomnessUnavailable(String),

    /// A single derivation failed. The search loop skips the attempt.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("search worker failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KeygenError {
    /// Whether the error must abort a search rather than skip one attempt
    pub fn is_fatal(&self) -> bool {
        !matches!(self, KeygenError::Derivation(_))
    }
}

pub type Result<T> = std::result::Result<T, KeygenError>;
