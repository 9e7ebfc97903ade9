use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Quarry operations
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Corrupt index {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Invalid document id: {0} (ids must be in 1..=0x7FFFFFF)")]
    InvalidId(u32),

    #[error("Invalid term: {0:?}")]
    InvalidTerm(String),

    #[error("Posting for term {term:?} would need {bytes} bytes, beyond the largest size class")]
    PostingTooLarge { term: String, bytes: usize },

    #[error("Dictionary error: {0}")]
    Dictionary(String),
}

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        QuarryError::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error means the on-disk image cannot be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, QuarryError::CorruptIndex { .. })
    }
}
