use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by index operations.
///
/// Lock contention is never an error: operations report it through their
/// boolean or empty results instead.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Snapshot error: incompatible version {actual}, expected <= {expected}")]
    IncompatibleSnapshot { expected: u32, actual: u32 },

    #[error("Snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Whether the failure came from the snapshot source or destination
    /// rather than from caller input.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            IndexError::Io(_)
                | IndexError::Serialization(_)
                | IndexError::IncompatibleSnapshot { .. }
                | IndexError::SnapshotNotFound(_)
        )
    }
}
