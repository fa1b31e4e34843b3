use crate::snapshot::DEFAULT_SNAPSHOT_FILE;
use std::path::PathBuf;

/// Environment variable overriding the snapshot path.
pub const SNAPSHOT_ENV: &str = "REFINDEX_SNAPSHOT";

/// Configuration for an [`Index`](crate::Index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Snapshot file used by `save_default`/`load_default`.
    pub snapshot_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
        }
    }
}

impl IndexConfig {
    /// Defaults overridden by `REFINDEX_SNAPSHOT`.
    pub fn from_env() -> Self {
        Self::from_var(std::env::var(SNAPSHOT_ENV).ok())
    }

    fn from_var(snapshot: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = snapshot.filter(|p| !p.trim().is_empty()) {
            config.snapshot_path = PathBuf::from(path);
        }
        config
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }
}
