//! The shared term -> references index.
//!
//! Every operation takes exactly one lock mode from the index's
//! [`LockManager`] for its whole duration and releases it through a scoped
//! guard, so early returns, `?` and panics all release.
//!
//! The mapping itself sits in a `RwLock` that is only touched while a mode is
//! held: `Read`/`Save` take the read side, `Edit`/`Load` the write side. The
//! compatibility matrix already rules out every conflicting pair, so that
//! inner lock never blocks.

use crate::config::IndexConfig;
use crate::error::Result;
use crate::lock::{LockManager, LockMode, Wait};
use crate::snapshot::{self, Entries};
use parking_lot::RwLock;
use regex::RegexBuilder;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Inverted index guarded by a four-mode [`LockManager`].
#[derive(Debug, Default)]
pub struct Index {
    entries: RwLock<Entries>,
    locks: LockManager,
    config: IndexConfig,
}

/// Counts describing the index contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of distinct terms.
    pub terms: usize,
    /// Number of distinct references across all terms.
    pub references: usize,
    /// Number of (term, reference) pairs.
    pub postings: usize,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            entries: RwLock::new(Entries::new()),
            locks: LockManager::new(),
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The lock manager arbitrating access to this index.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    // ========================================================================
    // Edit
    // ========================================================================

    /// Associate `reference` with `term`.
    ///
    /// Adding an existing pair is a no-op. Returns whether the `Edit` lock
    /// was obtained.
    pub fn add(&self, term: &str, reference: &str, wait: Wait) -> bool {
        let Some(_guard) = self.locks.lock(LockMode::Edit, wait) else {
            tracing::debug!(term, reference, "add skipped, index busy");
            return false;
        };

        let mut entries = self.entries.write();
        let refs = entries.entry(term.to_string()).or_default();
        if !refs.iter().any(|r| r == reference) {
            refs.push(reference.to_string());
        }
        true
    }

    /// Remove `reference` from every term, dropping terms left empty.
    ///
    /// Returns whether the `Edit` lock was obtained.
    pub fn remove(&self, reference: &str, wait: Wait) -> bool {
        let Some(_guard) = self.locks.lock(LockMode::Edit, wait) else {
            tracing::debug!(reference, "remove skipped, index busy");
            return false;
        };

        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, refs| {
            refs.retain(|r| r != reference);
            !refs.is_empty()
        });
        tracing::debug!(reference, dropped_terms = before - entries.len(), "removed");
        true
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Collect the references of every term matching `pattern`.
    ///
    /// `pattern` is a case-insensitive regular expression matched anywhere in
    /// the term, so a plain word acts as a substring search. Matching
    /// references are appended to `hits`, which is then deduplicated and
    /// sorted. Returns `Ok(false)` with `hits` untouched if the `Read` lock
    /// was not obtained.
    pub fn search(&self, pattern: &str, hits: &mut Vec<String>, wait: Wait) -> Result<bool> {
        let matcher = RegexBuilder::new(pattern).case_insensitive(true).build()?;

        let Some(_guard) = self.locks.lock(LockMode::Read, wait) else {
            return Ok(false);
        };

        {
            let entries = self.entries.read();
            for (term, refs) in entries.iter() {
                if matcher.is_match(term) {
                    hits.extend(refs.iter().cloned());
                }
            }
        }
        hits.sort();
        hits.dedup();

        tracing::debug!(pattern, hits = hits.len(), "search");
        Ok(true)
    }

    /// Every term that maps to `reference`, in term order.
    ///
    /// Empty if the `Read` lock was not obtained.
    pub fn all_terms(&self, reference: &str, wait: Wait) -> Vec<String> {
        let Some(_guard) = self.locks.lock(LockMode::Read, wait) else {
            return Vec::new();
        };

        self.entries
            .read()
            .iter()
            .filter(|(_, refs)| refs.iter().any(|r| r == reference))
            .map(|(term, _)| term.clone())
            .collect()
    }

    /// Whether any term maps to `reference`. `false` if the `Read` lock was
    /// not obtained.
    pub fn reference_exists(&self, reference: &str, wait: Wait) -> bool {
        let Some(_guard) = self.locks.lock(LockMode::Read, wait) else {
            return false;
        };

        self.entries
            .read()
            .values()
            .any(|refs| refs.iter().any(|r| r == reference))
    }

    /// Whether `term` is a key of the index (exact, case-sensitive). `false`
    /// if the `Read` lock was not obtained.
    pub fn term_exists(&self, term: &str, wait: Wait) -> bool {
        let Some(_guard) = self.locks.lock(LockMode::Read, wait) else {
            return false;
        };

        self.entries.read().contains_key(term)
    }

    /// Term, reference and posting counts.
    pub fn stats(&self, wait: Wait) -> Option<IndexStats> {
        let _guard = self.locks.lock(LockMode::Read, wait)?;

        let entries = self.entries.read();
        let references: HashSet<&str> = entries.values().flatten().map(String::as_str).collect();
        Some(IndexStats {
            terms: entries.len(),
            references: references.len(),
            postings: entries.values().map(Vec::len).sum(),
        })
    }

    /// A copy of the whole mapping.
    pub fn entries(&self, wait: Wait) -> Option<Entries> {
        let _guard = self.locks.lock(LockMode::Read, wait)?;
        Some(self.entries.read().clone())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write a snapshot of the mapping to `writer` under the `Save` lock.
    ///
    /// Returns `Ok(false)` if the lock was not obtained.
    pub fn save_to<W: Write>(&self, writer: W, wait: Wait) -> Result<bool> {
        let Some(_guard) = self.locks.lock(LockMode::Save, wait) else {
            return Ok(false);
        };

        let entries = self.entries.read();
        snapshot::write_snapshot(writer, &entries)?;
        tracing::debug!(terms = entries.len(), "snapshot written");
        Ok(true)
    }

    /// Replace the mapping with a snapshot read from `reader` under the
    /// `Load` lock.
    ///
    /// The snapshot is decoded completely before the swap, so a malformed
    /// source leaves the index unchanged. Returns `Ok(false)` if the lock was
    /// not obtained.
    pub fn load_from<R: Read>(&self, reader: R, wait: Wait) -> Result<bool> {
        let Some(_guard) = self.locks.lock(LockMode::Load, wait) else {
            return Ok(false);
        };

        let loaded = snapshot::read_snapshot(reader)?;
        tracing::debug!(terms = loaded.len(), "snapshot read");
        *self.entries.write() = loaded;
        Ok(true)
    }

    /// Write a snapshot file at `path`, replacing any previous one.
    ///
    /// The file is only touched once the `Save` lock is held.
    pub fn save(&self, path: impl AsRef<Path>, wait: Wait) -> Result<bool> {
        let path = path.as_ref();
        let Some(_guard) = self.locks.lock(LockMode::Save, wait) else {
            return Ok(false);
        };

        let entries = self.entries.read();
        snapshot::save_file(path, &entries)?;
        tracing::info!(path = %path.display(), terms = entries.len(), "index saved");
        Ok(true)
    }

    /// Replace the mapping with the snapshot file at `path`.
    pub fn load(&self, path: impl AsRef<Path>, wait: Wait) -> Result<bool> {
        let path = path.as_ref();
        let Some(_guard) = self.locks.lock(LockMode::Load, wait) else {
            return Ok(false);
        };

        let loaded = snapshot::load_file(path)?;
        tracing::info!(path = %path.display(), terms = loaded.len(), "index loaded");
        *self.entries.write() = loaded;
        Ok(true)
    }

    /// [`save`](Self::save) to the configured snapshot path.
    pub fn save_default(&self, wait: Wait) -> Result<bool> {
        self.save(&self.config.snapshot_path, wait)
    }

    /// [`load`](Self::load) from the configured snapshot path.
    pub fn load_default(&self, wait: Wait) -> Result<bool> {
        self.load(&self.config.snapshot_path, wait)
    }
}

/// Thread-safe shared index handle.
pub type SharedIndex = Arc<Index>;

/// Create a new shared index.
pub fn create_index(config: IndexConfig) -> SharedIndex {
    Arc::new(Index::with_config(config))
}
