//! Shared Reference Index
//!
//! A small in-memory inverted index mapping terms to sets of references,
//! shared between concurrent callers and guarded by a four-mode cooperative
//! lock.
//!
//! # Architecture
//!
//! - **[`LockManager`]**: arbitrates the `Load`, `Save`, `Edit` and `Read`
//!   modes with an asymmetric compatibility matrix. Reads run alongside each
//!   other and alongside a snapshot save; edits and loads are exclusive.
//! - **[`Index`]**: the term -> references mapping. Every operation takes one
//!   lock mode for its whole duration and releases it on every exit path.
//! - **[`snapshot`]**: versioned bincode encoding used by `save`/`load`.
//!
//! Each operation accepts a [`Wait`] flag. With [`Wait::NoWait`] contention
//! is reported as `false` (or an empty result) instead of blocking.
//!
//! # Usage
//!
//! ```
//! use ref_index::{Index, Wait};
//!
//! let index = Index::new();
//! index.add("onion", "Page 5", Wait::Block);
//!
//! let mut hits = Vec::new();
//! assert!(index.search("ONI", &mut hits, Wait::Block).unwrap());
//! assert_eq!(hits, vec!["Page 5"]);
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod lock;
pub mod snapshot;

// Re-exports
pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use index::{Index, IndexStats, SharedIndex, create_index};
pub use lock::{LockGuard, LockManager, LockMode, Wait};
pub use snapshot::{DEFAULT_SNAPSHOT_FILE, Entries, SNAPSHOT_VERSION};
