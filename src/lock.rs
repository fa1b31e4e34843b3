//! Four-mode cooperative lock manager.
//!
//! Unlike a reader/writer lock, access intent is split into four modes whose
//! compatibility is asymmetric:
//!
//! | held   | may additionally acquire |
//! |--------|--------------------------|
//! | `Load` | nothing                  |
//! | `Edit` | nothing                  |
//! | `Save` | `Read`                   |
//! | `Read` | `Read`, `Save`           |
//!
//! A request is approved only when *every* held mode allows it. Blocking
//! requests park on a condition variable that is broadcast on each release
//! and re-check approval when woken. There is no fairness between waiters.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::str::FromStr;

/// A named category of access intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Wholesale replacement of the index from a snapshot.
    Load,
    /// Serializing a snapshot of the index.
    Save,
    /// Structural mutation (add/remove).
    Edit,
    /// Lookups and searches.
    Read,
}

impl LockMode {
    pub const ALL: [LockMode; 4] = [
        LockMode::Load,
        LockMode::Save,
        LockMode::Edit,
        LockMode::Read,
    ];

    fn slot(self) -> usize {
        match self {
            LockMode::Load => 0,
            LockMode::Save => 1,
            LockMode::Edit => 2,
            LockMode::Read => 3,
        }
    }

    /// Modes that may be acquired while `self` is held.
    pub fn compatible(self) -> &'static [LockMode] {
        match self {
            LockMode::Load | LockMode::Edit => &[],
            LockMode::Save => &[LockMode::Read],
            LockMode::Read => &[LockMode::Read, LockMode::Save],
        }
    }

    /// Whether `other` may be acquired while `self` is held.
    pub fn allows(self, other: LockMode) -> bool {
        self.compatible().contains(&other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::Load => "load",
            LockMode::Save => "save",
            LockMode::Edit => "edit",
            LockMode::Read => "read",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(LockMode::Load),
            "save" => Ok(LockMode::Save),
            "edit" => Ok(LockMode::Edit),
            "read" => Ok(LockMode::Read),
            other => Err(format!(
                "Unknown lock mode: {}. Use: load, save, edit, read",
                other
            )),
        }
    }
}

/// Whether an acquisition may suspend the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wait {
    /// Suspend until the request is approved.
    Block,
    /// Report contention immediately.
    #[default]
    NoWait,
}

impl From<bool> for Wait {
    fn from(wait: bool) -> Self {
        if wait { Wait::Block } else { Wait::NoWait }
    }
}

/// Arbitrates the four lock modes.
///
/// The active multiset is a per-mode hold count. Checking and updating it is
/// a short critical section under `active`; blocked acquirers sleep on
/// `released`.
#[derive(Debug, Default)]
pub struct LockManager {
    active: Mutex<[usize; 4]>,
    released: Condvar,
}

fn approved(active: &[usize; 4], mode: LockMode) -> bool {
    LockMode::ALL
        .iter()
        .all(|held| active[held.slot()] == 0 || held.allows(mode))
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to add `mode` to the active set.
    ///
    /// With [`Wait::NoWait`] this returns `false` as soon as a held mode
    /// disallows the request. With [`Wait::Block`] it waits for releases
    /// until approved and always returns `true`.
    pub fn acquire(&self, mode: LockMode, wait: Wait) -> bool {
        let mut active = self.active.lock();

        if !approved(&active, mode) {
            if wait == Wait::NoWait {
                tracing::trace!(%mode, ?active, "lock denied");
                return false;
            }

            tracing::trace!(%mode, ?active, "lock busy, waiting");
            while !approved(&active, mode) {
                self.released.wait(&mut active);
            }
        }

        active[mode.slot()] += 1;
        tracing::trace!(%mode, ?active, "lock approved");
        true
    }

    /// Remove one held instance of `mode`.
    ///
    /// Returns `false` if `mode` was not held. Other holders of the same mode
    /// keep their hold.
    pub fn release(&self, mode: LockMode) -> bool {
        let mut active = self.active.lock();
        let count = &mut active[mode.slot()];
        if *count == 0 {
            tracing::warn!(%mode, "release of a lock mode that is not held");
            return false;
        }
        *count -= 1;
        tracing::trace!(%mode, ?active, "lock released");
        drop(active);

        self.released.notify_all();
        true
    }

    /// Scoped acquisition: the returned guard releases `mode` when dropped.
    pub fn lock(&self, mode: LockMode, wait: Wait) -> Option<LockGuard<'_>> {
        self.acquire(mode, wait).then(|| LockGuard {
            manager: self,
            mode,
        })
    }

    /// Number of current holders of `mode`.
    pub fn held(&self, mode: LockMode) -> usize {
        self.active.lock()[mode.slot()]
    }

    /// True when no mode is held.
    pub fn is_idle(&self) -> bool {
        self.active.lock().iter().all(|&count| count == 0)
    }
}

/// A held lock mode, released exactly once on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    mode: LockMode,
}

impl LockGuard<'_> {
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.mode);
    }
}
