//! Advisory per-path locks with owner identity and expiry.
//!
//! A lock is live while `now - acquired_at < timeout`. Expired locks are
//! treated as absent and reclaimed by whoever asks next. Time comes from
//! [`tokio::time::Instant`] so paused-clock tests can drive expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::errors::{Result, WorkspaceError};

/// A held lock on one workspace path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLock {
    /// Workspace-relative path.
    pub path: String,
    /// Owner identity.
    pub owner: String,
    /// When the lock was acquired or last refreshed.
    pub acquired_at: Instant,
}

impl FileLock {
    /// Whether the lock has outlived `timeout` at `now`.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.acquired_at) >= timeout
    }
}

/// Table of live path locks.
#[derive(Debug)]
pub struct LockManager {
    timeout: Duration,
    locks: Mutex<HashMap<String, FileLock>>,
}

impl LockManager {
    /// Create a manager whose locks expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock lifetime.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire or refresh the lock on `path` for `owner`.
    ///
    /// Succeeds when the path is free, the current lock has expired, or
    /// `owner` already holds it (re-entrant refresh).
    pub fn acquire(&self, path: &str, owner: &str) -> Result<()> {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        if let Some(held) = locks.get(path) {
            if held.owner != owner && !held.is_expired(now, self.timeout) {
                trace!(path, owner, holder = %held.owner, "lock contended");
                return Err(WorkspaceError::Locked {
                    path: path.to_owned(),
                    owner: held.owner.clone(),
                });
            }
            if held.owner != owner {
                debug!(path, owner, previous = %held.owner, "reclaimed expired lock");
            }
        }
        let _ = locks.insert(
            path.to_owned(),
            FileLock {
                path: path.to_owned(),
                owner: owner.to_owned(),
                acquired_at: now,
            },
        );
        Ok(())
    }

    /// Release the lock on `path` if `owner` is its live holder.
    ///
    /// Returns `false` otherwise. An expired entry is evicted either way.
    pub fn release(&self, path: &str, owner: &str) -> bool {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        let Some(held) = locks.get(path) else {
            return false;
        };
        if held.is_expired(now, self.timeout) {
            trace!(path, owner, holder = %held.owner, "evicting expired lock on release");
            let _ = locks.remove(path);
            return false;
        }
        if held.owner != owner {
            return false;
        }
        let _ = locks.remove(path);
        true
    }

    /// The live owner of `path`, evicting an expired entry.
    pub fn owner_of(&self, path: &str) -> Option<String> {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        let expired = locks.get(path)?.is_expired(now, self.timeout);
        if expired {
            let _ = locks.remove(path);
            return None;
        }
        locks.get(path).map(|l| l.owner.clone())
    }

    /// Number of entries currently recorded, expired or not.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether no entries are recorded.
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Acquire `path` for `owner` and return a guard that releases on drop.
    pub fn guard(self: &Arc<Self>, path: &str, owner: &str) -> Result<LockGuard> {
        self.acquire(path, owner)?;
        Ok(LockGuard {
            manager: Arc::clone(self),
            path: path.to_owned(),
            owner: owner.to_owned(),
        })
    }
}

/// Releases its lock when dropped, on every exit path.
#[derive(Debug)]
pub struct LockGuard {
    manager: Arc<LockManager>,
    path: String,
    owner: String,
}

impl LockGuard {
    /// Locked path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.manager.release(&self.path, &self.owner);
    }
}
