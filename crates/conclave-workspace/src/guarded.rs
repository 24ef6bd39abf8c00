//! Store mutations guarded by path locks.
//!
//! Each mutating call acquires the lock for its normalized path, runs the
//! store operation, and releases the lock when the guard drops, whether the
//! operation succeeded or not. Locks are never held across a whole turn.

use std::sync::Arc;

use crate::errors::Result;
use crate::lock::LockManager;
use crate::store::{FileSnapshot, WorkspaceStore};

/// A [`WorkspaceStore`] paired with the [`LockManager`] guarding it.
#[derive(Debug)]
pub struct GuardedWorkspace {
    store: WorkspaceStore,
    locks: Arc<LockManager>,
}

impl GuardedWorkspace {
    /// Pair a store with a lock manager.
    pub fn new(store: WorkspaceStore, locks: Arc<LockManager>) -> Self {
        Self { store, locks }
    }

    /// The underlying store.
    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    /// The lock table.
    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Create a file as `owner`.
    pub fn create(&self, owner: &str, path: &str, content: &str) -> Result<String> {
        let rel = self.store.normalize(path)?;
        let _guard = self.locks.guard(&rel, owner)?;
        self.store.create(&rel, content)
    }

    /// Replace text in a file as `owner`.
    pub fn replace(&self, owner: &str, path: &str, old: &str, new: &str) -> Result<String> {
        let rel = self.store.normalize(path)?;
        let _guard = self.locks.guard(&rel, owner)?;
        self.store.replace(&rel, old, new)
    }

    /// Delete a file as `owner`.
    pub fn delete(&self, owner: &str, path: &str) -> Result<String> {
        let rel = self.store.normalize(path)?;
        let _guard = self.locks.guard(&rel, owner)?;
        self.store.delete(&rel)
    }

    /// Read a file.
    pub fn read(&self, path: &str) -> Result<String> {
        self.store.read(path)
    }

    /// List files under `dir`.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        self.store.list(dir)
    }

    /// Committed snapshot of every file, for viewers.
    pub fn snapshot(&self) -> Result<Vec<FileSnapshot>> {
        self.store.snapshot()
    }

    /// Destructive reset of the whole tree.
    pub fn wipe(&self) -> Result<()> {
        self.store.wipe()
    }
}
