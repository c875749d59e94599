//! Shared tree handle for concurrent callers
//!
//! Mutations take the write lock for the whole mutate-then-persist sequence,
//! so the store file is never rewritten by two callers at once. Readers share
//! the read lock and always see a consistent index.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::{Result, TreeError};
use super::tree::MemoryTree;

/// Cloneable, thread-safe handle to one [`MemoryTree`]
#[derive(Debug, Clone)]
pub struct SharedTree {
    inner: Arc<RwLock<MemoryTree>>,
}

impl SharedTree {
    pub fn new(tree: MemoryTree) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, MemoryTree>> {
        self.inner.read().map_err(|_| TreeError::LockPoisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryTree>> {
        self.inner.write().map_err(|_| TreeError::LockPoisoned)
    }

    /// Run a read-only closure under the read lock
    pub fn with_read<T>(&self, f: impl FnOnce(&MemoryTree) -> T) -> Result<T> {
        let tree = self.read()?;
        Ok(f(&tree))
    }

    /// Run a mutation under the write lock
    pub fn with_write<T>(&self, f: impl FnOnce(&mut MemoryTree) -> Result<T>) -> Result<T> {
        let mut tree = self.write()?;
        f(&mut tree)
    }
}

impl From<MemoryTree> for SharedTree {
    fn from(tree: MemoryTree) -> Self {
        Self::new(tree)
    }
}
