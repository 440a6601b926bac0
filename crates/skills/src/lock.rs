//! Advisory file locks serializing read-modify-write of store documents.

use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use fd_lock::RwLock;

use crate::error::{Error, Result};

/// Lock file name inside a store root.
pub const LOCK_FILE: &str = ".lock";

/// Run `f` while holding an exclusive lock on `lock_path`, blocking until the
/// lock is available. The lock is released when `f` returns.
pub fn with_exclusive_lock<T>(lock_path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::store_write(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| Error::store_write(lock_path, e))?;
    let mut lock = RwLock::new(file);
    let _guard = lock
        .write()
        .map_err(|e| Error::message(format!("lock failed on {}: {e}", lock_path.display())))?;
    f()
}

/// [`with_exclusive_lock`] on the blocking pool, so waiting for a lock held by
/// another process never stalls the async runtime.
pub async fn spawn_locked<T, F>(lock_path: PathBuf, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || with_exclusive_lock(&lock_path, f)).await?
}
