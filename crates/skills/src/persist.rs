//! Load/save port for the project settings document and the host ledger.

use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Persistence backend for a whole document.
pub trait Persistence<T>: Send + Sync {
    /// Current document. A missing document loads as `T::default()`.
    fn load(&self) -> Result<T>;
    fn save(&self, value: &T) -> Result<()>;
}

/// Pretty JSON on disk, saved atomically.
///
/// A document that fails to parse is moved aside to `<file>.corrupt` and
/// loads as empty, so one bad write never wedges later installs.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Persistence<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        match serde_json::from_str(&data) {
            Ok(value) => Ok(value),
            Err(source) => {
                let err = Error::IndexCorruption {
                    path: self.path.clone(),
                    source,
                };
                match uasp_common::fs::move_aside(&self.path) {
                    Ok(moved) => tracing::warn!(
                        error = %err,
                        moved_to = %moved.display(),
                        "recovered from corrupt document, starting empty"
                    ),
                    Err(move_err) => tracing::warn!(
                        error = %err,
                        %move_err,
                        "corrupt document could not be moved aside, starting empty"
                    ),
                }
                Ok(T::default())
            },
        }
    }

    fn save(&self, value: &T) -> Result<()> {
        let mut data = serde_json::to_string_pretty(value)?;
        data.push('\n');
        uasp_common::fs::write_atomic(&self.path, data)?;
        Ok(())
    }
}

/// In-memory backend for tests. Counts saves so tests can assert that an
/// operation wrote nothing.
pub struct MemoryStore<T> {
    value: Mutex<T>,
    saves: Mutex<usize>,
}

impl<T: Default> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> MemoryStore<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Clone + Send> Persistence<T> for MemoryStore<T> {
    fn load(&self) -> Result<T> {
        Ok(self.value.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, value: &T) -> Result<()> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = value.clone();
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
