//! Filesystem helpers shared by the project and host stores.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Write `contents` to `path` via a sibling temp file and a rename, so readers
/// never observe a half-written file. Parent directories are created first.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::path(parent, e))?;
    }
    let tmp = temp_sibling(path);
    let contents = contents.as_ref();
    std::fs::write(&tmp, contents).map_err(|e| Error::path(&tmp, e))?;

    // Catch short writes before the rename makes them visible.
    let written = std::fs::metadata(&tmp).map_err(|e| Error::path(&tmp, e))?;
    if written.len() != contents.len() as u64 {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::message(format!(
            "staged write to {} is truncated ({} of {} bytes)",
            tmp.display(),
            written.len(),
            contents.len()
        )));
    }

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        Error::path(path, e)
    })
}

/// Remove a file, symlink, or directory tree. Returns `false` when nothing
/// was there. Symlinks are removed without following them.
pub fn remove_path(path: &Path) -> Result<bool> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::path(path, e)),
    };
    let result = if meta.file_type().is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        remove_file_or_link(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::path(path, e)),
    }
}

/// Rename a file out of the way as `<name>.corrupt`, replacing any earlier copy.
pub fn move_aside(path: &Path) -> Result<PathBuf> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    let dest = path.with_file_name(name);
    std::fs::rename(path, &dest).map_err(|e| Error::path(path, e))?;
    Ok(dest)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(windows)]
fn remove_file_or_link(path: &Path) -> std::io::Result<()> {
    // Directory symlinks on Windows must be removed with remove_dir.
    std::fs::remove_file(path).or_else(|_| std::fs::remove_dir(path))
}

#[cfg(not(windows))]
fn remove_file_or_link(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}
