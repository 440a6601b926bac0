//! Farm entries exposing host-store skill directories to the agent host.

use std::{path::Path, sync::Arc};

use uasp_config::LinkMode;

use crate::error::{Error, Result};

pub trait LinkManager: Send + Sync {
    /// Replace whatever is at `link` with a fresh entry exposing `target`.
    fn refresh(&self, target: &Path, link: &Path) -> Result<()>;

    /// Remove the entry at `link`. `false` when nothing was there.
    fn remove(&self, link: &Path) -> Result<bool>;

    /// Whether `link` currently exposes `target`.
    fn is_current(&self, target: &Path, link: &Path) -> bool;
}

pub fn link_manager(mode: LinkMode) -> Arc<dyn LinkManager> {
    match mode {
        LinkMode::Symlink => Arc::new(SymlinkManager),
        LinkMode::Copy => Arc::new(CopyManager),
        LinkMode::None => Arc::new(NoopManager),
    }
}

/// Symbolic link from the farm entry to the skill directory.
pub struct SymlinkManager;

impl LinkManager for SymlinkManager {
    fn refresh(&self, target: &Path, link: &Path) -> Result<()> {
        // A relative target would resolve against the farm directory.
        let target = std::path::absolute(target)?;
        uasp_common::fs::remove_path(link)?;
        if let Some(parent) = link.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::store_write(parent, e))?;
        }
        symlink_dir(&target, link).map_err(|e| Error::store_write(link, e))
    }

    fn remove(&self, link: &Path) -> Result<bool> {
        Ok(uasp_common::fs::remove_path(link)?)
    }

    fn is_current(&self, target: &Path, link: &Path) -> bool {
        let is_link = std::fs::symlink_metadata(link).is_ok_and(|m| m.file_type().is_symlink());
        is_link
            && matches!(
                (std::fs::canonicalize(link), std::fs::canonicalize(target)),
                (Ok(a), Ok(b)) if a == b
            )
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Plain copy of the skill directory, for filesystems without links.
pub struct CopyManager;

impl LinkManager for CopyManager {
    fn refresh(&self, target: &Path, link: &Path) -> Result<()> {
        uasp_common::fs::remove_path(link)?;
        copy_dir(target, link)
    }

    fn remove(&self, link: &Path) -> Result<bool> {
        Ok(uasp_common::fs::remove_path(link)?)
    }

    fn is_current(&self, target: &Path, link: &Path) -> bool {
        same_tree(target, link).unwrap_or(false)
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| Error::store_write(to, e))?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest).map_err(|e| Error::store_write(&dest, e))?;
        }
    }
    Ok(())
}

fn same_tree(a: &Path, b: &Path) -> std::io::Result<bool> {
    if !b.is_dir() || std::fs::symlink_metadata(b)?.file_type().is_symlink() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(a)? {
        let entry = entry?;
        let other = b.join(entry.file_name());
        let same = if entry.file_type()?.is_dir() {
            same_tree(&entry.path(), &other)?
        } else {
            other.is_file() && std::fs::read(entry.path())? == std::fs::read(&other)?
        };
        if !same {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Leaves the farm alone.
pub struct NoopManager;

impl LinkManager for NoopManager {
    fn refresh(&self, _target: &Path, _link: &Path) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _link: &Path) -> Result<bool> {
        Ok(false)
    }

    fn is_current(&self, _target: &Path, _link: &Path) -> bool {
        true
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn skill_dir(root: &Path, body: &str) -> std::path::PathBuf {
        let dir = root.join("store/demo");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("SKILL.md"), body).unwrap();
        dir
    }

    #[cfg(unix)]
    #[test]
    fn symlink_refresh_replaces_stale_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let target = skill_dir(tmp.path(), "v1");
        let link = tmp.path().join("farm/demo");
        let links = link_manager(LinkMode::Symlink);

        // A stale plain directory in the way is replaced, not an error.
        std::fs::create_dir_all(&link).unwrap();
        links.refresh(&target, &link).unwrap();
        links.refresh(&target, &link).unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(links.is_current(&target, &link));
        assert_eq!(std::fs::read_to_string(link.join("SKILL.md")).unwrap(), "v1");

        assert!(links.remove(&link).unwrap());
        assert!(!links.remove(&link).unwrap());
        assert!(target.join("SKILL.md").exists(), "removing the link keeps the target");
    }

    #[test]
    fn copy_mode_tracks_content() {
        let tmp = tempfile::tempdir().unwrap();
        let target = skill_dir(tmp.path(), "v1");
        let link = tmp.path().join("farm/demo");
        let links = link_manager(LinkMode::Copy);

        links.refresh(&target, &link).unwrap();
        assert!(links.is_current(&target, &link));

        std::fs::write(target.join("SKILL.md"), "v2").unwrap();
        assert!(!links.is_current(&target, &link));
        links.refresh(&target, &link).unwrap();
        assert_eq!(std::fs::read_to_string(link.join("SKILL.md")).unwrap(), "v2");
    }

    #[test]
    fn noop_mode_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = skill_dir(tmp.path(), "v1");
        let link = tmp.path().join("farm/demo");
        let links = link_manager(LinkMode::None);
        links.refresh(&target, &link).unwrap();
        assert!(!tmp.path().join("farm").exists());
    }

    #[cfg(unix)]
    #[test]
    fn relative_target_is_linked_absolutely() {
        let tmp = tempfile::tempdir_in(".").unwrap();
        assert!(tmp.path().is_relative());
        let target = skill_dir(tmp.path(), "v1");
        let link = tmp.path().join("farm/demo");
        let links = link_manager(LinkMode::Symlink);

        links.refresh(&target, &link).unwrap();
        assert!(std::fs::read_link(&link).unwrap().is_absolute());
        assert_eq!(std::fs::read_to_string(link.join("SKILL.md")).unwrap(), "v1");
        assert!(links.is_current(&target, &link));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_not_current() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("store/demo");
        let link = tmp.path().join("farm/demo");
        std::fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(!link_manager(LinkMode::Symlink).is_current(&target, &link));
    }
}
