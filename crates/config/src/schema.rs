/// Config schema types (project store, host store, fetch, validation).
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env_subst::expand_home;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UaspConfig {
    pub project: ProjectConfig,
    pub host: HostConfig,
    pub fetch: FetchConfig,
    pub validation: ValidationConfig,
}

/// Canonical per-project store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Store directory, relative to the project root unless absolute.
    pub dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".uasp"),
        }
    }
}

impl ProjectConfig {
    /// Store directory for the project rooted at `project_root`.
    pub fn store_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.dir)
    }
}

/// How the farm exposes host-store skill directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Symbolic link from the farm entry to the host-store directory.
    #[default]
    Symlink,
    /// Recursive copy, for platforms or filesystems without link support.
    Copy,
    /// Do not touch the farm directory.
    None,
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symlink => write!(f, "symlink"),
            Self::Copy => write!(f, "copy"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Per-user secondary store exposed to an external agent host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Default for the per-call host-store option.
    pub enabled: bool,
    pub store_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub farm_dir: PathBuf,
    pub link_mode: LinkMode,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_dir: PathBuf::from("~/.agents/skills"),
            ledger_path: PathBuf::from("~/.agents/.skill-lock.json"),
            farm_dir: PathBuf::from("~/.claude/skills"),
            link_mode: LinkMode::Symlink,
        }
    }
}

/// Host-store locations with `~` expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub store_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub farm_dir: PathBuf,
}

impl HostConfig {
    /// Absolute host-store locations. `None` when a `~` path cannot be
    /// expanded because the home directory is unknown.
    pub fn resolve(&self, home: Option<&Path>) -> Option<HostPaths> {
        let resolve = |path: &Path| {
            if home.is_none() && path.starts_with("~") {
                return None;
            }
            let expanded = expand_home(path, home);
            Some(std::path::absolute(&expanded).unwrap_or(expanded))
        };
        Some(HostPaths {
            store_dir: resolve(&self.store_dir)?,
            ledger_path: resolve(&self.ledger_path)?,
            farm_dir: resolve(&self.farm_dir)?,
        })
    }
}

/// Content fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound for a single fetch. Zero disables the timeout.
    pub timeout_secs: u64,
    /// Ref used when a location names none.
    pub default_ref: String,
    /// Base URL serving raw repository files.
    pub raw_base_url: String,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            default_ref: "main".into(),
            raw_base_url: "https://raw.githubusercontent.com".into(),
            user_agent: concat!("uasp/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Treat a `meta.version` fingerprint mismatch as an error instead of a warning.
    pub strict_version: bool,
}
