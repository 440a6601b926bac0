//! Per-user host store, its link farm, and the provenance ledger.
//!
//! ```text
//! <store_dir>/<name>/SKILL.md    secondary document
//! <store_dir>/.lock              guards ledger read-modify-write
//! <ledger_path>                  provenance per skill
//! <farm_dir>/<name>              link to <store_dir>/<name>
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    serde::{Deserialize, Serialize},
    uasp_config::HostPaths,
};

use crate::{
    catalog::document_path,
    convert::SECONDARY_FILE_NAME,
    error::{Error, Result},
    link::LinkManager,
    lock::{LOCK_FILE, with_exclusive_lock},
    parse::validate_name,
    persist::{JsonFileStore, Persistence},
    source::SkillSource,
    version::content_hash,
};

const LEDGER_VERSION: u32 = 1;

/// Provenance of one host-store install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// `owner/repo`, or the local directory.
    pub source: String,
    pub source_type: String,
    pub source_url: String,
    /// Canonical document path inside the source.
    pub skill_path: String,
    /// Canonical `meta.version`.
    pub version: String,
    /// SHA-256 of the secondary document as written.
    pub skill_folder_hash: String,
    pub installed_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockLedger {
    #[serde(default = "ledger_version")]
    pub version: u32,
    #[serde(default)]
    pub skills: BTreeMap<String, LedgerEntry>,
}

fn ledger_version() -> u32 {
    LEDGER_VERSION
}

impl Default for LockLedger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            skills: BTreeMap::new(),
        }
    }
}

/// Result of a host-store install. Link trouble is reported, not fatal.
#[derive(Debug, Clone)]
pub struct HostInstall {
    pub entry: LedgerEntry,
    pub warnings: Vec<String>,
}

/// How a ledger entry compares with what is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftState {
    Clean,
    /// Secondary document is gone.
    Missing,
    /// Secondary document differs from the recorded hash.
    Modified,
    /// Farm entry is absent or points elsewhere.
    Unlinked,
}

impl std::fmt::Display for DriftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Missing => write!(f, "missing"),
            Self::Modified => write!(f, "modified"),
            Self::Unlinked => write!(f, "unlinked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub name: String,
    pub state: DriftState,
}

pub struct HostStore {
    paths: HostPaths,
    ledger: Arc<dyn Persistence<LockLedger>>,
    links: Arc<dyn LinkManager>,
}

impl HostStore {
    pub fn new(paths: HostPaths, links: Arc<dyn LinkManager>) -> Self {
        let ledger = Arc::new(JsonFileStore::new(paths.ledger_path.clone()));
        Self {
            paths,
            ledger,
            links,
        }
    }

    pub fn with_persistence(
        paths: HostPaths,
        ledger: Arc<dyn Persistence<LockLedger>>,
        links: Arc<dyn LinkManager>,
    ) -> Self {
        Self {
            paths,
            ledger,
            links,
        }
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    pub fn skill_dir(&self, name: &str) -> PathBuf {
        self.paths.store_dir.join(name)
    }

    pub fn link_path(&self, name: &str) -> PathBuf {
        self.paths.farm_dir.join(name)
    }

    fn lock_path(&self) -> PathBuf {
        self.paths.store_dir.join(LOCK_FILE)
    }

    pub fn ledger(&self) -> Result<LockLedger> {
        self.ledger.load()
    }

    /// Write the secondary document, refresh the farm entry, and upsert the
    /// ledger. Every step overwrites, so repeating an install is harmless.
    pub fn install(
        &self,
        name: &str,
        secondary: &str,
        source: &SkillSource,
        version: &str,
        now_ms: u64,
    ) -> Result<HostInstall> {
        check_name(name)?;
        with_exclusive_lock(&self.lock_path(), || {
            let dir = self.skill_dir(name);
            std::fs::create_dir_all(&dir).map_err(|e| Error::store_write(&dir, e))?;
            uasp_common::fs::write_atomic(&dir.join(SECONDARY_FILE_NAME), secondary)?;

            let mut warnings = Vec::new();
            let link = self.link_path(name);
            match self.links.refresh(&dir, &link) {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    uasp_metrics::counter!(uasp_metrics::host_store::LINKS_REFRESHED_TOTAL)
                        .increment(1);
                },
                Err(e) => {
                    tracing::warn!(%name, link = %link.display(), error = %e, "farm link not refreshed");
                    warnings.push(format!("farm entry for '{name}' not refreshed: {e}"));
                },
            }

            let mut ledger = self.ledger.load()?;
            let installed_at_ms = ledger
                .skills
                .get(name)
                .map_or(now_ms, |existing| existing.installed_at_ms);
            let entry = LedgerEntry {
                source: source.origin(),
                source_type: source.source_type().to_string(),
                source_url: source.source_url(),
                skill_path: source.skill_path(&document_path(name)),
                version: version.to_string(),
                skill_folder_hash: content_hash(secondary),
                installed_at_ms,
                updated_at_ms: now_ms,
            };
            ledger.skills.insert(name.to_string(), entry.clone());
            self.ledger.save(&ledger)?;

            Ok(HostInstall { entry, warnings })
        })
    }

    /// Undo [`Self::install`]. Absent pieces are skipped; returns whether
    /// anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        with_exclusive_lock(&self.lock_path(), || {
            let mut removed = uasp_common::fs::remove_path(&self.skill_dir(name))?;
            removed |= self.links.remove(&self.link_path(name))?;

            let mut ledger = self.ledger.load()?;
            if ledger.skills.remove(name).is_some() {
                self.ledger.save(&ledger)?;
                removed = true;
            }
            Ok(removed)
        })
    }

    /// Drift of every ledger entry against disk, by name.
    pub fn status(&self) -> Result<Vec<DriftReport>> {
        let ledger = self.ledger.load()?;
        Ok(ledger
            .skills
            .iter()
            .map(|(name, entry)| DriftReport {
                name: name.clone(),
                state: self.drift(name, entry),
            })
            .collect())
    }

    /// Whether the ledger records `version` for `name` and its files on disk
    /// are intact.
    pub fn is_current(&self, name: &str, version: &str) -> bool {
        match self.ledger.load() {
            Ok(ledger) => ledger
                .skills
                .get(name)
                .is_some_and(|e| e.version == version && self.drift(name, e) == DriftState::Clean),
            Err(_) => false,
        }
    }

    fn drift(&self, name: &str, entry: &LedgerEntry) -> DriftState {
        let dir = self.skill_dir(name);
        let Ok(bytes) = std::fs::read(dir.join(SECONDARY_FILE_NAME)) else {
            return DriftState::Missing;
        };
        if content_hash(&bytes) != entry.skill_folder_hash {
            return DriftState::Modified;
        }
        if !self.links.is_current(&dir, &self.link_path(name)) {
            return DriftState::Unlinked;
        }
        DriftState::Clean
    }
}

/// Names become path components under the store and the farm.
fn check_name(name: &str) -> Result<()> {
    if validate_name(name) {
        Ok(())
    } else {
        Err(Error::validation(name, vec![format!("invalid skill name '{name}'")]))
    }
}

/// Whether `path` exists without following a trailing symlink.
pub fn entry_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
