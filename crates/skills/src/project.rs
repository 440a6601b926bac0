//! Canonical per-project store.
//!
//! Layout under the store root (default `<project>/.uasp`):
//!
//! ```text
//! settings.json              installed records + keyword index
//! <name>/<name>.uasp.yaml    canonical document, byte-for-byte as fetched
//! ```
//!
//! The document write and the settings update are separate steps. Each is
//! atomic (temp file + rename) but a crash between them leaves a document on
//! disk without a record, or the reverse; reinstalling repairs either case.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    lock::LOCK_FILE,
    parse::{ParsedSkill, document_file_name, validate_name},
    persist::{JsonFileStore, Persistence},
    source::SkillSource,
    types::SkillKind,
};

pub const SETTINGS_FILE: &str = "settings.json";
const SETTINGS_VERSION: u32 = 1;

/// One installed skill. At most one record per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledSkillRecord {
    pub name: String,
    pub version: String,
    pub kind: SkillKind,
    /// Canonical document path relative to the store root.
    pub path: String,
    pub enabled: bool,
    pub installed_at_ms: u64,
    pub source: SkillSource,
}

/// The project settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "settings_version")]
    pub version: u32,
    #[serde(default)]
    pub installed: Vec<InstalledSkillRecord>,
    /// Trigger keyword → names of installed skills declaring it.
    /// Never holds an empty set.
    #[serde(default)]
    pub keywords: BTreeMap<String, BTreeSet<String>>,
}

fn settings_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            installed: Vec::new(),
            keywords: BTreeMap::new(),
        }
    }
}

impl ProjectSettings {
    pub fn get(&self, name: &str) -> Option<&InstalledSkillRecord> {
        self.installed.iter().find(|r| r.name == name)
    }

    /// Replace any record for the same name and re-point its keywords.
    pub fn upsert(&mut self, record: InstalledSkillRecord, keywords: &[String]) {
        self.unindex(&record.name);
        for keyword in keywords {
            self.keywords
                .entry(keyword.clone())
                .or_default()
                .insert(record.name.clone());
        }
        self.installed.retain(|r| r.name != record.name);
        self.installed.push(record);
    }

    /// Drop the record and every keyword reference. `None` if not installed.
    pub fn remove(&mut self, name: &str) -> Option<InstalledSkillRecord> {
        let pos = self.installed.iter().position(|r| r.name == name)?;
        let record = self.installed.remove(pos);
        self.unindex(name);
        Some(record)
    }

    fn unindex(&mut self, name: &str) {
        self.keywords.retain(|_, names| {
            names.remove(name);
            !names.is_empty()
        });
    }

    /// Names indexed under `keyword` (exact match, case-insensitive).
    pub fn find_by_keyword(&self, keyword: &str) -> BTreeSet<String> {
        self.keywords
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .flat_map(|(_, names)| names.iter().cloned())
            .collect()
    }

    /// Records whose keywords or name contain `term`, exact keyword hits first.
    pub fn search(&self, term: &str) -> Vec<&InstalledSkillRecord> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        let exact = self.find_by_keyword(&term);
        let partial: BTreeSet<String> = self
            .keywords
            .iter()
            .filter(|(k, _)| k.to_lowercase().contains(&term))
            .flat_map(|(_, names)| names.iter().cloned())
            .chain(
                self.installed
                    .iter()
                    .filter(|r| r.name.contains(&term))
                    .map(|r| r.name.clone()),
            )
            .filter(|name| !exact.contains(name))
            .collect();
        exact
            .iter()
            .chain(partial.iter())
            .filter_map(|name| self.get(name))
            .collect()
    }
}

/// Canonical store for one project.
pub struct ProjectStore {
    root: PathBuf,
    settings: Arc<dyn Persistence<ProjectSettings>>,
}

impl ProjectStore {
    /// Store rooted at `root`, settings in `root/settings.json`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let settings = Arc::new(JsonFileStore::new(root.join(SETTINGS_FILE)));
        Self { root, settings }
    }

    pub fn with_persistence(
        root: impl Into<PathBuf>,
        settings: Arc<dyn Persistence<ProjectSettings>>,
    ) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn skill_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn settings(&self) -> Result<ProjectSettings> {
        self.settings.load()
    }

    /// Write the raw document, then record it and index its keywords.
    pub fn install(
        &self,
        skill: &ParsedSkill,
        source: &SkillSource,
        installed_at_ms: u64,
    ) -> Result<InstalledSkillRecord> {
        let name = skill.name();
        if !validate_name(name) {
            return Err(Error::validation(name, vec![format!("invalid skill name '{name}'")]));
        }

        let file_name = document_file_name(name);
        let doc_path = self.skill_dir(name).join(&file_name);
        uasp_common::fs::write_atomic(&doc_path, &skill.raw)?;

        let record = InstalledSkillRecord {
            name: name.to_string(),
            version: skill.document.version().to_string(),
            kind: skill.document.kind(),
            path: format!("{name}/{file_name}"),
            enabled: true,
            installed_at_ms,
            source: source.clone(),
        };

        let mut settings = self.settings.load()?;
        settings.upsert(record.clone(), skill.document.keywords());
        self.settings.save(&settings)?;

        tracing::debug!(%name, path = %doc_path.display(), "wrote canonical document");
        Ok(record)
    }

    /// Remove the record, its keywords, and its directory. `false` when the
    /// name is not installed, in which case nothing is touched.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut settings = self.settings.load()?;
        if settings.remove(name).is_none() {
            return Ok(false);
        }
        self.settings.save(&settings)?;
        if validate_name(name) {
            uasp_common::fs::remove_path(&self.skill_dir(name))?;
        }
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Result<Option<InstalledSkillRecord>> {
        Ok(self.settings.load()?.get(name).cloned())
    }

    /// Installed records sorted by name.
    pub fn list(&self) -> Result<Vec<InstalledSkillRecord>> {
        let mut records = self.settings.load()?.installed;
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    pub fn search(&self, term: &str) -> Result<Vec<InstalledSkillRecord>> {
        let settings = self.settings.load()?;
        Ok(settings.search(term).into_iter().cloned().collect())
    }

    /// Stored canonical document text, if installed.
    pub fn read_document(&self, name: &str) -> Result<Option<String>> {
        let Some(record) = self.get(name)? else {
            return Ok(None);
        };
        let path = self.root.join(&record.path);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{parse::parse_document, persist::MemoryStore},
    };

    fn skill(name: &str, keywords: &[&str]) -> ParsedSkill {
        let raw = format!(
            "meta:\n  name: {name}\n  version: '00000000'\n  type: knowledge\ntriggers:\n  keywords: [{}]\n",
            keywords.join(", ")
        );
        parse_document(&raw).unwrap()
    }

    fn local() -> SkillSource {
        SkillSource::Local {
            path: PathBuf::from("/src"),
        }
    }

    #[test]
    fn install_writes_document_and_index() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(tmp.path().join(".uasp"));
        let parsed = skill("demo-skill", &["alpha", "beta"]);

        let record = store.install(&parsed, &local(), 42).unwrap();
        assert_eq!(record.path, "demo-skill/demo-skill.uasp.yaml");
        assert!(record.enabled);

        let on_disk =
            std::fs::read_to_string(tmp.path().join(".uasp/demo-skill/demo-skill.uasp.yaml"))
                .unwrap();
        assert_eq!(on_disk, parsed.raw);

        let settings = store.settings().unwrap();
        assert_eq!(settings.installed.len(), 1);
        assert_eq!(settings.keywords["alpha"], BTreeSet::from(["demo-skill".to_string()]));
        assert_eq!(settings.keywords["beta"], BTreeSet::from(["demo-skill".to_string()]));
    }

    #[test]
    fn reinstall_keeps_one_record_and_repoints_keywords() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(tmp.path());
        store.install(&skill("s", &["old", "shared"]), &local(), 1).unwrap();
        store.install(&skill("s", &["shared", "new"]), &local(), 2).unwrap();

        let settings = store.settings().unwrap();
        assert_eq!(settings.installed.len(), 1);
        assert_eq!(settings.installed[0].installed_at_ms, 2);
        assert_eq!(settings.keywords.keys().collect::<Vec<_>>(), ["new", "shared"]);
        assert_eq!(settings.keywords["shared"].len(), 1);
    }

    #[test]
    fn remove_prunes_empty_keywords_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(tmp.path());
        store.install(&skill("a", &["solo", "common"]), &local(), 1).unwrap();
        store.install(&skill("b", &["common"]), &local(), 1).unwrap();

        assert!(store.remove("a").unwrap());
        let settings = store.settings().unwrap();
        assert!(!settings.keywords.contains_key("solo"));
        assert_eq!(settings.keywords["common"], BTreeSet::from(["b".to_string()]));
        assert!(!tmp.path().join("a").exists());
        assert!(tmp.path().join("b/b.uasp.yaml").exists());
    }

    #[test]
    fn remove_unknown_touches_nothing() {
        let settings = Arc::new(MemoryStore::<ProjectSettings>::default());
        let store = ProjectStore::with_persistence("/nonexistent/.uasp", settings.clone());
        assert!(!store.remove("ghost").unwrap());
        assert_eq!(settings.save_count(), 0);
    }

    #[test]
    fn invalid_names_never_reach_the_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(tmp.path());
        let mut parsed = skill("ok", &[]);
        parsed.document.meta.name = "../escape".into();
        assert!(matches!(
            store.install(&parsed, &local(), 0),
            Err(Error::Validation { .. })
        ));
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn search_ranks_exact_keyword_hits_first() {
        let mut settings = ProjectSettings::default();
        let record = |name: &str| InstalledSkillRecord {
            name: name.into(),
            version: "00000000".into(),
            kind: SkillKind::Cli,
            path: format!("{name}/{name}.uasp.yaml"),
            enabled: true,
            installed_at_ms: 0,
            source: local(),
        };
        settings.upsert(record("browser-tools"), &["web".into()]);
        settings.upsert(record("scraper"), &["webpage".into(), "Web".into()]);
        settings.upsert(record("git-helper"), &["vcs".into()]);

        let hits: Vec<&str> = settings.search("WEB").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(hits, ["browser-tools", "scraper"]);
        let hits: Vec<&str> = settings.search("git").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(hits, ["git-helper"]);
        assert!(settings.search("  ").is_empty());
        assert_eq!(settings.find_by_keyword("vcs").len(), 1);
    }

    #[test]
    fn read_document_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(tmp.path());
        store.install(&skill("zeta", &[]), &local(), 0).unwrap();
        store.install(&skill("alpha", &[]), &local(), 0).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert!(store.read_document("alpha").unwrap().unwrap().contains("name: alpha"));
        assert!(store.read_document("missing").unwrap().is_none());
    }
}
