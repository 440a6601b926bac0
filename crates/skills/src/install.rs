//! Install/remove orchestration across the project store and the optional
//! host store.
//!
//! Install runs resolve → fetch → validate → project store → convert → host
//! store. Anything up to and including validation aborts before a single
//! write. The project store write is mandatory; the host-store step is best
//! effort and its failure only adds a warning to the report.
//!
//! Project-store mutations run under an exclusive lock on
//! `<project store>/.lock`, so concurrent installers on one project serialize
//! instead of racing on `settings.json`. Locked and other blocking filesystem
//! sections run on the blocking pool.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[cfg(feature = "metrics")]
use uasp_metrics::{
    counter, fetch as fetch_metrics, histogram, host_store as host_metrics,
    installer as installer_metrics, labels,
};
use {serde::Serialize, uasp_common::now_ms, uasp_config::UaspConfig};

use crate::{
    catalog::{Catalog, INDEX_FILE, document_path},
    convert::{InstallMeta, to_secondary_format},
    error::{Error, FetchError, Result},
    fetch::{ContentFetcher, DefaultFetcher, fetch_with_timeout},
    host::{DriftReport, HostStore},
    link::link_manager,
    lock::spawn_locked,
    parse::{ParsedSkill, parse_document, validate_name},
    project::{InstalledSkillRecord, ProjectStore},
    source::{SkillSource, SourceResolver},
    validate::{SchemaValidator, StructuralValidator},
};

/// Note attached to a successful install that skipped or failed the host store.
pub const SECONDARY_NOT_INSTALLED: &str = "secondary store not installed";

/// Note attached to a successful remove whose host-store cleanup failed.
pub const SECONDARY_NOT_CLEANED: &str = "secondary store not cleaned";

/// What to install from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    Skill(String),
    /// Every skill listed in the source's `index.json`.
    All,
}

impl From<&str> for InstallTarget {
    fn from(value: &str) -> Self {
        match value {
            "all" => Self::All,
            name => Self::Skill(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Rewrite everything even when the recorded version already matches.
    pub force: bool,
    /// Also install into the per-user host store.
    pub host_store: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub host_store: bool,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub record: InstalledSkillRecord,
    pub secondary_installed: bool,
    /// Recorded version already matched; nothing was rewritten.
    pub up_to_date: bool,
    pub warnings: Vec<String>,
}

impl InstallReport {
    /// One-line note for a success that deserves one.
    pub fn note(&self) -> Option<String> {
        if self.up_to_date {
            Some("already up to date".into())
        } else if !self.secondary_installed {
            Some(SECONDARY_NOT_INSTALLED.into())
        } else {
            None
        }
    }
}

/// Outcome of a remove. `removed` is `false` when the name was not installed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoveReport {
    pub removed: bool,
    pub warnings: Vec<String>,
}

impl RemoveReport {
    pub fn note(&self) -> Option<&str> {
        self.warnings.first().map(String::as_str)
    }
}

/// Per-skill result of installing a whole catalog.
#[derive(Debug)]
pub struct SkillOutcome {
    pub name: String,
    pub result: Result<InstallReport>,
}

/// An installed skill with its stored canonical document.
#[derive(Debug, Clone, Serialize)]
pub struct SkillInfo {
    pub record: InstalledSkillRecord,
    pub document: Option<String>,
}

pub struct Installer {
    project: Arc<ProjectStore>,
    host: Option<Arc<HostStore>>,
    fetcher: Arc<dyn ContentFetcher>,
    validator: Arc<dyn SchemaValidator>,
    resolver: SourceResolver,
    fetch_timeout: Option<Duration>,
}

impl Installer {
    pub fn new(
        project: ProjectStore,
        fetcher: Arc<dyn ContentFetcher>,
        validator: Arc<dyn SchemaValidator>,
        resolver: SourceResolver,
    ) -> Self {
        Self {
            project: Arc::new(project),
            host: None,
            fetcher,
            validator,
            resolver,
            fetch_timeout: None,
        }
    }

    /// Wire every collaborator from configuration. Without a known home
    /// directory, `~`-relative host paths leave the host store unconfigured.
    pub fn from_config(config: &UaspConfig, project_root: &Path, home: Option<&Path>) -> Result<Self> {
        let fetcher = Arc::new(DefaultFetcher::new(&config.fetch)?);
        let validator = Arc::new(StructuralValidator::new(config.validation.strict_version));
        let base_dir = std::env::current_dir().unwrap_or_else(|_| project_root.to_path_buf());
        let resolver = SourceResolver::new(
            config.fetch.default_ref.clone(),
            base_dir,
            home.map(Path::to_path_buf),
        );

        let installer = Self::new(
            ProjectStore::open(config.project.store_dir(project_root)),
            fetcher,
            validator,
            resolver,
        )
        .with_fetch_timeout(config.fetch.timeout());

        Ok(match config.host.resolve(home) {
            Some(paths) => {
                installer.with_host_store(HostStore::new(paths, link_manager(config.host.link_mode)))
            },
            None => {
                tracing::warn!("home directory unknown, host store disabled");
                installer
            },
        })
    }

    #[must_use]
    pub fn with_host_store(mut self, host: HostStore) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn project(&self) -> &ProjectStore {
        &self.project
    }

    pub fn host(&self) -> Option<&HostStore> {
        self.host.as_deref()
    }

    /// Install one skill, or every skill a catalog lists.
    pub async fn install_target(
        &self,
        target: &InstallTarget,
        location: &str,
        opts: InstallOptions,
    ) -> Result<Vec<SkillOutcome>> {
        match target {
            InstallTarget::All => self.install_all(location, opts).await,
            InstallTarget::Skill(name) => Ok(vec![SkillOutcome {
                name: name.clone(),
                result: self.install(name, location, opts).await,
            }]),
        }
    }

    /// Install the skill `name` from `location`.
    pub async fn install(&self, name: &str, location: &str, opts: InstallOptions) -> Result<InstallReport> {
        let source = self.resolve(location)?;
        self.install_from(name, &source, opts).await
    }

    /// Install every skill listed in the source's `index.json`. Each skill
    /// succeeds or fails on its own; only an unreadable catalog is an error.
    pub async fn install_all(&self, location: &str, opts: InstallOptions) -> Result<Vec<SkillOutcome>> {
        let source = self.resolve(location)?;
        let raw = self.fetch(&source, INDEX_FILE).await?;
        let names = Catalog::parse(&raw)?.names();
        tracing::info!(count = names.len(), %source, "installing catalog");

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let result = self.install_from(&name, &source, opts).await;
            if let Err(e) = &result {
                tracing::warn!(%name, error = %e, "catalog entry failed to install");
            }
            outcomes.push(SkillOutcome { name, result });
        }
        Ok(outcomes)
    }

    fn resolve(&self, location: &str) -> Result<SkillSource> {
        self.resolver.parse(location).ok_or_else(|| Error::Resolution {
            location: location.to_string(),
        })
    }

    async fn fetch(&self, source: &SkillSource, relative_path: &str) -> Result<String> {
        fetch_with_timeout(self.fetcher.as_ref(), source, relative_path, self.fetch_timeout)
            .await
            .map_err(|e: FetchError| {
                #[cfg(feature = "metrics")]
                counter!(fetch_metrics::ERRORS_TOTAL, labels::KIND => e.kind()).increment(1);
                Error::Fetch(e)
            })
    }

    async fn install_from(&self, name: &str, source: &SkillSource, opts: InstallOptions) -> Result<InstallReport> {
        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        let result = self.install_inner(name, source, opts).await;

        #[cfg(feature = "metrics")]
        {
            let outcome = match &result {
                Ok(report) if report.up_to_date => "up_to_date",
                Ok(_) => "success",
                Err(_) => "error",
            };
            counter!(installer_metrics::INSTALL_ATTEMPTS_TOTAL, labels::OUTCOME => outcome)
                .increment(1);
            match &result {
                Ok(report) if report.up_to_date => {
                    counter!(installer_metrics::INSTALL_UP_TO_DATE_TOTAL).increment(1);
                },
                Ok(_) => {},
                Err(_) => counter!(installer_metrics::INSTALL_ERRORS_TOTAL).increment(1),
            }
            histogram!(installer_metrics::INSTALL_DURATION_SECONDS)
                .record(start.elapsed().as_secs_f64());
        }

        result
    }

    async fn install_inner(&self, name: &str, source: &SkillSource, opts: InstallOptions) -> Result<InstallReport> {
        if !validate_name(name) {
            return Err(Error::validation(name, vec![format!("invalid skill name '{name}'")]));
        }

        let raw = self.fetch(source, &document_path(name)).await?;
        let parsed = parse_document(&raw)?;
        if parsed.name() != name {
            return Err(Error::NameMismatch {
                requested: name.to_string(),
                declared: parsed.name().to_string(),
            });
        }
        let validation = self.validator.validate(&parsed);
        if !validation.is_valid() {
            return Err(Error::validation(name, validation.errors));
        }
        let mut warnings = validation.warnings;

        let version = parsed.document.version().to_string();
        let (record, up_to_date) = {
            let project = Arc::clone(&self.project);
            let (skill, source, version) = (parsed.clone(), source.clone(), version.clone());
            spawn_locked(self.project.lock_path(), move || {
                if !opts.force
                    && let Some(existing) = project.get(skill.name())?
                    && existing.version == version
                {
                    return Ok((existing, true));
                }
                Ok((project.install(&skill, &source, now_ms())?, false))
            })
            .await?
        };

        let secondary_installed = if opts.host_store {
            match &self.host {
                Some(host) => match write_host(host, &parsed, source, up_to_date).await {
                    Ok(host_warnings) => {
                        warnings.extend(host_warnings);
                        true
                    },
                    Err(e) => {
                        #[cfg(feature = "metrics")]
                        counter!(host_metrics::FAILURES_TOTAL).increment(1);
                        tracing::warn!(%name, error = %e, "host store install failed");
                        warnings.push(format!("{SECONDARY_NOT_INSTALLED}: {e}"));
                        false
                    },
                },
                None => {
                    warnings.push(format!("{SECONDARY_NOT_INSTALLED}: no host store configured"));
                    false
                },
            }
        } else {
            false
        };

        if up_to_date {
            tracing::info!(%name, %version, "skill already up to date");
        } else {
            tracing::info!(%name, %version, %source, secondary_installed, "installed skill");
        }

        Ok(InstallReport {
            record,
            secondary_installed,
            up_to_date,
            warnings,
        })
    }

    /// Remove an installed skill. Reports `removed: false`, touching
    /// nothing, when the name is not installed in the project. Host-store
    /// cleanup failures are reported as warnings.
    pub async fn remove(&self, name: &str, opts: RemoveOptions) -> Result<RemoveReport> {
        if self.project.get(name)?.is_none() {
            tracing::debug!(%name, "remove: not installed");
            return Ok(RemoveReport::default());
        }

        let removed = {
            let project = Arc::clone(&self.project);
            let name = name.to_string();
            spawn_locked(self.project.lock_path(), move || project.remove(&name)).await?
        };
        if !removed {
            return Ok(RemoveReport::default());
        }

        let mut warnings = Vec::new();
        if opts.host_store
            && let Some(host) = &self.host
        {
            let host = Arc::clone(host);
            let owned = name.to_string();
            if let Err(e) = blocking(move || host.remove(&owned)).await {
                #[cfg(feature = "metrics")]
                counter!(host_metrics::FAILURES_TOTAL).increment(1);
                tracing::warn!(%name, error = %e, "host store cleanup failed");
                warnings.push(format!("{SECONDARY_NOT_CLEANED}: {e}"));
            }
        }

        #[cfg(feature = "metrics")]
        counter!(installer_metrics::REMOVE_TOTAL).increment(1);

        tracing::info!(%name, "removed skill");
        Ok(RemoveReport {
            removed: true,
            warnings,
        })
    }

    /// Installed skills, sorted by name.
    pub fn list(&self) -> Result<Vec<InstalledSkillRecord>> {
        self.project.list()
    }

    pub fn search(&self, term: &str) -> Result<Vec<InstalledSkillRecord>> {
        self.project.search(term)
    }

    pub fn info(&self, name: &str) -> Result<Option<SkillInfo>> {
        let Some(record) = self.project.get(name)? else {
            return Ok(None);
        };
        let document = self.project.read_document(name)?;
        Ok(Some(SkillInfo { record, document }))
    }

    /// Host-store drift; empty when no host store is configured.
    pub fn status(&self) -> Result<Vec<DriftReport>> {
        match &self.host {
            Some(host) => host.status(),
            None => Ok(Vec::new()),
        }
    }

    /// Canonical store directory.
    pub fn store_dir(&self) -> PathBuf {
        self.project.root().to_path_buf()
    }
}

/// Convert and write the secondary copy. An up-to-date skill whose host
/// files are intact is left alone; anything missing or edited is rewritten.
async fn write_host(
    host: &Arc<HostStore>,
    parsed: &ParsedSkill,
    source: &SkillSource,
    up_to_date: bool,
) -> Result<Vec<String>> {
    let meta = InstallMeta {
        source: Some(source.origin()),
    };
    let secondary = to_secondary_format(&parsed.document, &meta)?;
    let host = Arc::clone(host);
    let name = parsed.name().to_string();
    let version = parsed.document.version().to_string();
    let source = source.clone();
    blocking(move || {
        if up_to_date && host.is_current(&name, &version) {
            return Ok(Vec::new());
        }
        Ok(host.install(&name, &secondary, &source, &version, now_ms())?.warnings)
    })
    .await
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{persist::MemoryStore, project::ProjectSettings},
        async_trait::async_trait,
        std::collections::HashMap,
    };

    /// Serves documents from memory keyed by relative path.
    struct StaticFetcher(HashMap<String, String>);

    #[async_trait]
    impl ContentFetcher for StaticFetcher {
        async fn fetch(&self, _: &SkillSource, relative_path: &str) -> std::result::Result<String, FetchError> {
            self.0
                .get(relative_path)
                .cloned()
                .ok_or_else(|| FetchError::NotFound {
                    location: relative_path.to_string(),
                })
        }
    }

    fn doc(name: &str) -> String {
        crate::version::update_version(&format!(
            "meta:\n  name: {name}\n  version: '0'\n  type: knowledge\ntriggers:\n  keywords: [k-{name}]\n"
        ))
        .unwrap()
    }

    fn installer(files: &[(&str, String)]) -> (Installer, Arc<MemoryStore<ProjectSettings>>) {
        let settings = Arc::new(MemoryStore::default());
        let tmp = std::env::temp_dir().join("uasp-install-unit-unused");
        let fetcher = StaticFetcher(
            files
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        let installer = Installer::new(
            ProjectStore::with_persistence(tmp.clone(), settings.clone()),
            Arc::new(fetcher),
            Arc::new(StructuralValidator::default()),
            SourceResolver::new("main", tmp, None),
        );
        (installer, settings)
    }

    #[test]
    fn target_parsing() {
        assert_eq!(InstallTarget::from("all"), InstallTarget::All);
        assert_eq!(InstallTarget::from("demo"), InstallTarget::Skill("demo".into()));
    }

    #[tokio::test]
    async fn unrecognized_location_aborts_before_writes() {
        let (installer, settings) = installer(&[]);
        let err = installer
            .install("demo", "ftp://nowhere", InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert_eq!(settings.save_count(), 0);
    }

    #[tokio::test]
    async fn missing_document_is_a_fetch_error() {
        let (installer, settings) = installer(&[]);
        let err = installer
            .install("demo", "github:acme/skills", InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(ref f) if f.is_not_found()));
        assert_eq!(settings.save_count(), 0);
    }

    #[tokio::test]
    async fn invalid_document_aborts_before_writes() {
        let bad = "meta:\n  name: demo\n  version: '0'\n  type: knowledge\nworkflows:\n  w:\n    description: d\n    steps: []\n";
        let (installer, settings) = installer(&[("demo/demo.uasp.yaml", bad.to_string())]);
        let err = installer
            .install("demo", "github:acme/skills", InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(settings.save_count(), 0);
    }

    #[tokio::test]
    async fn declared_name_must_match_request() {
        let (installer, _) = installer(&[("demo/demo.uasp.yaml", doc("other"))]);
        let err = installer
            .install("demo", "github:acme/skills", InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NameMismatch { .. }));
    }

    #[tokio::test]
    async fn remove_unknown_is_false_without_side_effects() {
        let (installer, settings) = installer(&[]);
        let report = installer.remove("ghost", RemoveOptions::default()).await.unwrap();
        assert!(!report.removed);
        assert!(report.note().is_none());
        assert_eq!(settings.save_count(), 0);
    }

    #[test]
    fn report_notes() {
        let record = InstalledSkillRecord {
            name: "x".into(),
            version: "00000000".into(),
            kind: crate::types::SkillKind::Api,
            path: "x/x.uasp.yaml".into(),
            enabled: true,
            installed_at_ms: 0,
            source: SkillSource::Local {
                path: PathBuf::from("/s"),
            },
        };
        let mut report = InstallReport {
            record,
            secondary_installed: true,
            up_to_date: false,
            warnings: vec![],
        };
        assert_eq!(report.note(), None);
        report.secondary_installed = false;
        assert_eq!(report.note().as_deref(), Some(SECONDARY_NOT_INSTALLED));
        report.up_to_date = true;
        assert_eq!(report.note().as_deref(), Some("already up to date"));
    }
}
