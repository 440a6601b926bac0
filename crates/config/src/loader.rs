use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::UaspConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["uasp.toml", "uasp.yaml", "uasp.yml", "uasp.json"];

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Override the user-global config directory (e.g. from `--config-dir`).
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.lock() {
        *guard = Some(dir);
    }
}

/// Returns the user-global config directory (`~/.config/uasp/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(guard) = CONFIG_DIR_OVERRIDE.lock()
        && let Some(dir) = guard.as_ref()
    {
        return Some(dir.clone());
    }
    directories::ProjectDirs::from("", "", "uasp").map(|d| d.config_dir().to_path_buf())
}

/// The current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<UaspConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::path(path, e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `<project_root>/uasp.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/uasp.{toml,yaml,yml,json}` (user-global)
///
/// Returns `UaspConfig::default()` if no config file is found or the one
/// found cannot be parsed.
pub fn discover_and_load(project_root: &Path) -> UaspConfig {
    if let Some(path) = find_config_file(project_root) {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    UaspConfig::default()
}

fn find_config_file(project_root: &Path) -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|p| p.is_file());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

fn parse_config(raw: &str, path: &Path) -> Result<UaspConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
