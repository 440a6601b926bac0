//! Configuration loading and path resolution.
//!
//! Config files: `uasp.toml`, `uasp.yaml`, or `uasp.json`
//! Searched in the project root, then the user config directory.
//!
//! Supports `${ENV_VAR}` substitution in the raw file and `~/` in path values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, home_dir, load_config, set_config_dir},
    schema::{
        FetchConfig, HostConfig, HostPaths, LinkMode, ProjectConfig, UaspConfig, ValidationConfig,
    },
};
