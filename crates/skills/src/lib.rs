//! Skill installer: canonical documents, project store, and host store.
//!
//! A skill is a `<name>.uasp.yaml` document. Installing one writes it into
//! the project store (`<project>/.uasp/`) and indexes its trigger keywords;
//! optionally, a `SKILL.md` projection is written into a per-user host store
//! and exposed to the agent host through a link farm, with provenance kept in
//! a ledger.

pub mod catalog;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod host;
pub mod install;
pub mod link;
pub mod lock;
pub mod named;
pub mod parse;
pub mod persist;
pub mod project;
pub mod query;
pub mod source;
pub mod types;
pub mod validate;
pub mod version;

pub use {
    error::{Error, FetchError, Result},
    install::{
        InstallOptions, InstallReport, InstallTarget, Installer, RemoveOptions, RemoveReport,
    },
    source::SkillSource,
    types::{SkillDocument, SkillKind},
};
