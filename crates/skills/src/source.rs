//! Skill source locations.
//!
//! Recognized forms:
//!
//! - `https://github.com/owner/repo[.git][/tree/<ref>/<subpath>]`
//! - `github:owner/repo[/subpath][#ref]` (also `gh:`)
//! - local paths: absolute, `./`, `../`, `~/`, or `file://`
//!
//! In the URL form only the first segment after `tree/` is taken as the ref,
//! so a ref containing `/` reads as ref + subpath. The short form's `#ref`
//! suffix is the way to name such refs.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};

const GITHUB_HOSTS: &[&str] = &["https://github.com/", "http://github.com/", "github.com/"];
const SHORT_SCHEMES: &[&str] = &["github:", "gh:"];

/// Where a skill document is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SkillSource {
    Github {
        owner: String,
        repo: String,
        #[serde(rename = "ref")]
        git_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subpath: Option<String>,
    },
    /// Absolute path, resolved at parse time. Fetches bypass the network.
    Local { path: PathBuf },
}

impl SkillSource {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Short label recorded in the host ledger.
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::Github { .. } => "github",
            Self::Local { .. } => "local",
        }
    }

    /// `owner/repo` for remote sources, the directory for local ones.
    pub fn origin(&self) -> String {
        match self {
            Self::Github { owner, repo, .. } => format!("{owner}/{repo}"),
            Self::Local { path } => path.display().to_string(),
        }
    }

    pub fn source_url(&self) -> String {
        match self {
            Self::Github { owner, repo, .. } => format!("https://github.com/{owner}/{repo}.git"),
            Self::Local { path } => format!("file://{}", path.display()),
        }
    }

    /// Path of `relative` inside the source, subpath included.
    pub fn skill_path(&self, relative: &str) -> String {
        match self {
            Self::Github {
                subpath: Some(sub), ..
            } => format!("{sub}/{relative}"),
            _ => relative.to_string(),
        }
    }
}

impl fmt::Display for SkillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Github {
                owner,
                repo,
                git_ref,
                subpath,
            } => {
                write!(f, "github:{owner}/{repo}")?;
                if let Some(sub) = subpath {
                    write!(f, "/{sub}")?;
                }
                write!(f, "#{git_ref}")
            },
            Self::Local { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Parses location strings into [`SkillSource`]s.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    default_ref: String,
    base_dir: PathBuf,
    home: Option<PathBuf>,
}

impl SourceResolver {
    pub fn new(default_ref: impl Into<String>, base_dir: PathBuf, home: Option<PathBuf>) -> Self {
        Self {
            default_ref: default_ref.into(),
            base_dir,
            home,
        }
    }

    /// `None` when the location matches no recognized form.
    pub fn parse(&self, location: &str) -> Option<SkillSource> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }
        if let Some(rest) = location.strip_prefix("file://") {
            return self.local(rest);
        }
        if let Some(rest) = GITHUB_HOSTS.iter().find_map(|h| location.strip_prefix(h)) {
            return self.github_url(rest);
        }
        if let Some(rest) = SHORT_SCHEMES.iter().find_map(|s| location.strip_prefix(s)) {
            return self.short_form(rest);
        }
        if is_local_reference(location) {
            return self.local(location);
        }
        None
    }

    fn github_url(&self, rest: &str) -> Option<SkillSource> {
        let rest = rest.trim_end_matches('/');
        let mut segments = rest.split('/');
        let owner = segments.next()?;
        let repo = segments.next()?.trim_end_matches(".git");
        let tail: Vec<&str> = segments.collect();

        let (git_ref, subpath) = match tail.as_slice() {
            [] => (self.default_ref.clone(), None),
            [kind, git_ref, path @ ..] if matches!(*kind, "tree" | "blob") => {
                (git_ref.to_string(), join_subpath(path)?)
            },
            _ => return None,
        };
        github(owner, repo, git_ref, subpath)
    }

    fn short_form(&self, rest: &str) -> Option<SkillSource> {
        let (path, git_ref) = match rest.split_once('#') {
            Some((path, git_ref)) if !git_ref.is_empty() => (path, git_ref.to_string()),
            Some(_) => return None,
            None => (rest, self.default_ref.clone()),
        };
        let path = path.trim_end_matches('/');
        let mut segments = path.split('/');
        let owner = segments.next()?;
        let repo = segments.next()?;
        let tail: Vec<&str> = segments.collect();
        github(owner, repo, git_ref, join_subpath(&tail)?)
    }

    fn local(&self, raw: &str) -> Option<SkillSource> {
        if raw.is_empty() {
            return None;
        }
        let path = match raw.strip_prefix("~/") {
            Some(rest) => self.home.as_ref()?.join(rest),
            None => {
                let p = Path::new(raw);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    self.base_dir.join(p)
                }
            },
        };
        Some(SkillSource::Local {
            path: normalize(&path),
        })
    }
}

fn is_local_reference(location: &str) -> bool {
    location == "."
        || location == ".."
        || location.starts_with("./")
        || location.starts_with("../")
        || location.starts_with("~/")
        || Path::new(location).is_absolute()
}

fn github(owner: &str, repo: &str, git_ref: String, subpath: Option<String>) -> Option<SkillSource> {
    let valid = |s: &str| !s.is_empty() && s != "." && s != "..";
    if !valid(owner) || !valid(repo) {
        return None;
    }
    Some(SkillSource::Github {
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
        subpath,
    })
}

/// `Some(None)` for an empty subpath, `None` when a segment is unsafe.
fn join_subpath(segments: &[&str]) -> Option<Option<String>> {
    let kept: Vec<&str> = segments.iter().copied().filter(|s| !s.is_empty()).collect();
    if kept.iter().any(|s| *s == "." || *s == "..") {
        return None;
    }
    Some((!kept.is_empty()).then(|| kept.join("/")))
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
