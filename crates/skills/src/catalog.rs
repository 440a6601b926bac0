//! Source catalog (`index.json`) listing the skills a source publishes.

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    parse::document_file_name,
};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    skills: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CatalogEntry {
    Name(String),
    Detailed { name: String },
}

impl Catalog {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::message(format!("invalid {INDEX_FILE}: {e}")))
    }

    /// Listed names in catalog order, duplicates dropped.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.skills.len());
        for entry in &self.skills {
            let name = match entry {
                CatalogEntry::Name(name) | CatalogEntry::Detailed { name } => name,
            };
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Path of a skill's canonical document relative to the source root.
pub fn document_path(name: &str) -> String {
    format!("{name}/{}", document_file_name(name))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_detailed_entries() {
        let catalog =
            Catalog::parse(r#"{"skills": ["alpha", {"name": "beta", "type": "cli"}, "alpha"]}"#)
                .unwrap();
        assert_eq!(catalog.names(), ["alpha", "beta"]);
    }

    #[test]
    fn rejects_malformed_index() {
        assert!(Catalog::parse("[1, 2]").is_err());
        assert!(Catalog::parse("{}").unwrap().names().is_empty());
    }

    #[test]
    fn document_paths() {
        assert_eq!(document_path("demo"), "demo/demo.uasp.yaml");
    }
}
