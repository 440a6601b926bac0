//! Content fingerprints.
//!
//! `meta.version` is the first 8 hex chars of SHA-256 over the compact JSON
//! rendering of the document with sorted keys, non-ASCII escaped, and
//! `meta.version` itself removed.

use {
    serde_json::{Map, Value},
    sha2::{Digest, Sha256},
};

use crate::error::{Error, Result};

pub const VERSION_LEN: usize = 8;

/// Stored vs. recomputed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub stored: String,
    pub calculated: String,
}

impl VersionCheck {
    pub fn is_valid(&self) -> bool {
        self.stored == self.calculated
    }
}

/// Fingerprint of a parsed document value.
pub fn calculate_version(document: &Value) -> String {
    let mut normalized = sort_keys(document);
    if let Some(meta) = normalized.get_mut("meta").and_then(Value::as_object_mut) {
        meta.remove("version");
    }
    let compact = escape_non_ascii(&normalized.to_string());
    let digest = hex(&Sha256::digest(compact.as_bytes()));
    digest[..VERSION_LEN].to_string()
}

pub fn verify_version(document: &Value) -> VersionCheck {
    let stored = document
        .get("meta")
        .and_then(|m| m.get("version"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    VersionCheck {
        stored,
        calculated: calculate_version(document),
    }
}

/// Rewrite `meta.version` in a YAML document to its calculated fingerprint.
///
/// The output is re-serialized, so comments and formatting are not preserved.
pub fn update_version(raw: &str) -> Result<String> {
    let mut yaml: serde_yaml::Value = serde_yaml::from_str(raw)?;
    let value: Value = serde_yaml::from_value(yaml.clone())?;
    let calculated = calculate_version(&value);
    let meta = yaml
        .get_mut("meta")
        .and_then(serde_yaml::Value::as_mapping_mut)
        .ok_or_else(|| Error::message("document has no `meta` mapping"))?;
    meta.insert("version".into(), calculated.into());
    Ok(serde_yaml::to_string(&yaml)?)
}

/// Full SHA-256 hex digest, used for on-disk drift detection.
pub fn content_hash(bytes: impl AsRef<[u8]>) -> String {
    hex(&Sha256::digest(bytes.as_ref()))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Escape every non-ASCII char as `\uXXXX` (surrogate pairs above the BMP).
/// Non-ASCII only occurs inside JSON strings, so this is safe on the whole text.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut buf = [0u16; 2];
            for unit in ch.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
