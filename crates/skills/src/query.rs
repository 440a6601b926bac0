//! Dot-path queries over a parsed skill document.
//!
//! A path walks mappings by key and sequences by the `name` or `id` of their
//! items, falling back to a numeric index. Filters narrow a sequence result
//! to the items whose field matches a case-insensitive `*` glob:
//!
//! ```text
//! demo-skill:decisions?when=*remote*
//! demo-skill:commands.run.args.target
//! ```

use std::{collections::BTreeMap, str::FromStr};

use {serde::Serialize, serde_json::Value};

use crate::error::Error;

/// Field filters applied to a sequence result, keyed by field name.
pub type Filters = BTreeMap<String, String>;

/// A full `skill:path[?key=value&...]` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillQuery {
    pub skill: String,
    pub path: String,
    pub filters: Filters,
}

impl FromStr for SkillQuery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((skill, rest)) = s.split_once(':') else {
            return Err(Error::message(format!(
                "invalid query '{s}', expected 'skill:path'"
            )));
        };
        let (path, filters) = split_filters(rest);
        Ok(Self {
            skill: skill.to_string(),
            path,
            filters,
        })
    }
}

/// Split `path?key=value&key2=value2` into the path and its filters.
/// Pairs without `=` are ignored.
pub fn split_filters(path_and_filters: &str) -> (String, Filters) {
    match path_and_filters.split_once('?') {
        Some((path, filters)) => (path.to_string(), parse_filters(filters.split('&'))),
        None => (path_and_filters.to_string(), Filters::new()),
    }
}

/// Collect `key=value` pairs; a later key overrides an earlier one.
pub fn parse_filters<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Filters {
    pairs
        .into_iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub skill: String,
    pub path: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: Filters,
}

/// Resolve `path` against a document tree. An empty path selects the whole
/// document. The skill name is read from `meta.name`.
pub fn query(document: &Value, path: &str, filters: &Filters) -> QueryResult {
    let skill = document
        .pointer("/meta/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let value = lookup(document, path).map(|found| match found {
        Value::Array(items) if !filters.is_empty() => Value::Array(apply_filters(items, filters)),
        other => other,
    });

    QueryResult {
        skill,
        path: path.to_string(),
        found: value.is_some(),
        value,
        filters: filters.clone(),
    }
}

fn lookup(document: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(document.clone());
    }
    path.split('.')
        .try_fold(document.clone(), |current, segment| step(&current, segment))
}

fn step(current: &Value, segment: &str) -> Option<Value> {
    match current {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => {
            let mut matches: Vec<&Value> = items.iter().filter(|i| is_named(i, segment)).collect();
            match matches.len() {
                0 => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get(idx))
                    .cloned(),
                1 => matches.pop().cloned(),
                _ => Some(Value::Array(matches.into_iter().cloned().collect())),
            }
        },
        _ => None,
    }
}

fn is_named(item: &Value, segment: &str) -> bool {
    ["name", "id"]
        .iter()
        .any(|key| item.get(key).and_then(Value::as_str) == Some(segment))
}

fn apply_filters(items: Vec<Value>, filters: &Filters) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| {
            item.is_object()
                && filters
                    .iter()
                    .all(|(key, pattern)| field_matches(item.get(key), pattern))
        })
        .collect()
}

fn field_matches(field: Option<&Value>, pattern: &str) -> bool {
    let text = match field {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    glob_match(&pattern.to_lowercase(), &text.to_lowercase())
}

/// `*` matches any run of characters; everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == text;
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Every queryable path in a document, depth first. A sequence of mappings
/// contributes the paths of its first item under `key[0]`.
pub fn list_paths(document: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_paths(document, "", &mut out);
    out
}

fn collect_paths(value: &Value, prefix: &str, out: &mut Vec<String>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        out.push(path.clone());
        match child {
            Value::Object(_) => collect_paths(child, &path, out),
            Value::Array(items) => {
                if let Some(first) = items.first()
                    && first.is_object()
                {
                    collect_paths(first, &format!("{path}[0]"), out);
                }
            },
            _ => {},
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn document() -> Value {
        json!({
            "meta": {"name": "demo-skill", "type": "cli"},
            "commands": {
                "run": {"syntax": "demo run <target>", "args": [{"name": "target"}]}
            },
            "decisions": [
                {"id": "local", "when": "Target is local", "do": "run directly"},
                {"id": "remote", "when": "Target is REMOTE", "do": "pass --remote"},
                {"id": "batch", "when": "Many remote targets", "do": "use batch"}
            ],
            "constraints": {"never": ["delete data"]},
            "state": {"entities": [
                {"name": "ref", "kind": "handle"},
                {"name": "ref", "kind": "alias"}
            ]}
        })
    }

    fn filters(pairs: &[(&str, &str)]) -> Filters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case("commands.run.syntax", json!("demo run <target>"))]
    #[case("commands.run.args.target", json!({"name": "target"}))]
    #[case("decisions.remote.do", json!("pass --remote"))]
    #[case("decisions.0.id", json!("local"))]
    #[case("constraints.never.0", json!("delete data"))]
    #[case("state.entities.ref", json!([
        {"name": "ref", "kind": "handle"},
        {"name": "ref", "kind": "alias"}
    ]))]
    fn resolves_paths(#[case] path: &str, #[case] expected: Value) {
        let result = query(&document(), path, &Filters::new());
        assert!(result.found, "{path}");
        assert_eq!(result.skill, "demo-skill");
        assert_eq!(result.value, Some(expected));
    }

    #[rstest]
    #[case("commands.missing")]
    #[case("decisions.7")]
    #[case("decisions.-1")]
    #[case("decisions.unknown")]
    #[case("meta.name.deeper")]
    fn reports_missing_paths(#[case] path: &str) {
        let result = query(&document(), path, &Filters::new());
        assert!(!result.found);
        assert_eq!(result.value, None);
    }

    #[test]
    fn empty_path_selects_the_document() {
        let doc = document();
        assert_eq!(query(&doc, "", &Filters::new()).value, Some(doc));
    }

    #[rstest]
    #[case(&[("when", "*remote*")], &["remote", "batch"])]
    #[case(&[("when", "target*")], &["local", "remote"])]
    #[case(&[("when", "*remote*"), ("do", "pass*")], &["remote"])]
    #[case(&[("id", "LOCAL")], &["local"])]
    #[case(&[("when", "nothing")], &[])]
    fn filters_sequence_results(#[case] pairs: &[(&str, &str)], #[case] ids: &[&str]) {
        let result = query(&document(), "decisions", &filters(pairs));
        let value = result.value.unwrap();
        let got: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn filters_leave_non_sequences_alone() {
        let result = query(&document(), "commands.run", &filters(&[("syntax", "nope")]));
        assert_eq!(result.value.unwrap()["syntax"], "demo run <target>");
    }

    #[rstest]
    #[case("*", "", true)]
    #[case("a*", "abc", true)]
    #[case("*c", "abc", true)]
    #[case("*ab", "abab", true)]
    #[case("a*b*c", "axxbyyc", true)]
    #[case("a*a", "a", false)]
    #[case("abc", "abcd", false)]
    fn glob_cases(#[case] pattern: &str, #[case] text: &str, #[case] expected: bool) {
        assert_eq!(glob_match(pattern, text), expected);
    }

    #[test]
    fn parses_full_query_strings() {
        let q: SkillQuery = "demo-skill:decisions?when=*remote*&id=batch&junk"
            .parse()
            .unwrap();
        assert_eq!(q.skill, "demo-skill");
        assert_eq!(q.path, "decisions");
        assert_eq!(q.filters, filters(&[("when", "*remote*"), ("id", "batch")]));

        let bare: SkillQuery = "demo-skill:constraints.never".parse().unwrap();
        assert!(bare.filters.is_empty());
        assert!("no-separator".parse::<SkillQuery>().is_err());
    }

    #[test]
    fn serialized_result_omits_absent_fields() {
        let missing = serde_json::to_value(query(&document(), "nope", &Filters::new())).unwrap();
        assert_eq!(missing, json!({"skill": "demo-skill", "path": "nope", "found": false}));

        let found = serde_json::to_value(query(&document(), "meta.type", &filters(&[("a", "b")])))
            .unwrap();
        assert_eq!(found["value"], "cli");
        assert_eq!(found["filters"], json!({"a": "b"}));
    }

    #[test]
    fn lists_paths_through_first_sequence_item() {
        let paths = list_paths(&document());
        for expected in [
            "meta",
            "meta.name",
            "commands.run.syntax",
            "commands.run.args",
            "commands.run.args[0].name",
            "decisions[0].when",
            "constraints.never",
            "state.entities[0].kind",
        ] {
            assert!(paths.iter().any(|p| p == expected), "{expected} in {paths:?}");
        }
        assert!(!paths.iter().any(|p| p.starts_with("constraints.never[0]")));
    }
}
