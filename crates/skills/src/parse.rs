use crate::{
    error::{Error, Result},
    types::SkillDocument,
};

/// Canonical document file name inside a skill directory.
pub fn document_file_name(name: &str) -> String {
    format!("{name}.uasp.yaml")
}

/// A canonical document parsed once at the boundary.
///
/// `raw` is kept byte-for-byte so the project store can persist exactly what
/// was fetched; `value` is the untyped tree used for fingerprinting.
#[derive(Debug, Clone)]
pub struct ParsedSkill {
    pub document: SkillDocument,
    pub value: serde_json::Value,
    pub raw: String,
}

impl ParsedSkill {
    pub fn name(&self) -> &str {
        self.document.name()
    }
}

/// Validate a skill name: starts with a lowercase letter, then lowercase
/// ASCII, digits, or hyphens; at most 64 chars.
pub fn validate_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && name.len() <= 64
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Parse a `*.uasp.yaml` document. Any structural problem is reported as a
/// [`Error::Validation`] so callers abort before writing anything.
pub fn parse_document(raw: &str) -> Result<ParsedSkill> {
    let value: serde_json::Value = serde_yaml::from_str(raw)
        .map_err(|e| Error::validation(UNKNOWN_NAME, vec![format!("invalid YAML: {e}")]))?;

    if !value.is_object() {
        return Err(Error::validation(UNKNOWN_NAME, vec![
            "document must be a YAML mapping".into(),
        ]));
    }

    let declared = value
        .get("meta")
        .and_then(|m| m.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(UNKNOWN_NAME)
        .to_string();

    let document: SkillDocument = serde_yaml::from_str(raw)
        .map_err(|e| Error::validation(&declared, vec![e.to_string()]))?;

    Ok(ParsedSkill {
        document,
        value,
        raw: raw.to_string(),
    })
}

const UNKNOWN_NAME: &str = "<unknown>";

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::types::SkillKind};

    const CLI_SKILL: &str = r#"
meta:
  name: demo-skill
  version: "00000000"
  type: cli
  description: A demo skill
triggers:
  keywords: [alpha, beta]
commands:
  run:
    syntax: demo run <target>
    args:
      - name: target
        type: string
        required: true
  stop:
    syntax: demo stop
"#;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("demo-skill"));
        assert!(validate_name("a"));
        assert!(validate_name("skill2"));
        assert!(!validate_name(""));
        assert!(!validate_name("Demo"));
        assert!(!validate_name("2fast"));
        assert!(!validate_name("-lead"));
        assert!(!validate_name("has_underscore"));
        assert!(!validate_name(&"a".repeat(65)));
    }

    #[test]
    fn test_parse_cli_skill() {
        let parsed = parse_document(CLI_SKILL).unwrap();
        let doc = &parsed.document;
        assert_eq!(doc.name(), "demo-skill");
        assert_eq!(doc.kind(), SkillKind::Cli);
        assert_eq!(doc.keywords(), ["alpha", "beta"]);
        assert_eq!(doc.command_count(), 2);
        let commands = doc.commands.as_ref().unwrap();
        assert_eq!(commands.keys().collect::<Vec<_>>(), ["run", "stop"]);
        assert!(commands.get("run").unwrap().args[0].required);
        assert_eq!(parsed.raw, CLI_SKILL);
    }

    #[test]
    fn test_unknown_top_level_key_is_rejected() {
        let raw = "meta:\n  name: x\n  version: '0'\n  type: api\nbogus: 1\n";
        let err = parse_document(raw).unwrap_err();
        match err {
            Error::Validation { name, errors } => {
                assert_eq!(name, "x");
                assert!(errors[0].contains("bogus"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reference_entries_allow_extra_keys() {
        let raw = "meta:\n  name: x\n  version: '0'\n  type: knowledge\nreference:\n  selectors:\n    syntax: '@e{n}'\n    scope: page\n";
        let parsed = parse_document(raw).unwrap();
        let entry = parsed.document.reference.as_ref().unwrap().get("selectors").unwrap();
        assert_eq!(entry.syntax.as_deref(), Some("@e{n}"));
        assert_eq!(entry.extra["scope"], "page");
    }

    #[test]
    fn test_bad_kind_and_non_mapping() {
        let raw = "meta:\n  name: x\n  version: '0'\n  type: plugin\n";
        assert!(matches!(parse_document(raw), Err(Error::Validation { .. })));
        assert!(matches!(parse_document("- a\n- b\n"), Err(Error::Validation { .. })));
        assert!(matches!(parse_document("meta: [unclosed"), Err(Error::Validation { .. })));
    }
}
