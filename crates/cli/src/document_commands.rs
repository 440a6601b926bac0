use std::{collections::BTreeMap, path::Path};

use {
    anyhow::{Context, Result, bail},
    uasp_skills::{
        convert::{InstallMeta, to_secondary_format},
        parse::{ParsedSkill, parse_document},
        query::{list_paths, parse_filters, query as query_document, split_filters},
        validate::{SchemaValidator, StructuralValidator},
        version::{update_version, verify_version},
    },
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn read(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn load(file: &Path) -> Result<ParsedSkill> {
    Ok(parse_document(&read(file)?)?)
}

pub fn validate(file: &Path, strict: bool) -> Result<()> {
    eprintln!("Checking {}\n", file.display());
    let skill = load(file)?;
    let report = StructuralValidator::new(strict).validate(&skill);

    for e in &report.errors {
        eprintln!("  {BOLD}{RED}error{RESET} {e}");
    }
    for w in &report.warnings {
        eprintln!("  {BOLD}{YELLOW}warning{RESET} {w}");
    }
    if !report.errors.is_empty() || !report.warnings.is_empty() {
        eprintln!();
    }

    let errors = report.errors.len();
    if errors > 0 {
        bail!("{} is invalid: {errors} error(s)", skill.name());
    }
    eprintln!(
        "{BOLD}{GREEN}ok{RESET} {} ({} warning(s))",
        skill.name(),
        report.warnings.len()
    );
    Ok(())
}

pub fn convert(file: &Path, output: Option<&Path>) -> Result<()> {
    let skill = load(file)?;
    let markdown = to_secondary_format(&skill.document, &InstallMeta::default())?;
    match output {
        Some(path) => {
            uasp_common::fs::write_atomic(path, &markdown)?;
            eprintln!("wrote {}", path.display());
        },
        None => print!("{markdown}"),
    }
    Ok(())
}

pub fn hash(file: &Path, update: bool) -> Result<()> {
    let raw = read(file)?;
    let skill = parse_document(&raw)?;
    let check = verify_version(&skill.value);

    if !update {
        println!("{}", check.calculated);
        if !check.is_valid() {
            eprintln!(
                "{BOLD}{YELLOW}warning{RESET} stored version {} differs",
                check.stored
            );
        }
        return Ok(());
    }

    if check.is_valid() {
        println!("{} (unchanged)", check.calculated);
        return Ok(());
    }
    uasp_common::fs::write_atomic(file, update_version(&raw)?)?;
    println!("{} -> {}", check.stored, check.calculated);
    Ok(())
}

/// Print the value at `path`. `path` may carry `?key=value` filters, which
/// `filters` extend. A path that resolves to nothing is an error.
pub fn query(file: &Path, path: &str, filters: &[String], json: bool) -> Result<()> {
    let skill = load(file)?;
    let (path, mut merged) = split_filters(path);
    merged.extend(parse_filters(filters.iter().map(String::as_str)));
    let result = query_document(&skill.value, &path, &merged);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    let Some(value) = result.value else {
        bail!("path not found in {}: {path}", skill.name());
    };
    if !json {
        match value {
            serde_json::Value::String(s) => println!("{s}"),
            other => print!("{}", serde_yaml::to_string(&other)?),
        }
    }
    Ok(())
}

/// Print every queryable path, grouped by top-level section.
pub fn paths(file: &Path) -> Result<()> {
    const SHOWN: usize = 20;

    let skill = load(file)?;
    let mut sections: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let all = list_paths(&skill.value);
    for path in &all {
        let section = path.split(['.', '[']).next().unwrap_or(path);
        sections.entry(section).or_default().push(path);
    }

    println!("{BOLD}{}{RESET}", skill.name());
    for (section, paths) in sections {
        println!("  {section}");
        for path in paths.iter().take(SHOWN) {
            println!("    {path}");
        }
        if paths.len() > SHOWN {
            println!("    ... and {} more", paths.len() - SHOWN);
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "meta:\n  name: demo-skill\n  version: '00000000'\n  type: knowledge\n  description: Demo.\n";

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("demo-skill.uasp.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn hash_update_makes_document_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), DOC);

        assert!(validate(&path, true).is_err());
        hash(&path, true).unwrap();
        validate(&path, true).unwrap();

        let rewritten = std::fs::read_to_string(&path).unwrap();
        let check = verify_version(&parse_document(&rewritten).unwrap().value);
        assert!(check.is_valid());
    }

    #[test]
    fn stale_version_is_only_a_warning_when_lenient() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), DOC);
        validate(&path, false).unwrap();
    }

    #[test]
    fn convert_writes_output_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), DOC);
        let out = tmp.path().join("out/SKILL.md");

        convert(&path, Some(&out)).unwrap();
        let markdown = std::fs::read_to_string(out).unwrap();
        assert!(markdown.starts_with("---\n"));
        assert!(markdown.contains("# Demo Skill"));
    }

    #[test]
    fn query_finds_values_and_rejects_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), DOC);

        query(&path, "meta.type", &[], false).unwrap();
        query(&path, "meta?name=x", &["type=y".into()], true).unwrap();
        let err = query(&path, "meta.owner", &[], true).unwrap_err();
        assert!(err.to_string().contains("path not found"));
        paths(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = hash(&tmp.path().join("nope.uasp.yaml"), false).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
