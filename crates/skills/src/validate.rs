//! Structural validation of parsed skill documents.

use std::collections::HashSet;

use crate::{
    parse::{ParsedSkill, validate_name},
    types::{Argument, Flag, SkillDocument},
    version::{VERSION_LEN, verify_version},
};

const MAX_DESCRIPTION_LEN: usize = 500;
const VALUE_TYPES: &[&str] = &["string", "int", "float", "bool", "ref", "enum", "path"];

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    /// Non-fatal findings (e.g. a stale fingerprint outside strict mode).
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates a parsed document. Pure and stateless for a fixed rule set.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, skill: &ParsedSkill) -> ValidationReport;
}

/// Built-in rule set: field formats, section shape, and cross-references.
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    strict_version: bool,
}

impl StructuralValidator {
    pub fn new(strict_version: bool) -> Self {
        Self { strict_version }
    }
}

impl SchemaValidator for StructuralValidator {
    fn validate(&self, skill: &ParsedSkill) -> ValidationReport {
        let mut report = ValidationReport::default();
        let doc = &skill.document;

        check_meta(doc, &mut report.errors);
        check_commands(doc, &mut report.errors);
        check_workflows(doc, &mut report.errors);
        check_sources(doc, &mut report.errors);
        check_references(doc, &mut report.errors);

        let check = verify_version(&skill.value);
        if !check.is_valid() {
            let msg = format!(
                "version mismatch: stored={}, calculated={}",
                check.stored, check.calculated
            );
            if self.strict_version {
                report.errors.push(msg);
            } else {
                report.warnings.push(msg);
            }
        }

        report
    }
}

fn check_meta(doc: &SkillDocument, errors: &mut Vec<String>) {
    let meta = &doc.meta;
    if !validate_name(&meta.name) {
        errors.push(format!(
            "meta.name '{}' must be lowercase with hyphens, starting with a letter",
            meta.name
        ));
    }
    let version_ok = meta.version.len() == VERSION_LEN
        && meta
            .version
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if !version_ok {
        errors.push(format!(
            "meta.version '{}' must be {VERSION_LEN} lowercase hex characters",
            meta.version
        ));
    }
    if let Some(desc) = &meta.description
        && desc.chars().count() > MAX_DESCRIPTION_LEN
    {
        errors.push(format!(
            "meta.description exceeds {MAX_DESCRIPTION_LEN} characters"
        ));
    }
}

fn check_commands(doc: &SkillDocument, errors: &mut Vec<String>) {
    for flag in doc.global_flags.iter().flatten() {
        check_flag("global_flags", flag, errors);
    }
    let Some(commands) = &doc.commands else {
        return;
    };
    for (name, cmd) in commands.iter() {
        if cmd.syntax.trim().is_empty() {
            errors.push(format!("commands.{name}.syntax is empty"));
        }
        for arg in &cmd.args {
            check_arg(&format!("commands.{name}"), arg, errors);
        }
        for flag in &cmd.flags {
            check_flag(&format!("commands.{name}"), flag, errors);
        }
    }
    for (name, template) in doc.templates.iter().flat_map(|t| t.iter()) {
        for arg in &template.args {
            check_arg(&format!("templates.{name}"), arg, errors);
        }
    }
}

fn check_arg(scope: &str, arg: &Argument, errors: &mut Vec<String>) {
    if !VALUE_TYPES.contains(&arg.ty.as_str()) {
        errors.push(format!(
            "{scope}.args.{}: unknown type '{}'",
            arg.name, arg.ty
        ));
    }
    if arg.ty == "enum" && arg.values.as_ref().is_none_or(Vec::is_empty) {
        errors.push(format!(
            "{scope}.args.{}: enum argument declares no values",
            arg.name
        ));
    }
}

fn check_flag(scope: &str, flag: &Flag, errors: &mut Vec<String>) {
    if !VALUE_TYPES.contains(&flag.ty.as_str()) {
        errors.push(format!(
            "{scope}.flags.{}: unknown type '{}'",
            flag.name, flag.ty
        ));
    }
}

fn check_workflows(doc: &SkillDocument, errors: &mut Vec<String>) {
    for (name, workflow) in doc.workflows.iter().flat_map(|w| w.iter()) {
        if workflow.steps.is_empty() {
            errors.push(format!("workflows.{name} has no steps"));
        }
    }
}

fn check_sources(doc: &SkillDocument, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for source in doc.sources.iter().flatten() {
        if !seen.insert(source.id.as_str()) {
            errors.push(format!("sources: duplicate id '{}'", source.id));
        }
    }
}

/// Cross-references only apply when the referenced section is declared.
fn check_references(doc: &SkillDocument, errors: &mut Vec<String>) {
    let entities: HashSet<&str> = doc
        .state
        .iter()
        .flat_map(|s| s.entities.iter().map(|e| e.name.as_str()))
        .collect();
    if !entities.is_empty() {
        for (name, cmd) in doc.commands.iter().flat_map(|c| c.iter()) {
            let refs = [
                ("requires", &cmd.requires),
                ("creates", &cmd.creates),
                ("invalidates", &cmd.invalidates),
            ];
            for (verb, list) in refs {
                for entity in list.iter().filter(|e| !entities.contains(e.as_str())) {
                    errors.push(format!(
                        "command '{name}' {verb} unknown state entity '{entity}'"
                    ));
                }
            }
        }
    }

    let source_ids: HashSet<&str> = doc
        .sources
        .iter()
        .flatten()
        .map(|s| s.id.as_str())
        .collect();
    if !source_ids.is_empty() {
        for (i, decision) in doc.decisions.iter().flatten().enumerate() {
            if let Some(reference) = &decision.reference
                && !source_ids.contains(reference.as_str())
            {
                errors.push(format!(
                    "decision {i} references unknown source '{reference}'"
                ));
            }
        }
    }
}
