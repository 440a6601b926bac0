//! Projection of a canonical document into the host's `SKILL.md` format.
//!
//! The output is a markdown file with YAML frontmatter. Rendering is a pure
//! function of its inputs: the same document and [`InstallMeta`] always give
//! byte-identical output.
//!
//! The projection is lossy. State entities, `reference` lookup tables,
//! templates, environment variables, and global flags have no counterpart in
//! the secondary format and are not rendered.

use serde::Serialize;

use crate::{
    error::Result,
    types::{Argument, Command, Constraints, Flag, SkillDocument, SkillKind, Workflow},
};

/// File name of the secondary document inside a host-store skill directory.
pub const SECONDARY_FILE_NAME: &str = "SKILL.md";

/// Install-time facts embedded in the frontmatter. Never a timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallMeta {
    /// Where the skill came from, e.g. `acme/skills`.
    pub source: Option<String>,
}

#[derive(Serialize)]
struct Frontmatter<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(rename = "allowed-tools", skip_serializing_if = "Option::is_none")]
    allowed_tools: Option<String>,
    metadata: FrontmatterMeta<'a>,
}

#[derive(Serialize)]
struct FrontmatterMeta<'a> {
    version: &'a str,
    #[serde(rename = "type")]
    kind: SkillKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
}

pub fn to_secondary_format(doc: &SkillDocument, meta: &InstallMeta) -> Result<String> {
    let mut out = Markdown::default();

    let frontmatter = Frontmatter {
        name: doc.name(),
        description: doc.meta.description.as_deref().map(str::trim),
        allowed_tools: (doc.kind() == SkillKind::Cli && doc.command_count() > 0)
            .then(|| format!("Bash({}:*)", doc.name())),
        metadata: FrontmatterMeta {
            version: doc.version(),
            kind: doc.kind(),
            source: meta.source.as_deref(),
        },
    };
    out.line("---");
    out.raw(serde_yaml::to_string(&frontmatter)?.trim_end());
    out.line("---");

    out.block(format!("# {}", title_case(doc.name())));
    if let Some(description) = &doc.meta.description {
        out.block(description.trim());
    }
    if !doc.keywords().is_empty() {
        out.block(format!("**Keywords:** {}", doc.keywords().join(", ")));
    }

    if let Some(triggers) = &doc.triggers
        && !triggers.intents.is_empty()
    {
        out.heading(2, "When to Use");
        out.bullets(triggers.intents.iter().map(String::as_str));
    }

    if let Some(constraints) = &doc.constraints
        && !constraints.is_empty()
    {
        render_constraints(&mut out, constraints);
    }

    if let Some(decisions) = &doc.decisions
        && !decisions.is_empty()
    {
        out.heading(2, "Decisions");
        out.bullets(decisions.iter().map(|d| format!("When {}: {}", d.when, d.then)));
    }

    if let Some(commands) = &doc.commands
        && !commands.is_empty()
    {
        out.heading(2, "Commands");
        for (name, command) in commands.iter() {
            render_command(&mut out, name, command);
        }
    }

    if let Some(workflows) = &doc.workflows
        && !workflows.is_empty()
    {
        out.heading(2, "Workflows");
        for (name, workflow) in workflows.iter() {
            render_workflow(&mut out, name, workflow);
        }
    }

    if let Some(sources) = &doc.sources
        && !sources.is_empty()
    {
        out.heading(2, "References");
        out.bullets(sources.iter().map(|s| match (&s.url, &s.path) {
            (Some(url), _) => format!("[{}]({url})", s.id),
            (None, Some(path)) => format!("{}: {path}", s.id),
            (None, None) => s.id.clone(),
        }));
    }

    Ok(out.finish())
}

fn render_constraints(out: &mut Markdown, constraints: &Constraints) {
    out.heading(2, "Constraints");
    if !constraints.never.is_empty() {
        out.heading(3, "Never");
        out.bullets(constraints.never.iter().map(String::as_str));
    }
    if !constraints.always.is_empty() {
        out.heading(3, "Always");
        out.bullets(constraints.always.iter().map(String::as_str));
    }
    if !constraints.prefer.is_empty() {
        out.heading(3, "Preferences");
        out.bullets(constraints.prefer.iter().map(|p| {
            let mut line = format!("prefer **{}** over {}", p.use_, p.over);
            if let Some(when) = &p.when {
                line.push_str(", when ");
                line.push_str(when);
            }
            line
        }));
    }
}

fn render_command(out: &mut Markdown, name: &str, command: &Command) {
    out.heading(3, name);
    out.block(format!("```bash\n{}\n```", command.syntax.trim()));
    if let Some(description) = &command.description {
        out.block(description.trim());
    }
    if !command.args.is_empty() {
        out.block(argument_table(&command.args));
    }
    if !command.flags.is_empty() {
        out.block(flag_table(&command.flags));
    }
    if let Some(note) = &command.note {
        out.block(format!("> Note: {}", note.trim()));
    }
}

fn render_workflow(out: &mut Markdown, name: &str, workflow: &Workflow) {
    out.heading(3, &title_case(name));
    out.block(workflow.description.trim());
    let steps: Vec<String> = workflow
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let mut line = format!("{}. `{}`", i + 1, step.cmd);
            if step.optional {
                line.push_str(" (optional)");
            }
            if let Some(note) = &step.note {
                line.push_str(": ");
                line.push_str(note);
            }
            line
        })
        .collect();
    out.block(steps.join("\n"));
}

fn argument_table(args: &[Argument]) -> String {
    let mut rows = vec![
        "| Argument | Type | Required | Description |".to_string(),
        "|---|---|---|---|".to_string(),
    ];
    for arg in args {
        let mut description = arg.description.clone().unwrap_or_default();
        if let Some(values) = &arg.values {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&format!("(one of: {})", values.join(", ")));
        }
        rows.push(format!(
            "| `{}` | {} | {} | {} |",
            arg.name,
            arg.ty,
            if arg.required { "yes" } else { "no" },
            cell(&description)
        ));
    }
    rows.join("\n")
}

fn flag_table(flags: &[Flag]) -> String {
    let mut rows = vec![
        "| Flag | Type | Default | Purpose |".to_string(),
        "|---|---|---|---|".to_string(),
    ];
    for flag in flags {
        let mut names: Vec<&str> = Vec::new();
        if let Some(short) = &flag.short {
            names.push(short);
        }
        names.push(flag.long.as_deref().unwrap_or(&flag.name));
        let names = names
            .iter()
            .map(|n| format!("`{n}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let default = match &flag.default {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        rows.push(format!(
            "| {names} | {} | {} | {} |",
            flag.ty,
            cell(&default),
            cell(flag.purpose.as_deref().unwrap_or_default())
        ));
    }
    rows.join("\n")
}

/// Keep table cells on one line and escape column separators.
fn cell(text: &str) -> String {
    text.trim().replace('\n', " ").replace('|', "\\|")
}

/// `demo-skill` → `Demo Skill`.
fn title_case(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Blank-line separated markdown blocks.
#[derive(Default)]
struct Markdown {
    lines: Vec<String>,
}

impl Markdown {
    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn raw(&mut self, text: &str) {
        self.lines.extend(text.lines().map(str::to_string));
    }

    fn block(&mut self, text: impl Into<String>) {
        self.lines.push(String::new());
        self.lines.push(text.into());
    }

    fn heading(&mut self, level: usize, title: &str) {
        self.block(format!("{} {title}", "#".repeat(level)));
    }

    fn bullets<S: AsRef<str>>(&mut self, items: impl IntoIterator<Item = S>) {
        let body: Vec<String> = items
            .into_iter()
            .map(|item| format!("- {}", item.as_ref()))
            .collect();
        self.block(body.join("\n"));
    }

    fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::parse::parse_document};

    fn render(raw: &str) -> String {
        let parsed = parse_document(raw).unwrap();
        to_secondary_format(&parsed.document, &InstallMeta::default()).unwrap()
    }

    const FULL: &str = r#"
meta:
  name: demo-skill
  version: "0a1b2c3d"
  type: cli
  description: Drive the demo tool.
triggers:
  keywords: [alpha, beta]
  intents: [run a demo]
constraints:
  never: [X]
  always: [check status first]
  prefer:
    - use: demo run
      over: manual scripts
      when: automating
decisions:
  - when: target is remote
    then: pass --remote
commands:
  run:
    syntax: demo run <target>
    description: Run a target.
    args:
      - name: target
        type: enum
        required: true
        values: [a, b]
    flags:
      - name: --verbose
        short: -v
        type: bool
        default: false
        purpose: Chatty | loud output
    note: Needs a running daemon.
workflows:
  quick_start:
    description: Start fast.
    steps:
      - cmd: demo run a
        note: first run
      - cmd: demo status
        optional: true
sources:
  - id: docs
    url: https://example.com/docs
  - id: local
    path: docs/local.md
  - id: bare
"#;

    #[test]
    fn renders_sections_in_order() {
        let md = render(FULL);
        let order = [
            "Bash(demo-skill:*)",
            "# Demo Skill",
            "Drive the demo tool.",
            "**Keywords:** alpha, beta",
            "## When to Use",
            "### Never",
            "### Always",
            "- prefer **demo run** over manual scripts, when automating",
            "- When target is remote: pass --remote",
            "```bash\ndemo run <target>\n```",
            "| `target` | enum | yes | (one of: a, b) |",
            "| `-v`, `--verbose` | bool | false | Chatty \\| loud output |",
            "> Note: Needs a running daemon.",
            "### Quick Start",
            "1. `demo run a`: first run",
            "2. `demo status` (optional)",
            "- [docs](https://example.com/docs)",
            "- local: docs/local.md",
            "- bare",
        ];
        let mut cursor = 0;
        for needle in order {
            let found = md[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}\n{md}"));
            cursor += found + needle.len();
        }
        assert!(md.starts_with("---\nname: demo-skill\n"));
    }

    #[test]
    fn never_section_contains_item() {
        let md = render("meta:\n  name: x\n  version: '0'\n  type: knowledge\nconstraints:\n  never: [X]\n");
        assert!(md.contains("### Never\n\n- X"));
        assert!(!md.contains("### Always"));
        assert!(!md.contains("allowed-tools"));
    }

    #[test]
    fn state_only_document_has_no_state_section() {
        let md = render(
            "meta:\n  name: x\n  version: '0'\n  type: knowledge\nstate:\n  entities:\n    - name: session\n      created_by: [open]\n",
        );
        assert!(!md.to_lowercase().contains("state"));
        assert!(!md.contains("session"));
        assert!(!md.contains("## "));
    }

    #[test]
    fn cli_without_commands_gets_no_grant() {
        let md = render("meta:\n  name: x\n  version: '0'\n  type: cli\n");
        assert!(!md.contains("allowed-tools"));
    }

    #[test]
    fn output_is_deterministic() {
        let parsed = parse_document(FULL).unwrap();
        let meta = InstallMeta {
            source: Some("acme/skills".into()),
        };
        let a = to_secondary_format(&parsed.document, &meta).unwrap();
        let b = to_secondary_format(&parsed.document, &meta).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("acme/skills"));
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("demo-skill"), "Demo Skill");
        assert_eq!(title_case("quick_start"), "Quick Start");
    }
}
