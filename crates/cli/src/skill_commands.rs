use std::path::Path;

use {
    anyhow::{Result, bail},
    uasp_skills::{
        InstallOptions, InstallReport, InstallTarget, Installer, RemoveOptions,
        project::InstalledSkillRecord,
    },
};

/// Installer plus the host-store default from configuration.
pub struct SkillContext {
    installer: Installer,
    host_default: bool,
}

impl SkillContext {
    pub fn load(project_root: &Path) -> Result<Self> {
        let config = uasp_config::discover_and_load(project_root);
        let home = uasp_config::home_dir();
        let installer = Installer::from_config(&config, project_root, home.as_deref())?;
        Ok(Self {
            installer,
            host_default: config.host.enabled,
        })
    }

    fn host_store(&self, no_host_store: bool) -> bool {
        self.host_default && !no_host_store
    }
}

pub async fn install(
    ctx: &SkillContext,
    name: &str,
    source: &str,
    force: bool,
    no_host_store: bool,
) -> Result<()> {
    let opts = InstallOptions {
        force,
        host_store: ctx.host_store(no_host_store),
    };
    let target = InstallTarget::from(name);
    let outcomes = ctx.installer.install_target(&target, source, opts).await?;

    if let InstallTarget::Skill(_) = target {
        for outcome in outcomes {
            print_report(&outcome.result?);
        }
        return Ok(());
    }

    let total = outcomes.len();
    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => print_report(&report),
            Err(e) => {
                eprintln!("error: {}: {e}", outcome.name);
                failed += 1;
            },
        }
    }
    if failed > 0 {
        bail!("{failed} of {total} skill(s) failed to install");
    }
    Ok(())
}

fn print_report(report: &InstallReport) {
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    let record = &report.record;
    match report.note() {
        Some(note) => println!("installed {} {} ({note})", record.name, record.version),
        None => println!("installed {} {}", record.name, record.version),
    }
}

pub async fn remove(ctx: &SkillContext, name: &str, no_host_store: bool) -> Result<()> {
    let opts = RemoveOptions {
        host_store: ctx.host_store(no_host_store),
    };
    let report = ctx.installer.remove(name, opts).await?;
    match (report.removed, report.note()) {
        (true, Some(note)) => println!("removed {name} ({note})"),
        (true, None) => println!("removed {name}"),
        (false, _) => println!("{name} is not installed; nothing removed"),
    }
    Ok(())
}

pub fn list(ctx: &SkillContext, json: bool) -> Result<()> {
    let records = ctx.installer.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No skills installed in {}.", ctx.installer.store_dir().display());
        return Ok(());
    }
    print_records(&records);
    Ok(())
}

pub fn search(ctx: &SkillContext, term: &str) -> Result<()> {
    let hits = ctx.installer.search(term)?;
    if hits.is_empty() {
        println!("No installed skill matches '{term}'.");
    } else {
        print_records(&hits);
    }
    Ok(())
}

fn print_records(records: &[InstalledSkillRecord]) {
    let width = records.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for r in records {
        let state = if r.enabled {
            ""
        } else {
            "  (disabled)"
        };
        println!(
            "{:<width$}  {}  {:<9}  {}{state}",
            r.name,
            r.version,
            r.kind.to_string(),
            r.source
        );
    }
}

pub fn info(ctx: &SkillContext, name: &str) -> Result<()> {
    let Some(info) = ctx.installer.info(name)? else {
        bail!("skill '{name}' is not installed");
    };
    let r = &info.record;
    println!("name:      {}", r.name);
    println!("version:   {}", r.version);
    println!("type:      {}", r.kind);
    println!("source:    {}", r.source);
    println!("path:      {}", r.path);
    println!("enabled:   {}", r.enabled);
    match info.document {
        Some(doc) => println!("\n{doc}"),
        None => eprintln!("warning: document missing from the project store"),
    }
    Ok(())
}

pub fn status(ctx: &SkillContext) -> Result<()> {
    let reports = ctx.installer.status()?;
    if reports.is_empty() {
        println!("Host store is empty.");
        return Ok(());
    }
    let width = reports.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for r in &reports {
        println!("{:<width$}  {}", r.name, r.state);
    }
    Ok(())
}
