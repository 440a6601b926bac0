mod document_commands;
mod skill_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    skill_commands::SkillContext,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "uasp", about = "uasp: install and manage agent skills", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Project root holding the skill store (defaults to the current directory).
    #[arg(long, global = true, env = "UASP_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// Custom config directory (overrides default ~/.config/uasp/).
    #[arg(long, global = true, env = "UASP_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Print collected metrics (Prometheus text format) after the command.
    #[arg(long, global = true, default_value_t = false)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a skill (or `all` skills from a catalog) into the project.
    Install {
        /// Skill name, or `all` for every skill in the source's index.json.
        name: String,
        /// Source location: GitHub URL, `github:owner/repo[/path][#ref]`, or a local path.
        #[arg(short, long)]
        source: String,
        /// Reinstall even if the recorded version matches.
        #[arg(long)]
        force: bool,
        /// Skip the per-user host store.
        #[arg(long)]
        no_host_store: bool,
    },
    /// Remove an installed skill.
    Remove {
        name: String,
        /// Leave the per-user host store untouched.
        #[arg(long)]
        no_host_store: bool,
    },
    /// List installed skills.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Search installed skills by trigger keyword.
    Search { term: String },
    /// Show an installed skill and its document.
    Info { name: String },
    /// Report drift between the host-store ledger and disk.
    Status,
    /// Validate a skill document.
    Validate {
        file: PathBuf,
        /// Treat a stale `meta.version` as an error.
        #[arg(long)]
        strict: bool,
    },
    /// Convert a skill document to SKILL.md.
    Convert {
        file: PathBuf,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query a skill document by dot-separated path, e.g. `commands.run`.
    Query {
        file: PathBuf,
        /// Path, optionally followed by `?key=value&...` filters.
        path: String,
        /// Filter sequence results, `key=value` with `*` wildcards.
        #[arg(short = 'f', long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// List every queryable path in a skill document.
    Paths { file: PathBuf },
    /// Print, or with --update rewrite, a document's content fingerprint.
    Hash {
        file: PathBuf,
        #[arg(long)]
        update: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "uasp starting");

    if let Some(ref dir) = cli.config_dir {
        uasp_config::set_config_dir(dir.clone());
    }

    let metrics = match uasp_metrics::init_metrics(uasp_metrics::MetricsRecorderConfig {
        enabled: cli.print_metrics,
    }) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        },
    };

    let result = run(cli.command, cli.project_dir).await;

    if cli.print_metrics
        && let Some(handle) = metrics
    {
        print!("{}", handle.render());
    }

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, project_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let project_root = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match command {
        Commands::Install {
            name,
            source,
            force,
            no_host_store,
        } => {
            let ctx = SkillContext::load(&project_root)?;
            skill_commands::install(&ctx, &name, &source, force, no_host_store).await
        },
        Commands::Remove {
            name,
            no_host_store,
        } => {
            let ctx = SkillContext::load(&project_root)?;
            skill_commands::remove(&ctx, &name, no_host_store).await
        },
        Commands::List { json } => skill_commands::list(&SkillContext::load(&project_root)?, json),
        Commands::Search { term } => {
            skill_commands::search(&SkillContext::load(&project_root)?, &term)
        },
        Commands::Info { name } => skill_commands::info(&SkillContext::load(&project_root)?, &name),
        Commands::Status => skill_commands::status(&SkillContext::load(&project_root)?),
        Commands::Validate { file, strict } => {
            let config = uasp_config::discover_and_load(&project_root);
            document_commands::validate(&file, strict || config.validation.strict_version)
        },
        Commands::Convert { file, output } => document_commands::convert(&file, output.as_deref()),
        Commands::Query {
            file,
            path,
            filters,
            json,
        } => document_commands::query(&file, &path, &filters, json),
        Commands::Paths { file } => document_commands::paths(&file),
        Commands::Hash { file, update } => document_commands::hash(&file, update),
    }
}
