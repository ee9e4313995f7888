//! worksync command-line tool.
//!
//! Runs the structured workspace merge on a git repository that is in the
//! middle of a merge, reports conflicts, and generates / validates
//! configuration files.

mod prompt;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

use worksync_core::config::{AppConfig, PreferSide};
use worksync_core::conflict::{ConflictResolver, PreferSideResolver};
use worksync_core::file_sync::FileSyncHandle;
use worksync_core::generator::QueueingGenerator;
use worksync_core::git::GitClient;
use worksync_core::merge::RecursiveFolderMerger;
use worksync_core::models::{ResultSide, Snapshot};
use worksync_core::store::{
    reconstruct_snapshot, DirFileStore, JsonSnapshotStore, SnapshotStore,
};
use worksync_core::sync_engine::{SyncHandler, SyncOutcome, SyncServices};

use crate::prompt::PromptResolver;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// worksync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "worksync",
    version,
    about = "Three-way structured merge for workspace definitions"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "worksync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge the workspace of a repository with a merge in progress.
    Merge {
        /// Repository root.
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Detect conflicts without changing anything.
        #[arg(long)]
        dry_run: bool,

        /// Resolve every conflict toward one side instead of asking.
        #[arg(long, value_enum)]
        prefer: Option<PreferArg>,
    },

    /// Report whether a merge would need user action (exit code 1 if so).
    Check {
        /// Repository root.
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./worksync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PreferArg {
    Ask,
    Local,
    Remote,
}

impl From<PreferArg> for PreferSide {
    fn from(arg: PreferArg) -> Self {
        match arg {
            PreferArg::Ask => PreferSide::Ask,
            PreferArg::Local => PreferSide::Local,
            PreferArg::Remote => PreferSide::Remote,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Merge {
            repo,
            dry_run,
            prefer,
        } => {
            let mut config = load_config(&cli.config)?;
            init_tracing(&config.log.level);
            if let Some(prefer) = prefer {
                config.merge.prefer = prefer.into();
            }
            let dry_run = dry_run || config.merge.dry_run;
            let outcome = cmd_merge(config, &repo, dry_run)?;
            Ok(exit_code(&outcome, dry_run))
        }
        Commands::Check { repo } => {
            let config = load_config(&cli.config)?;
            init_tracing(&config.log.level);
            let outcome = cmd_merge(config, &repo, true)?;
            Ok(exit_code(&outcome, true))
        }
        Commands::Init { output } => {
            init_tracing("warn");
            cmd_init(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            init_tracing("warn");
            cmd_validate(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    AppConfig::load_and_validate(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn exit_code(outcome: &SyncOutcome, dry_run: bool) -> ExitCode {
    if dry_run && outcome.user_action_required {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_merge(config: AppConfig, repo: &Path, dry_run: bool) -> Result<SyncOutcome> {
    let mut git = GitClient::new(repo).context("failed to open repository")?;
    let records = git
        .changed_files()
        .context("failed to collect merge change records")?;

    info!(
        repo = %repo.display(),
        records = records.len(),
        dry_run,
        "collected merge change records"
    );

    let mut store = JsonSnapshotStore::new(repo.join(&config.project.workspace_file));
    let mut local = load_local(&store, &records, &config.project.workspace_file)?;

    let mut generator = QueueingGenerator::new(config.project.generated_roots.clone());
    let mut files = DirFileStore::new(repo);
    let mut resolver: Box<dyn ConflictResolver> = match config.merge.prefer.side() {
        Some(side) => Box::new(PreferSideResolver::new(side)),
        None => Box::new(PromptResolver),
    };
    let tree_merger = RecursiveFolderMerger;
    let queue_path = repo.join(&config.project.regeneration_queue);

    let outcome = {
        let services = SyncServices {
            generator: &mut generator,
            store: &mut store,
            files: &mut files,
            resolver: resolver.as_mut(),
            transport: &mut git,
            tree_merger: &tree_merger,
        };
        let mut handler = SyncHandler::new(config, services);
        handler.handle_sync(&mut local, &records, dry_run)?
    };

    if !dry_run && !generator.is_empty() {
        generator
            .flush(&queue_path)
            .context("failed to write regeneration queue")?;
    }

    info!(
        run_id = %outcome.run_id,
        phase = %outcome.phase,
        user_action_required = outcome.user_action_required,
        "merge finished"
    );
    print_outcome(&outcome, dry_run);
    Ok(outcome)
}

/// The local workspace definition. While it conflicts, the working file
/// holds conflict markers, so the index's "ours" stage is read instead.
fn load_local(
    store: &JsonSnapshotStore,
    records: &[FileSyncHandle],
    workspace_file: &str,
) -> Result<Snapshot> {
    let Some(record) = records
        .iter()
        .find(|r| r.unmerged && r.path == workspace_file)
    else {
        return store
            .reload()
            .with_context(|| format!("failed to load {}", store.path().display()));
    };
    match record.bytes(ResultSide::Local) {
        Some(bytes) => reconstruct_snapshot(store, bytes, &Snapshot::default())
            .context("failed to read the local side of the conflicting workspace definition"),
        None => {
            info!("workspace definition deleted locally");
            Ok(Snapshot::default())
        }
    }
}

fn print_outcome(outcome: &SyncOutcome, dry_run: bool) {
    println!();
    println!(
        "{}",
        style::header(&format!("Workspace merge ({})", outcome.phase))
    );
    println!(
        "{}",
        style::dim(&format!(
            "run {}: {} added, {} removed, {} modified automatically",
            outcome.run_id, outcome.stats.added, outcome.stats.removed, outcome.stats.modified
        ))
    );

    if !outcome.conflicts.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Kind", "Conflict", "Local", "Remote", "Resolution"]);
        for conflict in &outcome.conflicts {
            table.add_row(vec![
                Cell::new(conflict.kind),
                Cell::new(&conflict.label),
                Cell::new(style::change(conflict.local_change)),
                Cell::new(style::change(conflict.remote_change)),
                Cell::new(style::side(conflict.resolution)),
            ]);
        }
        println!("{table}");
    }

    if !outcome.unmerged_paths.is_empty() {
        println!();
        println!("{}", style::header("Files merged outside the workspace"));
        for path in &outcome.unmerged_paths {
            println!("  {path}");
        }
    }

    println!();
    if !outcome.user_action_required {
        println!("{}", style::success("No user action required"));
    } else if dry_run {
        println!(
            "{}",
            style::warn("User action would be required to complete this merge")
        );
    } else {
        println!("{}", style::success("All conflicts resolved"));
    }
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# worksync configuration
# All keys are optional; shown values are the defaults.

[project]
workspace_file = "workspace.json"
elements_dir = "elements"
element_suffix = ".mod.json"
lang_root = "src/main/resources/lang"
generated_roots = ["src/main/java"]
base_templates = []
regeneration_queue = ".worksync/regenerate.json"

[merge]
supported_format_version = 202500100100
accept_development_builds = true
dry_run = false
# ask, local or remote
prefer = "ask"

[log]
level = "info"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;
    info!(path = %output.display(), "default configuration written");

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Adjust the project paths to your workspace layout");
    println!(
        "  2. Validate with: worksync validate --config {}",
        output.display()
    );
    println!(
        "  3. During a git merge run: worksync merge --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All required fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Workspace file   : {}", config.project.workspace_file);
    println!("  Elements dir     : {}", config.project.elements_dir);
    println!("  Language root    : {}", config.project.lang_root);
    println!(
        "  Generated roots  : {}",
        config.project.generated_roots.join(", ")
    );
    println!(
        "  Base templates   : {}",
        config.project.base_templates.len()
    );
    println!(
        "  Format version   : {}",
        config.merge.supported_format_version
    );
    println!("  Resolution       : {}", config.merge.prefer);
    println!();
    println!("{}", style::success("Configuration is valid."));

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
