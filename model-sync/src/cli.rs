///
/// This module implements the CLI interface for model-sync: command parsing,
/// argument validation and the async entrypoint used by `main` and by tests.
///
/// All sync logic (mapping, push, pull, diff) lives in the [`model-sync-core`]
/// crate. This module is CLI glue: it loads configuration, builds the Sigma
/// client, calls into the core and turns the per-entry report into a process
/// outcome (error when any entry failed).
///
/// [`model-sync-core`]: ../../model-sync-core/
use crate::client::SigmaClient;
use crate::load_config::{folder_from_env, load_config, CliConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use model_sync_core::contract::ModelApi;
use model_sync_core::diff::{self, Baseline};
use model_sync_core::git;
use model_sync_core::pull::{pull, PullOptions, PullSelection};
use model_sync_core::push::{push, PushOptions};
use model_sync_core::report::SyncReport;
use std::path::PathBuf;

/// CLI for model-sync: keep data model JSON files and Sigma in sync.
#[derive(Parser)]
#[clap(
    name = "model-sync",
    version,
    about = "Push, pull and diff Sigma data models kept as JSON files in git"
)]
pub struct Cli {
    /// Path to the YAML mapping file
    #[clap(
        long,
        global = true,
        env = "MODEL_SYNC_CONFIG",
        default_value = "config.yml"
    )]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update data models on Sigma from local JSON files
    Push {
        /// Files to push (default: every mapped file plus unmapped files in the models dir)
        #[clap(conflicts_with = "all")]
        files: Vec<String>,
        /// Push every mapped file plus unmapped files in the models dir
        #[clap(long)]
        all: bool,
        /// Do not overwrite local files with Sigma's version after pushing
        #[clap(long)]
        no_write_back: bool,
    },
    /// Overwrite local JSON files with the current data models on Sigma
    Pull {
        /// Pull a single data model by id
        #[clap(long, conflicts_with = "name")]
        id: Option<String>,
        /// Pull data models whose name matches (case-insensitive)
        #[clap(long)]
        name: Option<String>,
        /// Do not add remote data models missing from the mapping
        #[clap(long)]
        no_discover: bool,
    },
    /// Render a markdown report of changed data model files
    Diff {
        /// Git ref the changes are compared against
        #[clap(long, default_value = "origin/main")]
        base: String,
        /// Baseline for the "before" side of each file
        #[clap(long, value_enum, default_value = "git")]
        against: Against,
        /// Write the report to this file instead of stdout
        #[clap(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Against {
    /// The file's contents at the base ref
    Git,
    /// The data model's current version on Sigma
    Remote,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let mut config = load_config(&cli.config)?;

    match cli.command {
        Commands::Push {
            files,
            all: _,
            no_write_back,
        } => {
            tracing::info!(command = "push", "Starting push");
            let client = SigmaClient::from_env(&config.mapping).await?;
            let options = PushOptions {
                files,
                folder_id: folder_from_env(),
                write_back: !no_write_back,
            };
            push_command(&client, &mut config, &options).await
        }
        Commands::Pull {
            id,
            name,
            no_discover,
        } => {
            tracing::info!(command = "pull", "Starting pull");
            let client = SigmaClient::from_env(&config.mapping).await?;
            let selection = match (id, name) {
                (Some(id), _) => PullSelection::Id(id),
                (None, Some(name)) => PullSelection::Name(name),
                (None, None) => PullSelection::All,
            };
            let options = PullOptions {
                selection,
                discover: !no_discover,
            };
            pull_command(&client, &mut config, &options).await
        }
        Commands::Diff {
            base,
            against,
            output,
        } => {
            tracing::info!(command = "diff", base = %base, ?against, "Starting diff report");
            let baseline = match against {
                Against::Git => Baseline::GitRef(base),
                Against::Remote => Baseline::Remote(base),
            };
            let report = diff_command(&config, &baseline).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &report)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    tracing::info!(path = %path.display(), "Diff report written");
                }
                None => print!("{report}"),
            }
            Ok(())
        }
    }
}

/// Push with an already constructed API client, save the mapping, print the summary.
pub async fn push_command<A>(api: &A, config: &mut CliConfig, options: &PushOptions) -> Result<()>
where
    A: ModelApi + ?Sized,
{
    let report = push(api, &mut config.mapping, &config.root, options)
        .await
        .context("Push aborted")?;
    finish(config, &report, "Synced")
}

/// Pull with an already constructed API client, save the mapping, print the summary.
pub async fn pull_command<A>(api: &A, config: &mut CliConfig, options: &PullOptions) -> Result<()>
where
    A: ModelApi + ?Sized,
{
    let report = pull(api, &mut config.mapping, &config.root, options)
        .await
        .context("Pull aborted")?;
    finish(config, &report, "Pulled")
}

fn finish(config: &CliConfig, report: &SyncReport, verb: &str) -> Result<()> {
    if report.mapping_changed {
        config.save_mapping()?;
    }
    print!("{}", report.summary(verb));
    if report.is_success() {
        tracing::info!(succeeded = report.succeeded(), "Run completed successfully");
        Ok(())
    } else {
        tracing::error!(failed = report.failed(), "Run finished with failures");
        anyhow::bail!("{} data model(s) failed", report.failed())
    }
}

/// Build the markdown diff report for the configured repository.
pub async fn diff_command(config: &CliConfig, baseline: &Baseline) -> Result<String> {
    let models_dir = config.mapping.models_dir();
    let changes = match baseline {
        Baseline::GitRef(reference) => {
            diff::collect_git_changes(&config.root, reference, models_dir)?
        }
        Baseline::Remote(reference) => {
            let files = git::changed_model_files(&config.root, reference, models_dir)?;
            if files.is_empty() {
                Vec::new()
            } else {
                let client = SigmaClient::from_env(&config.mapping).await?;
                diff::collect_remote_changes(&client, &config.mapping, &config.root, &files).await
            }
        }
    };
    Ok(diff::render_report(&changes))
}
