mod workflow_cmd;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use workflow_cmd::WorkflowSubcommand;

/// Operate partner onboarding workflows.
#[derive(Debug, Parser)]
#[command(name = "hyopps", version)]
pub struct Cli {
    /// Directory holding `store.json`, `config.toml` and extra workflow
    /// definitions.
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        env = "HYOPPS_DATA_DIR",
        default_value = ".hyopps",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log engine transitions to stderr. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub action: WorkflowSubcommand,
}

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    workflow_cmd::execute(cli).await
}
