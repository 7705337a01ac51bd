//! gitbuilder - continuous build scheduler
//!
//! One invocation runs one scheduling cycle against a build root:
//!
//! - clone the repository into `build_path` if it is not there yet
//! - for every tracked branch, build the next commit that needs a verdict
//!   (newest untested first, then bisecting towards the first bad commit)
//! - print a status table with one or more rows per branch
//!
//! Run it from cron or a loop; every cycle builds at most one commit per
//! branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use gitbuilder_ci::{BuildCycle, CycleResult};
use gitbuilder_core::{BuilderConfig, GitCli, LedgerBackend, WorkingTreeController};
use verdict_state::{FsVerdictLedger, SurrealVerdictLedger, VerdictLedger};

#[derive(Parser)]
#[command(name = "gitbuilder")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build every branch, bisect every regression", long_about = None)]
struct Cli {
    /// Path to the build root descriptor (JSON)
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Print the status report as JSON instead of a table
    #[arg(long)]
    report_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gitbuilder_core::init_tracing(cli.json, level);

    let config = load_config(&cli.config)?;
    let result = run_cycle(&config).await?;

    if cli.report_json {
        println!("{}", serde_json::to_string_pretty(&result.report.rows)?);
    } else if result.report.is_empty() {
        println!("No branches to report");
    } else {
        println!("{}", result.report);
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<BuilderConfig> {
    BuilderConfig::load(path)
        .with_context(|| format!("Failed to load build root descriptor {}", path.display()))
}

/// Open the ledger named by the descriptor.
async fn open_ledger(config: &BuilderConfig) -> Result<Arc<dyn VerdictLedger>> {
    let ledger: Arc<dyn VerdictLedger> = match config.ledger_backend {
        LedgerBackend::Fs => Arc::new(FsVerdictLedger::new(&config.out_path)),
        LedgerBackend::Surrealkv => {
            let path = config.surreal_path();
            Arc::new(
                SurrealVerdictLedger::open(&path)
                    .await
                    .with_context(|| format!("Failed to open ledger database {}", path.display()))?,
            )
        }
    };
    Ok(ledger)
}

/// Prepare the working tree and run one scheduling cycle.
async fn run_cycle(config: &BuilderConfig) -> Result<CycleResult> {
    let git = Arc::new(GitCli::new(&config.build_path, config.repo.clone()));
    git.prepare()
        .await
        .with_context(|| format!("Failed to prepare repository {}", config.repo))?;

    let ledger = open_ledger(config).await?;
    let cycle = BuildCycle::new(config, git, ledger).context("Invalid build root descriptor")?;
    let result = cycle.run().await.context("Build cycle aborted")?;

    info!(
        builds = result.summary.builds,
        passed = result.summary.passed,
        failed = result.summary.failed,
        duration_ms = result.duration_ms,
        "Cycle complete"
    );
    Ok(result)
}
