//! adcheck - validate checkers and service layout of an attack/defense game
//!
//! ## Commands
//!
//! - `list`: show the selected services
//! - `up` / `down` / `logs`: drive each service through docker-compose
//! - `check`: run every checker for `RUNS` rounds
//! - `validate`: check the directory layout and compose manifests
//! - `dump-tasks`: print scheduler tasks as YAML
//!
//! Host, rounds and the selected service come from `HOST`, `RUNS` and
//! `SERVICE` (or the matching flags).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use adcheck_checker::{CheckerProxy, TaskDump, ValidationHarness};
use adcheck_core::config::{DEFAULT_HOST, DEFAULT_RUNS};
use adcheck_core::{CoreError, FailFastReporter, Fatal, HarnessConfig, StructureValidator, Target};

/// Unit name for messages that belong to no particular service.
const MAIN_UNIT: &str = "adcheck";

#[derive(Parser)]
#[command(name = "adcheck")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate checkers and services for an attack/defense game", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Game repository root (contains services/ and checkers/)
    #[arg(long, global = true, env = "ADCHECK_ROOT", default_value = ".")]
    root: PathBuf,

    /// Service to operate on, or "all"
    #[arg(long, global = true, env = "SERVICE")]
    service: Option<String>,

    /// Host passed to the checkers
    #[arg(long, global = true, env = "HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Rounds per checker
    #[arg(long, global = true, env = "RUNS", default_value_t = DEFAULT_RUNS)]
    runs: usize,

    /// Ceiling on concurrent rounds (default: twice the CPU count)
    #[arg(long, global = true, env = "MAX_THREADS")]
    max_threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selected services
    List,

    /// Build and start services
    Up,

    /// Stop services and remove their volumes
    Down,

    /// Print service logs
    Logs,

    /// Run checkers against the running services
    Check,

    /// Validate repository structure and compose manifests
    Validate,

    /// Dump checker tasks in YAML
    DumpTasks,
}

impl Cli {
    fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            host: self.host.clone(),
            runs: self.runs,
            max_threads: self
                .max_threads
                .unwrap_or_else(HarnessConfig::default_max_threads),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    adcheck_core::init_tracing(cli.json, level);

    let reporter = FailFastReporter::new();
    match run(&cli, &reporter).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // Already reported through the reporter.
        Err(e) if is_fatal(&e) => Ok(ExitCode::FAILURE),
        Err(e) => Err(e),
    }
}

async fn run(cli: &Cli, reporter: &Arc<FailFastReporter>) -> Result<()> {
    let config = cli.harness_config();
    let targets = Target::discover(&cli.root, cli.service.as_deref(), reporter)?;

    match cli.command {
        Commands::List => Ok(()),
        Commands::Up => cmd_up(&targets).await,
        Commands::Down => cmd_down(&targets).await,
        Commands::Logs => cmd_logs(&targets).await,
        Commands::Check => cmd_check(&targets, &config, reporter).await,
        Commands::Validate => cmd_validate(&targets, reporter),
        Commands::DumpTasks => cmd_dump_tasks(&targets, &config.host, reporter).await,
    }
}

fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Fatal>().is_some()
        || matches!(err.downcast_ref::<CoreError>(), Some(CoreError::Fatal(_)))
}

/// Build and start every service
async fn cmd_up(targets: &[Target]) -> Result<()> {
    for target in targets {
        target
            .up()
            .await
            .with_context(|| format!("Failed to start {target}"))?;
    }
    Ok(())
}

/// Stop every service
async fn cmd_down(targets: &[Target]) -> Result<()> {
    for target in targets {
        target
            .down()
            .await
            .with_context(|| format!("Failed to stop {target}"))?;
    }
    Ok(())
}

async fn cmd_logs(targets: &[Target]) -> Result<()> {
    for target in targets {
        target
            .logs()
            .await
            .with_context(|| format!("Failed to read logs of {target}"))?;
    }
    Ok(())
}

/// Run `runs` rounds of each checker; services are handled one after another
async fn cmd_check(
    targets: &[Target],
    config: &HarnessConfig,
    reporter: &Arc<FailFastReporter>,
) -> Result<()> {
    for target in targets {
        let proxy = CheckerProxy::for_target(target, &config.host, reporter).await?;
        let proxy = Arc::new(proxy);
        let summary = ValidationHarness::new(Arc::clone(&proxy), config).run().await?;
        proxy.reporter().info(format!(
            "passed: {} rounds, {} flags",
            summary.rounds, summary.flags
        ));
    }
    Ok(())
}

/// Validate every service; keeps going after errors and fails at the end
fn cmd_validate(targets: &[Target], reporter: &Arc<FailFastReporter>) -> Result<()> {
    let mut failed = false;
    for target in targets {
        if !StructureValidator::for_target(target).validate() {
            failed = true;
        }
    }

    if failed {
        return Err(reporter.abort(MAIN_UNIT, "Structure validator: failed").into());
    }
    reporter.info(MAIN_UNIT, "Structure validator: passed");
    Ok(())
}

async fn cmd_dump_tasks(
    targets: &[Target],
    host: &str,
    reporter: &Arc<FailFastReporter>,
) -> Result<()> {
    let dump = TaskDump::collect(targets, host, reporter).await?;
    let yaml = dump.to_yaml().context("Failed to render tasks")?;
    println!("{yaml}");
    Ok(())
}
