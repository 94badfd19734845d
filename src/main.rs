//! # Model Harness CLI (`mdh`)
//!
//! The `mdh` binary is the primary interface for Model Harness. It syncs
//! definition sources, rebuilds the catalog, and reports on models and
//! source state.
//!
//! ## Usage
//!
//! ```bash
//! mdh --config ./config/mdh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mdh sync` | Refresh all sources and rebuild the catalog once |
//! | `mdh poll` | Keep checking sources on an interval, rebuilding on change |
//! | `mdh models` | Rebuild and list every model version in the catalog |
//! | `mdh sources` | Show configured sources and their sync state |
//!
//! Sources come from the config file or from repeated `--source` flags:
//!
//! ```bash
//! mdh sync --source https://github.com/org/definitions@master
//! mdh models --source /data/models --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use model_harness::catalog::RegistryHolder;
use model_harness::config::{self, Config};
use model_harness::rebuild::Rebuilder;
use model_harness::source::Source;

/// Model Harness CLI — a catalog service for versioned tabular data-model
/// definitions.
#[derive(Parser)]
#[command(
    name = "mdh",
    about = "Model Harness — a catalog of versioned tabular data-model definitions",
    version,
    long_about = "Model Harness ingests CSV definition files from local or git-hosted \
    source trees and maintains an in-memory catalog of versioned data models with \
    resolved references and cross-model field mappings."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mdh.toml")]
    config: PathBuf,

    /// Source locator `location[@branch]`; repeatable. Overrides the
    /// config file's source list.
    #[arg(long = "source", global = true)]
    sources: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Refresh all sources and rebuild the catalog once.
    ///
    /// Remote sources are cloned on first use and fetched afterwards. The
    /// rebuild always runs, whether or not any source changed.
    Sync,

    /// Check sources on an interval, rebuilding when one changes.
    ///
    /// Runs until interrupted. A source refresh failure is fatal and ends
    /// the process with an error.
    Poll {
        /// Seconds between checks. Overrides `poll.interval_secs`.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Rebuild the catalog and list every model version.
    Models {
        /// Emit the full catalog as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show configured sources and their sync state.
    Sources {
        /// Emit source status as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Sync => run_sync(&config, &cli.sources).await,
        Commands::Poll { interval } => run_poll(&config, &cli.sources, interval).await,
        Commands::Models { json } => run_models(&config, &cli.sources, json).await,
        Commands::Sources { json } => run_sources(&config, &cli.sources, json),
    }
}

/// Parse the effective source list: CLI flags win over the config file.
fn build_sources(config: &Config, overrides: &[String]) -> Result<Vec<Arc<Source>>> {
    let locators = if overrides.is_empty() {
        config.sources.clone()
    } else {
        overrides.to_vec()
    };

    if locators.is_empty() {
        bail!("no sources configured; set `sources` in the config file or pass --source");
    }

    locators
        .iter()
        .map(|locator| Source::parse(locator, &config.catalog.cache_dir).map(Arc::new))
        .collect()
}

fn build_rebuilder(
    config: &Config,
    overrides: &[String],
) -> Result<(Rebuilder, Arc<RegistryHolder>)> {
    let sources = build_sources(config, overrides)?;
    let holder = Arc::new(RegistryHolder::new());
    let rebuilder = Rebuilder::new(config, sources, Arc::clone(&holder))?;
    Ok((rebuilder, holder))
}

async fn run_sync(config: &Config, overrides: &[String]) -> Result<()> {
    let (rebuilder, holder) = build_rebuilder(config, overrides)?;

    rebuilder.update_sources().await?;
    rebuilder.rebuild().await?;

    let snapshot = holder.snapshot();
    let models = snapshot.list();
    let tables: usize = models.iter().map(|m| m.tables.len()).sum();
    let fields: usize = models
        .iter()
        .flat_map(|m| m.tables.list())
        .map(|t| t.fields.len())
        .sum();

    println!("sync");
    println!("  sources: {}", rebuilder.sources().len());
    println!("  models: {}", snapshot.len());
    println!("  tables: {}", tables);
    println!("  fields: {}", fields);
    println!("ok");

    Ok(())
}

async fn run_poll(config: &Config, overrides: &[String], interval: Option<u64>) -> Result<()> {
    let (rebuilder, _holder) = build_rebuilder(config, overrides)?;
    let interval = Duration::from_secs(interval.unwrap_or(config.poll.interval_secs));
    rebuilder.poll(interval).await
}

async fn run_models(config: &Config, overrides: &[String], json: bool) -> Result<()> {
    let (rebuilder, holder) = build_rebuilder(config, overrides)?;

    rebuilder.update_sources().await?;
    rebuilder.rebuild().await?;

    let snapshot = holder.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    println!("{:<24} {:<12} {}", "MODEL", "VERSION", "LABEL");
    for model in snapshot.list() {
        println!("{:<24} {:<12} {}", model.name, model.version, model.label);
    }

    Ok(())
}

fn run_sources(config: &Config, overrides: &[String], json: bool) -> Result<()> {
    let sources = build_sources(config, overrides)?;

    if json {
        let statuses: Vec<_> = sources.iter().map(|s| s.status()).collect();
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("{:<48} {:<12} {}", "SOURCE", "BRANCH", "GIT");
    for source in &sources {
        let status = source.status();
        println!("{:<48} {:<12} {}", status.uri, status.branch, status.git);
    }

    Ok(())
}
