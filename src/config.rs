use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::walk::ScanFilter;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Source locators, `location[@branch]`.
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Where remote sources are cloned.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Size of the model build worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the discovery → build queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds a build worker waits for work before logging a diagnostic.
    #[serde(default = "default_idle_warn_secs")]
    pub idle_warn_secs: u64,

    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,

    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            idle_warn_secs: default_idle_warn_secs(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".model-cache")
}

fn default_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    64
}

fn default_idle_warn_secs() -> u64 {
    1
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.csv".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

impl Config {
    /// A default configuration with no sources, for tests.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Build the tree-scan filter from the configured globs.
    pub fn scan_filter(&self) -> Result<ScanFilter> {
        ScanFilter::from_globs(&self.catalog.include_globs, &self.catalog.exclude_globs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.catalog.workers == 0 {
        anyhow::bail!("catalog.workers must be > 0");
    }

    if config.catalog.queue_capacity == 0 {
        anyhow::bail!("catalog.queue_capacity must be > 0");
    }

    if config.poll.interval_secs == 0 {
        anyhow::bail!("poll.interval_secs must be > 0");
    }

    // Surface bad glob patterns at load time.
    config.scan_filter()?;

    Ok(config)
}

/// Load the config file if it exists, otherwise fall back to defaults so
/// source locators can be supplied entirely on the command line.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}
