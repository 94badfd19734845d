//! Source management: tracking one location that contains definition files.
//!
//! A source is declared as `location[@branch]` where `location` is an
//! absolute filesystem path or a fetchable git URL; the branch defaults to
//! `master`. Remote sources are cloned into a cache directory on first use
//! and fetched + merged afterwards; change is detected by comparing the
//! current commit id against the previous one. Plain local directories have
//! no revision to compare, so they always report changed and force a full
//! rebuild on every poll.
//!
//! A refresh failure is fatal to the caller: there is no retry and no
//! last-known-good fallback, the error propagates out of the cycle.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Branch used when the locator does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// Outcome of a source update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Changed,
    Unchanged,
}

/// One tracked source location.
#[derive(Debug)]
pub struct Source {
    location: String,
    branch: String,
    /// Local directory holding the source's content.
    path: PathBuf,
    is_git: bool,
    state: Mutex<SourceState>,
}

#[derive(Debug, Default)]
struct SourceState {
    prev_sha: Option<String>,
    commit_sha: Option<String>,
    commit_time: Option<DateTime<Utc>>,
    fetch_time: Option<DateTime<Utc>>,
}

/// Reportable snapshot of a source's sync state.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub uri: String,
    pub branch: String,
    pub git: bool,
    pub fetch_time: Option<DateTime<Utc>>,
    pub commit: CommitStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitStatus {
    pub sha: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl Source {
    /// Parse a `location[@branch]` locator.
    ///
    /// Remote URLs map to a cache directory derived from a hash of the
    /// location; local paths are used in place and count as
    /// version-controlled only when they contain a `.git` directory.
    pub fn parse(locator: &str, cache_dir: &Path) -> Result<Self> {
        let (location, branch) = match locator.split_once('@') {
            Some((location, branch)) => (location, branch),
            None => (locator, DEFAULT_BRANCH),
        };

        if location.is_empty() {
            bail!("invalid source locator: '{locator}'");
        }

        if is_remote(location) {
            return Ok(Self {
                location: location.to_string(),
                branch: branch.to_string(),
                path: cache_dir.join(short_hash(location)),
                is_git: true,
                state: Mutex::new(SourceState::default()),
            });
        }

        let path = if Path::new(location).is_absolute() {
            PathBuf::from(location)
        } else {
            std::env::current_dir()
                .context("cannot resolve relative source path")?
                .join(location)
        };

        Ok(Self {
            location: path.to_string_lossy().to_string(),
            branch: branch.to_string(),
            is_git: path.join(".git").exists(),
            path,
            state: Mutex::new(SourceState::default()),
        })
    }

    /// `location@branch`.
    pub fn locator(&self) -> String {
        format!("{}@{}", self.location, self.branch)
    }

    /// Local directory holding the source's content.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_git(&self) -> bool {
        self.is_git
    }

    /// Refresh the source and report whether its content changed.
    ///
    /// Only one update runs at a time per source; an update attempted while
    /// another is in flight is a no-op reporting `Unchanged`. Refresh
    /// failures are returned as errors and are fatal to the cycle.
    pub fn update(&self) -> Result<UpdateOutcome> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!(source = %self.locator(), "update already in flight");
            return Ok(UpdateOutcome::Unchanged);
        };

        if !self.is_git {
            return Ok(UpdateOutcome::Changed);
        }

        if self.path.join(".git").exists() {
            self.pull()?;
        } else {
            self.clone_repo()?;
        }

        let (sha, commit_time) = self.commit_info()?;
        state.prev_sha = state.commit_sha.take();
        state.commit_sha = Some(sha);
        state.commit_time = commit_time;
        state.fetch_time = Some(Utc::now());

        if state.commit_sha != state.prev_sha {
            Ok(UpdateOutcome::Changed)
        } else {
            Ok(UpdateOutcome::Unchanged)
        }
    }

    pub fn status(&self) -> SourceStatus {
        let state = self.state.lock().expect("source state lock poisoned");

        SourceStatus {
            uri: self.location.clone(),
            branch: self.branch.clone(),
            git: self.is_git,
            fetch_time: state.fetch_time,
            commit: CommitStatus {
                sha: state.commit_sha.clone(),
                time: state.commit_time,
            },
        }
    }

    fn clone_repo(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create cache directory: {}", parent.display())
            })?;
        }

        let output = Command::new("git")
            .args(["clone", "--branch", &self.branch])
            .arg(&self.location)
            .arg(&self.path)
            .output()
            .context("failed to execute 'git clone'; is git installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git clone of {} failed: {}", self.location, stderr.trim());
        }

        info!(source = %self.locator(), "cloned source");
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        // A local clone with no origin has nothing to fetch from; its
        // current commit is still read below.
        if !self.has_origin()? {
            return Ok(());
        }

        let output = Command::new("git")
            .args(["fetch", "origin"])
            .current_dir(&self.path)
            .output()
            .context("failed to execute 'git fetch'")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git fetch of {} failed: {}", self.location, stderr.trim());
        }

        let remote = format!("origin/{}", self.branch);
        let output = Command::new("git")
            .args(["merge", &remote])
            .current_dir(&self.path)
            .output()
            .context("failed to execute 'git merge'")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git merge of {remote} failed: {}", stderr.trim());
        }

        debug!(source = %self.locator(), "refreshed source");
        Ok(())
    }

    fn has_origin(&self) -> Result<bool> {
        let output = Command::new("git")
            .args(["remote"])
            .current_dir(&self.path)
            .output()
            .context("failed to execute 'git remote'")?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .any(|remote| remote.trim() == "origin"))
    }

    /// Read the current commit id and commit time.
    fn commit_info(&self) -> Result<(String, Option<DateTime<Utc>>)> {
        let output = Command::new("git")
            .args(["log", "-1", "--format=%H|%ct"])
            .current_dir(&self.path)
            .output()
            .context("failed to execute 'git log'")?;

        if !output.status.success() {
            bail!("git log failed for {}", self.path.display());
        }

        let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let (sha, timestamp) = line
            .split_once('|')
            .with_context(|| format!("unexpected git log output: '{line}'"))?;

        let commit_time = timestamp
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok((sha.to_string(), commit_time))
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://")
        || location.starts_with("https://")
        || location.starts_with("git://")
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}
