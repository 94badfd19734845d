//! Definition-file discovery within a source tree.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

/// Include/exclude filter applied while walking a source tree.
#[derive(Debug)]
pub struct ScanFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl ScanFilter {
    /// Build a filter from glob patterns. `**/.git/**` is always excluded.
    pub fn from_globs(include: &[String], exclude: &[String]) -> Result<Self> {
        let mut default_excludes = vec!["**/.git/**".to_string()];
        default_excludes.extend(exclude.iter().cloned());

        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(&default_excludes)?,
        })
    }

    /// Collect every matching file under `root`, sorted for deterministic
    /// ordering. Unreadable entries are skipped with a diagnostic.
    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();

            if self.exclude.is_match(rel_str.as_ref()) {
                continue;
            }
            if !self.include.is_match(rel_str.as_ref()) {
                continue;
            }

            files.push(entry.into_path());
        }

        files.sort();
        files
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn csv_filter() -> ScanFilter {
        ScanFilter::from_globs(&["**/*.csv".to_string()], &[]).unwrap()
    }

    #[test]
    fn test_walk_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.csv"), "x\n").unwrap();
        fs::write(dir.path().join("sub/a.csv"), "x\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x\n").unwrap();

        let files = csv_filter().walk(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.csv"));
        assert!(files[1].ends_with("sub/a.csv"));
    }

    #[test]
    fn test_git_dir_always_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/index.csv"), "x\n").unwrap();
        fs::write(dir.path().join("models.csv"), "x\n").unwrap();

        let files = csv_filter().walk(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("models.csv"));
    }
}
