//! Model discovery: finding model declarations in a source tree.
//!
//! Every file that classifies as the `models` kind declares exactly one
//! model, described by the file's first data row and scoped to the file's
//! containing directory. The builder later collects that model's definition
//! files from the same subtree.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::classify::{detect_file_kind, FileKind};
use crate::reader::RecordReader;
use crate::records::ModelRow;
use crate::walk::ScanFilter;

/// A discovered model declaration: identity and metadata plus the directory
/// its definition files live under. Seeds are what the build phase fans out
/// over.
#[derive(Debug, Clone)]
pub struct ModelSeed {
    pub row: ModelRow,
    pub root: PathBuf,
}

/// Walk `root` and collect a seed for every model declaration found.
pub fn find_models(root: &Path, filter: &ScanFilter) -> Vec<ModelSeed> {
    let mut seeds = Vec::new();

    for path in filter.walk(root) {
        let mut reader = match RecordReader::open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        if detect_file_kind(reader.header()) != FileKind::Models {
            continue;
        }

        // Only the first data row declares the model.
        match reader.next_record() {
            Some(Ok(record)) => {
                let row = ModelRow::from_record(&record);
                let model_root = path.parent().unwrap_or(root).to_path_buf();

                debug!(
                    path = %path.display(),
                    model = %row.model,
                    version = %row.version,
                    "discovered model declaration"
                );

                seeds.push(ModelSeed {
                    row,
                    root: model_root,
                });
            }
            Some(Err(e)) => {
                error!(path = %path.display(), error = %e, "error reading model declaration");
            }
            None => {}
        }
    }

    seeds
}
