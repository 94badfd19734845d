//! Field mapping resolution across models.
//!
//! Mappings may cross model, version, and source-tree boundaries, so this
//! pass runs exactly once, serially, after every model in every source has
//! been built and merged into the registry under construction. Each valid
//! row produces a symmetric pair of mapping records, one on each field.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalog::{FieldPath, Mapping, Registry};
use crate::classify::{detect_file_kind, FileKind};
use crate::reader::RecordReader;
use crate::records::MappingRow;
use crate::walk::ScanFilter;

/// Scan every source tree for mapping files and link the registry's fields.
pub fn link_mappings(registry: &mut Registry, roots: &[PathBuf], filter: &ScanFilter) {
    for root in roots {
        link_tree(registry, root, filter);
    }
}

fn link_tree(registry: &mut Registry, root: &Path, filter: &ScanFilter) {
    for path in filter.walk(root) {
        let mut reader = match RecordReader::open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        if detect_file_kind(reader.header()) != FileKind::Mappings {
            continue;
        }

        let records = match reader.read_all() {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error reading mappings file");
                continue;
            }
        };

        debug!(path = %path.display(), rows = records.len(), "found mappings file");

        for (offset, record) in records.iter().enumerate() {
            // Header row plus 1-indexing.
            let line = offset + 2;
            let row = MappingRow::from_record(record);

            if row.source_field.is_empty() || row.target_field.is_empty() {
                info!(path = %path.display(), line, "incomplete mapping");
                continue;
            }

            let Some(source) = resolve_endpoint(
                registry,
                &row.source_model,
                &row.source_version,
                &row.source_table,
                &row.source_field,
                &path,
                line,
            ) else {
                continue;
            };

            let Some(target) = resolve_endpoint(
                registry,
                &row.target_model,
                &row.target_version,
                &row.target_table,
                &row.target_field,
                &path,
                line,
            ) else {
                continue;
            };

            attach(
                registry,
                &target,
                Mapping {
                    field: source.clone(),
                    comment: row.comment.clone(),
                },
            );
            attach(
                registry,
                &source,
                Mapping {
                    field: target,
                    comment: row.comment.clone(),
                },
            );
        }
    }
}

/// Resolve one side of a mapping row to a canonical field path.
fn resolve_endpoint(
    registry: &Registry,
    model: &str,
    version: &str,
    table: &str,
    field: &str,
    path: &Path,
    line: usize,
) -> Option<FieldPath> {
    let Some(found_model) = registry.get(model, version) else {
        warn!(path = %path.display(), line, "no model {model}/{version}");
        return None;
    };

    let Some(found_table) = found_model.tables.get(table) else {
        warn!(path = %path.display(), line, model, version, "no table {table}");
        return None;
    };

    let Some(found_field) = found_table.fields.get(field) else {
        warn!(path = %path.display(), line, model, version, table, "no field {field}");
        return None;
    };

    Some(FieldPath {
        model: found_model.name.clone(),
        version: found_model.version.clone(),
        table: found_table.name.clone(),
        field: found_field.name.clone(),
    })
}

fn attach(registry: &mut Registry, at: &FieldPath, mapping: Mapping) {
    let field = registry
        .get_mut(&at.model, &at.version)
        .and_then(|m| m.tables.get_mut(&at.table))
        .and_then(|t| t.fields.get_mut(&at.field));

    if let Some(field) = field {
        field.mappings.push(mapping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_model;
    use crate::discover::find_models;
    use std::fs;

    fn filter() -> ScanFilter {
        ScanFilter::from_globs(&["**/*.csv".to_string()], &[]).unwrap()
    }

    fn write_minimal_model(root: &Path, name: &str, version: &str, table: &str, field: &str) {
        fs::create_dir_all(root).unwrap();
        fs::write(
            root.join("models.csv"),
            format!("model,version,label,description,url\n{name},{version},,d,\n"),
        )
        .unwrap();
        fs::write(
            root.join("tables.csv"),
            format!("model,version,table,description\n{name},{version},{table},d\n"),
        )
        .unwrap();
        fs::write(
            root.join("fields.csv"),
            format!(
                "model,version,table,field,description\n{name},{version},{table},{field},d\n"
            ),
        )
        .unwrap();
    }

    fn build_registry(root: &Path) -> Registry {
        let mut registry = Registry::new();
        for seed in find_models(root, &filter()) {
            registry.add(build_model(&seed, &filter()));
        }
        registry
    }

    #[test]
    fn test_mapping_is_symmetric() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_model(&dir.path().join("m1"), "alpha", "1", "person", "id");
        write_minimal_model(&dir.path().join("m2"), "beta", "2", "subject", "subject_id");
        fs::write(
            dir.path().join("mappings.csv"),
            "source_model,source_version,source_table,source_field,\
             target_model,target_version,target_table,target_field,comment\n\
             alpha,1,person,id,beta,2,subject,subject_id,same person\n",
        )
        .unwrap();

        let mut registry = build_registry(dir.path());
        let roots = vec![dir.path().to_path_buf()];
        link_mappings(&mut registry, &roots, &filter());

        let a = registry
            .get("alpha", "1")
            .unwrap()
            .tables
            .get("person")
            .unwrap()
            .fields
            .get("id")
            .unwrap();
        assert_eq!(a.mappings.len(), 1);
        assert_eq!(a.mappings[0].field.model, "beta");
        assert_eq!(a.mappings[0].field.field, "subject_id");
        assert_eq!(a.mappings[0].comment, "same person");

        let b = registry
            .get("beta", "2")
            .unwrap()
            .tables
            .get("subject")
            .unwrap()
            .fields
            .get("subject_id")
            .unwrap();
        assert_eq!(b.mappings.len(), 1);
        assert_eq!(b.mappings[0].field.model, "alpha");
        assert_eq!(b.mappings[0].field.table, "person");
    }

    #[test]
    fn test_unresolvable_row_is_skipped_whole() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_model(&dir.path().join("m1"), "alpha", "1", "person", "id");
        fs::write(
            dir.path().join("mappings.csv"),
            "source_model,source_version,source_table,source_field,\
             target_model,target_version,target_table,target_field,comment\n\
             alpha,1,person,id,ghost,9,subject,subject_id,dangling\n",
        )
        .unwrap();

        let mut registry = build_registry(dir.path());
        let roots = vec![dir.path().to_path_buf()];
        link_mappings(&mut registry, &roots, &filter());

        // Neither side is half-populated.
        let a = registry
            .get("alpha", "1")
            .unwrap()
            .tables
            .get("person")
            .unwrap()
            .fields
            .get("id")
            .unwrap();
        assert!(a.mappings.is_empty());
    }

    #[test]
    fn test_incomplete_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_model(&dir.path().join("m1"), "alpha", "1", "person", "id");
        fs::write(
            dir.path().join("mappings.csv"),
            "source_model,source_version,source_table,source_field,\
             target_model,target_version,target_table,target_field,comment\n\
             alpha,1,person,,alpha,1,person,id,missing source field\n",
        )
        .unwrap();

        let mut registry = build_registry(dir.path());
        let roots = vec![dir.path().to_path_buf()];
        link_mappings(&mut registry, &roots, &filter());

        let a = registry
            .get("alpha", "1")
            .unwrap()
            .tables
            .get("person")
            .unwrap()
            .fields
            .get("id")
            .unwrap();
        assert!(a.mappings.is_empty());
    }
}
