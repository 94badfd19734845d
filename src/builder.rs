//! Model building: assembling one model from its definition files.
//!
//! The build re-walks the model's root directory, classifies every file,
//! and buckets its rows by kind. Tables and fields (with schema attributes
//! applied) are fully realized before reference resolution starts, because
//! a reference may target any field in the model regardless of the order
//! files were visited in.
//!
//! Per-row and per-file problems never fail the build: bad rows, unknown
//! files, and unresolvable references are logged and skipped, and the rest
//! of the model is still produced.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::catalog::{Field, Model, Reference, Release, Schema, Table, Tables};
use crate::classify::{detect_file_kind, FileKind};
use crate::discover::ModelSeed;
use crate::reader::RecordReader;
use crate::records::{
    ConstraintKind, ConstraintRow, FieldRow, IndexRow, ReferenceRow, SchemaRow, TableRow,
};
use crate::walk::ScanFilter;

/// Build the full model for a discovered seed.
pub fn build_model(seed: &ModelSeed, filter: &ScanFilter) -> Model {
    let mut table_rows: Vec<TableRow> = Vec::new();
    let mut field_rows: HashMap<String, Vec<FieldRow>> = HashMap::new();
    let mut schema_rows: HashMap<(String, String), SchemaRow> = HashMap::new();
    let mut reference_rows: Vec<ReferenceRow> = Vec::new();
    let mut schema = Schema::default();

    for path in filter.walk(&seed.root) {
        let mut reader = match RecordReader::open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let kind = detect_file_kind(reader.header());

        if kind == FileKind::Unknown {
            warn!(path = %path.display(), "could not detect file kind");
            continue;
        }

        // Model declarations are handled by discovery and mappings by the
        // post-build resolver; neither contributes rows here.
        if matches!(kind, FileKind::Models | FileKind::Mappings) {
            continue;
        }

        let records = match reader.read_all() {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error reading file");
                continue;
            }
        };

        debug!(path = %path.display(), kind = %kind, rows = records.len(), "adding definition file");

        match kind {
            FileKind::Tables => {
                table_rows.extend(records.iter().map(TableRow::from_record));
            }

            FileKind::Fields => {
                for record in &records {
                    let row = FieldRow::from_record(record);
                    field_rows.entry(row.table.to_lowercase()).or_default().push(row);
                }
            }

            FileKind::Schema => {
                for record in &records {
                    let row = SchemaRow::from_record(record);
                    let key = (row.table.to_lowercase(), row.field.to_lowercase());
                    schema_rows.insert(key, row);
                }
            }

            FileKind::References => {
                for record in &records {
                    let row = ReferenceRow::from_record(record);
                    // References are recorded twice: as raw foreign-key
                    // constraints and as pending navigation edges.
                    schema.add_foreign_key(&row);
                    reference_rows.push(row);
                }
            }

            FileKind::Constraints => {
                for record in &records {
                    let row = ConstraintRow::from_record(record);
                    match row.kind {
                        ConstraintKind::PrimaryKey => schema.add_primary_key(&row),
                        ConstraintKind::Unique => schema.add_unique(&row),
                        ConstraintKind::NotNull => schema.add_not_nullable(&row),
                        ConstraintKind::Other => {}
                    }
                }
            }

            FileKind::Indexes => {
                for record in &records {
                    schema.add_index(&IndexRow::from_record(record));
                }
            }

            FileKind::Unknown | FileKind::Models | FileKind::Mappings => {}
        }
    }

    // Realize tables and their fields, schema attributes included, before
    // any reference is resolved.
    let mut tables = Tables::default();

    for table_row in &table_rows {
        let mut table = Table {
            name: table_row.table.clone(),
            label: table_row.label.clone(),
            description: table_row.description.clone(),
            fields: Default::default(),
        };

        if let Some(rows) = field_rows.get(&table_row.table.to_lowercase()) {
            for field_row in rows {
                let mut field = Field {
                    name: field_row.field.clone(),
                    label: field_row.label.clone(),
                    description: field_row.description.clone(),
                    required: field_row.required,
                    ..Field::default()
                };

                let key = (
                    table_row.table.to_lowercase(),
                    field_row.field.to_lowercase(),
                );
                if let Some(schema_row) = schema_rows.get(&key) {
                    field.data_type = schema_row.data_type.clone();
                    field.length = schema_row.length;
                    field.precision = schema_row.precision;
                    field.scale = schema_row.scale;
                    field.default = schema_row.default.clone();
                }

                table.fields.add(field);
            }
        }

        tables.add(table);
    }

    let model_name = if seed.row.label.is_empty() {
        format!("{}/{}", seed.row.model, seed.row.version)
    } else {
        seed.row.label.clone()
    };
    resolve_references(&mut tables, &reference_rows, &model_name);

    Model {
        name: seed.row.model.clone(),
        version: seed.row.version.clone(),
        label: seed.row.label.clone(),
        description: seed.row.description.clone(),
        url: seed.row.url.clone(),
        release: Release {
            level: seed.row.release_level.clone(),
            serial: seed.row.release_serial.clone(),
        },
        tables,
        schema,
        root: seed.root.clone(),
    }
}

/// Link pending reference rows against the completed tables.
///
/// Both endpoints must resolve for an edge to be created; a miss on either
/// side drops that one reference with a warning and the rest of the model
/// is unaffected.
fn resolve_references(tables: &mut Tables, rows: &[ReferenceRow], model: &str) {
    for row in rows {
        // Verify both endpoints and capture their canonical names before
        // mutating anything, so a dropped reference leaves no trace.
        let endpoints = {
            let Some(source_table) = tables.get(&row.table) else {
                warn!(model, table = %row.table, "no source table for reference");
                continue;
            };
            let Some(source_field) = source_table.fields.get(&row.field) else {
                warn!(model, table = %row.table, field = %row.field, "no source field for reference");
                continue;
            };
            let Some(target_table) = tables.get(&row.ref_table) else {
                warn!(
                    model,
                    table = %row.table,
                    field = %row.field,
                    ref_table = %row.ref_table,
                    "could not resolve referenced table"
                );
                continue;
            };
            let Some(target_field) = target_table.fields.get(&row.ref_field) else {
                warn!(
                    model,
                    table = %row.table,
                    field = %row.field,
                    ref_field = %row.ref_field,
                    "could not resolve referenced field"
                );
                continue;
            };

            (
                (source_table.name.clone(), source_field.name.clone()),
                (target_table.name.clone(), target_field.name.clone()),
            )
        };
        let ((source_table, source_field), (target_table, target_field)) = endpoints;

        if let Some(field) = tables
            .get_mut(&source_table)
            .and_then(|t| t.fields.get_mut(&source_field))
        {
            field.reference = Some(Reference {
                name: row.name.clone(),
                table: target_table.clone(),
                field: target_field.clone(),
            });
        }

        if let Some(field) = tables
            .get_mut(&target_table)
            .and_then(|t| t.fields.get_mut(&target_field))
        {
            field.inbound_refs.push(Reference {
                name: row.name.clone(),
                table: source_table,
                field: source_field,
            });
        }
    }
}
