//! Typed row records for each definition-file kind.
//!
//! Raw header-keyed records are converted into per-kind structs immediately
//! after classification, so everything downstream of the parse works with
//! typed values instead of string-keyed maps. Missing columns read as empty
//! strings; numeric schema attributes that fail to parse are logged and left
//! at zero.

use tracing::warn;

use crate::reader::Record;

fn get(record: &Record, key: &str) -> String {
    record.get(key).cloned().unwrap_or_default()
}

/// Parse a yes/no column. Accepts `yes`, `y`, and `1` in any case.
fn flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "yes" | "y" | "1")
}

/// Collapse runs of whitespace (including embedded newlines) to one space.
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn numeric(value: &str, attr: &str, table: &str, field: &str) -> u32 {
    if value.is_empty() {
        return 0;
    }

    match value.parse() {
        Ok(n) => n,
        Err(_) => {
            warn!(table, field, value, "invalid {attr}, using 0");
            0
        }
    }
}

/// One row of a models file: a model declaration.
#[derive(Debug, Clone)]
pub struct ModelRow {
    pub model: String,
    pub version: String,
    pub label: String,
    pub description: String,
    pub url: String,
    pub release_level: String,
    pub release_serial: String,
}

impl ModelRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            model: get(record, "model"),
            version: get(record, "version"),
            label: get(record, "label"),
            description: get(record, "description"),
            url: get(record, "url"),
            release_level: get(record, "release_level"),
            release_serial: get(record, "release_serial"),
        }
    }
}

/// One row of a tables file.
#[derive(Debug, Clone)]
pub struct TableRow {
    pub table: String,
    pub label: String,
    pub description: String,
}

impl TableRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            table: get(record, "table"),
            label: get(record, "label"),
            description: collapse_whitespace(&get(record, "description")),
        }
    }
}

/// One row of a fields file.
#[derive(Debug, Clone)]
pub struct FieldRow {
    pub table: String,
    pub field: String,
    pub label: String,
    pub description: String,
    pub required: bool,
}

impl FieldRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            table: get(record, "table"),
            field: get(record, "field"),
            label: get(record, "label"),
            description: collapse_whitespace(&get(record, "description")),
            required: flag(&get(record, "required")),
        }
    }
}

/// One row of a schema file: storage attributes for a (table, field) pair.
#[derive(Debug, Clone)]
pub struct SchemaRow {
    pub table: String,
    pub field: String,
    pub data_type: String,
    pub length: u32,
    pub precision: u32,
    pub scale: u32,
    pub default: String,
}

impl SchemaRow {
    pub fn from_record(record: &Record) -> Self {
        let table = get(record, "table");
        let field = get(record, "field");

        Self {
            data_type: get(record, "type"),
            length: numeric(&get(record, "length"), "length", &table, &field),
            precision: numeric(&get(record, "precision"), "precision", &table, &field),
            scale: numeric(&get(record, "scale"), "scale", &table, &field),
            default: get(record, "default"),
            table,
            field,
        }
    }
}

/// Constraint discriminant from the `type` column of a constraints file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    NotNull,
    Other,
}

/// One row of a constraints file.
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub kind: ConstraintKind,
    pub name: String,
    pub table: String,
    pub field: String,
}

impl ConstraintRow {
    pub fn from_record(record: &Record) -> Self {
        let kind = match get(record, "type").as_str() {
            "primary key" => ConstraintKind::PrimaryKey,
            "unique" => ConstraintKind::Unique,
            "not null" => ConstraintKind::NotNull,
            _ => ConstraintKind::Other,
        };

        Self {
            kind,
            name: get(record, "name"),
            table: get(record, "table"),
            field: get(record, "field"),
        }
    }
}

/// One row of an indexes file.
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub name: String,
    pub table: String,
    pub field: String,
    pub order: String,
    pub unique: bool,
}

impl IndexRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: get(record, "name"),
            table: get(record, "table"),
            field: get(record, "field"),
            order: get(record, "order"),
            unique: flag(&get(record, "unique")),
        }
    }
}

/// One row of a references file: a foreign-key declaration.
#[derive(Debug, Clone)]
pub struct ReferenceRow {
    pub name: String,
    pub table: String,
    pub field: String,
    pub ref_table: String,
    pub ref_field: String,
}

impl ReferenceRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: get(record, "name"),
            table: get(record, "table"),
            field: get(record, "field"),
            ref_table: get(record, "ref_table"),
            ref_field: get(record, "ref_field"),
        }
    }
}

/// One row of a mappings file: a field correspondence across models.
#[derive(Debug, Clone)]
pub struct MappingRow {
    pub source_model: String,
    pub source_version: String,
    pub source_table: String,
    pub source_field: String,
    pub target_model: String,
    pub target_version: String,
    pub target_table: String,
    pub target_field: String,
    pub comment: String,
}

impl MappingRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            source_model: get(record, "source_model"),
            source_version: get(record, "source_version"),
            source_table: get(record, "source_table"),
            source_field: get(record, "source_field"),
            target_model: get(record, "target_model"),
            target_version: get(record, "target_version"),
            target_table: get(record, "target_table"),
            target_field: get(record, "target_field"),
            comment: get(record, "comment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn test_required_flag_spellings() {
        for value in ["yes", "Yes", "y", "1"] {
            let row = FieldRow::from_record(&record(&[("field", "id"), ("required", value)]));
            assert!(row.required, "{value} should mean required");
        }

        for value in ["", "no", "0", "true"] {
            let row = FieldRow::from_record(&record(&[("field", "id"), ("required", value)]));
            assert!(!row.required, "{value} should not mean required");
        }
    }

    #[test]
    fn test_missing_columns_read_empty() {
        let row = TableRow::from_record(&record(&[("table", "person")]));
        assert_eq!(row.table, "person");
        assert_eq!(row.label, "");
        assert_eq!(row.description, "");
    }

    #[test]
    fn test_description_whitespace_collapsed() {
        let row = TableRow::from_record(&record(&[(
            "description",
            "spans\nmultiple\n\n  lines",
        )]));
        assert_eq!(row.description, "spans multiple lines");
    }

    #[test]
    fn test_schema_numeric_parsing() {
        let row = SchemaRow::from_record(&record(&[
            ("table", "person"),
            ("field", "name"),
            ("type", "varchar"),
            ("length", "50"),
            ("precision", "not-a-number"),
            ("scale", ""),
        ]));
        assert_eq!(row.length, 50);
        assert_eq!(row.precision, 0);
        assert_eq!(row.scale, 0);
    }

    #[test]
    fn test_constraint_kind_dispatch() {
        let pk = ConstraintRow::from_record(&record(&[("type", "primary key")]));
        assert_eq!(pk.kind, ConstraintKind::PrimaryKey);

        let un = ConstraintRow::from_record(&record(&[("type", "unique")]));
        assert_eq!(un.kind, ConstraintKind::Unique);

        let nn = ConstraintRow::from_record(&record(&[("type", "not null")]));
        assert_eq!(nn.kind, ConstraintKind::NotNull);

        let other = ConstraintRow::from_record(&record(&[("type", "check")]));
        assert_eq!(other.kind, ConstraintKind::Other);
    }

    #[test]
    fn test_index_unique_flag() {
        let row = IndexRow::from_record(&record(&[("name", "idx"), ("unique", "Y")]));
        assert!(row.unique);
    }
}
