//! Constraint and index aggregate for a model.
//!
//! Primary keys, uniques, and indexes are grouped by constraint name so that
//! multi-column spans accumulate under one entry; foreign keys and not-null
//! constraints are plain lists. Foreign keys are recorded here from the raw
//! reference rows in addition to the navigable [`Reference`] edges set
//! during reference resolution.
//!
//! [`Reference`]: crate::catalog::Reference

use std::collections::HashMap;

use serde::Serialize;

use crate::records::{ConstraintRow, IndexRow, ReferenceRow};

/// The constraints and indexes of a model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub primary_keys: HashMap<String, PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
    pub not_nullables: Vec<NotNullable>,
    pub uniques: HashMap<String, Unique>,
    pub indexes: HashMap<String, Index>,
}

impl Schema {
    pub fn add_primary_key(&mut self, row: &ConstraintRow) {
        self.primary_keys
            .entry(row.name.clone())
            .or_insert_with(|| PrimaryKey {
                name: row.name.clone(),
                table: row.table.clone(),
                fields: Vec::new(),
            })
            .fields
            .push(row.field.clone());
    }

    pub fn add_unique(&mut self, row: &ConstraintRow) {
        self.uniques
            .entry(row.name.clone())
            .or_insert_with(|| Unique {
                name: row.name.clone(),
                table: row.table.clone(),
                fields: Vec::new(),
            })
            .fields
            .push(row.field.clone());
    }

    pub fn add_not_nullable(&mut self, row: &ConstraintRow) {
        self.not_nullables.push(NotNullable {
            table: row.table.clone(),
            field: row.field.clone(),
        });
    }

    pub fn add_foreign_key(&mut self, row: &ReferenceRow) {
        self.foreign_keys.push(ForeignKey {
            name: row.name.clone(),
            source_table: row.table.clone(),
            source_field: row.field.clone(),
            target_table: row.ref_table.clone(),
            target_field: row.ref_field.clone(),
        });
    }

    /// Rows sharing an index name span one index; `order` and `unique` are
    /// taken from the first row of the group.
    pub fn add_index(&mut self, row: &IndexRow) {
        self.indexes
            .entry(row.name.clone())
            .or_insert_with(|| Index {
                name: row.name.clone(),
                unique: row.unique,
                order: row.order.clone(),
                table: row.table.clone(),
                fields: Vec::new(),
            })
            .fields
            .push(row.field.clone());
    }
}

/// Declares that the named fields uniquely identify a record in `table`.
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryKey {
    pub name: String,
    pub table: String,
    pub fields: Vec<String>,
}

/// Declares that the named fields must be unique per record in `table`.
#[derive(Debug, Clone, Serialize)]
pub struct Unique {
    pub name: String,
    pub table: String,
    pub fields: Vec<String>,
}

/// Declares that field values are constrained to the referenced field.
#[derive(Debug, Clone, Serialize)]
pub struct ForeignKey {
    pub name: String,
    pub source_table: String,
    pub source_field: String,
    pub target_table: String,
    pub target_field: String,
}

/// Declares that the field cannot be null.
#[derive(Debug, Clone, Serialize)]
pub struct NotNullable {
    pub table: String,
    pub field: String,
}

/// A schematic index over one or more fields.
#[derive(Debug, Clone, Serialize)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub order: String,
    pub table: String,
    pub fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ConstraintKind;

    fn constraint(name: &str, table: &str, field: &str) -> ConstraintRow {
        ConstraintRow {
            kind: ConstraintKind::PrimaryKey,
            name: name.to_string(),
            table: table.to_string(),
            field: field.to_string(),
        }
    }

    #[test]
    fn test_multi_column_primary_key_groups_by_name() {
        let mut schema = Schema::default();
        schema.add_primary_key(&constraint("pk_visit", "visit", "person_id"));
        schema.add_primary_key(&constraint("pk_visit", "visit", "visit_id"));
        schema.add_primary_key(&constraint("pk_person", "person", "person_id"));

        assert_eq!(schema.primary_keys.len(), 2);
        let pk = &schema.primary_keys["pk_visit"];
        assert_eq!(pk.fields, vec!["person_id", "visit_id"]);
    }

    #[test]
    fn test_index_group_takes_flags_from_first_row() {
        let mut schema = Schema::default();
        schema.add_index(&IndexRow {
            name: "ix_name".to_string(),
            table: "person".to_string(),
            field: "last".to_string(),
            order: "asc".to_string(),
            unique: true,
        });
        schema.add_index(&IndexRow {
            name: "ix_name".to_string(),
            table: "person".to_string(),
            field: "first".to_string(),
            order: "desc".to_string(),
            unique: false,
        });

        let ix = &schema.indexes["ix_name"];
        assert!(ix.unique);
        assert_eq!(ix.order, "asc");
        assert_eq!(ix.fields, vec!["last", "first"]);
    }

    #[test]
    fn test_foreign_keys_are_unkeyed() {
        let mut schema = Schema::default();
        let row = ReferenceRow {
            name: "fk".to_string(),
            table: "visit".to_string(),
            field: "person_id".to_string(),
            ref_table: "person".to_string(),
            ref_field: "id".to_string(),
        };
        schema.add_foreign_key(&row);
        schema.add_foreign_key(&row);

        assert_eq!(schema.foreign_keys.len(), 2);
    }
}
