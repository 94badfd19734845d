//! Model, table, and field entities.
//!
//! Entities are stored arena-style: collections own a flat `Vec` of items
//! plus a lowercased-name index, and every cross-entity relation (the target
//! of a reference, the far side of a mapping) is carried as names rather
//! than owning pointers, so the graph has no ownership cycles.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

/// Release metadata attached to a model declaration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Release {
    pub level: String,
    pub serial: String,
}

/// A named, versioned data-model specification.
///
/// Built once from its source directory, then immutable inside a published
/// registry snapshot. Identity is the (name, version) pair, compared
/// case-insensitively.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub name: String,
    pub version: String,
    pub label: String,
    pub description: String,
    pub url: String,
    pub release: Release,
    pub tables: Tables,

    #[serde(skip)]
    pub schema: crate::catalog::Schema,

    /// Directory the model was discovered in; definition files are collected
    /// from this subtree.
    #[serde(skip)]
    pub root: PathBuf,
}

impl Model {
    /// Label if set, otherwise `name/version`.
    pub fn display_name(&self) -> String {
        if self.label.is_empty() {
            format!("{}/{}", self.name, self.version)
        } else {
            self.label.clone()
        }
    }
}

/// A table within a model.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub name: String,
    pub label: String,
    pub description: String,
    pub fields: Fields,
}

/// A field within a table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Field {
    pub name: String,
    pub label: String,
    pub description: String,
    pub required: bool,

    // Storage attributes from the schema file.
    #[serde(rename = "type")]
    pub data_type: String,
    pub length: u32,
    pub precision: u32,
    pub scale: u32,
    pub default: String,

    /// The field this field references, if any.
    #[serde(skip)]
    pub reference: Option<Reference>,

    /// Fields elsewhere in the model that reference this field.
    #[serde(skip)]
    pub inbound_refs: Vec<Reference>,

    /// Correspondences to fields in other models.
    #[serde(skip)]
    pub mappings: Vec<Mapping>,
}

/// A named directed edge between two fields of the same model.
///
/// On the outbound side `table`/`field` name the target; on the inbound side
/// they name the source.
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub name: String,
    pub table: String,
    pub field: String,
}

/// Fully qualified address of a field anywhere in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPath {
    pub model: String,
    pub version: String,
    pub table: String,
    pub field: String,
}

/// One side of a field correspondence. Mappings are always created in
/// symmetric pairs, so following `field` from either side reaches the other.
#[derive(Debug, Clone, Serialize)]
pub struct Mapping {
    pub field: FieldPath,
    pub comment: String,
}

/// The tables of a model, indexed by lowercased name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Tables {
    items: Vec<Table>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Tables {
    /// Add a table. The first table of a given name (case-insensitive) wins;
    /// duplicates are ignored. The list stays sorted by name.
    pub fn add(&mut self, table: Table) {
        let key = table.name.to_lowercase();
        if self.index.contains_key(&key) {
            return;
        }

        self.items.push(table);
        self.items.sort_by(|a, b| a.name.cmp(&b.name));
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.to_lowercase(), i))
            .collect();
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        let i = *self.index.get(&name.to_lowercase())?;
        Some(&mut self.items[i])
    }

    /// Tables in name order.
    pub fn list(&self) -> &[Table] {
        &self.items
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The fields of a table, indexed by lowercased name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Fields {
    items: Vec<Field>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Fields {
    /// Add a field. The first field of a given name (case-insensitive) wins;
    /// duplicates are ignored. The list stays sorted by name.
    pub fn add(&mut self, field: Field) {
        let key = field.name.to_lowercase();
        if self.index.contains_key(&key) {
            return;
        }

        self.items.push(field);
        self.items.sort_by(|a, b| a.name.cmp(&b.name));
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.to_lowercase(), i))
            .collect();
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        let i = *self.index.get(&name.to_lowercase())?;
        Some(&mut self.items[i])
    }

    /// Fields in name order.
    pub fn list(&self) -> &[Field] {
        &self.items
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
