//! The model registry and its published snapshot holder.
//!
//! A [`Registry`] is the merged collection of every model built from every
//! source, keyed by (name, version) with case-insensitive comparison and an
//! ordered view sorted by name then version. Version order is plain string
//! order, not semantic-version order ("10" sorts before "9"); changing that
//! is a product decision this crate deliberately does not make.
//!
//! [`RegistryHolder`] owns the snapshot consumers read. Rebuild cycles
//! assemble a complete new `Registry` off to the side and publish it with a
//! single swap, so readers only ever observe a fully-old or fully-new
//! catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::catalog::Model;

/// All known model versions across all sources.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: Vec<Model>,
    /// lowercased name → lowercased version → index into `models`.
    index: HashMap<String, HashMap<String, usize>>,
    /// Indexes into `models`, sorted by (name, version) in string order.
    ordered: Vec<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a model. Idempotent: a model with an already-present
    /// (name, version) pair is dropped.
    pub fn add(&mut self, model: Model) {
        let name_key = model.name.to_lowercase();
        let version_key = model.version.to_lowercase();

        let versions = self.index.entry(name_key).or_default();
        if versions.contains_key(&version_key) {
            return;
        }

        let idx = self.models.len();
        versions.insert(version_key, idx);
        self.models.push(model);
        self.ordered.push(idx);

        let models = &self.models;
        self.ordered.sort_by(|&a, &b| {
            models[a]
                .name
                .cmp(&models[b].name)
                .then_with(|| models[a].version.cmp(&models[b].version))
        });
    }

    /// Exact (name, version) lookup, case-insensitive.
    pub fn get(&self, name: &str, version: &str) -> Option<&Model> {
        let idx = *self
            .index
            .get(&name.to_lowercase())?
            .get(&version.to_lowercase())?;
        Some(&self.models[idx])
    }

    pub(crate) fn get_mut(&mut self, name: &str, version: &str) -> Option<&mut Model> {
        let idx = *self
            .index
            .get(&name.to_lowercase())?
            .get(&version.to_lowercase())?;
        Some(&mut self.models[idx])
    }

    /// Every version of a named model, in version string order.
    pub fn versions(&self, name: &str) -> Vec<&Model> {
        let key = name.to_lowercase();
        self.list()
            .into_iter()
            .filter(|m| m.name.to_lowercase() == key)
            .collect()
    }

    /// All models, sorted by name then version.
    pub fn list(&self) -> Vec<&Model> {
        self.ordered.iter().map(|&i| &self.models[i]).collect()
    }

    /// Distinct model names, in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        for model in self.list() {
            if names.last().map(String::as_str) != Some(model.name.as_str()) {
                names.push(model.name.clone());
            }
        }

        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Serialize for Registry {
    /// Serializes as the ordered model list.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.ordered.len()))?;
        for model in self.list() {
            seq.serialize_element(model)?;
        }
        seq.end()
    }
}

/// Owner of the published registry snapshot.
///
/// Readers call [`snapshot`](Self::snapshot) and keep the `Arc` for as long
/// as they need a consistent view; the orchestrator calls
/// [`publish`](Self::publish) exactly once per rebuild cycle.
#[derive(Debug, Default)]
pub struct RegistryHolder {
    current: RwLock<Arc<Registry>>,
}

impl RegistryHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current complete snapshot.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current
            .read()
            .expect("registry holder lock poisoned")
            .clone()
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, registry: Registry) {
        let mut current = self
            .current
            .write()
            .expect("registry holder lock poisoned");
        *current = Arc::new(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Release, Schema, Tables};
    use std::path::PathBuf;

    fn model(name: &str, version: &str) -> Model {
        Model {
            name: name.to_string(),
            version: version.to_string(),
            label: String::new(),
            description: String::new(),
            url: String::new(),
            release: Release::default(),
            tables: Tables::default(),
            schema: Schema::default(),
            root: PathBuf::new(),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = Registry::new();
        registry.add(model("omop", "5.0"));
        registry.add(model("omop", "5.0"));
        registry.add(model("OMOP", "5.0"));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = Registry::new();
        registry.add(model("PEDSnet", "2.0"));

        assert!(registry.get("pedsnet", "2.0").is_some());
        assert!(registry.get("PEDSNET", "2.0").is_some());
        assert!(registry.get("pedsnet", "2.1").is_none());
    }

    #[test]
    fn test_ordering_by_name_then_version_string() {
        let mut registry = Registry::new();
        registry.add(model("omop", "9"));
        registry.add(model("omop", "10"));
        registry.add(model("i2b2", "1.7"));

        let keys: Vec<(String, String)> = registry
            .list()
            .iter()
            .map(|m| (m.name.clone(), m.version.clone()))
            .collect();

        // String order: "10" sorts before "9".
        assert_eq!(
            keys,
            vec![
                ("i2b2".to_string(), "1.7".to_string()),
                ("omop".to_string(), "10".to_string()),
                ("omop".to_string(), "9".to_string()),
            ]
        );
    }

    #[test]
    fn test_versions_and_names() {
        let mut registry = Registry::new();
        registry.add(model("omop", "5.0"));
        registry.add(model("omop", "5.1"));
        registry.add(model("pcornet", "3.0"));

        assert_eq!(registry.versions("OMOP").len(), 2);
        assert_eq!(registry.names(), vec!["omop", "pcornet"]);
    }

    #[test]
    fn test_holder_swaps_whole_snapshots() {
        let holder = RegistryHolder::new();
        assert!(holder.snapshot().is_empty());

        let before = holder.snapshot();

        let mut next = Registry::new();
        next.add(model("omop", "5.0"));
        holder.publish(next);

        // The old handle still sees the old snapshot; fresh reads see the new.
        assert!(before.is_empty());
        assert_eq!(holder.snapshot().len(), 1);
    }
}
