//! The in-memory catalog: entities, constraint schema, and the registry.

pub mod model;
pub mod registry;
pub mod schema;

pub use model::{Field, FieldPath, Fields, Mapping, Model, Reference, Release, Table, Tables};
pub use registry::{Registry, RegistryHolder};
pub use schema::{ForeignKey, Index, NotNullable, PrimaryKey, Schema, Unique};
