//! Schema data model.
//!
//! The catalog holds the definitions stored in the schema graph: types,
//! relationships, properties, views and methods, plus consistent snapshots
//! of all of them.

pub mod naming;
mod method;
mod property;
mod relation;
mod snapshot;
mod type_def;
mod types;
mod view;

pub use method::{MethodDef, Parameter};
pub use property::PropertyDef;
pub use relation::{first_free_suffix, CascadeDelete, Direction, Multiplicity, RelationshipDef};
pub use snapshot::{current_timestamp, SchemaDocument, SchemaSnapshot, TypeDocument};
pub use type_def::{
    clean_type_name, collect_contracts, SortDirection, TypeDef, BASE_TYPE, RESERVED_TYPE_NAMES,
};
pub use types::{PropertyType, ValueType};
pub use view::{SortPolicy, ViewDef, ALPHABETIC_SORT, CUSTOM_VIEW};
