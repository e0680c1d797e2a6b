//! Schema graph store interface.
//!
//! The compiler only needs a small, transactional-looking surface over the
//! schema graph: consistent snapshots plus targeted writes for migration,
//! renames and type creation.

mod archive;
mod memory;

pub use archive::SnapshotArchive;
pub use memory::MemoryStore;

use crate::catalog::{MethodDef, PropertyDef, RelationshipDef, SchemaSnapshot, TypeDef, ViewDef};
use crate::error::Error;

/// Access to the persisted schema graph.
pub trait SchemaStore: Send + Sync {
    /// Consistent copy of every definition.
    fn snapshot(&self) -> Result<SchemaSnapshot, Error>;

    /// Monotonic version, bumped on every write.
    fn version(&self) -> u64;

    /// Get a type by name.
    fn get_type(&self, name: &str) -> Result<Option<TypeDef>, Error>;

    /// Create or replace a type.
    fn put_type(&self, def: TypeDef) -> Result<(), Error>;

    /// Delete a type together with its owned definitions and every
    /// relationship touching it. Returns whether the type existed.
    fn delete_type(&self, name: &str) -> Result<bool, Error>;

    /// Insert (id 0) or replace (by id) a relationship. Returns its id.
    fn put_relationship(&self, rel: RelationshipDef) -> Result<u64, Error>;

    /// Delete a relationship by id.
    fn delete_relationship(&self, id: u64) -> Result<bool, Error>;

    /// Insert (id 0) or replace (by id) a property. Returns its id.
    fn put_property(&self, prop: PropertyDef) -> Result<u64, Error>;

    /// Insert (id 0) or replace (by id) a view. Returns its id.
    fn put_view(&self, view: ViewDef) -> Result<u64, Error>;

    /// Insert (id 0) or replace (by id) a method. Returns its id.
    fn put_method(&self, method: MethodDef) -> Result<u64, Error>;

    /// Remove a legacy inline key from a type.
    fn remove_legacy_key(&self, type_name: &str, key: &str) -> Result<(), Error>;
}
