//! In-memory schema store.

use super::SchemaStore;
use crate::catalog::{
    current_timestamp, MethodDef, PropertyDef, RelationshipDef, SchemaSnapshot, TypeDef, ViewDef,
};
use crate::error::Error;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Schema store kept entirely in memory.
///
/// Used by the CLI and by tests; writes bump the version and keep
/// `rel_count` on every type in step with the relationship list.
pub struct MemoryStore {
    state: RwLock<SchemaSnapshot>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SchemaSnapshot::new(0)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed a store from a snapshot, assigning ids to unsaved definitions.
    pub fn from_snapshot(mut snapshot: SchemaSnapshot) -> Self {
        let mut next = snapshot
            .relationships
            .iter()
            .map(|r| r.id)
            .chain(snapshot.properties.iter().map(|p| p.id))
            .chain(snapshot.views.iter().map(|v| v.id))
            .chain(snapshot.methods.iter().map(|m| m.id))
            .max()
            .unwrap_or(0)
            + 1;
        let mut assign = |id: &mut u64| {
            if *id == 0 {
                *id = next;
                next += 1;
            }
        };

        snapshot.relationships.iter_mut().for_each(|r| assign(&mut r.id));
        snapshot.properties.iter_mut().for_each(|p| assign(&mut p.id));
        snapshot.views.iter_mut().for_each(|v| assign(&mut v.id));
        snapshot.methods.iter_mut().for_each(|m| assign(&mut m.id));
        refresh_rel_counts(&mut snapshot);

        Self {
            state: RwLock::new(snapshot),
            next_id: AtomicU64::new(next),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn write<T>(&self, f: impl FnOnce(&mut SchemaSnapshot) -> T) -> T {
        let mut state = self.state.write();
        let out = f(&mut state);
        state.version += 1;
        state.created_at = current_timestamp();
        out
    }

    fn require_type(state: &SchemaSnapshot, name: &str) -> Result<(), Error> {
        if state.types.contains_key(name) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("type {name}")))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Definitions carrying a store-assigned id.
trait Identified {
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

macro_rules! identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn id(&self) -> u64 {
                self.id
            }
            fn set_id(&mut self, id: u64) {
                self.id = id;
            }
        })*
    };
}

identified!(RelationshipDef, PropertyDef, ViewDef, MethodDef);

/// Insert when the id is 0 or unknown, replace the element with the same id otherwise.
fn upsert<T: Identified>(list: &mut Vec<T>, mut item: T, fresh: u64) -> u64 {
    let id = item.id();
    if id != 0 {
        if let Some(slot) = list.iter_mut().find(|existing| existing.id() == id) {
            *slot = item;
            return id;
        }
    }
    let id = if id == 0 { fresh } else { id };
    item.set_id(id);
    list.push(item);
    id
}

fn refresh_rel_counts(snapshot: &mut SchemaSnapshot) {
    let counts: Vec<(String, u32)> = snapshot
        .types
        .keys()
        .map(|name| (name.clone(), snapshot.relationship_count(name)))
        .collect();
    for (name, count) in counts {
        if let Some(ty) = snapshot.types.get_mut(&name) {
            ty.rel_count = count;
        }
    }
}

impl SchemaStore for MemoryStore {
    fn snapshot(&self) -> Result<SchemaSnapshot, Error> {
        Ok(self.state.read().clone())
    }

    fn version(&self) -> u64 {
        self.state.read().version
    }

    fn get_type(&self, name: &str) -> Result<Option<TypeDef>, Error> {
        Ok(self.state.read().types.get(name).cloned())
    }

    fn put_type(&self, def: TypeDef) -> Result<(), Error> {
        self.write(|state| {
            state.types.insert(def.name.clone(), def);
            refresh_rel_counts(state);
        });
        Ok(())
    }

    fn delete_type(&self, name: &str) -> Result<bool, Error> {
        Ok(self.write(|state| {
            let existed = state.types.remove(name).is_some();
            state.properties.retain(|p| p.owner != name);
            state.views.retain(|v| v.owner != name);
            state.methods.retain(|m| m.owner != name);
            state.relationships.retain(|r| !r.touches(name));
            refresh_rel_counts(state);
            existed
        }))
    }

    fn put_relationship(&self, rel: RelationshipDef) -> Result<u64, Error> {
        let fresh = self.allocate_id();
        self.write(|state| {
            Self::require_type(state, &rel.source_type)?;
            Self::require_type(state, &rel.target_type)?;
            let id = upsert(&mut state.relationships, rel, fresh);
            refresh_rel_counts(state);
            Ok(id)
        })
    }

    fn delete_relationship(&self, id: u64) -> Result<bool, Error> {
        Ok(self.write(|state| {
            let before = state.relationships.len();
            state.relationships.retain(|r| r.id != id);
            refresh_rel_counts(state);
            before != state.relationships.len()
        }))
    }

    fn put_property(&self, prop: PropertyDef) -> Result<u64, Error> {
        let fresh = self.allocate_id();
        self.write(|state| {
            Self::require_type(state, &prop.owner)?;
            Ok(upsert(&mut state.properties, prop, fresh))
        })
    }

    fn put_view(&self, view: ViewDef) -> Result<u64, Error> {
        let fresh = self.allocate_id();
        self.write(|state| {
            Self::require_type(state, &view.owner)?;
            Ok(upsert(&mut state.views, view, fresh))
        })
    }

    fn put_method(&self, method: MethodDef) -> Result<u64, Error> {
        let fresh = self.allocate_id();
        self.write(|state| {
            Self::require_type(state, &method.owner)?;
            Ok(upsert(&mut state.methods, method, fresh))
        })
    }

    fn remove_legacy_key(&self, type_name: &str, key: &str) -> Result<(), Error> {
        self.write(|state| {
            let ty = state
                .types
                .get_mut(type_name)
                .ok_or_else(|| Error::NotFound(format!("type {type_name}")))?;
            ty.legacy.remove(key);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PropertyType;

    fn store_with_types() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_type(TypeDef::new("Customer")).unwrap();
        store.put_type(TypeDef::new("Order")).unwrap();
        store
    }

    #[test]
    fn test_ids_and_versions() {
        let store = store_with_types();
        let v0 = store.version();

        let id = store
            .put_property(PropertyDef::typed("email", PropertyType::String).owned_by("Customer"))
            .unwrap();
        assert!(id > 0);
        assert!(store.version() > v0);

        let mut prop = store.snapshot().unwrap().properties[0].clone();
        prop.name = "mail".into();
        assert_eq!(store.put_property(prop).unwrap(), id);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.properties.len(), 1);
        assert_eq!(snapshot.properties[0].name, "mail");
    }

    #[test]
    fn test_rel_count_maintained() {
        let store = store_with_types();
        let id = store
            .put_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
            .unwrap();

        assert_eq!(store.get_type("Order").unwrap().unwrap().rel_count, 1);

        store.delete_relationship(id).unwrap();
        assert_eq!(store.get_type("Order").unwrap().unwrap().rel_count, 0);
    }

    #[test]
    fn test_delete_type_cascades() {
        let store = store_with_types();
        store
            .put_property(PropertyDef::typed("email", PropertyType::String).owned_by("Customer"))
            .unwrap();
        store
            .put_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
            .unwrap();

        assert!(store.delete_type("Customer").unwrap());
        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.properties.is_empty());
        assert!(snapshot.relationships.is_empty());
        assert!(!store.delete_type("Customer").unwrap());
    }

    #[test]
    fn test_owner_must_exist() {
        let store = MemoryStore::new();
        let result = store.put_property(PropertyDef::typed("x", PropertyType::Long).owned_by("Ghost"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_from_snapshot_assigns_ids() {
        let snapshot = SchemaSnapshot::new(0)
            .with_type(TypeDef::new("Customer"))
            .with_property("Customer", PropertyDef::typed("a", PropertyType::String))
            .with_property("Customer", PropertyDef::typed("b", PropertyType::String));

        let store = MemoryStore::from_snapshot(snapshot);
        let ids: Vec<u64> = store.snapshot().unwrap().properties.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let next = store
            .put_property(PropertyDef::typed("c", PropertyType::String).owned_by("Customer"))
            .unwrap();
        assert_eq!(next, 3);
    }
}
