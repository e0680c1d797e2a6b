//! Type resolution over a schema snapshot.
//!
//! The resolver answers the structural questions every later stage asks:
//! which supertype and contracts a type really has, which relationship
//! properties it exposes and with what cardinality, whether a name refers to
//! an existing type, and whether the license permits a built-in dependency.

mod builtin;
mod license;
mod normalize;

pub use builtin::{BuiltinCatalog, BuiltinRelation, BASE_PROPERTY_NAMES, PRINCIPAL_TYPE};
pub use license::{AllowAll, LicenseOracle, StaticLicense};
pub use normalize::{normalize_entity_name, NameCache};

pub use crate::catalog::collect_contracts;

use crate::catalog::{
    clean_type_name, CascadeDelete, Direction, Multiplicity, SchemaSnapshot, TypeDef, BASE_TYPE,
};
use crate::error::{SchemaError, SchemaResult};
use std::collections::{HashSet, VecDeque};

/// Outcome of resolving a type's declared supertype within a reload pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupertypeResolution {
    /// No supertype declared, or the base type itself.
    Base,
    /// A platform-provided type.
    Builtin(String),
    /// A schema-defined type already emitted in this pass.
    Dynamic(String),
    /// A schema-defined type not yet emitted in this pass.
    Deferred(String),
    /// Neither schema-defined nor built-in.
    Missing(String),
}

impl SupertypeResolution {
    /// Resolved supertype name, the base type for [`SupertypeResolution::Base`].
    pub fn name(&self) -> &str {
        match self {
            SupertypeResolution::Base => BASE_TYPE,
            SupertypeResolution::Builtin(name)
            | SupertypeResolution::Dynamic(name)
            | SupertypeResolution::Deferred(name)
            | SupertypeResolution::Missing(name) => name,
        }
    }
}

/// Relationship metadata resolved for a property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelation {
    /// Cardinality of the property.
    pub multiplicity: Multiplicity,
    /// Type on the far side.
    pub related_type: String,
    /// Comes from built-in metadata rather than the schema graph.
    pub extended: bool,
}

/// A property a type receives from a relationship definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedProperty {
    /// Disambiguated property name.
    pub name: String,
    /// Name the property had before its last rename.
    pub previous_name: Option<String>,
    /// Which end the property lives on.
    pub direction: Direction,
    /// Relationship id.
    pub relationship_id: u64,
    /// Relationship type token.
    pub relationship_type: String,
    /// Cardinality of the property.
    pub multiplicity: Multiplicity,
    /// Type on the far side.
    pub related_type: String,
    /// Cascading delete policy of the relationship.
    pub cascade: CascadeDelete,
}

impl DerivedProperty {
    /// Whether `name` is the current or previous name of this property.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.previous_name.as_deref() == Some(name)
    }
}

/// Resolves names, hierarchy and relationship metadata against a snapshot.
pub struct TypeResolver<'a> {
    snapshot: &'a SchemaSnapshot,
    builtins: &'a BuiltinCatalog,
    license: &'a dyn LicenseOracle,
    cache: &'a NameCache,
}

impl<'a> TypeResolver<'a> {
    /// Create a resolver.
    pub fn new(
        snapshot: &'a SchemaSnapshot,
        builtins: &'a BuiltinCatalog,
        license: &'a dyn LicenseOracle,
        cache: &'a NameCache,
    ) -> Self {
        Self {
            snapshot,
            builtins,
            license,
            cache,
        }
    }

    /// The snapshot being resolved.
    pub fn snapshot(&self) -> &'a SchemaSnapshot {
        self.snapshot
    }

    /// Built-in metadata.
    pub fn builtins(&self) -> &'a BuiltinCatalog {
        self.builtins
    }

    /// Check if `name` is a known type, schema-defined or built-in.
    pub fn type_exists(&self, name: &str) -> bool {
        self.snapshot.types.contains_key(name) || self.builtins.contains_type(name)
    }

    /// Resolve a user-facing type name: raw first, normalised second.
    pub fn lookup(&self, raw: &str) -> Option<String> {
        if let Some(hit) = self.cache.get(raw) {
            return Some(hit);
        }

        let resolved = if self.type_exists(raw) {
            raw.to_string()
        } else {
            let normalized = normalize_entity_name(raw);
            if normalized.is_empty() || !self.type_exists(&normalized) {
                return None;
            }
            normalized
        };

        self.cache.insert(raw, resolved.clone());
        Some(resolved)
    }

    /// Resolve the supertype of `ty`; `emitted` holds the schema-defined
    /// types already emitted in the current pass.
    pub fn resolve_supertype(&self, ty: &TypeDef, emitted: &HashSet<String>) -> SupertypeResolution {
        let Some(declared) = ty.extends.as_deref() else {
            return SupertypeResolution::Base;
        };

        let declared = clean_type_name(declared);
        if declared.is_empty() || declared == BASE_TYPE {
            return SupertypeResolution::Base;
        }

        let Some(name) = self.lookup(declared) else {
            return SupertypeResolution::Missing(declared.to_string());
        };

        if self.snapshot.is_dynamic_type(&name) {
            if emitted.contains(&name) {
                SupertypeResolution::Dynamic(name)
            } else {
                SupertypeResolution::Deferred(name)
            }
        } else if name == BASE_TYPE {
            SupertypeResolution::Base
        } else {
            SupertypeResolution::Builtin(name)
        }
    }

    /// Contracts of `ty`, each resolved through [`lookup`](Self::lookup)
    /// when possible.
    pub fn contracts_of(&self, ty: &TypeDef) -> Vec<String> {
        let mut seen = HashSet::new();
        ty.contracts()
            .into_iter()
            .map(|raw| self.lookup(&raw).unwrap_or(raw))
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Names among `supertype` and `contracts` not covered by the license.
    ///
    /// The base type and schema-defined types are always licensed.
    pub fn check_licensed(&self, supertype: Option<&str>, contracts: &[String]) -> Vec<String> {
        supertype
            .into_iter()
            .chain(contracts.iter().map(String::as_str))
            .filter(|name| *name != BASE_TYPE)
            .filter(|name| !self.snapshot.is_dynamic_type(name))
            .filter(|name| !self.license.is_licensed(name))
            .map(String::from)
            .collect()
    }

    /// Relationship-derived properties of `type_name`, disambiguated against
    /// its declared properties and each other.
    pub fn derived_properties(&self, type_name: &str) -> Vec<DerivedProperty> {
        let mut existing: HashSet<String> = self
            .snapshot
            .properties_of(type_name)
            .into_iter()
            .map(|p| p.name.clone())
            .collect();
        let mut out = Vec::new();

        for rel in &self.snapshot.relationships {
            for direction in [Direction::Outgoing, Direction::Incoming] {
                if rel.owner_type(direction) != type_name {
                    continue;
                }
                let name = rel.property_name(direction, &mut existing);
                out.push(DerivedProperty {
                    name,
                    previous_name: rel.previous_name(direction).map(String::from),
                    direction,
                    relationship_id: rel.id,
                    relationship_type: rel.relationship_type.clone(),
                    multiplicity: rel.multiplicity(direction),
                    related_type: rel.related_type(direction).to_string(),
                    cascade: rel.cascade_delete,
                });
            }
        }

        out
    }

    /// Relationship metadata for `property` on `type_name`: own relationships
    /// first, then the declared parent, then built-in metadata.
    pub fn resolve_relation(&self, type_name: &str, property: &str) -> Option<ResolvedRelation> {
        let direct = |owner: &str| {
            self.derived_properties(owner)
                .into_iter()
                .find(|d| d.name == property)
                .map(|d| ResolvedRelation {
                    multiplicity: d.multiplicity,
                    related_type: d.related_type,
                    extended: false,
                })
        };

        if let Some(found) = direct(type_name) {
            return Some(found);
        }

        let parent = self
            .snapshot
            .get_type(type_name)
            .and_then(|ty| ty.extends.as_deref())
            .map(clean_type_name);
        if let Some(found) = parent.and_then(direct) {
            return Some(found);
        }

        self.builtins.relation(property).map(|rel| ResolvedRelation {
            multiplicity: rel.multiplicity,
            related_type: rel.related_type.clone(),
            extended: true,
        })
    }

    /// Cardinality of a relationship property.
    pub fn resolve_multiplicity(&self, type_name: &str, property: &str) -> Option<Multiplicity> {
        self.resolve_relation(type_name, property)
            .map(|r| r.multiplicity)
    }

    /// Far-side type of a relationship property.
    pub fn resolve_related_type(&self, type_name: &str, property: &str) -> Option<String> {
        self.resolve_relation(type_name, property)
            .map(|r| r.related_type)
    }

    /// Schema-defined supertype chain of `type_name`, nearest first.
    pub fn ancestors(&self, type_name: &str) -> SchemaResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([type_name.to_string()]);
        let mut current = self.snapshot.get_type(type_name);

        while let Some(ty) = current {
            let Some(parent) = ty.extends.as_deref().map(clean_type_name) else {
                break;
            };
            let Some(parent) = self.lookup(parent) else {
                break;
            };
            if !self.snapshot.is_dynamic_type(&parent) {
                break;
            }
            if !seen.insert(parent.clone()) {
                return Err(SchemaError::InheritanceCycle(type_name.to_string()));
            }
            current = self.snapshot.get_type(&parent);
            chain.push(parent);
        }

        Ok(chain)
    }

    /// Schema-defined types ordered so every supertype precedes its subtypes.
    ///
    /// Types caught in an inheritance cycle are returned separately.
    pub fn hierarchy_order(&self) -> (Vec<String>, Vec<(String, SchemaError)>) {
        let mut ranked = Vec::new();
        let mut failed = Vec::new();

        for ty in self.snapshot.types.values().filter(|t| !t.is_builtin) {
            match self.ancestors(&ty.name) {
                Ok(chain) => ranked.push((chain.len(), ty.name.clone())),
                Err(e) => failed.push((ty.name.clone(), e)),
            }
        }

        ranked.sort();
        (ranked.into_iter().map(|(_, name)| name).collect(), failed)
    }

    /// Breadth-first search over `type_name`, its supertypes and contracts for
    /// a declared or relationship-derived property named `property`.
    pub fn has_dynamic_property(&self, type_name: &str, property: &str) -> bool {
        let mut queue = VecDeque::from([type_name.to_string()]);
        let mut visited = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(ty) = self.snapshot.get_type(&current) else {
                continue;
            };

            if self
                .snapshot
                .properties_of(&current)
                .iter()
                .any(|p| p.name == property)
            {
                return true;
            }
            if self
                .derived_properties(&current)
                .iter()
                .any(|d| d.answers_to(property))
            {
                return true;
            }

            if let Some(parent) = ty.extends.as_deref().map(clean_type_name) {
                queue.push_back(self.lookup(parent).unwrap_or_else(|| parent.to_string()));
            }
            queue.extend(self.contracts_of(ty));
        }

        false
    }

    /// Schema-defined types reachable from `type_name` through supertypes and
    /// contracts, in breadth-first order and excluding `type_name` itself.
    pub fn lineage(&self, type_name: &str) -> Vec<String> {
        let mut queue = VecDeque::from([type_name.to_string()]);
        let mut visited = HashSet::new();
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(ty) = self.snapshot.get_type(&current) else {
                continue;
            };
            if current != type_name {
                out.push(current.clone());
            }
            if let Some(parent) = ty.extends.as_deref().map(clean_type_name) {
                queue.push_back(self.lookup(parent).unwrap_or_else(|| parent.to_string()));
            }
            queue.extend(self.contracts_of(ty));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PropertyDef, PropertyType, RelationshipDef};

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(1)
            .with_type(TypeDef::new("Customer").implementing("Named"))
            .with_type(TypeDef::new("VipCustomer").extending("Customer"))
            .with_type(TypeDef::new("Order"))
            .with_type(TypeDef::contract("Named"))
            .with_type(TypeDef::new("Document").extending("File"))
            .with_property("Customer", PropertyDef::typed("email", PropertyType::String))
            .with_property("Named", PropertyDef::typed("title", PropertyType::String))
            .with_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
    }

    fn with_resolver<T>(snapshot: &SchemaSnapshot, f: impl FnOnce(&TypeResolver<'_>) -> T) -> T {
        let builtins = BuiltinCatalog::new();
        let cache = NameCache::new();
        let resolver = TypeResolver::new(snapshot, &builtins, &AllowAll, &cache);
        f(&resolver)
    }

    #[test]
    fn test_lookup_raw_then_normalized() {
        let snapshot = snapshot();
        with_resolver(&snapshot, |resolver| {
            assert_eq!(resolver.lookup("Customer").as_deref(), Some("Customer"));
            assert_eq!(resolver.lookup("customers").as_deref(), Some("Customer"));
            assert_eq!(resolver.lookup("Principal").as_deref(), Some("Principal"));
            assert_eq!(resolver.lookup("ghosts"), None);
        });
    }

    #[test]
    fn test_lookup_is_cached() {
        let snapshot = snapshot();
        let builtins = BuiltinCatalog::new();
        let cache = NameCache::new();
        let resolver = TypeResolver::new(&snapshot, &builtins, &AllowAll, &cache);

        resolver.lookup("orders");
        assert_eq!(cache.get("orders").as_deref(), Some("Order"));
    }

    #[test]
    fn test_resolve_supertype() {
        let snapshot = snapshot();
        with_resolver(&snapshot, |resolver| {
            let mut emitted = HashSet::new();
            let vip = snapshot.get_type("VipCustomer").unwrap();

            assert_eq!(
                resolver.resolve_supertype(vip, &emitted),
                SupertypeResolution::Deferred("Customer".into())
            );
            emitted.insert("Customer".to_string());
            assert_eq!(
                resolver.resolve_supertype(vip, &emitted),
                SupertypeResolution::Dynamic("Customer".into())
            );
            assert_eq!(
                resolver.resolve_supertype(snapshot.get_type("Document").unwrap(), &emitted),
                SupertypeResolution::Builtin("File".into())
            );
            assert_eq!(
                resolver.resolve_supertype(snapshot.get_type("Order").unwrap(), &emitted),
                SupertypeResolution::Base
            );
            assert_eq!(
                resolver.resolve_supertype(&TypeDef::new("X").extending("Ghost"), &emitted),
                SupertypeResolution::Missing("Ghost".into())
            );
        });
    }

    #[test]
    fn test_relation_resolution_order() {
        let snapshot = snapshot();
        with_resolver(&snapshot, |resolver| {
            assert_eq!(
                resolver.resolve_multiplicity("Customer", "orders"),
                Some(Multiplicity::Many)
            );
            assert_eq!(
                resolver.resolve_related_type("Order", "customer").as_deref(),
                Some("Customer")
            );

            let inherited = resolver.resolve_relation("VipCustomer", "orders").unwrap();
            assert!(!inherited.extended);
            assert_eq!(inherited.related_type, "Order");

            let owner = resolver.resolve_relation("Order", "owner").unwrap();
            assert!(owner.extended);
            assert_eq!(owner.multiplicity, Multiplicity::One);
            assert_eq!(
                resolver.resolve_multiplicity("Order", "grantees"),
                Some(Multiplicity::Many)
            );
            assert_eq!(resolver.resolve_relation("Order", "nothing"), None);
        });
    }

    #[test]
    fn test_check_licensed() {
        let snapshot = snapshot();
        let builtins = BuiltinCatalog::new();
        let cache = NameCache::new();
        let license = StaticLicense::new(["Principal"]);
        let resolver = TypeResolver::new(&snapshot, &builtins, &license, &cache);

        let unlicensed = resolver.check_licensed(
            Some("File"),
            &["Named".to_string(), "Principal".to_string(), "Image".to_string()],
        );
        assert_eq!(unlicensed, vec!["File".to_string(), "Image".to_string()]);
        assert!(resolver.check_licensed(Some(BASE_TYPE), &[]).is_empty());
    }

    #[test]
    fn test_has_dynamic_property() {
        let snapshot = snapshot();
        with_resolver(&snapshot, |resolver| {
            assert!(resolver.has_dynamic_property("VipCustomer", "email"));
            assert!(resolver.has_dynamic_property("VipCustomer", "title"));
            assert!(resolver.has_dynamic_property("VipCustomer", "orders"));
            assert!(!resolver.has_dynamic_property("Order", "email"));
        });
    }

    #[test]
    fn test_hierarchy_order_and_cycles() {
        let snapshot = snapshot()
            .with_type(TypeDef::new("Loop1").extending("Loop2"))
            .with_type(TypeDef::new("Loop2").extending("Loop1"));
        with_resolver(&snapshot, |resolver| {
            let (order, failed) = resolver.hierarchy_order();
            let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

            assert!(pos("Customer") < pos("VipCustomer"));
            assert_eq!(failed.len(), 2);
            assert!(matches!(failed[0].1, SchemaError::InheritanceCycle(_)));
        });
    }

    #[test]
    fn test_lineage() {
        let snapshot = snapshot();
        with_resolver(&snapshot, |resolver| {
            assert_eq!(resolver.lineage("VipCustomer"), vec!["Customer", "Named"]);
            assert!(resolver.lineage("Order").is_empty());
        });
    }
}
