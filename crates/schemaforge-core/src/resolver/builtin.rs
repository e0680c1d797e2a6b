//! Built-in schema metadata the resolver falls back to.

use crate::catalog::{Multiplicity, BASE_TYPE};
use std::collections::{BTreeMap, BTreeSet};

/// Core base properties every type exposes without declaring them.
pub const BASE_PROPERTY_NAMES: &[&str] = &[
    "base",
    "type",
    "id",
    "createdDate",
    "createdBy",
    "lastModifiedDate",
    "lastModifiedBy",
    "visibleToPublicUsers",
    "visibleToAuthenticatedUsers",
    "relType",
    "sourceNode",
    "targetNode",
    "sourceId",
    "targetId",
    "sourceNodeProperty",
    "targetNodeProperty",
    "name",
    "hidden",
    "owner",
    "ownerId",
    "grantees",
];

/// Type holding the identity of users and groups.
pub const PRINCIPAL_TYPE: &str = "Principal";

/// Relationship metadata of a built-in property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinRelation {
    /// Cardinality of the property.
    pub multiplicity: Multiplicity,
    /// Type on the far side.
    pub related_type: String,
}

/// Fixed catalog of types and relationship properties provided by the
/// platform rather than the schema graph.
#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    types: BTreeSet<String>,
    relations: BTreeMap<String, BuiltinRelation>,
}

impl BuiltinCatalog {
    /// Platform default: the base type, principals and the owner/grantees
    /// relationships every type inherits.
    pub fn new() -> Self {
        let mut catalog = Self {
            types: BTreeSet::new(),
            relations: BTreeMap::new(),
        };
        for name in [BASE_TYPE, PRINCIPAL_TYPE, "User", "Group", "File", "Folder", "Image"] {
            catalog.types.insert(name.to_string());
        }
        catalog.add_relation("owner", Multiplicity::One, PRINCIPAL_TYPE);
        catalog.add_relation("grantees", Multiplicity::Many, PRINCIPAL_TYPE);
        catalog
    }

    /// Catalog without any types or relations.
    pub fn empty() -> Self {
        Self {
            types: BTreeSet::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Register a built-in type.
    pub fn add_type(&mut self, name: impl Into<String>) {
        self.types.insert(name.into());
    }

    /// Register a built-in relationship property.
    pub fn add_relation(
        &mut self,
        property: impl Into<String>,
        multiplicity: Multiplicity,
        related_type: impl Into<String>,
    ) {
        self.relations.insert(
            property.into(),
            BuiltinRelation {
                multiplicity,
                related_type: related_type.into(),
            },
        );
    }

    /// Check if `name` is a built-in type.
    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    /// Built-in type names.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    /// Relationship metadata of a built-in property.
    pub fn relation(&self, property: &str) -> Option<&BuiltinRelation> {
        self.relations.get(property)
    }

    /// Check if `name` is a core base property.
    pub fn is_base_property(name: &str) -> bool {
        BASE_PROPERTY_NAMES.contains(&name)
    }
}

impl Default for BuiltinCatalog {
    fn default() -> Self {
        Self::new()
    }
}
