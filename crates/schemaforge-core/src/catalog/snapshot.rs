//! Schema snapshot - consistent copy of every schema definition.

use super::{MethodDef, PropertyDef, RelationshipDef, TypeDef, ViewDef};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in microseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// A versioned snapshot of the whole schema graph.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct SchemaSnapshot {
    /// Store version the snapshot was taken at.
    #[serde(default)]
    pub version: u64,
    /// Creation timestamp (microseconds since Unix epoch).
    #[serde(default)]
    pub created_at: u64,
    /// Type definitions keyed by name.
    #[serde(default)]
    pub types: BTreeMap<String, TypeDef>,
    /// Relationship definitions, in declaration order.
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    /// Property definitions, in declaration order.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// View definitions, in declaration order.
    #[serde(default)]
    pub views: Vec<ViewDef>,
    /// Method definitions, in declaration order.
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl SchemaSnapshot {
    /// Create an empty snapshot.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            created_at: current_timestamp(),
            types: BTreeMap::new(),
            relationships: Vec::new(),
            properties: Vec::new(),
            views: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Add a type.
    pub fn with_type(mut self, ty: TypeDef) -> Self {
        self.types.insert(ty.name.clone(), ty);
        self
    }

    /// Add a relationship.
    pub fn with_relationship(mut self, rel: RelationshipDef) -> Self {
        self.relationships.push(rel);
        self
    }

    /// Add a property to `owner`.
    pub fn with_property(mut self, owner: &str, prop: PropertyDef) -> Self {
        self.properties.push(prop.owned_by(owner));
        self
    }

    /// Add a view to `owner`.
    pub fn with_view(mut self, owner: &str, view: ViewDef) -> Self {
        self.views.push(view.owned_by(owner));
        self
    }

    /// Add a method to `owner`.
    pub fn with_method(mut self, owner: &str, method: MethodDef) -> Self {
        self.methods.push(method.owned_by(owner));
        self
    }

    /// Get a type by name.
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Check if a schema-defined (non-builtin) type exists.
    pub fn is_dynamic_type(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(|t| !t.is_builtin)
    }

    /// All type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Relationships where `type_name` is the source.
    pub fn relationships_from(&self, type_name: &str) -> Vec<&RelationshipDef> {
        self.relationships
            .iter()
            .filter(|r| r.source_type == type_name)
            .collect()
    }

    /// Relationships where `type_name` is the target.
    pub fn relationships_to(&self, type_name: &str) -> Vec<&RelationshipDef> {
        self.relationships
            .iter()
            .filter(|r| r.target_type == type_name)
            .collect()
    }

    /// Properties owned by `type_name`.
    pub fn properties_of(&self, type_name: &str) -> Vec<&PropertyDef> {
        self.properties
            .iter()
            .filter(|p| p.owner == type_name)
            .collect()
    }

    /// Views owned by `type_name`.
    pub fn views_of(&self, type_name: &str) -> Vec<&ViewDef> {
        self.views.iter().filter(|v| v.owner == type_name).collect()
    }

    /// Methods owned by `type_name`.
    pub fn methods_of(&self, type_name: &str) -> Vec<&MethodDef> {
        self.methods.iter().filter(|m| m.owner == type_name).collect()
    }

    /// Number of relationship definitions touching `type_name`.
    pub fn relationship_count(&self, type_name: &str) -> u32 {
        self.relationships
            .iter()
            .filter(|r| r.touches(type_name))
            .count() as u32
    }

    /// Serialize the snapshot to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a snapshot from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl Default for SchemaSnapshot {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A type together with its owned definitions, as written in schema files.
#[derive(Debug, Clone, PartialEq, SerdeSerialize, SerdeDeserialize)]
pub struct TypeDocument {
    /// The type itself.
    #[serde(flatten)]
    pub def: TypeDef,
    /// Owned properties.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Owned views.
    #[serde(default)]
    pub views: Vec<ViewDef>,
    /// Owned methods.
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

/// JSON schema file layout: types with nested definitions plus relationships.
#[derive(Debug, Clone, Default, PartialEq, SerdeSerialize, SerdeDeserialize)]
pub struct SchemaDocument {
    /// Types in declaration order.
    #[serde(default)]
    pub types: Vec<TypeDocument>,
    /// Relationships in declaration order.
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
}

impl SchemaDocument {
    /// Parse a schema file.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Flatten into a snapshot, stamping owners on nested definitions.
    pub fn into_snapshot(self) -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new(0);
        for doc in self.types {
            let owner = doc.def.name.clone();
            snapshot
                .properties
                .extend(doc.properties.into_iter().map(|p| p.owned_by(&owner)));
            snapshot
                .views
                .extend(doc.views.into_iter().map(|v| v.owned_by(&owner)));
            snapshot
                .methods
                .extend(doc.methods.into_iter().map(|m| m.owned_by(&owner)));
            snapshot.types.insert(owner, doc.def);
        }
        snapshot.relationships = self.relationships;
        snapshot
    }

    /// Nest a snapshot back into file layout.
    pub fn from_snapshot(snapshot: &SchemaSnapshot) -> Self {
        let types = snapshot
            .types
            .values()
            .map(|def| TypeDocument {
                def: def.clone(),
                properties: snapshot.properties_of(&def.name).into_iter().cloned().collect(),
                views: snapshot.views_of(&def.name).into_iter().cloned().collect(),
                methods: snapshot.methods_of(&def.name).into_iter().cloned().collect(),
            })
            .collect();

        Self {
            types,
            relationships: snapshot.relationships.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PropertyType;

    fn sample_snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(3)
            .with_type(TypeDef::new("Customer"))
            .with_type(TypeDef::new("Order"))
            .with_type(TypeDef::new("Principal").with_builtin())
            .with_property("Customer", PropertyDef::typed("email", PropertyType::String))
            .with_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
            .with_view("Customer", ViewDef::new("public").with_member("email"))
            .with_method("Order", MethodDef::new("onCreation", "{ }"))
    }

    #[test]
    fn test_queries() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.properties_of("Customer").len(), 1);
        assert_eq!(snapshot.relationships_from("Customer").len(), 1);
        assert_eq!(snapshot.relationships_to("Order").len(), 1);
        assert_eq!(snapshot.views_of("Customer")[0].owner, "Customer");
        assert_eq!(snapshot.methods_of("Order").len(), 1);
        assert_eq!(snapshot.relationship_count("Order"), 1);
        assert!(snapshot.is_dynamic_type("Customer"));
        assert!(!snapshot.is_dynamic_type("Principal"));
        assert!(!snapshot.is_dynamic_type("Missing"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let snapshot = sample_snapshot();
        let bytes = snapshot.to_bytes().unwrap();
        let decoded = SchemaSnapshot::from_bytes(&bytes).unwrap();

        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn test_document_nesting() {
        let json = r#"{
            "types": [
                {"name": "Customer", "properties": [{"name": "email", "type": "String"}]},
                {"name": "Order"}
            ],
            "relationships": [
                {"source_type": "Customer", "target_type": "Order", "relationship_type": "OWNS",
                 "source_multiplicity": "1", "target_multiplicity": "*"}
            ]
        }"#;

        let snapshot = SchemaDocument::from_json(json).unwrap().into_snapshot();
        assert_eq!(snapshot.types.len(), 2);
        assert_eq!(snapshot.properties_of("Customer")[0].name, "email");

        let doc = SchemaDocument::from_snapshot(&snapshot);
        assert_eq!(doc.types[0].properties.len(), 1);
        assert_eq!(doc.relationships.len(), 1);
    }
}
