//! Schema-interpreted objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An object of a schema-defined type, stored as a property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    /// Object id.
    pub id: String,
    /// Type name the object is interpreted against.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Property values.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl DynamicObject {
    /// Create an object without properties.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            properties: Map::new(),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Property value, `None` when absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Property value, treating JSON `null` as absent.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_null())
    }

    /// Set a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(key.into(), value.into())
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Project the object onto `members`, skipping absent ones.
    pub fn project(&self, members: &[String]) -> Map<String, Value> {
        members
            .iter()
            .filter_map(|m| self.get(m).map(|v| (m.clone(), v.clone())))
            .collect()
    }
}
