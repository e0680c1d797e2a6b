//! Property definitions.

use super::types::PropertyType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A schema-stored property of a type.
///
/// The type tag is kept as the raw stored string. It is interpreted by the
/// parser registry, so a misspelled tag survives a load and is reported as a
/// per-type diagnostic instead of poisoning the whole snapshot.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct PropertyDef {
    /// Store-assigned identifier (0 until persisted).
    #[serde(default)]
    pub id: u64,
    /// Owning type name.
    #[serde(default)]
    pub owner: String,
    /// Property name.
    pub name: String,
    /// Raw type tag.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Tag-specific format (pattern, variant list, query, ...).
    #[serde(default)]
    pub format: Option<String>,
    /// Read function body for computed properties.
    #[serde(default)]
    pub read_function: Option<String>,
    /// Write function body for computed properties.
    #[serde(default)]
    pub write_function: Option<String>,
    /// Value type hint for computed properties.
    #[serde(default)]
    pub type_hint: Option<String>,
    /// Display hint.
    #[serde(default)]
    pub hint: Option<String>,
    /// Free-form category.
    #[serde(default)]
    pub category: Option<String>,
    /// Default value, as stored.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Named validators attached to the property.
    #[serde(default)]
    pub validators: Vec<String>,
    /// Indexed for lookup.
    #[serde(default)]
    pub indexed: bool,
    /// Values must be unique across instances.
    #[serde(default)]
    pub unique: bool,
    /// Value is required.
    #[serde(default)]
    pub not_null: bool,
    /// Part of a compound uniqueness key.
    #[serde(default)]
    pub compound: bool,
    /// Declared in the schema rather than inherited from code.
    #[serde(default = "default_dynamic")]
    pub dynamic: bool,
    /// Part of the built-in schema.
    #[serde(default)]
    pub builtin: bool,
}

fn default_dynamic() -> bool {
    true
}

impl PropertyDef {
    /// Create a property with a raw type tag.
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner: String::new(),
            name: name.into(),
            type_tag: type_tag.into(),
            format: None,
            read_function: None,
            write_function: None,
            type_hint: None,
            hint: None,
            category: None,
            default_value: None,
            validators: Vec::new(),
            indexed: false,
            unique: false,
            not_null: false,
            compound: false,
            dynamic: true,
            builtin: false,
        }
    }

    /// Create a property with a known tag.
    pub fn typed(name: impl Into<String>, tag: PropertyType) -> Self {
        Self::new(name, tag.name())
    }

    /// Set the owning type.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Set the format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the read function body.
    pub fn with_read_function(mut self, body: impl Into<String>) -> Self {
        self.read_function = Some(body.into());
        self
    }

    /// Set the write function body.
    pub fn with_write_function(mut self, body: impl Into<String>) -> Self {
        self.write_function = Some(body.into());
        self
    }

    /// Set the value type hint.
    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = Some(hint.into());
        self
    }

    /// Set the display hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Attach a named validator.
    pub fn with_validator(mut self, name: impl Into<String>) -> Self {
        self.validators.push(name.into());
        self
    }

    /// Mark as required.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as indexed.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Mark as part of a compound uniqueness key.
    pub fn compound(mut self) -> Self {
        self.compound = true;
        self.unique = true;
        self
    }

    /// Mark as part of the built-in schema.
    pub fn with_builtin(mut self) -> Self {
        self.builtin = true;
        self.dynamic = false;
        self
    }

    /// Known tag, if the raw tag names one exactly.
    pub fn property_type(&self) -> Option<PropertyType> {
        PropertyType::from_name(self.type_tag.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_builder() {
        let prop = PropertyDef::typed("email", PropertyType::String)
            .owned_by("Customer")
            .with_format("[^@]+@[^@]+")
            .not_null()
            .unique();

        assert_eq!(prop.owner, "Customer");
        assert_eq!(prop.property_type(), Some(PropertyType::String));
        assert!(prop.not_null && prop.unique && !prop.compound);
        assert!(prop.dynamic);
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        let prop = PropertyDef::new("size", "Strng");
        assert_eq!(prop.type_tag, "Strng");
        assert_eq!(prop.property_type(), None);
    }

    #[test]
    fn test_json_shape() {
        let prop: PropertyDef =
            serde_json::from_str(r#"{"name":"age","type":"Integer","not_null":true}"#).unwrap();

        assert_eq!(prop.property_type(), Some(PropertyType::Integer));
        assert!(prop.not_null);
        assert!(prop.dynamic);
        assert!(prop.validators.is_empty());
    }

    #[test]
    fn test_builtin_is_not_dynamic() {
        let prop = PropertyDef::typed("name", PropertyType::String).with_builtin();
        assert!(prop.builtin);
        assert!(!prop.dynamic);
    }
}
