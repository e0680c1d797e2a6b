//! Property type tags and value types.

use serde::{Deserialize, Serialize};

/// Fixed enumeration of property type tags.
///
/// Tags are stored as raw strings on [`PropertyDef`](super::PropertyDef) and
/// interpreted by the parser registry, so unknown tags can be persisted and
/// reported instead of failing at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyType {
    /// UTF-8 string.
    String,
    /// Array of strings.
    StringArray,
    /// Array of dates.
    DateArray,
    /// Array of 64-bit integers.
    LongArray,
    /// Array of doubles.
    DoubleArray,
    /// Array of 32-bit integers.
    IntegerArray,
    /// Array of booleans.
    BooleanArray,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Double precision float.
    Double,
    /// Boolean.
    Boolean,
    /// Enumeration with a fixed variant list.
    Enum,
    /// Date / timestamp.
    Date,
    /// Number of elements of a collection property.
    Count,
    /// Computed by read/write function bodies.
    Function,
    /// Projection over a relationship property.
    Notion,
    /// Projection over a relationship property, restricted to ids.
    IdNotion,
    /// Computed by a graph query.
    Cypher,
    /// Joined string of other properties.
    Join,
    /// Hashed secret.
    Password,
    /// Custom property handler.
    Custom,
}

impl PropertyType {
    /// Every tag, in declaration order.
    pub const ALL: [PropertyType; 21] = [
        PropertyType::String,
        PropertyType::StringArray,
        PropertyType::DateArray,
        PropertyType::LongArray,
        PropertyType::DoubleArray,
        PropertyType::IntegerArray,
        PropertyType::BooleanArray,
        PropertyType::Integer,
        PropertyType::Long,
        PropertyType::Double,
        PropertyType::Boolean,
        PropertyType::Enum,
        PropertyType::Date,
        PropertyType::Count,
        PropertyType::Function,
        PropertyType::Notion,
        PropertyType::IdNotion,
        PropertyType::Cypher,
        PropertyType::Join,
        PropertyType::Password,
        PropertyType::Custom,
    ];

    /// Tag name as it appears in schema definitions.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::StringArray => "StringArray",
            PropertyType::DateArray => "DateArray",
            PropertyType::LongArray => "LongArray",
            PropertyType::DoubleArray => "DoubleArray",
            PropertyType::IntegerArray => "IntegerArray",
            PropertyType::BooleanArray => "BooleanArray",
            PropertyType::Integer => "Integer",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Boolean => "Boolean",
            PropertyType::Enum => "Enum",
            PropertyType::Date => "Date",
            PropertyType::Count => "Count",
            PropertyType::Function => "Function",
            PropertyType::Notion => "Notion",
            PropertyType::IdNotion => "IdNotion",
            PropertyType::Cypher => "Cypher",
            PropertyType::Join => "Join",
            PropertyType::Password => "Password",
            PropertyType::Custom => "Custom",
        }
    }

    /// Exact (case-sensitive) tag lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Processing priority within a type.
    ///
    /// Properties that reference other properties (count, join, notions)
    /// come last so the names they refer to are already declared.
    pub fn sort_index(&self) -> u8 {
        match self {
            PropertyType::BooleanArray => 0,
            PropertyType::IntegerArray => 1,
            PropertyType::DoubleArray => 2,
            PropertyType::StringArray => 3,
            PropertyType::DateArray => 4,
            PropertyType::LongArray => 5,
            PropertyType::Password => 6,
            PropertyType::Boolean => 7,
            PropertyType::Integer => 8,
            PropertyType::String => 9,
            PropertyType::Double => 10,
            PropertyType::Long => 11,
            PropertyType::Enum => 12,
            PropertyType::Date => 13,
            PropertyType::Function => 14,
            PropertyType::Cypher => 15,
            PropertyType::Count => 16,
            PropertyType::Custom => 17,
            PropertyType::Join => 18,
            PropertyType::IdNotion => 19,
            PropertyType::Notion => 20,
        }
    }

    /// Check if this tag declares an array.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            PropertyType::StringArray
                | PropertyType::DateArray
                | PropertyType::LongArray
                | PropertyType::DoubleArray
                | PropertyType::IntegerArray
                | PropertyType::BooleanArray
        )
    }

    /// Element value type for scalar and array tags.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            PropertyType::String | PropertyType::StringArray => Some(ValueType::String),
            PropertyType::Date | PropertyType::DateArray => Some(ValueType::Date),
            PropertyType::Long | PropertyType::LongArray => Some(ValueType::Long),
            PropertyType::Double | PropertyType::DoubleArray => Some(ValueType::Double),
            PropertyType::Integer | PropertyType::IntegerArray => Some(ValueType::Integer),
            PropertyType::Boolean | PropertyType::BooleanArray => Some(ValueType::Boolean),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Value type of scalar and array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// UTF-8 string.
    String,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Double precision float.
    Double,
    /// Boolean.
    Boolean,
    /// Date, carried as a formatted string.
    Date,
}

impl ValueType {
    /// Check if a JSON value is acceptable for this type.
    ///
    /// Null is accepted; presence is enforced by not-null validators.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;

        match (self, value) {
            (_, Value::Null) => true,
            (ValueType::String | ValueType::Date, Value::String(_)) => true,
            (ValueType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(|v| i32::try_from(v).is_ok())
                .unwrap_or(false),
            (ValueType::Long, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ValueType::Double, Value::Number(_)) => true,
            (ValueType::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::String => "String",
            ValueType::Integer => "Integer",
            ValueType::Long => "Long",
            ValueType::Double => "Double",
            ValueType::Boolean => "Boolean",
            ValueType::Date => "Date",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_names_roundtrip() {
        for tag in PropertyType::ALL {
            assert_eq!(PropertyType::from_name(tag.name()), Some(tag));
        }
        assert_eq!(PropertyType::from_name("string"), None);
    }

    #[test]
    fn test_sort_index_puts_references_last() {
        assert!(PropertyType::String.sort_index() < PropertyType::Count.sort_index());
        assert!(PropertyType::Join.sort_index() < PropertyType::Notion.sort_index());
        assert!(PropertyType::BooleanArray.sort_index() < PropertyType::Boolean.sort_index());
    }

    #[test]
    fn test_value_type_accepts() {
        assert!(ValueType::String.accepts(&json!("a")));
        assert!(ValueType::Integer.accepts(&json!(42)));
        assert!(!ValueType::Integer.accepts(&json!(5_000_000_000i64)));
        assert!(ValueType::Long.accepts(&json!(5_000_000_000i64)));
        assert!(ValueType::Double.accepts(&json!(1.5)));
        assert!(!ValueType::Boolean.accepts(&json!("true")));
        assert!(ValueType::Date.accepts(&json!(null)));
    }

    #[test]
    fn test_array_tags() {
        assert!(PropertyType::BooleanArray.is_array());
        assert!(!PropertyType::Boolean.is_array());
        assert_eq!(PropertyType::LongArray.value_type(), Some(ValueType::Long));
        assert_eq!(PropertyType::Notion.value_type(), None);
    }
}
