//! Declarative type descriptors handed to the runtime.

use crate::catalog::{CascadeDelete, Direction, Multiplicity, Parameter, SortDirection, ValueType};
use serde::{Deserialize, Serialize};

/// Concrete type or stateless capability contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Instantiable (unless abstract) concrete type.
    Concrete,
    /// Capability contract.
    Contract,
}

/// Where a descriptor's supertype comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupertypeOrigin {
    /// The implicit base type.
    Base,
    /// A platform-provided type.
    Builtin,
    /// Another schema-defined type.
    Dynamic,
}

/// Storage shape of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    /// Single scalar value.
    Scalar {
        /// Value type.
        value_type: ValueType,
        /// Date pattern for dates.
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    /// Array of scalars.
    Array {
        /// Element value type.
        value_type: ValueType,
    },
    /// One of a fixed variant list.
    Enum {
        /// Generated enum definition name.
        enum_name: String,
        /// Allowed variants.
        variants: Vec<String>,
    },
    /// Hashed secret.
    Password,
    /// Computed by read/write functions.
    Computed {
        /// Read function body.
        read_function: Option<String>,
        /// Write function body.
        write_function: Option<String>,
        /// Value type hint.
        type_hint: Option<String>,
    },
    /// Computed by a graph query.
    Query {
        /// Query text.
        query: String,
    },
    /// Number of elements of a collection property.
    Count {
        /// Counted collection property.
        collection: String,
    },
    /// Projection over a relationship property.
    Notion {
        /// Relationship property projected.
        relationship_property: String,
        /// Remote property read from each related object.
        remote_property: Option<String>,
        /// Cardinality of the projection.
        multiplicity: Multiplicity,
    },
    /// Joined string of other properties.
    Join {
        /// Separator inserted between values.
        separator: String,
        /// Joined properties, in order.
        properties: Vec<String>,
    },
    /// Handled by an external property handler.
    Custom {
        /// Handler name.
        handler: String,
    },
    /// Navigation along a relationship.
    Relationship {
        /// Relationship type token.
        relationship_type: String,
        /// Which end the property lives on.
        #[serde(with = "direction_serde")]
        direction: Direction,
        /// Cardinality of the property.
        multiplicity: Multiplicity,
        /// Type on the far side.
        related_type: String,
        /// Cascading delete policy.
        cascade: CascadeDelete,
    },
}

mod direction_serde {
    use crate::catalog::Direction;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(direction: &Direction, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(match direction {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Direction, D::Error> {
        match String::deserialize(d)?.as_str() {
            "outgoing" => Ok(Direction::Outgoing),
            "incoming" => Ok(Direction::Incoming),
            other => Err(serde::de::Error::unknown_variant(other, &["outgoing", "incoming"])),
        }
    }
}

/// A single property of an emitted type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Storage shape.
    #[serde(flatten)]
    pub kind: PropertyKind,
    /// Required.
    #[serde(default)]
    pub not_null: bool,
    /// Unique across instances.
    #[serde(default)]
    pub unique: bool,
    /// Indexed for lookup.
    #[serde(default)]
    pub indexed: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Display hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Free-form category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Contributed by built-in metadata rather than the schema graph.
    #[serde(default)]
    pub builtin: bool,
}

impl PropertyDescriptor {
    /// Create a descriptor with no flags.
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            not_null: false,
            unique: false,
            indexed: false,
            default_value: None,
            hint: None,
            category: None,
            builtin: false,
        }
    }

    /// Value type for type checking, when the kind stores plain values.
    pub fn value_type(&self) -> Option<ValueType> {
        match &self.kind {
            PropertyKind::Scalar { value_type, .. } | PropertyKind::Array { value_type } => {
                Some(*value_type)
            }
            PropertyKind::Enum { .. } | PropertyKind::Password | PropertyKind::Join { .. } => {
                Some(ValueType::String)
            }
            PropertyKind::Count { .. } => Some(ValueType::Integer),
            _ => None,
        }
    }

    /// Check if the property holds several values.
    pub fn is_collection(&self) -> bool {
        match &self.kind {
            PropertyKind::Array { .. } => true,
            PropertyKind::Relationship { multiplicity, .. }
            | PropertyKind::Notion { multiplicity, .. } => multiplicity.is_collection(),
            _ => false,
        }
    }

    /// Check if the property navigates a relationship.
    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, PropertyKind::Relationship { .. })
    }

    /// Check if the value is computed rather than stored.
    pub fn is_computed(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::Computed { .. }
                | PropertyKind::Query { .. }
                | PropertyKind::Count { .. }
                | PropertyKind::Notion { .. }
                | PropertyKind::Join { .. }
        )
    }

    /// Short kind label used in listings.
    pub fn kind_label(&self) -> &'static str {
        match &self.kind {
            PropertyKind::Scalar { .. } => "scalar",
            PropertyKind::Array { .. } => "array",
            PropertyKind::Enum { .. } => "enum",
            PropertyKind::Password => "password",
            PropertyKind::Computed { .. } => "computed",
            PropertyKind::Query { .. } => "query",
            PropertyKind::Count { .. } => "count",
            PropertyKind::Notion { .. } => "notion",
            PropertyKind::Join { .. } => "join",
            PropertyKind::Custom { .. } => "custom",
            PropertyKind::Relationship { .. } => "relationship",
        }
    }
}

/// A generated enum definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Enum name.
    pub name: String,
    /// Variants in declaration order.
    pub variants: Vec<String>,
}

/// A validation rule attached to a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Validator {
    /// Value must be present.
    NotNull {
        /// Checked property.
        property: String,
    },
    /// Value must be unique among peers of the same type.
    Unique {
        /// Checked property.
        property: String,
    },
    /// Combination of values must be unique among peers.
    CompoundUnique {
        /// Properties forming the key.
        properties: Vec<String>,
    },
    /// String value must match a regular expression.
    Pattern {
        /// Checked property.
        property: String,
        /// Regular expression.
        pattern: String,
    },
    /// Value must be one of the enum variants.
    EnumMember {
        /// Checked property.
        property: String,
        /// Allowed variants.
        variants: Vec<String>,
    },
    /// Value must have the declared type.
    TypeCheck {
        /// Checked property.
        property: String,
        /// Expected value type.
        value_type: ValueType,
        /// Whether an array of that type is expected.
        array: bool,
    },
    /// Externally registered validator.
    Named {
        /// Checked property.
        property: String,
        /// Registered validator name.
        name: String,
    },
}

impl Validator {
    /// Properties the rule reads.
    pub fn properties(&self) -> Vec<&str> {
        match self {
            Validator::CompoundUnique { properties } => {
                properties.iter().map(String::as_str).collect()
            }
            Validator::NotNull { property }
            | Validator::Unique { property }
            | Validator::Pattern { property, .. }
            | Validator::EnumMember { property, .. }
            | Validator::TypeCheck { property, .. }
            | Validator::Named { property, .. } => vec![property.as_str()],
        }
    }
}

/// A named, ordered projection of properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    /// View name.
    pub name: String,
    /// Members in output order.
    pub members: Vec<String>,
}

/// Lifecycle hooks the runtime invokes around persistence events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleHook {
    /// Before an object is first stored.
    OnCreation,
    /// After an object is first stored.
    AfterCreation,
    /// Before a modification is stored.
    OnModification,
    /// After an object was deleted.
    AfterDeletion,
}

impl LifecycleHook {
    /// Every hook.
    pub const ALL: [LifecycleHook; 4] = [
        LifecycleHook::OnCreation,
        LifecycleHook::AfterCreation,
        LifecycleHook::OnModification,
        LifecycleHook::AfterDeletion,
    ];

    /// Reserved method name.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleHook::OnCreation => "onCreation",
            LifecycleHook::AfterCreation => "afterCreation",
            LifecycleHook::OnModification => "onModification",
            LifecycleHook::AfterDeletion => "afterDeletion",
        }
    }

    /// Hook for a reserved method name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.name() == name)
    }

    /// Whether action failures are logged and swallowed instead of raised.
    pub fn swallows_failures(&self) -> bool {
        matches!(self, LifecycleHook::AfterDeletion)
    }
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a method is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Synthesised lifecycle callback.
    Lifecycle(LifecycleHook),
    /// Method with declared parameters or return type.
    Custom,
    /// Exported call taking a string-keyed argument map.
    Generic,
}

/// One action source executed by a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Declaring method name, including any ordering suffix.
    pub declared_name: String,
    /// Action source.
    pub source: String,
}

/// An assembled method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Dispatch kind.
    pub kind: MethodKind,
    /// Actions in execution order.
    pub actions: Vec<Action>,
    /// Overrides an inherited method.
    pub overrides: bool,
    /// Exposed to external callers.
    pub exported: bool,
    /// Declared parameters.
    pub parameters: Vec<Parameter>,
    /// Declared return type.
    pub return_type: Option<String>,
    /// Declared failure types.
    pub exceptions: Vec<String>,
    /// Invoke the inherited implementation first.
    pub call_super: bool,
}

/// Structured description of one emitted type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Type name.
    pub name: String,
    /// Concrete type or contract.
    pub kind: TypeKind,
    /// Cannot be instantiated.
    pub is_abstract: bool,
    /// Resolved supertype.
    pub supertype: String,
    /// Origin of the supertype.
    pub supertype_origin: SupertypeOrigin,
    /// Resolved contracts.
    pub contracts: Vec<String>,
    /// Own properties, relationship-derived first.
    pub properties: Vec<PropertyDescriptor>,
    /// Generated enum definitions.
    pub enums: Vec<EnumDef>,
    /// Assembled views.
    pub views: Vec<ViewDescriptor>,
    /// Validation rules.
    pub validators: Vec<Validator>,
    /// Default ordering.
    pub default_sort: Option<(String, SortDirection)>,
    /// Assembled methods.
    pub methods: Vec<MethodDescriptor>,
    /// Source fragments contributed by extensions.
    pub extension_source: Vec<String>,
    /// Free-form category.
    pub category: Option<String>,
}

impl TypeDescriptor {
    /// Own property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// View by name.
    pub fn view(&self, name: &str) -> Option<&ViewDescriptor> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Lifecycle method for `hook`.
    pub fn lifecycle(&self, hook: LifecycleHook) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.kind == MethodKind::Lifecycle(hook))
    }

    /// Types on the far side of relationship properties.
    pub fn related_types(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter_map(|p| match &p.kind {
                PropertyKind::Relationship { related_type, .. } => Some(related_type.as_str()),
                _ => None,
            })
            .collect()
    }
}
