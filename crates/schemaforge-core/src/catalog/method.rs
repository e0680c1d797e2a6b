//! Method definitions.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Declared type name.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Parameter {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A schema-stored method of a type.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct MethodDef {
    /// Store-assigned identifier (0 until persisted).
    #[serde(default)]
    pub id: u64,
    /// Owning type name.
    #[serde(default)]
    pub owner: String,
    /// Method name; lifecycle names may carry a numeric suffix.
    pub name: String,
    /// Action source.
    #[serde(default)]
    pub source: String,
    /// Overrides an inherited method.
    #[serde(default)]
    pub overrides: bool,
    /// Exposed to external callers.
    #[serde(default)]
    pub exported: bool,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Declared return type.
    #[serde(default)]
    pub return_type: Option<String>,
    /// Declared failure types.
    #[serde(default)]
    pub exceptions: Vec<String>,
    /// Invoke the inherited implementation before the action.
    #[serde(default)]
    pub call_super: bool,
}

impl MethodDef {
    /// Create a method with an action source.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner: String::new(),
            name: name.into(),
            source: source.into(),
            overrides: false,
            exported: false,
            parameters: Vec::new(),
            return_type: None,
            exceptions: Vec::new(),
            call_super: false,
        }
    }

    /// Set the owning type.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(name, type_name));
        self
    }

    /// Set the return type.
    pub fn returning(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    /// Mark as exported.
    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    /// Mark as overriding.
    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }

    /// Invoke the inherited implementation first.
    pub fn calling_super(mut self) -> Self {
        self.call_super = true;
        self
    }

    /// Whether parameter or return metadata was declared.
    pub fn has_signature(&self) -> bool {
        !self.parameters.is_empty() || self.return_type.is_some()
    }
}
