//! Core error types.

use thiserror::Error;

/// Crate-wide errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Schema definition error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Definition not found in the schema store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors raised while interpreting schema definitions.
///
/// These abort generation for the owning type only; the reload pass records
/// them as diagnostics and carries on with the remaining types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A property declaration cannot be turned into a descriptor.
    #[error("invalid property definition for {type_name}.{property}: {reason}")]
    InvalidPropertySchema {
        /// Owning type.
        type_name: String,
        /// Property name.
        property: String,
        /// Why the declaration was rejected.
        reason: String,
    },

    /// Type name does not match `[A-Z][a-zA-Z0-9_]*`.
    #[error("invalid type name '{0}': must match [A-Z][a-zA-Z0-9_]*")]
    InvalidTypeName(String),

    /// Type name collides with a reserved or existing built-in type.
    #[error("type '{0}' already exists, overriding it is forbidden")]
    ReservedTypeName(String),

    /// The declared supertype does not exist.
    #[error("type {type_name} cannot be used, supertype {supertype} not defined")]
    MissingSupertype {
        /// Offending type.
        type_name: String,
        /// Declared supertype.
        supertype: String,
    },

    /// The inheritance chain loops back on itself.
    #[error("inheritance cycle involving {0}")]
    InheritanceCycle(String),

    /// Supertype or contracts are not covered by the active license.
    #[error("type {type_name} depends on unlicensed types: {unlicensed:?}")]
    Unlicensed {
        /// Offending type.
        type_name: String,
        /// Names not covered by the license.
        unlicensed: Vec<String>,
    },
}

impl SchemaError {
    /// Shorthand for an invalid property schema error.
    pub fn invalid_property(
        type_name: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SchemaError::InvalidPropertySchema {
            type_name: type_name.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for schema interpretation.
pub type SchemaResult<T> = Result<T, SchemaError>;
