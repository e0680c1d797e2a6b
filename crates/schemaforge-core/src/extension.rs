//! Platform extensions.
//!
//! Extensions register additional built-in types and property generators
//! and may append source fragments to emitted types.

use crate::emitter::TypeDescriptor;
use crate::parser::PropertyParserRegistry;
use crate::resolver::BuiltinCatalog;

/// A module contributing to the schema compiler.
pub trait SchemaExtension: Send + Sync {
    /// Extension name, used in logs.
    fn name(&self) -> &str;

    /// Register built-in types and relationship properties.
    fn register_builtins(&self, _builtins: &mut BuiltinCatalog) {}

    /// Register property generators.
    fn register_generators(&self, _registry: &mut PropertyParserRegistry) {}

    /// Source appended to an emitted type, if any.
    fn contribute_source(&self, _descriptor: &TypeDescriptor) -> Option<String> {
        None
    }
}
