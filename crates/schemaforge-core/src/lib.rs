//! SchemaForge Core - schema compilation and runtime activation.
//!
//! Type, property, relationship, view and method definitions live in a graph
//! store. This crate resolves them into type descriptors, renders a source
//! fingerprint per type, activates the result as an atomically swapped
//! generation and keeps access grants in step with the live schema.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod emitter;
pub mod error;
pub mod extension;
pub mod grants;
pub mod methods;
pub mod migration;
pub mod parser;
pub mod resolver;
pub mod runtime;
pub mod store;
pub mod views;

pub use catalog::{
    CascadeDelete, Direction, MethodDef, Multiplicity, Parameter, PropertyDef, PropertyType,
    RelationshipDef, SchemaDocument, SchemaSnapshot, SortDirection, TypeDef, ViewDef, BASE_TYPE,
};
pub use compiler::{
    Diagnostic, LifecycleState, PassReport, ReloadWorker, SchemaChange, SchemaCompiler, Stage,
};
pub use config::CompilerConfig;
pub use emitter::{CompilationUnit, SourceEmitter, TypeDescriptor};
pub use error::{Error, SchemaError, SchemaResult};
pub use extension::SchemaExtension;
pub use grants::{AccessGrant, GrantStore, GrantSynchronizer, MemoryGrantStore, SledGrantStore};
pub use migration::{LegacyMigrator, MigrationReport};
pub use parser::PropertyParserRegistry;
pub use resolver::{AllowAll, BuiltinCatalog, LicenseOracle, StaticLicense, TypeResolver};
pub use runtime::{Activator, DescriptorRegistry, DynamicObject, Generation};
pub use store::{MemoryStore, SchemaStore, SnapshotArchive};
