//! Pass state, reports and change notifications.

use crate::emitter::CompilationUnit;
use crate::grants::SyncReport;
use crate::migration::MigrationReport;
use serde::Serialize;

/// Lifecycle of the compiled schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing activated yet.
    #[default]
    Unloaded,
    /// Migrating and resolving the schema graph.
    Resolving,
    /// Compilation units emitted.
    Emitted,
    /// Units handed to the activator.
    Compiled,
    /// A generation is active.
    Active,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Unloaded => "unloaded",
            LifecycleState::Resolving => "resolving",
            LifecycleState::Emitted => "emitted",
            LifecycleState::Compiled => "compiled",
            LifecycleState::Active => "active",
        };
        f.write_str(s)
    }
}

/// Pass stage a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Legacy key migration.
    Migration,
    /// Reading the schema graph.
    Snapshot,
    /// License check.
    Licensing,
    /// Descriptor emission.
    Emission,
    /// Emission postponed to the next pass.
    Deferred,
    /// Writing renamed or migrated definitions back.
    Persistence,
    /// Runtime activation.
    Activation,
    /// Access grant synchronisation.
    Grants,
}

/// A per-type problem found during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Affected type, or `*` for pass-wide problems.
    pub type_name: String,
    /// Stage.
    pub stage: Stage,
    /// Message.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(type_name: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.stage, self.type_name, self.message)
    }
}

/// Outcome of one reload pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Store version the pass compiled.
    pub version: u64,
    /// Activated generation, if activation succeeded.
    pub generation: Option<u64>,
    /// Lifecycle state after the pass.
    pub state: LifecycleState,
    /// Emitted units, sorted by type name.
    pub units: Vec<CompilationUnit>,
    /// Types left out of the pass.
    pub excluded: Vec<String>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Legacy keys migrated.
    #[serde(skip)]
    pub migration: MigrationReport,
    /// Grant changes.
    #[serde(skip)]
    pub grants: SyncReport,
}

impl PassReport {
    /// Whether the pass activated a generation without any diagnostic.
    pub fn is_clean(&self) -> bool {
        self.generation.is_some() && self.diagnostics.is_empty()
    }

    /// Unit for `type_name`.
    pub fn unit(&self, type_name: &str) -> Option<&CompilationUnit> {
        self.units.iter().find(|u| u.type_name == type_name)
    }

    /// Diagnostics concerning `type_name`.
    pub fn diagnostics_for<'r>(&'r self, type_name: &'r str) -> impl Iterator<Item = &'r Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.type_name == type_name)
    }
}

/// An entity touched by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// A type definition.
    Type(String),
    /// A property definition.
    Property {
        /// Owning type.
        owner: String,
        /// Property name.
        name: String,
    },
    /// A relationship definition.
    Relationship(u64),
    /// A view definition.
    View {
        /// Owning type.
        owner: String,
        /// View name.
        name: String,
    },
    /// A method definition.
    Method {
        /// Owning type.
        owner: String,
        /// Method name.
        name: String,
    },
    /// An ordinary data object.
    Data {
        /// Object type.
        type_name: String,
    },
}

impl SchemaChange {
    /// Whether the change affects the compiled schema.
    pub fn is_schema(&self) -> bool {
        !matches!(self, SchemaChange::Data { .. })
    }
}
