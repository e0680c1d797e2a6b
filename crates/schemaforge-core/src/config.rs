//! Compiler configuration.

use std::collections::HashSet;
use std::time::Duration;

/// Configuration for the schema compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Allow schema types to reuse reserved or built-in type names once the
    /// runtime is initialized.
    pub allow_type_override: bool,

    /// Activate the units that pass even when others fail. Off by default,
    /// so a failing unit rejects the whole batch.
    pub force_activation: bool,

    /// Type names schema types may not use, on top of `Relation`.
    pub reserved_names: HashSet<String>,

    /// How often the reload worker checks for a pending request.
    pub reload_poll_interval: Duration,

    /// Merge reload requests arriving during a pass into one follow-up pass.
    /// When disabled, every request runs its own pass.
    pub coalesce: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            allow_type_override: false,
            force_activation: false,
            reserved_names: HashSet::new(),
            reload_poll_interval: Duration::from_millis(50),
            coalesce: true,
        }
    }
}

impl CompilerConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict configuration: any failing unit rejects the whole activation.
    /// Same as the default.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Forced configuration: units that pass are activated even when others
    /// fail.
    pub fn forced() -> Self {
        Self::default().force_activation(true)
    }

    /// Set whether built-in type names may be overridden.
    pub fn allow_type_override(mut self, allow: bool) -> Self {
        self.allow_type_override = allow;
        self
    }

    /// Set whether activation is forced.
    pub fn force_activation(mut self, force: bool) -> Self {
        self.force_activation = force;
        self
    }

    /// Reserve an additional type name.
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved_names.insert(name.into());
        self
    }

    /// Replace the reserved names.
    pub fn reserved_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the reload worker poll interval.
    pub fn reload_poll_interval(mut self, interval: Duration) -> Self {
        self.reload_poll_interval = interval;
        self
    }

    /// Set whether reload requests are coalesced.
    pub fn coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }
}
