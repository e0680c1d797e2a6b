//! Reload pass orchestration.
//!
//! A pass migrates legacy keys, snapshots the store, excludes unlicensed and
//! cyclic types, emits every remaining type in hierarchy order, activates the
//! units and finally reconciles access grants. Failures are isolated per type
//! and reported as [`Diagnostic`]s.

mod report;
mod worker;

pub use report::{Diagnostic, LifecycleState, PassReport, SchemaChange, Stage};
pub use worker::ReloadWorker;

use crate::catalog::{clean_type_name, PropertyDef, SchemaSnapshot, TypeDef};
use crate::config::CompilerConfig;
use crate::emitter::{CompilationUnit, EmitOutcome, SourceEmitter};
use crate::error::Error;
use crate::extension::SchemaExtension;
use crate::grants::GrantSynchronizer;
use crate::migration::LegacyMigrator;
use crate::parser::PropertyParserRegistry;
use crate::resolver::{AllowAll, BuiltinCatalog, LicenseOracle, NameCache, TypeResolver};
use crate::runtime::{ActivationError, Activator, CancelFlag, DescriptorRegistry};
use crate::store::{SchemaStore, SnapshotArchive};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Builder for [`SchemaCompiler`].
pub struct CompilerBuilder {
    store: Arc<dyn SchemaStore>,
    config: CompilerConfig,
    activator: Option<Arc<dyn Activator>>,
    grants: Option<GrantSynchronizer>,
    license: Arc<dyn LicenseOracle>,
    archive: Option<SnapshotArchive>,
    builtins: BuiltinCatalog,
    registry: PropertyParserRegistry,
    extensions: Vec<Arc<dyn SchemaExtension>>,
}

impl CompilerBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Activate through `activator` instead of a built-in [`DescriptorRegistry`].
    pub fn activator(mut self, activator: Arc<dyn Activator>) -> Self {
        self.activator = Some(activator);
        self
    }

    /// Synchronise access grants after each activation.
    pub fn grants(mut self, grants: GrantSynchronizer) -> Self {
        self.grants = Some(grants);
        self
    }

    /// Gate built-in supertypes and contracts through `license`.
    pub fn license(mut self, license: Arc<dyn LicenseOracle>) -> Self {
        self.license = license;
        self
    }

    /// Archive the snapshot behind every activated generation.
    pub fn archive(mut self, archive: SnapshotArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Add an extension; its built-ins and generators are registered now.
    pub fn extension(mut self, extension: Arc<dyn SchemaExtension>) -> Self {
        extension.register_builtins(&mut self.builtins);
        extension.register_generators(&mut self.registry);
        debug!(extension = %extension.name(), "registered schema extension");
        self.extensions.push(extension);
        self
    }

    /// Build the compiler.
    pub fn build(self) -> SchemaCompiler {
        let (activator, descriptors) = match self.activator {
            Some(activator) => (activator, None),
            None => {
                let registry = Arc::new(DescriptorRegistry::new(self.builtins.clone()));
                (Arc::clone(&registry) as Arc<dyn Activator>, Some(registry))
            }
        };

        SchemaCompiler {
            store: self.store,
            activator,
            descriptors,
            grants: self.grants,
            license: self.license,
            archive: self.archive,
            builtins: self.builtins,
            registry: self.registry,
            extensions: self.extensions,
            config: self.config,
            cache: NameCache::new(),
            state: Mutex::new(LifecycleState::Unloaded),
            pass_lock: Mutex::new(()),
            pending: AtomicU64::new(0),
            running: Mutex::new(false),
            passes: AtomicU64::new(0),
            cancel: CancelFlag::new(),
        }
    }
}

/// Compiles the schema graph and keeps the runtime in step with it.
pub struct SchemaCompiler {
    store: Arc<dyn SchemaStore>,
    activator: Arc<dyn Activator>,
    descriptors: Option<Arc<DescriptorRegistry>>,
    grants: Option<GrantSynchronizer>,
    license: Arc<dyn LicenseOracle>,
    archive: Option<SnapshotArchive>,
    builtins: BuiltinCatalog,
    registry: PropertyParserRegistry,
    extensions: Vec<Arc<dyn SchemaExtension>>,
    config: CompilerConfig,
    cache: NameCache,
    state: Mutex<LifecycleState>,
    pass_lock: Mutex<()>,
    pending: AtomicU64,
    running: Mutex<bool>,
    passes: AtomicU64,
    cancel: CancelFlag,
}

/// Output of the emission stage.
struct Emission {
    units: Vec<CompilationUnit>,
    updates: Vec<PropertyDef>,
    excluded: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl SchemaCompiler {
    /// Start building a compiler over `store`.
    pub fn builder(store: Arc<dyn SchemaStore>) -> CompilerBuilder {
        CompilerBuilder {
            store,
            config: CompilerConfig::default(),
            activator: None,
            grants: None,
            license: Arc::new(AllowAll),
            archive: None,
            builtins: BuiltinCatalog::new(),
            registry: PropertyParserRegistry::new(),
            extensions: Vec::new(),
        }
    }

    /// Compiler with default configuration and a built-in registry.
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self::builder(store).build()
    }

    /// The schema store.
    pub fn store(&self) -> &Arc<dyn SchemaStore> {
        &self.store
    }

    /// The built-in descriptor registry, unless a custom activator is used.
    pub fn descriptors(&self) -> Option<&Arc<DescriptorRegistry>> {
        self.descriptors.as_ref()
    }

    /// The grant synchronizer, if any.
    pub fn grants(&self) -> Option<&GrantSynchronizer> {
        self.grants.as_ref()
    }

    /// The snapshot archive, if any.
    pub fn archive(&self) -> Option<&SnapshotArchive> {
        self.archive.as_ref()
    }

    /// The configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Number of passes run so far.
    pub fn passes_run(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Whether a reload has been requested but not run yet.
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Cancel the activation of the pass in progress, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_state(&self, state: LifecycleState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!(from = %*current, to = %state, "schema lifecycle transition");
            *current = state;
        }
    }

    fn resting_state(&self) -> LifecycleState {
        if self.activator.is_initialized() {
            LifecycleState::Active
        } else {
            LifecycleState::Unloaded
        }
    }

    /// Validate and persist a new type definition, then reload.
    pub fn create_type(&self, def: TypeDef) -> Result<Option<PassReport>, Error> {
        def.validate_name()?;
        if self.protects_names() {
            def.validate_not_reserved(&self.config.reserved_names, &self.existing_builtin_names()?)?;
        }
        let name = def.name.clone();
        self.store.put_type(def)?;
        Ok(self.on_commit(&[SchemaChange::Type(name)]))
    }

    /// Rename a type, moving everything it owns and every reference to it,
    /// then reload.
    ///
    /// The new name is checked like a created one.
    pub fn rename_type(&self, from: &str, to: &str) -> Result<Option<PassReport>, Error> {
        let snapshot = self.store.snapshot()?;
        let Some(current) = snapshot.get_type(from) else {
            return Err(Error::NotFound(format!("type {from}")));
        };
        if from == to {
            return Ok(None);
        }
        if snapshot.get_type(to).is_some() {
            return Err(Error::InvalidData(format!("type {to} already exists")));
        }

        let mut renamed = current.clone();
        renamed.name = to.to_string();
        renamed.validate_name()?;
        if self.protects_names() {
            renamed.validate_not_reserved(&self.config.reserved_names, &self.existing_builtin_names()?)?;
        }
        self.store.put_type(renamed)?;

        for ty in snapshot.types.values().filter(|t| t.name != from) {
            let extends = ty.extends.as_deref().map(clean_type_name) == Some(from);
            let contracts = ty.contracts();
            let implements = contracts.iter().any(|c| c == from);
            if !extends && !implements {
                continue;
            }
            let mut def = ty.clone();
            if extends {
                def.extends = Some(to.to_string());
            }
            if implements {
                let listed: Vec<&str> = contracts
                    .iter()
                    .map(|c| if c == from { to } else { c.as_str() })
                    .collect();
                def.implements = Some(listed.join(", "));
            }
            self.store.put_type(def)?;
        }

        for prop in snapshot.properties.iter().filter(|p| p.owner == from) {
            let mut prop = prop.clone();
            prop.owner = to.to_string();
            self.store.put_property(prop)?;
        }
        for view in snapshot.views.iter().filter(|v| v.owner == from) {
            let mut view = view.clone();
            view.owner = to.to_string();
            self.store.put_view(view)?;
        }
        for method in snapshot.methods.iter().filter(|m| m.owner == from) {
            let mut method = method.clone();
            method.owner = to.to_string();
            self.store.put_method(method)?;
        }
        for rel in snapshot.relationships.iter().filter(|r| r.touches(from)) {
            let mut rel = rel.clone();
            if rel.source_type == from {
                rel.source_type = to.to_string();
            }
            if rel.target_type == from {
                rel.target_type = to.to_string();
            }
            self.store.put_relationship(rel)?;
        }
        self.store.delete_type(from)?;

        info!(from = %from, to = %to, "type renamed");
        Ok(self.on_commit(&[
            SchemaChange::Type(from.to_string()),
            SchemaChange::Type(to.to_string()),
        ]))
    }

    /// Delete a type with everything it owns, then reload.
    pub fn delete_type(&self, name: &str) -> Result<Option<PassReport>, Error> {
        if !self.store.delete_type(name)? {
            return Err(Error::NotFound(format!("type {name}")));
        }
        Ok(self.on_commit(&[SchemaChange::Type(name.to_string())]))
    }

    /// React to a committed transaction: reload when a schema entity changed.
    pub fn on_commit(&self, changes: &[SchemaChange]) -> Option<PassReport> {
        if self.request_for(changes) {
            self.process_pending()
        } else {
            None
        }
    }

    /// Request a reload when `changes` touch the schema. Returns whether
    /// one was requested.
    pub fn request_for(&self, changes: &[SchemaChange]) -> bool {
        let touched = changes.iter().any(SchemaChange::is_schema);
        if touched {
            self.request_reload();
        }
        touched
    }

    /// Request a reload without running it.
    pub fn request_reload(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Request a reload and run pending passes.
    pub fn reload(&self) -> Option<PassReport> {
        self.request_reload();
        self.process_pending()
    }

    fn take_request(&self) -> bool {
        if self.config.coalesce {
            self.pending.swap(0, Ordering::SeqCst) > 0
        } else {
            self.pending
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    /// Run passes until no request is pending.
    ///
    /// Only one caller runs passes at a time; a caller finding a pass in
    /// progress returns `None` and leaves its request to the running caller.
    pub fn process_pending(&self) -> Option<PassReport> {
        {
            let mut running = self.running.lock();
            if *running {
                return None;
            }
            *running = true;
        }

        let mut last = None;
        loop {
            while self.take_request() {
                last = Some(self.run_pass());
            }
            let mut running = self.running.lock();
            if !self.has_pending() {
                *running = false;
                break;
            }
        }
        last
    }

    fn protects_names(&self) -> bool {
        self.activator.is_initialized() && !self.config.allow_type_override
    }

    fn existing_builtin_names(&self) -> Result<HashSet<String>, Error> {
        let snapshot = self.store.snapshot()?;
        Ok(self
            .builtins
            .type_names()
            .map(String::from)
            .chain(
                snapshot
                    .types
                    .values()
                    .filter(|t| t.is_builtin)
                    .map(|t| t.name.clone()),
            )
            .collect())
    }

    /// Run one reload pass now.
    #[instrument(skip(self), fields(version = self.store.version()))]
    pub fn run_pass(&self) -> PassReport {
        let _guard = self.pass_lock.lock();
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.cancel.reset();
        self.set_state(LifecycleState::Resolving);
        self.cache.clear();

        let mut report = PassReport::default();

        match LegacyMigrator::new(self.store.as_ref()).run() {
            Ok(migration) => {
                for (type_name, key, error) in &migration.failed {
                    report.diagnostics.push(Diagnostic::new(
                        type_name,
                        Stage::Migration,
                        format!("legacy key {key}: {error}"),
                    ));
                }
                report.migration = migration;
            }
            Err(e) => {
                warn!(error = %e, "legacy migration failed");
                report
                    .diagnostics
                    .push(Diagnostic::new("*", Stage::Migration, e.to_string()));
            }
        }

        let snapshot = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "failed to snapshot schema");
                report
                    .diagnostics
                    .push(Diagnostic::new("*", Stage::Snapshot, e.to_string()));
                report.state = self.resting_state();
                self.set_state(report.state);
                return report;
            }
        };
        report.version = snapshot.version;

        let emission = self.emit_all(&snapshot);
        report.diagnostics.extend(emission.diagnostics);
        let mut excluded: Vec<String> = emission.excluded.into_iter().collect();
        excluded.sort();
        report.excluded = excluded;
        self.set_state(LifecycleState::Emitted);

        for prop in emission.updates {
            let owner = prop.owner.clone();
            if let Err(e) = self.store.put_property(prop) {
                warn!(type_name = %owner, error = %e, "failed to persist property update");
                report
                    .diagnostics
                    .push(Diagnostic::new(owner, Stage::Persistence, e.to_string()));
            }
        }

        let mut units = emission.units;
        units.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        report.units = units;

        self.set_state(LifecycleState::Compiled);
        match self
            .activator
            .activate(report.units.clone(), self.config.force_activation, &self.cancel)
        {
            Ok(activation) => {
                for dropped in &activation.dropped {
                    report.diagnostics.push(Diagnostic::new(
                        &dropped.type_name,
                        Stage::Activation,
                        &dropped.reason,
                    ));
                }
                report.generation = Some(activation.generation);
                self.set_state(LifecycleState::Active);

                if let Some(archive) = &self.archive {
                    if let Err(e) = archive.record(&snapshot) {
                        warn!(error = %e, "failed to archive schema snapshot");
                    }
                }

                if let Some(grants) = &self.grants {
                    let live: HashSet<String> = activation.activated.iter().cloned().collect();
                    let sync = grants.synchronize(&snapshot, &live);
                    for (signature, error) in &sync.failed {
                        report
                            .diagnostics
                            .push(Diagnostic::new(signature, Stage::Grants, error));
                    }
                    report.grants = sync;
                }
            }
            Err(e) => {
                warn!(error = %e, "activation failed");
                match e {
                    ActivationError::Rejected(failures) => {
                        report.diagnostics.extend(failures.into_iter().map(|f| {
                            Diagnostic::new(f.type_name, Stage::Activation, f.reason)
                        }));
                    }
                    cancelled @ ActivationError::Cancelled => {
                        report
                            .diagnostics
                            .push(Diagnostic::new("*", Stage::Activation, cancelled.to_string()));
                    }
                }
                self.set_state(self.resting_state());
            }
        }

        report.state = self.state();
        info!(
            version = report.version,
            units = report.units.len(),
            excluded = report.excluded.len(),
            diagnostics = report.diagnostics.len(),
            generation = ?report.generation,
            "reload pass finished"
        );
        report
    }

    /// Emit every schema-defined type of `snapshot`.
    ///
    /// Types that fail are excluded and emission is repeated until no new
    /// failure appears, so no unit keeps a relationship to an excluded type.
    fn emit_all(&self, snapshot: &SchemaSnapshot) -> Emission {
        let resolver = TypeResolver::new(snapshot, &self.builtins, self.license.as_ref(), &self.cache);
        let mut diagnostics = Vec::new();
        let mut excluded = HashSet::new();

        for ty in snapshot.types.values().filter(|t| !t.is_builtin) {
            let supertype = ty
                .extends
                .as_deref()
                .map(clean_type_name)
                .map(|raw| resolver.lookup(raw).unwrap_or_else(|| raw.to_string()));
            let unlicensed = resolver.check_licensed(supertype.as_deref(), &resolver.contracts_of(ty));
            if !unlicensed.is_empty() {
                let e = crate::error::SchemaError::Unlicensed {
                    type_name: ty.name.clone(),
                    unlicensed,
                };
                warn!(type_name = %ty.name, error = %e, "excluding unlicensed type");
                diagnostics.push(Diagnostic::new(&ty.name, Stage::Licensing, e.to_string()));
                excluded.insert(ty.name.clone());
            }
        }

        let (order, cyclic) = resolver.hierarchy_order();
        for (type_name, e) in cyclic {
            warn!(type_name = %type_name, error = %e, "excluding type");
            diagnostics.push(Diagnostic::new(&type_name, Stage::Emission, e.to_string()));
            excluded.insert(type_name);
        }

        let emitter = SourceEmitter::new(&resolver, &self.registry).with_extensions(&self.extensions);

        loop {
            let mut emitted = HashSet::new();
            let mut units = Vec::new();
            let mut updates = Vec::new();
            let mut failed: Vec<(String, Stage, String)> = Vec::new();

            let mut queue: Vec<&str> = order
                .iter()
                .map(String::as_str)
                .filter(|name| !excluded.contains(*name))
                .collect();

            while !queue.is_empty() {
                let mut deferred = Vec::new();
                let mut progress = false;

                for name in queue {
                    let Some(ty) = snapshot.get_type(name) else {
                        continue;
                    };
                    match emitter.emit(ty, &emitted, &excluded) {
                        Ok(EmitOutcome::Emitted { unit, updates: u }) => {
                            emitted.insert(name.to_string());
                            units.push(unit);
                            updates.extend(u);
                            progress = true;
                        }
                        Ok(EmitOutcome::Deferred { waiting_for }) => {
                            if excluded.contains(&waiting_for)
                                || failed.iter().any(|(f, _, _)| *f == waiting_for)
                            {
                                failed.push((
                                    name.to_string(),
                                    Stage::Emission,
                                    format!("depends on excluded type {waiting_for}"),
                                ));
                            } else {
                                deferred.push((name, waiting_for));
                            }
                        }
                        Err(e) => failed.push((name.to_string(), Stage::Emission, e.to_string())),
                    }
                }

                // Nothing else can resolve in this pass.
                if !progress {
                    for (name, waiting_for) in deferred {
                        failed.push((
                            name.to_string(),
                            Stage::Deferred,
                            format!("deferred to the next pass, waiting for {waiting_for}"),
                        ));
                    }
                    break;
                }
                queue = deferred.into_iter().map(|(name, _)| name).collect();
            }

            if failed.is_empty() {
                return Emission {
                    units,
                    updates,
                    excluded,
                    diagnostics,
                };
            }

            for (type_name, stage, message) in failed {
                if stage == Stage::Deferred {
                    info!(type_name = %type_name, reason = %message, "type deferred");
                } else {
                    warn!(type_name = %type_name, error = %message, "type not emitted");
                }
                diagnostics.push(Diagnostic::new(&type_name, stage, message));
                excluded.insert(type_name);
            }
        }
    }
}
