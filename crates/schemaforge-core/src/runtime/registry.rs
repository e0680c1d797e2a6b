//! Type descriptor registry.

use super::activator::{ActivationError, ActivationReport, Activator, CancelFlag, UnitFailure};
use super::generation::Generation;
use super::validate::{NamedValidator, ValidatorSet};
use crate::catalog::BASE_TYPE;
use crate::emitter::{CompilationUnit, SupertypeOrigin, TypeDescriptor};
use crate::resolver::BuiltinCatalog;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Holds the active [`Generation`] and swaps in new ones on activation.
pub struct DescriptorRegistry {
    builtins: BuiltinCatalog,
    current: RwLock<Arc<Generation>>,
    validators: Arc<ValidatorSet>,
    next_generation: AtomicU64,
    initialized: AtomicBool,
}

impl DescriptorRegistry {
    /// Create a registry with an empty generation 0.
    pub fn new(builtins: BuiltinCatalog) -> Self {
        let validators = Arc::new(ValidatorSet::new());
        Self {
            builtins,
            current: RwLock::new(Arc::new(Generation::new(0, BTreeMap::new(), Arc::clone(&validators)))),
            validators,
            next_generation: AtomicU64::new(1),
            initialized: AtomicBool::new(false),
        }
    }

    /// The active generation.
    pub fn current(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read())
    }

    /// Register a validator referenced by name from property definitions.
    pub fn register_validator(&self, name: impl Into<String>, validator: Arc<dyn NamedValidator>) {
        self.validators.register(name, validator);
    }

    fn known(&self, name: &str, batch: &HashSet<&str>) -> bool {
        name == BASE_TYPE || batch.contains(name) || self.builtins.contains_type(name)
    }

    /// First reason `descriptor` cannot be activated alongside `batch`.
    fn check_unit(&self, d: &TypeDescriptor, batch: &HashSet<&str>) -> Option<String> {
        let supertype_ok = match d.supertype_origin {
            SupertypeOrigin::Base => true,
            SupertypeOrigin::Builtin => self.builtins.contains_type(&d.supertype),
            SupertypeOrigin::Dynamic => batch.contains(d.supertype.as_str()),
        };
        if !supertype_ok {
            return Some(format!("supertype {} is not available", d.supertype));
        }
        if let Some(contract) = d.contracts.iter().find(|c| !self.known(c, batch)) {
            return Some(format!("contract {contract} is not available"));
        }
        if let Some(target) = d.related_types().into_iter().find(|t| !self.known(t, batch)) {
            return Some(format!("relationship target {target} is not available"));
        }
        None
    }
}

impl Activator for DescriptorRegistry {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn activate(
        &self,
        units: Vec<CompilationUnit>,
        force: bool,
        cancel: &CancelFlag,
    ) -> Result<ActivationReport, ActivationError> {
        if cancel.is_cancelled() {
            return Err(ActivationError::Cancelled);
        }

        let mut failures = Vec::new();
        let mut candidates: BTreeMap<String, CompilationUnit> = BTreeMap::new();
        for unit in units {
            if candidates.contains_key(&unit.type_name) {
                failures.push(UnitFailure::new(&unit.type_name, "duplicate unit"));
                continue;
            }
            candidates.insert(unit.type_name.clone(), unit);
        }
        if !failures.is_empty() && !force {
            return Err(ActivationError::Rejected(failures));
        }

        // Dropping a unit can break units depending on it, so iterate.
        loop {
            let batch: HashSet<&str> = candidates.keys().map(String::as_str).collect();
            let failing: Vec<UnitFailure> = candidates
                .values()
                .filter_map(|u| {
                    self.check_unit(&u.descriptor, &batch)
                        .map(|reason| UnitFailure::new(&u.type_name, reason))
                })
                .collect();
            if failing.is_empty() {
                break;
            }
            if !force {
                failures.extend(failing);
                return Err(ActivationError::Rejected(failures));
            }
            for failure in failing {
                warn!(type_name = %failure.type_name, reason = %failure.reason, "dropping unit from forced activation");
                candidates.remove(&failure.type_name);
                failures.push(failure);
            }
        }

        if cancel.is_cancelled() {
            return Err(ActivationError::Cancelled);
        }

        let number = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let activated: Vec<String> = candidates.keys().cloned().collect();
        let generation = Generation::new(number, candidates, Arc::clone(&self.validators));
        *self.current.write() = Arc::new(generation);
        self.initialized.store(true, Ordering::SeqCst);

        info!(generation = number, types = activated.len(), dropped = failures.len(), "generation activated");
        Ok(ActivationReport {
            generation: number,
            activated,
            dropped: failures,
        })
    }
}
