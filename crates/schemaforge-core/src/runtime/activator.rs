//! Activation contract between the compiler and the runtime.

use crate::emitter::CompilationUnit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Shared cancellation flag for an activation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag for the next activation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Why a unit could not be activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// Type name of the unit.
    pub type_name: String,
    /// Reason.
    pub reason: String,
}

impl UnitFailure {
    /// Create a failure record.
    pub fn new(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.reason)
    }
}

/// Errors returned by an activation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// Cancelled before the new generation was installed.
    #[error("activation cancelled")]
    Cancelled,

    /// At least one unit failed and activation was not forced.
    #[error("activation rejected, {} unit(s) failed", .0.len())]
    Rejected(Vec<UnitFailure>),
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Number of the installed generation.
    pub generation: u64,
    /// Activated type names.
    pub activated: Vec<String>,
    /// Units left out of a forced activation.
    pub dropped: Vec<UnitFailure>,
}

/// Runtime able to activate a batch of compilation units.
pub trait Activator: Send + Sync {
    /// Whether a generation has been activated.
    fn is_initialized(&self) -> bool;

    /// Activate `units` as the new complete set of schema-defined types.
    ///
    /// With `force`, failing units are dropped and the rest activated;
    /// otherwise any failure rejects the batch and the previous generation
    /// stays in place.
    fn activate(
        &self,
        units: Vec<CompilationUnit>,
        force: bool,
        cancel: &CancelFlag,
    ) -> Result<ActivationReport, ActivationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        other.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_rejected_display() {
        let err = ActivationError::Rejected(vec![UnitFailure::new("Order", "missing supertype")]);
        assert_eq!(err.to_string(), "activation rejected, 1 unit(s) failed");
    }
}
