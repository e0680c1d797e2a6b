//! Runtime side of the compile/reload hook.
//!
//! The compiler hands emitted units to an [`Activator`]. The provided
//! [`DescriptorRegistry`] checks them, builds a new [`Generation`] and swaps it
//! in atomically; readers keep the `Arc<Generation>` they obtained until they
//! drop it. Objects are [`DynamicObject`] property bags interpreted against
//! the active generation.

mod activator;
mod generation;
mod object;
mod registry;
mod validate;

pub use activator::{ActivationError, ActivationReport, Activator, CancelFlag, UnitFailure};
pub use generation::{ActionRunner, Generation, InvocationError};
pub use object::DynamicObject;
pub use registry::DescriptorRegistry;
pub use validate::{NamedValidator, ValidationFailure, ValidatorSet};
