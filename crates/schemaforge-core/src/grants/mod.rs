//! Dynamic access grants.
//!
//! Every schema-defined type and every relationship endpoint owns a fixed set
//! of companion grant records. The synchronizer creates them when a type or
//! relationship appears and removes them, and only them, when it goes away.

mod error;
mod sled_store;
mod store;
mod sync;

pub use error::{GrantError, GrantResult};
pub use sled_store::SledGrantStore;
pub use store::{AccessGrant, GrantStore, MemoryGrantStore};
pub use sync::{companion_signatures, GrantSynchronizer, SyncReport};
