//! Grant records and their storage.

use super::GrantResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Access grant for one resource signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Resource signature, e.g. `Customer`, `_schema/Customer` or
    /// `Customer/_Orders`.
    pub signature: String,
    /// Permission bitset.
    #[serde(default)]
    pub flags: u64,
    /// Created by the synchronizer rather than by an administrator.
    #[serde(default)]
    pub dynamic: bool,
}

impl AccessGrant {
    /// A synchronizer-owned grant with no permissions.
    pub fn dynamic(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            flags: 0,
            dynamic: true,
        }
    }

    /// An administrator-owned grant.
    pub fn fixed(signature: impl Into<String>, flags: u64) -> Self {
        Self {
            signature: signature.into(),
            flags,
            dynamic: false,
        }
    }
}

/// Persistence for access grants, keyed by signature.
pub trait GrantStore: Send + Sync {
    /// Get a grant by signature.
    fn get(&self, signature: &str) -> GrantResult<Option<AccessGrant>>;

    /// Create or replace a grant.
    fn put(&self, grant: &AccessGrant) -> GrantResult<()>;

    /// Remove a grant. Returns whether it existed.
    fn remove(&self, signature: &str) -> GrantResult<bool>;

    /// All grants, ordered by signature.
    fn list(&self) -> GrantResult<Vec<AccessGrant>>;
}

/// Grant store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    grants: RwLock<BTreeMap<String, AccessGrant>>,
}

impl MemoryGrantStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantStore for MemoryGrantStore {
    fn get(&self, signature: &str) -> GrantResult<Option<AccessGrant>> {
        Ok(self.grants.read().get(signature).cloned())
    }

    fn put(&self, grant: &AccessGrant) -> GrantResult<()> {
        self.grants
            .write()
            .insert(grant.signature.clone(), grant.clone());
        Ok(())
    }

    fn remove(&self, signature: &str) -> GrantResult<bool> {
        Ok(self.grants.write().remove(signature).is_some())
    }

    fn list(&self) -> GrantResult<Vec<AccessGrant>> {
        Ok(self.grants.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryGrantStore::new();
        store.put(&AccessGrant::dynamic("Customer")).unwrap();
        store.put(&AccessGrant::fixed("Admin", 0xff)).unwrap();

        assert_eq!(store.get("Customer").unwrap().map(|g| g.dynamic), Some(true));
        assert_eq!(store.list().unwrap().len(), 2);
        assert!(store.remove("Customer").unwrap());
        assert!(!store.remove("Customer").unwrap());
        assert_eq!(store.list().unwrap()[0].signature, "Admin");
    }
}
