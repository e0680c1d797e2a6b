//! Persistent grant storage.
//!
//! Persists access grants using sled.

use super::{AccessGrant, GrantError, GrantResult, GrantStore};

const GRANT_TREE_NAME: &[u8] = b"schema:grants";

/// Grant store backed by a sled tree, one JSON value per signature.
pub struct SledGrantStore {
    tree: sled::Tree,
}

impl SledGrantStore {
    /// Open the grant store.
    pub fn open(db: &sled::Db) -> GrantResult<Self> {
        let tree = db
            .open_tree(GRANT_TREE_NAME)
            .map_err(|e| GrantError::Storage(e.into()))?;
        Ok(Self { tree })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> GrantResult<()> {
        self.tree
            .flush()
            .map_err(|e| GrantError::Storage(e.into()))?;
        Ok(())
    }

    fn serialize_grant(grant: &AccessGrant) -> GrantResult<Vec<u8>> {
        serde_json::to_vec(grant).map_err(|e| GrantError::Serialization(e.to_string()))
    }

    fn deserialize_grant(bytes: &[u8]) -> GrantResult<AccessGrant> {
        serde_json::from_slice(bytes).map_err(|e| GrantError::Deserialization(e.to_string()))
    }
}

impl GrantStore for SledGrantStore {
    fn get(&self, signature: &str) -> GrantResult<Option<AccessGrant>> {
        self.tree
            .get(signature.as_bytes())
            .map_err(|e| GrantError::Storage(e.into()))?
            .map(|bytes| Self::deserialize_grant(&bytes))
            .transpose()
    }

    fn put(&self, grant: &AccessGrant) -> GrantResult<()> {
        let value = Self::serialize_grant(grant)?;
        self.tree
            .insert(grant.signature.as_bytes(), value)
            .map_err(|e| GrantError::Storage(e.into()))?;
        Ok(())
    }

    fn remove(&self, signature: &str) -> GrantResult<bool> {
        let removed = self
            .tree
            .remove(signature.as_bytes())
            .map_err(|e| GrantError::Storage(e.into()))?;
        Ok(removed.is_some())
    }

    fn list(&self) -> GrantResult<Vec<AccessGrant>> {
        let mut grants = Vec::new();
        for result in self.tree.iter() {
            let (_, value) = result.map_err(|e| GrantError::Storage(e.into()))?;
            grants.push(Self::deserialize_grant(&value)?);
        }
        Ok(grants)
    }
}
