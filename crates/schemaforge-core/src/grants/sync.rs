//! Grant synchronisation.

use super::{AccessGrant, GrantResult, GrantStore};
use crate::catalog::SchemaSnapshot;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The three companion signatures of a resource: itself, its schema
/// resource and its UI resource.
pub fn companion_signatures(signature: &str) -> [String; 3] {
    [
        signature.to_string(),
        format!("_schema/{signature}"),
        format!("{signature}/_Ui"),
    ]
}

/// Resource a companion signature guards: `_schema/X` and `X/_Ui` both
/// belong to `X`.
fn resource_of(signature: &str) -> &str {
    let signature = signature.strip_prefix("_schema/").unwrap_or(signature);
    signature.strip_suffix("/_Ui").unwrap_or(signature)
}

/// What one synchronisation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Signatures created.
    pub created: Vec<String>,
    /// Signatures removed.
    pub removed: Vec<String>,
    /// Signatures that could not be handled, with the error.
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    /// Whether anything was written.
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }
}

/// Keeps the dynamic grants in step with the live schema.
#[derive(Clone)]
pub struct GrantSynchronizer {
    store: Arc<dyn GrantStore>,
}

impl GrantSynchronizer {
    /// Create a synchronizer over `store`.
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    /// Create the companions of `signature` that do not exist yet.
    ///
    /// Returns the created signatures.
    pub fn ensure(&self, signature: &str) -> GrantResult<Vec<String>> {
        let mut created = Vec::new();
        for companion in companion_signatures(signature) {
            if self.store.get(&companion)?.is_none() {
                self.store.put(&AccessGrant::dynamic(&companion))?;
                debug!(signature = %companion, "created dynamic grant");
                created.push(companion);
            }
        }
        Ok(created)
    }

    /// Remove the dynamic companions of `signature`.
    ///
    /// Grants not marked dynamic are left alone. Returns the removed
    /// signatures.
    pub fn remove(&self, signature: &str) -> GrantResult<Vec<String>> {
        let mut removed = Vec::new();
        for companion in companion_signatures(signature) {
            let dynamic = self.store.get(&companion)?.is_some_and(|g| g.dynamic);
            if dynamic && self.store.remove(&companion)? {
                debug!(signature = %companion, "removed dynamic grant");
                removed.push(companion);
            }
        }
        Ok(removed)
    }

    /// Remove every dynamic grant no longer backed by the live schema.
    ///
    /// Type grants go when a type segment is not in `live_types`; segments
    /// starting with `_` are not type names. Relationship grants go when
    /// their relationship is not among the expected signatures of
    /// `snapshot`. Nothing is written when the grants already match.
    pub fn reconcile(&self, snapshot: &SchemaSnapshot, live_types: &HashSet<String>) -> GrantResult<Vec<String>> {
        let expected: HashSet<String> = Self::expected_signatures(snapshot, live_types).into_iter().collect();
        let stale: Vec<String> = self
            .store
            .list()?
            .into_iter()
            .filter(|grant| grant.dynamic)
            .filter(|grant| {
                let resource = resource_of(&grant.signature);
                let dead_type = resource
                    .split('/')
                    .filter(|segment| !segment.is_empty() && !segment.starts_with('_'))
                    .any(|segment| !live_types.contains(segment));
                let dead_relationship = resource.contains('/') && !expected.contains(resource);
                dead_type || dead_relationship
            })
            .map(|grant| grant.signature)
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for signature in stale {
            if self.store.remove(&signature)? {
                debug!(signature = %signature, "removed stale dynamic grant");
                removed.push(signature);
            }
        }
        Ok(removed)
    }

    /// Signatures the live part of `snapshot` should have grants for: each
    /// live type plus both endpoints of every relationship between live types.
    pub fn expected_signatures(snapshot: &SchemaSnapshot, live_types: &HashSet<String>) -> Vec<String> {
        let mut signatures: Vec<String> = snapshot
            .types
            .values()
            .filter(|ty| !ty.is_builtin && live_types.contains(&ty.name))
            .map(|ty| ty.resource_signature().to_string())
            .collect();

        for rel in &snapshot.relationships {
            if rel.is_builtin
                || !live_types.contains(&rel.source_type)
                || !live_types.contains(&rel.target_type)
            {
                continue;
            }
            signatures.push(rel.resource_signature());
            signatures.push(rel.inverse_resource_signature());
        }
        signatures
    }

    /// Ensure grants for everything live in `snapshot`, then drop stale ones.
    ///
    /// Store failures are logged and reported; the next pass retries them.
    pub fn synchronize(&self, snapshot: &SchemaSnapshot, live_types: &HashSet<String>) -> SyncReport {
        let mut report = SyncReport::default();

        for signature in Self::expected_signatures(snapshot, live_types) {
            match self.ensure(&signature) {
                Ok(created) => report.created.extend(created),
                Err(e) => {
                    warn!(signature = %signature, error = %e, "failed to create grants");
                    report.failed.push((signature, e.to_string()));
                }
            }
        }

        match self.reconcile(snapshot, live_types) {
            Ok(removed) => report.removed = removed,
            Err(e) => {
                warn!(error = %e, "failed to reconcile grants");
                report.failed.push(("*".to_string(), e.to_string()));
            }
        }

        if report.changed() {
            info!(
                created = report.created.len(),
                removed = report.removed.len(),
                "access grants synchronised"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RelationshipDef, TypeDef};
    use crate::grants::MemoryGrantStore;

    fn synchronizer() -> GrantSynchronizer {
        GrantSynchronizer::new(Arc::new(MemoryGrantStore::new()))
    }

    fn live(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let sync = synchronizer();

        let created = sync.ensure("Customer").unwrap();
        assert_eq!(created, vec!["Customer", "_schema/Customer", "Customer/_Ui"]);
        assert!(sync.ensure("Customer").unwrap().is_empty());
    }

    #[test]
    fn test_remove_leaves_fixed_grants() {
        let sync = synchronizer();
        sync.ensure("Customer").unwrap();
        sync.ensure("Order").unwrap();
        sync.store().put(&AccessGrant::fixed("_schema/Customer", 7)).unwrap();

        let removed = sync.remove("Customer").unwrap();
        assert_eq!(removed, vec!["Customer", "Customer/_Ui"]);
        assert_eq!(sync.store().list().unwrap().len(), 4);
    }

    fn shop() -> SchemaSnapshot {
        SchemaSnapshot::new(1)
            .with_type(TypeDef::new("Customer"))
            .with_type(TypeDef::new("Order"))
            .with_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
    }

    fn sorted(mut signatures: Vec<String>) -> Vec<String> {
        signatures.sort();
        signatures
    }

    #[test]
    fn test_resource_of() {
        assert_eq!(resource_of("Customer"), "Customer");
        assert_eq!(resource_of("_schema/Customer"), "Customer");
        assert_eq!(resource_of("Customer/_Ui"), "Customer");
        assert_eq!(resource_of("_schema/Customer/_Orders"), "Customer/_Orders");
        assert_eq!(resource_of("Customer/_Orders/_Ui"), "Customer/_Orders");
    }

    #[test]
    fn test_reconcile() {
        let sync = synchronizer();
        sync.ensure("Customer").unwrap();
        sync.ensure("Order").unwrap();
        sync.ensure("Customer/_Orders").unwrap();
        sync.store().put(&AccessGrant::fixed("Legacy", 1)).unwrap();

        let removed = sync.reconcile(&shop(), &live(&["Customer"])).unwrap();
        assert_eq!(
            sorted(removed),
            vec![
                "Customer/_Orders",
                "Customer/_Orders/_Ui",
                "Order",
                "Order/_Ui",
                "_schema/Customer/_Orders",
                "_schema/Order",
            ]
        );
        assert!(sync.store().get("Customer").unwrap().is_some());
        assert!(sync.store().get("Legacy").unwrap().is_some());

        assert!(sync.reconcile(&shop(), &live(&["Customer"])).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_drops_deleted_relationship() {
        let sync = synchronizer();
        let both = live(&["Customer", "Order"]);
        sync.synchronize(&shop(), &both);

        let unrelated = SchemaSnapshot::new(2)
            .with_type(TypeDef::new("Customer"))
            .with_type(TypeDef::new("Order"));
        let removed = sync.reconcile(&unrelated, &both).unwrap();
        assert_eq!(
            sorted(removed),
            vec![
                "Customer/_Orders",
                "Customer/_Orders/_Ui",
                "Order/_Customer",
                "Order/_Customer/_Ui",
                "_schema/Customer/_Orders",
                "_schema/Order/_Customer",
            ]
        );
        assert_eq!(sync.store().list().unwrap().len(), 6);
    }

    #[test]
    fn test_synchronize_snapshot() {
        let sync = synchronizer();
        let snapshot = shop();

        let report = sync.synchronize(&snapshot, &live(&["Customer", "Order"]));
        assert_eq!(report.created.len(), 12);
        assert!(sync.store().get("Customer/_Orders").unwrap().is_some());
        assert!(sync.store().get("Order/_Customer/_Ui").unwrap().is_some());

        let report = sync.synchronize(&snapshot, &live(&["Customer"]));
        assert!(report.created.is_empty());
        assert_eq!(report.removed.len(), 9);
        assert!(sync.store().get("Customer/_Orders").unwrap().is_none());
        assert_eq!(
            sorted(sync.store().list().unwrap().into_iter().map(|g| g.signature).collect()),
            vec!["Customer", "Customer/_Ui", "_schema/Customer"]
        );
    }
}
