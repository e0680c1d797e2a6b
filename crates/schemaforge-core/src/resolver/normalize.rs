//! Entity name normalisation and the per-pass lookup cache.

use crate::catalog::naming::{singularize, upper_first};
use dashmap::DashMap;

/// Normalise a user-facing entity name to its singular UpperCamel form.
///
/// `customers` becomes `Customer`, `order_items` becomes `OrderItem`, and
/// `/`-separated paths are normalised segment by segment.
pub fn normalize_entity_name(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains('/') {
        return raw
            .split('/')
            .map(normalize_entity_name)
            .collect::<Vec<_>>()
            .join("/");
    }

    let fragments: Vec<&str> = raw.split(['_', '-']).filter(|f| !f.is_empty()).collect();
    match fragments.split_last() {
        Some((last, head)) => {
            let mut out: String = head.iter().map(|f| upper_first(f)).collect();
            out.push_str(&upper_first(&singularize(last)));
            out
        }
        None => String::new(),
    }
}

/// Memoised raw-name lookups, cleared at the start of every resolving phase.
#[derive(Debug, Default)]
pub struct NameCache {
    entries: DashMap<String, String>,
}

impl NameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resolution of `raw`.
    pub fn get(&self, raw: &str) -> Option<String> {
        self.entries.get(raw).map(|entry| entry.value().clone())
    }

    /// Remember a successful resolution.
    pub fn insert(&self, raw: impl Into<String>, resolved: impl Into<String>) {
        self.entries.insert(raw.into(), resolved.into());
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
