//! Legacy inline definitions.
//!
//! Older schemas kept methods, views and properties as scalar keys on the
//! type node itself: `___name` for a method, `__name` for a view and `_name`
//! for a property. Each key is turned into a first-class definition once and
//! then removed from the type.

use crate::catalog::{MethodDef, SchemaSnapshot, ViewDef};
use crate::error::{Error, SchemaError};
use crate::parser::RawPropertySpec;
use crate::store::SchemaStore;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static MEMBER_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid member separator pattern"));

/// Kind of definition a legacy key encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKind {
    /// `___name`
    Method,
    /// `__name`
    View,
    /// `_name`
    Property,
}

impl LegacyKind {
    /// Split a legacy key into its kind and definition name.
    pub fn classify(key: &str) -> Option<(Self, &str)> {
        let (kind, name) = if let Some(name) = key.strip_prefix("___") {
            (LegacyKind::Method, name)
        } else if let Some(name) = key.strip_prefix("__") {
            (LegacyKind::View, name)
        } else if let Some(name) = key.strip_prefix('_') {
            (LegacyKind::Property, name)
        } else {
            return None;
        };
        (!name.is_empty()).then_some((kind, name))
    }
}

/// Outcome of one migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Migrated keys as `(type, key)`.
    pub migrated: Vec<(String, String)>,
    /// Keys kept because a first-class definition of the same name exists.
    pub skipped: Vec<(String, String)>,
    /// Keys kept because they could not be parsed.
    pub failed: Vec<(String, String, String)>,
}

impl MigrationReport {
    /// Whether the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.migrated.is_empty()
    }
}

/// Split a legacy view member list into property names.
pub fn parse_view_members(raw: &str) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();
    for part in MEMBER_SEPARATOR.split(raw) {
        let name = part.trim_start_matches('_');
        let name = name.strip_suffix("Property").unwrap_or(name);
        if !name.is_empty() && !members.iter().any(|m| m == name) {
            members.push(name.to_string());
        }
    }
    members
}

/// Moves legacy inline keys into first-class definitions.
pub struct LegacyMigrator<'s> {
    store: &'s dyn SchemaStore,
}

impl<'s> LegacyMigrator<'s> {
    /// Create a migrator over `store`.
    pub fn new(store: &'s dyn SchemaStore) -> Self {
        Self { store }
    }

    /// Migrate every legacy key of every type.
    pub fn run(&self) -> Result<MigrationReport, Error> {
        let snapshot = self.store.snapshot()?;
        let mut report = MigrationReport::default();

        for ty in snapshot.types.values() {
            for (key, value) in &ty.legacy {
                let Some((kind, name)) = LegacyKind::classify(key) else {
                    continue;
                };

                if Self::has_first_class(&snapshot, &ty.name, kind, name) {
                    debug!(type_name = %ty.name, key = %key, "legacy key shadowed, keeping it");
                    report.skipped.push((ty.name.clone(), key.clone()));
                    continue;
                }

                match self.migrate_one(&ty.name, kind, name, value) {
                    Ok(()) => {
                        self.store.remove_legacy_key(&ty.name, key)?;
                        report.migrated.push((ty.name.clone(), key.clone()));
                    }
                    Err(Error::Schema(e)) => {
                        warn!(type_name = %ty.name, key = %key, error = %e, "legacy key not migrated");
                        report
                            .failed
                            .push((ty.name.clone(), key.clone(), e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if !report.is_noop() {
            info!(
                migrated = report.migrated.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "legacy schema keys migrated"
            );
        }
        Ok(report)
    }

    fn has_first_class(snapshot: &SchemaSnapshot, owner: &str, kind: LegacyKind, name: &str) -> bool {
        match kind {
            LegacyKind::Method => snapshot.methods_of(owner).iter().any(|m| m.name == name),
            LegacyKind::View => snapshot.views_of(owner).iter().any(|v| v.name == name),
            LegacyKind::Property => snapshot.properties_of(owner).iter().any(|p| p.name == name),
        }
    }

    fn migrate_one(&self, owner: &str, kind: LegacyKind, name: &str, value: &str) -> Result<(), Error> {
        match kind {
            LegacyKind::Method => {
                self.store
                    .put_method(MethodDef::new(name, value).owned_by(owner))?;
            }
            LegacyKind::View => {
                let members = parse_view_members(value);
                if members.is_empty() {
                    return Err(SchemaError::InvalidPropertySchema {
                        type_name: owner.to_string(),
                        property: name.to_string(),
                        reason: "legacy view has no members".to_string(),
                    }
                    .into());
                }
                let view = members
                    .into_iter()
                    .fold(ViewDef::new(name).owned_by(owner), ViewDef::with_member);
                self.store.put_view(view)?;
            }
            LegacyKind::Property => {
                let spec = RawPropertySpec::parse(owner, name, value)?;
                self.store.put_property(spec.into_property(owner, name))?;
            }
        }
        Ok(())
    }
}
