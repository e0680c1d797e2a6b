//! Relationship definitions between types.

use super::naming::{lower_camel_token, lower_first, pluralize, upper_first};
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::HashSet;

/// Cardinality of one relationship endpoint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
pub enum Multiplicity {
    /// At most one related object.
    #[serde(rename = "1")]
    One,
    /// A collection of related objects.
    #[serde(rename = "*")]
    Many,
}

impl Multiplicity {
    /// Parse the stored `1` / `*` token.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "1" => Some(Multiplicity::One),
            "*" => Some(Multiplicity::Many),
            _ => None,
        }
    }

    /// Stored token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Multiplicity::One => "1",
            Multiplicity::Many => "*",
        }
    }

    /// Check if this endpoint is a collection.
    pub fn is_collection(&self) -> bool {
        matches!(self, Multiplicity::Many)
    }
}

impl std::fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cascading delete policy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
pub enum CascadeDelete {
    /// Never cascade.
    #[default]
    None,
    /// Deleting the source deletes the target.
    SourceToTarget,
    /// Deleting the target deletes the source.
    TargetToSource,
    /// Cascade in both directions.
    Always,
    /// Cascade only when the remaining object would violate a constraint.
    ConstraintBased,
}

/// Which end of a relationship a derived property lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Property on the source type, pointing at the target.
    Outgoing,
    /// Property on the target type, pointing back at the source.
    Incoming,
}

/// A relationship definition between two types.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct RelationshipDef {
    /// Store-assigned identifier (0 until persisted).
    #[serde(default)]
    pub id: u64,
    /// Source type name.
    pub source_type: String,
    /// Target type name.
    pub target_type: String,
    /// Relationship type token (e.g. `OWNS`).
    pub relationship_type: String,
    /// Name of the property on the target type.
    #[serde(default)]
    pub source_json_name: Option<String>,
    /// Previous name of the property on the target type.
    #[serde(default)]
    pub previous_source_json_name: Option<String>,
    /// Name of the property on the source type.
    #[serde(default)]
    pub target_json_name: Option<String>,
    /// Previous name of the property on the source type.
    #[serde(default)]
    pub previous_target_json_name: Option<String>,
    /// Multiplicity at the source end.
    pub source_multiplicity: Multiplicity,
    /// Multiplicity at the target end.
    pub target_multiplicity: Multiplicity,
    /// Cascading delete policy.
    #[serde(default)]
    pub cascade_delete: CascadeDelete,
    /// Part of the built-in schema.
    #[serde(default)]
    pub is_builtin: bool,
}

impl RelationshipDef {
    /// Create a relationship with explicit multiplicities.
    pub fn new(
        source_type: impl Into<String>,
        relationship_type: impl Into<String>,
        target_type: impl Into<String>,
        source_multiplicity: Multiplicity,
        target_multiplicity: Multiplicity,
    ) -> Self {
        Self {
            id: 0,
            source_type: source_type.into(),
            target_type: target_type.into(),
            relationship_type: relationship_type.into(),
            source_json_name: None,
            previous_source_json_name: None,
            target_json_name: None,
            previous_target_json_name: None,
            source_multiplicity,
            target_multiplicity,
            cascade_delete: CascadeDelete::None,
            is_builtin: false,
        }
    }

    /// Create a one-to-many relationship (one source, many targets).
    pub fn one_to_many(
        source_type: impl Into<String>,
        relationship_type: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self::new(
            source_type,
            relationship_type,
            target_type,
            Multiplicity::One,
            Multiplicity::Many,
        )
    }

    /// Create a one-to-one relationship.
    pub fn one_to_one(
        source_type: impl Into<String>,
        relationship_type: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self::new(
            source_type,
            relationship_type,
            target_type,
            Multiplicity::One,
            Multiplicity::One,
        )
    }

    /// Create a many-to-many relationship.
    pub fn many_to_many(
        source_type: impl Into<String>,
        relationship_type: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self::new(
            source_type,
            relationship_type,
            target_type,
            Multiplicity::Many,
            Multiplicity::Many,
        )
    }

    /// Set the property name on the source type.
    pub fn with_target_json_name(mut self, name: impl Into<String>) -> Self {
        self.target_json_name = Some(name.into());
        self
    }

    /// Set the property name on the target type.
    pub fn with_source_json_name(mut self, name: impl Into<String>) -> Self {
        self.source_json_name = Some(name.into());
        self
    }

    /// Set the cascading delete policy.
    pub fn with_cascade(mut self, cascade: CascadeDelete) -> Self {
        self.cascade_delete = cascade;
        self
    }

    /// Mark as part of the built-in schema.
    pub fn with_builtin(mut self) -> Self {
        self.is_builtin = true;
        self
    }

    /// Rename the property on the given end, remembering the old name.
    pub fn rename(&mut self, direction: Direction, new_name: impl Into<String>) {
        let new_name = new_name.into();
        match direction {
            Direction::Outgoing => {
                let old = self.target_json_name.replace(new_name);
                self.previous_target_json_name = Some(old.unwrap_or_else(|| {
                    self.default_property_name(Direction::Outgoing)
                }));
            }
            Direction::Incoming => {
                let old = self.source_json_name.replace(new_name);
                self.previous_source_json_name = Some(old.unwrap_or_else(|| {
                    self.default_property_name(Direction::Incoming)
                }));
            }
        }
    }

    /// Check whether the given type is an endpoint.
    pub fn touches(&self, type_name: &str) -> bool {
        self.source_type == type_name || self.target_type == type_name
    }

    /// Type on the far side of the property living on `direction`'s end.
    pub fn related_type(&self, direction: Direction) -> &str {
        match direction {
            Direction::Outgoing => &self.target_type,
            Direction::Incoming => &self.source_type,
        }
    }

    /// Type owning the property for `direction`.
    pub fn owner_type(&self, direction: Direction) -> &str {
        match direction {
            Direction::Outgoing => &self.source_type,
            Direction::Incoming => &self.target_type,
        }
    }

    /// Multiplicity of the derived property for `direction`.
    pub fn multiplicity(&self, direction: Direction) -> Multiplicity {
        match direction {
            Direction::Outgoing => self.target_multiplicity,
            Direction::Incoming => self.source_multiplicity,
        }
    }

    /// Explicitly configured property name for `direction`.
    pub fn explicit_name(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Outgoing => self.target_json_name.as_deref(),
            Direction::Incoming => self.source_json_name.as_deref(),
        }
    }

    /// Previous property name for `direction`, kept across renames.
    pub fn previous_name(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Outgoing => self.previous_target_json_name.as_deref(),
            Direction::Incoming => self.previous_source_json_name.as_deref(),
        }
    }

    /// Name derived from the related type and multiplicity alone.
    pub fn default_property_name(&self, direction: Direction) -> String {
        let base = lower_first(self.related_type(direction));
        if self.multiplicity(direction).is_collection() {
            pluralize(&base)
        } else {
            base
        }
    }

    /// Name of the derived property, without disambiguation.
    pub fn base_property_name(&self, direction: Direction) -> String {
        self.explicit_name(direction)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_property_name(direction))
    }

    /// Derive the property name for `direction`, disambiguated against the
    /// names already present on the owning type, and record it there.
    ///
    /// Explicit names are used verbatim. A derived name that is already taken
    /// is prefixed with the relationship token (`ownsOrders`) and then
    /// suffixed with the smallest free positive integer.
    pub fn property_name(&self, direction: Direction, existing: &mut HashSet<String>) -> String {
        if let Some(explicit) = self.explicit_name(direction) {
            existing.insert(explicit.to_string());
            return explicit.to_string();
        }

        let default = self.default_property_name(direction);
        let name = if !existing.contains(&default) {
            default
        } else {
            let prefixed = format!(
                "{}{}",
                lower_camel_token(&self.relationship_type),
                upper_first(&default)
            );
            if existing.contains(&prefixed) {
                first_free_suffix(&prefixed, existing)
            } else {
                prefixed
            }
        };

        existing.insert(name.clone());
        name
    }

    /// Whether `name` is (or was) the derived property for `direction`.
    pub fn matches_property(&self, direction: Direction, name: &str) -> bool {
        self.base_property_name(direction) == name || self.previous_name(direction) == Some(name)
    }

    /// Grant signature for the outgoing property.
    pub fn resource_signature(&self) -> String {
        format!(
            "{}/_{}",
            self.source_type,
            upper_first(&self.base_property_name(Direction::Outgoing))
        )
    }

    /// Grant signature for the incoming property.
    pub fn inverse_resource_signature(&self) -> String {
        format!(
            "{}/_{}",
            self.target_type,
            upper_first(&self.base_property_name(Direction::Incoming))
        )
    }
}

/// `base1`, `base2`, ... first suffixed variant not in `existing`.
pub fn first_free_suffix(base: &str, existing: &HashSet<String>) -> String {
    (1u32..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let rel = RelationshipDef::one_to_many("Customer", "OWNS", "Order");

        assert_eq!(rel.default_property_name(Direction::Outgoing), "orders");
        assert_eq!(rel.default_property_name(Direction::Incoming), "customer");
        assert_eq!(rel.multiplicity(Direction::Outgoing), Multiplicity::Many);
        assert_eq!(rel.multiplicity(Direction::Incoming), Multiplicity::One);
        assert_eq!(rel.related_type(Direction::Incoming), "Customer");
    }

    #[test]
    fn test_disambiguation() {
        let first = RelationshipDef::one_to_many("Customer", "OWNS", "Order");
        let second = RelationshipDef::one_to_many("Customer", "PREFERS", "Order");
        let third = RelationshipDef::one_to_many("Customer", "PREFERS", "Order");
        let mut existing = HashSet::new();

        assert_eq!(first.property_name(Direction::Outgoing, &mut existing), "orders");
        assert_eq!(
            second.property_name(Direction::Outgoing, &mut existing),
            "prefersOrders"
        );
        assert_eq!(
            third.property_name(Direction::Outgoing, &mut existing),
            "prefersOrders1"
        );
    }

    #[test]
    fn test_explicit_name_and_rename() {
        let mut rel =
            RelationshipDef::one_to_many("Customer", "OWNS", "Order").with_target_json_name("purchases");
        let mut existing = HashSet::new();

        assert_eq!(rel.property_name(Direction::Outgoing, &mut existing), "purchases");

        rel.rename(Direction::Outgoing, "buys");
        assert!(rel.matches_property(Direction::Outgoing, "buys"));
        assert!(rel.matches_property(Direction::Outgoing, "purchases"));
        assert!(!rel.matches_property(Direction::Outgoing, "orders"));
    }

    #[test]
    fn test_resource_signatures() {
        let rel = RelationshipDef::one_to_many("Customer", "OWNS", "Order");

        assert_eq!(rel.resource_signature(), "Customer/_Orders");
        assert_eq!(rel.inverse_resource_signature(), "Order/_Customer");
    }

    #[test]
    fn test_multiplicity_tokens() {
        assert_eq!(Multiplicity::parse("*"), Some(Multiplicity::Many));
        assert_eq!(Multiplicity::parse(" 1 "), Some(Multiplicity::One));
        assert_eq!(Multiplicity::parse("n"), None);
        assert_eq!(Multiplicity::Many.to_string(), "*");
    }

    #[test]
    fn test_first_free_suffix() {
        let existing: HashSet<String> = ["name", "name1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(first_free_suffix("name", &existing), "name2");
        assert_eq!(first_free_suffix("other", &existing), "other1");
    }
}
