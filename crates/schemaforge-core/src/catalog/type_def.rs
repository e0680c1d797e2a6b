//! Type definitions.

use crate::error::{SchemaError, SchemaResult};
use regex::Regex;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

/// Name of the implicit base type every type without `extends` derives from.
pub const BASE_TYPE: &str = "AbstractNode";

/// Type names that can never be declared while override protection is on.
pub const RESERVED_TYPE_NAMES: &[&str] = &["Relation"];

static TYPE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9_]*$").expect("valid type name pattern"));

static CONTRACT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid separator pattern"));

/// Default sort direction of a type.
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
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    #[default]
    Desc,
}

/// A schema-stored application type.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct TypeDef {
    /// Type name (unique within the schema).
    pub name: String,
    /// Declared supertype; `None` means the base type.
    #[serde(default)]
    pub extends: Option<String>,
    /// Raw comma/space separated list of implemented contracts.
    #[serde(default)]
    pub implements: Option<String>,
    /// Stateless capability contract instead of a concrete type.
    #[serde(default)]
    pub is_contract: bool,
    /// Concrete type that cannot be instantiated.
    #[serde(default)]
    pub is_abstract: bool,
    /// Part of the built-in schema.
    #[serde(default)]
    pub is_builtin: bool,
    /// Property used for default ordering.
    #[serde(default)]
    pub default_sort_key: Option<String>,
    /// Direction for default ordering.
    #[serde(default)]
    pub default_sort_order: Option<SortDirection>,
    /// Free-form category.
    #[serde(default)]
    pub category: Option<String>,
    /// Number of relationship definitions touching this type.
    #[serde(default)]
    pub rel_count: u32,
    /// Legacy inline definitions keyed with `_`, `__` or `___` prefixes.
    #[serde(default)]
    pub legacy: BTreeMap<String, String>,
}

impl TypeDef {
    /// Create a concrete type extending the base type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            implements: None,
            is_contract: false,
            is_abstract: false,
            is_builtin: false,
            default_sort_key: None,
            default_sort_order: None,
            category: None,
            rel_count: 0,
            legacy: BTreeMap::new(),
        }
    }

    /// Create a capability contract.
    pub fn contract(name: impl Into<String>) -> Self {
        Self {
            is_contract: true,
            ..Self::new(name)
        }
    }

    /// Set the supertype.
    pub fn extending(mut self, supertype: impl Into<String>) -> Self {
        self.extends = Some(supertype.into());
        self
    }

    /// Set the raw contract list.
    pub fn implementing(mut self, contracts: impl Into<String>) -> Self {
        self.implements = Some(contracts.into());
        self
    }

    /// Mark as abstract.
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark as part of the built-in schema.
    pub fn with_builtin(mut self) -> Self {
        self.is_builtin = true;
        self
    }

    /// Set the default sort key and direction.
    pub fn with_default_sort(mut self, key: impl Into<String>, order: SortDirection) -> Self {
        self.default_sort_key = Some(key.into());
        self.default_sort_order = Some(order);
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Add a legacy inline definition.
    pub fn with_legacy(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.legacy.insert(key.into(), value.into());
        self
    }

    /// Deduplicated set of implemented contracts, in declaration order.
    pub fn contracts(&self) -> Vec<String> {
        self.implements
            .as_deref()
            .map(collect_contracts)
            .unwrap_or_default()
    }

    /// Effective supertype name, the base type when none is declared.
    pub fn supertype_name(&self) -> &str {
        self.extends.as_deref().map(clean_type_name).unwrap_or(BASE_TYPE)
    }

    /// Whether the type derives directly from the base type.
    pub fn extends_base(&self) -> bool {
        self.extends.is_none()
    }

    /// Signature of the access grants guarding this type.
    pub fn resource_signature(&self) -> &str {
        &self.name
    }

    /// Validate the name pattern.
    pub fn validate_name(&self) -> SchemaResult<()> {
        if TYPE_NAME_PATTERN.is_match(&self.name) {
            Ok(())
        } else {
            Err(SchemaError::InvalidTypeName(self.name.clone()))
        }
    }

    /// Validate the name against reserved and existing non-dynamic names.
    pub fn validate_not_reserved(
        &self,
        reserved: &HashSet<String>,
        existing_builtin: &HashSet<String>,
    ) -> SchemaResult<()> {
        if RESERVED_TYPE_NAMES.contains(&self.name.as_str())
            || reserved.contains(&self.name)
            || existing_builtin.contains(&self.name)
        {
            return Err(SchemaError::ReservedTypeName(self.name.clone()));
        }
        Ok(())
    }
}

/// Split a comma/space separated contract list into a deduplicated list.
pub fn collect_contracts(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    CONTRACT_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| clean_type_name(part).to_string())
        .filter(|part| seen.insert(part.clone()))
        .collect()
}

/// Strip generic parameters and any path qualification from a type reference.
pub fn clean_type_name(raw: &str) -> &str {
    let without_generics = raw.split('<').next().unwrap_or(raw).trim();
    without_generics
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(without_generics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_builder() {
        let ty = TypeDef::new("Customer")
            .extending("Person")
            .implementing("Named, Auditable")
            .with_default_sort("name", SortDirection::Asc);

        assert_eq!(ty.supertype_name(), "Person");
        assert_eq!(ty.contracts(), vec!["Named", "Auditable"]);
        assert_eq!(ty.default_sort_order, Some(SortDirection::Asc));
        assert!(!ty.extends_base());
    }

    #[test]
    fn test_collect_contracts_dedupes() {
        assert_eq!(
            collect_contracts("Named,  Auditable Named ,,"),
            vec!["Named".to_string(), "Auditable".to_string()]
        );
        assert!(collect_contracts("  ").is_empty());
    }

    #[test]
    fn test_clean_type_name() {
        assert_eq!(clean_type_name("org.example.dynamic.Person"), "Person");
        assert_eq!(clean_type_name("List<Person>"), "List");
        assert_eq!(clean_type_name("Person"), "Person");
    }

    #[test]
    fn test_name_validation() {
        assert!(TypeDef::new("Customer_2").validate_name().is_ok());
        assert!(TypeDef::new("customer").validate_name().is_err());
        assert!(TypeDef::new("2Fast").validate_name().is_err());
        assert!(TypeDef::new("Bad-Name").validate_name().is_err());
    }

    #[test]
    fn test_reserved_names() {
        let reserved = HashSet::new();
        let builtin: HashSet<String> = ["Principal".to_string()].into_iter().collect();

        assert!(matches!(
            TypeDef::new("Relation").validate_not_reserved(&reserved, &builtin),
            Err(SchemaError::ReservedTypeName(_))
        ));
        assert!(TypeDef::new("Principal")
            .validate_not_reserved(&reserved, &builtin)
            .is_err());
        assert!(TypeDef::new("Customer")
            .validate_not_reserved(&reserved, &builtin)
            .is_ok());
    }
}
