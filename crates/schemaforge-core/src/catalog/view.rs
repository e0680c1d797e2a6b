//! View definitions.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::HashSet;

/// Name of the implicit view holding every schema-declared property.
pub const CUSTOM_VIEW: &str = "custom";

/// Sort policy keyword for lexicographic ordering.
pub const ALPHABETIC_SORT: &str = "alphabetic";

/// A named, ordered projection of a type's properties.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct ViewDef {
    /// Store-assigned identifier (0 until persisted).
    #[serde(default)]
    pub id: u64,
    /// Owning type name.
    #[serde(default)]
    pub owner: String,
    /// View name.
    pub name: String,
    /// Graph-backed members (property names).
    #[serde(default)]
    pub members: Vec<String>,
    /// Raw comma/space separated list of additional member names.
    #[serde(default)]
    pub non_graph_members: Option<String>,
    /// `alphabetic` or a comma separated explicit order.
    #[serde(default)]
    pub sort_order: Option<String>,
}

impl ViewDef {
    /// Create an empty view.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner: String::new(),
            name: name.into(),
            members: Vec::new(),
            non_graph_members: None,
            sort_order: None,
        }
    }

    /// Set the owning type.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Add a graph-backed member.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    /// Set the raw non-graph member list.
    pub fn with_non_graph_members(mut self, raw: impl Into<String>) -> Self {
        self.non_graph_members = Some(raw.into());
        self
    }

    /// Set the sort policy.
    pub fn with_sort_order(mut self, order: impl Into<String>) -> Self {
        self.sort_order = Some(order.into());
        self
    }

    /// Graph-backed members followed by the split non-graph members.
    pub fn declared_members(&self) -> Vec<String> {
        let mut out = self.members.clone();
        if let Some(raw) = self.non_graph_members.as_deref() {
            for name in raw.split([',', ' ', '\t', '\n']).map(str::trim) {
                if !name.is_empty() && !out.iter().any(|m| m == name) {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    /// Parsed sort policy.
    pub fn sort_policy(&self) -> SortPolicy {
        SortPolicy::parse(self.sort_order.as_deref())
    }
}

/// How view members are ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortPolicy {
    /// Declaration order.
    Declared,
    /// Strict lexicographic order.
    Alphabetic,
    /// Listed names first, the rest in declaration order.
    Explicit(Vec<String>),
}

impl SortPolicy {
    /// Parse a stored sort order.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => SortPolicy::Declared,
            Some(ALPHABETIC_SORT) => SortPolicy::Alphabetic,
            Some(list) => SortPolicy::Explicit(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
        }
    }

    /// Apply this policy to an ordered member list.
    pub fn apply(&self, members: &mut Vec<String>) {
        match self {
            SortPolicy::Declared => {}
            SortPolicy::Alphabetic => members.sort(),
            SortPolicy::Explicit(order) => {
                let mut seen = HashSet::new();
                let mut sorted: Vec<String> = order
                    .iter()
                    .filter(|name| members.contains(name))
                    .filter(|name| seen.insert(name.as_str()))
                    .cloned()
                    .collect();
                for member in members.iter() {
                    if seen.insert(member.as_str()) {
                        sorted.push(member.clone());
                    }
                }
                *members = sorted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_declared_members() {
        let view = ViewDef::new("public")
            .with_member("name")
            .with_non_graph_members("id, type  name");

        assert_eq!(view.declared_members(), names(&["name", "id", "type"]));
    }

    #[test]
    fn test_alphabetic_sort() {
        let mut members = names(&["b", "a", "C"]);
        SortPolicy::parse(Some("alphabetic")).apply(&mut members);
        assert_eq!(members, names(&["C", "a", "b"]));
    }

    #[test]
    fn test_explicit_sort_appends_rest() {
        let mut members = names(&["id", "name", "email", "age"]);
        SortPolicy::parse(Some("email, missing, id")).apply(&mut members);
        assert_eq!(members, names(&["email", "id", "name", "age"]));
    }

    #[test]
    fn test_explicit_sort_lists_each_member_once() {
        let mut members = names(&["email", "age"]);
        SortPolicy::parse(Some("email, age, email")).apply(&mut members);
        assert_eq!(members, names(&["email", "age"]));

        let mut members = names(&["id", "name", "email"]);
        SortPolicy::parse(Some("name, id, name")).apply(&mut members);
        assert_eq!(members, names(&["name", "id", "email"]));
    }

    #[test]
    fn test_declared_sort_keeps_order() {
        let mut members = names(&["z", "a"]);
        SortPolicy::parse(None).apply(&mut members);
        assert_eq!(members, names(&["z", "a"]));
    }
}
