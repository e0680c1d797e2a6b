//! View assembly.
//!
//! Every type gets an implicit `custom` view listing its schema-declared
//! properties; declared views are merged by name, their members resolved
//! against the type's lineage and the base property allow-list, then sorted.

use crate::catalog::{SortPolicy, ViewDef, CUSTOM_VIEW};
use crate::emitter::{PropertyDescriptor, ViewDescriptor};
use crate::resolver::{BuiltinCatalog, TypeResolver};
use tracing::warn;

/// Builds the views of one type.
pub struct ViewAssembler<'r, 'a> {
    resolver: &'r TypeResolver<'a>,
}

struct PendingView {
    name: String,
    members: Vec<String>,
    policy: SortPolicy,
}

impl PendingView {
    fn push(&mut self, member: String) {
        if !self.members.contains(&member) {
            self.members.push(member);
        }
    }
}

impl<'r, 'a> ViewAssembler<'r, 'a> {
    /// Create an assembler.
    pub fn new(resolver: &'r TypeResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Assemble the views of `type_name` from its generated properties and
    /// declared views. Views that end up empty are left out.
    pub fn assemble(
        &self,
        type_name: &str,
        properties: &[PropertyDescriptor],
        declared: &[&ViewDef],
    ) -> Vec<ViewDescriptor> {
        let mut pending = vec![PendingView {
            name: CUSTOM_VIEW.to_string(),
            members: properties
                .iter()
                .filter(|p| !p.builtin)
                .map(|p| p.name.clone())
                .collect(),
            policy: SortPolicy::Declared,
        }];

        for view in declared {
            let index = match pending.iter().position(|p| p.name == view.name) {
                Some(index) => index,
                None => {
                    pending.push(PendingView {
                        name: view.name.clone(),
                        members: Vec::new(),
                        policy: SortPolicy::Declared,
                    });
                    pending.len() - 1
                }
            };

            if view.sort_order.is_some() {
                pending[index].policy = view.sort_policy();
            }
            for member in view.declared_members() {
                match self.resolve_member(type_name, properties, &member) {
                    Some(resolved) => pending[index].push(resolved),
                    None => warn!(
                        type_name = %type_name,
                        view = %view.name,
                        member = %member,
                        "dropping unresolved view member"
                    ),
                }
            }
        }

        pending
            .into_iter()
            .filter(|view| !view.members.is_empty())
            .map(|mut view| {
                view.policy.apply(&mut view.members);
                ViewDescriptor {
                    name: view.name,
                    members: view.members,
                }
            })
            .collect()
    }

    /// Resolve a declared member to the property name it refers to now.
    fn resolve_member(
        &self,
        type_name: &str,
        properties: &[PropertyDescriptor],
        member: &str,
    ) -> Option<String> {
        if properties.iter().any(|p| p.name == member) {
            return Some(member.to_string());
        }

        let renamed = std::iter::once(type_name.to_string())
            .chain(self.resolver.lineage(type_name))
            .flat_map(|owner| self.resolver.derived_properties(&owner))
            .find(|d| d.answers_to(member))
            .map(|d| d.name);
        if renamed.is_some() {
            return renamed;
        }

        if self.resolver.has_dynamic_property(type_name, member)
            || BuiltinCatalog::is_base_property(member)
        {
            return Some(member.to_string());
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Direction, PropertyDef, PropertyType, RelationshipDef, SchemaSnapshot, TypeDef};
    use crate::emitter::PropertyKind;
    use crate::catalog::{CascadeDelete, Multiplicity, ValueType};
    use crate::resolver::{AllowAll, NameCache};

    fn scalar(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::new(
            name,
            PropertyKind::Scalar {
                value_type: ValueType::String,
                format: None,
            },
        )
    }

    fn relation(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::new(
            name,
            PropertyKind::Relationship {
                relationship_type: "OWNS".into(),
                direction: Direction::Outgoing,
                multiplicity: Multiplicity::Many,
                related_type: "Order".into(),
                cascade: CascadeDelete::None,
            },
        )
    }

    fn assemble(snapshot: &SchemaSnapshot, properties: &[PropertyDescriptor]) -> Vec<ViewDescriptor> {
        let builtins = BuiltinCatalog::new();
        let cache = NameCache::new();
        let resolver = TypeResolver::new(snapshot, &builtins, &AllowAll, &cache);
        let declared = snapshot.views_of("Customer");
        ViewAssembler::new(&resolver).assemble("Customer", properties, &declared)
    }

    fn base_snapshot() -> SchemaSnapshot {
        let mut rel = RelationshipDef::one_to_many("Customer", "OWNS", "Order");
        rel.rename(Direction::Outgoing, "purchases");
        SchemaSnapshot::new(1)
            .with_type(TypeDef::new("Customer").extending("Person"))
            .with_type(TypeDef::new("Person"))
            .with_type(TypeDef::new("Order"))
            .with_property("Person", PropertyDef::typed("nickname", PropertyType::String))
            .with_relationship(rel)
    }

    #[test]
    fn test_custom_view() {
        let snapshot = base_snapshot();
        let mut hinted = scalar("secret");
        hinted.hint = Some("hidden".into());
        let mut builtin = scalar("name");
        builtin.builtin = true;

        let views = assemble(&snapshot, &[scalar("email"), relation("purchases"), hinted, builtin]);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, CUSTOM_VIEW);
        assert_eq!(views[0].members, vec!["email", "purchases", "secret"]);
    }

    #[test]
    fn test_member_resolution() {
        let snapshot = base_snapshot().with_view(
            "Customer",
            ViewDef::new("public")
                .with_member("email")
                .with_member("orders")
                .with_non_graph_members("nickname, createdDate, bogus"),
        );

        let views = assemble(&snapshot, &[scalar("email"), relation("purchases")]);
        let public = views.iter().find(|v| v.name == "public").unwrap();
        assert_eq!(public.members, vec!["email", "purchases", "nickname", "createdDate"]);
    }

    #[test]
    fn test_sorting_and_merging() {
        let snapshot = base_snapshot()
            .with_view("Customer", ViewDef::new("ui").with_member("email").with_member("id"))
            .with_view(
                "Customer",
                ViewDef::new("ui").with_member("type").with_sort_order("alphabetic"),
            )
            .with_view("Customer", ViewDef::new(CUSTOM_VIEW).with_sort_order("purchases"));

        let views = assemble(&snapshot, &[scalar("email"), relation("purchases")]);
        assert_eq!(views[0].members, vec!["purchases", "email"]);
        let ui = views.iter().find(|v| v.name == "ui").unwrap();
        assert_eq!(ui.members, vec!["email", "id", "type"]);
    }

    #[test]
    fn test_empty_views_dropped() {
        let snapshot = base_snapshot().with_view("Customer", ViewDef::new("empty").with_member("bogus"));
        let views = assemble(&snapshot, &[]);
        assert!(views.is_empty());
    }
}
