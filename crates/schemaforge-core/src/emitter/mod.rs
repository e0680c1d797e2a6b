//! Source emission.
//!
//! Turns one type definition into a [`CompilationUnit`]: the structured
//! [`TypeDescriptor`] the runtime activates, a rendered source listing and a
//! fingerprint of that listing.

mod descriptor;
mod render;

pub use descriptor::{
    Action, EnumDef, LifecycleHook, MethodDescriptor, MethodKind, PropertyDescriptor, PropertyKind,
    SupertypeOrigin, TypeDescriptor, TypeKind, Validator, ViewDescriptor,
};
pub use render::render;

use crate::catalog::{PropertyDef, TypeDef};
use crate::error::{SchemaError, SchemaResult};
use crate::extension::SchemaExtension;
use crate::methods::MethodAssembler;
use crate::parser::PropertyParserRegistry;
use crate::resolver::{DerivedProperty, SupertypeResolution, TypeResolver};
use crate::views::ViewAssembler;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Emitted output for one type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationUnit {
    /// Type name.
    pub type_name: String,
    /// Structured descriptor.
    pub descriptor: TypeDescriptor,
    /// Rendered source listing.
    pub source: String,
    /// Hex blake3 hash of the source listing.
    pub fingerprint: String,
}

impl CompilationUnit {
    /// Render and fingerprint a descriptor.
    pub fn new(descriptor: TypeDescriptor) -> Self {
        let source = render(&descriptor);
        let fingerprint = hex::encode(blake3::hash(source.as_bytes()).as_bytes());
        Self {
            type_name: descriptor.name.clone(),
            descriptor,
            source,
            fingerprint,
        }
    }
}

/// Result of emitting one type.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitOutcome {
    /// The unit was produced.
    Emitted {
        /// The unit.
        unit: CompilationUnit,
        /// Property definitions to write back to the store.
        updates: Vec<PropertyDef>,
    },
    /// A schema-defined supertype or contract has not been emitted yet.
    Deferred {
        /// The dependency being waited for.
        waiting_for: String,
    },
}

/// Emits compilation units against one resolver.
pub struct SourceEmitter<'r, 'a> {
    resolver: &'r TypeResolver<'a>,
    registry: &'r PropertyParserRegistry,
    extensions: &'r [Arc<dyn SchemaExtension>],
}

impl<'r, 'a> SourceEmitter<'r, 'a> {
    /// Create an emitter.
    pub fn new(resolver: &'r TypeResolver<'a>, registry: &'r PropertyParserRegistry) -> Self {
        Self {
            resolver,
            registry,
            extensions: &[],
        }
    }

    /// Let extensions contribute source to every unit.
    pub fn with_extensions(mut self, extensions: &'r [Arc<dyn SchemaExtension>]) -> Self {
        self.extensions = extensions;
        self
    }

    /// Emit `ty`.
    ///
    /// `emitted` holds the schema-defined types emitted so far in this pass;
    /// `excluded` holds types whose relationship endpoints must be skipped.
    pub fn emit(
        &self,
        ty: &TypeDef,
        emitted: &HashSet<String>,
        excluded: &HashSet<String>,
    ) -> SchemaResult<EmitOutcome> {
        ty.validate_name()?;

        let (supertype, origin) = match self.resolver.resolve_supertype(ty, emitted) {
            SupertypeResolution::Base => (self.resolver_base(), SupertypeOrigin::Base),
            SupertypeResolution::Builtin(name) => (name, SupertypeOrigin::Builtin),
            SupertypeResolution::Dynamic(name) => (name, SupertypeOrigin::Dynamic),
            SupertypeResolution::Deferred(name) => {
                return Ok(EmitOutcome::Deferred { waiting_for: name })
            }
            SupertypeResolution::Missing(name) => {
                return Err(SchemaError::MissingSupertype {
                    type_name: ty.name.clone(),
                    supertype: name,
                })
            }
        };

        let snapshot = self.resolver.snapshot();
        let contracts = self.resolver.contracts_of(ty);
        for contract in &contracts {
            if snapshot.is_dynamic_type(contract) {
                if !emitted.contains(contract) {
                    return Ok(EmitOutcome::Deferred {
                        waiting_for: contract.clone(),
                    });
                }
            } else if !self.resolver.type_exists(contract) {
                return Err(SchemaError::MissingSupertype {
                    type_name: ty.name.clone(),
                    supertype: contract.clone(),
                });
            }
        }

        let derived: Vec<DerivedProperty> = self
            .resolver
            .derived_properties(&ty.name)
            .into_iter()
            .filter(|d| !excluded.contains(&d.related_type))
            .collect();

        let props = snapshot.properties_of(&ty.name);
        let parsed = self
            .registry
            .parse_type(self.resolver, &ty.name, &derived, &props)?;

        let mut properties: Vec<PropertyDescriptor> = derived.iter().map(relationship_descriptor).collect();
        properties.extend(parsed.properties);

        let views = ViewAssembler::new(self.resolver).assemble(
            &ty.name,
            &properties,
            &snapshot.views_of(&ty.name),
        );
        let methods = MethodAssembler::assemble(&ty.name, &snapshot.methods_of(&ty.name));

        let mut descriptor = TypeDescriptor {
            name: ty.name.clone(),
            kind: if ty.is_contract {
                TypeKind::Contract
            } else {
                TypeKind::Concrete
            },
            is_abstract: ty.is_abstract,
            supertype,
            supertype_origin: origin,
            contracts,
            properties,
            enums: parsed.enums,
            views,
            validators: parsed.validators,
            default_sort: ty
                .default_sort_key
                .clone()
                .map(|key| (key, ty.default_sort_order.unwrap_or_default())),
            methods,
            extension_source: Vec::new(),
            category: ty.category.clone(),
        };

        let contributed: Vec<String> = self
            .extensions
            .iter()
            .filter_map(|ext| ext.contribute_source(&descriptor))
            .collect();
        descriptor.extension_source = contributed;

        Ok(EmitOutcome::Emitted {
            unit: CompilationUnit::new(descriptor),
            updates: parsed.updates,
        })
    }

    fn resolver_base(&self) -> String {
        crate::catalog::BASE_TYPE.to_string()
    }
}

/// Descriptor of a relationship-derived property.
fn relationship_descriptor(d: &DerivedProperty) -> PropertyDescriptor {
    PropertyDescriptor::new(
        d.name.clone(),
        PropertyKind::Relationship {
            relationship_type: d.relationship_type.clone(),
            direction: d.direction,
            multiplicity: d.multiplicity,
            related_type: d.related_type.clone(),
            cascade: d.cascade,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        MethodDef, Multiplicity, PropertyType, RelationshipDef, SchemaSnapshot, ViewDef, CUSTOM_VIEW,
    };
    use crate::resolver::{AllowAll, BuiltinCatalog, NameCache};

    struct Banner;

    impl SchemaExtension for Banner {
        fn name(&self) -> &str {
            "banner"
        }

        fn contribute_source(&self, descriptor: &TypeDescriptor) -> Option<String> {
            Some(format!("// generated for {}", descriptor.name))
        }
    }

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(1)
            .with_type(TypeDef::new("Customer").with_default_sort("email", crate::catalog::SortDirection::Asc))
            .with_type(TypeDef::new("Order"))
            .with_type(TypeDef::new("Invoice").extending("Order"))
            .with_type(TypeDef::new("Ghostly").extending("Phantom"))
            .with_property("Customer", PropertyDef::typed("email", PropertyType::String))
            .with_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
            .with_view("Customer", ViewDef::new("public").with_member("email"))
            .with_method("Order", MethodDef::new("onCreation", "validate()"))
    }

    fn emit_one(
        snapshot: &SchemaSnapshot,
        name: &str,
        emitted: &HashSet<String>,
        excluded: &HashSet<String>,
    ) -> SchemaResult<EmitOutcome> {
        let builtins = BuiltinCatalog::new();
        let cache = NameCache::new();
        let resolver = TypeResolver::new(snapshot, &builtins, &AllowAll, &cache);
        let registry = PropertyParserRegistry::new();
        let extensions: Vec<Arc<dyn SchemaExtension>> = vec![Arc::new(Banner)];
        SourceEmitter::new(&resolver, &registry)
            .with_extensions(&extensions)
            .emit(snapshot.get_type(name).unwrap(), emitted, excluded)
    }

    fn unit(outcome: EmitOutcome) -> CompilationUnit {
        match outcome {
            EmitOutcome::Emitted { unit, .. } => unit,
            other => panic!("expected a unit, got {other:?}"),
        }
    }

    #[test]
    fn test_emit_customer() {
        let snapshot = snapshot();
        let unit = unit(emit_one(&snapshot, "Customer", &HashSet::new(), &HashSet::new()).unwrap());
        let d = &unit.descriptor;

        assert_eq!(d.supertype, "AbstractNode");
        assert_eq!(d.supertype_origin, SupertypeOrigin::Base);
        assert_eq!(d.property("orders").map(|p| p.is_collection()), Some(true));
        assert!(d.property("email").is_some());
        assert_eq!(d.view(CUSTOM_VIEW).unwrap().members, vec!["orders", "email"]);
        assert_eq!(d.view("public").unwrap().members, vec!["email"]);
        assert_eq!(d.default_sort, Some(("email".into(), crate::catalog::SortDirection::Asc)));
        assert_eq!(d.extension_source, vec!["// generated for Customer"]);
        assert_eq!(unit.fingerprint.len(), 64);
        assert!(unit.source.contains("// generated for Customer"));
    }

    #[test]
    fn test_emit_order_side() {
        let snapshot = snapshot();
        let unit = unit(emit_one(&snapshot, "Order", &HashSet::new(), &HashSet::new()).unwrap());
        let customer = unit.descriptor.property("customer").unwrap();

        assert!(matches!(
            customer.kind,
            PropertyKind::Relationship { multiplicity: Multiplicity::One, .. }
        ));
        assert!(unit.descriptor.lifecycle(LifecycleHook::OnCreation).is_some());
    }

    #[test]
    fn test_excluded_endpoints_skipped() {
        let snapshot = snapshot();
        let excluded: HashSet<String> = ["Order".to_string()].into_iter().collect();
        let unit = unit(emit_one(&snapshot, "Customer", &HashSet::new(), &excluded).unwrap());

        assert!(unit.descriptor.property("orders").is_none());
    }

    #[test]
    fn test_deferred_and_missing_supertypes() {
        let snapshot = snapshot();
        let outcome = emit_one(&snapshot, "Invoice", &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(
            outcome,
            EmitOutcome::Deferred {
                waiting_for: "Order".into()
            }
        );

        let emitted: HashSet<String> = ["Order".to_string()].into_iter().collect();
        let unit = unit(emit_one(&snapshot, "Invoice", &emitted, &HashSet::new()).unwrap());
        assert_eq!(unit.descriptor.supertype_origin, SupertypeOrigin::Dynamic);

        let err = emit_one(&snapshot, "Ghostly", &HashSet::new(), &HashSet::new()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingSupertype { .. }));
    }

    #[test]
    fn test_fingerprint_tracks_source() {
        let snapshot = snapshot();
        let a = unit(emit_one(&snapshot, "Customer", &HashSet::new(), &HashSet::new()).unwrap());
        let b = unit(emit_one(&snapshot, "Customer", &HashSet::new(), &HashSet::new()).unwrap());
        assert_eq!(a.fingerprint, b.fingerprint);

        let changed = snapshot.with_property("Customer", PropertyDef::typed("age", PropertyType::Integer));
        let c = unit(emit_one(&changed, "Customer", &HashSet::new(), &HashSet::new()).unwrap());
        assert_ne!(a.fingerprint, c.fingerprint);
    }
}
