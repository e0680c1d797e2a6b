//! Property parser registry.
//!
//! Maps raw type tags to generators and turns the property definitions of a
//! type into descriptors, validators, enum definitions and compound keys.

mod generators;
mod raw;

pub use generators::{
    builtin_generators, ArrayGenerator, CountGenerator, CustomGenerator, CypherGenerator,
    EnumGenerator, FunctionGenerator, GeneratedProperty, GeneratorContext, JoinGenerator,
    NotionGenerator, PasswordGenerator, PropertyGenerator, ScalarGenerator,
};
pub use raw::RawPropertySpec;

use crate::catalog::{first_free_suffix, PropertyDef, PropertyType};
use crate::emitter::{EnumDef, PropertyDescriptor, Validator};
use crate::error::{SchemaError, SchemaResult};
use crate::resolver::{DerivedProperty, TypeResolver};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Everything the registry produced for one type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedProperties {
    /// Descriptors in processing order.
    pub properties: Vec<PropertyDescriptor>,
    /// Accumulated validators, compound uniqueness last.
    pub validators: Vec<Validator>,
    /// Accumulated enum definitions.
    pub enums: Vec<EnumDef>,
    /// Properties forming the compound uniqueness key.
    pub compound_keys: Vec<String>,
    /// Definitions changed while parsing (renames, migrated function bodies)
    /// that must be written back to the store.
    pub updates: Vec<PropertyDef>,
}

/// Ordered tag → generator map.
pub struct PropertyParserRegistry {
    generators: Vec<Box<dyn PropertyGenerator>>,
}

impl PropertyParserRegistry {
    /// Registry with a generator for every known tag.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for generator in builtin_generators() {
            registry.register(generator);
        }
        registry
    }

    /// Registry without generators.
    pub fn empty() -> Self {
        Self {
            generators: Vec::new(),
        }
    }

    /// Add a generator, replacing any generator for the same tag.
    ///
    /// Generators stay sorted by tag length descending (ties by reverse
    /// name) so prefix matching always prefers the longest tag.
    pub fn register(&mut self, generator: Box<dyn PropertyGenerator>) {
        self.generators.retain(|g| g.tag() != generator.tag());
        self.generators.push(generator);
        self.generators.sort_by(|a, b| {
            b.tag()
                .len()
                .cmp(&a.tag().len())
                .then_with(|| b.tag().cmp(a.tag()))
        });
    }

    /// Registered tags in matching order.
    pub fn tags(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.tag()).collect()
    }

    /// Generator whose tag prefixes the property's raw tag.
    pub fn generator_for(
        &self,
        type_name: &str,
        prop: &PropertyDef,
    ) -> SchemaResult<&dyn PropertyGenerator> {
        let raw = prop.type_tag.trim();
        self.generators
            .iter()
            .find(|g| raw.starts_with(g.tag()))
            .map(|g| &**g)
            .ok_or_else(|| {
                SchemaError::invalid_property(
                    type_name,
                    &prop.name,
                    format!("unknown value type {}", prop.type_tag),
                )
            })
    }

    /// Parse every property of `type_name`.
    ///
    /// `derived` are the relationship-derived properties already present on
    /// the type; they count as declared for referencing generators.
    pub fn parse_type(
        &self,
        resolver: &TypeResolver<'_>,
        type_name: &str,
        derived: &[DerivedProperty],
        props: &[&PropertyDef],
    ) -> SchemaResult<ParsedProperties> {
        let mut out = ParsedProperties::default();
        let mut ctx = GeneratorContext::new(type_name, resolver);
        let mut used: HashSet<String> = HashSet::new();

        for d in derived {
            ctx.declare(d.name.clone(), d.multiplicity.is_collection());
            used.insert(d.name.clone());
        }

        let mut queue = Vec::with_capacity(props.len());
        for (position, prop) in props.iter().enumerate() {
            let mut prop = (*prop).clone();
            let mut changed = migrate_function_format(type_name, &mut prop);

            if used.contains(&prop.name) {
                let renamed = first_free_suffix(&prop.name, &used);
                warn!(
                    type_name = %type_name,
                    property = %prop.name,
                    renamed = %renamed,
                    "property name collision, renaming"
                );
                prop.name = renamed;
                changed = true;
            }
            used.insert(prop.name.clone());

            if changed {
                out.updates.push(prop.clone());
            }

            let generator = self.generator_for(type_name, &prop)?;
            queue.push((generator.priority(), position, generator, prop));
        }

        queue.sort_by_key(|(priority, position, _, _)| (*priority, *position));

        for (_, _, generator, prop) in queue {
            let generated = generator.generate(&ctx, &prop)?;
            ctx.declare(
                generated.descriptor.name.clone(),
                generated.descriptor.is_collection(),
            );
            if prop.compound {
                out.compound_keys.push(prop.name.clone());
            }
            out.validators.extend(generated.validators);
            out.enums.extend(generated.enum_def);
            out.properties.push(generated.descriptor);
        }

        if !out.compound_keys.is_empty() {
            out.validators.push(Validator::CompoundUnique {
                properties: out.compound_keys.clone(),
            });
        }

        Ok(out)
    }
}

impl Default for PropertyParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Move a function property's format into its read function, once.
fn migrate_function_format(type_name: &str, prop: &mut PropertyDef) -> bool {
    if prop.property_type() != Some(PropertyType::Function) || prop.read_function.is_some() {
        return false;
    }
    match prop.format.take() {
        Some(body) if !body.trim().is_empty() => {
            debug!(type_name = %type_name, property = %prop.name, "moving function format to read function");
            prop.read_function = Some(body);
            true
        }
        other => {
            prop.format = other;
            false
        }
    }
}
