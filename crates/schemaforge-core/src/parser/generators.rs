//! Per-tag property generators.

use crate::catalog::{PropertyDef, PropertyType, ValueType};
use crate::catalog::naming::upper_camel;
use crate::emitter::{EnumDef, PropertyDescriptor, PropertyKind, Validator};
use crate::error::{SchemaError, SchemaResult};
use crate::resolver::TypeResolver;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

static VARIANT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid variant pattern"));

static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid separator pattern"));

/// Property names visible while a type's properties are being generated.
pub struct GeneratorContext<'r, 'a> {
    type_name: &'r str,
    resolver: &'r TypeResolver<'a>,
    declared: HashMap<String, bool>,
}

impl<'r, 'a> GeneratorContext<'r, 'a> {
    /// Create a context for `type_name`.
    pub fn new(type_name: &'r str, resolver: &'r TypeResolver<'a>) -> Self {
        Self {
            type_name,
            resolver,
            declared: HashMap::new(),
        }
    }

    /// Type being generated.
    pub fn type_name(&self) -> &str {
        self.type_name
    }

    /// Resolver for relationship lookups.
    pub fn resolver(&self) -> &TypeResolver<'a> {
        self.resolver
    }

    /// Record a generated property and whether it holds several values.
    pub fn declare(&mut self, name: impl Into<String>, collection: bool) {
        self.declared.insert(name.into(), collection);
    }

    /// Whether `name` is visible, and if so whether it is a collection.
    ///
    /// Looks at properties generated so far, then relationship metadata,
    /// then properties declared on supertypes and contracts.
    pub fn lookup(&self, name: &str) -> Option<bool> {
        if let Some(collection) = self.declared.get(name) {
            return Some(*collection);
        }
        if let Some(rel) = self.resolver.resolve_relation(self.type_name, name) {
            return Some(rel.multiplicity.is_collection());
        }
        let snapshot = self.resolver.snapshot();
        self.resolver
            .lineage(self.type_name)
            .iter()
            .flat_map(|ancestor| snapshot.properties_of(ancestor))
            .find(|p| p.name == name)
            .map(|p| p.property_type().is_some_and(|t| t.is_array()))
    }

    fn invalid(&self, prop: &PropertyDef, reason: impl Into<String>) -> SchemaError {
        SchemaError::invalid_property(self.type_name, &prop.name, reason)
    }

    fn require_format<'p>(&self, prop: &'p PropertyDef) -> SchemaResult<&'p str> {
        prop.format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| self.invalid(prop, format!("{} properties need a format", prop.type_tag)))
    }

    fn require_declared(&self, prop: &PropertyDef, referenced: &str) -> SchemaResult<bool> {
        self.lookup(referenced).ok_or_else(|| {
            self.invalid(prop, format!("referenced property '{referenced}' is not declared"))
        })
    }
}

/// Output of one generator run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedProperty {
    /// The property descriptor.
    pub descriptor: PropertyDescriptor,
    /// Validators contributed by the property.
    pub validators: Vec<Validator>,
    /// Enum definition, for enum properties.
    pub enum_def: Option<EnumDef>,
}

/// Turns a property definition with a given tag into a descriptor.
pub trait PropertyGenerator: Send + Sync {
    /// Tag this generator handles.
    fn tag(&self) -> &str;

    /// Processing priority within a type, lower first.
    fn priority(&self) -> u8;

    /// Generate the descriptor for `prop`.
    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty>;
}

/// Descriptor carrying the flags common to every tag.
fn base_descriptor(prop: &PropertyDef, kind: PropertyKind) -> PropertyDescriptor {
    let mut descriptor = PropertyDescriptor::new(prop.name.clone(), kind);
    descriptor.not_null = prop.not_null;
    descriptor.unique = prop.unique;
    descriptor.indexed = prop.indexed || prop.unique;
    descriptor.hint = prop.hint.clone();
    descriptor.category = prop.category.clone();
    descriptor.builtin = prop.builtin;
    descriptor
}

/// Validators derived from flags and named validators.
fn flag_validators(prop: &PropertyDef) -> Vec<Validator> {
    let mut out = Vec::new();
    if prop.not_null {
        out.push(Validator::NotNull {
            property: prop.name.clone(),
        });
    }
    if prop.unique && !prop.compound {
        out.push(Validator::Unique {
            property: prop.name.clone(),
        });
    }
    out.extend(prop.validators.iter().map(|name| Validator::Named {
        property: prop.name.clone(),
        name: name.clone(),
    }));
    out
}

fn finish(prop: &PropertyDef, descriptor: PropertyDescriptor, extra: Vec<Validator>) -> GeneratedProperty {
    let mut validators = flag_validators(prop);
    validators.extend(extra);
    GeneratedProperty {
        descriptor,
        validators,
        enum_def: None,
    }
}

/// Convert a stored default into a typed JSON value.
fn parse_default(
    ctx: &GeneratorContext<'_, '_>,
    prop: &PropertyDef,
    value_type: ValueType,
    raw: &str,
) -> SchemaResult<Value> {
    let raw = raw.trim();
    let bad = || ctx.invalid(prop, format!("default '{raw}' is not a valid {value_type}"));
    match value_type {
        ValueType::String | ValueType::Date => Ok(Value::String(raw.to_string())),
        ValueType::Integer => raw.parse::<i32>().map(Value::from).map_err(|_| bad()),
        ValueType::Long => raw.parse::<i64>().map(Value::from).map_err(|_| bad()),
        ValueType::Double => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(bad),
        ValueType::Boolean => raw.parse::<bool>().map(Value::Bool).map_err(|_| bad()),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    LIST_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Single-valued String, Integer, Long, Double, Boolean and Date properties.
pub struct ScalarGenerator(pub PropertyType);

impl PropertyGenerator for ScalarGenerator {
    fn tag(&self) -> &str {
        self.0.name()
    }

    fn priority(&self) -> u8 {
        self.0.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let value_type = self
            .0
            .value_type()
            .ok_or_else(|| ctx.invalid(prop, format!("{} is not a scalar tag", self.0)))?;
        let format = prop.format.as_deref().map(str::trim).filter(|f| !f.is_empty());

        let mut extra = vec![Validator::TypeCheck {
            property: prop.name.clone(),
            value_type,
            array: false,
        }];
        if let (ValueType::String, Some(pattern)) = (value_type, format) {
            Regex::new(pattern)
                .map_err(|e| ctx.invalid(prop, format!("invalid pattern '{pattern}': {e}")))?;
            extra.push(Validator::Pattern {
                property: prop.name.clone(),
                pattern: pattern.to_string(),
            });
        }

        let kind = PropertyKind::Scalar {
            value_type,
            format: match value_type {
                ValueType::Date => format.map(String::from),
                _ => None,
            },
        };
        let mut descriptor = base_descriptor(prop, kind);
        if let Some(raw) = prop.default_value.as_deref() {
            descriptor.default_value = Some(parse_default(ctx, prop, value_type, raw)?);
        }

        Ok(finish(prop, descriptor, extra))
    }
}

/// Array properties.
pub struct ArrayGenerator(pub PropertyType);

impl PropertyGenerator for ArrayGenerator {
    fn tag(&self) -> &str {
        self.0.name()
    }

    fn priority(&self) -> u8 {
        self.0.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let value_type = self
            .0
            .value_type()
            .ok_or_else(|| ctx.invalid(prop, format!("{} is not an array tag", self.0)))?;

        let mut descriptor = base_descriptor(prop, PropertyKind::Array { value_type });
        if let Some(raw) = prop.default_value.as_deref() {
            let values = raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| parse_default(ctx, prop, value_type, v))
                .collect::<SchemaResult<Vec<_>>>()?;
            descriptor.default_value = Some(Value::Array(values));
        }

        let extra = vec![Validator::TypeCheck {
            property: prop.name.clone(),
            value_type,
            array: true,
        }];
        Ok(finish(prop, descriptor, extra))
    }
}

/// Enum properties; the format lists the variants.
pub struct EnumGenerator;

impl PropertyGenerator for EnumGenerator {
    fn tag(&self) -> &str {
        PropertyType::Enum.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Enum.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let variants = split_list(ctx.require_format(prop)?);
        if let Some(bad) = variants.iter().find(|v| !VARIANT_PATTERN.is_match(v)) {
            return Err(ctx.invalid(prop, format!("invalid enum variant '{bad}'")));
        }

        let enum_name = upper_camel(&prop.name);
        let mut descriptor = base_descriptor(
            prop,
            PropertyKind::Enum {
                enum_name: enum_name.clone(),
                variants: variants.clone(),
            },
        );
        if let Some(raw) = prop.default_value.as_deref().map(str::trim) {
            if !variants.iter().any(|v| v == raw) {
                return Err(ctx.invalid(prop, format!("default '{raw}' is not a variant")));
            }
            descriptor.default_value = Some(Value::String(raw.to_string()));
        }

        let extra = vec![Validator::EnumMember {
            property: prop.name.clone(),
            variants: variants.clone(),
        }];
        let mut generated = finish(prop, descriptor, extra);
        generated.enum_def = Some(EnumDef {
            name: enum_name,
            variants,
        });
        Ok(generated)
    }
}

/// Password properties.
pub struct PasswordGenerator;

impl PropertyGenerator for PasswordGenerator {
    fn tag(&self) -> &str {
        PropertyType::Password.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Password.sort_index()
    }

    fn generate(&self, _ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let extra = vec![Validator::TypeCheck {
            property: prop.name.clone(),
            value_type: ValueType::String,
            array: false,
        }];
        Ok(finish(prop, base_descriptor(prop, PropertyKind::Password), extra))
    }
}

/// Function properties computed by read/write bodies.
pub struct FunctionGenerator;

impl PropertyGenerator for FunctionGenerator {
    fn tag(&self) -> &str {
        PropertyType::Function.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Function.sort_index()
    }

    fn generate(&self, _ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let kind = PropertyKind::Computed {
            read_function: prop.read_function.clone(),
            write_function: prop.write_function.clone(),
            type_hint: prop.type_hint.clone(),
        };
        Ok(finish(prop, base_descriptor(prop, kind), Vec::new()))
    }
}

/// Cypher properties computed by a graph query.
pub struct CypherGenerator;

impl PropertyGenerator for CypherGenerator {
    fn tag(&self) -> &str {
        PropertyType::Cypher.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Cypher.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let query = ctx.require_format(prop)?.to_string();
        Ok(finish(prop, base_descriptor(prop, PropertyKind::Query { query }), Vec::new()))
    }
}

/// Count properties over a collection property.
pub struct CountGenerator;

impl PropertyGenerator for CountGenerator {
    fn tag(&self) -> &str {
        PropertyType::Count.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Count.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let collection = ctx.require_format(prop)?.to_string();
        if !ctx.require_declared(prop, &collection)? {
            return Err(ctx.invalid(prop, format!("'{collection}' is not a collection")));
        }
        Ok(finish(
            prop,
            base_descriptor(prop, PropertyKind::Count { collection }),
            Vec::new(),
        ))
    }
}

/// Notion and IdNotion projections over a relationship property.
pub struct NotionGenerator {
    ids_only: bool,
}

impl NotionGenerator {
    /// Projection of a remote property (or the whole related object).
    pub fn notion() -> Self {
        Self { ids_only: false }
    }

    /// Projection of related ids.
    pub fn id_notion() -> Self {
        Self { ids_only: true }
    }

    fn tag_type(&self) -> PropertyType {
        if self.ids_only {
            PropertyType::IdNotion
        } else {
            PropertyType::Notion
        }
    }
}

impl PropertyGenerator for NotionGenerator {
    fn tag(&self) -> &str {
        self.tag_type().name()
    }

    fn priority(&self) -> u8 {
        self.tag_type().sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let format = ctx.require_format(prop)?;
        let mut parts = format.splitn(2, ',').map(str::trim);
        let relationship_property = parts.next().unwrap_or_default().to_string();
        let remote = parts.next().filter(|r| !r.is_empty()).map(String::from);

        ctx.require_declared(prop, &relationship_property)?;
        let relation = ctx
            .resolver()
            .resolve_relation(ctx.type_name(), &relationship_property)
            .ok_or_else(|| {
                ctx.invalid(
                    prop,
                    format!("'{relationship_property}' is not a relationship property"),
                )
            })?;

        let remote_property = if self.ids_only {
            Some("id".to_string())
        } else {
            remote
        };
        let kind = PropertyKind::Notion {
            relationship_property,
            remote_property,
            multiplicity: relation.multiplicity,
        };
        Ok(finish(prop, base_descriptor(prop, kind), Vec::new()))
    }
}

/// Join properties concatenating other properties.
pub struct JoinGenerator;

impl PropertyGenerator for JoinGenerator {
    fn tag(&self) -> &str {
        PropertyType::Join.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Join.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let format = prop
            .format
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ctx.invalid(prop, "Join properties need a format"))?;
        let (separator, rest) = format
            .split_once(',')
            .ok_or_else(|| ctx.invalid(prop, "expected '<separator>, <property>, ...'"))?;

        let separator = unquote(separator);
        let properties: Vec<String> = rest
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if properties.is_empty() {
            return Err(ctx.invalid(prop, "no properties to join"));
        }
        for referenced in &properties {
            ctx.require_declared(prop, referenced)?;
        }

        let kind = PropertyKind::Join {
            separator,
            properties,
        };
        Ok(finish(prop, base_descriptor(prop, kind), Vec::new()))
    }
}

/// Strip matching quotes from a separator, trimming unquoted ones.
fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Custom properties delegated to a named handler.
pub struct CustomGenerator;

impl PropertyGenerator for CustomGenerator {
    fn tag(&self) -> &str {
        PropertyType::Custom.name()
    }

    fn priority(&self) -> u8 {
        PropertyType::Custom.sort_index()
    }

    fn generate(&self, ctx: &GeneratorContext<'_, '_>, prop: &PropertyDef) -> SchemaResult<GeneratedProperty> {
        let handler = ctx.require_format(prop)?.to_string();
        Ok(finish(prop, base_descriptor(prop, PropertyKind::Custom { handler }), Vec::new()))
    }
}

/// One generator per known tag.
pub fn builtin_generators() -> Vec<Box<dyn PropertyGenerator>> {
    PropertyType::ALL
        .into_iter()
        .map(|tag| -> Box<dyn PropertyGenerator> {
            match tag {
                PropertyType::String
                | PropertyType::Integer
                | PropertyType::Long
                | PropertyType::Double
                | PropertyType::Boolean
                | PropertyType::Date => Box::new(ScalarGenerator(tag)),
                PropertyType::StringArray
                | PropertyType::DateArray
                | PropertyType::LongArray
                | PropertyType::DoubleArray
                | PropertyType::IntegerArray
                | PropertyType::BooleanArray => Box::new(ArrayGenerator(tag)),
                PropertyType::Enum => Box::new(EnumGenerator),
                PropertyType::Password => Box::new(PasswordGenerator),
                PropertyType::Function => Box::new(FunctionGenerator),
                PropertyType::Cypher => Box::new(CypherGenerator),
                PropertyType::Count => Box::new(CountGenerator),
                PropertyType::Notion => Box::new(NotionGenerator::notion()),
                PropertyType::IdNotion => Box::new(NotionGenerator::id_notion()),
                PropertyType::Join => Box::new(JoinGenerator),
                PropertyType::Custom => Box::new(CustomGenerator),
            }
        })
        .collect()
}
