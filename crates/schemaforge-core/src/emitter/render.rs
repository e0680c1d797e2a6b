//! Deterministic source listing of a type descriptor.

use super::descriptor::{
    MethodDescriptor, MethodKind, PropertyDescriptor, PropertyKind, TypeDescriptor, TypeKind,
    Validator,
};
use crate::catalog::{Direction, SortDirection};
use std::fmt::Write;

/// Render `descriptor` as a source listing.
///
/// The listing only depends on the descriptor, so equal descriptors always
/// render (and fingerprint) identically.
pub fn render(descriptor: &TypeDescriptor) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_type(&mut out, descriptor);
    out
}

fn write_type(out: &mut String, d: &TypeDescriptor) -> std::fmt::Result {
    let keyword = match (d.kind, d.is_abstract) {
        (TypeKind::Contract, _) => "contract",
        (TypeKind::Concrete, true) => "abstract type",
        (TypeKind::Concrete, false) => "type",
    };
    write!(out, "{keyword} {}", d.name)?;
    if d.kind == TypeKind::Concrete {
        write!(out, " extends {}", d.supertype)?;
    }
    if !d.contracts.is_empty() {
        write!(out, " implements {}", d.contracts.join(", "))?;
    }
    writeln!(out, " {{")?;

    if let Some(category) = &d.category {
        writeln!(out, "    category {category:?};")?;
    }

    for prop in &d.properties {
        writeln!(out, "    {};", property_line(prop))?;
    }

    for def in &d.enums {
        writeln!(out, "    enum {} {{ {} }}", def.name, def.variants.join(", "))?;
    }

    for view in &d.views {
        writeln!(out, "    view {} [{}];", view.name, view.members.join(", "))?;
    }

    for validator in &d.validators {
        writeln!(out, "    check {};", validator_line(validator))?;
    }

    if let Some((key, direction)) = &d.default_sort {
        let direction = match direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        writeln!(out, "    sort {key} {direction};")?;
    }

    for method in &d.methods {
        write_method(out, method)?;
    }

    for fragment in &d.extension_source {
        for line in fragment.lines() {
            writeln!(out, "    {line}")?;
        }
    }

    writeln!(out, "}}")
}

fn property_line(p: &PropertyDescriptor) -> String {
    let mut line = format!("{}: ", p.name);
    match &p.kind {
        PropertyKind::Scalar { value_type, format } => {
            line.push_str(&value_type.to_string());
            if let Some(format) = format {
                line.push_str(&format!(" format {format:?}"));
            }
        }
        PropertyKind::Array { value_type } => line.push_str(&format!("[{value_type}]")),
        PropertyKind::Enum { enum_name, .. } => line.push_str(enum_name),
        PropertyKind::Password => line.push_str("Password"),
        PropertyKind::Computed {
            read_function,
            write_function,
            type_hint,
        } => {
            line.push_str(&format!("fn -> {}", type_hint.as_deref().unwrap_or("Object")));
            if let Some(read) = read_function {
                line.push_str(&format!(" read {read:?}"));
            }
            if let Some(write) = write_function {
                line.push_str(&format!(" write {write:?}"));
            }
        }
        PropertyKind::Query { query } => line.push_str(&format!("query {query:?}")),
        PropertyKind::Count { collection } => line.push_str(&format!("count({collection})")),
        PropertyKind::Notion {
            relationship_property,
            remote_property,
            multiplicity,
        } => {
            line.push_str(&format!("notion{multiplicity}({relationship_property}"));
            if let Some(remote) = remote_property {
                line.push_str(&format!(".{remote}"));
            }
            line.push(')');
        }
        PropertyKind::Join {
            separator,
            properties,
        } => line.push_str(&format!("join({separator:?}, {})", properties.join(", "))),
        PropertyKind::Custom { handler } => line.push_str(&format!("custom({handler})")),
        PropertyKind::Relationship {
            relationship_type,
            direction,
            multiplicity,
            related_type,
            cascade,
        } => {
            let arrow = match direction {
                Direction::Outgoing => "->",
                Direction::Incoming => "<-",
            };
            line.push_str(&format!(
                "{multiplicity}{related_type} {arrow} {relationship_type} cascade {cascade:?}"
            ));
        }
    }

    let flags: Vec<&str> = [
        (p.not_null, "not_null"),
        (p.unique, "unique"),
        (p.indexed, "indexed"),
        (p.builtin, "builtin"),
    ]
    .into_iter()
    .filter_map(|(set, flag)| set.then_some(flag))
    .collect();
    if !flags.is_empty() {
        line.push(' ');
        line.push_str(&flags.join(" "));
    }
    if let Some(default) = &p.default_value {
        line.push_str(&format!(" = {default}"));
    }
    line
}

fn validator_line(v: &Validator) -> String {
    match v {
        Validator::NotNull { property } => format!("not_null({property})"),
        Validator::Unique { property } => format!("unique({property})"),
        Validator::CompoundUnique { properties } => format!("unique({})", properties.join(", ")),
        Validator::Pattern { property, pattern } => format!("pattern({property}, {pattern:?})"),
        Validator::EnumMember { property, variants } => {
            format!("one_of({property}, [{}])", variants.join(", "))
        }
        Validator::TypeCheck {
            property,
            value_type,
            array,
        } => {
            if *array {
                format!("type({property}, [{value_type}])")
            } else {
                format!("type({property}, {value_type})")
            }
        }
        Validator::Named { property, name } => format!("{name}({property})"),
    }
}

fn write_method(out: &mut String, m: &MethodDescriptor) -> std::fmt::Result {
    let mut modifiers = Vec::new();
    if m.overrides {
        modifiers.push("override");
    }
    if m.exported {
        modifiers.push("export");
    }
    let prefix = if modifiers.is_empty() {
        String::new()
    } else {
        format!("{} ", modifiers.join(" "))
    };

    let signature = match m.kind {
        MethodKind::Lifecycle(_) | MethodKind::Generic if m.parameters.is_empty() => {
            if matches!(m.kind, MethodKind::Generic) {
                "(parameters: Map<String, Object>)".to_string()
            } else {
                "()".to_string()
            }
        }
        _ => format!(
            "({})",
            m.parameters
                .iter()
                .map(|p| format!("{}: {}", p.name, p.type_name))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let returns = m
        .return_type
        .as_deref()
        .map(|r| format!(" -> {r}"))
        .unwrap_or_default();
    let throws = if m.exceptions.is_empty() {
        String::new()
    } else {
        format!(" throws {}", m.exceptions.join(", "))
    };

    writeln!(out, "    {prefix}fn {}{signature}{returns}{throws} {{", m.name)?;
    if m.call_super {
        writeln!(out, "        super.{}();", m.name)?;
    }
    for action in &m.actions {
        writeln!(out, "        // {}", action.declared_name)?;
        for line in action.source.lines() {
            writeln!(out, "        {line}")?;
        }
    }
    writeln!(out, "    }}")
}
