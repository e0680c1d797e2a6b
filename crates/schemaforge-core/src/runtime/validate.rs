//! Object validation against emitted rules.

use super::DynamicObject;
use crate::emitter::Validator;
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Externally registered validation rule.
pub trait NamedValidator: Send + Sync {
    /// Check `property` of `object`; `Err` carries the failure message.
    fn check(&self, object: &DynamicObject, property: &str) -> Result<(), String>;
}

impl<F> NamedValidator for F
where
    F: Fn(&DynamicObject, &str) -> Result<(), String> + Send + Sync,
{
    fn check(&self, object: &DynamicObject, property: &str) -> Result<(), String> {
        self(object, property)
    }
}

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Type declaring the rule.
    pub type_name: String,
    /// Properties the rule reads, comma separated.
    pub property: String,
    /// Rule name.
    pub rule: String,
    /// Human readable message.
    pub message: String,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} [{}]: {}", self.type_name, self.property, self.rule, self.message)
    }
}

/// Named validators and compiled patterns, shared by every generation.
#[derive(Default)]
pub struct ValidatorSet {
    named: DashMap<String, Arc<dyn NamedValidator>>,
    patterns: DashMap<String, Option<Regex>>,
}

impl ValidatorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named validator, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, validator: Arc<dyn NamedValidator>) {
        self.named.insert(name.into(), validator);
    }

    /// Whether a named validator is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    fn pattern(&self, pattern: &str) -> Option<Regex> {
        if let Some(cached) = self.patterns.get(pattern) {
            return cached.clone();
        }
        let compiled = Regex::new(&format!("^(?:{pattern})$")).ok();
        self.patterns.insert(pattern.to_string(), compiled.clone());
        compiled
    }

    /// Check one rule declared on `type_name`.
    ///
    /// `peers` are the other stored objects uniqueness is checked against;
    /// a peer with the object's own id is ignored.
    pub fn check(
        &self,
        type_name: &str,
        rule: &Validator,
        object: &DynamicObject,
        peers: &[DynamicObject],
    ) -> Option<ValidationFailure> {
        let fail = |name: &str, message: String| {
            Some(ValidationFailure {
                type_name: type_name.to_string(),
                property: rule.properties().join(","),
                rule: name.to_string(),
                message,
            })
        };
        let others = || peers.iter().filter(|p| p.id != object.id);

        match rule {
            Validator::NotNull { property } => match object.value(property) {
                None => fail("not_null", "value is required".into()),
                Some(Value::String(s)) if s.is_empty() => fail("not_null", "value is required".into()),
                Some(_) => None,
            },
            Validator::Unique { property } => {
                let value = object.value(property)?;
                others()
                    .any(|p| p.value(property) == Some(value))
                    .then(|| format!("value {value} already taken"))
                    .and_then(|m| fail("unique", m))
            }
            Validator::CompoundUnique { properties } => {
                let key: Vec<Option<&Value>> = properties.iter().map(|p| object.value(p)).collect();
                if key.iter().all(Option::is_none) {
                    return None;
                }
                others()
                    .any(|peer| properties.iter().map(|p| peer.value(p)).eq(key.iter().copied()))
                    .then(|| "combination already taken".to_string())
                    .and_then(|m| fail("unique", m))
            }
            Validator::Pattern { property, pattern } => {
                let value = object.value(property)?;
                let Some(regex) = self.pattern(pattern) else {
                    return fail("pattern", format!("invalid pattern {pattern:?}"));
                };
                match value.as_str() {
                    Some(s) if regex.is_match(s) => None,
                    _ => fail("pattern", format!("value {value} does not match {pattern:?}")),
                }
            }
            Validator::EnumMember { property, variants } => {
                let value = object.value(property)?;
                match value.as_str() {
                    Some(s) if variants.iter().any(|v| v == s) => None,
                    _ => fail("one_of", format!("value {value} is not one of {variants:?}")),
                }
            }
            Validator::TypeCheck {
                property,
                value_type,
                array,
            } => {
                let value = object.value(property)?;
                let ok = if *array {
                    value
                        .as_array()
                        .is_some_and(|items| items.iter().all(|v| value_type.accepts(v)))
                } else {
                    value_type.accepts(value)
                };
                if ok {
                    None
                } else if *array {
                    fail("type", format!("expected array of {value_type}, got {value}"))
                } else {
                    fail("type", format!("expected {value_type}, got {value}"))
                }
            }
            Validator::Named { property, name } => {
                let Some(validator) = self.named.get(name).map(|v| Arc::clone(v.value())) else {
                    return fail(name.as_str(), format!("validator {name} is not registered"));
                };
                validator
                    .check(object, property)
                    .err()
                    .and_then(|m| fail(name.as_str(), m))
            }
        }
    }
}
