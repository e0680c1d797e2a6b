//! An activated set of type descriptors.

use super::validate::{ValidationFailure, ValidatorSet};
use super::DynamicObject;
use crate::emitter::{Action, CompilationUnit, LifecycleHook, MethodDescriptor, MethodKind, SupertypeOrigin, TypeDescriptor};
use crate::resolver::normalize_entity_name;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Executes method action sources.
pub trait ActionRunner: Send + Sync {
    /// Run `action` against `object`; `Err` carries the failure message.
    fn run(
        &self,
        object: &mut DynamicObject,
        action: &Action,
        args: &Map<String, Value>,
    ) -> Result<Option<Value>, String>;
}

/// Errors raised while invoking generated behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The object's type is not active.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// No method of that name on the type or its supertypes.
    #[error("type {type_name} has no method {method}")]
    UnknownMethod {
        /// Object type.
        type_name: String,
        /// Requested method.
        method: String,
    },

    /// A declared parameter was not supplied.
    #[error("method {method} requires argument {parameter}")]
    MissingArgument {
        /// Method name.
        method: String,
        /// Missing parameter.
        parameter: String,
    },

    /// An action failed.
    #[error("action {action} of {type_name} failed: {message}")]
    ActionFailed {
        /// Declaring type.
        type_name: String,
        /// Declared action name.
        action: String,
        /// Runner message.
        message: String,
    },
}

/// Immutable set of activated compilation units.
pub struct Generation {
    number: u64,
    units: BTreeMap<String, CompilationUnit>,
    validators: Arc<ValidatorSet>,
}

impl Generation {
    pub(crate) fn new(
        number: u64,
        units: BTreeMap<String, CompilationUnit>,
        validators: Arc<ValidatorSet>,
    ) -> Self {
        Self {
            number,
            units,
            validators,
        }
    }

    /// Generation number, 0 before the first activation.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Number of active types.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no type is active.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Active type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Active units, sorted by type name.
    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.values()
    }

    /// Unit by exact type name.
    pub fn get(&self, type_name: &str) -> Option<&CompilationUnit> {
        self.units.get(type_name)
    }

    /// Unit by user-facing name: raw first, normalised second.
    pub fn lookup(&self, raw: &str) -> Option<&CompilationUnit> {
        self.units
            .get(raw)
            .or_else(|| self.units.get(&normalize_entity_name(raw)))
    }

    fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.get(type_name).map(|u| &u.descriptor)
    }

    /// Active types `type_name` inherits from, contracts before the
    /// supertype, most general first, ending with `type_name` itself.
    fn linearize(&self, type_name: &str) -> Vec<&TypeDescriptor> {
        fn visit<'g>(
            generation: &'g Generation,
            type_name: &str,
            seen: &mut HashSet<String>,
            out: &mut Vec<&'g TypeDescriptor>,
        ) {
            if !seen.insert(type_name.to_string()) {
                return;
            }
            let Some(d) = generation.descriptor(type_name) else {
                return;
            };
            for contract in &d.contracts {
                visit(generation, contract, seen, out);
            }
            if d.supertype_origin == SupertypeOrigin::Dynamic {
                visit(generation, &d.supertype, seen, out);
            }
            out.push(d);
        }

        let mut out = Vec::new();
        visit(self, type_name, &mut HashSet::new(), &mut out);
        out
    }

    /// Supertype chain of `type_name` through active types, nearest first.
    fn supertype_chain(&self, type_name: &str) -> Vec<&TypeDescriptor> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.descriptor(type_name);
        while let Some(d) = current {
            if !seen.insert(d.name.as_str()) {
                break;
            }
            chain.push(d);
            current = match d.supertype_origin {
                SupertypeOrigin::Dynamic => self.descriptor(&d.supertype),
                _ => None,
            };
        }
        chain
    }

    /// Members of `view` on `type_name`: contract views first, then the
    /// supertype's, then the type's own, without duplicates.
    ///
    /// Returns `None` for an unknown type.
    pub fn property_names(&self, type_name: &str, view: &str) -> Option<Vec<String>> {
        self.get(type_name)?;
        let mut names: Vec<String> = Vec::new();
        for d in self.linearize(type_name) {
            if let Some(v) = d.view(view) {
                for member in &v.members {
                    if !names.contains(member) {
                        names.push(member.clone());
                    }
                }
            }
        }
        Some(names)
    }

    /// Check `object` against every rule of its type and the types it
    /// inherits from. `peers` are the stored objects uniqueness is checked
    /// against.
    pub fn validate(
        &self,
        object: &DynamicObject,
        peers: &[DynamicObject],
    ) -> Result<Vec<ValidationFailure>, InvocationError> {
        if self.get(&object.type_name).is_none() {
            return Err(InvocationError::UnknownType(object.type_name.clone()));
        }
        Ok(self
            .linearize(&object.type_name)
            .into_iter()
            .flat_map(|d| {
                d.validators
                    .iter()
                    .filter_map(move |rule| self.validators.check(&d.name, rule, object, peers))
            })
            .collect())
    }

    /// Run the `hook` callbacks for `object`: inherited callbacks first, then
    /// the type's own. Returns the number of actions run.
    ///
    /// Failures of hooks that swallow them are logged and skipped.
    pub fn invoke_lifecycle(
        &self,
        hook: LifecycleHook,
        object: &mut DynamicObject,
        runner: &dyn ActionRunner,
    ) -> Result<usize, InvocationError> {
        let type_name = object.type_name.clone();
        if self.get(&type_name).is_none() {
            return Err(InvocationError::UnknownType(type_name));
        }

        let args = Map::new();
        let mut ran = 0;
        for d in self.supertype_chain(&type_name).into_iter().rev() {
            let Some(method) = d.lifecycle(hook) else {
                continue;
            };
            for action in &method.actions {
                ran += 1;
                if let Err(message) = runner.run(object, action, &args) {
                    if hook.swallows_failures() {
                        warn!(
                            type_name = %d.name,
                            action = %action.declared_name,
                            error = %message,
                            "lifecycle action failed"
                        );
                        continue;
                    }
                    return Err(InvocationError::ActionFailed {
                        type_name: d.name.clone(),
                        action: action.declared_name.clone(),
                        message,
                    });
                }
            }
        }
        Ok(ran)
    }

    /// Invoke method `name` on `object`.
    ///
    /// The nearest declaration wins; when it calls super, the inherited
    /// declaration runs first. Returns the result of the last action of the
    /// nearest declaration.
    pub fn invoke_method(
        &self,
        name: &str,
        object: &mut DynamicObject,
        args: &Map<String, Value>,
        runner: &dyn ActionRunner,
    ) -> Result<Option<Value>, InvocationError> {
        let type_name = object.type_name.clone();
        if self.get(&type_name).is_none() {
            return Err(InvocationError::UnknownType(type_name));
        }

        let mut seen = HashSet::new();
        let declarations: Vec<(&str, &MethodDescriptor)> = self
            .supertype_chain(&type_name)
            .into_iter()
            .chain(self.linearize(&type_name).into_iter().rev())
            .filter(|d| seen.insert(d.name.as_str()))
            .filter_map(|d| d.method(name).map(|m| (d.name.as_str(), m)))
            .collect();
        let Some((_, nearest)) = declarations.first() else {
            return Err(InvocationError::UnknownMethod {
                type_name,
                method: name.to_string(),
            });
        };

        if nearest.kind == MethodKind::Custom {
            if let Some(missing) = nearest.parameters.iter().find(|p| !args.contains_key(&p.name)) {
                return Err(InvocationError::MissingArgument {
                    method: name.to_string(),
                    parameter: missing.name.clone(),
                });
            }
        }

        let mut plan = vec![declarations[0]];
        for next in declarations.iter().skip(1) {
            if !plan[plan.len() - 1].1.call_super {
                break;
            }
            plan.push(*next);
        }

        let mut result = None;
        for (owner, method) in plan.into_iter().rev() {
            for action in &method.actions {
                result = runner
                    .run(object, action, args)
                    .map_err(|message| InvocationError::ActionFailed {
                        type_name: owner.to_string(),
                        action: action.declared_name.clone(),
                        message,
                    })?;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SortDirection, ValueType};
    use crate::emitter::{PropertyDescriptor, PropertyKind, TypeKind, Validator, ViewDescriptor};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ActionRunner for Recorder {
        fn run(
            &self,
            object: &mut DynamicObject,
            action: &Action,
            _args: &Map<String, Value>,
        ) -> Result<Option<Value>, String> {
            self.log.lock().push(action.source.clone());
            object.set("touched", true);
            if self.fail_on == Some(action.source.as_str()) {
                return Err("boom".into());
            }
            Ok(Some(Value::String(action.source.clone())))
        }
    }

    fn method(name: &str, kind: MethodKind, sources: &[&str], call_super: bool) -> MethodDescriptor {
        MethodDescriptor {
            name: name.into(),
            kind,
            actions: sources
                .iter()
                .map(|s| Action {
                    declared_name: name.into(),
                    source: s.to_string(),
                })
                .collect(),
            overrides: call_super,
            exported: false,
            parameters: Vec::new(),
            return_type: None,
            exceptions: Vec::new(),
            call_super,
        }
    }

    fn descriptor(name: &str, supertype: Option<&str>) -> TypeDescriptor {
        TypeDescriptor {
            name: name.into(),
            kind: TypeKind::Concrete,
            is_abstract: false,
            supertype: supertype.unwrap_or("AbstractNode").into(),
            supertype_origin: if supertype.is_some() {
                SupertypeOrigin::Dynamic
            } else {
                SupertypeOrigin::Base
            },
            contracts: Vec::new(),
            properties: Vec::new(),
            enums: Vec::new(),
            views: Vec::new(),
            validators: Vec::new(),
            default_sort: Some(("name".into(), SortDirection::Desc)),
            methods: Vec::new(),
            extension_source: Vec::new(),
            category: None,
        }
    }

    fn generation() -> Generation {
        let mut named = descriptor("Named", None);
        named.kind = TypeKind::Contract;
        named.views.push(ViewDescriptor {
            name: "public".into(),
            members: vec!["title".into()],
        });

        let mut person = descriptor("Person", None);
        person.contracts.push("Named".into());
        person.views.push(ViewDescriptor {
            name: "public".into(),
            members: vec!["nickname".into(), "title".into()],
        });
        person.validators.push(Validator::NotNull {
            property: "nickname".into(),
        });
        person.methods.push(method(
            "onCreation",
            MethodKind::Lifecycle(LifecycleHook::OnCreation),
            &["person-init"],
            true,
        ));
        person.methods.push(method("greet", MethodKind::Generic, &["hello"], false));

        let mut customer = descriptor("Customer", Some("Person"));
        customer.properties.push(PropertyDescriptor::new(
            "email",
            PropertyKind::Scalar {
                value_type: ValueType::String,
                format: None,
            },
        ));
        customer.views.push(ViewDescriptor {
            name: "public".into(),
            members: vec!["email".into(), "nickname".into()],
        });
        customer.validators.push(Validator::Unique {
            property: "email".into(),
        });
        customer.methods.push(method(
            "onCreation",
            MethodKind::Lifecycle(LifecycleHook::OnCreation),
            &["customer-a", "customer-b"],
            true,
        ));
        customer.methods.push(method(
            "afterDeletion",
            MethodKind::Lifecycle(LifecycleHook::AfterDeletion),
            &["cleanup", "notify"],
            true,
        ));
        customer.methods.push(method("greet", MethodKind::Generic, &["hi"], true));
        let mut discount = method("discount", MethodKind::Custom, &["apply"], false);
        discount.parameters.push(crate::catalog::Parameter::new("percent", "Double"));
        customer.methods.push(discount);

        let units = [named, person, customer]
            .into_iter()
            .map(|d| (d.name.clone(), CompilationUnit::new(d)))
            .collect();
        Generation::new(1, units, Arc::new(ValidatorSet::new()))
    }

    #[test]
    fn test_lookup() {
        let generation = generation();
        assert_eq!(generation.lookup("customers").map(|u| u.type_name.as_str()), Some("Customer"));
        assert!(generation.lookup("Ghost").is_none());
        assert_eq!(generation.len(), 3);
    }

    #[test]
    fn test_property_names_merge() {
        let generation = generation();
        assert_eq!(
            generation.property_names("Customer", "public").unwrap(),
            vec!["title", "nickname", "email"]
        );
        assert!(generation.property_names("Customer", "none").unwrap().is_empty());
        assert!(generation.property_names("Ghost", "public").is_none());
    }

    #[test]
    fn test_validate_inherited_rules() {
        let generation = generation();
        let existing = DynamicObject::new("Customer", "c1").with("email", "a@x.io");
        let object = DynamicObject::new("Customer", "c2").with("email", "a@x.io");

        let failures = generation.validate(&object, &[existing]).unwrap();
        let rules: Vec<&str> = failures.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, vec!["not_null", "unique"]);
        assert_eq!(failures[0].type_name, "Person");

        let ghost = DynamicObject::new("Ghost", "g");
        assert!(matches!(generation.validate(&ghost, &[]), Err(InvocationError::UnknownType(_))));
    }

    #[test]
    fn test_lifecycle_runs_inherited_first() {
        let generation = generation();
        let runner = Recorder::default();
        let mut object = DynamicObject::new("Customer", "c1");

        let ran = generation
            .invoke_lifecycle(LifecycleHook::OnCreation, &mut object, &runner)
            .unwrap();
        assert_eq!(ran, 3);
        assert_eq!(*runner.log.lock(), vec!["person-init", "customer-a", "customer-b"]);
        assert_eq!(object.get("touched"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_after_deletion_swallows_failures() {
        let generation = generation();
        let runner = Recorder {
            fail_on: Some("cleanup"),
            ..Default::default()
        };
        let mut object = DynamicObject::new("Customer", "c1");

        let ran = generation
            .invoke_lifecycle(LifecycleHook::AfterDeletion, &mut object, &runner)
            .unwrap();
        assert_eq!(ran, 2);

        let failing = Recorder {
            fail_on: Some("customer-a"),
            ..Default::default()
        };
        let err = generation
            .invoke_lifecycle(LifecycleHook::OnCreation, &mut object, &failing)
            .unwrap_err();
        assert!(matches!(err, InvocationError::ActionFailed { .. }));
    }

    #[test]
    fn test_invoke_method() {
        let generation = generation();
        let runner = Recorder::default();
        let mut object = DynamicObject::new("Customer", "c1");

        let result = generation
            .invoke_method("greet", &mut object, &Map::new(), &runner)
            .unwrap();
        assert_eq!(result, Some(Value::String("hi".into())));
        assert_eq!(*runner.log.lock(), vec!["hello", "hi"]);

        let err = generation
            .invoke_method("discount", &mut object, &Map::new(), &runner)
            .unwrap_err();
        assert!(matches!(err, InvocationError::MissingArgument { .. }));

        let mut args = Map::new();
        args.insert("percent".into(), Value::from(10.0));
        assert!(generation.invoke_method("discount", &mut object, &args, &runner).is_ok());

        let err = generation
            .invoke_method("missing", &mut object, &Map::new(), &runner)
            .unwrap_err();
        assert!(matches!(err, InvocationError::UnknownMethod { .. }));
    }
}
