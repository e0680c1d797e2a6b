//! Method assembly.
//!
//! Lifecycle names (`onCreation`, `afterCreation`, `onModification`,
//! `afterDeletion`) may be declared several times with a numeric suffix
//! (`onCreation01`, `onCreation02`); all declarations of one hook collapse
//! into a single synthesised callback running every action in suffix order.

use crate::catalog::MethodDef;
use crate::emitter::{Action, LifecycleHook, MethodDescriptor, MethodKind};
use tracing::warn;

/// Split a declared name into a lifecycle hook and its ordering suffix.
pub fn lifecycle_of(name: &str) -> Option<(LifecycleHook, Option<u64>)> {
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let hook = LifecycleHook::from_name(base)?;
    let suffix = &name[base.len()..];
    if suffix.is_empty() {
        Some((hook, None))
    } else {
        suffix.parse().ok().map(|n| (hook, Some(n)))
    }
}

/// Builds the methods of one type.
pub struct MethodAssembler;

impl MethodAssembler {
    /// Assemble `methods` (in declaration order) for `type_name`.
    ///
    /// Lifecycle callbacks come first in hook order, followed by ordinary
    /// methods in declaration order.
    pub fn assemble(type_name: &str, methods: &[&MethodDef]) -> Vec<MethodDescriptor> {
        let mut lifecycle: Vec<(LifecycleHook, Option<u64>, usize, &MethodDef)> = Vec::new();
        let mut ordinary: Vec<MethodDescriptor> = Vec::new();

        for (position, method) in methods.iter().copied().enumerate() {
            if let Some((hook, suffix)) = lifecycle_of(&method.name) {
                lifecycle.push((hook, suffix, position, method));
                continue;
            }

            if ordinary.iter().any(|m| m.name == method.name) {
                warn!(
                    type_name = %type_name,
                    method = %method.name,
                    "duplicate method definition ignored"
                );
                continue;
            }
            ordinary.push(Self::ordinary(method));
        }

        lifecycle.sort_by_key(|(_, suffix, position, _)| (*suffix, *position));

        let mut out: Vec<MethodDescriptor> = LifecycleHook::ALL
            .into_iter()
            .filter_map(|hook| {
                let actions: Vec<Action> = lifecycle
                    .iter()
                    .filter(|(h, _, _, _)| *h == hook)
                    .map(|(_, _, _, method)| Action {
                        declared_name: method.name.clone(),
                        source: method.source.clone(),
                    })
                    .collect();
                (!actions.is_empty()).then(|| MethodDescriptor {
                    name: hook.name().to_string(),
                    kind: MethodKind::Lifecycle(hook),
                    actions,
                    overrides: true,
                    exported: false,
                    parameters: Vec::new(),
                    return_type: None,
                    exceptions: Vec::new(),
                    call_super: true,
                })
            })
            .collect();

        out.extend(ordinary);
        out
    }

    fn ordinary(method: &MethodDef) -> MethodDescriptor {
        let action = Action {
            declared_name: method.name.clone(),
            source: method.source.clone(),
        };

        if method.has_signature() {
            MethodDescriptor {
                name: method.name.clone(),
                kind: MethodKind::Custom,
                actions: vec![action],
                overrides: method.overrides,
                exported: method.exported,
                parameters: method.parameters.clone(),
                return_type: method.return_type.clone(),
                exceptions: method.exceptions.clone(),
                call_super: method.call_super,
            }
        } else {
            MethodDescriptor {
                name: method.name.clone(),
                kind: MethodKind::Generic,
                actions: vec![action],
                overrides: method.overrides,
                exported: true,
                parameters: Vec::new(),
                return_type: None,
                exceptions: method.exceptions.clone(),
                call_super: method.call_super,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_of() {
        assert_eq!(lifecycle_of("onCreation"), Some((LifecycleHook::OnCreation, None)));
        assert_eq!(
            lifecycle_of("afterDeletion02"),
            Some((LifecycleHook::AfterDeletion, Some(2)))
        );
        assert_eq!(lifecycle_of("onCreationX"), None);
        assert_eq!(lifecycle_of("recalculate"), None);
    }

    #[test]
    fn test_lifecycle_grouping() {
        let defs = [
            MethodDef::new("onCreation02", "second"),
            MethodDef::new("onCreation01", "first"),
            MethodDef::new("onCreation", "zero"),
            MethodDef::new("afterDeletion", "cleanup"),
        ];
        let refs: Vec<&MethodDef> = defs.iter().collect();
        let methods = MethodAssembler::assemble("Order", &refs);

        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].kind, MethodKind::Lifecycle(LifecycleHook::OnCreation));
        let sources: Vec<&str> = methods[0].actions.iter().map(|a| a.source.as_str()).collect();
        assert_eq!(sources, vec!["zero", "first", "second"]);
        assert!(methods[0].call_super);
        assert_eq!(methods[1].name, "afterDeletion");
    }

    #[test]
    fn test_ordinary_methods() {
        let defs = [
            MethodDef::new("recalculate", "{ }"),
            MethodDef::new("discount", "{ }")
                .with_parameter("percent", "Double")
                .returning("Double"),
            MethodDef::new("recalculate", "{ duplicate }"),
        ];
        let refs: Vec<&MethodDef> = defs.iter().collect();
        let methods = MethodAssembler::assemble("Order", &refs);

        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].kind, MethodKind::Generic);
        assert!(methods[0].exported);
        assert_eq!(methods[0].actions[0].source, "{ }");
        assert_eq!(methods[1].kind, MethodKind::Custom);
        assert!(!methods[1].exported);
        assert_eq!(methods[1].parameters.len(), 1);
    }
}
