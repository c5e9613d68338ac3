use std::collections::HashMap;

use ferroscope_reflect::{
    Identity, InvokeOutcome, OperationDescriptor, TypeId, TypeRegistry, Value,
};

use crate::error::{Canceled, InspectError, Result};
use crate::node::{NodeId, NodeKind, Tree};

/// Supplies one argument value per formal parameter, in declaration order.
/// Returning `Err(Canceled)` abandons the whole invocation.
pub trait ValueProvider {
    fn value_for(&mut self, required: TypeId, display_name: &str)
        -> std::result::Result<Value, Canceled>;
}

/// Cache key of an invocation result: owning instance identity plus the
/// operation's declaring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub holder: Identity,
    pub declaring: TypeId,
    pub slot: usize,
}

impl CacheKey {
    pub fn new(holder: Identity, descriptor: &OperationDescriptor) -> Self {
        CacheKey {
            holder,
            declaring: descriptor.declaring,
            slot: descriptor.slot,
        }
    }
}

/// A stored invocation result, re-displayable across rebuilds until
/// replaced by a new invocation of the same (instance, operation) pair.
pub struct CachedResult {
    /// Pins the owning instance so the identity key cannot be reused by a
    /// new allocation.
    pub holder: Value,
    pub value: Value,
    pub display: TypeId,
    pub fault: bool,
}

/// Invocation results keyed by (owning instance identity, operation).
/// Persists across tree rebuilds; one session owns one cache.
#[derive(Default)]
pub struct InvokeCache {
    entries: HashMap<CacheKey, CachedResult>,
}

impl InvokeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, holder: Identity, descriptor: &OperationDescriptor) -> Option<&CachedResult> {
        self.entries.get(&CacheKey::new(holder, descriptor))
    }

    pub fn insert(&mut self, key: CacheKey, result: CachedResult) {
        self.entries.insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Report of one invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeReport {
    /// The user canceled an argument request; no call was made.
    Canceled,
    /// The call completed. `key` names the stored result when one was
    /// cached (a non-void value or a captured fault).
    Completed { fault: bool, key: Option<CacheKey> },
}

/// Collects arguments from a [`ValueProvider`], performs the call through
/// the registry, and stores result-or-fault for reattachment by the
/// expander.
pub struct InvocationBridge<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> InvocationBridge<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        InvocationBridge { registry }
    }

    pub fn invoke(
        &self,
        tree: &Tree,
        node: NodeId,
        provider: &mut dyn ValueProvider,
        cache: &mut InvokeCache,
    ) -> Result<InvokeReport> {
        let NodeKind::Operation(op) = tree.kind(node) else {
            return Err(InspectError::InvalidTarget(
                "invoke target is not an operation node".to_string(),
            ));
        };
        let descriptor = op.descriptor.clone();

        let mut args = Vec::with_capacity(descriptor.params.len());
        for param in &descriptor.params {
            let value = match provider.value_for(param.ty, &param.name) {
                Ok(value) => value,
                Err(Canceled) => return Ok(InvokeReport::Canceled),
            };
            if !self.registry.value_assignable(&value, param.ty) {
                return Err(InspectError::Incompatible {
                    expected: self.registry.name(param.ty).to_string(),
                    actual: value.kind_name().to_string(),
                });
            }
            args.push(value);
        }

        let outcome = self.registry.invoke(&op.holder, &descriptor, &args)?;
        let (value, fault) = match outcome {
            InvokeOutcome::Value(value) => (value, false),
            InvokeOutcome::Fault(message) => {
                log::debug!("captured fault from {}: {message}", descriptor.name);
                (Value::text(message), true)
            }
        };

        // Void successes are not cached; there is nothing to re-display.
        if !fault && descriptor.ret == self.registry.builtins().unit {
            return Ok(InvokeReport::Completed { fault, key: None });
        }

        let key = op.holder.identity().map(|identity| {
            let key = CacheKey::new(identity, &descriptor);
            let display = if fault {
                self.registry.builtins().text
            } else {
                self.registry.most_specific(descriptor.ret, &value)
            };
            cache.insert(
                key,
                CachedResult {
                    holder: op.holder.clone(),
                    value,
                    display,
                    fault,
                },
            );
            key
        });

        Ok(InvokeReport::Completed { fault, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample, Sample};
    use crate::node::{OperationNode, Origin, ValueNode};
    use pretty_assertions::assert_eq;

    struct Give(Vec<Value>);

    impl ValueProvider for Give {
        fn value_for(
            &mut self,
            _required: TypeId,
            _display_name: &str,
        ) -> std::result::Result<Value, Canceled> {
            if self.0.is_empty() {
                Err(Canceled)
            } else {
                Ok(self.0.remove(0))
            }
        }
    }

    fn tree_with_operation(sample: &Sample, name: &str) -> (Tree, NodeId) {
        let mut tree = Tree::new(NodeKind::Value(ValueNode {
            holder: None,
            origin: Origin::None,
            display: sample.widget,
            value: sample.shared.clone(),
            fault: false,
        }));
        let metadata = sample.registry.metadata(sample.widget).unwrap();
        let descriptor = metadata
            .operations
            .iter()
            .find(|op| op.name == name)
            .unwrap()
            .clone();
        let root = tree.root();
        let node = tree.add_child(
            root,
            NodeKind::Operation(OperationNode {
                holder: sample.shared.clone(),
                descriptor,
            }),
        );
        (tree, node)
    }

    #[test]
    fn test_void_success_is_not_cached() {
        let sample = sample();
        let (tree, node) = tree_with_operation(&sample, "clear");
        let bridge = InvocationBridge::new(&sample.registry);
        let mut cache = InvokeCache::new();

        let report = bridge
            .invoke(&tree, node, &mut Give(Vec::new()), &mut cache)
            .unwrap();
        assert_eq!(report, InvokeReport::Completed { fault: false, key: None });
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cancellation_skips_the_call() {
        let sample = sample();
        let (tree, node) = tree_with_operation(&sample, "rename");
        let bridge = InvocationBridge::new(&sample.registry);
        let mut cache = InvokeCache::new();

        let report = bridge
            .invoke(&tree, node, &mut Give(Vec::new()), &mut cache)
            .unwrap();
        assert_eq!(report, InvokeReport::Canceled);
        assert!(cache.is_empty());

        // The widget's label was never touched.
        let metadata = sample.registry.metadata(sample.widget).unwrap();
        let label = metadata.fields.iter().find(|f| f.name == "label").unwrap();
        assert_eq!(
            sample
                .registry
                .field_value(&sample.shared, label)
                .unwrap()
                .as_text()
                .unwrap(),
            "alpha"
        );
    }

    #[test]
    fn test_fault_is_cached_with_text_display() {
        let sample = sample();
        let (tree, node) = tree_with_operation(&sample, "fail");
        let bridge = InvocationBridge::new(&sample.registry);
        let mut cache = InvokeCache::new();

        let report = bridge
            .invoke(&tree, node, &mut Give(Vec::new()), &mut cache)
            .unwrap();
        let key = match report {
            InvokeReport::Completed { fault: true, key: Some(key) } => key,
            other => panic!("expected a cached fault, got {other:?}"),
        };
        let metadata = sample.registry.metadata(sample.widget).unwrap();
        let descriptor = metadata
            .operations
            .iter()
            .find(|op| op.name == "fail")
            .unwrap()
            .clone();
        let cached = cache.get(key.holder, &descriptor).unwrap();
        assert!(cached.fault);
        assert_eq!(cached.display, sample.registry.builtins().text);
        assert_eq!(cached.value.as_text().unwrap(), "widget failure");
    }

    #[test]
    fn test_argument_type_checked_against_parameter() {
        let sample = sample();
        let (tree, node) = tree_with_operation(&sample, "rename");
        let bridge = InvocationBridge::new(&sample.registry);
        let mut cache = InvokeCache::new();

        let result = bridge.invoke(&tree, node, &mut Give(vec![Value::I32(1)]), &mut cache);
        assert!(matches!(result, Err(InspectError::Incompatible { .. })));
    }
}
