use std::collections::HashMap;

use ferroscope_reflect::{Identity, TypeKind, TypeRegistry, Value};

use crate::error::Result;
use crate::invoke::InvokeCache;
use crate::node::{
    NodeId, NodeKind, OperationNode, Origin, ShortcutKind, ShortcutNode, Tree, ValueNode,
};
use crate::options::InspectOptions;

/// Counters reported by one expansion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpandStats {
    pub nodes: usize,
    pub shortcuts: usize,
    pub depth_capped: usize,
}

/// Cycle/duplicate guard state for one expansion pass, keyed by value
/// identity. `ancestors` holds the active recursion path; `seen` holds
/// every value introduced anywhere in the pass, populated unless duplicate
/// display is enabled.
struct GuardPass {
    ancestors: HashMap<Identity, NodeId>,
    seen: HashMap<Identity, NodeId>,
    stats: ExpandStats,
}

/// Recursively synthesizes child nodes (fields, sequence elements,
/// applicable operations) under a value node, producing a strictly
/// tree-shaped view of an arbitrary, possibly self-referential object graph.
pub struct Expander<'a> {
    registry: &'a TypeRegistry,
    options: &'a InspectOptions,
    cache: &'a InvokeCache,
}

impl<'a> Expander<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        options: &'a InspectOptions,
        cache: &'a InvokeCache,
    ) -> Self {
        Expander {
            registry,
            options,
            cache,
        }
    }

    /// Expand the subtree under `root` in place. The root's own value is
    /// seeded into the guard maps; it is on the open recursion path.
    pub fn expand(&self, tree: &mut Tree, root: NodeId) -> Result<ExpandStats> {
        let mut pass = GuardPass {
            ancestors: HashMap::new(),
            seen: HashMap::new(),
            stats: ExpandStats::default(),
        };

        if let NodeKind::Value(node) = tree.kind(root) {
            if let Some(identity) = node.value.identity() {
                pass.ancestors.insert(identity, root);
                if !self.options.show_duplicates {
                    pass.seen.insert(identity, root);
                }
            }
        }

        self.generate(tree, root, &mut pass, 0)?;
        log::debug!(
            "expansion pass: {} nodes, {} shortcuts, {} depth-capped",
            pass.stats.nodes,
            pass.stats.shortcuts,
            pass.stats.depth_capped
        );
        Ok(pass.stats)
    }

    fn generate(&self, tree: &mut Tree, node: NodeId, pass: &mut GuardPass, depth: usize) -> Result<()> {
        let (display, value) = match tree.kind(node) {
            NodeKind::Value(node) => (node.display, node.value.clone()),
            _ => return Ok(()),
        };

        if self.registry.kind(display).is_primitive() || value.is_null() {
            return Ok(());
        }
        if depth >= self.options.max_depth {
            pass.stats.depth_capped += 1;
            log::debug!("depth cap reached under {}", self.registry.name(display));
            return Ok(());
        }

        match self.registry.kind(display).clone() {
            TypeKind::Text => self.generate_text(tree, node, &value, pass),
            TypeKind::Seq(element) => self.generate_seq(tree, node, &value, element, pass, depth),
            TypeKind::Class => self.generate_class(tree, node, display, &value, pass, depth),
            _ => Ok(()),
        }
    }

    fn generate_text(
        &self,
        tree: &mut Tree,
        node: NodeId,
        value: &Value,
        pass: &mut GuardPass,
    ) -> Result<()> {
        if !self.options.text_internals {
            return Ok(());
        }
        let character = self.registry.builtins().character;
        let text = value.as_text().unwrap_or_default();
        for (index, ch) in text.chars().enumerate() {
            tree.add_child(
                node,
                NodeKind::Value(ValueNode {
                    holder: Some(value.clone()),
                    origin: Origin::Element(index),
                    display: character,
                    value: Value::Char(ch),
                    fault: false,
                }),
            );
            pass.stats.nodes += 1;
        }
        Ok(())
    }

    fn generate_seq(
        &self,
        tree: &mut Tree,
        node: NodeId,
        value: &Value,
        element: ferroscope_reflect::TypeId,
        pass: &mut GuardPass,
        depth: usize,
    ) -> Result<()> {
        let len = value.seq_len()?;
        for index in 0..len {
            let item = value.seq_get(index)?;
            if item.is_null() && !self.options.null_elements {
                continue;
            }
            let display = self.registry.most_specific(element, &item);
            let child = tree.add_child(
                node,
                NodeKind::Value(ValueNode {
                    holder: Some(value.clone()),
                    origin: Origin::Element(index),
                    display,
                    value: item,
                    fault: false,
                }),
            );
            pass.stats.nodes += 1;
            self.propagate(tree, child, pass, depth)?;
        }
        Ok(())
    }

    fn generate_class(
        &self,
        tree: &mut Tree,
        node: NodeId,
        display: ferroscope_reflect::TypeId,
        value: &Value,
        pass: &mut GuardPass,
        depth: usize,
    ) -> Result<()> {
        let metadata = self.registry.metadata(display)?;
        let options = self.options;

        for field in &metadata.fields {
            // A field read failure is a reported defect: it aborts the
            // whole pass instead of being swallowed.
            let field_value = self.registry.field_value(value, field)?;
            let field_display = self.registry.most_specific(field.declared, &field_value);

            if !options.show_fields()
                && (self.registry.kind(field_display).is_primitive() || field_value.is_null())
            {
                continue;
            }
            if !options.public_fields && field.public {
                continue;
            }
            if !options.non_public_fields && !field.public {
                continue;
            }
            if !options.transient_fields && field.transient {
                continue;
            }

            let child = tree.add_child(
                node,
                NodeKind::Value(ValueNode {
                    holder: Some(value.clone()),
                    origin: Origin::Field(field.clone()),
                    display: field_display,
                    value: field_value,
                    fault: false,
                }),
            );
            pass.stats.nodes += 1;
            self.propagate(tree, child, pass, depth)?;
        }

        if !options.show_operations() {
            return Ok(());
        }

        let any = self.registry.builtins().any;
        let unit = self.registry.builtins().unit;
        for descriptor in &metadata.operations {
            let is_void = descriptor.ret == unit;
            if !options.value_operations && !is_void {
                continue;
            }
            if !options.void_operations && is_void {
                continue;
            }
            if !options.operations_with_params && !descriptor.params.is_empty() {
                continue;
            }
            if !options.base_operations && descriptor.declaring == any {
                continue;
            }

            let op_node = tree.add_child(
                node,
                NodeKind::Operation(OperationNode {
                    holder: value.clone(),
                    descriptor: descriptor.clone(),
                }),
            );
            pass.stats.nodes += 1;

            // Reattach the most recent invocation result, rebuilt fresh
            // from the cache and routed through the guard like any child.
            if let Some(identity) = value.identity() {
                if let Some(cached) = self.cache.get(identity, descriptor) {
                    let child = tree.add_child(
                        op_node,
                        NodeKind::Value(ValueNode {
                            holder: None,
                            origin: Origin::None,
                            display: cached.display,
                            value: cached.value.clone(),
                            fault: cached.fault,
                        }),
                    );
                    pass.stats.nodes += 1;
                    self.propagate(tree, child, pass, depth)?;
                }
            }
        }
        Ok(())
    }

    /// Route a freshly created child through the cycle/duplicate guard and
    /// recurse when it introduces a new value.
    fn propagate(&self, tree: &mut Tree, child: NodeId, pass: &mut GuardPass, depth: usize) -> Result<()> {
        let value = match tree.kind(child) {
            NodeKind::Value(node) => node.value.clone(),
            _ => return Ok(()),
        };
        let Some(identity) = value.identity() else {
            return Ok(());
        };

        if let Some(target) = pass.ancestors.get(&identity).copied() {
            tree.add_child(
                child,
                NodeKind::Shortcut(ShortcutNode {
                    kind: ShortcutKind::Parent,
                    target,
                }),
            );
            pass.stats.shortcuts += 1;
        } else if let Some(target) = pass.seen.get(&identity).copied() {
            tree.add_child(
                child,
                NodeKind::Shortcut(ShortcutNode {
                    kind: ShortcutKind::Reference,
                    target,
                }),
            );
            pass.stats.shortcuts += 1;
        } else {
            pass.ancestors.insert(identity, child);
            if !self.options.show_duplicates {
                pass.seen.insert(identity, child);
            }
            self.generate(tree, child, pass, depth + 1)?;
            pass.ancestors.remove(&identity);
        }
        Ok(())
    }
}
