use regex::{Regex, RegexBuilder};

use ferroscope_reflect::{TypeId, TypeRegistry};

use crate::error::Result;
use crate::node::{NodeId, NodeKind, Tree};

/// Reserved prefix turning the filter text into an exact type-name lookup.
pub const TYPE_MARKER: char = '$';

/// Parsed filter constraints: an optional case-insensitive pattern over
/// display labels, and an optional required type the display type must be
/// assignable to.
pub struct FilterSpec {
    pattern: Option<Regex>,
    target: Option<TypeId>,
}

impl FilterSpec {
    /// Parse filter text against a registry, inheriting the required type
    /// of an in-progress selection flow when one is active. A `$name`
    /// lookup replaces the selection target; an unknown name clears the
    /// type constraint.
    pub fn parse(
        text: &str,
        selection_target: Option<TypeId>,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        if let Some(name) = text.strip_prefix(TYPE_MARKER) {
            let target = registry.type_by_name(name);
            if target.is_none() {
                log::warn!("unknown type in filter: {name}");
            }
            return Ok(FilterSpec {
                pattern: None,
                target,
            });
        }
        let pattern = if text.is_empty() {
            None
        } else {
            Some(RegexBuilder::new(text).case_insensitive(true).build()?)
        };
        Ok(FilterSpec {
            pattern,
            target: selection_target,
        })
    }

    pub fn unconstrained() -> Self {
        FilterSpec {
            pattern: None,
            target: None,
        }
    }

    fn is_active(&self) -> bool {
        self.pattern.is_some() || self.target.is_some()
    }
}

/// Post-order pruning pass, in place. A node survives if it has surviving
/// children, or it is a leaf whose label and type satisfy both active
/// constraints. Sibling order of survivors is preserved.
pub fn filter(tree: &mut Tree, spec: &FilterSpec, registry: &TypeRegistry) {
    filter_children(tree, tree.root(), spec, registry);
}

fn filter_children(tree: &mut Tree, node: NodeId, spec: &FilterSpec, registry: &TypeRegistry) {
    let children = tree.children(node).to_vec();
    let mut survivors = Vec::with_capacity(children.len());
    for child in children {
        // Cached result subtrees under operation nodes are not descended
        // into; the operation either survives as a whole or goes.
        if !matches!(tree.kind(child), NodeKind::Operation(_)) {
            filter_children(tree, child, spec, registry);
        }
        if survives(tree, child, spec, registry) {
            survivors.push(child);
        }
    }
    tree.set_children(node, survivors);
}

fn survives(tree: &Tree, node: NodeId, spec: &FilterSpec, registry: &TypeRegistry) -> bool {
    if !tree.children(node).is_empty() {
        return true;
    }
    match tree.kind(node) {
        NodeKind::Operation(op) => {
            let name_ok = spec
                .pattern
                .as_ref()
                .map(|pattern| pattern.is_match(&op.descriptor.name))
                .unwrap_or(true);
            let type_ok = spec
                .target
                .map(|target| registry.assignable(op.descriptor.ret, target))
                .unwrap_or(true);
            name_ok && type_ok
        }
        NodeKind::Value(value) => {
            let label_ok = spec
                .pattern
                .as_ref()
                .map(|pattern| pattern.is_match(&tree.label(node, registry)))
                .unwrap_or(true);
            let type_ok = spec
                .target
                .map(|target| registry.assignable(value.display, target))
                .unwrap_or(true);
            label_ok && type_ok
        }
        NodeKind::Shortcut(_) => !spec.is_active(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::Expander;
    use crate::fixtures::sample;
    use crate::invoke::InvokeCache;
    use crate::node::tests_support::labels_of;
    use crate::node::{Origin, ValueNode};
    use crate::options::InspectOptions;
    use pretty_assertions::assert_eq;

    fn expanded_tree(sample: &crate::fixtures::Sample, options: &InspectOptions) -> Tree {
        let mut tree = Tree::new(NodeKind::Value(ValueNode {
            holder: None,
            origin: Origin::None,
            display: sample
                .registry
                .most_specific(sample.registry.builtins().any, &sample.root),
            value: sample.root.clone(),
            fault: false,
        }));
        let cache = InvokeCache::new();
        let root = tree.root();
        Expander::new(&sample.registry, options, &cache)
            .expand(&mut tree, root)
            .unwrap();
        tree
    }

    #[test]
    fn test_pattern_keeps_ancestors_of_sole_match() {
        let sample = sample();
        let mut tree = expanded_tree(&sample, &InspectOptions::default());

        // "w2" appears on exactly one leaf, under items[2].label.
        let spec = FilterSpec::parse("w2", None, &sample.registry).unwrap();
        filter(&mut tree, &spec, &sample.registry);

        let root_labels = labels_of(&tree, tree.children(tree.root()), &sample.registry);
        assert_eq!(root_labels, vec!["items : [Widget]"]);

        let items = tree.children(tree.root())[0];
        let item_labels = labels_of(&tree, tree.children(items), &sample.registry);
        assert_eq!(item_labels, vec!["[2] : Widget"]);

        let leaf = tree.children(items)[0];
        let leaf_labels = labels_of(&tree, tree.children(leaf), &sample.registry);
        assert_eq!(leaf_labels, vec!["label : text = w2"]);
    }

    #[test]
    fn test_pattern_is_case_insensitive() {
        let sample = sample();
        let mut tree = expanded_tree(&sample, &InspectOptions::default());

        let spec = FilterSpec::parse("W2", None, &sample.registry).unwrap();
        filter(&mut tree, &spec, &sample.registry);
        assert!(!tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_operation_nodes_match_by_name() {
        let sample = sample();
        let mut tree = expanded_tree(&sample, &InspectOptions::default());

        let spec = FilterSpec::parse("ping", None, &sample.registry).unwrap();
        filter(&mut tree, &spec, &sample.registry);

        // Only the item path survives; the twin collapses to a shortcut
        // leaf, which any active constraint removes.
        let root_labels = labels_of(&tree, tree.children(tree.root()), &sample.registry);
        assert_eq!(root_labels, vec!["item : Widget", "items : [Widget]"]);
    }

    #[test]
    fn test_type_marker_lookup() {
        let sample = sample();
        let mut tree = expanded_tree(&sample, &InspectOptions::default());

        let spec = FilterSpec::parse("$Widget", None, &sample.registry).unwrap();
        filter(&mut tree, &spec, &sample.registry);

        let preorder = tree.preorder();
        // Every surviving leaf is a Widget-typed value or an operation
        // returning one; the aliased twin's shortcut leaf is gone.
        assert!(preorder.len() > 1);
        for node in preorder {
            if tree.children(node).is_empty() && node != tree.root() {
                match tree.kind(node) {
                    NodeKind::Value(value) => {
                        assert!(sample.registry.assignable(value.display, sample.widget))
                    }
                    NodeKind::Operation(op) => {
                        assert!(sample.registry.assignable(op.descriptor.ret, sample.widget))
                    }
                    NodeKind::Shortcut(_) => panic!("shortcut survived an active constraint"),
                }
            }
        }
    }

    #[test]
    fn test_unknown_type_marker_clears_constraint() {
        let sample = sample();
        let spec = FilterSpec::parse("$NoSuchType", Some(sample.widget), &sample.registry).unwrap();
        let mut tree = expanded_tree(&sample, &InspectOptions::default());
        let before = tree.preorder().len();
        filter(&mut tree, &spec, &sample.registry);
        assert_eq!(tree.preorder().len(), before);
    }

    #[test]
    fn test_no_constraints_keeps_everything_including_shortcuts() {
        let sample = sample();
        let mut tree = expanded_tree(&sample, &InspectOptions::default());
        let before = tree.preorder().len();

        let spec = FilterSpec::parse("", None, &sample.registry).unwrap();
        filter(&mut tree, &spec, &sample.registry);
        assert_eq!(tree.preorder().len(), before);
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let sample = sample();
        assert!(FilterSpec::parse("[unclosed", None, &sample.registry).is_err());
    }
}
