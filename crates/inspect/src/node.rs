use std::sync::Arc;

use ferroscope_reflect::{FieldRef, OperationDescriptor, TypeId, TypeRegistry, Value};

/// Handle of a node in a [`Tree`] arena. Stable for the lifetime of one
/// generated tree; a rebuild mints fresh handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// What a value node originated from. Field and element origins are
/// mutually exclusive by construction.
#[derive(Clone)]
pub enum Origin {
    None,
    Field(FieldRef),
    Element(usize),
}

#[derive(Clone)]
pub struct ValueNode {
    /// Owning instance; absent for a synthetic root or a reattached
    /// invocation result.
    pub holder: Option<Value>,
    pub origin: Origin,
    /// Display type per the most-specific-class rule.
    pub display: TypeId,
    pub value: Value,
    /// Set when the value is a captured invocation fault.
    pub fault: bool,
}

#[derive(Clone)]
pub struct OperationNode {
    pub holder: Value,
    pub descriptor: Arc<OperationDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKind {
    /// The value is already open further up the active recursion path.
    Parent,
    /// The value already originated a subtree elsewhere in this pass.
    Reference,
}

impl ShortcutKind {
    pub fn label(self) -> &'static str {
        match self {
            ShortcutKind::Parent => "parent",
            ShortcutKind::Reference => "reference",
        }
    }
}

/// Navigation shortcut holding a non-owning handle to another node already
/// present in the tree. Never a structural edge; the strict-tree invariant
/// holds because aliasing and back edges always take this form.
#[derive(Clone)]
pub struct ShortcutNode {
    pub kind: ShortcutKind,
    pub target: NodeId,
}

#[derive(Clone)]
pub enum NodeKind {
    Value(ValueNode),
    Operation(OperationNode),
    Shortcut(ShortcutNode),
}

#[derive(Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub kind: NodeKind,
}

/// Arena-backed display tree. Nodes are addressed by [`NodeId`]; removal
/// detaches children in place and orphaned slots are reclaimed by the next
/// rebuild, so shortcut targets stay valid for the lifetime of the pass.
#[derive(Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_kind: NodeKind) -> Self {
        Tree {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: root_kind,
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn clear_children(&mut self, id: NodeId) {
        self.nodes[id.0].children.clear();
    }

    pub(crate) fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        self.nodes[id.0].children = children;
    }

    /// Number of descendants below a node.
    pub fn descendant_count(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .map(|child| 1 + self.descendant_count(*child))
            .sum()
    }

    /// All nodes in display (preorder) order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_preorder(self.root, &mut out);
        out
    }

    fn collect_preorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for child in self.children(id) {
            self.collect_preorder(*child, out);
        }
    }

    /// Display label of a node, e.g. `wheels : i32 = 4`, `[2] : Engine`,
    /// `throttle(i32) : i32` or `parent`.
    pub fn label(&self, id: NodeId, registry: &TypeRegistry) -> String {
        match self.kind(id) {
            NodeKind::Value(node) => {
                let mut label = match &node.origin {
                    Origin::Field(field) => field.name.clone(),
                    Origin::Element(index) => format!("[{index}]"),
                    Origin::None => "-".to_string(),
                };
                label.push_str(" : ");
                label.push_str(registry.name(node.display));

                let kind = registry.kind(node.display);
                let show_value = kind.is_primitive()
                    || node.display == registry.builtins().text
                    || node.value.is_null();
                if show_value {
                    label.push_str(" = ");
                    label.push_str(&registry.describe(&node.value));
                }
                if node.fault {
                    label.push_str(" (fault)");
                }
                label
            }
            NodeKind::Operation(node) => node.descriptor.signature(registry),
            NodeKind::Shortcut(node) => node.kind.label().to_string(),
        }
    }

    /// Detail line for a selected node: declaring type for fields and
    /// operations, subtree size for internal nodes.
    pub fn status(&self, id: NodeId, registry: &TypeRegistry) -> String {
        match self.kind(id) {
            NodeKind::Value(node) => {
                let mut status = String::new();
                let count = self.descendant_count(id);
                if count != 0 {
                    status.push_str(&format!("({count}) "));
                }
                match &node.origin {
                    Origin::Field(field) => {
                        status.push_str(&format!(
                            "{} :: {}",
                            field.name,
                            registry.name(field.declaring)
                        ));
                    }
                    Origin::Element(index) => status.push_str(&format!("[{index}]")),
                    Origin::None => status.push_str(&registry.describe(&node.value)),
                }
                status
            }
            NodeKind::Operation(node) => format!(
                "{} :: {}",
                node.descriptor.signature(registry),
                registry.name(node.descriptor.declaring)
            ),
            NodeKind::Shortcut(node) => format!("{} (follow to expand)", node.kind.label()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ferroscope_reflect::TypeRegistry;
    use pretty_assertions::assert_eq;

    fn value_node(registry: &TypeRegistry, origin: Origin, value: Value) -> NodeKind {
        let display = registry.most_specific(registry.builtins().any, &value);
        NodeKind::Value(ValueNode {
            holder: None,
            origin,
            display,
            value,
            fault: false,
        })
    }

    #[test]
    fn test_tree_structure() {
        let registry = TypeRegistry::new();
        let mut tree = Tree::new(value_node(&registry, Origin::None, Value::text("root")));

        let a = tree.add_child(tree.root(), value_node(&registry, Origin::Element(0), Value::text("a")));
        let b = tree.add_child(tree.root(), value_node(&registry, Origin::Element(1), Value::text("b")));
        let c = tree.add_child(a, value_node(&registry, Origin::Element(0), Value::text("c")));

        assert_eq!(tree.children(tree.root()), &[a, b]);
        assert_eq!(tree.parent(c), Some(a));
        assert_eq!(tree.descendant_count(tree.root()), 3);
        assert_eq!(tree.preorder(), vec![tree.root(), a, c, b]);
    }

    #[test]
    fn test_value_labels() {
        let registry = TypeRegistry::new();
        let b = *registry.builtins();

        let tree = Tree::new(NodeKind::Value(ValueNode {
            holder: None,
            origin: Origin::Element(2),
            display: b.int32,
            value: Value::I32(7),
            fault: false,
        }));
        assert_eq!(tree.label(tree.root(), &registry), "[2] : i32 = 7");

        let tree = Tree::new(NodeKind::Value(ValueNode {
            holder: None,
            origin: Origin::None,
            display: b.text,
            value: Value::text("oops"),
            fault: true,
        }));
        assert_eq!(tree.label(tree.root(), &registry), "- : text = oops (fault)");
    }

    #[test]
    fn test_shortcut_label() {
        let registry = TypeRegistry::new();
        let mut tree = Tree::new(value_node(&registry, Origin::None, Value::text("root")));
        let shortcut = tree.add_child(
            tree.root(),
            NodeKind::Shortcut(ShortcutNode {
                kind: ShortcutKind::Parent,
                target: tree.root(),
            }),
        );

        assert_eq!(tree.label(shortcut, &registry), "parent");
    }
}
