use std::sync::Arc;

use ferroscope_reflect::{
    parse_primitive, ParseError, ParserTable, TypeId, TypeKind, TypeRegistry, Value,
};

use crate::error::{Canceled, InspectError, Result};
use crate::expand::{ExpandStats, Expander};
use crate::filter::{filter, FilterSpec};
use crate::invoke::{CacheKey, InvocationBridge, InvokeCache, InvokeReport, ValueProvider};
use crate::node::{NodeId, NodeKind, Origin, Tree, ValueNode};
use crate::options::InspectOptions;

/// View collaborator contract: a tree widget that can enumerate rows,
/// report and set per-row expand state, and reload itself from a rebuilt
/// tree. Row indices follow display order of currently visible rows.
pub trait RowView {
    fn row_count(&self) -> usize;
    fn is_expanded(&self, row: usize) -> bool;
    fn expand_row(&mut self, row: usize);
    fn node_at(&self, row: usize) -> Option<NodeId>;
    fn selected_row(&self) -> Option<usize>;
    fn reload(&mut self, tree: &Tree);
}

/// Value-prompt collaborator: asks the user for one value of the required
/// type. Implementations parse text through [`PromptContext::parse_text`]
/// and run a nested selection session when parsing signals one is needed.
pub trait ValuePrompt {
    fn value_for(
        &mut self,
        ctx: &PromptContext<'_>,
        required: TypeId,
        display_name: &str,
        current: &str,
    ) -> std::result::Result<Value, Canceled>;
}

/// Structural-edit collaborator: obtains a replacement value for a
/// field-or-index target, using the same parsing rules as value prompts.
pub trait StructuralEdit {
    fn replacement(
        &mut self,
        ctx: &PromptContext<'_>,
        required: TypeId,
        display_name: &str,
        current: &str,
    ) -> std::result::Result<Value, Canceled>;
}

/// Outcome of text parsing for a required type: a parsed value, or the
/// signal that the type has no text form and needs a selection flow.
pub enum ParseOutcome {
    Parsed(Value),
    NeedsSelection(TypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditReport {
    Applied,
    Canceled,
}

/// What prompt and edit collaborators get to work with: the session's
/// parsing rules and the ability to spawn a nested selection flow over the
/// same root value.
pub struct PromptContext<'a> {
    registry: &'a Arc<TypeRegistry>,
    parsers: &'a ParserTable,
    root: &'a Value,
    options: &'a InspectOptions,
}

impl PromptContext<'_> {
    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    pub fn parse_text(&self, ty: TypeId, text: &str) -> std::result::Result<ParseOutcome, ParseError> {
        parse_with(self.registry, self.parsers, ty, text)
    }

    /// A fresh selection session rooted at the same underlying root value,
    /// restricted to candidates assignable to `target`.
    pub fn selection_session(&self, target: TypeId) -> Session {
        Session::selection(
            Arc::clone(self.registry),
            self.root.clone(),
            target,
            self.options.clone(),
        )
    }
}

fn parse_with(
    registry: &TypeRegistry,
    parsers: &ParserTable,
    ty: TypeId,
    text: &str,
) -> std::result::Result<ParseOutcome, ParseError> {
    let kind = registry.kind(ty);
    if kind.is_primitive() {
        return parse_primitive(kind, text).map(ParseOutcome::Parsed);
    }
    match parsers.parse(ty, text) {
        Some(parsed) => parsed.map(ParseOutcome::Parsed),
        None => Ok(ParseOutcome::NeedsSelection(ty)),
    }
}

struct PromptProvider<'a, 'b> {
    ctx: PromptContext<'a>,
    prompt: &'b mut dyn ValuePrompt,
}

impl ValueProvider for PromptProvider<'_, '_> {
    fn value_for(
        &mut self,
        required: TypeId,
        display_name: &str,
    ) -> std::result::Result<Value, Canceled> {
        self.prompt.value_for(&self.ctx, required, display_name, "")
    }
}

/// One browsing pass over a root value: owns the generated tree, the
/// visibility options, the filter text, the custom parser table and the
/// invocation cache, and orchestrates rebuilds against a view collaborator.
///
/// The whole tree is discarded and rebuilt on every refresh; cached
/// invocation results survive rebuilds and reattach under their operation
/// nodes.
pub struct Session {
    registry: Arc<TypeRegistry>,
    root: Value,
    target: Option<TypeId>,
    options: InspectOptions,
    filter_text: String,
    parsers: ParserTable,
    cache: InvokeCache,
    tree: Tree,
    last_result: Option<CacheKey>,
}

impl Session {
    pub fn new(registry: Arc<TypeRegistry>, root: Value, options: InspectOptions) -> Self {
        Self::build(registry, root, None, options)
    }

    /// A selection session: browsing restricted to values assignable to
    /// `target`, ended by [`Session::accept`] or cancellation.
    pub fn selection(
        registry: Arc<TypeRegistry>,
        root: Value,
        target: TypeId,
        options: InspectOptions,
    ) -> Self {
        Self::build(registry, root, Some(target), options)
    }

    fn build(
        registry: Arc<TypeRegistry>,
        root: Value,
        target: Option<TypeId>,
        options: InspectOptions,
    ) -> Self {
        let parsers = ParserTable::new(registry.builtins().text);
        let display = registry.most_specific(registry.builtins().any, &root);
        let tree = Tree::new(NodeKind::Value(ValueNode {
            holder: None,
            origin: Origin::None,
            display,
            value: root.clone(),
            fault: false,
        }));
        Session {
            registry,
            root,
            target,
            options,
            filter_text: String::new(),
            parsers,
            cache: InvokeCache::new(),
            tree,
            last_result: None,
        }
    }

    /// Register a custom text-to-value mapping for a type.
    pub fn with_parser(
        mut self,
        ty: TypeId,
        parser: impl Fn(&str) -> std::result::Result<Value, ParseError> + 'static,
    ) -> Self {
        self.parsers.register(ty, parser);
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn target(&self) -> Option<TypeId> {
        self.target
    }

    pub fn options(&self) -> &InspectOptions {
        &self.options
    }

    /// Mutate options; the caller refreshes afterwards.
    pub fn options_mut(&mut self) -> &mut InspectOptions {
        &mut self.options
    }

    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Window title: the selection target's name, or the root value's
    /// default description.
    pub fn title(&self) -> String {
        match self.target {
            Some(target) => self.registry.name(target).to_string(),
            None => self.registry.describe(&self.root),
        }
    }

    pub fn node_label(&self, node: NodeId) -> String {
        self.tree.label(node, &self.registry)
    }

    pub fn node_status(&self, node: NodeId) -> String {
        self.tree.status(node, &self.registry)
    }

    pub fn parse_text(&self, ty: TypeId, text: &str) -> std::result::Result<ParseOutcome, ParseError> {
        parse_with(&self.registry, &self.parsers, ty, text)
    }

    /// Discard and rebuild the whole tree: expand, append selection
    /// candidates, filter, then reload the view restoring expand state by
    /// row index. The root row and the row of an operation that just
    /// received a fresh result are force-expanded.
    pub fn refresh(&mut self, view: &mut dyn RowView) -> Result<ExpandStats> {
        let expanded: Vec<bool> = (0..view.row_count()).map(|row| view.is_expanded(row)).collect();

        let display = self
            .registry
            .most_specific(self.registry.builtins().any, &self.root);
        let mut tree = Tree::new(NodeKind::Value(ValueNode {
            holder: None,
            origin: Origin::None,
            display,
            value: self.root.clone(),
            fault: false,
        }));
        let root = tree.root();
        let expander = Expander::new(&self.registry, &self.options, &self.cache);
        let stats = expander.expand(&mut tree, root)?;

        if let Some(target) = self.target {
            // Acceptance candidates: a null of the target type, and an
            // empty sequence for sequence targets.
            tree.add_child(
                root,
                NodeKind::Value(ValueNode {
                    holder: None,
                    origin: Origin::None,
                    display: target,
                    value: Value::Null,
                    fault: false,
                }),
            );
            if let TypeKind::Seq(element) = self.registry.kind(target) {
                tree.add_child(
                    root,
                    NodeKind::Value(ValueNode {
                        holder: None,
                        origin: Origin::None,
                        display: target,
                        value: Value::seq(target, *element, Vec::new()),
                        fault: false,
                    }),
                );
            }
        }

        let spec = FilterSpec::parse(&self.filter_text, self.target, &self.registry)?;
        filter(&mut tree, &spec, &self.registry);
        self.tree = tree;

        view.reload(&self.tree);
        for (row, was_expanded) in expanded.iter().enumerate() {
            if *was_expanded && row < view.row_count() {
                view.expand_row(row);
            }
        }
        view.expand_row(0);

        if let Some(key) = self.last_result.take() {
            let mut row = 0;
            while row < view.row_count() {
                if let Some(id) = view.node_at(row) {
                    if let NodeKind::Operation(op) = self.tree.kind(id) {
                        if op.holder.identity() == Some(key.holder)
                            && op.descriptor.declaring == key.declaring
                            && op.descriptor.slot == key.slot
                        {
                            view.expand_row(row);
                        }
                    }
                }
                row += 1;
            }
        }

        log::info!(
            "rebuilt tree: {} nodes, {} shortcuts, {} depth-capped",
            stats.nodes,
            stats.shortcuts,
            stats.depth_capped
        );
        Ok(stats)
    }

    /// Drive the invocation bridge for an operation node, then refresh.
    /// Cancellation makes no call and leaves the tree unchanged.
    pub fn invoke(
        &mut self,
        view: &mut dyn RowView,
        node: NodeId,
        prompt: &mut dyn ValuePrompt,
    ) -> Result<InvokeReport> {
        let report = {
            let ctx = PromptContext {
                registry: &self.registry,
                parsers: &self.parsers,
                root: &self.root,
                options: &self.options,
            };
            let mut provider = PromptProvider { ctx, prompt };
            let bridge = InvocationBridge::new(&self.registry);
            bridge.invoke(&self.tree, node, &mut provider, &mut self.cache)?
        };
        if let InvokeReport::Completed { key, .. } = report {
            self.last_result = key;
            self.refresh(view)?;
        }
        Ok(report)
    }

    /// Replace the value behind a field- or element-originated node, then
    /// refresh. The replacement must be assignable to the node's display
    /// type.
    pub fn edit(
        &mut self,
        view: &mut dyn RowView,
        node: NodeId,
        editor: &mut dyn StructuralEdit,
    ) -> Result<EditReport> {
        let NodeKind::Value(value_node) = self.tree.kind(node) else {
            return Err(InspectError::InvalidTarget(
                "edit target is not a value node".to_string(),
            ));
        };
        let holder = value_node.holder.clone().ok_or_else(|| {
            InspectError::InvalidTarget("edit target has no owning instance".to_string())
        })?;
        let display = value_node.display;
        let origin = value_node.origin.clone();
        let current_value = value_node.value.clone();

        let display_name = match &origin {
            Origin::Field(field) => field.name.clone(),
            Origin::Element(index) => format!("[{index}]"),
            Origin::None => {
                return Err(InspectError::InvalidTarget(
                    "edit target is neither a field nor an element".to_string(),
                ))
            }
        };
        let current = if current_value.is_null() {
            String::new()
        } else {
            self.registry.describe(&current_value)
        };

        let replacement = {
            let ctx = PromptContext {
                registry: &self.registry,
                parsers: &self.parsers,
                root: &self.root,
                options: &self.options,
            };
            match editor.replacement(&ctx, display, &display_name, &current) {
                Ok(value) => value,
                Err(Canceled) => return Ok(EditReport::Canceled),
            }
        };
        if !self.registry.value_assignable(&replacement, display) {
            return Err(InspectError::Incompatible {
                expected: self.registry.name(display).to_string(),
                actual: replacement.kind_name().to_string(),
            });
        }

        match origin {
            Origin::Field(field) => self.registry.set_field(&holder, &field, replacement)?,
            Origin::Element(index) => holder.seq_set(index, replacement)?,
            Origin::None => unreachable!("checked above"),
        }

        self.refresh(view)?;
        Ok(EditReport::Applied)
    }

    /// Selection flows only: the displayed node's value, if assignable to
    /// the selection target.
    pub fn accept(&self, node: NodeId) -> Result<Value> {
        let target = self.target.ok_or_else(|| {
            InspectError::InvalidTarget("accept outside a selection session".to_string())
        })?;
        let NodeKind::Value(value_node) = self.tree.kind(node) else {
            return Err(InspectError::InvalidTarget(
                "accept target is not a value node".to_string(),
            ));
        };
        if !self.registry.value_assignable(&value_node.value, target) {
            return Err(InspectError::Incompatible {
                expected: self.registry.name(target).to_string(),
                actual: value_node.value.kind_name().to_string(),
            });
        }
        Ok(value_node.value.clone())
    }

    /// Replace a shortcut's siblings with a fresh, fully expanded copy of
    /// the referenced node, preserving the view's expand state around the
    /// swap.
    pub fn expand_shortcut(&mut self, view: &mut dyn RowView, node: NodeId) -> Result<()> {
        let NodeKind::Shortcut(shortcut) = self.tree.kind(node) else {
            return Err(InspectError::InvalidTarget(
                "not a shortcut node".to_string(),
            ));
        };
        let target = shortcut.target;
        let parent = self.tree.parent(node).ok_or_else(|| {
            InspectError::InvalidTarget("shortcut has no parent".to_string())
        })?;
        let NodeKind::Value(referenced) = self.tree.kind(target) else {
            return Err(InspectError::InvalidTarget(
                "shortcut target is not a value node".to_string(),
            ));
        };
        let copy = referenced.clone();

        let expanded: Vec<bool> = (0..view.row_count()).map(|row| view.is_expanded(row)).collect();

        self.tree.clear_children(parent);
        let fresh = self.tree.add_child(parent, NodeKind::Value(copy));
        let expander = Expander::new(&self.registry, &self.options, &self.cache);
        expander.expand(&mut self.tree, fresh)?;

        view.reload(&self.tree);
        for (row, was_expanded) in expanded.iter().enumerate() {
            if *was_expanded && row < view.row_count() {
                view.expand_row(row);
            }
        }
        Ok(())
    }
}
