//! Terminal rendering of a session tree: one indented line per visible
//! row, expand state kept locally.

use std::collections::HashSet;

use console::style;
use ferroscope_inspect::{NodeId, NodeKind, RowView, Session, Tree};

pub struct ConsoleView {
    tree: Option<Tree>,
    expanded: HashSet<NodeId>,
    rows: Vec<NodeId>,
    selected: Option<usize>,
}

impl ConsoleView {
    pub fn new() -> Self {
        ConsoleView {
            tree: None,
            expanded: HashSet::new(),
            rows: Vec::new(),
            selected: None,
        }
    }

    pub fn select(&mut self, row: usize) {
        if row < self.rows.len() {
            self.selected = Some(row);
        }
    }

    pub fn collapse_row(&mut self, row: usize) {
        if let Some(id) = self.rows.get(row).copied() {
            self.expanded.remove(&id);
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.rows.clear();
        if let Some(tree) = &self.tree {
            let mut stack = vec![tree.root()];
            while let Some(id) = stack.pop() {
                self.rows.push(id);
                if self.expanded.contains(&id) {
                    for child in tree.children(id).iter().rev() {
                        stack.push(*child);
                    }
                }
            }
        }
        if let Some(selected) = self.selected {
            if selected >= self.rows.len() {
                self.selected = None;
            }
        }
    }

    fn depth_of(&self, id: NodeId) -> usize {
        let Some(tree) = &self.tree else { return 0 };
        let mut depth = 0;
        let mut cursor = id;
        while let Some(parent) = tree.parent(cursor) {
            depth += 1;
            cursor = parent;
        }
        depth
    }

    /// Print every visible row: `>` for collapsed internal nodes, `v` for
    /// expanded ones, styled by node kind.
    pub fn render(&self, session: &Session) {
        let Some(tree) = &self.tree else { return };
        println!("{}", style(session.title()).bold().underlined());
        for (row, id) in self.rows.iter().enumerate() {
            let indent = "  ".repeat(self.depth_of(*id));
            let marker = if tree.children(*id).is_empty() {
                ' '
            } else if self.expanded.contains(id) {
                'v'
            } else {
                '>'
            };
            let label = session.node_label(*id);
            let label = match tree.kind(*id) {
                NodeKind::Value(_) => style(label),
                NodeKind::Operation(_) => style(label).cyan(),
                NodeKind::Shortcut(_) => style(label).dim(),
            };
            let cursor = if self.selected == Some(row) { '*' } else { ' ' };
            println!("{cursor}{row:>3} {indent}{marker} {label}");
        }
        if let Some(selected) = self.selected {
            if let Some(id) = self.rows.get(selected) {
                println!("{}", style(session.node_status(*id)).dim());
            }
        }
    }
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new()
    }
}

impl RowView for ConsoleView {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn is_expanded(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map(|id| self.expanded.contains(id))
            .unwrap_or(false)
    }

    fn expand_row(&mut self, row: usize) {
        if let Some(id) = self.rows.get(row).copied() {
            self.expanded.insert(id);
            self.recompute();
        }
    }

    fn node_at(&self, row: usize) -> Option<NodeId> {
        self.rows.get(row).copied()
    }

    fn selected_row(&self) -> Option<usize> {
        self.selected
    }

    fn reload(&mut self, tree: &Tree) {
        self.tree = Some(tree.clone());
        self.expanded.clear();
        self.recompute();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain;
    use ferroscope_inspect::InspectOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rows_follow_expand_state() {
        let (registry, root) = domain::build().unwrap();
        let mut session = Session::new(registry, root, InspectOptions::default());
        let mut view = ConsoleView::new();
        session.refresh(&mut view).unwrap();

        // The root row is force-expanded by the refresh.
        assert!(view.is_expanded(0));
        let visible = view.row_count();
        assert!(visible > 1);

        // Expanding another row never hides rows; collapsing the root
        // hides everything below it.
        view.expand_row(1);
        assert!(view.row_count() >= visible);
        view.collapse_row(0);
        assert_eq!(view.row_count(), 1);
    }
}
