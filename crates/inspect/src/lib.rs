//! # Ferroscope Inspect
//!
//! Tree-shaped browsing and mutation of live object graphs.
//!
//! A [`Session`] pairs one root [`Value`](ferroscope_reflect::Value) with
//! one rebuilt-on-demand tree: every refresh discards the previous tree,
//! re-expands the graph, filters it, then reloads the view collaborator
//! while restoring its expand state.
//!
//! ## Architecture
//!
//! ```text
//! Session ──────────────────────────────┐
//!     │ refresh                         │ invoke / edit
//!     ▼                                 ▼
//! Expander                        InvocationBridge
//!     ├─ ancestors → "parent"          ├─ args via ValuePrompt
//!     ├─ seen      → "reference"       ├─ faults become values
//!     └─ depth cap                     └─ InvokeCache (survives rebuilds)
//!     │
//!     ▼
//! Tree ── filter (post-order, leaves only) ── RowView
//! ```
//!
//! Views, prompts and structural edits are collaborator traits; the crate
//! never draws anything itself.

mod error;
mod expand;
mod filter;
#[cfg(test)]
mod fixtures;
mod invoke;
mod node;
mod options;
mod session;

pub use error::{Canceled, InspectError, Result};
pub use expand::{ExpandStats, Expander};
pub use filter::{filter, FilterSpec, TYPE_MARKER};
pub use invoke::{
    CacheKey, CachedResult, InvocationBridge, InvokeCache, InvokeReport, ValueProvider,
};
pub use node::{
    Node, NodeId, NodeKind, OperationNode, Origin, ShortcutKind, ShortcutNode, Tree, ValueNode,
};
pub use options::InspectOptions;
pub use session::{
    EditReport, ParseOutcome, PromptContext, RowView, Session, StructuralEdit, ValuePrompt,
};
