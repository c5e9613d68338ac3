//! # Ferroscope Reflect
//!
//! Dynamic values and reflective access for live object-graph inspection.
//!
//! Rust has no runtime reflection, so reflective access is an explicit
//! capability layer: hosts register their types once as per-type adapters
//! (fields with accessors, operations with bodies, supertype projections),
//! and the engine then operates purely on registered dynamic values.
//!
//! ## Architecture
//!
//! ```text
//! ClassSpec / FieldSpec / OperationSpec
//!     │  (registration phase, &mut)
//!     ▼
//! TypeRegistry ──────────────┐
//!     ├─ built-in kinds      │  shared via Arc across sessions
//!     ├─ class adapters      │
//!     ├─ assignability       │
//!     └─ TypeMetadata cache ─┘  (compute once, read many)
//!     │
//!     ▼
//! Value (Null / primitives / Text / Seq / Object)
//!     └─ Identity: pointer-derived key for cycle/duplicate detection
//! ```
//!
//! Failures raised by invoked operation bodies (errors and panics) are
//! captured as displayable faults; plumbing problems surface as
//! [`ReflectError`].

mod error;
mod metadata;
mod parse;
mod registry;
mod value;

pub use error::{ParseError, ReflectError, Result};
pub use metadata::{FieldRef, OperationDescriptor, Parameter, TypeMetadata};
pub use parse::{parse_char, parse_primitive, ParserTable};
pub use registry::{
    Builtins, ClassSpec, FieldSpec, InvokeOutcome, OperationSpec, TypeId, TypeKind, TypeRegistry,
};
pub use value::{Identity, ObjectCell, SeqData, Value};
