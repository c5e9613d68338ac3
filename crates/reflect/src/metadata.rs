use std::sync::Arc;

use crate::registry::{TypeId, TypeRegistry};

/// The fields and deduplicated operations of one registered class, collected
/// across its whole ancestry. Immutable once built; cached by the registry
/// for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMetadata {
    pub type_id: TypeId,
    pub fields: Vec<FieldRef>,
    pub operations: Vec<Arc<OperationDescriptor>>,
}

/// A resolved reference to one field slot of a declaring class.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub declaring: TypeId,
    pub slot: usize,
    pub name: String,
    pub declared: TypeId,
    pub public: bool,
    pub transient: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub ty: TypeId,
    pub name: String,
}

/// A resolved reference to one operation slot of a declaring class, with its
/// formal signature. The `unit` return type denotes a void-like operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub declaring: TypeId,
    pub slot: usize,
    pub name: String,
    pub params: Vec<Parameter>,
    pub ret: TypeId,
}

impl OperationDescriptor {
    pub fn is_void(&self, registry: &TypeRegistry) -> bool {
        self.ret == registry.builtins().unit
    }

    /// Display form, e.g. `throttle(i32) : i32` or `start()`.
    pub fn signature(&self, registry: &TypeRegistry) -> String {
        let params = self
            .params
            .iter()
            .map(|p| registry.name(p.ty).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if self.is_void(registry) {
            format!("{}({params})", self.name)
        } else {
            format!("{}({params}) : {}", self.name, registry.name(self.ret))
        }
    }

    /// Two operations are the same overload iff they share a name, a
    /// parameter count and positionwise-identical parameter types, and come
    /// from different declaring types. Equal-length parameter lists are
    /// assumed comparable position by position; documented simplification.
    pub fn same_overload(&self, other: &OperationDescriptor) -> bool {
        self.declaring != other.declaring
            && self.name == other.name
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.ty == b.ty)
    }
}
