use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::error::{ReflectError, Result};
use crate::registry::TypeId;

/// Identity key of a reference value, derived from its allocation address.
///
/// Two structurally equal but distinct instances carry distinct identities,
/// which is exactly what the cycle/duplicate guard needs. Primitive values
/// have no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity(usize);

impl Identity {
    pub fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

/// Backing storage of a registered class instance. The concrete state is
/// type-erased; the registered adapters downcast it back on every access.
pub struct ObjectCell {
    type_id: TypeId,
    state: RefCell<Box<dyn Any>>,
}

impl ObjectCell {
    /// Registered class of the instance. Not named `type_id` to keep it
    /// from colliding with `Any::type_id` at method resolution through the
    /// `Rc` handle.
    pub fn class_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn borrow_state(&self) -> Ref<'_, Box<dyn Any>> {
        self.state.borrow()
    }

    pub(crate) fn borrow_state_mut(&self) -> RefMut<'_, Box<dyn Any>> {
        self.state.borrow_mut()
    }
}

/// Backing storage of a sequence value. Knows its own minted sequence type
/// so the runtime type of a `Value::Seq` never needs a registry lookup.
pub struct SeqData {
    pub type_id: TypeId,
    pub element: TypeId,
    pub items: Vec<Value>,
}

/// A dynamic value the engine can browse, mutate and pass around.
///
/// `Text`, `Seq` and `Object` are reference variants: cloning a `Value`
/// clones the handle, not the contents, so aliasing and cycles in the host
/// object graph are preserved. Values are deliberately `Rc`-based and not
/// `Send`; a browsing session is single-threaded.
#[derive(Clone)]
pub enum Value {
    Null,
    Unit,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    Text(Rc<RefCell<String>>),
    Seq(Rc<RefCell<SeqData>>),
    Object(Rc<ObjectCell>),
}

macro_rules! value_accessors {
    ($($as_fn:ident, $require_fn:ident, $variant:ident, $ty:ty, $kind:literal;)*) => {$(
        pub fn $as_fn(&self) -> Option<$ty> {
            match self {
                Value::$variant(v) => Some(*v),
                _ => None,
            }
        }

        pub fn $require_fn(&self) -> Result<$ty> {
            self.$as_fn().ok_or(ReflectError::ValueMismatch {
                expected: $kind,
                actual: self.kind_name(),
            })
        }
    )*};
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(Rc::new(RefCell::new(text.into())))
    }

    pub fn seq(type_id: TypeId, element: TypeId, items: Vec<Value>) -> Self {
        Value::Seq(Rc::new(RefCell::new(SeqData {
            type_id,
            element,
            items,
        })))
    }

    pub fn object<T: Any>(type_id: TypeId, state: T) -> Self {
        Value::Object(Rc::new(ObjectCell {
            type_id,
            state: RefCell::new(Box::new(state)),
        }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Identity of a reference value; `None` for primitives and `Null`.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Value::Text(rc) => Some(Identity(Rc::as_ptr(rc) as *const u8 as usize)),
            Value::Seq(rc) => Some(Identity(Rc::as_ptr(rc) as *const u8 as usize)),
            Value::Object(rc) => Some(Identity(Rc::as_ptr(rc) as *const u8 as usize)),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::Text(_) => "text",
            Value::Seq(_) => "seq",
            Value::Object(_) => "object",
        }
    }

    value_accessors! {
        as_bool, require_bool, Bool, bool, "bool";
        as_i8, require_i8, I8, i8, "i8";
        as_i16, require_i16, I16, i16, "i16";
        as_i32, require_i32, I32, i32, "i32";
        as_i64, require_i64, I64, i64, "i64";
        as_f32, require_f32, F32, f32, "f32";
        as_f64, require_f64, F64, f64, "f64";
        as_char, require_char, Char, char, "char";
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(rc) => Some(rc.borrow().clone()),
            _ => None,
        }
    }

    pub fn require_text(&self) -> Result<String> {
        self.as_text().ok_or(ReflectError::ValueMismatch {
            expected: "text",
            actual: self.kind_name(),
        })
    }

    pub fn as_object(&self) -> Option<&Rc<ObjectCell>> {
        match self {
            Value::Object(rc) => Some(rc),
            _ => None,
        }
    }

    pub fn seq_len(&self) -> Result<usize> {
        match self {
            Value::Seq(rc) => Ok(rc.borrow().items.len()),
            _ => Err(ReflectError::ValueMismatch {
                expected: "seq",
                actual: self.kind_name(),
            }),
        }
    }

    pub fn seq_get(&self, index: usize) -> Result<Value> {
        match self {
            Value::Seq(rc) => {
                rc.borrow()
                    .items
                    .get(index)
                    .cloned()
                    .ok_or(ReflectError::ValueMismatch {
                        expected: "seq element",
                        actual: "out of range",
                    })
            }
            _ => Err(ReflectError::ValueMismatch {
                expected: "seq",
                actual: self.kind_name(),
            }),
        }
    }

    pub fn seq_set(&self, index: usize, value: Value) -> Result<()> {
        match self {
            Value::Seq(rc) => {
                let mut data = rc.borrow_mut();
                if index >= data.items.len() {
                    return Err(ReflectError::ValueMismatch {
                        expected: "seq element",
                        actual: "out of range",
                    });
                }
                data.items[index] = value;
                Ok(())
            }
            _ => Err(ReflectError::ValueMismatch {
                expected: "seq",
                actual: self.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_tracks_handles_not_contents() {
        let a = Value::text("same");
        let b = Value::text("same");
        let alias = a.clone();

        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity(), alias.identity());
        assert_eq!(Value::I32(7).identity(), None);
        assert_eq!(Value::Null.identity(), None);
    }

    #[test]
    fn test_object_cell_reports_registered_class() {
        let class = TypeId(11);
        let value = Value::object(class, 5_i32);
        let cell = value.as_object().unwrap();

        // Must be the registered class handle, not `Any::type_id` of the
        // handle itself.
        let reported: TypeId = cell.class_id();
        assert_eq!(reported, class);
    }

    #[test]
    fn test_require_accessors() {
        assert_eq!(Value::I32(7).require_i32().unwrap(), 7);
        assert!(Value::I32(7).require_bool().is_err());
        assert_eq!(Value::text("hi").require_text().unwrap(), "hi");
    }
}
