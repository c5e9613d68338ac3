use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{ReflectError, Result};
use crate::metadata::{FieldRef, OperationDescriptor, Parameter, TypeMetadata};
use crate::value::{Identity, Value};

/// Handle of a registered type. Only minted by a `TypeRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Unit,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    Text,
    Seq(TypeId),
    Class,
}

impl TypeKind {
    /// Primitive kinds never expand and never carry identity. `Text` is a
    /// string-like leaf, not a primitive.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeKind::Unit
                | TypeKind::Bool
                | TypeKind::I8
                | TypeKind::I16
                | TypeKind::I32
                | TypeKind::I64
                | TypeKind::F32
                | TypeKind::F64
                | TypeKind::Char
        )
    }
}

type Getter = Box<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
type Setter = Box<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;
type Body =
    Box<dyn Fn(&mut dyn Any, &[Value]) -> Result<std::result::Result<Value, String>> + Send + Sync>;
type Project = Box<dyn for<'a> Fn(&'a dyn Any) -> Result<&'a dyn Any> + Send + Sync>;
type ProjectMut = Box<dyn for<'a> Fn(&'a mut dyn Any) -> Result<&'a mut dyn Any> + Send + Sync>;

fn coerce_project(
    f: impl for<'a> Fn(&'a dyn Any) -> Result<&'a dyn Any> + Send + Sync + 'static,
) -> Project {
    Box::new(f)
}

fn coerce_project_mut(
    f: impl for<'a> Fn(&'a mut dyn Any) -> Result<&'a mut dyn Any> + Send + Sync + 'static,
) -> ProjectMut {
    Box::new(f)
}

struct FieldAdapter {
    name: String,
    declared: TypeId,
    public: bool,
    transient: bool,
    get: Getter,
    set: Setter,
}

struct OperationAdapter {
    name: String,
    params: Vec<Parameter>,
    ret: TypeId,
    body: Body,
}

struct Supertype {
    id: TypeId,
    project: Project,
    project_mut: ProjectMut,
}

struct ClassAdapter {
    rust_type: std::any::TypeId,
    supertype: Option<Supertype>,
    fields: Vec<FieldAdapter>,
    operations: Vec<OperationAdapter>,
}

struct TypeEntry {
    name: String,
    kind: TypeKind,
    class: Option<ClassAdapter>,
}

/// One field of a class under registration.
pub struct FieldSpec {
    adapter: FieldAdapter,
}

impl FieldSpec {
    /// Declare a field with a read and a write accessor over the concrete
    /// state type. Public and non-transient by default.
    pub fn new<T, G, S>(name: impl Into<String>, declared: TypeId, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();
        FieldSpec {
            adapter: FieldAdapter {
                name,
                declared,
                public: true,
                transient: false,
                get: Box::new(move |any| {
                    let state = any.downcast_ref::<T>().ok_or_else(|| {
                        ReflectError::AccessFailure(format!("holder type mismatch reading {get_name}"))
                    })?;
                    Ok(get(state))
                }),
                set: Box::new(move |any, value| {
                    let state = any.downcast_mut::<T>().ok_or_else(|| {
                        ReflectError::AccessFailure(format!("holder type mismatch writing {set_name}"))
                    })?;
                    set(state, value)
                }),
            },
        }
    }

    pub fn non_public(mut self) -> Self {
        self.adapter.public = false;
        self
    }

    pub fn transient(mut self) -> Self {
        self.adapter.transient = true;
        self
    }
}

/// One operation of a class under registration. The body runs over the
/// mutable concrete state; a body `Err` is a captured fault, not a
/// registration or plumbing error.
pub struct OperationSpec {
    adapter: OperationAdapter,
}

impl OperationSpec {
    pub fn new<T, B>(name: impl Into<String>, ret: TypeId, body: B) -> Self
    where
        T: Any,
        B: Fn(&mut T, &[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        let body_name = name.clone();
        OperationSpec {
            adapter: OperationAdapter {
                name,
                params: Vec::new(),
                ret,
                body: Box::new(move |any, args| {
                    let state = any.downcast_mut::<T>().ok_or_else(|| {
                        ReflectError::AccessFailure(format!(
                            "holder type mismatch invoking {body_name}"
                        ))
                    })?;
                    Ok(body(state, args))
                }),
            },
        }
    }

    pub fn param(mut self, ty: TypeId, name: impl Into<String>) -> Self {
        self.adapter.params.push(Parameter {
            ty,
            name: name.into(),
        });
        self
    }
}

/// A class under registration: fields, operations and an optional explicit
/// supertype with receiver projections. Classes without an explicit
/// supertype implicitly extend the built-in universal base class.
pub struct ClassSpec {
    name: String,
    rust_type: std::any::TypeId,
    supertype: Option<Supertype>,
    fields: Vec<FieldAdapter>,
    operations: Vec<OperationAdapter>,
}

impl ClassSpec {
    pub fn new<T: Any>(name: impl Into<String>) -> Self {
        ClassSpec {
            name: name.into(),
            rust_type: std::any::TypeId::of::<T>(),
            supertype: None,
            fields: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Declare the supertype, with projections from the concrete state to
    /// the embedded supertype state. The supertype must already be
    /// registered.
    pub fn extends<T, B, P, PM>(mut self, supertype: TypeId, project: P, project_mut: PM) -> Self
    where
        T: Any,
        B: Any,
        P: Fn(&T) -> &B + Send + Sync + 'static,
        PM: Fn(&mut T) -> &mut B + Send + Sync + 'static,
    {
        let name = self.name.clone();
        let name_mut = self.name.clone();
        self.supertype = Some(Supertype {
            id: supertype,
            project: coerce_project(move |any| {
                let state = any.downcast_ref::<T>().ok_or_else(|| {
                    ReflectError::AccessFailure(format!("projection receiver is not a {name}"))
                })?;
                Ok(project(state) as &dyn Any)
            }),
            project_mut: coerce_project_mut(move |any| {
                let state = any.downcast_mut::<T>().ok_or_else(|| {
                    ReflectError::AccessFailure(format!("projection receiver is not a {name_mut}"))
                })?;
                Ok(project_mut(state) as &mut dyn Any)
            }),
        });
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec.adapter);
        self
    }

    pub fn operation(mut self, spec: OperationSpec) -> Self {
        self.operations.push(spec.adapter);
        self
    }
}

/// Well-known built-in type handles.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub unit: TypeId,
    pub boolean: TypeId,
    pub int8: TypeId,
    pub int16: TypeId,
    pub int32: TypeId,
    pub int64: TypeId,
    pub float32: TypeId,
    pub float64: TypeId,
    pub character: TypeId,
    pub text: TypeId,
    /// The universal base class every registered class implicitly extends.
    pub any: TypeId,
}

/// Outcome of a dynamic invocation: a produced value, or a failure raised by
/// the callee captured as a displayable message. Plumbing problems (unknown
/// operation, arity, downcast) surface as `ReflectError` instead.
pub enum InvokeOutcome {
    Value(Value),
    Fault(String),
}

/// Registry of every type the engine can browse: built-in primitives, the
/// text and sequence kinds, and host-registered classes with their access
/// adapters. Shared immutably (`Arc`) across sessions after registration;
/// the per-type metadata cache populates lazily and is safe under concurrent
/// first use.
pub struct TypeRegistry {
    types: Vec<TypeEntry>,
    seq_types: HashMap<TypeId, TypeId>,
    builtins: Builtins,
    metadata: RwLock<HashMap<TypeId, Arc<TypeMetadata>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types = Vec::new();
        let mut builtin = |name: &str, kind: TypeKind| {
            let id = TypeId(types.len());
            types.push(TypeEntry {
                name: name.to_string(),
                kind,
                class: None,
            });
            id
        };

        let unit = builtin("unit", TypeKind::Unit);
        let boolean = builtin("bool", TypeKind::Bool);
        let int8 = builtin("i8", TypeKind::I8);
        let int16 = builtin("i16", TypeKind::I16);
        let int32 = builtin("i32", TypeKind::I32);
        let int64 = builtin("i64", TypeKind::I64);
        let float32 = builtin("f32", TypeKind::F32);
        let float64 = builtin("f64", TypeKind::F64);
        let character = builtin("char", TypeKind::Char);
        let text = builtin("text", TypeKind::Text);

        // The universal base class. Its operations are evaluated directly by
        // the registry; the adapter bodies below are never run.
        let any = TypeId(types.len());
        let unreachable_body: fn(&mut dyn Any, &[Value]) -> Result<std::result::Result<Value, String>> =
            |_, _| Err(ReflectError::AccessFailure("built-in operation body".into()));
        types.push(TypeEntry {
            name: "any".to_string(),
            kind: TypeKind::Class,
            class: Some(ClassAdapter {
                rust_type: std::any::TypeId::of::<()>(),
                supertype: None,
                fields: Vec::new(),
                operations: vec![
                    OperationAdapter {
                        name: "describe".to_string(),
                        params: Vec::new(),
                        ret: text,
                        body: Box::new(unreachable_body),
                    },
                    OperationAdapter {
                        name: "identity".to_string(),
                        params: Vec::new(),
                        ret: int64,
                        body: Box::new(unreachable_body),
                    },
                ],
            }),
        });

        TypeRegistry {
            types,
            seq_types: HashMap::new(),
            builtins: Builtins {
                unit,
                boolean,
                int8,
                int16,
                int32,
                int64,
                float32,
                float64,
                character,
                text,
                any,
            },
            metadata: RwLock::new(HashMap::new()),
        }
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    // == Registration

    pub fn register(&mut self, spec: ClassSpec) -> Result<TypeId> {
        if self.type_by_name(&spec.name).is_some() {
            return Err(ReflectError::DuplicateClass(spec.name));
        }
        // One class per Rust type: a second registration would shadow the
        // first in `runtime_type` downcasts.
        if let Some(existing) = self.types.iter().find(|entry| {
            entry
                .class
                .as_ref()
                .is_some_and(|class| class.rust_type == spec.rust_type)
        }) {
            return Err(ReflectError::DuplicateClass(existing.name.clone()));
        }
        if let Some(sup) = &spec.supertype {
            if self.class(sup.id).is_err() {
                return Err(ReflectError::NotAClass(self.name(sup.id).to_string()));
            }
        }
        let id = TypeId(self.types.len());
        self.types.push(TypeEntry {
            name: spec.name,
            kind: TypeKind::Class,
            class: Some(ClassAdapter {
                rust_type: spec.rust_type,
                supertype: spec.supertype,
                fields: spec.fields,
                operations: spec.operations,
            }),
        });
        Ok(id)
    }

    /// Mint (or reuse) the sequence type over the given element type.
    pub fn seq_of(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.seq_types.get(&element) {
            return *id;
        }
        let id = TypeId(self.types.len());
        self.types.push(TypeEntry {
            name: format!("[{}]", self.types[element.0].name),
            kind: TypeKind::Seq(element),
            class: None,
        });
        self.seq_types.insert(element, id);
        id
    }

    // == Lookup

    pub fn name(&self, ty: TypeId) -> &str {
        &self.types[ty.0].name
    }

    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.types[ty.0].kind
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|entry| entry.name == name)
            .map(TypeId)
    }

    /// Runtime type of a value; `None` for `Null`, which has no type of its
    /// own.
    pub fn runtime_type(&self, value: &Value) -> Option<TypeId> {
        let b = &self.builtins;
        match value {
            Value::Null => None,
            Value::Unit => Some(b.unit),
            Value::Bool(_) => Some(b.boolean),
            Value::I8(_) => Some(b.int8),
            Value::I16(_) => Some(b.int16),
            Value::I32(_) => Some(b.int32),
            Value::I64(_) => Some(b.int64),
            Value::F32(_) => Some(b.float32),
            Value::F64(_) => Some(b.float64),
            Value::Char(_) => Some(b.character),
            Value::Text(_) => Some(b.text),
            Value::Seq(rc) => Some(rc.borrow().type_id),
            Value::Object(cell) => Some(cell.class_id()),
        }
    }

    /// Most-specific-class rule: a primitive declared type wins; otherwise a
    /// non-null value's runtime type; otherwise the declared type.
    pub fn most_specific(&self, declared: TypeId, value: &Value) -> TypeId {
        if self.kind(declared).is_primitive() {
            return declared;
        }
        self.runtime_type(value).unwrap_or(declared)
    }

    /// Type-level assignability: reflexive; classes walk the supertype
    /// chain; every class, text and sequence is assignable to the universal
    /// base; sequences are covariant in their element type.
    pub fn assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        if to == self.builtins.any {
            return matches!(
                self.kind(from),
                TypeKind::Class | TypeKind::Text | TypeKind::Seq(_)
            );
        }
        match (self.kind(from), self.kind(to)) {
            (TypeKind::Seq(a), TypeKind::Seq(b)) => self.assignable(*a, *b),
            (TypeKind::Class, TypeKind::Class) => {
                let mut current = from;
                while let Ok(class) = self.class(current) {
                    match &class.supertype {
                        Some(sup) if sup.id == to => return true,
                        Some(sup) => current = sup.id,
                        None => return false,
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Value-level assignability: `Null` fits any non-primitive slot.
    pub fn value_assignable(&self, value: &Value, to: TypeId) -> bool {
        match self.runtime_type(value) {
            None => !self.kind(to).is_primitive(),
            Some(from) => self.assignable(from, to),
        }
    }

    /// Display form of a value: primitives and text verbatim, reference
    /// values as `TypeName@identity`.
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Unit => "()".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::I8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Char(v) => v.to_string(),
            Value::Text(rc) => rc.borrow().clone(),
            Value::Seq(_) | Value::Object(_) => {
                let ty = self.runtime_type(value).unwrap_or(self.builtins.any);
                let identity = value.identity().map(Identity::as_u64).unwrap_or(0);
                format!("{}@{identity:x}", self.name(ty))
            }
        }
    }

    // == Metadata

    /// Memoized field/operation metadata for a type. Compute-and-store is
    /// idempotent: two racing first calls may both build, one result is
    /// kept, and a partially built object is never observable.
    pub fn metadata(&self, ty: TypeId) -> Result<Arc<TypeMetadata>> {
        {
            let cache = self.metadata.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = cache.get(&ty) {
                return Ok(found.clone());
            }
        }
        let built = Arc::new(self.build_metadata(ty)?);
        let mut cache = self
            .metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(ty).or_insert(built).clone())
    }

    fn build_metadata(&self, ty: TypeId) -> Result<TypeMetadata> {
        let mut fields = Vec::new();
        let mut operations: Vec<Arc<OperationDescriptor>> = Vec::new();

        if !matches!(self.kind(ty), TypeKind::Class) {
            return Ok(TypeMetadata {
                type_id: ty,
                fields,
                operations,
            });
        }

        // Walk the ancestry most-derived first; every chain ends at the
        // universal base class.
        let mut current = Some(ty);
        while let Some(id) = current {
            let class = self.class(id)?;

            for (slot, field) in class.fields.iter().enumerate() {
                fields.push(FieldRef {
                    declaring: id,
                    slot,
                    name: field.name.clone(),
                    declared: field.declared,
                    public: field.public,
                    transient: field.transient,
                });
            }

            for (slot, op) in class.operations.iter().enumerate() {
                let descriptor = OperationDescriptor {
                    declaring: id,
                    slot,
                    name: op.name.clone(),
                    params: op.params.clone(),
                    ret: op.ret,
                };
                if operations.iter().any(|kept| kept.same_overload(&descriptor)) {
                    continue;
                }
                operations.push(Arc::new(descriptor));
            }

            current = match &class.supertype {
                Some(sup) => Some(sup.id),
                None if id != self.builtins.any => Some(self.builtins.any),
                None => None,
            };
        }

        log::debug!(
            "built metadata for {}: {} fields, {} operations",
            self.name(ty),
            fields.len(),
            operations.len()
        );
        Ok(TypeMetadata {
            type_id: ty,
            fields,
            operations,
        })
    }

    // == Access plumbing

    pub fn field_value(&self, holder: &Value, field: &FieldRef) -> Result<Value> {
        let cell = holder.as_object().ok_or(ReflectError::ValueMismatch {
            expected: "object",
            actual: holder.kind_name(),
        })?;
        let state = cell.borrow_state();
        let projected = self.project(cell.class_id(), field.declaring, state.as_ref())?;
        let adapter = self.field_adapter(field)?;
        (adapter.get)(projected)
    }

    pub fn set_field(&self, holder: &Value, field: &FieldRef, value: Value) -> Result<()> {
        let cell = holder.as_object().ok_or(ReflectError::ValueMismatch {
            expected: "object",
            actual: holder.kind_name(),
        })?;
        let mut state = cell.borrow_state_mut();
        let projected = self.project_mut(cell.class_id(), field.declaring, state.as_mut())?;
        let adapter = self.field_adapter(field)?;
        (adapter.set)(projected, value)
    }

    /// Perform a dynamic call. Failures raised by the callee, including
    /// panics, are captured as `InvokeOutcome::Fault` and never unwind into
    /// the caller.
    pub fn invoke(
        &self,
        holder: &Value,
        descriptor: &OperationDescriptor,
        args: &[Value],
    ) -> Result<InvokeOutcome> {
        if args.len() != descriptor.params.len() {
            return Err(ReflectError::ArityMismatch(
                descriptor.name.clone(),
                descriptor.params.len(),
                args.len(),
            ));
        }

        if descriptor.declaring == self.builtins.any {
            return self.invoke_builtin(holder, descriptor);
        }

        let cell = holder.as_object().ok_or(ReflectError::ValueMismatch {
            expected: "object",
            actual: holder.kind_name(),
        })?;
        let mut state = cell.borrow_state_mut();
        let projected = self.project_mut(cell.class_id(), descriptor.declaring, state.as_mut())?;

        let class = self.class(descriptor.declaring)?;
        let adapter = class.operations.get(descriptor.slot).ok_or_else(|| {
            ReflectError::UnknownOperation(
                descriptor.name.clone(),
                self.name(descriptor.declaring).to_string(),
            )
        })?;

        match panic::catch_unwind(AssertUnwindSafe(|| (adapter.body)(projected, args))) {
            Err(payload) => Ok(InvokeOutcome::Fault(panic_message(payload))),
            Ok(Err(plumbing)) => Err(plumbing),
            Ok(Ok(Err(fault))) => Ok(InvokeOutcome::Fault(fault)),
            Ok(Ok(Ok(value))) => Ok(InvokeOutcome::Value(value)),
        }
    }

    fn invoke_builtin(&self, holder: &Value, descriptor: &OperationDescriptor) -> Result<InvokeOutcome> {
        match descriptor.name.as_str() {
            "describe" => Ok(InvokeOutcome::Value(Value::text(self.describe(holder)))),
            "identity" => {
                let identity = holder.identity().map(Identity::as_u64).unwrap_or(0);
                Ok(InvokeOutcome::Value(Value::I64(identity as i64)))
            }
            _ => Err(ReflectError::UnknownOperation(
                descriptor.name.clone(),
                "any".to_string(),
            )),
        }
    }

    // == Internals

    fn class(&self, ty: TypeId) -> Result<&ClassAdapter> {
        self.types
            .get(ty.0)
            .and_then(|entry| entry.class.as_ref())
            .ok_or_else(|| ReflectError::NotAClass(self.name(ty).to_string()))
    }

    fn field_adapter(&self, field: &FieldRef) -> Result<&FieldAdapter> {
        self.class(field.declaring)?
            .fields
            .get(field.slot)
            .ok_or_else(|| {
                ReflectError::AccessFailure(format!("unknown field slot for {}", field.name))
            })
    }

    fn project<'a>(&self, from: TypeId, to: TypeId, mut state: &'a dyn Any) -> Result<&'a dyn Any> {
        let mut current = from;
        while current != to {
            let class = self.class(current)?;
            let sup = class.supertype.as_ref().ok_or_else(|| {
                ReflectError::NotAnAncestor(self.name(to).to_string(), self.name(from).to_string())
            })?;
            state = (sup.project)(state)?;
            current = sup.id;
        }
        Ok(state)
    }

    fn project_mut<'a>(
        &self,
        from: TypeId,
        to: TypeId,
        mut state: &'a mut dyn Any,
    ) -> Result<&'a mut dyn Any> {
        let mut current = from;
        while current != to {
            let class = self.class(current)?;
            let sup = class.supertype.as_ref().ok_or_else(|| {
                ReflectError::NotAnAncestor(self.name(to).to_string(), self.name(from).to_string())
            })?;
            state = (sup.project_mut)(state)?;
            current = sup.id;
        }
        Ok(state)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {text}")
    } else {
        "panicked".to_string()
    }
}
