//! Sample domain for the demo binary: a `Scene` of `Shape`s with a
//! `Circle` subtype, an aliased instance, a sequence with a null slot and
//! a parent back reference closing a cycle.

use std::sync::Arc;

use anyhow::{Context, Result};
use ferroscope_reflect::{
    ClassSpec, FieldSpec, OperationSpec, TypeId, TypeRegistry, Value,
};

pub struct Shape {
    pub name: Value,
    pub sides: i32,
}

pub struct Circle {
    pub base: Shape,
    pub radius: f64,
}

pub struct Scene {
    pub title: Value,
    pub focus: Value,
    pub shapes: Value,
    pub parent: Value,
}

fn shape_spec(registry: &TypeRegistry) -> ClassSpec {
    let b = *registry.builtins();
    ClassSpec::new::<Shape>("Shape")
        .field(FieldSpec::new(
            "name",
            b.text,
            |s: &Shape| s.name.clone(),
            |s: &mut Shape, value| {
                s.name = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "sides",
            b.int32,
            |s: &Shape| Value::I32(s.sides),
            |s: &mut Shape, value| {
                s.sides = value.require_i32()?;
                Ok(())
            },
        ))
        .operation(OperationSpec::new::<Shape, _>(
            "area",
            b.float64,
            |_: &mut Shape, _| Err("area of an abstract shape".to_string()),
        ))
}

fn circle_spec(registry: &TypeRegistry, shape: TypeId) -> ClassSpec {
    let b = *registry.builtins();
    ClassSpec::new::<Circle>("Circle")
        .extends::<Circle, Shape, _, _>(shape, |c| &c.base, |c| &mut c.base)
        .field(FieldSpec::new(
            "radius",
            b.float64,
            |c: &Circle| Value::F64(c.radius),
            |c: &mut Circle, value| {
                c.radius = value.require_f64()?;
                Ok(())
            },
        ))
        // Same name and parameters as Shape's area: the subtype's wins.
        .operation(OperationSpec::new::<Circle, _>(
            "area",
            b.float64,
            |c: &mut Circle, _| Ok(Value::F64(std::f64::consts::PI * c.radius * c.radius)),
        ))
        .operation(
            OperationSpec::new::<Circle, _>("grow", b.unit, |c: &mut Circle, args| {
                c.radius *= match args[0].as_f64() {
                    Some(factor) => factor,
                    None => return Err("grow factor must be f64".to_string()),
                };
                Ok(Value::Unit)
            })
            .param(b.float64, "factor"),
        )
}

fn scene_spec(registry: &TypeRegistry, shape: TypeId, shapes: TypeId) -> ClassSpec {
    let b = *registry.builtins();
    ClassSpec::new::<Scene>("Scene")
        .field(FieldSpec::new(
            "title",
            b.text,
            |s: &Scene| s.title.clone(),
            |s: &mut Scene, value| {
                s.title = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "focus",
            shape,
            |s: &Scene| s.focus.clone(),
            |s: &mut Scene, value| {
                s.focus = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "shapes",
            shapes,
            |s: &Scene| s.shapes.clone(),
            |s: &mut Scene, value| {
                s.shapes = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "parent",
            b.any,
            |s: &Scene| s.parent.clone(),
            |s: &mut Scene, value| {
                s.parent = value;
                Ok(())
            },
        ))
}

fn circle(circle_ty: TypeId, name: &str, radius: f64) -> Value {
    Value::object(
        circle_ty,
        Circle {
            base: Shape {
                name: Value::text(name),
                sides: 0,
            },
            radius,
        },
    )
}

/// Registry plus a root scene: an aliased circle (focus and shapes[0]), a
/// null sequence slot, and a parent field pointing back at the scene.
pub fn build() -> Result<(Arc<TypeRegistry>, Value)> {
    let mut registry = TypeRegistry::new();

    let spec = shape_spec(&registry);
    let shape = registry.register(spec).context("register Shape")?;
    let spec = circle_spec(&registry, shape);
    let circle_ty = registry.register(spec).context("register Circle")?;
    let shapes = registry.seq_of(shape);
    let spec = scene_spec(&registry, shape, shapes);
    let scene = registry.register(spec).context("register Scene")?;

    let starred = circle(circle_ty, "starred", 2.0);
    let root = Value::object(
        scene,
        Scene {
            title: Value::text("demo scene"),
            focus: starred.clone(),
            shapes: Value::seq(
                shapes,
                shape,
                vec![
                    starred,
                    Value::Null,
                    circle(circle_ty, "small", 0.5),
                ],
            ),
            parent: Value::Null,
        },
    );

    // Close the cycle through the dynamic field so the demo exercises the
    // parent-shortcut path.
    let metadata = registry.metadata(scene).context("scene metadata")?;
    if let Some(parent) = metadata.fields.iter().find(|field| field.name == "parent") {
        registry
            .set_field(&root, parent, root.clone())
            .context("close parent cycle")?;
    }

    Ok((Arc::new(registry), root))
}
