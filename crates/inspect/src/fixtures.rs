//! Sample registered domain shared by the unit tests: a `Carton` container
//! holding `Widget`s, with an alias, a nullable slot and a parent back
//! reference.

use std::sync::Arc;

use ferroscope_reflect::{
    ClassSpec, FieldSpec, OperationSpec, TypeId, TypeRegistry, Value,
};

pub(crate) struct Widget {
    pub label: Value,
    pub calls: i32,
}

pub(crate) struct Carton {
    pub name: Value,
    pub item: Value,
    pub twin: Value,
    pub parent: Value,
    pub items: Value,
    pub secret: Value,
    pub stamp: Value,
}

pub(crate) struct Sample {
    pub registry: Arc<TypeRegistry>,
    pub widget: TypeId,
    pub carton: TypeId,
    pub widgets: TypeId,
    pub root: Value,
    pub shared: Value,
}

fn widget_spec(registry: &TypeRegistry) -> ClassSpec {
    let b = *registry.builtins();
    ClassSpec::new::<Widget>("Widget")
        .field(FieldSpec::new(
            "label",
            b.text,
            |w: &Widget| w.label.clone(),
            |w: &mut Widget, value| {
                w.label = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "calls",
            b.int32,
            |w: &Widget| Value::I32(w.calls),
            |w: &mut Widget, value| {
                w.calls = value.require_i32()?;
                Ok(())
            },
        ))
        .operation(OperationSpec::new::<Widget, _>(
            "ping",
            b.int32,
            |w: &mut Widget, _| {
                w.calls += 1;
                Ok(Value::I32(w.calls))
            },
        ))
        .operation(OperationSpec::new::<Widget, _>(
            "clear",
            b.unit,
            |w: &mut Widget, _| {
                w.calls = 0;
                Ok(Value::Unit)
            },
        ))
        .operation(
            OperationSpec::new::<Widget, _>("rename", b.unit, |w: &mut Widget, args| {
                w.label = args[0].clone();
                Ok(Value::Unit)
            })
            .param(b.text, "label"),
        )
        .operation(OperationSpec::new::<Widget, _>(
            "fail",
            b.int32,
            |_: &mut Widget, _| Err("widget failure".to_string()),
        ))
        .operation(OperationSpec::new::<Widget, _>(
            "boom",
            b.unit,
            |_: &mut Widget, _| panic!("widget boom"),
        ))
}

fn carton_spec(registry: &TypeRegistry, widget_ty: TypeId, widgets_ty: TypeId) -> ClassSpec {
    let b = *registry.builtins();
    ClassSpec::new::<Carton>("Carton")
        .field(FieldSpec::new(
            "name",
            b.text,
            |c: &Carton| c.name.clone(),
            |c: &mut Carton, value| {
                c.name = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "item",
            widget_ty,
            |c: &Carton| c.item.clone(),
            |c: &mut Carton, value| {
                c.item = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "twin",
            widget_ty,
            |c: &Carton| c.twin.clone(),
            |c: &mut Carton, value| {
                c.twin = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "parent",
            b.any,
            |c: &Carton| c.parent.clone(),
            |c: &mut Carton, value| {
                c.parent = value;
                Ok(())
            },
        ))
        .field(FieldSpec::new(
            "items",
            widgets_ty,
            |c: &Carton| c.items.clone(),
            |c: &mut Carton, value| {
                c.items = value;
                Ok(())
            },
        ))
        .field(
            FieldSpec::new(
                "secret",
                b.text,
                |c: &Carton| c.secret.clone(),
                |c: &mut Carton, value| {
                    c.secret = value;
                    Ok(())
                },
            )
            .non_public(),
        )
        .field(
            FieldSpec::new(
                "stamp",
                b.text,
                |c: &Carton| c.stamp.clone(),
                |c: &mut Carton, value| {
                    c.stamp = value;
                    Ok(())
                },
            )
            .transient(),
        )
}

fn build() -> (Arc<TypeRegistry>, TypeId, TypeId, TypeId) {
    let mut registry = TypeRegistry::new();
    let spec = widget_spec(&registry);
    let widget = registry.register(spec).unwrap();
    let widgets = registry.seq_of(widget);
    let spec = carton_spec(&registry, widget, widgets);
    let carton = registry.register(spec).unwrap();
    (Arc::new(registry), widget, carton, widgets)
}

pub(crate) fn widget_value(widget: TypeId, label: &str) -> Value {
    Value::object(
        widget,
        Widget {
            label: Value::text(label),
            calls: 0,
        },
    )
}

/// Root carton with an aliased widget and a null sequence slot.
pub(crate) fn sample() -> Sample {
    let (registry, widget, carton, widgets) = build();
    let shared = widget_value(widget, "alpha");
    let root = Value::object(
        carton,
        Carton {
            name: Value::text("root"),
            item: shared.clone(),
            twin: shared.clone(),
            parent: Value::Null,
            items: Value::seq(
                widgets,
                widget,
                vec![
                    widget_value(widget, "w0"),
                    Value::Null,
                    widget_value(widget, "w2"),
                ],
            ),
            secret: Value::text("hidden"),
            stamp: Value::text("tmp"),
        },
    );
    Sample {
        registry,
        widget,
        carton,
        widgets,
        root,
        shared,
    }
}

/// Like [`sample`], but the root's `parent` field points back at the root
/// itself, closing a cycle.
pub(crate) fn cyclic_sample() -> Sample {
    let sample = sample();
    let metadata = sample.registry.metadata(sample.carton).unwrap();
    let parent = metadata
        .fields
        .iter()
        .find(|field| field.name == "parent")
        .unwrap();
    sample
        .registry
        .set_field(&sample.root, parent, sample.root.clone())
        .unwrap();
    sample
}

/// A non-cyclic chain of `len` distinct cartons linked through `parent`,
/// for depth-cap tests.
pub(crate) fn chained_sample(len: usize) -> Sample {
    let (registry, widget, carton, widgets) = build();
    let shared = widget_value(widget, "chain");

    let mut head = Value::Null;
    for index in 0..len {
        head = Value::object(
            carton,
            Carton {
                name: Value::text(format!("carton-{index}")),
                item: widget_value(widget, "w"),
                twin: widget_value(widget, "t"),
                parent: head,
                items: Value::seq(widgets, widget, Vec::new()),
                secret: Value::text(""),
                stamp: Value::text(""),
            },
        );
    }

    Sample {
        registry,
        widget,
        carton,
        widgets,
        root: head,
        shared,
    }
}
