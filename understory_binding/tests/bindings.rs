// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_binding` crate.

use core::any::TypeId;
use core::time::Duration;
use std::sync::Arc;

use understory_binding::{BindingCompiler, BindingError, PropertyStoreBindingExt, Strategy};
use understory_property::{
    DigestCx, PropertyError, PropertyMetadataBuilder, PropertyRegistry, PropertyStore,
};
use understory_reflect::{ErasedValue, Shared, TypeDescriptor, TypeKey, TypeRegistry, Typed};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

struct Customer {
    name: String,
}

struct Order {
    customer: Option<Shared<Customer>>,
    position: Point,
    price: f64,
    total: i32,
    last_note: String,
}

struct Label;
impl Typed for Label {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Label")
    }
}

const STRATEGIES: [Strategy; 2] = [Strategy::Compiled, Strategy::Reflection];

fn types() -> Arc<TypeRegistry> {
    let mut types = TypeRegistry::new();
    types
        .register(
            TypeDescriptor::value::<Point>("Point")
                .writable_property("X", |p: &Point| p.x, |p, v| p.x = v)
                .property("Y", |p: &Point| p.y)
                .build(),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::reference::<Customer>("Customer")
                .writable_property("Name", |c: &Customer| c.name.clone(), |c, v| c.name = v)
                .build(),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::reference::<Order>("Order")
                .writable_reference(
                    "Customer",
                    |o: &Order| o.customer.clone(),
                    |o, v| o.customer = Some(v),
                )
                .property("Position", |o: &Order| o.position)
                .writable_property("Price", |o: &Order| o.price, |o, v| o.price = v)
                .property("Total", |o: &Order| o.total)
                .method("Add", |o: &mut Order, (n,): (i32,)| o.total += n)
                .method("Note", |o: &mut Order, (note, times): (String, i32)| {
                    o.last_note = note.repeat(usize::try_from(times).unwrap_or(0));
                })
                .build(),
        )
        .unwrap();
    Arc::new(types)
}

fn order() -> Shared<Order> {
    Shared::new(Order {
        customer: None,
        position: Point { x: 1.0, y: 2.0 },
        price: 2.5,
        total: 0,
        last_note: String::new(),
    })
}

fn name_of(value: Option<ErasedValue>) -> Option<String> {
    value.and_then(ErasedValue::into_value)
}

#[test]
fn null_intermediates_read_as_absent() {
    for strategy in STRATEGIES {
        let compiler = BindingCompiler::with_strategy(types(), strategy);
        let accessor = compiler
            .accessor(TypeId::of::<String>(), TypeId::of::<Order>(), "Customer.Name")
            .unwrap();
        let order = order();
        let source = order.to_erased();

        assert_eq!(accessor.get(Some(&source)), None, "{strategy:?}");
        assert_eq!(accessor.get(None), None, "{strategy:?}");
        assert!(
            !accessor.set(Some(&source), ErasedValue::new(String::from("Lin"))),
            "{strategy:?}: nowhere to write"
        );

        order.write().customer = Some(Shared::new(Customer {
            name: "Ada".into(),
        }));
        assert_eq!(name_of(accessor.get(Some(&source))).as_deref(), Some("Ada"));
        assert!(
            accessor.set(Some(&source), ErasedValue::new(String::from("Lin"))),
            "{strategy:?}: the customer is reachable now"
        );
        let customer = order.read().customer.clone().unwrap();
        assert_eq!(customer.read().name, "Lin", "{strategy:?}");
    }
}

#[test]
fn value_typed_owners_compile_no_op_setters() {
    for strategy in STRATEGIES {
        let compiler = BindingCompiler::with_strategy(types(), strategy);
        let order = order();
        let source = order.to_erased();

        let x = compiler
            .accessor(TypeId::of::<f64>(), TypeId::of::<Order>(), "Position.X")
            .unwrap();
        assert!(!x.is_writable(), "{strategy:?}: Point is a value type");
        assert!(!x.set(Some(&source), ErasedValue::new(9.0_f64)), "{strategy:?}");
        assert_eq!(order.read().position.x, 1.0, "{strategy:?}");
        assert_eq!(
            x.get(Some(&source)).and_then(ErasedValue::into_value::<f64>),
            Some(1.0),
            "{strategy:?}"
        );

        // A value-typed data source is a copy as well.
        let root = compiler
            .accessor(TypeId::of::<f64>(), TypeId::of::<Point>(), "X")
            .unwrap();
        assert!(!root.is_writable(), "{strategy:?}: writes would hit a copy");

        let total = compiler
            .accessor(TypeId::of::<i32>(), TypeId::of::<Order>(), "Total")
            .unwrap();
        assert!(!total.is_writable(), "{strategy:?}: Total has no setter");
    }
}

#[test]
fn unknown_members_fail_at_compile_time() {
    let compiler = BindingCompiler::new(types());
    let err = compiler
        .accessor(TypeId::of::<String>(), TypeId::of::<Order>(), "Customer.Email")
        .unwrap_err();
    assert!(
        matches!(err, BindingError::UnresolvableBindingExpression { ref text, .. } if text == "Customer.Email"),
        "got {err:?}"
    );
    assert!(err.to_string().contains("no property 'Email'"), "got {err}");

    let err = compiler
        .accessor(TypeId::of::<i32>(), TypeId::of::<Label>(), "Total")
        .unwrap_err();
    assert!(
        matches!(err, BindingError::UnresolvableBindingExpression { .. }),
        "Label has no descriptor"
    );
}

#[test]
fn events_call_methods_with_matching_arguments() {
    for strategy in STRATEGIES {
        let compiler = BindingCompiler::with_strategy(types(), strategy);
        let order = order();
        let source = order.to_erased();

        let add = compiler.event::<(i32,)>(TypeId::of::<Order>(), "Add").unwrap();
        assert!(add.invoke(Some(&source), (3,)), "{strategy:?}");
        assert!(add.invoke(Some(&source), (4,)), "{strategy:?}");
        assert!(!add.invoke(None, (5,)), "{strategy:?}: no data source");
        assert_eq!(order.read().total, 7, "{strategy:?}");

        let note = compiler
            .event::<(String, i32)>(TypeId::of::<Order>(), "Note")
            .unwrap();
        assert!(note.invoke(Some(&source), ("ab".into(), 2)), "{strategy:?}");
        assert_eq!(order.read().last_note, "abab", "{strategy:?}");
        assert_eq!(note.expression(), "Note");
    }
}

#[test]
fn event_signatures_must_match_exactly() {
    let compiler = BindingCompiler::new(types());
    let source = TypeId::of::<Order>();

    let err = compiler.event::<(i64,)>(source, "Add").unwrap_err();
    assert!(
        matches!(err, BindingError::CannotResolveBindingExpression { ref text, .. } if text == "Add"),
        "got {err:?}"
    );
    assert!(
        compiler.event::<(i32, String)>(source, "Note").is_err(),
        "parameter order matters"
    );
    assert!(
        matches!(
            compiler.event::<()>(source, "Missing"),
            Err(BindingError::CannotResolveBindingExpression { .. })
        ),
        "no method of that name"
    );
    assert_eq!(compiler.cached_invokers(), 0);
}

#[test]
fn bound_properties_follow_the_data_source() {
    for strategy in STRATEGIES {
        let compiler = BindingCompiler::with_strategy(types(), strategy);
        let mut registry = PropertyRegistry::new();
        let text = registry
            .register(
                Label::type_key(),
                "Text",
                PropertyMetadataBuilder::new(String::from("?")).build(),
            )
            .unwrap();

        let order = order();
        let mut label = PropertyStore::for_type::<Label>();
        label.set_data_source(Some(order.to_erased()));
        label
            .bind_expression(&registry, &compiler, text, TypeId::of::<Order>(), "Customer.Name")
            .unwrap();
        assert!(label.is_bound(text.id()), "{strategy:?}");

        let mut cx = DigestCx::new(&registry);
        assert_eq!(label.digest(&mut cx, Duration::ZERO), 1, "{strategy:?}");
        assert_eq!(label.get(&registry, text), "", "{strategy:?}: null path reads empty");

        let customer = Shared::new(Customer {
            name: "Ada".into(),
        });
        order.write().customer = Some(customer.clone());
        assert_eq!(label.digest(&mut cx, Duration::ZERO), 1, "{strategy:?}");
        assert_eq!(label.get(&registry, text), "Ada", "{strategy:?}");

        // Local writes go through the binding.
        label
            .set_local(&registry, text, String::from("Grace"))
            .unwrap();
        assert_eq!(customer.read().name, "Grace", "{strategy:?}");
        assert_eq!(label.digest(&mut cx, Duration::ZERO), 1, "{strategy:?}");
        assert_eq!(label.get(&registry, text), "Grace", "{strategy:?}");
    }
}

#[test]
fn converting_bindings_keep_typed_text_until_invalidated() {
    let compiler = BindingCompiler::new(types());
    let mut registry = PropertyRegistry::new();
    let text = registry
        .register(
            Label::type_key(),
            "Text",
            PropertyMetadataBuilder::new(String::new()).build(),
        )
        .unwrap();

    let order = order();
    let mut label = PropertyStore::for_type::<Label>();
    label.set_data_source(Some(order.to_erased()));
    label
        .bind_expression(&registry, &compiler, text, TypeId::of::<Order>(), "Price{F2}")
        .unwrap();

    let mut cx = DigestCx::new(&registry);
    label.digest(&mut cx, Duration::ZERO);
    assert_eq!(label.get(&registry, text), "2.50");

    label.set_local(&registry, text, String::from("1.")).unwrap();
    assert_eq!(order.read().price, 1.0);
    label.digest(&mut cx, Duration::ZERO);
    assert_eq!(label.get(&registry, text), "1.", "the typed text survives");

    label.invalidate_display_cache(text.id());
    label.digest(&mut cx, Duration::ZERO);
    assert_eq!(label.get(&registry, text), "1.00");

    order.write().price = 4.129;
    label.digest(&mut cx, Duration::ZERO);
    assert_eq!(label.get(&registry, text), "4.13");
}

#[test]
fn numeric_properties_convert_from_text_members() {
    let compiler = BindingCompiler::new(types());
    let mut bound = compiler
        .bound_value::<f64>(TypeId::of::<Order>(), "Customer.Name", false)
        .unwrap();
    let order = order();
    let source = order.to_erased();
    assert_eq!(bound.get(Some(&source)), 0.0, "null customer");

    order.write().customer = Some(Shared::new(Customer {
        name: " 12.5 ".into(),
    }));
    assert_eq!(bound.get(Some(&source)), 12.5);

    bound.set(Some(&source), 3.0);
    let name = order.read().customer.clone().unwrap().read().name.clone();
    assert_eq!(name, "3");
}

#[test]
fn read_only_properties_refuse_bindings() {
    let compiler = BindingCompiler::new(types());
    let mut registry = PropertyRegistry::new();
    let (total, _key) = registry
        .register_read_only(
            Label::type_key(),
            "Total",
            PropertyMetadataBuilder::new(0_i32).build(),
        )
        .unwrap();
    let mut label = PropertyStore::for_type::<Label>();
    let err = label
        .bind_expression(&registry, &compiler, total, TypeId::of::<Order>(), "Total")
        .unwrap_err();
    assert_eq!(err, BindingError::Property(PropertyError::ReadOnly { name: "Total" }));
    assert!(!label.is_bound(total.id()), "nothing was installed");
}

#[test]
fn compiled_accessors_are_shared() {
    let compiler = BindingCompiler::new(types());
    let mut registry = PropertyRegistry::new();
    let text = registry
        .register(
            Label::type_key(),
            "Text",
            PropertyMetadataBuilder::new(String::new()).build(),
        )
        .unwrap();
    let mut stores: Vec<_> = (0..3).map(|_| PropertyStore::for_type::<Label>()).collect();
    for store in &mut stores {
        store
            .bind_expression(&registry, &compiler, text, TypeId::of::<Order>(), "Customer.Name")
            .unwrap();
    }
    assert_eq!(compiler.cached_accessors(), 1);
}
