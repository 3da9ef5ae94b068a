// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_binding`: accessor reads and writes under each
//! strategy, and digesting bound properties.

use core::any::TypeId;
use core::time::Duration;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use understory_binding::{BindingCompiler, PropertyStoreBindingExt, Strategy};
use understory_property::{DigestCx, PropertyMetadataBuilder, PropertyRegistry, PropertyStore};
use understory_reflect::{ErasedValue, Shared, TypeDescriptor, TypeKey, TypeRegistry, Typed};

struct Customer {
    name: String,
    credit: f64,
}

struct Order {
    customer: Option<Shared<Customer>>,
}

struct Label;
impl Typed for Label {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Label")
    }
}

fn types() -> Arc<TypeRegistry> {
    let mut types = TypeRegistry::new();
    types
        .register(
            TypeDescriptor::reference::<Customer>("Customer")
                .writable_property("Name", |c: &Customer| c.name.clone(), |c, v| c.name = v)
                .writable_property("Credit", |c: &Customer| c.credit, |c, v| c.credit = v)
                .build(),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::reference::<Order>("Order")
                .reference("Customer", |o: &Order| o.customer.clone())
                .build(),
        )
        .unwrap();
    Arc::new(types)
}

fn order() -> ErasedValue {
    Shared::new(Order {
        customer: Some(Shared::new(Customer {
            name: "Ada".into(),
            credit: 10.0,
        })),
    })
    .to_erased()
}

fn bench_accessors(c: &mut Criterion) {
    let types = types();
    let source = order();
    let mut group = c.benchmark_group("binding/accessor");

    for strategy in [Strategy::Compiled, Strategy::Reflection] {
        let compiler = BindingCompiler::with_strategy(Arc::clone(&types), strategy);
        let name = compiler
            .accessor(TypeId::of::<String>(), TypeId::of::<Order>(), "Customer.Name")
            .unwrap();
        let credit = compiler
            .accessor(TypeId::of::<f64>(), TypeId::of::<Order>(), "Customer.Credit")
            .unwrap();

        group.bench_function(BenchmarkId::new("get", format!("{strategy:?}")), |b| {
            b.iter(|| black_box(name.get(Some(&source))));
        });
        group.bench_function(BenchmarkId::new("set", format!("{strategy:?}")), |b| {
            b.iter(|| black_box(credit.set(Some(&source), ErasedValue::new(12.5_f64))));
        });
    }

    group.bench_function("cached_lookup", |b| {
        let compiler = BindingCompiler::new(Arc::clone(&types));
        b.iter(|| {
            black_box(compiler.accessor(
                TypeId::of::<String>(),
                TypeId::of::<Order>(),
                "Customer.Name",
            ))
        });
    });

    group.finish();
}

fn bench_bound_digest(c: &mut Criterion) {
    let compiler = BindingCompiler::new(types());
    let mut registry = PropertyRegistry::new();
    let text = registry
        .register(
            Label::type_key(),
            "Text",
            PropertyMetadataBuilder::new(String::new()).build(),
        )
        .unwrap();
    let credit = registry
        .register(
            Label::type_key(),
            "Credit",
            PropertyMetadataBuilder::new(String::new()).build(),
        )
        .unwrap();

    let mut label = PropertyStore::for_type::<Label>();
    label.set_data_source(Some(order()));
    label
        .bind_expression(&registry, &compiler, text, TypeId::of::<Order>(), "Customer.Name")
        .unwrap();
    label
        .bind_expression(
            &registry,
            &compiler,
            credit,
            TypeId::of::<Order>(),
            "Customer.Credit{F2}",
        )
        .unwrap();

    let mut group = c.benchmark_group("binding/digest");
    group.bench_function("two_bound_properties", |b| {
        let mut cx = DigestCx::new(&registry);
        b.iter(|| black_box(label.digest(&mut cx, Duration::ZERO)));
    });
    group.finish();
}

criterion_group!(benches, bench_accessors, bench_bound_digest);
criterion_main!(benches);
