// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_property`.

use core::time::Duration;
use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Once;

use understory_property::{
    DigestCx, Property, PropertyMetadataBuilder, PropertyRegistry, PropertyStore, ValueSlot,
};
use understory_reflect::{TypeKey, Typed};

struct Widget;
impl Typed for Widget {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Widget")
    }
}

fn bench_property(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: PropertyStore={} ValueSlot<f64>={} ErasedValue={}",
            size_of::<PropertyStore>(),
            size_of::<ValueSlot<f64>>(),
            size_of::<understory_reflect::ErasedValue>(),
        );
    });

    let mut registry = PropertyRegistry::new();
    let width: Property<f64> = registry
        .register(
            Widget::type_key(),
            "Width",
            PropertyMetadataBuilder::new(0.0_f64).build(),
        )
        .unwrap();
    let opacity: Property<f64> = registry
        .register(
            Widget::type_key(),
            "Opacity",
            PropertyMetadataBuilder::new(1.0_f64)
                .coerce(|_, v| v.clamp(0.0, 1.0))
                .on_changed(|_| {})
                .build(),
        )
        .unwrap();
    let text: Property<String> = registry
        .register(
            Widget::type_key(),
            "Text",
            PropertyMetadataBuilder::new(String::new()).build(),
        )
        .unwrap();

    let mut group = c.benchmark_group("property/get");

    group.bench_function("default", |b| {
        let store = PropertyStore::for_type::<Widget>();
        b.iter(|| black_box(store.get(&registry, width)));
    });

    group.bench_function("local", |b| {
        let mut store = PropertyStore::for_type::<Widget>();
        store.set_local(&registry, width, 100.0).unwrap();
        store.digest(&mut DigestCx::new(&registry), Duration::ZERO);
        b.iter(|| black_box(store.get(&registry, width)));
    });

    group.bench_function("local_string", |b| {
        let mut store = PropertyStore::for_type::<Widget>();
        store
            .set_local(&registry, text, "hello world hello world".to_string())
            .unwrap();
        store.digest(&mut DigestCx::new(&registry), Duration::ZERO);
        b.iter(|| black_box(store.get(&registry, text).len()));
    });

    group.finish();

    let mut group = c.benchmark_group("property/digest");

    group.bench_function("clean", |b| {
        let mut store = PropertyStore::for_type::<Widget>();
        store.set_local(&registry, width, 100.0).unwrap();
        store.set_styled(&registry, opacity, 0.5).unwrap();
        let mut cx = DigestCx::new(&registry);
        store.digest(&mut cx, Duration::ZERO);
        b.iter(|| black_box(store.digest(&mut cx, Duration::ZERO)));
    });

    for count in [1_u32, 8, 64] {
        group.bench_with_input(BenchmarkId::new("dirty_stores", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    (0..count)
                        .map(|i| {
                            let mut store = PropertyStore::for_type::<Widget>();
                            store.set_local(&registry, width, f64::from(i)).unwrap();
                            store.set_local(&registry, opacity, 2.0).unwrap();
                            store
                        })
                        .collect::<Vec<_>>()
                },
                |mut stores| {
                    let mut cx = DigestCx::new(&registry);
                    let changed: usize = stores
                        .iter_mut()
                        .map(|store| store.digest(&mut cx, Duration::ZERO))
                        .sum();
                    black_box(changed);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_property);
criterion_main!(benches);
