//! Store and reconciliation benchmarks
//!
//! Covers the hot paths: notifying a wide set of bound nodes from one write,
//! batched writes and keyed list updates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use trellis_core::render::{Props, View};
use trellis_core::{Engine, EngineConfig, RenderMode, Store};

fn items(count: usize, offset: usize) -> Value {
    Value::Array((offset..offset + count).map(|i| json!(i)).collect())
}

fn keyed_list(engine: &Engine) {
    let store = engine.store().clone();
    let body = engine.dom().document();
    engine
        .mount(body, move |_| {
            let store = store.clone();
            View::el(
                "ul",
                Props::new().children_fn(move || {
                    let items = store.read("items", json!([]));
                    items
                        .as_array()
                        .into_iter()
                        .flatten()
                        .map(|item| View::el("li", Props::new().key(item.to_string()).text(item.to_string())))
                        .collect::<Vec<_>>()
                        .into()
                }),
            )
        })
        .unwrap();
}

// =============================================================================
// Store
// =============================================================================

fn bench_store_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    group.bench_function("write_unobserved", |b| {
        let store = Store::new(json!({}));
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            black_box(store.write("a.b.c", n).unwrap())
        });
    });

    for effects in [1usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("write_with_effects", effects), &effects, |b, &effects| {
            let store = Store::new(json!({"n": 0}));
            let _effects: Vec<_> = (0..effects)
                .map(|_| {
                    let reader = store.clone();
                    store.effect(move || {
                        black_box(reader.read("n", 0));
                    })
                })
                .collect();
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                store.write("n", n).unwrap()
            });
        });
    }

    group.bench_function("batch_100_writes", |b| {
        let store = Store::new(json!({}));
        let reader = store.clone();
        let _effect = store.effect(move || {
            black_box(reader.read("counters", Value::Null));
        });
        let mut round = 0u64;
        b.iter(|| {
            round += 1;
            store.execute_batch(|| {
                for i in 0..100 {
                    store.write(&format!("counters.c{i}"), round).unwrap();
                }
            })
        });
    });

    group.finish();
}

// =============================================================================
// Child Lists
// =============================================================================

fn bench_child_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("child_lists");

    for mode in [RenderMode::Reconciling, RenderMode::FineGrained] {
        group.bench_function(BenchmarkId::new("shift_window_1000", format!("{mode:?}")), |b| {
            let config = EngineConfig {
                render_mode: mode,
                recycle_pool_limit: 1_000,
                ..EngineConfig::default()
            };
            let engine = Engine::with_state(config, json!({"items": items(1_000, 0)})).unwrap();
            keyed_list(&engine);
            let mut offset = 0;
            b.iter(|| {
                offset += 1;
                engine.store().write("items", items(1_000, offset)).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_store_writes, bench_child_lists);
criterion_main!(benches);
