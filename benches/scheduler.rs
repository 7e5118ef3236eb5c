use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft::prelude::*;

fn spin(iterations: u64) -> u64 {
    let mut acc = 0u64;
    for i in 0..iterations {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    acc
}

fn graph_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");

    group.bench_function("wide_layer_16", |b| {
        let mut scheduler = SystemScheduler::new();
        let sink = Arc::new(AtomicU64::new(0));
        for i in 0..16 {
            let sink = Arc::clone(&sink);
            scheduler.add_named_system(
                format!("worker-{i}"),
                move || {
                    sink.fetch_add(spin(10_000), Ordering::Relaxed);
                },
                &[],
            );
        }
        b.iter(|| scheduler.run_graph().unwrap());
    });

    group.bench_function("chain_of_8", |b| {
        let mut scheduler = SystemScheduler::new();
        let sink = Arc::new(AtomicU64::new(0));
        let mut previous: Option<String> = None;
        for i in 0..8 {
            let name = format!("stage-{i}");
            let sink = Arc::clone(&sink);
            let deps: Vec<&str> = previous.as_deref().into_iter().collect();
            scheduler.add_named_system(
                name.clone(),
                move || {
                    sink.fetch_add(spin(1_000), Ordering::Relaxed);
                },
                &deps,
            );
            previous = Some(name);
        }
        b.iter(|| scheduler.run_graph().unwrap());
    });

    group.bench_function("run_parallel_64", |b| {
        let mut scheduler = SystemScheduler::new();
        let sink = Arc::new(AtomicU64::new(0));
        for _ in 0..64 {
            let sink = Arc::clone(&sink);
            scheduler.add_system(move || {
                sink.fetch_add(spin(1_000), Ordering::Relaxed);
            });
        }
        b.iter(|| scheduler.run_parallel());
    });

    group.bench_function("rebuild_graph_64_nodes", |b| {
        let mut scheduler = SystemScheduler::with_workers(1);
        for i in 0..64u32 {
            let deps: Vec<String> = if i == 0 {
                Vec::new()
            } else {
                vec![format!("node-{}", i / 2)]
            };
            let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
            scheduler.add_named_system(format!("node-{i}"), || {}, &deps);
        }
        b.iter(|| {
            black_box(scheduler.rebuild_graph().unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, graph_execution);
criterion_main!(benches);
