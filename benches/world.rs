use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft::prelude::*;

#[derive(Clone, Copy)]
struct Pos {
    x: f32,
    y: f32,
}

impl Component for Pos {
    type Storage = PackedStorage<Self>;
}

#[derive(Clone, Copy)]
struct Vel {
    x: f32,
    y: f32,
}

impl Component for Vel {
    type Storage = PackedStorage<Self>;
}

#[derive(Clone, Copy, Default)]
struct Static;

impl Component for Static {
    type Storage = NullStorage<Self>;
}

fn create_destroy(c: &mut Criterion) {
    c.bench_function("create_entity", |b| {
        let mut world = World::new();
        b.iter(|| black_box(world.create_entity()));
    });

    c.bench_function("create_entities_bulk_1000", |b| {
        let mut world = World::new();
        b.iter(|| black_box(world.create_entities(1000)));
    });

    c.bench_function("create_destroy_cycle", |b| {
        let mut world = World::new();
        b.iter(|| {
            let e = world.create_entity();
            world.add_component(e, Pos { x: 0.0, y: 0.0 });
            world.destroy_entity(e);
        });
    });
}

fn component_ops(c: &mut Criterion) {
    c.bench_function("add_remove_component", |b| {
        let mut world = World::new();
        let e = world.create_entity();
        b.iter(|| {
            world.add_component(e, Pos { x: 1.0, y: 1.0 });
            world.remove_component::<Pos>(e);
        });
    });

    c.bench_function("get_component", |b| {
        let mut world = World::new();
        let entities = world.create_entities(10_000);
        for &e in &entities {
            world.add_component(e, Pos { x: 0.0, y: 0.0 });
        }
        let probe = entities[5_000];
        b.iter(|| black_box(world.get_component::<Pos>(probe)));
    });
}

fn view_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("view");

    group.bench_function("dense_pair_10k", |b| {
        let mut world = World::new();
        for &e in &world.create_entities(10_000) {
            world.add_component(e, Pos { x: 0.0, y: 0.0 });
            world.add_component(e, Vel { x: 1.0, y: 1.0 });
        }
        b.iter(|| {
            world.view::<(Pos, Vel)>().each(|_, (pos, vel)| {
                pos.x += vel.x;
                pos.y += vel.y;
            });
        });
    });

    group.bench_function("sparse_driver_10k", |b| {
        let mut world = World::new();
        for (i, &e) in world.create_entities(10_000).iter().enumerate() {
            world.add_component(e, Pos { x: 0.0, y: 0.0 });
            if i % 100 == 0 {
                world.add_component(e, Vel { x: 1.0, y: 0.0 });
            }
        }
        b.iter(|| {
            world.view::<(Pos, Vel)>().each(|_, (pos, vel)| {
                pos.x += vel.x;
            });
        });
    });

    group.bench_function("with_tag_10k", |b| {
        let mut world = World::new();
        for (i, &e) in world.create_entities(10_000).iter().enumerate() {
            world.add_component(e, Pos { x: 0.0, y: 0.0 });
            if i % 2 == 0 {
                world.add_component(e, Static);
            }
        }
        b.iter(|| {
            let mut count = 0usize;
            world.view::<(Pos, Static)>().each(|_, _| count += 1);
            black_box(count)
        });
    });

    group.finish();
}

criterion_group!(benches, create_destroy, component_ops, view_iteration);
criterion_main!(benches);
