use std::any::TypeId;

use cog_core::prelude::*;
use criterion::{criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use std::hint::black_box;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Position {
    x: f64,
}

impl_component!(Position, {
    fn property(&self, path: &str) -> Option<PropertyValue> {
        (path == "x").then(|| PropertyValue::Float(self.x))
    }

    fn set_property(
        &mut self,
        path: &str,
        value: PropertyValue,
        _ctx: &mut MutationContext,
    ) -> cog_core::Result<()> {
        self.x = value.expect_float(path)?;
        Ok(())
    }
});

fn setup() -> (Space, OperationQueue, CogId) {
    let mut space = Space::new();
    space
        .registry_mut()
        .register_serializable::<Position>(|info| info);
    let cog = space.create_cog("target");
    let _ = space.add_component(cog, Position { x: 0.0 });
    (space, OperationQueue::new(), cog)
}

fn bench_record_property_edits(c: &mut Criterion) {
    c.bench_function("record_1000_property_edits", |b| {
        b.iter(|| {
            let (mut space, mut queue, cog) = setup();
            for i in 0..1000 {
                let _ = queue.set_property(&mut space, cog, TypeId::of::<Position>(), "x", i as f64);
            }
            black_box(queue.commands().len())
        })
    });
}

fn bench_undo_redo_cycle(c: &mut Criterion) {
    let (mut space, mut queue, cog) = setup();
    for i in 0..1000 {
        let _ = queue.set_property(&mut space, cog, TypeId::of::<Position>(), "x", i as f64);
    }

    c.bench_function("undo_redo_1000", |b| {
        b.iter(|| {
            while let Ok(true) = queue.undo(&mut space) {}
            while let Ok(true) = queue.redo(&mut space) {}
        })
    });
}

fn bench_batched_edits(c: &mut Criterion) {
    c.bench_function("batch_of_100_then_undo", |b| {
        b.iter(|| {
            let (mut space, mut queue, cog) = setup();
            queue.begin_batch("drag");
            for i in 0..100 {
                let _ = queue.set_property(&mut space, cog, TypeId::of::<Position>(), "x", i as f64);
            }
            queue.end_batch();
            black_box(queue.undo(&mut space))
        })
    });
}

fn bench_destroy_restore(c: &mut Criterion) {
    c.bench_function("destroy_and_undo_subtree_50", |b| {
        b.iter(|| {
            let (mut space, mut queue, root) = setup();
            for i in 0..50 {
                let child = space.create_cog(format!("child{i}"));
                let _ = space.add_component(child, Position { x: i as f64 });
                let _ = space.attach_to(child, root);
            }
            let _ = queue.destroy_cog(&mut space, root);
            black_box(queue.undo(&mut space))
        })
    });
}

criterion_group!(
    benches,
    bench_record_property_edits,
    bench_undo_redo_cycle,
    bench_batched_edits,
    bench_destroy_restore
);
criterion_main!(benches);
