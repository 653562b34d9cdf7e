#![allow(dead_code, unused_imports)]

use std::any::TypeId;
use std::time::Instant;

use cog_core::prelude::*;
use serde::{Deserialize, Serialize};

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

#[cfg(feature = "profiling")]
fn profile_edits(space: &mut Space, queue: &mut OperationQueue, count: usize) -> cog_core::Result<()> {
    let _span = tracing::info_span!("edit_loop", count = count).entered();
    let (root, _) = queue.create_cog(space, "root", None)?;
    queue.add_component(space, root, Position { x: 0.0 })?;
    for i in 0..count {
        if i % 1_000 == 0 {
            tracing::info!("Editing {}/{}", i, count);
        }
        queue.set_property(space, root, TypeId::of::<Position>(), "x", i as f64)?;
    }
    Ok(())
}

#[cfg(feature = "profiling")]
fn main() -> cog_core::Result<()> {
    let _guard = cog_core::profiling::init_profiling("trace.json")?;

    let mut space = Space::new();
    space
        .registry_mut()
        .register_serializable::<Position>(|info| info);
    let mut queue = OperationQueue::new();

    println!("Recording 10k property edits...");
    let start = Instant::now();
    profile_edits(&mut space, &mut queue, 10_000)?;
    println!("Recorded in: {:?}", start.elapsed());

    let start = Instant::now();
    while queue.undo(&mut space)? {}
    println!("Undid everything in: {:?}", start.elapsed());
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_undo binary requires --features profiling");
}
