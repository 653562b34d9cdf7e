//! Example: an editor session
//!
//! Builds a small scene through the operation queue, destroys part of it,
//! then walks the history back and forth.

use std::any::TypeId;

use cog_core::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transform {
    x: f64,
    y: f64,
}

impl_component!(Transform, {
    fn property(&self, path: &str) -> Option<PropertyValue> {
        match path {
            "x" => Some(self.x.into()),
            "y" => Some(self.y.into()),
            _ => None,
        }
    }

    fn set_property(
        &mut self,
        path: &str,
        value: PropertyValue,
        _ctx: &mut MutationContext,
    ) -> cog_core::Result<()> {
        match path {
            "x" => self.x = value.expect_float(path)?,
            "y" => self.y = value.expect_float(path)?,
            _ => return Err(CogError::PropertyNotFound(path.to_string())),
        }
        Ok(())
    }
});

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sprite {
    image: String,
}
impl_component!(Sprite);

fn print_tree(space: &Space) {
    for root in roots(space) {
        for id in sub_tree(space, root) {
            let Some(cog) = space.cog(id) else { continue };
            let depth = ancestors(space, id).count();
            println!(
                "{}{} ({} components)",
                "  ".repeat(depth),
                cog.name(),
                cog.component_count()
            );
        }
    }
}

fn main() -> cog_core::Result<()> {
    let mut space = Space::new();
    space
        .registry_mut()
        .register_serializable::<Transform>(|info| info)
        .register_serializable::<Sprite>(|info| info.depends_on::<Transform>());
    space.register_observer(Box::new(cog_core::LoggingObserver));

    let mut queue = OperationQueue::new();

    queue.begin_batch("Build scene");
    let (level, _) = queue.create_cog(&mut space, "level", None)?;
    let (player, _) = queue.create_cog(&mut space, "player", Some(level))?;
    queue.add_component(&mut space, player, Transform { x: 0.0, y: 0.0 })?;
    queue.add_component(
        &mut space,
        player,
        Sprite {
            image: "player.png".into(),
        },
    )?;
    let (enemy, _) = queue.create_cog(&mut space, "enemy", Some(level))?;
    queue.add_component(&mut space, enemy, Transform { x: 5.0, y: 0.0 })?;
    queue.end_batch();

    // Sprite needs Transform, so this is refused
    if let Err(err) = space.remove_component::<Transform>(player) {
        println!("Refused: {err}");
    }

    queue.set_property(&mut space, player, TypeId::of::<Transform>(), "x", 3.0)?;
    queue.destroy_cog(&mut space, enemy)?;

    println!("After edits:");
    print_tree(&space);

    while queue.undo(&mut space)? {}
    println!("After undoing everything: {} cogs", space.len());

    while queue.redo(&mut space)? {}
    println!("After redoing everything:");
    print_tree(&space);

    let snapshot = space.snapshot(level)?;
    println!("{}", snapshot.to_json()?);
    Ok(())
}
