mod common;

use std::any::TypeId;
use std::sync::Arc;

use cog_core::prelude::*;
use common::*;
use parking_lot::Mutex;

#[test]
fn test_undo_then_redo_restores_state() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");
    space.add_component(cog, Transform::at(0.0, 0.0)).unwrap();

    queue
        .set_property(&mut space, cog, TypeId::of::<Transform>(), "x", 4.0)
        .unwrap();
    let edited = space.has::<Transform>(cog).cloned();

    queue.undo(&mut space).unwrap();
    assert_eq!(space.has::<Transform>(cog), Some(&Transform::at(0.0, 0.0)));
    queue.redo(&mut space).unwrap();
    assert_eq!(space.has::<Transform>(cog).cloned(), edited);
}

#[test]
fn test_side_effects_replay() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");
    space.add_component(cog, Transform::at(0.0, 0.0)).unwrap();
    space.add_component(cog, Model::new("cube")).unwrap();

    queue
        .set_property(&mut space, cog, TypeId::of::<Model>(), "mesh", "sphere")
        .unwrap();
    assert_eq!(space.has::<Model>(cog), Some(&Model::new("sphere")));

    // Break the cache by hand, then undo must put both fields back
    space.has_mut::<Model>(cog).unwrap().display = "stale".into();
    queue.undo(&mut space).unwrap();
    assert_eq!(space.has::<Model>(cog), Some(&Model::new("cube")));

    queue.redo(&mut space).unwrap();
    assert_eq!(space.has::<Model>(cog), Some(&Model::new("sphere")));
}

#[test]
fn test_batch_is_one_undo_step() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");

    let batch = queue.begin_batch("setup");
    queue
        .add_component(&mut space, cog, Transform::at(1.0, 1.0))
        .unwrap();
    queue
        .add_component(&mut space, cog, Model::new("cube"))
        .unwrap();
    queue.rename(&mut space, cog, "hero").unwrap();
    queue.end_batch();

    assert_eq!(queue.commands(), &[batch]);
    assert_eq!(queue.children(batch).len(), 3);

    // Reverse order: Model goes before Transform, so the dependency holds
    queue.undo(&mut space).unwrap();
    assert_eq!(space.get(cog).unwrap().component_count(), 0);
    assert_eq!(space.get(cog).unwrap().name(), "actor");
    for child in queue.children(batch) {
        assert!(!queue.is_invalid(*child));
    }

    queue.redo(&mut space).unwrap();
    assert_eq!(
        space.get(cog).unwrap().component_types(),
        vec![TypeId::of::<Transform>(), TypeId::of::<Model>()]
    );
    assert_eq!(space.get(cog).unwrap().name(), "hero");
}

#[test]
fn test_undo_to_middle_operation() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");

    let op1 = queue.rename(&mut space, cog, "one").unwrap();
    let op2 = queue.rename(&mut space, cog, "two").unwrap();
    let op3 = queue.rename(&mut space, cog, "three").unwrap();

    assert_eq!(queue.undo_to(op2, &mut space).unwrap(), 2);
    assert_eq!(queue.commands(), &[op1]);
    assert_eq!(queue.redo_commands(), &[op3, op2]);
    assert_eq!(space.get(cog).unwrap().name(), "one");

    let events = queue.drain_events();
    assert_eq!(
        &events[events.len() - 2..],
        &[QueueEvent::Undone(op3), QueueEvent::Undone(op2)]
    );

    queue.redo(&mut space).unwrap();
    assert_eq!(space.get(cog).unwrap().name(), "two");
}

#[test]
fn test_undo_to_inside_batch_uses_top_level_entry() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");

    let first = queue.rename(&mut space, cog, "first").unwrap();
    queue.begin_batch("pair");
    let inner = queue.rename(&mut space, cog, "second").unwrap();
    queue.rename(&mut space, cog, "third").unwrap();
    queue.end_batch();

    assert_eq!(queue.undo_to(inner, &mut space).unwrap(), 1);
    assert_eq!(queue.commands(), &[first]);
    assert_eq!(space.get(cog).unwrap().name(), "first");
}

#[test]
fn test_stale_target_invalidates_operation() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");
    let op = queue.rename(&mut space, cog, "renamed").unwrap();

    // Destroyed outside the queue: nothing can bring it back
    space.destroy(cog);
    space.flush_destroyed();

    assert!(queue.undo(&mut space).unwrap());
    assert!(queue.is_invalid(op));
    assert!(queue.redo(&mut space).unwrap());
    assert!(space.is_empty());
}

#[test]
fn test_create_destroy_round_trip() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();

    let (world, _) = queue.create_cog(&mut space, "world", None).unwrap();
    queue.add_component(&mut space, world, PhysicsSpace).unwrap();
    let (body, _) = queue.create_cog(&mut space, "body", Some(world)).unwrap();
    queue
        .add_component(&mut space, body, Transform::at(3.0, 4.0))
        .unwrap();
    queue
        .add_component(&mut space, body, SphereCollider { radius: 1.0 })
        .unwrap();
    queue.add_component(&mut space, body, RigidBody).unwrap();

    let before = space.snapshot(world).unwrap();
    queue.destroy_cog(&mut space, world).unwrap();
    assert!(space.is_empty());

    queue.undo(&mut space).unwrap();
    let world = space.find_by_name("world").unwrap();
    assert_eq!(space.snapshot(world).unwrap(), before);

    // Everything older still lands on the recreated cogs
    while queue.undo(&mut space).unwrap() {}
    assert!(space.is_empty());

    // Replay up to, but not including, the destroy
    for _ in 0..6 {
        queue.redo(&mut space).unwrap();
    }
    let world = space.find_by_name("world").unwrap();
    assert_eq!(space.snapshot(world).unwrap(), before);

    queue.redo(&mut space).unwrap();
    assert!(space.is_empty());
}

#[test]
fn test_new_edit_after_undo_clears_redo() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let cog = space.create_cog("actor");
    queue.rename(&mut space, cog, "a").unwrap();
    queue.undo(&mut space).unwrap();
    assert!(queue.can_redo());

    queue.rename(&mut space, cog, "b").unwrap();
    assert!(!queue.can_redo());
    assert_eq!(queue.commands().len(), 1);
}

struct CountQueued(Arc<Mutex<usize>>);

impl QueueObserver for CountQueued {
    fn on_queue_event(&mut self, event: &QueueEvent) {
        if matches!(event, QueueEvent::Queued(_)) {
            *self.0.lock() += 1;
        }
    }
}

#[test]
fn test_every_edit_is_announced() {
    let mut space = fixture_space();
    let mut queue = OperationQueue::new();
    let count = Arc::new(Mutex::new(0));
    queue.register_observer(Box::new(CountQueued(count.clone())));
    let cog = space.create_cog("actor");

    let capacity = queue.config().event_capacity;
    let mut last = None;
    for i in 0..capacity + 76 {
        last = Some(queue.rename(&mut space, cog, format!("name{i}")).unwrap());
    }

    assert_eq!(*count.lock(), capacity + 76);
    assert_eq!(queue.events().count(), capacity);
    assert_eq!(
        queue.events().last(),
        last.map(QueueEvent::Queued).as_ref()
    );
}
