// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reversible operations and the undo/redo queue
//!
//! Operations are recorded after they have been applied. The queue owns
//! every node in a slotmap arena; batches are nodes without a payload whose
//! children undo in reverse and redo in forward order.

use slotmap::{new_key_type, SlotMap};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::cog::CogId;
use crate::config::{EmptyBatchPolicy, OperationQueueConfig};
use crate::error::{CogError, Result};
use crate::event::EventQueue;
use crate::space::Space;
use crate::undo_map::{UndoMap, UndoObjectId};

new_key_type! {
    /// Handle of an operation or batch inside an [`OperationQueue`]
    pub struct OperationId;
}

/// What undo/redo gets to touch
pub struct OperationContext<'a> {
    pub space: &'a mut Space,
    pub undo_map: &'a mut UndoMap,
}

impl OperationContext<'_> {
    /// Live handle for an undo id, or a stale-reference error
    pub fn resolve(&self, id: UndoObjectId) -> Result<CogId> {
        self.undo_map
            .resolve(id, self.space)
            .ok_or_else(|| CogError::OperationInvalid(format!("{id} no longer resolves")))
    }

    pub fn resolve_optional(&self, id: Option<UndoObjectId>) -> Result<Option<CogId>> {
        id.map(|id| self.resolve(id)).transpose()
    }
}

/// A single reversible edit
///
/// Implementations capture whatever they need at record time; `undo` and
/// `redo` are only ever called in alternation, starting with `undo`.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()>;

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    Queued,
    Undone,
    Redone,
}

struct OperationNode {
    name: String,
    parent: Option<OperationId>,
    children: Vec<OperationId>,
    /// `None` for batches
    payload: Option<Box<dyn Operation>>,
    state: OperationState,
    invalid: bool,
}

impl OperationNode {
    fn new(name: String, payload: Option<Box<dyn Operation>>) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            payload,
            state: OperationState::Queued,
            invalid: false,
        }
    }
}

/// Queue notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueEvent {
    Queued(OperationId),
    Undone(OperationId),
    Redone(OperationId),
}

/// Listener called synchronously at every queue, undo and redo
pub trait QueueObserver: Send + Sync {
    fn on_queue_event(&mut self, event: &QueueEvent);

    fn name(&self) -> &str {
        "UnnamedQueueObserver"
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

/// Owner of the undo and redo stacks
pub struct OperationQueue {
    nodes: SlotMap<OperationId, OperationNode>,
    /// Top-level entries, oldest first
    commands: Vec<OperationId>,
    /// Undone top-level entries, most recently undone last
    redo_commands: Vec<OperationId>,
    batch_stack: Vec<OperationId>,
    pub(crate) undo_map: UndoMap,
    events: EventQueue<QueueEvent>,
    observers: Vec<Box<dyn QueueObserver>>,
    config: OperationQueueConfig,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::with_config(OperationQueueConfig::default())
    }

    pub fn with_config(config: OperationQueueConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            commands: Vec::new(),
            redo_commands: Vec::new(),
            batch_stack: Vec::new(),
            undo_map: UndoMap::new(),
            events: EventQueue::with_capacity(config.event_capacity),
            observers: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &OperationQueueConfig {
        &self.config
    }

    pub fn undo_map(&self) -> &UndoMap {
        &self.undo_map
    }

    /// Register a listener; returns its index
    pub fn register_observer(&mut self, observer: Box<dyn QueueObserver>) -> usize {
        tracing::debug!(observer = observer.name(), "queue observer registered");
        self.observers.push(observer);
        self.observers.len() - 1
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&mut self, event: QueueEvent) {
        for observer in &mut self.observers {
            observer.on_queue_event(&event);
        }
        self.events.push(event);
    }

    /// Record an already applied operation.
    ///
    /// Goes into the innermost open batch, or onto the undo stack. Any
    /// pending redo history is discarded.
    pub fn queue(&mut self, op: Box<dyn Operation>) -> OperationId {
        let name = op.name().to_string();
        let id = self.nodes.insert(OperationNode::new(name, Some(op)));
        self.attach_recorded(id);
        id
    }

    fn attach_recorded(&mut self, id: OperationId) {
        self.clear_redo();
        match self.batch_stack.last().copied() {
            Some(batch) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.parent = Some(batch);
                }
                if let Some(parent) = self.nodes.get_mut(batch) {
                    parent.children.push(id);
                }
            }
            None => {
                self.commands.push(id);
                self.trim_to_depth();
            }
        }
        tracing::trace!(op = self.name(id).unwrap_or_default(), "operation queued");
        self.notify(QueueEvent::Queued(id));
    }

    /// Open a batch; operations queued until the matching `end_batch` join it
    pub fn begin_batch(&mut self, name: impl Into<String>) -> OperationId {
        let id = self.nodes.insert(OperationNode::new(name.into(), None));
        self.batch_stack.push(id);
        id
    }

    /// Close the innermost batch. Returns `None` when no batch was open or an
    /// empty batch was dropped.
    pub fn end_batch(&mut self) -> Option<OperationId> {
        let Some(id) = self.batch_stack.pop() else {
            tracing::warn!("end_batch without a matching begin_batch");
            return None;
        };
        let empty = self.nodes.get(id).map_or(true, |n| n.children.is_empty());
        if empty && self.config.empty_batch_policy == EmptyBatchPolicy::Drop {
            self.nodes.remove(id);
            return None;
        }
        self.attach_recorded(id);
        Some(id)
    }

    pub fn is_batching(&self) -> bool {
        !self.batch_stack.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.commands.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_commands.is_empty()
    }

    /// Undo stack, oldest first
    pub fn commands(&self) -> &[OperationId] {
        &self.commands
    }

    /// Redo stack, next to redo last
    pub fn redo_commands(&self) -> &[OperationId] {
        &self.redo_commands
    }

    pub fn name(&self, id: OperationId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    pub fn children(&self, id: OperationId) -> &[OperationId] {
        self.nodes.get(id).map_or(&[][..], |n| n.children.as_slice())
    }

    pub fn state(&self, id: OperationId) -> Option<OperationState> {
        self.nodes.get(id).map(|n| n.state)
    }

    /// Whether the operation lost its target and is skipped from now on
    pub fn is_invalid(&self, id: OperationId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.invalid)
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Outermost batch containing `id` (itself when top level)
    pub fn top_level_ancestor(&self, id: OperationId) -> Option<OperationId> {
        let mut current = id;
        loop {
            match self.nodes.get(current)?.parent {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
    }

    /// Buffered notifications, oldest first. Only the newest
    /// `event_capacity` are kept; observers see every one.
    pub fn events(&self) -> impl Iterator<Item = &QueueEvent> {
        self.events.iter()
    }

    pub fn drain_events(&mut self) -> Vec<QueueEvent> {
        self.events.drain().collect()
    }

    /// Reverse the most recent entry. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, space: &mut Space) -> Result<bool> {
        self.ensure_no_open_batch("undo")?;
        let Some(id) = self.commands.pop() else {
            return Ok(false);
        };

        #[cfg(feature = "profiling")]
        let span = info_span!("operation_queue.undo", op = self.name(id).unwrap_or_default());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        self.run(id, space, Direction::Undo);
        self.redo_commands.push(id);
        self.notify(QueueEvent::Undone(id));
        Ok(true)
    }

    /// Reapply the most recently undone entry
    pub fn redo(&mut self, space: &mut Space) -> Result<bool> {
        self.ensure_no_open_batch("redo")?;
        let Some(id) = self.redo_commands.pop() else {
            return Ok(false);
        };

        #[cfg(feature = "profiling")]
        let span = info_span!("operation_queue.redo", op = self.name(id).unwrap_or_default());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        self.run(id, space, Direction::Redo);
        self.commands.push(id);
        self.notify(QueueEvent::Redone(id));
        Ok(true)
    }

    /// Undo everything back to and including the top-level entry holding `op`.
    /// Returns how many top-level entries were undone.
    pub fn undo_to(&mut self, op: OperationId, space: &mut Space) -> Result<usize> {
        let top = self.top_level_ancestor(op).ok_or_else(|| {
            CogError::OperationInvalid("operation is not in this queue".to_string())
        })?;
        let Some(position) = self.commands.iter().position(|c| *c == top) else {
            return Ok(0);
        };
        let count = self.commands.len() - position;
        for _ in 0..count {
            self.undo(space)?;
        }
        Ok(count)
    }

    /// Redo everything up to and including the top-level entry holding `op`
    pub fn redo_to(&mut self, op: OperationId, space: &mut Space) -> Result<usize> {
        let top = self.top_level_ancestor(op).ok_or_else(|| {
            CogError::OperationInvalid("operation is not in this queue".to_string())
        })?;
        let Some(position) = self.redo_commands.iter().position(|c| *c == top) else {
            return Ok(0);
        };
        let count = self.redo_commands.len() - position;
        for _ in 0..count {
            self.redo(space)?;
        }
        Ok(count)
    }

    /// Drop all history and undo bindings
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.commands.clear();
        self.redo_commands.clear();
        self.batch_stack.clear();
        self.undo_map.clear();
        self.events.clear();
    }

    fn ensure_no_open_batch(&self, what: &str) -> Result<()> {
        if self.batch_stack.is_empty() {
            Ok(())
        } else {
            Err(CogError::OperationInvalid(format!(
                "cannot {what} while a batch is open"
            )))
        }
    }

    fn run(&mut self, id: OperationId, space: &mut Space, direction: Direction) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        match direction {
            Direction::Undo => {
                debug_assert!(
                    node.state != OperationState::Undone,
                    "operation undone twice without a redo"
                );
                if node.state == OperationState::Undone {
                    return;
                }
                node.state = OperationState::Undone;
            }
            Direction::Redo => {
                debug_assert!(
                    node.state == OperationState::Undone,
                    "operation redone without being undone"
                );
                if node.state != OperationState::Undone {
                    return;
                }
                node.state = OperationState::Redone;
            }
        }

        if let Some(mut payload) = node.payload.take() {
            if !node.invalid {
                let mut ctx = OperationContext {
                    space,
                    undo_map: &mut self.undo_map,
                };
                let result = match direction {
                    Direction::Undo => payload.undo(&mut ctx),
                    Direction::Redo => payload.redo(&mut ctx),
                };
                if let Err(err) = result {
                    tracing::warn!(op = payload.name(), error = %err, "operation invalidated");
                    node.invalid = true;
                }
            }
            node.payload = Some(payload);
        }

        let children = node.children.clone();
        match direction {
            Direction::Undo => {
                for child in children.into_iter().rev() {
                    self.run(child, space, direction);
                }
            }
            Direction::Redo => {
                for child in children {
                    self.run(child, space, direction);
                }
            }
        }
    }

    fn clear_redo(&mut self) {
        for id in std::mem::take(&mut self.redo_commands) {
            self.remove_tree(id);
        }
    }

    fn trim_to_depth(&mut self) {
        let max = self.config.max_undo_depth;
        if max == 0 || self.commands.len() <= max {
            return;
        }
        let excess = self.commands.len() - max;
        let trimmed: Vec<_> = self.commands.drain(..excess).collect();
        for id in trimmed {
            self.remove_tree(id);
        }
        tracing::debug!(trimmed = excess, "undo history trimmed");
    }

    fn remove_tree(&mut self, id: OperationId) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.remove_tree(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Appends "<name>:undo"/"<name>:redo" to a shared log
    struct Logged {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Operation for Logged {
        fn name(&self) -> &str {
            &self.name
        }

        fn undo(&mut self, _ctx: &mut OperationContext<'_>) -> Result<()> {
            self.log.lock().push(format!("{}:undo", self.name));
            Ok(())
        }

        fn redo(&mut self, _ctx: &mut OperationContext<'_>) -> Result<()> {
            self.log.lock().push(format!("{}:redo", self.name));
            Ok(())
        }
    }

    fn logged(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Operation> {
        Box::new(Logged {
            name: name.to_string(),
            log: log.clone(),
        })
    }

    /// Always fails, like an edit whose target is gone
    struct Stale;

    impl Operation for Stale {
        fn name(&self) -> &str {
            "stale"
        }

        fn undo(&mut self, _ctx: &mut OperationContext<'_>) -> Result<()> {
            Err(CogError::OperationInvalid("gone".into()))
        }

        fn redo(&mut self, _ctx: &mut OperationContext<'_>) -> Result<()> {
            Err(CogError::OperationInvalid("gone".into()))
        }
    }

    #[test]
    fn test_batch_undo_reverses_children() {
        let mut space = Space::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = OperationQueue::new();

        let batch = queue.begin_batch("x");
        let op1 = queue.queue(logged("op1", &log));
        let op2 = queue.queue(logged("op2", &log));
        assert_eq!(queue.end_batch(), Some(batch));
        assert_eq!(queue.commands(), &[batch]);
        assert_eq!(queue.children(batch), &[op1, op2]);
        assert_eq!(queue.top_level_ancestor(op2), Some(batch));

        assert!(queue.undo(&mut space).unwrap());
        assert_eq!(*log.lock(), ["op2:undo", "op1:undo"]);

        log.lock().clear();
        assert!(queue.redo(&mut space).unwrap());
        assert_eq!(*log.lock(), ["op1:redo", "op2:redo"]);
    }

    #[test]
    fn test_undo_to_second_of_three() {
        let mut space = Space::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = OperationQueue::new();
        let op1 = queue.queue(logged("op1", &log));
        let op2 = queue.queue(logged("op2", &log));
        let op3 = queue.queue(logged("op3", &log));

        assert_eq!(queue.undo_to(op2, &mut space).unwrap(), 2);
        assert_eq!(*log.lock(), ["op3:undo", "op2:undo"]);
        assert_eq!(queue.commands(), &[op1]);
        assert_eq!(queue.redo_commands(), &[op3, op2]);

        log.lock().clear();
        assert_eq!(queue.redo_to(op3, &mut space).unwrap(), 2);
        assert_eq!(*log.lock(), ["op2:redo", "op3:redo"]);
        assert_eq!(queue.commands(), &[op1, op2, op3]);
    }

    #[test]
    fn test_new_edit_discards_redo() {
        let mut space = Space::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = OperationQueue::new();
        let op1 = queue.queue(logged("op1", &log));
        queue.undo(&mut space).unwrap();
        assert!(queue.can_redo());

        queue.queue(logged("op2", &log));
        assert!(!queue.can_redo());
        assert!(!queue.contains(op1));
        assert!(!queue.redo(&mut space).unwrap());
    }

    #[test]
    fn test_empty_batch_policy() {
        let mut queue = OperationQueue::new();
        queue.begin_batch("empty");
        assert_eq!(queue.end_batch(), None);
        assert!(queue.commands().is_empty());

        let mut keeping = OperationQueue::with_config(
            OperationQueueConfig::default().with_empty_batch_policy(EmptyBatchPolicy::Keep),
        );
        let batch = keeping.begin_batch("empty");
        assert_eq!(keeping.end_batch(), Some(batch));
        assert_eq!(keeping.commands(), &[batch]);
    }

    #[test]
    fn test_nested_batches() {
        let mut space = Space::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = OperationQueue::new();

        let outer = queue.begin_batch("outer");
        queue.queue(logged("a", &log));
        let inner = queue.begin_batch("inner");
        let b = queue.queue(logged("b", &log));
        queue.end_batch();
        queue.queue(logged("c", &log));
        queue.end_batch();

        assert_eq!(queue.commands(), &[outer]);
        assert_eq!(queue.top_level_ancestor(b), Some(outer));
        assert_eq!(queue.children(inner), &[b]);

        assert!(queue.undo(&mut space).is_ok());
        assert_eq!(*log.lock(), ["c:undo", "b:undo", "a:undo"]);
    }

    #[test]
    fn test_undo_inside_open_batch_is_rejected() {
        let mut space = Space::new();
        let mut queue = OperationQueue::new();
        queue.begin_batch("open");
        assert!(queue.undo(&mut space).is_err());
    }

    #[test]
    fn test_stale_operation_is_skipped() {
        let mut space = Space::new();
        let mut queue = OperationQueue::new();
        let op = queue.queue(Box::new(Stale));

        assert!(queue.undo(&mut space).unwrap());
        assert!(queue.is_invalid(op));
        assert!(queue.redo(&mut space).unwrap());
        assert_eq!(queue.commands(), &[op]);
    }

    #[test]
    fn test_max_depth_trims_oldest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue =
            OperationQueue::with_config(OperationQueueConfig::default().with_max_undo_depth(2));
        let op1 = queue.queue(logged("op1", &log));
        let op2 = queue.queue(logged("op2", &log));
        let op3 = queue.queue(logged("op3", &log));
        assert_eq!(queue.commands(), &[op2, op3]);
        assert!(!queue.contains(op1));
    }

    #[test]
    fn test_events_are_recorded() {
        let mut space = Space::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = OperationQueue::new();
        let op = queue.queue(logged("op", &log));
        queue.undo(&mut space).unwrap();
        queue.redo(&mut space).unwrap();
        assert_eq!(
            queue.drain_events(),
            vec![
                QueueEvent::Queued(op),
                QueueEvent::Undone(op),
                QueueEvent::Redone(op)
            ]
        );
        assert_eq!(queue.events().count(), 0);
    }

    struct Counter(Arc<Mutex<Vec<QueueEvent>>>);

    impl QueueObserver for Counter {
        fn on_queue_event(&mut self, event: &QueueEvent) {
            self.0.lock().push(*event);
        }
    }

    #[test]
    fn test_events_past_capacity() {
        let mut space = Space::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut queue =
            OperationQueue::with_config(OperationQueueConfig::default().with_event_capacity(4));
        queue.register_observer(Box::new(Counter(seen.clone())));

        let ops: Vec<OperationId> = (0..6)
            .map(|i| queue.queue(logged(&format!("op{i}"), &log)))
            .collect();
        queue.undo(&mut space).unwrap();

        assert_eq!(seen.lock().len(), 7);
        assert_eq!(seen.lock().last(), Some(&QueueEvent::Undone(ops[5])));
        assert_eq!(
            queue.drain_events(),
            vec![
                QueueEvent::Queued(ops[3]),
                QueueEvent::Queued(ops[4]),
                QueueEvent::Queued(ops[5]),
                QueueEvent::Undone(ops[5]),
            ]
        );
    }
}
