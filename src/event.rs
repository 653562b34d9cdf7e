use std::any::TypeId;
use std::collections::VecDeque;

use crate::cog::CogId;

/// Cog lifecycle and structure notifications
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CogEvent {
    /// Cog was created (not yet initialized)
    Created(CogId),

    /// Cog finished its initialization passes
    Initialized(CogId),

    /// Component was added to cog
    ComponentAdded(CogId, TypeId),

    /// Component was removed from cog
    ComponentRemoved(CogId, TypeId),

    /// Component list order changed
    ComponentsReordered(CogId),

    /// Cog was attached under a parent
    Attached { cog: CogId, parent: CogId },

    /// Cog was detached from its parent and moved to the root list
    Detached { cog: CogId, parent: CogId },

    /// Cog (and its subtree) was queued for destruction
    DestroyRequested(CogId),

    /// Cog was removed at a flush point
    Destroyed(CogId),

    /// Cog was renamed
    Renamed(CogId),
}

impl CogEvent {
    /// Get the cog involved in this event
    pub fn cog_id(&self) -> CogId {
        match self {
            CogEvent::Created(id)
            | CogEvent::Initialized(id)
            | CogEvent::ComponentAdded(id, _)
            | CogEvent::ComponentRemoved(id, _)
            | CogEvent::ComponentsReordered(id)
            | CogEvent::DestroyRequested(id)
            | CogEvent::Destroyed(id)
            | CogEvent::Renamed(id) => *id,
            CogEvent::Attached { cog, .. } | CogEvent::Detached { cog, .. } => *cog,
        }
    }

    /// Get event type name for debugging
    pub fn event_type(&self) -> &'static str {
        match self {
            CogEvent::Created(_) => "Created",
            CogEvent::Initialized(_) => "Initialized",
            CogEvent::ComponentAdded(_, _) => "ComponentAdded",
            CogEvent::ComponentRemoved(_, _) => "ComponentRemoved",
            CogEvent::ComponentsReordered(_) => "ComponentsReordered",
            CogEvent::Attached { .. } => "Attached",
            CogEvent::Detached { .. } => "Detached",
            CogEvent::DestroyRequested(_) => "DestroyRequested",
            CogEvent::Destroyed(_) => "Destroyed",
            CogEvent::Renamed(_) => "Renamed",
        }
    }
}

/// Bounded queue for deferred event processing; keeps the newest events
#[derive(Debug)]
pub struct EventQueue<E> {
    events: VecDeque<E>,
    capacity: usize,
    dropped: usize,
    overflowing: bool,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
            overflowing: false,
        }
    }

    /// Add event to queue; evicts the oldest one when full
    pub fn push(&mut self, event: E) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            if !self.overflowing {
                self.overflowing = true;
                tracing::warn!(capacity = self.capacity, "event queue full, evicting oldest events");
            }
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<E> {
        self.overflowing = false;
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.overflowing = false;
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.overflowing = false;
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events evicted by overflow since creation
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
