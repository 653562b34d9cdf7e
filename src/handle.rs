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

//! Weak-reference handle table.
//!
//! A [`HandleEntry`] is an `(id, slot)` pair. The slot indexes a reusable
//! table entry; the id names the logical object that currently owns it.
//! Resolution only succeeds while the slot still holds the same id, so a
//! handle to a released object keeps failing after its slot is recycled.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Reserved id marking an invalid handle
pub const INVALID_ID: u32 = 0xFFFF_FFFD;

/// Reserved id marking a deleted handle
pub const DELETED_ID: u32 = 0xFFFF_DEAD;

/// Generation-checked weak reference
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleEntry {
    pub id: u32,
    pub slot: u32,
}

impl HandleEntry {
    pub const INVALID: HandleEntry = HandleEntry {
        id: INVALID_ID,
        slot: u32::MAX,
    };

    pub const DELETED: HandleEntry = HandleEntry {
        id: DELETED_ID,
        slot: u32::MAX,
    };

    pub fn new(id: u32, slot: u32) -> Self {
        Self { id, slot }
    }

    /// Pack into a single 64-bit key (id high, slot low)
    pub fn to_u64(self) -> u64 {
        ((self.id as u64) << 32) | self.slot as u64
    }

    pub fn from_u64(packed: u64) -> Self {
        Self {
            id: (packed >> 32) as u32,
            slot: packed as u32,
        }
    }

    pub fn is_sentinel(self) -> bool {
        self.id == INVALID_ID || self.id == DELETED_ID
    }
}

impl Default for HandleEntry {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for HandleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            INVALID_ID => write!(f, "HandleEntry(invalid)"),
            DELETED_ID => write!(f, "HandleEntry(deleted)"),
            id => write!(f, "HandleEntry({id}@{})", self.slot),
        }
    }
}

impl fmt::Display for HandleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.slot)
    }
}

struct Slot<T> {
    /// Id of the current occupant; 0 while free
    id: u32,
    value: Option<T>,
}

/// Slot table mapping handles to live values
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_slots: Vec<u32>,
    next_id: u32,
    live: usize,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_slots: Vec::new(),
            next_id: 1,
            live: 0,
        }
    }

    fn issue_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = match self.next_id.wrapping_add(1) {
                0 => 1,
                next => next,
            };
            if id != INVALID_ID && id != DELETED_ID {
                return id;
            }
        }
    }

    /// Reserve a slot for `value` and return its handle
    pub fn allocate(&mut self, value: T) -> HandleEntry {
        let id = self.issue_id();
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.id = id;
                entry.value = Some(value);
                slot
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    id,
                    value: Some(value),
                });
                slot
            }
        };
        self.live += 1;
        HandleEntry { id, slot }
    }

    fn slot_for(&self, entry: HandleEntry) -> Option<&Slot<T>> {
        if entry.is_sentinel() || entry.id == 0 {
            return None;
        }
        self.slots
            .get(entry.slot as usize)
            .filter(|slot| slot.id == entry.id)
    }

    pub fn resolve(&self, entry: HandleEntry) -> Option<&T> {
        self.slot_for(entry).and_then(|slot| slot.value.as_ref())
    }

    pub fn resolve_mut(&mut self, entry: HandleEntry) -> Option<&mut T> {
        if entry.is_sentinel() || entry.id == 0 {
            return None;
        }
        self.slots
            .get_mut(entry.slot as usize)
            .filter(|slot| slot.id == entry.id)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, entry: HandleEntry) -> bool {
        self.resolve(entry).is_some()
    }

    /// Free the slot and hand back the value. Stale handles return `None`.
    pub fn release(&mut self, entry: HandleEntry) -> Option<T> {
        if entry.is_sentinel() || entry.id == 0 {
            return None;
        }
        let slot = self.slots.get_mut(entry.slot as usize)?;
        if slot.id != entry.id {
            return None;
        }
        let value = slot.value.take();
        slot.id = 0;
        self.free_slots.push(entry.slot);
        self.live -= 1;
        value
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever created (live + free)
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Id the next allocation will receive (before sentinel skipping)
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn iter(&self) -> impl Iterator<Item = (HandleEntry, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry
                .value
                .as_ref()
                .map(|value| (HandleEntry::new(entry.id, slot as u32), value))
        })
    }

    pub fn handles(&self) -> Vec<HandleEntry> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&mut self, id: u32) {
        self.next_id = id;
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle table behind a read/write lock, for hosts that share it across threads
pub struct SharedHandleTable<T> {
    inner: Arc<RwLock<HandleTable<T>>>,
}

impl<T> Clone for SharedHandleTable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedHandleTable<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HandleTable::new())),
        }
    }

    pub fn allocate(&self, value: T) -> HandleEntry {
        self.inner.write().allocate(value)
    }

    pub fn release(&self, entry: HandleEntry) -> Option<T> {
        self.inner.write().release(entry)
    }

    pub fn contains(&self, entry: HandleEntry) -> bool {
        self.inner.read().contains(entry)
    }

    /// Run `f` against the resolved value while holding the read lock
    pub fn with<R>(&self, entry: HandleEntry, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.read().resolve(entry).map(f)
    }

    pub fn with_mut<R>(&self, entry: HandleEntry, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.write().resolve_mut(entry).map(f)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<T> Default for SharedHandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
