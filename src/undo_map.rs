//! Stable undo identities for cogs.
//!
//! Operations never hold a [`CogId`] directly: a cog destroyed by one
//! operation and recreated by its undo comes back under a new handle. The
//! map keeps an [`UndoObjectId`] pointing at whatever handle currently
//! stands for the object.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::cog::CogId;
use crate::space::Space;

/// Identity of an object across destroy/recreate cycles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UndoObjectId(u64);

impl UndoObjectId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UndoObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "undo#{}", self.0)
    }
}

#[derive(Debug)]
pub struct UndoMap {
    next: u64,
    to_cog: AHashMap<UndoObjectId, CogId>,
    to_undo: AHashMap<CogId, UndoObjectId>,
}

impl Default for UndoMap {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoMap {
    pub fn new() -> Self {
        Self {
            next: 1,
            to_cog: AHashMap::new(),
            to_undo: AHashMap::new(),
        }
    }

    /// Existing undo id for `cog`, or a fresh one
    pub fn get_or_create(&mut self, cog: CogId) -> UndoObjectId {
        if let Some(id) = self.to_undo.get(&cog) {
            return *id;
        }
        let id = UndoObjectId(self.next);
        self.next += 1;
        self.to_cog.insert(id, cog);
        self.to_undo.insert(cog, id);
        id
    }

    pub fn undo_id_of(&self, cog: CogId) -> Option<UndoObjectId> {
        self.to_undo.get(&cog).copied()
    }

    /// Current handle for `id`, only if it is still live in `space`
    pub fn resolve(&self, id: UndoObjectId, space: &Space) -> Option<CogId> {
        self.to_cog
            .get(&id)
            .copied()
            .filter(|cog| space.is_valid(*cog))
    }

    /// Point `id` at a recreated cog
    pub fn update(&mut self, id: UndoObjectId, cog: CogId) {
        if let Some(old) = self.to_cog.insert(id, cog) {
            self.to_undo.remove(&old);
        }
        self.to_undo.insert(cog, id);
    }

    pub fn len(&self) -> usize {
        self.to_cog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_cog.is_empty()
    }

    /// Forget every binding; ids keep increasing
    pub fn clear(&mut self) {
        self.to_cog.clear();
        self.to_undo.clear();
    }
}
