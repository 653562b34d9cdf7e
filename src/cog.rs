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

//! Cog: the composition object components attach to.
//!
//! A cog keeps its components in two views: an ordered list (insertion
//! order is initialization order) and a type index for constant-time typed
//! lookup. Hierarchy membership is stored as handle links, never pointers.

use std::any::TypeId;
use std::ops::{BitOr, BitOrAssign};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::component::Component;
use crate::handle::HandleEntry;

/// Runtime id of a cog
pub type CogId = HandleEntry;

new_key_type! {
    /// Stable key of a component within its owning cog
    pub struct ComponentKey;
}

/// Cog lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CogState {
    Uninitialized,
    Initializing,
    Initialized,
    MarkedForDestruction,
    Destroyed,
}

impl CogState {
    /// Component add/remove is allowed
    pub fn allows_component_edits(self) -> bool {
        self != CogState::Destroyed
    }

    /// Attach/detach is allowed
    pub fn allows_hierarchy_edits(self) -> bool {
        !matches!(self, CogState::Destroyed | CogState::MarkedForDestruction)
    }
}

/// Boolean cog flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CogFlags(u16);

impl CogFlags {
    pub const NONE: CogFlags = CogFlags(0);
    /// `destroy` is ignored; only `force_destroy` removes the cog
    pub const PROTECTED: CogFlags = CogFlags(1 << 0);
    /// Survives level changes
    pub const PERSISTENT: CogFlags = CogFlags(1 << 1);
    /// Never saved
    pub const TRANSIENT: CogFlags = CogFlags(1 << 2);
    /// Not selectable in tooling
    pub const LOCKED: CogFlags = CogFlags(1 << 3);
    /// Hidden from views
    pub const HIDDEN: CogFlags = CogFlags(1 << 4);
    pub const EDITOR_ONLY: CogFlags = CogFlags(1 << 5);

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        CogFlags(bits)
    }

    pub fn contains(self, other: CogFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CogFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: CogFlags) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: CogFlags, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CogFlags {
    type Output = CogFlags;

    fn bitor(self, rhs: CogFlags) -> CogFlags {
        CogFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CogFlags {
    fn bitor_assign(&mut self, rhs: CogFlags) {
        self.0 |= rhs.0;
    }
}

/// Head of a doubly linked sibling list (a cog's children, or the roots)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SiblingList {
    pub first: Option<CogId>,
    pub last: Option<CogId>,
    pub count: usize,
}

/// Intrusive hierarchy links, stored as handles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HierarchyLinks {
    pub parent: Option<CogId>,
    pub prev_sibling: Option<CogId>,
    pub next_sibling: Option<CogId>,
    pub children: SiblingList,
}

struct ComponentSlot {
    type_id: TypeId,
    /// Exact type plus provided interfaces
    index_keys: SmallVec<[TypeId; 3]>,
    component: Box<dyn Component>,
}

/// Composition object
pub struct Cog {
    id: CogId,
    name: String,
    state: CogState,
    pub(crate) flags: CogFlags,
    pub(crate) links: HierarchyLinks,
    archetype: Option<String>,
    child_guid: Option<u64>,

    components: SlotMap<ComponentKey, ComponentSlot>,
    order: Vec<ComponentKey>,
    type_index: AHashMap<TypeId, SmallVec<[ComponentKey; 2]>>,
}

impl std::fmt::Debug for Cog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cog")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("components", &self.order.len())
            .finish()
    }
}

impl Cog {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            id: CogId::INVALID,
            name: name.into(),
            state: CogState::Uninitialized,
            flags: CogFlags::NONE,
            links: HierarchyLinks::default(),
            archetype: None,
            child_guid: None,
            components: SlotMap::with_key(),
            order: Vec::new(),
            type_index: AHashMap::new(),
        }
    }

    pub fn id(&self) -> CogId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: CogId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn state(&self) -> CogState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: CogState) {
        self.state = state;
    }

    pub fn is_initialized(&self) -> bool {
        self.state == CogState::Initialized
    }

    pub fn is_marked_for_destruction(&self) -> bool {
        matches!(
            self.state,
            CogState::MarkedForDestruction | CogState::Destroyed
        )
    }

    pub fn flags(&self) -> CogFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: CogFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn links(&self) -> &HierarchyLinks {
        &self.links
    }

    pub fn parent(&self) -> Option<CogId> {
        self.links.parent
    }

    pub fn child_count(&self) -> usize {
        self.links.children.count
    }

    pub fn first_child(&self) -> Option<CogId> {
        self.links.children.first
    }

    pub fn next_sibling(&self) -> Option<CogId> {
        self.links.next_sibling
    }

    pub fn prev_sibling(&self) -> Option<CogId> {
        self.links.prev_sibling
    }

    pub fn archetype(&self) -> Option<&str> {
        self.archetype.as_deref()
    }

    pub fn set_archetype(&mut self, archetype: Option<String>) {
        self.archetype = archetype;
    }

    pub fn child_guid(&self) -> Option<u64> {
        self.child_guid
    }

    pub fn set_child_guid(&mut self, guid: Option<u64>) {
        self.child_guid = guid;
    }

    // ---- components ---------------------------------------------------

    pub fn component_count(&self) -> usize {
        self.order.len()
    }

    /// Typed lookup through the type index
    pub fn has<T: Component>(&self) -> Option<&T> {
        let key = self.key_of_exact(TypeId::of::<T>())?;
        self.components[key].component.downcast_ref::<T>()
    }

    pub fn has_mut<T: Component>(&mut self) -> Option<&mut T> {
        let key = self.key_of_exact(TypeId::of::<T>())?;
        self.components
            .get_mut(key)
            .and_then(|slot| slot.component.downcast_mut::<T>())
    }

    /// First component indexed under `type_id` (exact type or interface)
    pub fn first_indexed(&self, type_id: TypeId) -> Option<&dyn Component> {
        let key = *self.type_index.get(&type_id)?.first()?;
        self.components.get(key).map(|slot| slot.component.as_ref())
    }

    pub fn first_indexed_mut(&mut self, type_id: TypeId) -> Option<&mut dyn Component> {
        let key = *self.type_index.get(&type_id)?.first()?;
        self.components
            .get_mut(key)
            .map(|slot| slot.component.as_mut())
    }

    /// Every component indexed under `type_id`, in list order
    pub fn all_indexed(&self, type_id: TypeId) -> impl Iterator<Item = &dyn Component> + '_ {
        self.type_index
            .get(&type_id)
            .into_iter()
            .flat_map(|keys| keys.iter())
            .filter_map(move |key| self.components.get(*key))
            .map(|slot| slot.component.as_ref())
    }

    pub fn is_indexed(&self, type_id: TypeId) -> bool {
        self.type_index
            .get(&type_id)
            .is_some_and(|keys| !keys.is_empty())
    }

    /// Exact type of the component, if it is present
    pub fn has_exact(&self, type_id: TypeId) -> bool {
        self.key_of_exact(type_id).is_some()
    }

    pub(crate) fn key_of_exact(&self, type_id: TypeId) -> Option<ComponentKey> {
        self.type_index
            .get(&type_id)?
            .iter()
            .copied()
            .find(|key| self.components[*key].type_id == type_id)
    }

    /// Component of exactly `type_id`, never one that only provides it
    pub fn component_exact(&self, type_id: TypeId) -> Option<&dyn Component> {
        let key = self.key_of_exact(type_id)?;
        self.components.get(key).map(|slot| slot.component.as_ref())
    }

    /// Position of the exact-typed component in the ordered list
    pub fn component_index(&self, type_id: TypeId) -> Option<usize> {
        let key = self.key_of_exact(type_id)?;
        self.order.iter().position(|k| *k == key)
    }

    /// Exact type ids of the components, in list order
    pub fn component_types(&self) -> Vec<TypeId> {
        self.order
            .iter()
            .map(|key| self.components[*key].type_id)
            .collect()
    }

    /// Components in list order
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.order
            .iter()
            .map(move |key| self.components[*key].component.as_ref())
    }

    pub(crate) fn component_keys(&self) -> &[ComponentKey] {
        &self.order
    }

    pub(crate) fn component_mut(&mut self, key: ComponentKey) -> Option<&mut dyn Component> {
        self.components
            .get_mut(key)
            .map(|slot| slot.component.as_mut())
    }

    /// Insert without rule checks; keeps the list and the index in step
    pub(crate) fn insert_component(
        &mut self,
        component: Box<dyn Component>,
        index_keys: SmallVec<[TypeId; 3]>,
        position: Option<usize>,
    ) -> ComponentKey {
        let type_id = component.as_any().type_id();
        let key = self.components.insert(ComponentSlot {
            type_id,
            index_keys: index_keys.clone(),
            component,
        });

        let position = position
            .filter(|p| *p <= self.order.len())
            .unwrap_or(self.order.len());
        self.order.insert(position, key);

        for index_key in index_keys {
            let keys = self.type_index.entry(index_key).or_default();
            keys.push(key);
            self.sort_index_by_order(index_key);
        }
        key
    }

    /// Remove without rule checks; returns the component and its old position
    pub(crate) fn take_component(
        &mut self,
        key: ComponentKey,
    ) -> Option<(Box<dyn Component>, usize)> {
        let slot = self.components.remove(key)?;
        let position = self.order.iter().position(|k| *k == key)?;
        self.order.remove(position);
        for index_key in &slot.index_keys {
            if let Some(keys) = self.type_index.get_mut(index_key) {
                keys.retain(|k| *k != key);
                if keys.is_empty() {
                    self.type_index.remove(index_key);
                }
            }
        }
        Some((slot.component, position))
    }

    /// Move a component to `position` in the list
    pub(crate) fn reorder_component(&mut self, key: ComponentKey, position: usize) -> bool {
        let Some(current) = self.order.iter().position(|k| *k == key) else {
            return false;
        };
        self.order.remove(current);
        let position = position.min(self.order.len());
        self.order.insert(position, key);

        let index_keys = self.components[key].index_keys.clone();
        for index_key in index_keys {
            self.sort_index_by_order(index_key);
        }
        true
    }

    /// Keep multi-valued index entries in list order
    fn sort_index_by_order(&mut self, index_key: TypeId) {
        let order = &self.order;
        if let Some(keys) = self.type_index.get_mut(&index_key) {
            if keys.len() > 1 {
                keys.sort_by_key(|k| order.iter().position(|o| o == k).unwrap_or(usize::MAX));
            }
        }
    }

    pub(crate) fn take_all_components(&mut self) -> Vec<Box<dyn Component>> {
        let keys = std::mem::take(&mut self.order);
        self.type_index.clear();
        keys.into_iter()
            .filter_map(|key| self.components.remove(key))
            .map(|slot| slot.component)
            .collect()
    }
}
