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

//! Space: arena that owns cogs, their hierarchy and deferred destruction

use std::any::TypeId;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::cog::{Cog, CogFlags, CogId, CogState, ComponentKey, SiblingList};
use crate::component::{short_type_name, Component, ComponentRegistry, TypeKey};
use crate::config::SpaceConfig;
use crate::dependency::{ComponentDependencyResolver, Descendant};
use crate::error::{CogError, Result};
use crate::event::CogEvent;
use crate::handle::HandleTable;
use crate::hierarchy;
use crate::observer::{Observer, ObserverRegistry};
use crate::property::{MutationContext, PropertyValue};

/// Owner of every cog
pub struct Space {
    cogs: HandleTable<Cog>,
    roots: SiblingList,
    registry: ComponentRegistry,
    observers: ObserverRegistry,

    /// Roots of subtrees waiting for the next flush
    pending_destroy: Vec<CogId>,

    config: SpaceConfig,
}

impl Space {
    pub fn new() -> Self {
        Self::with_config(SpaceConfig::default())
    }

    pub fn with_config(config: SpaceConfig) -> Self {
        Self {
            cogs: HandleTable::with_capacity(config.initial_capacity),
            roots: SiblingList::default(),
            registry: ComponentRegistry::new(),
            observers: ObserverRegistry::new(),
            pending_destroy: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn register_observer(&mut self, observer: Box<dyn Observer>) -> usize {
        self.observers.register(observer)
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverRegistry {
        &mut self.observers
    }

    fn notify(&mut self, event: CogEvent) {
        self.observers.broadcast(&event);
    }

    // ---- lookup -------------------------------------------------------

    pub fn cog(&self, id: CogId) -> Option<&Cog> {
        self.cogs.resolve(id)
    }

    pub fn cog_mut(&mut self, id: CogId) -> Option<&mut Cog> {
        self.cogs.resolve_mut(id)
    }

    /// Like [`Space::cog`] but with an error for `?` chains
    pub fn get(&self, id: CogId) -> Result<&Cog> {
        self.cogs.resolve(id).ok_or(CogError::CogNotFound(id))
    }

    fn get_mut(&mut self, id: CogId) -> Result<&mut Cog> {
        self.cogs.resolve_mut(id).ok_or(CogError::CogNotFound(id))
    }

    pub fn is_valid(&self, id: CogId) -> bool {
        self.cogs.contains(id)
    }

    /// Live cogs, including ones waiting for destruction
    pub fn len(&self) -> usize {
        self.cogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cogs.is_empty()
    }

    pub fn cog_ids(&self) -> Vec<CogId> {
        self.cogs.handles()
    }

    pub fn first_root(&self) -> Option<CogId> {
        self.roots.first
    }

    pub fn root_count(&self) -> usize {
        self.roots.count
    }

    pub fn find_by_name(&self, name: &str) -> Option<CogId> {
        hierarchy::space_tree(self).named(name).next()
    }

    pub fn find_all_by_name(&self, name: &str) -> Vec<CogId> {
        hierarchy::space_tree(self).named(name).collect()
    }

    // ---- creation -----------------------------------------------------

    /// Create an uninitialized cog at the end of the root list
    pub fn create_cog(&mut self, name: impl Into<String>) -> CogId {
        let id = self.cogs.allocate(Cog::new(name));
        if let Some(cog) = self.cogs.resolve_mut(id) {
            cog.set_id(id);
        }
        self.link(id, None, None);
        tracing::trace!(cog = %id, "cog created");
        self.notify(CogEvent::Created(id));
        id
    }

    /// Create, attach components and initialize in one step
    pub fn create_initialized(
        &mut self,
        name: impl Into<String>,
        components: Vec<Box<dyn Component>>,
    ) -> Result<CogId> {
        let id = self.create_cog(name);
        if let Err(err) = self.add_components(id, components) {
            self.discard(id);
            return Err(err);
        }
        self.initialize_cog(id)?;
        Ok(id)
    }

    /// Drop a cog that never became visible to callers
    fn discard(&mut self, id: CogId) {
        self.unlink(id);
        self.cogs.release(id);
    }

    /// Run initialization: every component in list order, then the
    /// all-initialized pass in list order
    pub fn initialize_cog(&mut self, id: CogId) -> Result<()> {
        let cog = self.get_mut(id)?;
        if cog.state() != CogState::Uninitialized {
            return Err(CogError::InvalidState {
                cog: id,
                state: cog.state(),
                operation: "initialize",
            });
        }
        cog.set_state(CogState::Initializing);

        let keys = cog.component_keys().to_vec();
        for key in &keys {
            if let Some(component) = cog.component_mut(*key) {
                component.on_initialize(id);
            }
        }
        for key in &keys {
            if let Some(component) = cog.component_mut(*key) {
                component.on_all_initialized(id);
            }
        }
        cog.set_state(CogState::Initialized);
        self.notify(CogEvent::Initialized(id));
        Ok(())
    }

    pub fn rename(&mut self, id: CogId, name: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.set_name(name);
        self.notify(CogEvent::Renamed(id));
        Ok(())
    }

    pub fn set_flag(&mut self, id: CogId, flag: CogFlags, value: bool) -> Result<()> {
        self.get_mut(id)?.flags.set(flag, value);
        Ok(())
    }

    // ---- components ---------------------------------------------------

    pub fn has<T: Component>(&self, id: CogId) -> Option<&T> {
        self.cog(id)?.has::<T>()
    }

    pub fn has_mut<T: Component>(&mut self, id: CogId) -> Option<&mut T> {
        self.cog_mut(id)?.has_mut::<T>()
    }

    /// First component indexed under an interface (or exact) type id
    pub fn has_interface(&self, id: CogId, type_id: TypeId) -> Option<&dyn Component> {
        self.cog(id)?.first_indexed(type_id)
    }

    pub fn component_index(&self, id: CogId, type_id: TypeId) -> Option<usize> {
        self.cog(id)?.component_index(type_id)
    }

    fn type_key_of(&self, component: &dyn Component) -> TypeKey {
        let type_id = component.as_any().type_id();
        TypeKey {
            id: type_id,
            name: self.registry.name_of(type_id, component),
        }
    }

    /// Key for an exact type id, named from the registry or the live component
    fn type_key_on(&self, cog: &Cog, type_id: TypeId) -> TypeKey {
        let name = match (self.registry.get(type_id), cog.first_indexed(type_id)) {
            (Some(info), _) => info.name(),
            (None, Some(component)) => short_type_name(component.component_name()),
            (None, None) => "<unknown>",
        };
        TypeKey { id: type_id, name }
    }

    fn ancestor_cogs(&self, id: CogId) -> Vec<&Cog> {
        hierarchy::ancestors(self, id)
            .filter_map(|a| self.cog(a))
            .collect()
    }

    /// Ancestors of `member` strictly below `top`, nearest first
    fn cogs_between(&self, member: CogId, top: CogId) -> Vec<&Cog> {
        hierarchy::ancestors(self, member)
            .take_while(|a| *a != top)
            .filter_map(|a| self.cog(a))
            .collect()
    }

    fn descendants_of(&self, id: CogId) -> Vec<Descendant<'_>> {
        hierarchy::sub_tree(self, id)
            .skip(1)
            .filter_map(|d| {
                Some(Descendant {
                    cog: self.cog(d)?,
                    between: self.cogs_between(d, id),
                })
            })
            .collect()
    }

    /// Check that `child`'s subtree keeps every required ancestor once it
    /// hangs under `new_parent` (or among the roots)
    fn check_move(&self, child: CogId, new_parent: Option<CogId>) -> Result<()> {
        let moved = self.get(child)?;
        let outer: Vec<&Cog> = match new_parent {
            Some(parent) => std::iter::once(parent)
                .chain(hierarchy::ancestors(self, parent))
                .filter_map(|a| self.cog(a))
                .collect(),
            None => Vec::new(),
        };
        let resolver = ComponentDependencyResolver::new(&self.registry);
        for member in hierarchy::sub_tree(self, child) {
            let Some(cog) = self.cog(member) else {
                continue;
            };
            let mut inner = Vec::new();
            if member != child {
                inner = self.cogs_between(member, child);
                inner.push(moved);
            }
            if let Err(reason) =
                resolver.check_ancestors(cog, inner.into_iter().chain(outer.iter().copied()))
            {
                tracing::debug!(cog = %child, %reason, "hierarchy move rejected");
                return Err(reason.into());
            }
        }
        Ok(())
    }

    fn check_component_edit(&self, id: CogId, operation: &'static str) -> Result<&Cog> {
        let cog = self.get(id)?;
        if !cog.state().allows_component_edits() {
            return Err(CogError::InvalidState {
                cog: id,
                state: cog.state(),
                operation,
            });
        }
        Ok(cog)
    }

    /// Advisory check for adding a component of `candidate`
    pub fn can_add(&self, id: CogId, candidate: TypeKey) -> Result<()> {
        let cog = self.get(id)?;
        ComponentDependencyResolver::new(&self.registry)
            .can_add(cog, self.ancestor_cogs(id), candidate)
            .map_err(CogError::from)
    }

    /// Advisory check for removing the component of exact type `type_id`
    pub fn can_remove(&self, id: CogId, type_id: TypeId) -> Result<()> {
        let cog = self.get(id)?;
        let key = self.type_key_on(cog, type_id);
        if !cog.has_exact(type_id) {
            return Err(CogError::ComponentNotFound(key.name));
        }
        ComponentDependencyResolver::new(&self.registry)
            .can_remove(cog, self.ancestor_cogs(id), self.descendants_of(id), key)
            .map_err(CogError::from)
    }

    pub fn add_component<T: Component>(&mut self, id: CogId, component: T) -> Result<ComponentKey> {
        self.add_component_at(id, Box::new(component), None)
    }

    /// Insert at `index` (end when `None`) once the dependency rules pass.
    /// On rejection the cog is left untouched.
    pub fn add_component_at(
        &mut self,
        id: CogId,
        component: Box<dyn Component>,
        index: Option<usize>,
    ) -> Result<ComponentKey> {
        let cog = self.check_component_edit(id, "add a component to")?;
        let key = self.type_key_of(component.as_ref());
        if let Err(reason) = ComponentDependencyResolver::new(&self.registry).can_add(
            cog,
            self.ancestor_cogs(id),
            key,
        ) {
            tracing::debug!(cog = %id, component = key.name, %reason, "component add rejected");
            return Err(reason.into());
        }

        let index_keys = self.registry.index_keys(key.id);
        let trace = self.config.trace_component_edits;
        let cog = self.get_mut(id)?;
        let component_key = cog.insert_component(component, index_keys, index);
        if cog.is_initialized() {
            if let Some(component) = cog.component_mut(component_key) {
                component.on_initialize(id);
                component.on_all_initialized(id);
            }
        }
        if trace {
            tracing::debug!(cog = %id, component = key.name, "component added");
        }
        self.notify(CogEvent::ComponentAdded(id, key.id));
        Ok(component_key)
    }

    /// Add several components atomically; dependencies may be met inside the batch
    pub fn add_components(
        &mut self,
        id: CogId,
        components: Vec<Box<dyn Component>>,
    ) -> Result<Vec<ComponentKey>> {
        let cog = self.check_component_edit(id, "add components to")?;
        let keys: Vec<TypeKey> = components
            .iter()
            .map(|c| self.type_key_of(c.as_ref()))
            .collect();
        ComponentDependencyResolver::new(&self.registry).can_add_batch(
            cog,
            self.ancestor_cogs(id),
            &keys,
        )?;

        let index_keys: Vec<_> = keys.iter().map(|k| self.registry.index_keys(k.id)).collect();
        let cog = self.get_mut(id)?;
        let initialized = cog.is_initialized();
        let mut added = Vec::with_capacity(components.len());
        for (component, index_keys) in components.into_iter().zip(index_keys) {
            added.push(cog.insert_component(component, index_keys, None));
        }
        if initialized {
            for key in &added {
                if let Some(component) = cog.component_mut(*key) {
                    component.on_initialize(id);
                }
            }
            for key in &added {
                if let Some(component) = cog.component_mut(*key) {
                    component.on_all_initialized(id);
                }
            }
        }
        for key in &keys {
            self.notify(CogEvent::ComponentAdded(id, key.id));
        }
        Ok(added)
    }

    pub fn remove_component<T: Component>(&mut self, id: CogId) -> Result<()> {
        self.remove_component_by_type(id, TypeId::of::<T>()).map(|_| ())
    }

    /// Remove the exact-typed component unless another component depends on it.
    /// `on_destroy` runs before the component is handed back.
    pub fn remove_component_by_type(
        &mut self,
        id: CogId,
        type_id: TypeId,
    ) -> Result<Box<dyn Component>> {
        self.take_component(id, type_id).map(|(component, _)| component)
    }

    /// Removal that also reports the list position the component held
    pub(crate) fn take_component(
        &mut self,
        id: CogId,
        type_id: TypeId,
    ) -> Result<(Box<dyn Component>, usize)> {
        let cog = self.check_component_edit(id, "remove a component from")?;
        let key = self.type_key_on(cog, type_id);
        let component_key = cog
            .key_of_exact(type_id)
            .ok_or(CogError::ComponentNotFound(key.name))?;
        if let Err(reason) = ComponentDependencyResolver::new(&self.registry).can_remove(
            cog,
            self.ancestor_cogs(id),
            self.descendants_of(id),
            key,
        ) {
            tracing::debug!(cog = %id, component = key.name, %reason, "component removal rejected");
            return Err(reason.into());
        }

        let trace = self.config.trace_component_edits;
        let cog = self.get_mut(id)?;
        let (mut component, position) = cog
            .take_component(component_key)
            .ok_or(CogError::ComponentNotFound(key.name))?;
        component.on_destroy(id);
        if trace {
            tracing::debug!(cog = %id, component = key.name, "component removed");
        }
        self.notify(CogEvent::ComponentRemoved(id, type_id));
        Ok((component, position))
    }

    /// Move the component of type `moving` in front of `before`
    /// (to the end of the list when `before` is `None`)
    pub fn move_component_before(
        &mut self,
        id: CogId,
        moving: TypeId,
        before: Option<TypeId>,
    ) -> Result<()> {
        let cog = self.check_component_edit(id, "reorder components of")?;
        let moving_name = self.type_key_on(cog, moving).name;
        let current = cog
            .component_index(moving)
            .ok_or(CogError::ComponentNotFound(moving_name))?;
        let target = match before {
            Some(before) => {
                let index = cog
                    .component_index(before)
                    .ok_or(CogError::ComponentNotFound(self.type_key_on(cog, before).name))?;
                // Removing `moving` first shifts later entries left
                if index > current {
                    index - 1
                } else {
                    index
                }
            }
            None => cog.component_count() - 1,
        };
        self.move_component_to(id, moving, target)
    }

    /// Move the component of type `type_id` to list position `index`
    pub fn move_component_to(&mut self, id: CogId, type_id: TypeId, index: usize) -> Result<()> {
        let cog = self.check_component_edit(id, "reorder components of")?;
        let name = self.type_key_on(cog, type_id).name;
        let cog = self.get_mut(id)?;
        let key = cog
            .key_of_exact(type_id)
            .ok_or(CogError::ComponentNotFound(name))?;
        cog.reorder_component(key, index);
        self.notify(CogEvent::ComponentsReordered(id));
        Ok(())
    }

    /// Read a property from the exact-typed component
    pub fn property(&self, id: CogId, type_id: TypeId, path: &str) -> Option<PropertyValue> {
        self.cog(id)?.component_exact(type_id)?.property(path)
    }

    /// Set a property on the exact-typed component through `ctx`
    pub fn set_property(
        &mut self,
        id: CogId,
        type_id: TypeId,
        path: &str,
        value: PropertyValue,
        ctx: &mut MutationContext,
    ) -> Result<()> {
        let cog = self.get(id)?;
        let name = self.type_key_on(cog, type_id).name;
        let cog = self.get_mut(id)?;
        let key = cog
            .key_of_exact(type_id)
            .ok_or(CogError::ComponentNotFound(name))?;
        let component = cog
            .component_mut(key)
            .ok_or(CogError::ComponentNotFound(name))?;
        component.set_property(path, value, ctx)
    }

    // ---- hierarchy ----------------------------------------------------

    fn list_mut(&mut self, owner: Option<CogId>) -> Option<&mut SiblingList> {
        match owner {
            None => Some(&mut self.roots),
            Some(parent) => self
                .cogs
                .resolve_mut(parent)
                .map(|cog| &mut cog.links.children),
        }
    }

    fn list(&self, owner: Option<CogId>) -> Option<&SiblingList> {
        match owner {
            None => Some(&self.roots),
            Some(parent) => self.cogs.resolve(parent).map(|cog| &cog.links.children),
        }
    }

    /// Splice `id` out of whichever sibling list holds it
    fn unlink(&mut self, id: CogId) {
        let Some(links) = self.cogs.resolve(id).map(|c| c.links) else {
            return;
        };

        match links.prev_sibling.and_then(|p| self.cogs.resolve_mut(p)) {
            Some(prev) => prev.links.next_sibling = links.next_sibling,
            None => {
                if let Some(list) = self.list_mut(links.parent) {
                    list.first = links.next_sibling;
                }
            }
        }
        match links.next_sibling.and_then(|n| self.cogs.resolve_mut(n)) {
            Some(next) => next.links.prev_sibling = links.prev_sibling,
            None => {
                if let Some(list) = self.list_mut(links.parent) {
                    list.last = links.prev_sibling;
                }
            }
        }
        if let Some(list) = self.list_mut(links.parent) {
            list.count = list.count.saturating_sub(1);
        }
        if let Some(cog) = self.cogs.resolve_mut(id) {
            cog.links.parent = None;
            cog.links.prev_sibling = None;
            cog.links.next_sibling = None;
        }
    }

    /// Splice `id` into `owner`'s list before the sibling at `index`
    /// (appended when `index` is `None` or past the end)
    fn link(&mut self, id: CogId, owner: Option<CogId>, index: Option<usize>) {
        let before = index.and_then(|i| {
            let first = self.list(owner)?.first;
            let mut cursor = first;
            for _ in 0..i {
                cursor = cursor
                    .and_then(|c| self.cogs.resolve(c))
                    .and_then(|c| c.links.next_sibling);
            }
            cursor
        });

        let prev = match before {
            Some(before) => self.cogs.resolve(before).and_then(|c| c.links.prev_sibling),
            None => self.list(owner).and_then(|l| l.last),
        };

        if let Some(cog) = self.cogs.resolve_mut(id) {
            cog.links.parent = owner;
            cog.links.prev_sibling = prev;
            cog.links.next_sibling = before;
        }
        match prev.and_then(|p| self.cogs.resolve_mut(p)) {
            Some(prev) => prev.links.next_sibling = Some(id),
            None => {
                if let Some(list) = self.list_mut(owner) {
                    list.first = Some(id);
                }
            }
        }
        match before.and_then(|b| self.cogs.resolve_mut(b)) {
            Some(before) => before.links.prev_sibling = Some(id),
            None => {
                if let Some(list) = self.list_mut(owner) {
                    list.last = Some(id);
                }
            }
        }
        if let Some(list) = self.list_mut(owner) {
            list.count += 1;
        }
    }

    fn check_hierarchy_edit(&self, id: CogId, operation: &'static str) -> Result<()> {
        let cog = self.get(id)?;
        if !cog.state().allows_hierarchy_edits() {
            return Err(CogError::InvalidState {
                cog: id,
                state: cog.state(),
                operation,
            });
        }
        Ok(())
    }

    pub fn parent(&self, id: CogId) -> Option<CogId> {
        self.cog(id)?.parent()
    }

    /// Position within the parent's child list (or the root list)
    pub fn index_in_parent(&self, id: CogId) -> Option<usize> {
        let parent = self.cog(id)?.parent();
        match parent {
            Some(parent) => hierarchy::children(self, parent).position(|c| c == id),
            None => hierarchy::roots(self).position(|c| c == id),
        }
    }

    pub fn child_count(&self, id: CogId) -> usize {
        self.cog(id).map_or(0, Cog::child_count)
    }

    pub fn attach_to(&mut self, child: CogId, parent: CogId) -> Result<()> {
        self.attach_to_at(child, parent, None)
    }

    /// Make `child` the `index`-th child of `parent` (last when `None`)
    pub fn attach_to_at(&mut self, child: CogId, parent: CogId, index: Option<usize>) -> Result<()> {
        if child == parent {
            return Err(CogError::HierarchyError(format!(
                "Cannot attach cog {child} to itself"
            )));
        }
        self.check_hierarchy_edit(child, "attach")?;
        self.check_hierarchy_edit(parent, "attach to")?;
        if hierarchy::ancestors(self, parent).any(|a| a == child) {
            return Err(CogError::HierarchyError(format!(
                "Attaching {child} under {parent} would create a cycle"
            )));
        }
        self.check_move(child, Some(parent))?;

        let old_parent = self.parent(child);
        self.unlink(child);
        self.link(child, Some(parent), index);
        tracing::trace!(cog = %child, parent = %parent, "cog attached");
        if let Some(old_parent) = old_parent.filter(|p| *p != parent) {
            self.notify(CogEvent::Detached {
                cog: child,
                parent: old_parent,
            });
        }
        self.notify(CogEvent::Attached { cog: child, parent });
        Ok(())
    }

    /// Move `child` to the end of the root list; returns the old parent
    pub fn detach(&mut self, child: CogId) -> Result<Option<CogId>> {
        self.check_hierarchy_edit(child, "detach")?;
        let Some(parent) = self.parent(child) else {
            return Ok(None);
        };
        self.check_move(child, None)?;
        self.unlink(child);
        self.link(child, None, None);
        tracing::trace!(cog = %child, parent = %parent, "cog detached");
        self.notify(CogEvent::Detached { cog: child, parent });
        Ok(Some(parent))
    }

    /// Place `child` under `parent` (or among the roots) at `index`
    pub fn reparent(
        &mut self,
        child: CogId,
        parent: Option<CogId>,
        index: Option<usize>,
    ) -> Result<()> {
        match parent {
            Some(parent) => self.attach_to_at(child, parent, index),
            None => {
                self.detach(child)?;
                self.unlink(child);
                self.link(child, None, index);
                Ok(())
            }
        }
    }

    // ---- destruction --------------------------------------------------

    /// Queue the cog and its subtree for removal at the next flush.
    /// Protected cogs are left alone and `false` is returned.
    pub fn destroy(&mut self, id: CogId) -> bool {
        match self.cog(id) {
            Some(cog) if cog.has_flag(CogFlags::PROTECTED) => {
                tracing::debug!(cog = %id, "destroy ignored on protected cog");
                false
            }
            Some(_) => self.mark_for_destruction(id),
            None => false,
        }
    }

    /// Destroy even when the cog is protected
    pub fn force_destroy(&mut self, id: CogId) -> bool {
        self.mark_for_destruction(id)
    }

    fn mark_for_destruction(&mut self, id: CogId) -> bool {
        if self.cog(id).map_or(true, Cog::is_marked_for_destruction) {
            return false;
        }
        let subtree: Vec<CogId> = hierarchy::sub_tree(self, id).collect();
        for member in subtree {
            // Uninitialized cogs finish initializing before they are marked
            if self.cog(member).map(Cog::state) == Some(CogState::Uninitialized) {
                if let Err(err) = self.initialize_cog(member) {
                    tracing::warn!(cog = %member, %err, "initialize before destroy failed");
                }
            }
            if let Some(cog) = self.cogs.resolve_mut(member) {
                if !cog.is_marked_for_destruction() {
                    cog.set_state(CogState::MarkedForDestruction);
                }
            }
        }
        self.pending_destroy.push(id);
        self.notify(CogEvent::DestroyRequested(id));
        true
    }

    pub fn pending_destruction(&self) -> usize {
        self.pending_destroy.len()
    }

    /// Remove every cog queued for destruction; returns how many were removed.
    ///
    /// Children go before their parents; each cog's components see
    /// `on_destroy` in reverse list order.
    pub fn flush_destroyed(&mut self) -> usize {
        #[cfg(feature = "profiling")]
        let span = info_span!("space.flush_destroyed", pending = self.pending_destroy.len());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let pending = std::mem::take(&mut self.pending_destroy);
        let removed: usize = pending
            .into_iter()
            .map(|root| self.destroy_immediately(root))
            .sum();
        if removed > 0 {
            tracing::debug!(removed, "flushed destroyed cogs");
        }
        removed
    }

    /// Tear down `root`'s subtree right away, skipping the pending queue
    pub(crate) fn destroy_immediately(&mut self, root: CogId) -> usize {
        if !self.is_valid(root) {
            return 0;
        }
        let subtree: Vec<CogId> = hierarchy::sub_tree(self, root).collect();
        self.unlink(root);
        self.pending_destroy.retain(|p| !subtree.contains(p));

        let mut removed = 0;
        for id in subtree.into_iter().rev() {
            let Some(mut cog) = self.cogs.release(id) else {
                continue;
            };
            // Components of a cog that never initialized were never started
            let started = cog.state() != CogState::Uninitialized;
            cog.set_state(CogState::Destroyed);
            let components = cog.take_all_components();
            if started {
                for mut component in components.into_iter().rev() {
                    component.on_destroy(id);
                }
            }
            removed += 1;
            self.notify(CogEvent::Destroyed(id));
        }
        removed
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentInfo;
    use crate::impl_component;
    use crate::observer::RecordingObserver;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Transform;
    impl_component!(Transform);

    struct Model;
    impl_component!(Model);

    /// Logs hook calls into a shared journal
    struct Probe {
        tag: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }
    impl_component!(Probe, {
        fn on_initialize(&mut self, _owner: CogId) {
            self.journal.lock().push(format!("init {}", self.tag));
        }

        fn on_all_initialized(&mut self, _owner: CogId) {
            self.journal.lock().push(format!("all {}", self.tag));
        }

        fn on_destroy(&mut self, _owner: CogId) {
            self.journal.lock().push(format!("destroy {}", self.tag));
        }
    });

    struct ProbeB(Probe);
    impl_component!(ProbeB, {
        fn on_initialize(&mut self, owner: CogId) {
            self.0.on_initialize(owner);
        }

        fn on_all_initialized(&mut self, owner: CogId) {
            self.0.on_all_initialized(owner);
        }

        fn on_destroy(&mut self, owner: CogId) {
            self.0.on_destroy(owner);
        }
    });

    fn space() -> Space {
        let mut space = Space::new();
        space
            .registry_mut()
            .register::<Transform>()
            .register_info(ComponentInfo::of::<Model>().depends_on::<Transform>());
        space
    }

    #[test]
    fn test_create_initialize_order() {
        let mut space = Space::new();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let id = space
            .create_initialized(
                "probe",
                vec![
                    Box::new(Probe {
                        tag: "a",
                        journal: journal.clone(),
                    }),
                    Box::new(ProbeB(Probe {
                        tag: "b",
                        journal: journal.clone(),
                    })),
                ],
            )
            .unwrap();
        assert_eq!(space.get(id).unwrap().state(), CogState::Initialized);
        assert_eq!(*journal.lock(), ["init a", "init b", "all a", "all b"]);

        journal.lock().clear();
        space.destroy(id);
        assert_eq!(space.flush_destroyed(), 1);
        assert_eq!(*journal.lock(), ["destroy b", "destroy a"]);
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let mut space = Space::new();
        let id = space.create_cog("x");
        space.initialize_cog(id).unwrap();
        assert!(matches!(
            space.initialize_cog(id),
            Err(CogError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_dependency_gating() {
        let mut space = space();
        let id = space.create_cog("c");

        let err = space.add_component(id, Model).unwrap_err();
        assert!(matches!(err, CogError::Dependency(_)));
        assert_eq!(space.get(id).unwrap().component_count(), 0);

        space.add_component(id, Transform).unwrap();
        space.add_component(id, Model).unwrap();
        assert!(space.remove_component::<Transform>(id).is_err());
        assert_eq!(space.get(id).unwrap().component_count(), 2);

        space.remove_component::<Model>(id).unwrap();
        space.remove_component::<Transform>(id).unwrap();
        assert_eq!(space.get(id).unwrap().component_count(), 0);
    }

    #[test]
    fn test_batch_add_with_internal_dependency() {
        let mut space = space();
        let id = space.create_cog("c");
        space
            .add_components(id, vec![Box::new(Model), Box::new(Transform)])
            .unwrap();
        assert!(space.has::<Model>(id).is_some());
        assert!(space.has::<Transform>(id).is_some());
    }

    #[test]
    fn test_move_component_before() {
        let mut space = space();
        let id = space.create_cog("c");
        space.add_component(id, Transform).unwrap();
        space.add_component(id, Model).unwrap();

        space
            .move_component_before(id, TypeId::of::<Model>(), Some(TypeId::of::<Transform>()))
            .unwrap();
        assert_eq!(
            space.get(id).unwrap().component_types(),
            vec![TypeId::of::<Model>(), TypeId::of::<Transform>()]
        );

        space
            .move_component_before(id, TypeId::of::<Model>(), None)
            .unwrap();
        assert_eq!(space.component_index(id, TypeId::of::<Model>()), Some(1));
    }

    #[test]
    fn test_attach_detach_relinks_roots() {
        let mut space = Space::new();
        let a = space.create_cog("a");
        let b = space.create_cog("b");
        let c = space.create_cog("c");
        assert_eq!(space.root_count(), 3);

        space.attach_to(b, a).unwrap();
        assert_eq!(space.root_count(), 2);
        assert_eq!(space.parent(b), Some(a));
        assert_eq!(space.child_count(a), 1);

        assert_eq!(space.detach(b).unwrap(), Some(a));
        assert_eq!(space.parent(b), None);
        assert_eq!(space.child_count(a), 0);
        assert_eq!(
            hierarchy::roots(&space).collect::<Vec<_>>(),
            vec![a, c, b]
        );
        assert_eq!(space.detach(b).unwrap(), None);
    }

    #[test]
    fn test_attach_at_index_and_cycle() {
        let mut space = Space::new();
        let root = space.create_cog("root");
        let x = space.create_cog("x");
        let y = space.create_cog("y");
        space.attach_to(x, root).unwrap();
        space.attach_to_at(y, root, Some(0)).unwrap();
        assert_eq!(
            hierarchy::children(&space, root).collect::<Vec<_>>(),
            vec![y, x]
        );
        assert_eq!(space.index_in_parent(x), Some(1));

        assert!(matches!(
            space.attach_to(root, x),
            Err(CogError::HierarchyError(_))
        ));
        assert!(space.attach_to(x, x).is_err());
    }

    #[test]
    fn test_protected_destroy() {
        let mut space = Space::new();
        let id = space.create_cog("keep");
        space.set_flag(id, CogFlags::PROTECTED, true).unwrap();

        assert!(!space.destroy(id));
        assert_eq!(space.flush_destroyed(), 0);
        assert!(space.is_valid(id));

        assert!(space.force_destroy(id));
        assert_eq!(space.flush_destroyed(), 1);
        assert!(!space.is_valid(id));
    }

    #[test]
    fn test_two_phase_destroy() {
        let mut space = Space::new();
        let parent = space.create_cog("parent");
        let child = space.create_cog("child");
        let other = space.create_cog("other");
        space.attach_to(child, parent).unwrap();

        assert!(space.destroy(parent));
        assert!(!space.destroy(parent), "already queued");

        // Still readable, but frozen for hierarchy edits
        assert_eq!(
            space.get(child).unwrap().state(),
            CogState::MarkedForDestruction
        );
        assert_eq!(space.parent(child), Some(parent));
        assert!(space.detach(child).is_err());
        assert!(space.attach_to(other, parent).is_err());

        assert_eq!(space.flush_destroyed(), 2);
        assert!(!space.is_valid(parent));
        assert!(!space.is_valid(child));
        assert_eq!(space.root_count(), 1);
    }

    #[test]
    fn test_events_fire() {
        let mut space = space();
        let recorder = RecordingObserver::new();
        space.register_observer(Box::new(recorder.clone()));

        let a = space.create_cog("a");
        let b = space.create_cog("b");
        space.add_component(a, Transform).unwrap();
        space.attach_to(b, a).unwrap();
        space.detach(b).unwrap();

        let events = recorder.events();
        assert_eq!(
            events,
            vec![
                CogEvent::Created(a),
                CogEvent::Created(b),
                CogEvent::ComponentAdded(a, TypeId::of::<Transform>()),
                CogEvent::Attached { cog: b, parent: a },
                CogEvent::Detached { cog: b, parent: a },
            ]
        );
    }

    #[test]
    fn test_find_by_name() {
        let mut space = Space::new();
        let a = space.create_cog("a");
        let b = space.create_cog("target");
        let c = space.create_cog("target");
        space.attach_to(b, a).unwrap();
        assert_eq!(space.find_by_name("target"), Some(b));
        assert_eq!(space.find_all_by_name("target"), vec![b, c]);
        assert_eq!(space.find_by_name("missing"), None);
    }
}
