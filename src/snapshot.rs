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

//! Subtree snapshots
//!
//! Components are stored through the serde hooks of their registration, so
//! only types registered with `register_serializable` can be captured.

use std::any::TypeId;

use serde::{Deserialize, Serialize};

use crate::cog::{CogFlags, CogId};
use crate::component::Component;
use crate::error::{CogError, Result};
use crate::hierarchy;
use crate::space::Space;

/// Serialized state of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Full Rust type name, the registry's lookup key
    pub type_name: String,
    pub data: serde_json::Value,
}

/// Serialized state of a cog and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CogSnapshot {
    pub name: String,
    #[serde(default)]
    pub flags: CogFlags,
    #[serde(default)]
    pub archetype: Option<String>,
    #[serde(default)]
    pub child_guid: Option<u64>,
    #[serde(default)]
    pub components: Vec<ComponentSnapshot>,
    #[serde(default)]
    pub children: Vec<CogSnapshot>,
}

impl CogSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CogError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CogError::DeserializationError(e.to_string()))
    }

    /// Cogs in this subtree, root included
    pub fn cog_count(&self) -> usize {
        1 + self.children.iter().map(CogSnapshot::cog_count).sum::<usize>()
    }
}

impl Space {
    fn component_snapshot(&self, component: &dyn Component) -> Result<ComponentSnapshot> {
        let type_id = component.as_any().type_id();
        let info = self
            .registry()
            .get(type_id)
            .ok_or_else(|| CogError::UnregisteredComponent(component.component_name().to_string()))?;
        Ok(ComponentSnapshot {
            type_name: info.type_name.to_string(),
            data: self.registry().to_json(component)?,
        })
    }

    /// Capture one component of exact type `type_id`
    pub fn snapshot_component(&self, id: CogId, type_id: TypeId) -> Result<ComponentSnapshot> {
        let cog = self.get(id)?;
        let component = cog
            .components()
            .find(|c| c.as_any().type_id() == type_id)
            .ok_or(CogError::ComponentNotFound("<snapshot target>"))?;
        self.component_snapshot(component)
    }

    /// Capture `id` and all of its descendants
    pub fn snapshot(&self, id: CogId) -> Result<CogSnapshot> {
        let cog = self.get(id)?;
        let components = cog
            .components()
            .map(|c| self.component_snapshot(c))
            .collect::<Result<Vec<_>>>()?;
        let children = hierarchy::children(self, id)
            .map(|child| self.snapshot(child))
            .collect::<Result<Vec<_>>>()?;

        Ok(CogSnapshot {
            name: cog.name().to_string(),
            flags: cog.flags(),
            archetype: cog.archetype().map(str::to_string),
            child_guid: cog.child_guid(),
            components,
            children,
        })
    }

    /// Recreate a snapshotted subtree under `parent` (a root when `None`) at
    /// `index`. Every cog comes back initialized; the new ids are returned in
    /// pre-order. Nothing is left behind on failure.
    pub fn restore(
        &mut self,
        snapshot: &CogSnapshot,
        parent: Option<CogId>,
        index: Option<usize>,
    ) -> Result<Vec<CogId>> {
        let mut created = Vec::with_capacity(snapshot.cog_count());
        match self.restore_into(snapshot, parent, index, &mut created) {
            Ok(()) => Ok(created),
            Err(err) => {
                if let Some(root) = created.first() {
                    self.destroy_immediately(*root);
                }
                Err(err)
            }
        }
    }

    fn restore_into(
        &mut self,
        snapshot: &CogSnapshot,
        parent: Option<CogId>,
        index: Option<usize>,
        created: &mut Vec<CogId>,
    ) -> Result<()> {
        let id = self.create_cog(snapshot.name.clone());
        created.push(id);
        if let Some(cog) = self.cog_mut(id) {
            cog.flags = snapshot.flags;
            cog.set_archetype(snapshot.archetype.clone());
            cog.set_child_guid(snapshot.child_guid);
        }
        if parent.is_some() || index.is_some() {
            self.reparent(id, parent, index)?;
        }

        let components = snapshot
            .components
            .iter()
            .map(|c| self.registry().from_json(&c.type_name, c.data.clone()))
            .collect::<Result<Vec<_>>>()?;
        self.add_components(id, components)?;
        self.initialize_cog(id)?;

        for child in &snapshot.children {
            self.restore_into(child, Some(id), None, created)?;
        }
        Ok(())
    }
}
