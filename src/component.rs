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

//! Component trait and the runtime component registry
//!
//! Components are typed units of behavior/data owned by exactly one cog.
//! Dependency, exclusivity and interface declarations live in the
//! [`ComponentRegistry`] keyed by `TypeId`, not on the trait.

use std::any::{Any, TypeId};

use ahash::AHashMap;
use serde::{de::DeserializeOwned, Serialize};
use smallvec::SmallVec;

use crate::cog::CogId;
use crate::error::{CogError, Result};
use crate::property::{MutationContext, PropertyValue};

/// A unit of behavior/data attached to a cog
pub trait Component: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Full type name (used for registry lookups by name)
    fn component_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Called in list order when the owning cog initializes, or immediately
    /// when added to an already initialized cog
    fn on_initialize(&mut self, _owner: CogId) {}

    /// Second pass, after every component on the cog has initialized
    fn on_all_initialized(&mut self, _owner: CogId) {}

    /// Called in reverse list order when the owner is torn down, and when
    /// the component is removed
    fn on_destroy(&mut self, _owner: CogId) {}

    fn property(&self, _path: &str) -> Option<PropertyValue> {
        None
    }

    fn set_property(
        &mut self,
        path: &str,
        _value: PropertyValue,
        _ctx: &mut MutationContext,
    ) -> Result<()> {
        Err(CogError::PropertyNotFound(path.to_string()))
    }
}

impl dyn Component {
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Implement the `Any` plumbing of [`Component`] for a type.
///
/// The block form forwards extra trait items (hooks, properties).
#[macro_export]
macro_rules! impl_component {
    ($t:ty) => {
        $crate::impl_component!($t, {});
    };

    ($t:ty, { $($body:tt)* }) => {
        impl $crate::component::Component for $t {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }

            $($body)*
        }
    };
}

/// Last path segment of a type name, generics kept
pub fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Stable identity of a type plus a readable name for diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }
}

type ToJsonFn = fn(&dyn Component) -> Result<serde_json::Value>;
type FromJsonFn = fn(serde_json::Value) -> Result<Box<dyn Component>>;

#[derive(Clone, Copy)]
struct SerdeHooks {
    to_json: ToJsonFn,
    from_json: FromJsonFn,
}

/// Declarations for one component type
#[derive(Clone)]
pub struct ComponentInfo {
    pub key: TypeKey,
    pub type_name: &'static str,
    pub dependencies: SmallVec<[TypeKey; 4]>,
    pub exclusive_with: SmallVec<[TypeKey; 2]>,
    pub provides: SmallVec<[TypeKey; 2]>,
    pub required_ancestors: SmallVec<[TypeKey; 1]>,
    serde: Option<SerdeHooks>,
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("name", &self.key.name)
            .field("dependencies", &self.dependencies)
            .field("exclusive_with", &self.exclusive_with)
            .field("provides", &self.provides)
            .field("serializable", &self.serde.is_some())
            .finish()
    }
}

impl ComponentInfo {
    pub fn of<T: Component>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            type_name: std::any::type_name::<T>(),
            dependencies: SmallVec::new(),
            exclusive_with: SmallVec::new(),
            provides: SmallVec::new(),
            required_ancestors: SmallVec::new(),
            serde: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.key.name
    }

    /// `D` (a component type or an interface marker) must be present first
    pub fn depends_on<D: ?Sized + 'static>(mut self) -> Self {
        self.dependencies.push(TypeKey::of::<D>());
        self
    }

    /// No component indexed under `X` may be present at the same time
    pub fn exclusive_with<X: ?Sized + 'static>(mut self) -> Self {
        self.exclusive_with.push(TypeKey::of::<X>());
        self
    }

    /// Also index this component under interface marker `I`
    pub fn provides<I: ?Sized + 'static>(mut self) -> Self {
        self.provides.push(TypeKey::of::<I>());
        self
    }

    /// Some ancestor cog must carry a component indexed under `A`
    pub fn requires_ancestor<A: ?Sized + 'static>(mut self) -> Self {
        self.required_ancestors.push(TypeKey::of::<A>());
        self
    }

    pub fn is_serializable(&self) -> bool {
        self.serde.is_some()
    }
}

fn to_json_impl<T: Component + Serialize>(component: &dyn Component) -> Result<serde_json::Value> {
    let typed = component.downcast_ref::<T>().ok_or_else(|| {
        CogError::SerializationError(format!(
            "expected {}, found {}",
            std::any::type_name::<T>(),
            component.component_name()
        ))
    })?;
    serde_json::to_value(typed).map_err(|e| CogError::SerializationError(e.to_string()))
}

fn from_json_impl<T: Component + DeserializeOwned>(
    value: serde_json::Value,
) -> Result<Box<dyn Component>> {
    let typed: T =
        serde_json::from_value(value).map_err(|e| CogError::DeserializationError(e.to_string()))?;
    Ok(Box::new(typed))
}

/// Runtime type-identity registry: `TypeId -> ComponentInfo`
#[derive(Default, Debug)]
pub struct ComponentRegistry {
    infos: AHashMap<TypeId, ComponentInfo>,
    by_name: AHashMap<&'static str, TypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type with no declarations
    pub fn register<T: Component>(&mut self) -> &mut Self {
        self.register_info(ComponentInfo::of::<T>())
    }

    /// Register a component type with explicit declarations
    pub fn register_info(&mut self, info: ComponentInfo) -> &mut Self {
        tracing::debug!(component = info.name(), "registered component type");
        self.by_name.insert(info.type_name, info.key.id);
        self.infos.insert(info.key.id, info);
        self
    }

    /// Register with serde hooks; `configure` adds declarations
    pub fn register_serializable<T>(
        &mut self,
        configure: impl FnOnce(ComponentInfo) -> ComponentInfo,
    ) -> &mut Self
    where
        T: Component + Serialize + DeserializeOwned,
    {
        let mut info = configure(ComponentInfo::of::<T>());
        info.serde = Some(SerdeHooks {
            to_json: to_json_impl::<T>,
            from_json: from_json_impl::<T>,
        });
        self.register_info(info)
    }

    pub fn get(&self, type_id: TypeId) -> Option<&ComponentInfo> {
        self.infos.get(&type_id)
    }

    pub fn by_name(&self, type_name: &str) -> Option<&ComponentInfo> {
        self.by_name
            .get(type_name)
            .and_then(|type_id| self.infos.get(type_id))
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.infos.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Readable name for a type id, falling back to the component's own name
    pub fn name_of(&self, type_id: TypeId, component: &dyn Component) -> &'static str {
        self.get(type_id)
            .map(ComponentInfo::name)
            .unwrap_or_else(|| short_type_name(component.component_name()))
    }

    /// Interface ids a component type is indexed under (exact type first)
    pub fn index_keys(&self, type_id: TypeId) -> SmallVec<[TypeId; 3]> {
        let mut keys = SmallVec::new();
        keys.push(type_id);
        if let Some(info) = self.get(type_id) {
            keys.extend(info.provides.iter().map(|k| k.id));
        }
        keys
    }

    pub fn to_json(&self, component: &dyn Component) -> Result<serde_json::Value> {
        let type_id = component.as_any().type_id();
        let hooks = self
            .get(type_id)
            .and_then(|info| info.serde)
            .ok_or_else(|| CogError::UnregisteredComponent(component.component_name().to_string()))?;
        (hooks.to_json)(component)
    }

    pub fn from_json(&self, type_name: &str, value: serde_json::Value) -> Result<Box<dyn Component>> {
        let hooks = self
            .by_name(type_name)
            .and_then(|info| info.serde)
            .ok_or_else(|| CogError::UnregisteredComponent(type_name.to_string()))?;
        (hooks.from_json)(value)
    }
}
