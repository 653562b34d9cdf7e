#![allow(dead_code)]

use cog_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Interface marker for colliders
pub struct Collider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
}

impl Transform {
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl_component!(Transform, {
    fn property(&self, path: &str) -> Option<PropertyValue> {
        match path {
            "x" => Some(PropertyValue::Float(self.x)),
            "y" => Some(PropertyValue::Float(self.y)),
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

/// Mesh reference; setting `mesh` also refreshes the cached display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub mesh: String,
    pub display: String,
}

impl Model {
    pub fn new(mesh: &str) -> Self {
        Self {
            mesh: mesh.to_string(),
            display: format!("[{mesh}]"),
        }
    }
}

impl_component!(Model, {
    fn property(&self, path: &str) -> Option<PropertyValue> {
        match path {
            "mesh" => Some(PropertyValue::from(self.mesh.as_str())),
            "display" => Some(PropertyValue::from(self.display.as_str())),
            _ => None,
        }
    }

    fn set_property(
        &mut self,
        path: &str,
        value: PropertyValue,
        ctx: &mut MutationContext,
    ) -> cog_core::Result<()> {
        match path {
            "mesh" => {
                self.mesh = value.expect_string(path)?;
                let display = format!("[{}]", self.mesh);
                ctx.record_side_effect("display", self.display.as_str(), display.as_str());
                self.display = display;
            }
            "display" => self.display = value.expect_string(path)?,
            _ => return Err(CogError::PropertyNotFound(path.to_string())),
        }
        Ok(())
    }
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxCollider {
    pub half_extent: f64,
}
impl_component!(BoxCollider);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereCollider {
    pub radius: f64,
}
impl_component!(SphereCollider);

/// Needs a `PhysicsSpace` somewhere up the tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigidBody;
impl_component!(RigidBody);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSpace;
impl_component!(PhysicsSpace);

/// Space with every fixture registered:
/// Model needs Transform, colliders provide `Collider` and exclude each
/// other, RigidBody needs a Collider and a PhysicsSpace ancestor.
pub fn fixture_space() -> Space {
    let mut space = Space::new();
    space
        .registry_mut()
        .register_serializable::<Transform>(|info| info)
        .register_serializable::<Model>(|info| info.depends_on::<Transform>())
        .register_serializable::<BoxCollider>(|info| {
            info.provides::<Collider>()
                .exclusive_with::<SphereCollider>()
                .depends_on::<Transform>()
        })
        .register_serializable::<SphereCollider>(|info| {
            info.provides::<Collider>().depends_on::<Transform>()
        })
        .register_serializable::<RigidBody>(|info| {
            info.depends_on::<Collider>()
                .requires_ancestor::<PhysicsSpace>()
        })
        .register_serializable::<PhysicsSpace>(|info| info);
    space
}
