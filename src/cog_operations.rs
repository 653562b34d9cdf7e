//! Reversible cog edits
//!
//! Each `OperationQueue` method here applies the edit to the space first and
//! records it only when that succeeds. Targets are stored as
//! [`UndoObjectId`]s, so an edit still finds its cog after the cog has been
//! destroyed and recreated by another undo.

use std::any::TypeId;

use crate::cog::{CogFlags, CogId};
use crate::component::Component;
use crate::error::{CogError, Result};
use crate::hierarchy;
use crate::operation::{Operation, OperationContext, OperationId, OperationQueue};
use crate::property::{MutationContext, PropertyValue, SideEffect};
use crate::snapshot::CogSnapshot;
use crate::space::Space;
use crate::undo_map::{UndoMap, UndoObjectId};

/// Property change plus whatever the setter changed along with it
pub struct SetPropertyOp {
    name: String,
    target: UndoObjectId,
    component: TypeId,
    path: String,
    old: PropertyValue,
    new: PropertyValue,
    side_effects: Vec<SideEffect>,
}

impl SetPropertyOp {
    pub fn side_effects(&self) -> &[SideEffect] {
        &self.side_effects
    }
}

impl Operation for SetPropertyOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        let mut discard = MutationContext::discarding();
        ctx.space
            .set_property(cog, self.component, &self.path, self.old.clone(), &mut discard)?;
        for effect in self.side_effects.iter().rev() {
            ctx.space
                .set_property(cog, self.component, &effect.path, effect.old.clone(), &mut discard)?;
        }
        Ok(())
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        let mut discard = MutationContext::discarding();
        ctx.space
            .set_property(cog, self.component, &self.path, self.new.clone(), &mut discard)?;
        for effect in &self.side_effects {
            ctx.space
                .set_property(cog, self.component, &effect.path, effect.new.clone(), &mut discard)?;
        }
        Ok(())
    }
}

/// Holds the component while it is not on the cog
pub struct AddComponentOp {
    name: String,
    target: UndoObjectId,
    component: TypeId,
    index: usize,
    stash: Option<Box<dyn Component>>,
}

impl Operation for AddComponentOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        let (component, index) = ctx.space.take_component(cog, self.component)?;
        self.index = index;
        self.stash = Some(component);
        Ok(())
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        let component = self
            .stash
            .take()
            .ok_or_else(|| CogError::OperationInvalid("component already re-added".into()))?;
        ctx.space.add_component_at(cog, component, Some(self.index))?;
        Ok(())
    }
}

pub struct RemoveComponentOp {
    name: String,
    target: UndoObjectId,
    component: TypeId,
    index: usize,
    stash: Option<Box<dyn Component>>,
}

impl Operation for RemoveComponentOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        let component = self
            .stash
            .take()
            .ok_or_else(|| CogError::OperationInvalid("component already restored".into()))?;
        ctx.space.add_component_at(cog, component, Some(self.index))?;
        Ok(())
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        let (component, index) = ctx.space.take_component(cog, self.component)?;
        self.index = index;
        self.stash = Some(component);
        Ok(())
    }
}

pub struct MoveComponentOp {
    name: String,
    target: UndoObjectId,
    component: TypeId,
    from: usize,
    to: usize,
}

impl Operation for MoveComponentOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        ctx.space.move_component_to(cog, self.component, self.from)
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        ctx.space.move_component_to(cog, self.component, self.to)
    }
}

/// Where a cog sits in the hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Placement {
    parent: Option<UndoObjectId>,
    index: usize,
}

impl Placement {
    fn capture(space: &Space, undo_map: &mut UndoMap, cog: CogId) -> Result<Self> {
        Ok(Self {
            parent: space.parent(cog).map(|p| undo_map.get_or_create(p)),
            index: space
                .index_in_parent(cog)
                .ok_or(CogError::CogNotFound(cog))?,
        })
    }

    fn apply(&self, ctx: &mut OperationContext<'_>, cog: CogId) -> Result<()> {
        let parent = ctx.resolve_optional(self.parent)?;
        ctx.space.reparent(cog, parent, Some(self.index))
    }
}

/// Attach or detach
pub struct ReparentOp {
    name: String,
    target: UndoObjectId,
    before: Placement,
    after: Placement,
}

impl Operation for ReparentOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        self.before.apply(ctx, cog)
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        self.after.apply(ctx, cog)
    }
}

/// Subtree that exists in one direction and not the other
struct SubtreeRecord {
    placement: Placement,
    /// Undo ids of the subtree in pre-order; `None` for cogs nothing refers to
    undo_ids: Vec<Option<UndoObjectId>>,
    snapshot: Option<CogSnapshot>,
}

impl SubtreeRecord {
    fn capture(space: &Space, undo_map: &mut UndoMap, root: CogId) -> Result<Self> {
        let placement = Placement::capture(space, undo_map, root)?;
        let undo_ids = hierarchy::sub_tree(space, root)
            .map(|id| undo_map.undo_id_of(id))
            .collect();
        Ok(Self {
            placement,
            undo_ids,
            snapshot: Some(space.snapshot(root)?),
        })
    }

    /// Snapshot and remove the subtree
    fn take_down(&mut self, ctx: &mut OperationContext<'_>, root: CogId) -> Result<()> {
        self.placement = Placement::capture(ctx.space, ctx.undo_map, root)?;
        self.undo_ids = hierarchy::sub_tree(ctx.space, root)
            .map(|id| ctx.undo_map.undo_id_of(id))
            .collect();
        self.snapshot = Some(ctx.space.snapshot(root)?);
        ctx.space.destroy_immediately(root);
        Ok(())
    }

    /// Recreate the subtree and point its undo ids at the new handles
    fn bring_back(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| CogError::OperationInvalid("no snapshot to restore".into()))?;
        let parent = ctx.resolve_optional(self.placement.parent)?;
        let created = ctx
            .space
            .restore(snapshot, parent, Some(self.placement.index))?;
        for (undo_id, cog) in self.undo_ids.iter().zip(created) {
            if let Some(undo_id) = undo_id {
                ctx.undo_map.update(*undo_id, cog);
            }
        }
        Ok(())
    }
}

pub struct CreateCogOp {
    name: String,
    target: UndoObjectId,
    record: SubtreeRecord,
}

impl Operation for CreateCogOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        self.record.take_down(ctx, cog)
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        self.record.bring_back(ctx)
    }
}

pub struct DestroyCogOp {
    name: String,
    target: UndoObjectId,
    record: SubtreeRecord,
}

impl Operation for DestroyCogOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        self.record.bring_back(ctx)
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        self.record.take_down(ctx, cog)
    }
}

pub struct RenameOp {
    name: String,
    target: UndoObjectId,
    old: String,
    new: String,
}

impl Operation for RenameOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        ctx.space.rename(cog, self.old.clone())
    }

    fn redo(&mut self, ctx: &mut OperationContext<'_>) -> Result<()> {
        let cog = ctx.resolve(self.target)?;
        ctx.space.rename(cog, self.new.clone())
    }
}

fn component_name(space: &Space, cog: CogId, type_id: TypeId) -> &'static str {
    space
        .registry()
        .get(type_id)
        .map(|info| info.name())
        .or_else(|| {
            space
                .cog(cog)
                .and_then(|c| c.first_indexed(type_id))
                .map(|c| crate::component::short_type_name(c.component_name()))
        })
        .unwrap_or("component")
}

impl OperationQueue {
    /// Set a property and record it together with the side effects the
    /// setter reported
    pub fn set_property(
        &mut self,
        space: &mut Space,
        cog: CogId,
        component: TypeId,
        path: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<OperationId> {
        let value = value.into();
        let old = space
            .property(cog, component, path)
            .ok_or_else(|| CogError::PropertyNotFound(path.to_string()))?;
        let mut ctx = MutationContext::capturing();
        space.set_property(cog, component, path, value.clone(), &mut ctx)?;

        let name = format!("Set {}.{path}", component_name(space, cog, component));
        let target = self.undo_map.get_or_create(cog);
        Ok(self.queue(Box::new(SetPropertyOp {
            name,
            target,
            component,
            path: path.to_string(),
            old,
            new: value,
            side_effects: ctx.take_side_effects(),
        })))
    }

    pub fn add_component<T: Component>(
        &mut self,
        space: &mut Space,
        cog: CogId,
        component: T,
    ) -> Result<OperationId> {
        self.add_component_at(space, cog, Box::new(component), None)
    }

    pub fn add_component_at(
        &mut self,
        space: &mut Space,
        cog: CogId,
        component: Box<dyn Component>,
        index: Option<usize>,
    ) -> Result<OperationId> {
        let type_id = component.as_any().type_id();
        space.add_component_at(cog, component, index)?;
        let index = space
            .component_index(cog, type_id)
            .ok_or(CogError::ComponentNotFound("added component"))?;

        let name = format!("Add {}", component_name(space, cog, type_id));
        let target = self.undo_map.get_or_create(cog);
        Ok(self.queue(Box::new(AddComponentOp {
            name,
            target,
            component: type_id,
            index,
            stash: None,
        })))
    }

    pub fn remove_component(
        &mut self,
        space: &mut Space,
        cog: CogId,
        component: TypeId,
    ) -> Result<OperationId> {
        let name = format!("Remove {}", component_name(space, cog, component));
        let (removed, index) = space.take_component(cog, component)?;
        let target = self.undo_map.get_or_create(cog);
        Ok(self.queue(Box::new(RemoveComponentOp {
            name,
            target,
            component,
            index,
            stash: Some(removed),
        })))
    }

    /// Move `component` in front of `before` (to the end when `None`)
    pub fn move_component(
        &mut self,
        space: &mut Space,
        cog: CogId,
        component: TypeId,
        before: Option<TypeId>,
    ) -> Result<OperationId> {
        let from = space
            .component_index(cog, component)
            .ok_or(CogError::ComponentNotFound("moved component"))?;
        space.move_component_before(cog, component, before)?;
        let to = space
            .component_index(cog, component)
            .ok_or(CogError::ComponentNotFound("moved component"))?;

        let name = format!("Move {}", component_name(space, cog, component));
        let target = self.undo_map.get_or_create(cog);
        Ok(self.queue(Box::new(MoveComponentOp {
            name,
            target,
            component,
            from,
            to,
        })))
    }

    pub fn attach(
        &mut self,
        space: &mut Space,
        child: CogId,
        parent: CogId,
        index: Option<usize>,
    ) -> Result<OperationId> {
        let before = Placement::capture(space, &mut self.undo_map, child)?;
        space.attach_to_at(child, parent, index)?;
        self.record_reparent(space, child, before, "Attach")
    }

    /// Detach `child` to the end of the roots. Nothing is recorded (and
    /// `Ok(None)` returned) when it already is a root.
    pub fn detach(&mut self, space: &mut Space, child: CogId) -> Result<Option<OperationId>> {
        let before = Placement::capture(space, &mut self.undo_map, child)?;
        if space.detach(child)?.is_none() {
            return Ok(None);
        }
        self.record_reparent(space, child, before, "Detach").map(Some)
    }

    fn record_reparent(
        &mut self,
        space: &Space,
        child: CogId,
        before: Placement,
        verb: &str,
    ) -> Result<OperationId> {
        let after = Placement::capture(space, &mut self.undo_map, child)?;
        let name = match space.cog(child) {
            Some(cog) => format!("{verb} {}", cog.name()),
            None => verb.to_string(),
        };
        let target = self.undo_map.get_or_create(child);
        Ok(self.queue(Box::new(ReparentOp {
            name,
            target,
            before,
            after,
        })))
    }

    /// Create an initialized cog under `parent` (a root when `None`)
    pub fn create_cog(
        &mut self,
        space: &mut Space,
        name: impl Into<String>,
        parent: Option<CogId>,
    ) -> Result<(CogId, OperationId)> {
        let name = name.into();
        let cog = space.create_cog(name.clone());
        let placed = match parent {
            Some(parent) => space.attach_to(cog, parent),
            None => Ok(()),
        };
        if let Err(err) = placed.and_then(|_| space.initialize_cog(cog)) {
            space.destroy_immediately(cog);
            return Err(err);
        }

        let target = self.undo_map.get_or_create(cog);
        let record = SubtreeRecord {
            placement: Placement::capture(space, &mut self.undo_map, cog)?,
            undo_ids: vec![Some(target)],
            snapshot: None,
        };
        let op = self.queue(Box::new(CreateCogOp {
            name: format!("Create {name}"),
            target,
            record,
        }));
        Ok((cog, op))
    }

    /// Destroy `cog` and its subtree right away, keeping a snapshot for undo.
    /// Every component in the subtree must be serializable.
    pub fn destroy_cog(&mut self, space: &mut Space, cog: CogId) -> Result<OperationId> {
        let target_cog = space.get(cog)?;
        if target_cog.has_flag(CogFlags::PROTECTED) {
            return Err(CogError::OperationInvalid(format!(
                "cog {cog} is protected"
            )));
        }
        let name = format!("Destroy {}", target_cog.name());

        let target = self.undo_map.get_or_create(cog);
        let record = SubtreeRecord::capture(space, &mut self.undo_map, cog)?;
        space.destroy_immediately(cog);
        Ok(self.queue(Box::new(DestroyCogOp {
            name,
            target,
            record,
        })))
    }

    pub fn rename(
        &mut self,
        space: &mut Space,
        cog: CogId,
        name: impl Into<String>,
    ) -> Result<OperationId> {
        let new = name.into();
        let old = space.get(cog)?.name().to_string();
        space.rename(cog, new.clone())?;
        let target = self.undo_map.get_or_create(cog);
        Ok(self.queue(Box::new(RenameOp {
            name: format!("Rename {old} to {new}"),
            target,
            old,
            new,
        })))
    }
}
