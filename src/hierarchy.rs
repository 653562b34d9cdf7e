//! Hierarchy traversal over a [`Space`].
//!
//! Ranges walk parent/child/sibling links with constant auxiliary state
//! (the current node and the subtree root), so arbitrarily deep trees need
//! no stack. Ranges are `Clone`; cloning before iterating restarts a walk.

use crate::cog::CogId;
use crate::space::Space;

/// Next node in pre-order: first child, else next sibling, else the next
/// sibling of the nearest ancestor that has one. Never leaves `root`'s
/// subtree; `None` for `root` walks the whole space (roots are siblings).
pub fn next_in_hierarchy_order(space: &Space, node: CogId, root: Option<CogId>) -> Option<CogId> {
    let cog = space.cog(node)?;
    if let Some(child) = cog.first_child() {
        return Some(child);
    }

    let mut current = node;
    loop {
        if Some(current) == root {
            return None;
        }
        let cog = space.cog(current)?;
        if let Some(next) = cog.next_sibling() {
            return Some(next);
        }
        current = cog.parent()?;
    }
}

/// Inverse of [`next_in_hierarchy_order`]
pub fn previous_in_hierarchy_order(
    space: &Space,
    node: CogId,
    root: Option<CogId>,
) -> Option<CogId> {
    if Some(node) == root {
        return None;
    }
    let cog = space.cog(node)?;
    match cog.prev_sibling() {
        Some(prev) => Some(last_descendant(space, prev)),
        None => cog.parent(),
    }
}

/// Deepest last child under `node` (or `node` itself when childless)
pub fn last_descendant(space: &Space, node: CogId) -> CogId {
    let mut current = node;
    while let Some(last) = space.cog(current).and_then(|c| c.links().children.last) {
        current = last;
    }
    current
}

/// Topmost ancestor of `node` (itself when it is a root)
pub fn root_of(space: &Space, node: CogId) -> CogId {
    let mut current = node;
    while let Some(parent) = space.cog(current).and_then(|c| c.parent()) {
        current = parent;
    }
    current
}

/// Lazy pre-order walk
#[derive(Clone)]
pub struct HierarchyRange<'a> {
    space: &'a Space,
    current: Option<CogId>,
    root: Option<CogId>,
}

impl<'a> HierarchyRange<'a> {
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn front(&self) -> Option<CogId> {
        self.current
    }

    pub fn pop_front(&mut self) {
        if let Some(current) = self.current {
            self.current = next_in_hierarchy_order(self.space, current, self.root);
        }
    }

    /// Only cogs whose name matches exactly; order is unchanged
    pub fn named(self, name: impl Into<String>) -> NamedRange<'a> {
        NamedRange {
            inner: self,
            name: name.into(),
        }
    }
}

impl Iterator for HierarchyRange<'_> {
    type Item = CogId;

    fn next(&mut self) -> Option<CogId> {
        let current = self.current?;
        self.pop_front();
        Some(current)
    }
}

/// `node` and its descendants, pre-order
pub fn sub_tree(space: &Space, node: CogId) -> HierarchyRange<'_> {
    HierarchyRange {
        space,
        current: space.is_valid(node).then_some(node),
        root: Some(node),
    }
}

/// Whole tree that `node` belongs to: the subtree of its topmost ancestor
pub fn entire_tree(space: &Space, node: CogId) -> HierarchyRange<'_> {
    if !space.is_valid(node) {
        return HierarchyRange {
            space,
            current: None,
            root: None,
        };
    }
    sub_tree(space, root_of(space, node))
}

/// Every cog in the space: each root's subtree in root-list order
pub fn space_tree(space: &Space) -> HierarchyRange<'_> {
    HierarchyRange {
        space,
        current: space.first_root(),
        root: None,
    }
}

/// Name-filtered view over a [`HierarchyRange`]
#[derive(Clone)]
pub struct NamedRange<'a> {
    inner: HierarchyRange<'a>,
    name: String,
}

impl Iterator for NamedRange<'_> {
    type Item = CogId;

    fn next(&mut self) -> Option<CogId> {
        while let Some(id) = self.inner.next() {
            if self
                .inner
                .space
                .cog(id)
                .is_some_and(|cog| cog.name() == self.name)
            {
                return Some(id);
            }
        }
        None
    }
}

/// Parent chain of a node, nearest first (the node itself excluded)
#[derive(Clone)]
pub struct AncestorRange<'a> {
    space: &'a Space,
    current: Option<CogId>,
}

impl Iterator for AncestorRange<'_> {
    type Item = CogId;

    fn next(&mut self) -> Option<CogId> {
        let current = self.current?;
        self.current = self.space.cog(current).and_then(|c| c.parent());
        Some(current)
    }
}

pub fn ancestors(space: &Space, node: CogId) -> AncestorRange<'_> {
    AncestorRange {
        space,
        current: space.cog(node).and_then(|c| c.parent()),
    }
}

/// Direct children (or roots) in list order
#[derive(Clone)]
pub struct SiblingRange<'a> {
    space: &'a Space,
    current: Option<CogId>,
}

impl Iterator for SiblingRange<'_> {
    type Item = CogId;

    fn next(&mut self) -> Option<CogId> {
        let current = self.current?;
        self.current = self.space.cog(current).and_then(|c| c.next_sibling());
        Some(current)
    }
}

pub fn children(space: &Space, node: CogId) -> SiblingRange<'_> {
    SiblingRange {
        space,
        current: space.cog(node).and_then(|c| c.first_child()),
    }
}

pub fn roots(space: &Space) -> SiblingRange<'_> {
    SiblingRange {
        space,
        current: space.first_root(),
    }
}
