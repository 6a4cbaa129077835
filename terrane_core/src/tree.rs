// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The immutable render tree produced by reduction.
//!
//! A [`RenderTree`] is a flat array of [`RenderTreeNode`]s in depth-first
//! mount order: every node's host precedes it, so mounting in index order
//! always finds an already-mounted host. Nodes reference their parent and
//! host by index ([`INVALID`] for the root), never by pointer; the tree owns
//! the nodes.
//!
//! Trees are produced once per layout pass, replaced wholesale on the next
//! commit, and never mutated in place. Construction validates that no two
//! nodes share a render unit id and fails fast otherwise.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use kurbo::{Insets, Rect};

use crate::constraints::SizeConstraints;
use crate::extension::ExtensionId;
use crate::unit::{LayoutData, RenderUnit, RenderUnitId};

/// Sentinel index meaning "no node" in parent/host fields.
pub const INVALID: u32 = u32::MAX;

/// Positions one [`RenderUnit`] in a specific render tree.
pub struct RenderTreeNode {
    unit: Rc<RenderUnit>,
    index: u32,
    parent: u32,
    host: u32,
    position_in_host: u32,
    bounds: Rect,
    absolute_bounds: Rect,
    padding: Insets,
    layout_data: Option<LayoutData>,
}

impl fmt::Debug for RenderTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTreeNode")
            .field("unit", &self.unit.id())
            .field("index", &self.index)
            .field("host", &self.host)
            .field("position_in_host", &self.position_in_host)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl RenderTreeNode {
    /// Creates a node. `bounds` are host-relative; `absolute_bounds` are in
    /// root coordinates.
    #[must_use]
    pub fn new(
        unit: Rc<RenderUnit>,
        index: u32,
        parent: u32,
        host: u32,
        position_in_host: u32,
        bounds: Rect,
        absolute_bounds: Rect,
        padding: Insets,
        layout_data: Option<LayoutData>,
    ) -> Self {
        Self {
            unit,
            index,
            parent,
            host,
            position_in_host,
            bounds,
            absolute_bounds,
            padding,
            layout_data,
        }
    }

    /// The render unit mounted at this node.
    #[must_use]
    pub fn unit(&self) -> &Rc<RenderUnit> {
        &self.unit
    }

    /// This node's position in the tree's traversal order.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Index of the parent node, or [`INVALID`] for the root.
    #[must_use]
    pub fn parent(&self) -> u32 {
        self.parent
    }

    /// Index of the host node this node mounts into, or [`INVALID`] for the
    /// root.
    #[must_use]
    pub fn host(&self) -> u32 {
        self.host
    }

    /// This node's child index within its host.
    #[must_use]
    pub fn position_in_host(&self) -> u32 {
        self.position_in_host
    }

    /// Host-relative bounds.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Bounds in root coordinates.
    #[must_use]
    pub fn absolute_bounds(&self) -> Rect {
        self.absolute_bounds
    }

    /// Padding to apply inside the bounds.
    #[must_use]
    pub fn padding(&self) -> Insets {
        self.padding
    }

    /// Opaque layout payload passed through to binders.
    #[must_use]
    pub fn layout_data(&self) -> Option<&LayoutData> {
        self.layout_data.as_ref()
    }
}

/// The reduced, immutable output of one layout pass.
pub struct RenderTree {
    nodes: Vec<Rc<RenderTreeNode>>,
    id_to_index: BTreeMap<RenderUnitId, u32>,
    generation: u64,
    constraints: SizeConstraints,
    extension_results: BTreeMap<ExtensionId, Rc<dyn Any>>,
}

impl fmt::Debug for RenderTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTree")
            .field("generation", &self.generation)
            .field("nodes", &self.nodes.len())
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

impl RenderTree {
    /// Creates a tree from nodes in depth-first mount order.
    ///
    /// # Panics
    ///
    /// Panics if `nodes` is empty or if two nodes share a render unit id.
    /// Duplicate ids are a structural invariant violation and are never
    /// logged-and-continued.
    #[must_use]
    pub fn new(
        nodes: Vec<Rc<RenderTreeNode>>,
        generation: u64,
        constraints: SizeConstraints,
        extension_results: BTreeMap<ExtensionId, Rc<dyn Any>>,
    ) -> Self {
        assert!(!nodes.is_empty(), "render tree must have a root node");

        let mut id_to_index = BTreeMap::new();
        for node in &nodes {
            let id = node.unit().id();
            if let Some(&existing) = id_to_index.get(&id) {
                panic!(
                    "duplicate render unit id {id:?}: nodes {existing} and {} \
                     (\"{}\") share it",
                    node.index(),
                    node.unit().description(),
                );
            }
            id_to_index.insert(id, node.index());
        }

        Self {
            nodes,
            id_to_index,
            generation,
            constraints,
            extension_results,
        }
    }

    /// Number of mountable outputs (nodes) in the tree.
    #[must_use]
    pub fn len(&self) -> u32 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "node count is bounded by u32 indices"
        )]
        {
            self.nodes.len() as u32
        }
    }

    /// Whether the tree has no nodes. Always false for a validly
    /// constructed tree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root node (index 0).
    #[must_use]
    pub fn root(&self) -> &Rc<RenderTreeNode> {
        &self.nodes[0]
    }

    /// The node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn node_at(&self, index: u32) -> &Rc<RenderTreeNode> {
        &self.nodes[index as usize]
    }

    /// All nodes in depth-first mount order.
    #[must_use]
    pub fn nodes(&self) -> &[Rc<RenderTreeNode>] {
        &self.nodes
    }

    /// Looks up a node by render unit id.
    #[must_use]
    pub fn node_for_id(&self, id: RenderUnitId) -> Option<&Rc<RenderTreeNode>> {
        self.id_to_index.get(&id).map(|&i| &self.nodes[i as usize])
    }

    /// Whether a unit id is present in this tree.
    #[must_use]
    pub fn contains(&self, id: RenderUnitId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// The tree generation assigned at reduction.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The size constraints this tree was laid out under.
    #[must_use]
    pub fn constraints(&self) -> SizeConstraints {
        self.constraints
    }

    /// Side output accumulated by the given extension's layout visitor
    /// during reduction, if any.
    #[must_use]
    pub fn extension_result(&self, extension: ExtensionId) -> Option<&Rc<dyn Any>> {
        self.extension_results.get(&extension)
    }
}
