// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The extension bus: cross-cutting concerns plugged into the pipeline.
//!
//! An extension is polymorphic over three independent optional capability
//! sets:
//!
//! - [`LayoutResultVisitor`](crate::reduce::LayoutResultVisitor) — runs
//!   during reduction and may accumulate a side output exposed through
//!   [`RenderTree::extension_result`](crate::tree::RenderTree::extension_result).
//! - [`MountExtension`] — intercepts the mount state machine. Extension
//!   callbacks always wrap the render unit's own binder calls:
//!   extension-before, then binders, then extension-after.
//! - [`VisibleBoundsCallbacks`] — reacts to viewport changes.
//!
//! A mount extension with [`can_prevent_mount`](MountExtension::can_prevent_mount)
//! may acquire logical references on unit ids via its [`ExtensionState`],
//! decoupling "is acquired" from "is physically mounted": an item can be
//! acquired-but-not-mounted (deferred) or mounted-but-immediately-released
//! (transient). A reference count must reach exactly zero before a physical
//! unmount is allowed;
//! [`MountState::release_all_acquired_references`](crate::mount::MountState::release_all_acquired_references)
//! is the only safe teardown path and is idempotent.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use kurbo::Rect;

use crate::content::Content;
use crate::reduce::LayoutResultVisitor;
use crate::tree::{RenderTree, RenderTreeNode};
use crate::unit::RenderUnitId;

/// Stable identity of an extension, used to key its state and its layout
/// visitor's side output.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtensionId(pub u64);

impl fmt::Debug for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtensionId({})", self.0)
    }
}

/// A pluggable participant in the reduce/mount/visibility pipeline.
///
/// Each capability accessor defaults to `None`; an extension implements
/// only the capabilities it needs.
pub trait RenderCoreExtension: fmt::Debug {
    /// Stable identity for this extension.
    fn id(&self) -> ExtensionId;

    /// Short description used in diagnostics.
    fn description(&self) -> &str {
        "extension"
    }

    /// Creates a fresh layout visitor for one reduction pass.
    fn create_layout_visitor(&self) -> Option<Box<dyn LayoutResultVisitor>> {
        None
    }

    /// The mount-lifecycle capability.
    fn mount_extension(&self) -> Option<&dyn MountExtension> {
        None
    }

    /// The viewport-change capability.
    fn visible_bounds_callbacks(&self) -> Option<&dyn VisibleBoundsCallbacks> {
        None
    }
}

/// Mount-lifecycle callbacks. All default to no-ops.
///
/// Callbacks receive the extension's own [`ExtensionState`]; extensions
/// never see each other's state.
pub trait MountExtension {
    /// Whether this extension may acquire mount references that defer or
    /// veto physical mounts/unmounts. When any registered extension returns
    /// true, new items mount only once some extension acquires them.
    fn can_prevent_mount(&self) -> bool {
        false
    }

    /// A mount pass over `tree` is about to begin.
    fn before_mount(&self, _state: &mut ExtensionState, _tree: &RenderTree) {}

    /// The mount pass finished.
    fn after_mount(&self, _state: &mut ExtensionState) {}

    /// `node` is about to be physically mounted.
    fn before_mount_item(&self, _state: &mut ExtensionState, _node: &RenderTreeNode) {}

    /// `node`'s content was mounted and its mount binders bound.
    fn on_mount_item(&self, _state: &mut ExtensionState, _node: &RenderTreeNode, _content: &Content) {
    }

    /// Fired after [`on_mount_item`](Self::on_mount_item) once bind
    /// completed for the item.
    fn on_bind_item(&self, _state: &mut ExtensionState, _node: &RenderTreeNode, _content: &Content) {
    }

    /// The item for `id` is about to have its binders unbound.
    fn on_unbind_item(&self, _state: &mut ExtensionState, _id: RenderUnitId, _content: &Content) {}

    /// The item for `id` was physically unmounted, or its last logical
    /// reference was released without it ever mounting.
    fn on_unmount_item(&self, _state: &mut ExtensionState, _id: RenderUnitId) {}

    /// Consulted when an id survives across tree versions; returning true
    /// forces an update pass over the item's optional and attach binders.
    fn should_update_item(
        &self,
        _state: &mut ExtensionState,
        _current: &RenderTreeNode,
        _next: &RenderTreeNode,
    ) -> bool {
        false
    }

    /// New bounds were applied to the item's content.
    fn on_bounds_applied_to_item(
        &self,
        _state: &mut ExtensionState,
        _node: &RenderTreeNode,
        _content: &Content,
    ) {
    }

    /// The owning mount state is tearing down; all of this extension's
    /// per-tree state has already been released.
    fn on_unmount(&self, _state: &mut ExtensionState) {}
}

/// Viewport-change callbacks.
pub trait VisibleBoundsCallbacks {
    /// The visible bounds of the mounted hierarchy changed.
    fn on_visible_bounds_changed(&self, _state: &mut ExtensionState, _visible_bounds: Rect) {}
}

/// Per-extension, per-tree mutable state plus the extension's reference
/// counts keyed by render unit id.
///
/// The opaque `state` slot is owned by the extension; the engine only
/// creates and discards it. The acquired table is maintained through
/// [`MountState`](crate::mount::MountState)'s acquire/release operations.
pub struct ExtensionState {
    extension_id: ExtensionId,
    state: Option<Box<dyn Any>>,
    acquired: BTreeMap<RenderUnitId, u32>,
}

impl fmt::Debug for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionState")
            .field("extension_id", &self.extension_id)
            .field("has_state", &self.state.is_some())
            .field("acquired", &self.acquired)
            .finish()
    }
}

impl ExtensionState {
    /// Creates empty state for the given extension.
    #[must_use]
    pub fn new(extension_id: ExtensionId) -> Self {
        Self {
            extension_id,
            state: None,
            acquired: BTreeMap::new(),
        }
    }

    /// The owning extension's id.
    #[must_use]
    pub fn extension_id(&self) -> ExtensionId {
        self.extension_id
    }

    /// Replaces the opaque per-tree state.
    pub fn set_state(&mut self, state: Box<dyn Any>) {
        self.state = Some(state);
    }

    /// Borrows the opaque state downcast to `T`.
    #[must_use]
    pub fn state<T: 'static>(&self) -> Option<&T> {
        self.state.as_ref().and_then(|s| s.downcast_ref())
    }

    /// Mutably borrows the opaque state downcast to `T`.
    #[must_use]
    pub fn state_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.state.as_mut().and_then(|s| s.downcast_mut())
    }

    /// This extension's reference count for `id`.
    #[must_use]
    pub fn acquired_count(&self, id: RenderUnitId) -> u32 {
        self.acquired.get(&id).copied().unwrap_or(0)
    }

    /// Whether this extension holds any reference on `id`.
    #[must_use]
    pub fn has_acquired(&self, id: RenderUnitId) -> bool {
        self.acquired_count(id) > 0
    }

    pub(crate) fn acquire(&mut self, id: RenderUnitId) -> u32 {
        let count = self.acquired.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// # Panics
    ///
    /// Panics if `id` has no outstanding reference from this extension.
    pub(crate) fn release(&mut self, id: RenderUnitId) -> u32 {
        let Some(count) = self.acquired.get_mut(&id) else {
            panic!(
                "extension {:?} released mount reference for {id:?} without acquiring it",
                self.extension_id
            );
        };
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.acquired.remove(&id);
        }
        remaining
    }

    /// Removes and returns all outstanding (id, count) pairs. Safe to call
    /// when empty; used by teardown, which must be idempotent.
    pub(crate) fn drain_acquired(&mut self) -> Vec<(RenderUnitId, u32)> {
        let drained: Vec<_> = self.acquired.iter().map(|(&id, &c)| (id, c)).collect();
        self.acquired.clear();
        drained
    }

    pub(crate) fn clear(&mut self) {
        self.state = None;
        self.acquired.clear();
    }
}
