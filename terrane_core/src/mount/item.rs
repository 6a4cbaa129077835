// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mount item storage.
//!
//! [`MountItem`]s live in slot-based storage addressed by [`MountItemId`]
//! handles. Freed slots are recycled via a free list, and generation
//! counters make handles to unmounted items stale instead of silently
//! aliasing the slot's next occupant.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::content::Content;
use crate::tree::RenderTreeNode;
use crate::unit::{BindValue, BinderKey, RenderUnitId};

/// Generational handle to a slot in an [`ItemStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MountItemId {
    /// Slot index.
    pub idx: u32,
    /// Generation the slot had when this handle was issued.
    pub generation: u32,
}

bitflags! {
    /// Lifecycle phase flags of one mount item.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MountFlags: u8 {
        /// Content is physically attached to its host.
        const MOUNTED = 1 << 0;
        /// Mount binders are bound.
        const BOUND = 1 << 1;
        /// Attach binders are bound.
        const ATTACHED = 1 << 2;
    }
}

/// Opaque per-binder state held while an item is mounted.
///
/// Whatever `bind` returned is exactly what the matching `unbind` receives,
/// in reverse registration order. Fixed results are positional; optional
/// and attach results are keyed so updates can carry unchanged entries
/// over to the next tree version.
#[derive(Default)]
pub(crate) struct BindRecords {
    pub(crate) fixed: Vec<BindValue>,
    pub(crate) optional: Vec<(BinderKey, BindValue)>,
    pub(crate) attach: Vec<(BinderKey, BindValue)>,
}

impl fmt::Debug for BindRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindRecords")
            .field("fixed", &self.fixed.len())
            .field("optional", &self.optional.len())
            .field("attach", &self.attach.len())
            .finish()
    }
}

/// Runtime pairing of a render tree node with its live platform content
/// and the bind state of its binders.
///
/// Created on mount, destroyed on unmount; owned exclusively by one
/// [`MountState`](super::MountState)'s item table.
#[derive(Debug)]
pub struct MountItem {
    pub(crate) node: Rc<RenderTreeNode>,
    pub(crate) content: Content,
    /// Content of the host this item is mounted into. `None` for the root.
    pub(crate) host_content: Option<Content>,
    pub(crate) binds: BindRecords,
    pub(crate) flags: MountFlags,
}

impl MountItem {
    /// The tree node this item realizes.
    #[must_use]
    pub fn node(&self) -> &Rc<RenderTreeNode> {
        &self.node
    }

    /// The live platform content.
    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Current lifecycle flags.
    #[must_use]
    pub fn flags(&self) -> MountFlags {
        self.flags
    }
}

struct Slot {
    generation: u32,
    item: Option<MountItem>,
}

/// Slot storage for mount items, indexed by render unit id.
#[derive(Default)]
pub(crate) struct ItemStore {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    by_id: BTreeMap<RenderUnitId, MountItemId>,
}

impl ItemStore {
    /// Stores a new item.
    ///
    /// # Panics
    ///
    /// Panics if an item for the same render unit id already exists.
    pub(crate) fn insert(&mut self, item: MountItem) -> MountItemId {
        let unit_id = item.node.unit().id();
        assert!(
            !self.by_id.contains_key(&unit_id),
            "mount item for {unit_id:?} already exists"
        );

        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot; its generation was bumped on removal.
            self.slots[idx as usize].item = Some(item);
            idx
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "item count is bounded by u32 tree indices"
            )]
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                item: Some(item),
            });
            idx
        };

        let id = MountItemId {
            idx,
            generation: self.slots[idx as usize].generation,
        };
        self.by_id.insert(unit_id, id);
        id
    }

    /// Removes the item for `unit_id`, freeing its slot for reuse. Handles
    /// to the removed item become stale immediately.
    pub(crate) fn remove(&mut self, unit_id: RenderUnitId) -> Option<MountItem> {
        let handle = self.by_id.remove(&unit_id)?;
        let slot = &mut self.slots[handle.idx as usize];
        let item = slot.item.take();
        slot.generation += 1;
        self.free_list.push(handle.idx);
        item
    }

    /// Takes the item out for in-place modification, leaving its slot and
    /// generation intact. Must be paired with [`put_back`](Self::put_back).
    pub(crate) fn take(&mut self, unit_id: RenderUnitId) -> Option<(MountItemId, MountItem)> {
        let handle = *self.by_id.get(&unit_id)?;
        let item = self.slots[handle.idx as usize].item.take()?;
        Some((handle, item))
    }

    /// Returns an item taken with [`take`](Self::take).
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub(crate) fn put_back(&mut self, handle: MountItemId, item: MountItem) {
        let slot = &mut self.slots[handle.idx as usize];
        assert!(
            slot.generation == handle.generation && slot.item.is_none(),
            "stale MountItemId: {handle:?} (current generation {})",
            slot.generation
        );
        slot.item = Some(item);
    }

    pub(crate) fn get(&self, unit_id: RenderUnitId) -> Option<&MountItem> {
        let handle = self.by_id.get(&unit_id)?;
        self.slots[handle.idx as usize].item.as_ref()
    }

    /// Resolves a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub(crate) fn resolve(&self, handle: MountItemId) -> &MountItem {
        let slot = self
            .slots
            .get(handle.idx as usize)
            .unwrap_or_else(|| panic!("stale MountItemId: {handle:?} (slot out of range)"));
        assert!(
            slot.generation == handle.generation,
            "stale MountItemId: {handle:?} (current generation {})",
            slot.generation
        );
        slot.item
            .as_ref()
            .unwrap_or_else(|| panic!("stale MountItemId: {handle:?} (slot empty)"))
    }

    /// Whether `handle` still refers to a live item.
    pub(crate) fn is_alive(&self, handle: MountItemId) -> bool {
        self.slots
            .get(handle.idx as usize)
            .is_some_and(|s| s.generation == handle.generation && s.item.is_some())
    }

    pub(crate) fn handle(&self, unit_id: RenderUnitId) -> Option<MountItemId> {
        self.by_id.get(&unit_id).copied()
    }

    pub(crate) fn contains(&self, unit_id: RenderUnitId) -> bool {
        self.by_id.contains_key(&unit_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Live unit ids ordered by their node's traversal index (mount order,
    /// parents before children).
    pub(crate) fn ids_in_mount_order(&self) -> Vec<RenderUnitId> {
        let mut ids: Vec<(u32, RenderUnitId)> = self
            .by_id
            .iter()
            .filter_map(|(&unit_id, &handle)| {
                let item = self.slots[handle.idx as usize].item.as_ref()?;
                Some((item.node.index(), unit_id))
            })
            .collect();
        ids.sort_unstable_by_key(|&(index, _)| index);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Live unit ids in reverse mount order (children before parents).
    pub(crate) fn ids_in_reverse_mount_order(&self) -> Vec<RenderUnitId> {
        let mut ids = self.ids_in_mount_order();
        ids.reverse();
        ids
    }

    /// Unit ids of items mounted into `host`, children-last ids first.
    pub(crate) fn hosted_by(&self, host: &Content) -> Vec<RenderUnitId> {
        let mut ids: Vec<(u32, RenderUnitId)> = self
            .by_id
            .iter()
            .filter_map(|(&unit_id, &handle)| {
                let item = self.slots[handle.idx as usize].item.as_ref()?;
                let host_content = item.host_content.as_ref()?;
                Rc::ptr_eq(host_content, host).then_some((item.node.index(), unit_id))
            })
            .collect();
        ids.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        ids.into_iter().map(|(_, id)| id).collect()
    }
}
