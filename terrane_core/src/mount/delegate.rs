// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Extension dispatch and logical mount references.
//!
//! [`MountDelegate`] owns one [`ExtensionState`] per registered extension
//! and fans each mount lifecycle callback out to every extension carrying
//! the matching capability. It also maintains the global reference count
//! per render unit id: an extension with `can_prevent_mount` acquires a
//! logical hold on an id to defer or veto its physical mount and unmount
//! independent of tree presence.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::content::Content;
use crate::extension::{ExtensionId, ExtensionState, RenderCoreExtension};
use crate::tree::{RenderTree, RenderTreeNode};
use crate::unit::RenderUnitId;

pub(crate) struct RegisteredExtension {
    pub(crate) extension: Rc<dyn RenderCoreExtension>,
    pub(crate) state: ExtensionState,
}

/// Fans mount callbacks out to registered extensions and tracks their
/// acquired mount references.
#[derive(Default)]
pub struct MountDelegate {
    registered: Vec<RegisteredExtension>,
    /// Total outstanding references per id, summed across extensions.
    ref_counts: BTreeMap<RenderUnitId, u32>,
}

impl fmt::Debug for MountDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountDelegate")
            .field("extensions", &self.registered.len())
            .field("referenced_ids", &self.ref_counts.len())
            .finish()
    }
}

impl MountDelegate {
    /// Installs `extensions`, each with a fresh [`ExtensionState`]. Any
    /// previous set must have been torn down by the caller first.
    pub(crate) fn install(&mut self, extensions: &[Rc<dyn RenderCoreExtension>]) {
        debug_assert!(self.registered.is_empty() && self.ref_counts.is_empty());
        self.registered = extensions
            .iter()
            .map(|extension| RegisteredExtension {
                extension: extension.clone(),
                state: ExtensionState::new(extension.id()),
            })
            .collect();
    }

    /// Drops the registered set. After this no callback reaches the old
    /// extensions.
    pub(crate) fn clear(&mut self) {
        self.registered.clear();
        self.ref_counts.clear();
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn extension_count(&self) -> usize {
        self.registered.len()
    }

    /// Whether any registered extension may prevent mounts.
    #[must_use]
    pub fn has_prevent_mount_extension(&self) -> bool {
        self.registered.iter().any(|reg| {
            reg.extension
                .mount_extension()
                .is_some_and(|m| m.can_prevent_mount())
        })
    }

    /// Outstanding logical references on `id`, summed across extensions.
    #[must_use]
    pub fn ref_count(&self, id: RenderUnitId) -> u32 {
        self.ref_counts.get(&id).copied().unwrap_or(0)
    }

    /// Total outstanding references across all ids.
    #[must_use]
    pub fn total_ref_count(&self) -> u32 {
        self.ref_counts.values().sum()
    }

    /// Records one reference from `extension` on `id`. Returns true when
    /// this is the first reference on `id` globally.
    ///
    /// # Panics
    ///
    /// Panics if `extension` is not registered.
    pub(crate) fn acquire(&mut self, extension: ExtensionId, id: RenderUnitId) -> bool {
        self.state_of(extension).acquire(id);
        let count = self.ref_counts.entry(id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Releases one reference from `extension` on `id`. Returns true when
    /// the global count reached zero.
    ///
    /// # Panics
    ///
    /// Panics if `extension` is not registered or holds no reference on
    /// `id`.
    pub(crate) fn release(&mut self, extension: ExtensionId, id: RenderUnitId) -> bool {
        self.state_of(extension).release(id);
        let count = self
            .ref_counts
            .get_mut(&id)
            .unwrap_or_else(|| panic!("no outstanding references for {id:?}"));
        *count -= 1;
        if *count == 0 {
            self.ref_counts.remove(&id);
            true
        } else {
            false
        }
    }

    /// Drops every outstanding reference of every extension. Returns the
    /// ids whose global count reached zero, each exactly once.
    pub(crate) fn release_all(&mut self) -> Vec<RenderUnitId> {
        for reg in &mut self.registered {
            let _ = reg.state.drain_acquired();
        }
        let zeroed: Vec<RenderUnitId> = self.ref_counts.keys().copied().collect();
        self.ref_counts.clear();
        zeroed
    }

    pub(crate) fn before_mount(&mut self, tree: &RenderTree) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.before_mount(&mut reg.state, tree);
            }
        }
    }

    pub(crate) fn after_mount(&mut self) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.after_mount(&mut reg.state);
            }
        }
    }

    pub(crate) fn before_mount_item(&mut self, node: &RenderTreeNode) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.before_mount_item(&mut reg.state, node);
            }
        }
    }

    pub(crate) fn on_mount_item(&mut self, node: &RenderTreeNode, content: &Content) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.on_mount_item(&mut reg.state, node, content);
            }
        }
    }

    pub(crate) fn on_bind_item(&mut self, node: &RenderTreeNode, content: &Content) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.on_bind_item(&mut reg.state, node, content);
            }
        }
    }

    pub(crate) fn on_unbind_item(&mut self, id: RenderUnitId, content: &Content) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.on_unbind_item(&mut reg.state, id, content);
            }
        }
    }

    pub(crate) fn on_unmount_item(&mut self, id: RenderUnitId) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.on_unmount_item(&mut reg.state, id);
            }
        }
    }

    /// True when any extension wants the item updated regardless of what
    /// its binders report.
    pub(crate) fn should_update_item(
        &mut self,
        current: &RenderTreeNode,
        next: &RenderTreeNode,
    ) -> bool {
        let mut update = false;
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                update |= mount.should_update_item(&mut reg.state, current, next);
            }
        }
        update
    }

    pub(crate) fn on_bounds_applied(&mut self, node: &RenderTreeNode, content: &Content) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.on_bounds_applied_to_item(&mut reg.state, node, content);
            }
        }
    }

    /// Fires each extension's teardown callback and clears its per-tree
    /// state. References must already have been released.
    pub(crate) fn on_unmount_all(&mut self) {
        for reg in &mut self.registered {
            if let Some(mount) = reg.extension.mount_extension() {
                mount.on_unmount(&mut reg.state);
            }
            reg.state.clear();
        }
    }

    pub(crate) fn on_visible_bounds_changed(&mut self, visible_bounds: Rect) {
        for reg in &mut self.registered {
            if let Some(callbacks) = reg.extension.visible_bounds_callbacks() {
                callbacks.on_visible_bounds_changed(&mut reg.state, visible_bounds);
            }
        }
    }

    /// Borrows the state of `extension` for inspection.
    #[must_use]
    pub fn extension_state(&self, extension: ExtensionId) -> Option<&ExtensionState> {
        self.registered
            .iter()
            .find(|reg| reg.extension.id() == extension)
            .map(|reg| &reg.state)
    }

    fn state_of(&mut self, extension: ExtensionId) -> &mut ExtensionState {
        self.registered
            .iter_mut()
            .find(|reg| reg.extension.id() == extension)
            .map(|reg| &mut reg.state)
            .unwrap_or_else(|| panic!("no registered extension {extension:?}"))
    }
}

#[cfg(test)]
mod tests {
    use crate::terrane_harness::{EventLog, TrackingExtension};

    use super::*;

    #[test]
    fn acquire_and_release_track_global_counts() {
        let log = EventLog::default();
        let a: Rc<dyn RenderCoreExtension> =
            Rc::new(TrackingExtension::new(ExtensionId(1), &log).prevent_mount());
        let b: Rc<dyn RenderCoreExtension> =
            Rc::new(TrackingExtension::new(ExtensionId(2), &log).prevent_mount());
        let mut delegate = MountDelegate::default();
        delegate.install(&[a, b]);

        let id = RenderUnitId(7);
        assert!(delegate.acquire(ExtensionId(1), id), "first reference");
        assert!(!delegate.acquire(ExtensionId(2), id));
        assert_eq!(delegate.ref_count(id), 2);

        assert!(!delegate.release(ExtensionId(1), id));
        assert!(delegate.release(ExtensionId(2), id), "last reference");
        assert_eq!(delegate.ref_count(id), 0);
    }

    #[test]
    #[should_panic(expected = "without acquiring it")]
    fn release_without_acquire_panics() {
        let log = EventLog::default();
        let ext: Rc<dyn RenderCoreExtension> =
            Rc::new(TrackingExtension::new(ExtensionId(1), &log));
        let mut delegate = MountDelegate::default();
        delegate.install(&[ext]);
        delegate.release(ExtensionId(1), RenderUnitId(7));
    }

    #[test]
    fn release_all_reports_each_zeroed_id_once() {
        let log = EventLog::default();
        let ext: Rc<dyn RenderCoreExtension> =
            Rc::new(TrackingExtension::new(ExtensionId(1), &log).prevent_mount());
        let mut delegate = MountDelegate::default();
        delegate.install(&[ext]);

        delegate.acquire(ExtensionId(1), RenderUnitId(1));
        delegate.acquire(ExtensionId(1), RenderUnitId(1));
        delegate.acquire(ExtensionId(1), RenderUnitId(2));

        let mut zeroed = delegate.release_all();
        zeroed.sort_unstable();
        assert_eq!(zeroed, [RenderUnitId(1), RenderUnitId(2)]);
        assert!(delegate.release_all().is_empty(), "idempotent");
    }

    #[test]
    fn prevent_mount_reflects_registered_capabilities() {
        let log = EventLog::default();
        let plain: Rc<dyn RenderCoreExtension> =
            Rc::new(TrackingExtension::new(ExtensionId(1), &log));
        let mut delegate = MountDelegate::default();
        delegate.install(&[plain]);
        assert!(!delegate.has_prevent_mount_extension());

        delegate.clear();
        let preventing: Rc<dyn RenderCoreExtension> =
            Rc::new(TrackingExtension::new(ExtensionId(2), &log).prevent_mount());
        delegate.install(&[preventing]);
        assert!(delegate.has_prevent_mount_extension());
    }
}
