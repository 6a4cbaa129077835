// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mount state machine.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::content::{Content, HostContent, PlatformContext};
use crate::extension::{ExtensionId, RenderCoreExtension};
use crate::pool::PoolManager;
use crate::trace::{MountSummary, Tracer};
use crate::tree::{INVALID, RenderTree, RenderTreeNode};
use crate::unit::{BindValue, BinderKey, LayoutData, MountBinder, RenderUnit, RenderUnitId};

use super::MountError;
use super::delegate::MountDelegate;
use super::item::{BindRecords, ItemStore, MountFlags, MountItem, MountItemId};

/// Owns the mounted realization of one render tree.
///
/// All mount-affecting calls must arrive serialized on one owner thread.
/// Nested hierarchies (content whose
/// [`is_nested_scope_root`](crate::content::MountContent::is_nested_scope_root)
/// is true) are opaque: this state never reaches into the inner hierarchy
/// they own.
pub struct MountState {
    ctx: PlatformContext,
    root_content: Content,
    items: ItemStore,
    delegate: MountDelegate,
    pools: PoolManager,
    tree: Option<Rc<RenderTree>>,
    attached: bool,
    tracer: Tracer,
}

impl fmt::Debug for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountState")
            .field("ctx", &self.ctx)
            .field("items", &self.items.len())
            .field("generation", &self.tree.as_ref().map(|t| t.generation()))
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

impl MountState {
    /// Creates an unmounted state whose root node realizes `root_content`.
    #[must_use]
    pub fn new(ctx: PlatformContext, root_content: Content) -> Self {
        Self {
            ctx,
            root_content,
            items: ItemStore::default(),
            delegate: MountDelegate::default(),
            pools: PoolManager::new(),
            tree: None,
            attached: false,
            tracer: Tracer::disabled(),
        }
    }

    /// Replaces the pipeline tracer.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    /// Replaces the registered extension set.
    ///
    /// The outgoing set is fully torn down first: its outstanding mount
    /// references are released and its teardown callbacks fire. After the
    /// swap no callback reaches the old set.
    pub fn register_extensions(
        &mut self,
        extensions: &[Rc<dyn RenderCoreExtension>],
    ) -> Result<(), MountError> {
        self.release_all_acquired_references()?;
        self.delegate.on_unmount_all();
        self.delegate.clear();
        self.delegate.install(extensions);
        Ok(())
    }

    /// Mounts `next`, diffing against the currently mounted tree by render
    /// unit id. Mounting the same tree again is a no-op.
    ///
    /// # Panics
    ///
    /// Panics on structural invariant violations: a child mounting under
    /// content without host capability, or a render unit changing its fixed
    /// mount binder count across tree versions.
    pub fn mount(&mut self, next: &Rc<RenderTree>) -> Result<(), MountError> {
        if self.tree.as_ref().is_some_and(|t| Rc::ptr_eq(t, next)) {
            return Ok(());
        }

        self.tracer.on_mount_begin(next.generation(), next.len());
        self.delegate.before_mount(next);
        let mut summary = MountSummary::default();

        // Ids that left the tree unmount first, children before parents.
        // Items under a logical hold stay mounted until the hold drops.
        for id in self.items.ids_in_reverse_mount_order() {
            if next.contains(id) || !self.items.contains(id) {
                continue;
            }
            if self.delegate.ref_count(id) > 0 {
                continue;
            }
            let before = self.items.len();
            self.unmount_item(id)?;
            summary.unmounted += count_delta(before, self.items.len());
        }

        // Mount or update in traversal order, parents before children.
        let prevent_active = self.delegate.has_prevent_mount_extension();
        for node in next.nodes() {
            let id = node.unit().id();
            if self.items.contains(id) {
                let (updated, moved) = self.update_item(next, node)?;
                summary.updated += u32::from(updated);
                summary.moved += u32::from(moved);
            } else {
                if prevent_active && node.index() != 0 && self.delegate.ref_count(id) == 0 {
                    // Deferred until some extension acquires the id.
                    continue;
                }
                let before = self.items.len();
                self.mount_item(next, node)?;
                summary.mounted += count_delta(self.items.len(), before);
            }
        }

        self.tree = Some(next.clone());
        self.delegate.after_mount();
        self.tracer.on_mount_end(next.generation(), summary);
        Ok(())
    }

    /// Tears down extension state, then unmounts every item in reverse
    /// mount order. Idempotent.
    pub fn unmount_all_items(&mut self) -> Result<(), MountError> {
        if self.tree.is_none() && self.items.is_empty() && self.delegate.total_ref_count() == 0 {
            return Ok(());
        }

        self.release_all_acquired_references()?;
        self.delegate.on_unmount_all();

        for id in self.items.ids_in_reverse_mount_order() {
            if self.items.contains(id) {
                self.unmount_item(id)?;
            }
        }
        self.tree = None;
        Ok(())
    }

    /// Binds attach binders for every mounted item, parents before
    /// children. Items mounted later bind their attach binders on mount.
    pub fn attach(&mut self) -> Result<(), MountError> {
        if self.attached {
            return Ok(());
        }
        self.attached = true;
        for id in self.items.ids_in_mount_order() {
            let Some((handle, item)) = self.items.take(id) else {
                continue;
            };
            let item = self.attach_item(item)?;
            self.items.put_back(handle, item);
        }
        Ok(())
    }

    /// Unbinds attach binders for every mounted item in reverse mount
    /// order. Items stay mounted; only their attach-phase bind state is
    /// discarded.
    pub fn detach(&mut self) -> Result<(), MountError> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        for id in self.items.ids_in_reverse_mount_order() {
            let Some((handle, item)) = self.items.take(id) else {
                continue;
            };
            let item = self.detach_item(item)?;
            self.items.put_back(handle, item);
        }
        Ok(())
    }

    /// Force-mounts the item for `id` from the current tree, outside the
    /// normal top-down pass. No-op when already mounted or not in the tree.
    pub fn notify_mount(&mut self, id: RenderUnitId) -> Result<(), MountError> {
        if self.items.contains(id) {
            return Ok(());
        }
        let Some(tree) = self.tree.clone() else {
            return Ok(());
        };
        if let Some(node) = tree.node_for_id(id) {
            self.mount_item(&tree, node)?;
        }
        Ok(())
    }

    /// Force-unmounts the item for `id` without touching the tree; the
    /// render unit count stays unchanged while the physical item count
    /// drops.
    pub fn notify_unmount(&mut self, id: RenderUnitId) -> Result<(), MountError> {
        if self.items.contains(id) {
            self.unmount_item(id)?;
        }
        Ok(())
    }

    /// Records a logical mount reference from `extension` on `id`. With
    /// `mount_now`, a first reference on an unmounted id in the current
    /// tree mounts it immediately.
    ///
    /// # Panics
    ///
    /// Panics if `extension` is not registered.
    pub fn acquire_mount_reference(
        &mut self,
        extension: ExtensionId,
        id: RenderUnitId,
        mount_now: bool,
    ) -> Result<(), MountError> {
        let first = self.delegate.acquire(extension, id);
        if first && mount_now && !self.items.contains(id) {
            if let Some(tree) = self.tree.clone() {
                if let Some(node) = tree.node_for_id(id) {
                    self.mount_item(&tree, node)?;
                }
            }
        }
        Ok(())
    }

    /// Releases one logical mount reference. When the last reference on a
    /// mounted id drops with `unmount_now`, the item unmounts immediately;
    /// without it, the unmount is deferred to the next mount pass. The
    /// last release on a never-mounted id still observes
    /// [`on_unmount_item`](crate::extension::MountExtension::on_unmount_item).
    ///
    /// # Panics
    ///
    /// Panics if `extension` holds no reference on `id`.
    pub fn release_mount_reference(
        &mut self,
        extension: ExtensionId,
        id: RenderUnitId,
        unmount_now: bool,
    ) -> Result<(), MountError> {
        let zeroed = self.delegate.release(extension, id);
        if !zeroed {
            return Ok(());
        }
        if self.items.contains(id) {
            if unmount_now {
                self.unmount_item(id)?;
            }
        } else {
            self.delegate.on_unmount_item(id);
        }
        Ok(())
    }

    /// Drops every outstanding mount reference of every extension. The
    /// only safe teardown path for extension holds; idempotent. Mounted
    /// orphans (held ids absent from the tree) unmount; never-mounted ids
    /// observe their unmount callback exactly once.
    pub fn release_all_acquired_references(&mut self) -> Result<(), MountError> {
        for id in self.delegate.release_all() {
            if self.items.contains(id) {
                let in_tree = self.tree.as_ref().is_some_and(|t| t.contains(id));
                if !in_tree {
                    self.unmount_item(id)?;
                }
            } else {
                self.delegate.on_unmount_item(id);
            }
        }
        Ok(())
    }

    /// Reports new visible bounds to every extension with viewport
    /// callbacks.
    pub fn set_visible_bounds(&mut self, visible_bounds: Rect) {
        self.delegate.on_visible_bounds_changed(visible_bounds);
    }

    /// Whether the item for `id` is physically mounted.
    #[must_use]
    pub fn is_mounted(&self, id: RenderUnitId) -> bool {
        self.items.contains(id)
    }

    /// Number of physically mounted items.
    #[must_use]
    pub fn mount_item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of render units in the current tree, independent of how many
    /// are physically mounted.
    #[must_use]
    pub fn render_unit_count(&self) -> usize {
        self.tree.as_ref().map_or(0, |t| t.len() as usize)
    }

    /// The mounted item for `id`.
    #[must_use]
    pub fn item(&self, id: RenderUnitId) -> Option<&MountItem> {
        self.items.get(id)
    }

    /// Handle to the mounted item for `id`.
    #[must_use]
    pub fn item_handle(&self, id: RenderUnitId) -> Option<MountItemId> {
        self.items.handle(id)
    }

    /// Resolves an item handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale (its item was unmounted).
    #[must_use]
    pub fn item_at(&self, handle: MountItemId) -> &MountItem {
        self.items.resolve(handle)
    }

    /// The live content mounted for `id`.
    #[must_use]
    pub fn content_for(&self, id: RenderUnitId) -> Option<Content> {
        self.items.get(id).map(|item| item.content.clone())
    }

    /// The currently mounted tree.
    #[must_use]
    pub fn current_tree(&self) -> Option<&Rc<RenderTree>> {
        self.tree.as_ref()
    }

    /// Whether attach binders are currently bound.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// The extension dispatch and reference-count table.
    #[must_use]
    pub fn delegate(&self) -> &MountDelegate {
        &self.delegate
    }

    /// The content pools backing this hierarchy.
    pub fn pools_mut(&mut self) -> &mut PoolManager {
        &mut self.pools
    }

    /// The platform context mounting runs under.
    #[must_use]
    pub fn context(&self) -> &PlatformContext {
        &self.ctx
    }

    /// Physically mounts `node`, force-mounting its host chain first.
    fn mount_item(&mut self, tree: &RenderTree, node: &Rc<RenderTreeNode>) -> Result<(), MountError> {
        let unit = node.unit().clone();

        // A child's content attaches to its host's already-mounted
        // content, so hosts mount first regardless of deferral policy.
        let host_content = if node.host() == INVALID {
            None
        } else {
            let host_node = tree.node_at(node.host()).clone();
            let host_id = host_node.unit().id();
            if !self.items.contains(host_id) {
                self.mount_item(tree, &host_node)?;
            }
            let item = self
                .items
                .get(host_id)
                .unwrap_or_else(|| panic!("host {host_id:?} failed to mount"));
            Some(item.content.clone())
        };

        self.delegate.before_mount_item(node);

        let content = if node.host() == INVALID {
            self.root_content.clone()
        } else {
            self.acquire_content(&unit)
        };

        if let Some(host_content) = &host_content {
            let host_node = tree.node_at(node.host());
            let Some(host) = host_content.as_host() else {
                panic!(
                    "cannot mount {} (content {}) under {} (content {}): not a host",
                    unit_label(&unit),
                    content.type_name(),
                    unit_label(host_node.unit()),
                    host_content.type_name(),
                );
            };
            host.mount_child(node.position_in_host(), &content);
        }

        content.set_bounds(node.bounds());

        let mut binds = BindRecords::default();
        for binder in unit.fixed_mount_binders() {
            binds.fixed.push(bind_one(
                &self.ctx,
                &content,
                &unit,
                binder,
                node.layout_data(),
            )?);
        }
        for binder in unit.optional_mount_binders() {
            let value = bind_one(&self.ctx, &content, &unit, binder, node.layout_data())?;
            binds.optional.push((binder.key(), value));
        }

        let mut flags = MountFlags::MOUNTED | MountFlags::BOUND;
        if self.attached {
            for binder in unit.attach_binders() {
                let value = bind_one(&self.ctx, &content, &unit, binder, node.layout_data())?;
                binds.attach.push((binder.key(), value));
            }
            flags |= MountFlags::ATTACHED;
        }

        self.items.insert(MountItem {
            node: node.clone(),
            content: content.clone(),
            host_content,
            binds,
            flags,
        });

        self.delegate.on_mount_item(node, &content);
        self.delegate.on_bind_item(node, &content);
        self.delegate.on_bounds_applied(node, &content);
        self.tracer.on_item_mounted(unit.id());
        Ok(())
    }

    /// Unmounts the item for `id` and everything mounted into its content.
    fn unmount_item(&mut self, id: RenderUnitId) -> Result<(), MountError> {
        let content = self
            .items
            .get(id)
            .unwrap_or_else(|| panic!("no mount item for {id:?}"))
            .content
            .clone();

        // Children first. Only this hierarchy's own items count; a nested
        // scope rooted in this content manages its inner items itself.
        for child in self.items.hosted_by(&content) {
            if self.items.contains(child) {
                self.unmount_item(child)?;
            }
        }

        let Some(mut item) = self.items.remove(id) else {
            return Ok(());
        };
        let unit = item.node.unit().clone();
        let layout = item.node.layout_data().cloned();

        if item.flags.contains(MountFlags::ATTACHED) {
            item = detach_binders(&self.ctx, &unit, layout.as_ref(), item)?;
        }

        self.delegate.on_unbind_item(id, &item.content);

        while let Some((key, value)) = item.binds.optional.pop() {
            let binder = unit.optional_mount_binder(key).unwrap_or_else(|| {
                panic!("optional binder {key:?} missing from {}", unit_label(&unit))
            });
            unbind_one(&self.ctx, &item.content, &unit, binder, layout.as_ref(), value)?;
        }
        let fixed_binders = unit.fixed_mount_binders();
        while let Some(value) = item.binds.fixed.pop() {
            let binder = &fixed_binders[item.binds.fixed.len()];
            unbind_one(&self.ctx, &item.content, &unit, binder, layout.as_ref(), value)?;
        }

        if let Some(host_content) = &item.host_content {
            let host = host_content.as_host().unwrap_or_else(|| {
                panic!(
                    "host content {} of {} lost its host capability",
                    host_content.type_name(),
                    unit_label(&unit),
                )
            });
            host.unmount_child(item.node.position_in_host(), &item.content);
        }

        self.delegate.on_unmount_item(id);
        self.tracer.on_item_unmounted(id);

        // Recycle everything except the root content and nested scope
        // roots, whose inner hierarchy stays live.
        if item.host_content.is_some() && !item.content.is_nested_scope_root() {
            let _ = self
                .pools
                .release(self.ctx.scope(), unit.allocator().as_ref(), item.content);
        }
        Ok(())
    }

    /// Reconciles the existing item for `next_node`'s id against the next
    /// tree version. Returns (binders or bounds updated, moved).
    fn update_item(
        &mut self,
        tree: &RenderTree,
        next_node: &Rc<RenderTreeNode>,
    ) -> Result<(bool, bool), MountError> {
        let id = next_node.unit().id();
        let (handle, mut item) = self
            .items
            .take(id)
            .unwrap_or_else(|| panic!("no mount item for {id:?}"));
        let prev_node = item.node.clone();
        let prev_unit = prev_node.unit().clone();
        let next_unit = next_node.unit().clone();

        assert!(
            prev_unit.fixed_mount_binders().len() == next_unit.fixed_mount_binders().len(),
            "render unit {} changed its fixed mount binder count across tree versions ({} -> {})",
            unit_label(&next_unit),
            prev_unit.fixed_mount_binders().len(),
            next_unit.fixed_mount_binders().len(),
        );

        let force = self.delegate.should_update_item(&prev_node, next_node);
        let prev_layout = prev_node.layout_data().cloned();
        let next_layout = next_node.layout_data().cloned();

        let binders_need_update = force
            || list_needs_update(
                prev_unit.optional_mount_binders(),
                next_unit.optional_mount_binders(),
                prev_layout.as_ref(),
                next_layout.as_ref(),
            )
            || (item.flags.contains(MountFlags::ATTACHED)
                && list_needs_update(
                    prev_unit.attach_binders(),
                    next_unit.attach_binders(),
                    prev_layout.as_ref(),
                    next_layout.as_ref(),
                ));

        if binders_need_update {
            self.delegate.on_unbind_item(id, &item.content);
        }

        let mut changed = false;
        let bound = core::mem::take(&mut item.binds.optional);
        let (optional, optional_changed) = update_bound_list(
            &self.ctx,
            &item.content,
            &next_unit,
            prev_unit.optional_mount_binders(),
            next_unit.optional_mount_binders(),
            prev_layout.as_ref(),
            next_layout.as_ref(),
            bound,
            force,
        )?;
        item.binds.optional = optional;
        changed |= optional_changed;

        if item.flags.contains(MountFlags::ATTACHED) {
            let bound = core::mem::take(&mut item.binds.attach);
            let (attach, attach_changed) = update_bound_list(
                &self.ctx,
                &item.content,
                &next_unit,
                prev_unit.attach_binders(),
                next_unit.attach_binders(),
                prev_layout.as_ref(),
                next_layout.as_ref(),
                bound,
                force,
            )?;
            item.binds.attach = attach;
            changed |= attach_changed;
        }

        if binders_need_update {
            self.delegate.on_bind_item(next_node, &item.content);
        }

        // Reorder-only changes move the content between host positions
        // without any unmount or rebind.
        let moved = self.move_if_needed(tree, next_node, &prev_node, &mut item)?;

        let mut bounds_changed = false;
        if prev_node.bounds() != next_node.bounds() {
            item.content.set_bounds(next_node.bounds());
            self.delegate.on_bounds_applied(next_node, &item.content);
            bounds_changed = true;
        }

        item.node = next_node.clone();
        self.items.put_back(handle, item);

        if changed {
            self.tracer.on_item_updated(id);
        }
        Ok((changed || bounds_changed, moved))
    }

    /// Moves `item`'s content when its host or host position changed.
    fn move_if_needed(
        &mut self,
        tree: &RenderTree,
        next_node: &Rc<RenderTreeNode>,
        prev_node: &RenderTreeNode,
        item: &mut MountItem,
    ) -> Result<bool, MountError> {
        let next_host_content = if next_node.host() == INVALID {
            None
        } else {
            let host_node = tree.node_at(next_node.host()).clone();
            let host_id = host_node.unit().id();
            if !self.items.contains(host_id) {
                self.mount_item(tree, &host_node)?;
            }
            let host_item = self
                .items
                .get(host_id)
                .unwrap_or_else(|| panic!("host {host_id:?} failed to mount"));
            Some(host_item.content.clone())
        };

        let moved = match (&item.host_content, &next_host_content) {
            (None, None) => false,
            (Some(prev_host), Some(next_host)) if Rc::ptr_eq(prev_host, next_host) => {
                let from = prev_node.position_in_host();
                let to = next_node.position_in_host();
                if from == to {
                    false
                } else {
                    let host = require_host(next_host, next_node);
                    host.move_child(&item.content, from, to);
                    true
                }
            }
            (Some(prev_host), Some(next_host)) => {
                let old = require_host(prev_host, next_node);
                old.unmount_child(prev_node.position_in_host(), &item.content);
                let new = require_host(next_host, next_node);
                new.mount_child(next_node.position_in_host(), &item.content);
                true
            }
            _ => panic!(
                "{} changed between root and hosted across tree versions",
                unit_label(next_node.unit())
            ),
        };
        if moved {
            item.host_content = next_host_content;
        }
        Ok(moved)
    }

    fn attach_item(&mut self, mut item: MountItem) -> Result<MountItem, MountError> {
        if item.flags.contains(MountFlags::ATTACHED) {
            return Ok(item);
        }
        let unit = item.node.unit().clone();
        let layout = item.node.layout_data().cloned();
        for binder in unit.attach_binders() {
            let value = bind_one(&self.ctx, &item.content, &unit, binder, layout.as_ref())?;
            item.binds.attach.push((binder.key(), value));
        }
        item.flags |= MountFlags::ATTACHED;
        Ok(item)
    }

    fn detach_item(&mut self, mut item: MountItem) -> Result<MountItem, MountError> {
        if !item.flags.contains(MountFlags::ATTACHED) {
            return Ok(item);
        }
        let unit = item.node.unit().clone();
        let layout = item.node.layout_data().cloned();
        item = detach_binders(&self.ctx, &unit, layout.as_ref(), item)?;
        Ok(item)
    }

    /// Pooled content for `unit`, or freshly created content on a miss.
    fn acquire_content(&mut self, unit: &RenderUnit) -> Content {
        let allocator = unit.allocator();
        self.pools
            .acquire(self.ctx.scope(), allocator.as_ref())
            .unwrap_or_else(|| allocator.create(&self.ctx))
    }
}

/// Unbinds every attach binder in reverse declaration order and clears the
/// attached flag.
fn detach_binders(
    ctx: &PlatformContext,
    unit: &Rc<RenderUnit>,
    layout: Option<&LayoutData>,
    mut item: MountItem,
) -> Result<MountItem, MountError> {
    while let Some((key, value)) = item.binds.attach.pop() {
        let binder = unit
            .attach_binder(key)
            .unwrap_or_else(|| panic!("attach binder {key:?} missing from {}", unit_label(unit)));
        unbind_one(ctx, &item.content, unit, binder, layout, value)?;
    }
    item.flags.remove(MountFlags::ATTACHED);
    Ok(item)
}

/// Unbind-then-rebind reconciliation of one keyed binder list.
///
/// Stale entries (absent from `next_binders`, or reporting an update)
/// unbind in reverse declaration order first; then the next list binds in
/// forward declaration order, carrying unchanged bind values over.
#[expect(
    clippy::too_many_arguments,
    reason = "one reconciliation step needs the full previous and next binder context"
)]
fn update_bound_list(
    ctx: &PlatformContext,
    content: &Content,
    unit: &Rc<RenderUnit>,
    prev_binders: &[Rc<dyn MountBinder>],
    next_binders: &[Rc<dyn MountBinder>],
    prev_layout: Option<&LayoutData>,
    next_layout: Option<&LayoutData>,
    bound: Vec<(BinderKey, BindValue)>,
    force: bool,
) -> Result<(Vec<(BinderKey, BindValue)>, bool), MountError> {
    let mut kept: Vec<(BinderKey, BindValue)> = Vec::new();
    let mut changed = false;

    for (key, value) in bound.into_iter().rev() {
        let prev = binder_with_key(prev_binders, key).unwrap_or_else(|| {
            panic!("bound binder {key:?} missing from {}", unit_label(unit))
        });
        let rebind = match binder_with_key(next_binders, key) {
            None => true,
            Some(next) => force || prev.should_update(next.as_ref(), prev_layout, next_layout),
        };
        if rebind {
            unbind_one(ctx, content, unit, prev, prev_layout, value)?;
            changed = true;
        } else {
            kept.push((key, value));
        }
    }

    let mut out = Vec::with_capacity(next_binders.len());
    for binder in next_binders {
        let key = binder.key();
        if let Some(pos) = kept.iter().position(|(k, _)| *k == key) {
            // Unchanged: bind value carried over exactly.
            out.push(kept.swap_remove(pos));
        } else {
            out.push((key, bind_one(ctx, content, unit, binder, next_layout)?));
            changed = true;
        }
    }
    Ok((out, changed))
}

/// Whether reconciling `prev` against `next` will unbind or bind anything.
fn list_needs_update(
    prev: &[Rc<dyn MountBinder>],
    next: &[Rc<dyn MountBinder>],
    prev_layout: Option<&LayoutData>,
    next_layout: Option<&LayoutData>,
) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    prev.iter().any(|p| match binder_with_key(next, p.key()) {
        None => true,
        Some(n) => p.should_update(n.as_ref(), prev_layout, next_layout),
    })
}

/// The host capability of `content`, which must already have hosted a
/// mount.
fn require_host<'a>(content: &'a Content, child: &RenderTreeNode) -> &'a dyn HostContent {
    content.as_host().unwrap_or_else(|| {
        panic!(
            "cannot move {} (content {}): host content {} is not a host",
            unit_label(child.unit()),
            child.unit().description(),
            content.type_name(),
        )
    })
}

fn binder_with_key(
    binders: &[Rc<dyn MountBinder>],
    key: BinderKey,
) -> Option<&Rc<dyn MountBinder>> {
    binders.iter().find(|b| b.key() == key)
}

fn bind_one(
    ctx: &PlatformContext,
    content: &Content,
    unit: &Rc<RenderUnit>,
    binder: &Rc<dyn MountBinder>,
    layout: Option<&LayoutData>,
) -> Result<BindValue, MountError> {
    binder
        .bind(ctx, content, layout)
        .map_err(|source| MountError::Bind {
            unit: unit_label(unit),
            binder: String::from(binder.description()),
            source,
        })
}

fn unbind_one(
    ctx: &PlatformContext,
    content: &Content,
    unit: &Rc<RenderUnit>,
    binder: &Rc<dyn MountBinder>,
    layout: Option<&LayoutData>,
    value: BindValue,
) -> Result<(), MountError> {
    binder
        .unbind(ctx, content, layout, value)
        .map_err(|source| MountError::Unbind {
            unit: unit_label(unit),
            binder: String::from(binder.description()),
            source,
        })
}

fn unit_label(unit: &RenderUnit) -> String {
    format!("{:?} ({})", unit.id(), unit.description())
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "item counts are bounded by u32 tree indices"
)]
fn count_delta(after: usize, before: usize) -> u32 {
    after.abs_diff(before) as u32
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use crate::terrane_harness::{
        EventLog, FailBinder, SeqBinder, TestAllocator, TestContent, TestLayoutResult,
        TrackingExtension, test_unit,
    };

    use crate::constraints::SizeConstraints;
    use crate::content::{AllocatorId, ContentAllocator, ScopeId};
    use crate::pool::PoolingPolicy;
    use crate::reduce::reduce;
    use crate::unit::RenderType;

    use super::*;

    fn ctx() -> PlatformContext {
        PlatformContext::new(ScopeId(1))
    }

    fn view_unit(id: u64) -> Rc<RenderUnit> {
        test_unit(id, RenderType::View, Rc::new(TestAllocator::new(100 + id)))
    }

    fn seq_drawable(id: u64, key: u64, version: u32, log: &EventLog) -> Rc<RenderUnit> {
        RenderUnit::builder(
            RenderUnitId(id),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(id)),
        )
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(key), version, log)))
        .build()
    }

    fn pair_layout(root: Rc<RenderUnit>, child: Rc<RenderUnit>) -> TestLayoutResult {
        TestLayoutResult::new(Some(root), Rect::new(0.0, 0.0, 200.0, 200.0)).child(
            TestLayoutResult::new(Some(child), Rect::new(0.0, 0.0, 50.0, 50.0)),
        )
    }

    fn tree_of(layout: &TestLayoutResult, generation: u64) -> Rc<RenderTree> {
        Rc::new(reduce(layout, SizeConstraints::default(), generation, &[]))
    }

    fn tracking(id: u64, log: &EventLog) -> Rc<dyn RenderCoreExtension> {
        Rc::new(TrackingExtension::new(ExtensionId(id), log))
    }

    fn preventing(id: u64, log: &EventLog) -> Rc<dyn RenderCoreExtension> {
        Rc::new(TrackingExtension::new(ExtensionId(id), log).prevent_mount())
    }

    #[test]
    fn mount_binds_fixed_then_optional_in_declaration_order() {
        let log = EventLog::default();
        let unit = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(1), 1, &log)))
        .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(2), 1, &log)))
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(11), 1, &log)))
        .build();
        let layout = pair_layout(view_unit(1), unit);
        let tree = tree_of(&layout, 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&tree).unwrap();
        assert_eq!(log.take(), ["bind 1v1", "bind 2v1", "bind 10v1", "bind 11v1"]);

        state.unmount_all_items().unwrap();
        assert_eq!(
            log.take(),
            ["unbind 11v1", "unbind 10v1", "unbind 2v1", "unbind 1v1"],
            "unmount reverses the full bind order"
        );
        assert_eq!(state.mount_item_count(), 0);
    }

    #[test]
    fn attach_and_detach_are_independent_of_mount() {
        let log = EventLog::default();
        let unit = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
        .attach_binder(Rc::new(SeqBinder::new(BinderKey(50), 1, &log)))
        .build();
        let layout = pair_layout(view_unit(1), unit);
        let tree = tree_of(&layout, 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&tree).unwrap();
        assert_eq!(log.take(), ["bind 10v1"], "attach binders wait for attach");

        state.attach().unwrap();
        assert!(state.is_attached());
        assert_eq!(log.take(), ["bind 50v1"]);
        state.attach().unwrap();
        assert!(log.take().is_empty(), "attach is idempotent");

        state.detach().unwrap();
        assert_eq!(log.take(), ["unbind 50v1"]);
        assert!(
            state.is_mounted(RenderUnitId(2)),
            "detach keeps the item mounted"
        );

        state.unmount_all_items().unwrap();
        assert_eq!(log.take(), ["unbind 10v1"]);
    }

    #[test]
    fn mounting_while_attached_binds_attach_binders_immediately() {
        let log = EventLog::default();
        let unit = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
        .attach_binder(Rc::new(SeqBinder::new(BinderKey(50), 1, &log)))
        .build();
        let layout = pair_layout(view_unit(1), unit);
        let tree = tree_of(&layout, 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.attach().unwrap();
        state.mount(&tree).unwrap();
        assert_eq!(log.take(), ["bind 10v1", "bind 50v1"]);
    }

    #[test]
    fn update_rebinds_only_changed_binders_and_carries_values() {
        let log = EventLog::default();
        let root = view_unit(1);
        let before = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(11), 7, &log)))
        .build();
        let after = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 2, &log)))
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(11), 7, &log)))
        .build();
        let t1 = tree_of(&pair_layout(root.clone(), before), 1);
        let t2 = tree_of(&pair_layout(root, after), 2);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&t1).unwrap();
        log.take();

        state.mount(&t2).unwrap();
        assert_eq!(
            log.take(),
            ["unbind 10v1", "bind 10v2"],
            "only the changed binder cycles"
        );

        state.unmount_all_items().unwrap();
        assert_eq!(
            log.take(),
            ["unbind 11v7", "unbind 10v2"],
            "the unchanged binder's bind value was carried over"
        );
    }

    #[test]
    fn update_unbinds_binders_removed_in_the_next_version() {
        let log = EventLog::default();
        let root = view_unit(1);
        let k10 = Rc::new(SeqBinder::new(BinderKey(10), 1, &log));
        let before = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(k10.clone())
        .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(11), 7, &log)))
        .build();
        let after = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(k10)
        .build();
        let t1 = tree_of(&pair_layout(root.clone(), before), 1);
        let t2 = tree_of(&pair_layout(root, after), 2);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&t1).unwrap();
        log.take();

        state.mount(&t2).unwrap();
        assert_eq!(log.take(), ["unbind 11v7"]);
    }

    #[test]
    fn reorder_only_changes_move_without_rebinding() {
        let log = EventLog::default();
        let root = view_unit(1);
        let a = seq_drawable(2, 10, 1, &log);
        let b = seq_drawable(3, 20, 1, &log);

        let t1 = tree_of(
            &TestLayoutResult::new(Some(root.clone()), Rect::new(0.0, 0.0, 200.0, 200.0))
                .child(TestLayoutResult::new(
                    Some(a.clone()),
                    Rect::new(0.0, 0.0, 50.0, 50.0),
                ))
                .child(TestLayoutResult::new(
                    Some(b.clone()),
                    Rect::new(0.0, 50.0, 50.0, 100.0),
                )),
            1,
        );
        let t2 = tree_of(
            &TestLayoutResult::new(Some(root), Rect::new(0.0, 0.0, 200.0, 200.0))
                .child(TestLayoutResult::new(
                    Some(b),
                    Rect::new(0.0, 50.0, 50.0, 100.0),
                ))
                .child(TestLayoutResult::new(
                    Some(a),
                    Rect::new(0.0, 0.0, 50.0, 50.0),
                )),
            2,
        );

        let root_content = TestContent::view(0);
        let mut state = MountState::new(ctx(), root_content.clone());
        state.mount(&t1).unwrap();
        log.take();

        state.mount(&t2).unwrap();
        assert!(log.take().is_empty(), "no unbind/bind on reorder");
        assert_eq!(state.mount_item_count(), 3);

        let host = root_content
            .as_any()
            .downcast_ref::<TestContent>()
            .unwrap();
        assert_eq!(host.move_count(), 2);
        let children = host.children();
        assert!(Rc::ptr_eq(
            &children[0],
            &state.content_for(RenderUnitId(3)).unwrap()
        ));
        assert!(Rc::ptr_eq(
            &children[1],
            &state.content_for(RenderUnitId(2)).unwrap()
        ));
    }

    #[test]
    fn departed_ids_unmount_in_reverse_mount_order() {
        let log = EventLog::default();
        let root = view_unit(1);
        let mut layout =
            TestLayoutResult::new(Some(root.clone()), Rect::new(0.0, 0.0, 200.0, 200.0));
        for id in 2..5 {
            layout = layout.child(TestLayoutResult::new(
                Some(test_unit(
                    id,
                    RenderType::Drawable,
                    Rc::new(TestAllocator::new(id)),
                )),
                Rect::new(0.0, 0.0, 10.0, 10.0),
            ));
        }
        let t1 = tree_of(&layout, 1);
        let t2 = tree_of(
            &TestLayoutResult::new(Some(root), Rect::new(0.0, 0.0, 200.0, 200.0)),
            2,
        );

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();
        state.mount(&t1).unwrap();
        log.take();

        state.mount(&t2).unwrap();
        let unmounts: Vec<String> = log
            .take()
            .into_iter()
            .filter(|e| e.contains("on_unmount_item"))
            .collect();
        assert_eq!(
            unmounts,
            [
                "e1 on_unmount_item 4",
                "e1 on_unmount_item 3",
                "e1 on_unmount_item 2"
            ]
        );
        assert_eq!(state.mount_item_count(), 1);
    }

    #[test]
    fn extension_callbacks_wrap_binder_calls() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();
        state.mount(&tree).unwrap();

        assert_eq!(
            log.take(),
            [
                "e1 before_mount",
                "e1 before_mount_item 1",
                "e1 on_mount_item 1",
                "e1 on_bind_item 1",
                "e1 bounds 1",
                "e1 before_mount_item 2",
                "bind 10v1",
                "e1 on_mount_item 2",
                "e1 on_bind_item 2",
                "e1 bounds 2",
                "e1 after_mount",
            ]
        );

        state.unmount_all_items().unwrap();
        assert_eq!(
            log.take(),
            [
                "e1 on_unmount",
                "e1 on_unbind_item 2",
                "unbind 10v1",
                "e1 on_unmount_item 2",
                "e1 on_unbind_item 1",
                "e1 on_unmount_item 1",
            ]
        );
    }

    #[test]
    fn prevent_mount_defers_new_items_until_acquired() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[preventing(1, &log)]).unwrap();
        state.mount(&tree).unwrap();

        assert_eq!(state.mount_item_count(), 1, "only the root mounted");
        assert_eq!(state.render_unit_count(), 2);
        assert!(!state.is_mounted(RenderUnitId(2)));

        log.take();
        state
            .acquire_mount_reference(ExtensionId(1), RenderUnitId(2), true)
            .unwrap();
        assert!(state.is_mounted(RenderUnitId(2)));
        assert!(log.take().contains(&String::from("bind 10v1")));

        state
            .release_mount_reference(ExtensionId(1), RenderUnitId(2), true)
            .unwrap();
        assert!(!state.is_mounted(RenderUnitId(2)), "transient release");
        assert_eq!(state.render_unit_count(), 2, "tree membership unchanged");
    }

    #[test]
    fn held_items_survive_leaving_the_tree_until_released() {
        let log = EventLog::default();
        let root = view_unit(1);
        let t1 = tree_of(&pair_layout(root.clone(), seq_drawable(2, 10, 1, &log)), 1);
        let solo = TestLayoutResult::new(Some(root), Rect::new(0.0, 0.0, 200.0, 200.0));
        let t2 = tree_of(&solo, 2);
        let t3 = tree_of(&solo, 3);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[preventing(1, &log)]).unwrap();
        state
            .acquire_mount_reference(ExtensionId(1), RenderUnitId(2), false)
            .unwrap();
        state.mount(&t1).unwrap();
        assert_eq!(state.mount_item_count(), 2);

        state.mount(&t2).unwrap();
        assert!(
            state.is_mounted(RenderUnitId(2)),
            "held item outlives the tree"
        );
        assert_eq!(state.render_unit_count(), 1);

        state
            .release_mount_reference(ExtensionId(1), RenderUnitId(2), false)
            .unwrap();
        assert!(state.is_mounted(RenderUnitId(2)), "unmount deferred");

        state.mount(&t3).unwrap();
        assert!(!state.is_mounted(RenderUnitId(2)));
        assert_eq!(state.mount_item_count(), 1);
    }

    #[test]
    fn release_all_notifies_never_mounted_holds_once() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[preventing(1, &log)]).unwrap();
        state.mount(&tree).unwrap();
        state
            .acquire_mount_reference(ExtensionId(1), RenderUnitId(2), false)
            .unwrap();
        assert!(!state.is_mounted(RenderUnitId(2)));
        log.take();

        state.release_all_acquired_references().unwrap();
        assert_eq!(log.take(), ["e1 on_unmount_item 2"]);

        state.release_all_acquired_references().unwrap();
        assert!(log.take().is_empty(), "idempotent");
    }

    #[test]
    fn unmount_all_items_is_idempotent() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();
        state.mount(&tree).unwrap();
        log.take();

        state.unmount_all_items().unwrap();
        assert_eq!(state.mount_item_count(), 0);
        assert!(state.current_tree().is_none());
        assert!(!log.take().is_empty());

        state.unmount_all_items().unwrap();
        assert!(log.take().is_empty(), "second teardown does nothing");
    }

    #[test]
    fn swapping_extensions_leaves_no_residual_callbacks() {
        let log = EventLog::default();
        let root = view_unit(1);
        let t1 = tree_of(&pair_layout(root.clone(), seq_drawable(2, 10, 1, &log)), 1);
        let t2 = tree_of(&pair_layout(root, seq_drawable(3, 20, 1, &log)), 2);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();
        state.mount(&t1).unwrap();
        log.take();

        state.register_extensions(&[tracking(2, &log)]).unwrap();
        assert_eq!(log.take(), ["e1 on_unmount"], "old set torn down");

        state.mount(&t2).unwrap();
        let events = log.take();
        assert!(
            events.iter().all(|e| !e.starts_with("e1 ")),
            "no callback reaches the old set: {events:?}"
        );
        assert!(events.iter().any(|e| e.starts_with("e2 ")));
    }

    #[test]
    fn unmounted_content_is_pooled_and_reused() {
        let log = EventLog::default();
        let allocator = Rc::new(TestAllocator::new(5));
        let root = view_unit(1);
        let unit = RenderUnit::builder(RenderUnitId(2), RenderType::Drawable, allocator.clone())
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
            .build();
        let t1 = tree_of(&pair_layout(root.clone(), unit.clone()), 1);
        let t2 = tree_of(&pair_layout(root, unit), 2);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&t1).unwrap();
        let first = state.content_for(RenderUnitId(2)).unwrap();
        assert_eq!(allocator.created_count(), 1);

        state.unmount_all_items().unwrap();
        state.mount(&t2).unwrap();
        assert_eq!(allocator.created_count(), 1, "content came from the pool");
        assert!(Rc::ptr_eq(
            &first,
            &state.content_for(RenderUnitId(2)).unwrap()
        ));
    }

    #[test]
    fn disabled_pooling_always_creates_fresh_content() {
        let allocator = Rc::new(TestAllocator::new(5).with_policy(PoolingPolicy::Disabled));
        let root = view_unit(1);
        let unit = test_unit(2, RenderType::Drawable, allocator.clone());
        let t1 = tree_of(&pair_layout(root.clone(), unit.clone()), 1);
        let t2 = tree_of(&pair_layout(root, unit), 2);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&t1).unwrap();
        state.unmount_all_items().unwrap();
        state.mount(&t2).unwrap();
        assert_eq!(allocator.created_count(), 2);
    }

    #[test]
    fn nested_scope_roots_are_not_recycled() {
        #[derive(Debug)]
        struct NestedAllocator;
        impl ContentAllocator for NestedAllocator {
            fn id(&self) -> AllocatorId {
                AllocatorId(77)
            }
            fn create(&self, _ctx: &PlatformContext) -> Content {
                TestContent::nested_scope(77)
            }
        }

        let root = view_unit(1);
        let unit = test_unit(2, RenderType::View, Rc::new(NestedAllocator));
        let tree = tree_of(&pair_layout(root, unit), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&tree).unwrap();
        state.unmount_all_items().unwrap();

        let scope = state.context().scope();
        assert_eq!(state.pools_mut().pooled_len(scope, &NestedAllocator), 0);
    }

    #[test]
    fn bind_failures_carry_unit_and_binder_context() {
        let unit = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .description("badge")
        .optional_mount_binder(Rc::new(FailBinder::new(BinderKey(10))))
        .build();
        let tree = tree_of(&pair_layout(view_unit(1), unit), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        let err = state.mount(&tree).unwrap_err();
        assert!(matches!(err, MountError::Bind { .. }));
        let msg = alloc::string::ToString::to_string(&err);
        assert!(msg.contains("badge"), "{msg}");
        assert!(msg.contains("failing binder"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[test]
    fn unbind_failures_wrap_unit_and_binder_context() {
        let unit = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .description("badge")
        .optional_mount_binder(Rc::new(FailBinder::fail_unbind(BinderKey(10))))
        .build();
        let tree = tree_of(&pair_layout(view_unit(1), unit), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&tree).unwrap();
        let err = state.unmount_all_items().unwrap_err();
        assert!(matches!(err, MountError::Unbind { .. }));
        let msg = alloc::string::ToString::to_string(&err);
        assert!(msg.contains("badge"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[test]
    #[should_panic(expected = "not a host")]
    fn mounting_under_non_host_content_panics() {
        let root = view_unit(1);
        let mid = test_unit(2, RenderType::View, Rc::new(TestAllocator::non_host(7)));
        let leaf = test_unit(3, RenderType::Drawable, Rc::new(TestAllocator::new(8)));
        let layout = TestLayoutResult::new(Some(root), Rect::new(0.0, 0.0, 200.0, 200.0)).child(
            TestLayoutResult::new(Some(mid), Rect::new(0.0, 0.0, 100.0, 100.0)).child(
                TestLayoutResult::new(Some(leaf), Rect::new(0.0, 0.0, 10.0, 10.0)),
            ),
        );
        let tree = tree_of(&layout, 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        let _ = state.mount(&tree);
    }

    #[test]
    #[should_panic(expected = "fixed mount binder count")]
    fn changing_fixed_binder_count_across_versions_panics() {
        let log = EventLog::default();
        let root = view_unit(1);
        let before = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(1), 1, &log)))
        .build();
        let after = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(1), 1, &log)))
        .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(2), 1, &log)))
        .build();
        let t1 = tree_of(&pair_layout(root.clone(), before), 1);
        let t2 = tree_of(&pair_layout(root, after), 2);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&t1).unwrap();
        let _ = state.mount(&t2);
    }

    #[test]
    fn notify_unmount_and_mount_keep_unit_count_stable() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&tree).unwrap();

        state.notify_unmount(RenderUnitId(2)).unwrap();
        assert_eq!(state.mount_item_count(), 1);
        assert_eq!(state.render_unit_count(), 2);
        assert!(!state.is_mounted(RenderUnitId(2)));

        state.notify_mount(RenderUnitId(2)).unwrap();
        assert_eq!(state.mount_item_count(), 2);
        assert!(state.is_mounted(RenderUnitId(2)));
    }

    #[test]
    fn bounds_changes_apply_without_rebinding() {
        let log = EventLog::default();
        let root = view_unit(1);
        let binder = Rc::new(SeqBinder::new(BinderKey(10), 1, &log));
        let unit = RenderUnit::builder(
            RenderUnitId(2),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(9)),
        )
        .optional_mount_binder(binder)
        .build();
        let t1 = tree_of(
            &TestLayoutResult::new(Some(root.clone()), Rect::new(0.0, 0.0, 200.0, 200.0)).child(
                TestLayoutResult::new(Some(unit.clone()), Rect::new(0.0, 0.0, 50.0, 50.0)),
            ),
            1,
        );
        let t2 = tree_of(
            &TestLayoutResult::new(Some(root), Rect::new(0.0, 0.0, 200.0, 200.0)).child(
                TestLayoutResult::new(Some(unit), Rect::new(10.0, 10.0, 60.0, 60.0)),
            ),
            2,
        );

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();
        state.mount(&t1).unwrap();
        log.take();

        state.mount(&t2).unwrap();
        let events = log.take();
        assert!(
            events
                .iter()
                .all(|e| !e.starts_with("bind") && !e.starts_with("unbind")),
            "no binder churn: {events:?}"
        );
        assert!(events.contains(&String::from("e1 bounds 2")));

        let content = state.content_for(RenderUnitId(2)).unwrap();
        let content = content.as_any().downcast_ref::<TestContent>().unwrap();
        assert_eq!(content.bounds(), Some(Rect::new(10.0, 10.0, 60.0, 60.0)));
    }

    #[test]
    fn mounting_the_same_tree_again_is_a_noop() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();
        state.mount(&tree).unwrap();
        log.take();

        state.mount(&tree).unwrap();
        assert!(log.take().is_empty());
    }

    #[test]
    fn visible_bounds_reach_viewport_extensions() {
        let log = EventLog::default();
        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.register_extensions(&[tracking(1, &log)]).unwrap();

        state.set_visible_bounds(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(log.take(), ["e1 visible_bounds"]);
    }

    #[test]
    #[should_panic(expected = "stale MountItemId")]
    fn stale_item_handles_panic() {
        let log = EventLog::default();
        let tree = tree_of(&pair_layout(view_unit(1), seq_drawable(2, 10, 1, &log)), 1);

        let mut state = MountState::new(ctx(), TestContent::view(0));
        state.mount(&tree).unwrap();
        let handle = state.item_handle(RenderUnitId(2)).unwrap();
        state.notify_unmount(RenderUnitId(2)).unwrap();
        let _ = state.item_at(handle);
    }
}
