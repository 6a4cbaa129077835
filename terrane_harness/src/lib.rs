// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles for the terrane mount pipeline.
//!
//! Everything here exists to make `terrane_core`'s tests observable:
//! [`TestContent`] stands in for platform views and drawables,
//! [`SeqBinder`] and [`FailBinder`] exercise the binder protocol,
//! [`TestLayoutResult`] builds layout trees by hand, and
//! [`TrackingExtension`] records every extension callback into a shared
//! [`EventLog`] so tests can assert exact call interleavings.

#![no_std]

extern crate alloc;

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::cell::{Cell, RefCell};

use kurbo::Rect;
use terrane_core::content::{
    AllocatorId, Content, ContentAllocator, HostContent, MountContent, PlatformContext,
};
use terrane_core::extension::{
    ExtensionId, ExtensionState, MountExtension, RenderCoreExtension, VisibleBoundsCallbacks,
};
use terrane_core::pool::PoolingPolicy;
use terrane_core::reduce::LayoutResult;
use terrane_core::tree::{RenderTree, RenderTreeNode};
use terrane_core::unit::{
    BindError, BindValue, BinderKey, LayoutData, MountBinder, RenderType, RenderUnit, RenderUnitId,
};

/// A shared, ordered log of string events.
///
/// Clones share the same underlying log, so a test can hand the log to any
/// number of binders and extensions and read back one merged sequence.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    /// Appends one event.
    pub fn record(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    /// A snapshot of all events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Drains and returns all events recorded so far.
    pub fn take(&self) -> Vec<String> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// Discards all recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// A binder whose model is a plain version number.
///
/// Binding logs `bind {key}v{version}` and yields the version as the bind
/// value; unbinding logs `unbind {key}v{bound}` with the value it was handed
/// back, which makes carried-over bind values visible in the log. Two
/// `SeqBinder`s with the same key report an update only when their versions
/// differ.
#[derive(Debug)]
pub struct SeqBinder {
    key: BinderKey,
    version: u32,
    log: EventLog,
}

impl SeqBinder {
    /// Creates a binder with the given key and model version.
    #[must_use]
    pub fn new(key: BinderKey, version: u32, log: &EventLog) -> Self {
        Self {
            key,
            version,
            log: log.clone(),
        }
    }

    /// The model version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl MountBinder for SeqBinder {
    fn key(&self) -> BinderKey {
        self.key
    }

    fn description(&self) -> &str {
        "seq binder"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn should_update(
        &self,
        next: &dyn MountBinder,
        _current_layout: Option<&LayoutData>,
        _next_layout: Option<&LayoutData>,
    ) -> bool {
        next.as_any()
            .downcast_ref::<Self>()
            .is_none_or(|next| next.version != self.version)
    }

    fn bind(
        &self,
        _ctx: &PlatformContext,
        _content: &Content,
        _layout: Option<&LayoutData>,
    ) -> Result<BindValue, BindError> {
        self.log
            .record(format!("bind {}v{}", self.key.0, self.version));
        Ok(alloc::boxed::Box::new(self.version))
    }

    fn unbind(
        &self,
        _ctx: &PlatformContext,
        _content: &Content,
        _layout: Option<&LayoutData>,
        bound: BindValue,
    ) -> Result<(), BindError> {
        let bound = bound
            .downcast::<u32>()
            .map_err(|_| BindError::new("seq binder handed a foreign bind value"))?;
        self.log.record(format!("unbind {}v{}", self.key.0, bound));
        Ok(())
    }
}

/// A binder that fails on demand, for exercising error wrapping.
#[derive(Debug)]
pub struct FailBinder {
    key: BinderKey,
    fail_on_unbind: bool,
}

impl FailBinder {
    /// A binder whose `bind` always fails.
    #[must_use]
    pub fn new(key: BinderKey) -> Self {
        Self {
            key,
            fail_on_unbind: false,
        }
    }

    /// A binder that binds fine but whose `unbind` always fails.
    #[must_use]
    pub fn fail_unbind(key: BinderKey) -> Self {
        Self {
            key,
            fail_on_unbind: true,
        }
    }
}

impl MountBinder for FailBinder {
    fn key(&self) -> BinderKey {
        self.key
    }

    fn description(&self) -> &str {
        "failing binder"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn should_update(
        &self,
        _next: &dyn MountBinder,
        _current_layout: Option<&LayoutData>,
        _next_layout: Option<&LayoutData>,
    ) -> bool {
        false
    }

    fn bind(
        &self,
        _ctx: &PlatformContext,
        _content: &Content,
        _layout: Option<&LayoutData>,
    ) -> Result<BindValue, BindError> {
        if self.fail_on_unbind {
            Ok(alloc::boxed::Box::new(()))
        } else {
            Err(BindError::new("boom"))
        }
    }

    fn unbind(
        &self,
        _ctx: &PlatformContext,
        _content: &Content,
        _layout: Option<&LayoutData>,
        _bound: BindValue,
    ) -> Result<(), BindError> {
        if self.fail_on_unbind {
            Err(BindError::new("boom"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    View,
    Drawable,
    NestedScope,
}

/// In-memory stand-in for platform content.
///
/// Views are hosts that keep their mounted children in order; drawables are
/// leaves; nested-scope roots flag themselves as opaque sub-hierarchies.
/// Bounds and child moves are recorded for assertions.
#[derive(Debug)]
pub struct TestContent {
    id: u64,
    kind: Kind,
    bounds: Cell<Option<Rect>>,
    children: RefCell<Vec<Content>>,
    moves: Cell<u32>,
}

impl TestContent {
    fn make(id: u64, kind: Kind) -> Content {
        Rc::new(Self {
            id,
            kind,
            bounds: Cell::new(None),
            children: RefCell::new(Vec::new()),
            moves: Cell::new(0),
        })
    }

    /// Host-capable view content.
    #[must_use]
    pub fn view(id: u64) -> Content {
        Self::make(id, Kind::View)
    }

    /// Leaf drawable content without the host capability.
    #[must_use]
    pub fn drawable(id: u64) -> Content {
        Self::make(id, Kind::Drawable)
    }

    /// Content that owns an independent nested mount scope.
    #[must_use]
    pub fn nested_scope(id: u64) -> Content {
        Self::make(id, Kind::NestedScope)
    }

    /// The id this content was created with.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The last bounds applied via `set_bounds`, if any.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds.get()
    }

    /// The currently mounted children, in host order.
    #[must_use]
    pub fn children(&self) -> Vec<Content> {
        self.children.borrow().clone()
    }

    /// How many times `move_child` ran on this host.
    #[must_use]
    pub fn move_count(&self) -> u32 {
        self.moves.get()
    }
}

impl MountContent for TestContent {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_host(&self) -> Option<&dyn HostContent> {
        match self.kind {
            Kind::View => Some(self),
            Kind::Drawable | Kind::NestedScope => None,
        }
    }

    fn set_bounds(&self, bounds: Rect) {
        self.bounds.set(Some(bounds));
    }

    fn is_nested_scope_root(&self) -> bool {
        self.kind == Kind::NestedScope
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            Kind::View => "test view",
            Kind::Drawable => "test drawable",
            Kind::NestedScope => "nested scope root",
        }
    }
}

impl HostContent for TestContent {
    fn mount_child(&self, position: u32, child: &Content) {
        let mut children = self.children.borrow_mut();
        let at = (position as usize).min(children.len());
        children.insert(at, child.clone());
    }

    fn unmount_child(&self, _position: u32, child: &Content) {
        let mut children = self.children.borrow_mut();
        if let Some(at) = children.iter().position(|c| Rc::ptr_eq(c, child)) {
            children.remove(at);
        }
    }

    fn move_child(&self, child: &Content, _from: u32, to: u32) {
        let mut children = self.children.borrow_mut();
        if let Some(at) = children.iter().position(|c| Rc::ptr_eq(c, child)) {
            let content = children.remove(at);
            let to = (to as usize).min(children.len());
            children.insert(to, content);
        }
        self.moves.set(self.moves.get() + 1);
    }
}

/// Allocator producing [`TestContent`], counting every fresh creation.
///
/// The created count distinguishes pool hits from allocations.
#[derive(Debug)]
pub struct TestAllocator {
    id: AllocatorId,
    host: bool,
    pool_size: usize,
    policy: PoolingPolicy,
    created: Cell<u32>,
}

impl TestAllocator {
    /// An allocator of host-capable view content.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id: AllocatorId(id),
            host: true,
            pool_size: terrane_core::content::DEFAULT_POOL_SIZE,
            policy: PoolingPolicy::Default,
            created: Cell::new(0),
        }
    }

    /// An allocator of leaf content without the host capability.
    #[must_use]
    pub fn non_host(id: u64) -> Self {
        Self {
            host: false,
            ..Self::new(id)
        }
    }

    /// Overrides the pool capacity.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Overrides the pooling policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PoolingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// How many pieces of content this allocator created from scratch.
    #[must_use]
    pub fn created_count(&self) -> u32 {
        self.created.get()
    }
}

impl ContentAllocator for TestAllocator {
    fn id(&self) -> AllocatorId {
        self.id
    }

    fn create(&self, _ctx: &PlatformContext) -> Content {
        self.created.set(self.created.get() + 1);
        if self.host {
            TestContent::view(self.id.0)
        } else {
            TestContent::drawable(self.id.0)
        }
    }

    fn pool_size(&self) -> usize {
        self.pool_size
    }

    fn pooling_policy(&self) -> PoolingPolicy {
        self.policy
    }
}

/// Builds a render unit with no binders.
#[must_use]
pub fn test_unit(
    id: u64,
    render_type: RenderType,
    allocator: Rc<dyn ContentAllocator>,
) -> Rc<RenderUnit> {
    RenderUnit::builder(RenderUnitId(id), render_type, allocator).build()
}

/// Hand-built layout-result tree node.
#[derive(Debug)]
pub struct TestLayoutResult {
    unit: Option<Rc<RenderUnit>>,
    bounds: Rect,
    children: Vec<TestLayoutResult>,
}

impl TestLayoutResult {
    /// A result with the given unit (if it mounts anything) and
    /// parent-relative bounds.
    #[must_use]
    pub fn new(unit: Option<Rc<RenderUnit>>, bounds: Rect) -> Self {
        Self {
            unit,
            bounds,
            children: Vec::new(),
        }
    }

    /// Appends a child result.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

impl LayoutResult for TestLayoutResult {
    fn render_unit(&self) -> Option<Rc<RenderUnit>> {
        self.unit.clone()
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child_at(&self, index: usize) -> &dyn LayoutResult {
        &self.children[index]
    }
}

/// An extension that records every callback it receives into an
/// [`EventLog`], prefixed with `e{id}`.
#[derive(Debug)]
pub struct TrackingExtension {
    id: ExtensionId,
    log: EventLog,
    prevent: bool,
}

impl TrackingExtension {
    /// A tracking extension without the prevent-mount capability.
    #[must_use]
    pub fn new(id: ExtensionId, log: &EventLog) -> Self {
        Self {
            id,
            log: log.clone(),
            prevent: false,
        }
    }

    /// Grants the prevent-mount capability.
    #[must_use]
    pub fn prevent_mount(mut self) -> Self {
        self.prevent = true;
        self
    }
}

impl RenderCoreExtension for TrackingExtension {
    fn id(&self) -> ExtensionId {
        self.id
    }

    fn description(&self) -> &str {
        "tracking extension"
    }

    fn mount_extension(&self) -> Option<&dyn MountExtension> {
        Some(self)
    }

    fn visible_bounds_callbacks(&self) -> Option<&dyn VisibleBoundsCallbacks> {
        Some(self)
    }
}

impl MountExtension for TrackingExtension {
    fn can_prevent_mount(&self) -> bool {
        self.prevent
    }

    fn before_mount(&self, _state: &mut ExtensionState, _tree: &RenderTree) {
        self.log.record(format!("e{} before_mount", self.id.0));
    }

    fn after_mount(&self, _state: &mut ExtensionState) {
        self.log.record(format!("e{} after_mount", self.id.0));
    }

    fn before_mount_item(&self, _state: &mut ExtensionState, node: &RenderTreeNode) {
        self.log.record(format!(
            "e{} before_mount_item {}",
            self.id.0,
            node.unit().id().0
        ));
    }

    fn on_mount_item(&self, _state: &mut ExtensionState, node: &RenderTreeNode, _content: &Content) {
        self.log.record(format!(
            "e{} on_mount_item {}",
            self.id.0,
            node.unit().id().0
        ));
    }

    fn on_bind_item(&self, _state: &mut ExtensionState, node: &RenderTreeNode, _content: &Content) {
        self.log.record(format!(
            "e{} on_bind_item {}",
            self.id.0,
            node.unit().id().0
        ));
    }

    fn on_unbind_item(&self, _state: &mut ExtensionState, id: RenderUnitId, _content: &Content) {
        self.log
            .record(format!("e{} on_unbind_item {}", self.id.0, id.0));
    }

    fn on_unmount_item(&self, _state: &mut ExtensionState, id: RenderUnitId) {
        self.log
            .record(format!("e{} on_unmount_item {}", self.id.0, id.0));
    }

    fn on_bounds_applied_to_item(
        &self,
        _state: &mut ExtensionState,
        node: &RenderTreeNode,
        _content: &Content,
    ) {
        self.log
            .record(format!("e{} bounds {}", self.id.0, node.unit().id().0));
    }

    fn on_unmount(&self, _state: &mut ExtensionState) {
        self.log.record(format!("e{} on_unmount", self.id.0));
    }
}

impl VisibleBoundsCallbacks for TrackingExtension {
    fn on_visible_bounds_changed(&self, _state: &mut ExtensionState, _visible_bounds: Rect) {
        self.log.record(format!("e{} visible_bounds", self.id.0));
    }
}
