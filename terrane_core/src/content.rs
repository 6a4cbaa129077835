// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contract with the platform view/drawable layer.
//!
//! The core never names concrete platform types. It mounts and unmounts
//! values behind [`MountContent`], asks hosts for child management via
//! [`HostContent`], and allocates fresh content through a
//! [`ContentAllocator`]. Platform integrations implement these traits; test
//! doubles implement them in `terrane_harness`.
//!
//! Content is shared as `Rc<dyn MountContent>` (see [`Content`]) and must
//! only be touched from the single mount-owner thread.

use alloc::rc::Rc;
use core::any::Any;
use core::fmt;

use kurbo::Rect;

use crate::pool::PoolingPolicy;

/// Shared handle to one piece of platform content.
pub type Content = Rc<dyn MountContent>;

/// One mountable piece of platform content (a view, a drawable, a layer).
///
/// Implementations use interior mutability where mounting requires state;
/// all calls arrive on the mount-owner thread.
pub trait MountContent: fmt::Debug {
    /// Downcasting access for binders and extensions.
    fn as_any(&self) -> &dyn Any;

    /// Returns the host capability if this content can parent mounted
    /// children. Content without this capability causes a fatal error when
    /// the render tree asks it to host.
    fn as_host(&self) -> Option<&dyn HostContent> {
        None
    }

    /// Applies host-relative bounds to the content.
    fn set_bounds(&self, _bounds: Rect) {}

    /// Whether this content is the root of an independently-owned nested
    /// mount scope. The outer mount pass treats such content as opaque and
    /// never reaches into it.
    fn is_nested_scope_root(&self) -> bool {
        false
    }

    /// Short content-type name used in diagnostics.
    fn type_name(&self) -> &'static str;
}

/// Child management for content that hosts other mounted content.
///
/// Positions are host-relative indices assigned by reduction. `unmount_child`
/// and `move_child` always receive the same child handle that was passed to
/// `mount_child`.
pub trait HostContent {
    /// Inserts `child` at `position`.
    fn mount_child(&self, position: u32, child: &Content);

    /// Removes `child`, last mounted at `position`.
    fn unmount_child(&self, position: u32, child: &Content);

    /// Moves an already-mounted `child` from `from` to `to`.
    fn move_child(&self, child: &Content, from: u32, to: u32);
}

/// Stable identity of a content allocator, used as the pooling key.
///
/// Two allocators that produce interchangeable content must share an id;
/// pooled content is recycled across render units with the same allocator id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocatorId(pub u64);

impl fmt::Debug for AllocatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllocatorId({})", self.0)
    }
}

/// Creates platform content for render units and configures its pooling.
pub trait ContentAllocator: fmt::Debug {
    /// Stable pooling identity for the content this allocator produces.
    fn id(&self) -> AllocatorId;

    /// Allocates fresh content. Called when the pool has nothing to offer.
    fn create(&self, ctx: &PlatformContext) -> Content;

    /// Capacity of the pool for this content type.
    fn pool_size(&self) -> usize {
        DEFAULT_POOL_SIZE
    }

    /// Recycling policy for this content type.
    fn pooling_policy(&self) -> PoolingPolicy {
        PoolingPolicy::Default
    }
}

/// Default [`ContentAllocator::pool_size`].
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Identifies a platform scope (activity, service, window) whose lifecycle
/// owns pooled content. Destroying a scope evicts only its pools.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScopeId(pub u32);

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

/// Opaque platform context threaded through content allocation and binders.
///
/// Core only interprets the owning [`ScopeId`]; the payload is for platform
/// integrations and binders to downcast.
#[derive(Clone)]
pub struct PlatformContext {
    scope: ScopeId,
    payload: Option<Rc<dyn Any>>,
}

impl fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformContext")
            .field("scope", &self.scope)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl PlatformContext {
    /// Creates a context owned by `scope` with no payload.
    #[must_use]
    pub fn new(scope: ScopeId) -> Self {
        Self {
            scope,
            payload: None,
        }
    }

    /// Creates a context owned by `scope` carrying a platform payload.
    #[must_use]
    pub fn with_payload(scope: ScopeId, payload: Rc<dyn Any>) -> Self {
        Self {
            scope,
            payload: Some(payload),
        }
    }

    /// The scope that owns content allocated under this context.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The platform payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Rc<dyn Any>> {
        self.payload.as_ref()
    }
}
