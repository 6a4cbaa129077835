// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render units and the three-phase binder protocol.
//!
//! A [`RenderUnit`] is the immutable descriptor of one mountable content
//! item: a stable id, a [`RenderType`], a [`ContentAllocator`], and three
//! ordered binder lists:
//!
//! - **Fixed mount binders** — bound on mount, never diffed across tree
//!   versions. Two versions of the same unit id must carry the same number
//!   of fixed binders.
//! - **Optional mount binders** — bound on mount, keyed by [`BinderKey`] for
//!   deduplication and update pairing.
//! - **Attach binders** — bound on attach/window-visibility, independent of
//!   the mount phase.
//!
//! Adding a second optional-mount or attach binder with the same key
//! silently replaces the earlier one; the later registration wins. This
//! mirrors the historical behavior of the system this engine models and is
//! pinned by tests rather than hardened into an error.
//!
//! # Ordering
//!
//! Mount binds fixed binders first, then optional binders, each in
//! declaration order. Unmount unbinds optional binders in reverse, then
//! fixed binders in reverse. Attach/detach treat the attach list the same
//! way, independently of mount state.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use thiserror::Error;

use crate::content::{Content, ContentAllocator, PlatformContext};

/// Stable numeric id of a render unit, unique within one render tree.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderUnitId(pub u64);

impl fmt::Debug for RenderUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderUnitId({})", self.0)
    }
}

/// What kind of platform content a render unit mounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderType {
    /// Content that can participate in the platform view hierarchy and may
    /// host children.
    View,
    /// Flat drawable content; never a host.
    Drawable,
}

/// Explicit stable identity of a binder implementation.
///
/// Used instead of runtime type identity so that the
/// replace-on-duplicate-key policy is explicit and testable. Binder
/// implementations conventionally expose an associated `KEY` constant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinderKey(pub u64);

impl fmt::Debug for BinderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinderKey({})", self.0)
    }
}

/// Opaque per-binder state returned by `bind` and handed back to the
/// matching `unbind`.
pub type BindValue = Box<dyn Any>;

/// Opaque layout payload attached to a render tree node and passed through
/// to binders.
pub type LayoutData = Rc<dyn Any>;

/// Error produced inside a binder's `bind` or `unbind`.
///
/// The mount engine wraps these with the owning unit's and binder's
/// descriptions before propagating; they are never swallowed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BindError {
    /// Human-readable failure description.
    pub message: String,
}

impl BindError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One independently bindable behavior attached to a render unit.
///
/// A binder carries its own model; `should_update` compares that model
/// against the next version's binder (same [`BinderKey`]) to decide whether
/// the binder must be unbound and rebound on update. Binders present in
/// both versions with `should_update == false` stay bound and their
/// [`BindValue`] is carried over unchanged.
pub trait MountBinder: fmt::Debug {
    /// Stable key for deduplication and update pairing.
    fn key(&self) -> BinderKey;

    /// Short description used in error wrapping and diagnostics.
    fn description(&self) -> &str {
        "binder"
    }

    /// Downcasting access so `should_update` can inspect the next binder's
    /// model.
    fn as_any(&self) -> &dyn Any;

    /// Whether the transition from `self` to `next` requires an
    /// unbind/rebind cycle.
    fn should_update(
        &self,
        next: &dyn MountBinder,
        current_layout: Option<&LayoutData>,
        next_layout: Option<&LayoutData>,
    ) -> bool;

    /// Applies this binder's behavior to `content`.
    fn bind(
        &self,
        ctx: &PlatformContext,
        content: &Content,
        layout: Option<&LayoutData>,
    ) -> Result<BindValue, BindError>;

    /// Removes this binder's behavior from `content`. `bound` is exactly the
    /// value the matching `bind` returned.
    fn unbind(
        &self,
        ctx: &PlatformContext,
        content: &Content,
        layout: Option<&LayoutData>,
        bound: BindValue,
    ) -> Result<(), BindError>;
}

/// Immutable descriptor of one mountable content item.
///
/// Constructed once when a component or primitive is resolved, then shared
/// by reference into render trees. Units are compared by
/// [`id`](Self::id) across tree versions to decide update versus recreate.
pub struct RenderUnit {
    id: RenderUnitId,
    render_type: RenderType,
    description: String,
    allocator: Rc<dyn ContentAllocator>,
    fixed_mount_binders: Vec<Rc<dyn MountBinder>>,
    optional_mount_binders: Vec<Rc<dyn MountBinder>>,
    attach_binders: Vec<Rc<dyn MountBinder>>,
}

impl fmt::Debug for RenderUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderUnit")
            .field("id", &self.id)
            .field("render_type", &self.render_type)
            .field("description", &self.description)
            .field("fixed_mount_binders", &self.fixed_mount_binders.len())
            .field("optional_mount_binders", &self.optional_mount_binders.len())
            .field("attach_binders", &self.attach_binders.len())
            .finish()
    }
}

impl RenderUnit {
    /// Starts building a unit with the given id, type, and allocator.
    #[must_use]
    pub fn builder(
        id: RenderUnitId,
        render_type: RenderType,
        allocator: Rc<dyn ContentAllocator>,
    ) -> RenderUnitBuilder {
        RenderUnitBuilder {
            id,
            render_type,
            description: String::new(),
            allocator,
            fixed_mount_binders: Vec::new(),
            optional_mount_binders: Vec::new(),
            attach_binders: Vec::new(),
        }
    }

    /// The unit's stable id.
    #[must_use]
    pub fn id(&self) -> RenderUnitId {
        self.id
    }

    /// Whether this unit mounts view or drawable content.
    #[must_use]
    pub fn render_type(&self) -> RenderType {
        self.render_type
    }

    /// Diagnostic description (conventionally the component/content name).
    #[must_use]
    pub fn description(&self) -> &str {
        if self.description.is_empty() {
            "render unit"
        } else {
            &self.description
        }
    }

    /// The allocator producing this unit's content.
    #[must_use]
    pub fn allocator(&self) -> &Rc<dyn ContentAllocator> {
        &self.allocator
    }

    /// Fixed mount binders, in declaration order.
    #[must_use]
    pub fn fixed_mount_binders(&self) -> &[Rc<dyn MountBinder>] {
        &self.fixed_mount_binders
    }

    /// Optional mount binders, in declaration order after deduplication.
    #[must_use]
    pub fn optional_mount_binders(&self) -> &[Rc<dyn MountBinder>] {
        &self.optional_mount_binders
    }

    /// Attach binders, in declaration order after deduplication.
    #[must_use]
    pub fn attach_binders(&self) -> &[Rc<dyn MountBinder>] {
        &self.attach_binders
    }

    /// Finds the optional mount binder with the given key.
    #[must_use]
    pub fn optional_mount_binder(&self, key: BinderKey) -> Option<&Rc<dyn MountBinder>> {
        self.optional_mount_binders.iter().find(|b| b.key() == key)
    }

    /// Finds the attach binder with the given key.
    #[must_use]
    pub fn attach_binder(&self, key: BinderKey) -> Option<&Rc<dyn MountBinder>> {
        self.attach_binders.iter().find(|b| b.key() == key)
    }
}

/// Builder for [`RenderUnit`].
pub struct RenderUnitBuilder {
    id: RenderUnitId,
    render_type: RenderType,
    description: String,
    allocator: Rc<dyn ContentAllocator>,
    fixed_mount_binders: Vec<Rc<dyn MountBinder>>,
    optional_mount_binders: Vec<Rc<dyn MountBinder>>,
    attach_binders: Vec<Rc<dyn MountBinder>>,
}

impl fmt::Debug for RenderUnitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderUnitBuilder")
            .field("id", &self.id)
            .field("render_type", &self.render_type)
            .finish_non_exhaustive()
    }
}

impl RenderUnitBuilder {
    /// Sets the diagnostic description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a fixed mount binder. Fixed binders are positional; no
    /// deduplication applies.
    #[must_use]
    pub fn fixed_mount_binder(mut self, binder: Rc<dyn MountBinder>) -> Self {
        self.fixed_mount_binders.push(binder);
        self
    }

    /// Adds an optional mount binder. A binder with the same key already
    /// present is silently replaced; the later registration wins and takes
    /// the later declaration position.
    #[must_use]
    pub fn optional_mount_binder(mut self, binder: Rc<dyn MountBinder>) -> Self {
        replace_by_key(&mut self.optional_mount_binders, binder);
        self
    }

    /// Adds an attach binder with the same replace-on-duplicate-key policy
    /// as [`optional_mount_binder`](Self::optional_mount_binder).
    #[must_use]
    pub fn attach_binder(mut self, binder: Rc<dyn MountBinder>) -> Self {
        replace_by_key(&mut self.attach_binders, binder);
        self
    }

    /// Finishes the unit.
    #[must_use]
    pub fn build(self) -> Rc<RenderUnit> {
        Rc::new(RenderUnit {
            id: self.id,
            render_type: self.render_type,
            description: self.description,
            allocator: self.allocator,
            fixed_mount_binders: self.fixed_mount_binders,
            optional_mount_binders: self.optional_mount_binders,
            attach_binders: self.attach_binders,
        })
    }
}

fn replace_by_key(binders: &mut Vec<Rc<dyn MountBinder>>, binder: Rc<dyn MountBinder>) {
    let key = binder.key();
    binders.retain(|b| b.key() != key);
    binders.push(binder);
}

#[cfg(test)]
mod tests {
    use crate::terrane_harness::{EventLog, SeqBinder, TestAllocator};

    use super::*;

    fn unit_builder(id: u64) -> RenderUnitBuilder {
        RenderUnit::builder(
            RenderUnitId(id),
            RenderType::Drawable,
            Rc::new(TestAllocator::new(1)),
        )
    }

    #[test]
    fn builder_preserves_declaration_order() {
        let log = EventLog::default();
        let unit = unit_builder(1)
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 0, &log)))
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(20), 0, &log)))
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(30), 0, &log)))
            .build();

        let keys: alloc::vec::Vec<_> = unit
            .optional_mount_binders()
            .iter()
            .map(|b| b.key())
            .collect();
        assert_eq!(keys, [BinderKey(10), BinderKey(20), BinderKey(30)]);
    }

    #[test]
    fn duplicate_optional_binder_key_replaces() {
        let log = EventLog::default();
        let first = Rc::new(SeqBinder::new(BinderKey(10), 1, &log));
        let second = Rc::new(SeqBinder::new(BinderKey(10), 2, &log));
        let unit = unit_builder(1)
            .optional_mount_binder(first)
            .optional_mount_binder(second.clone())
            .build();

        // Silent last-wins replacement, not an error.
        assert_eq!(unit.optional_mount_binders().len(), 1);
        let kept = unit.optional_mount_binder(BinderKey(10)).unwrap();
        let kept = kept.as_any().downcast_ref::<SeqBinder>().unwrap();
        assert_eq!(kept.version(), 2, "later registration wins");
    }

    #[test]
    fn duplicate_attach_binder_key_replaces() {
        let log = EventLog::default();
        let unit = unit_builder(1)
            .attach_binder(Rc::new(SeqBinder::new(BinderKey(5), 1, &log)))
            .attach_binder(Rc::new(SeqBinder::new(BinderKey(5), 7, &log)))
            .build();

        assert_eq!(unit.attach_binders().len(), 1);
        let kept = unit.attach_binder(BinderKey(5)).unwrap();
        let kept = kept.as_any().downcast_ref::<SeqBinder>().unwrap();
        assert_eq!(kept.version(), 7);
    }

    #[test]
    fn duplicate_replacement_takes_later_position() {
        let log = EventLog::default();
        let unit = unit_builder(1)
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(20), 1, &log)))
            .optional_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 2, &log)))
            .build();

        let keys: alloc::vec::Vec<_> = unit
            .optional_mount_binders()
            .iter()
            .map(|b| b.key())
            .collect();
        assert_eq!(keys, [BinderKey(20), BinderKey(10)]);
    }

    #[test]
    fn fixed_binders_are_not_deduplicated() {
        let log = EventLog::default();
        let unit = unit_builder(1)
            .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 1, &log)))
            .fixed_mount_binder(Rc::new(SeqBinder::new(BinderKey(10), 2, &log)))
            .build();

        assert_eq!(unit.fixed_mount_binders().len(), 2);
    }

    #[test]
    fn should_update_compares_models() {
        let log = EventLog::default();
        let a = SeqBinder::new(BinderKey(1), 1, &log);
        let b = SeqBinder::new(BinderKey(1), 1, &log);
        let c = SeqBinder::new(BinderKey(1), 2, &log);

        assert!(!a.should_update(&b, None, None));
        assert!(a.should_update(&c, None, None));
    }

    #[test]
    fn description_falls_back_for_diagnostics() {
        let unit = unit_builder(1).build();
        assert_eq!(unit.description(), "render unit");
        let named = unit_builder(2).description("text").build();
        assert_eq!(named.description(), "text");
    }
}
