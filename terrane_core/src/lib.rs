// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render tree reduction and incremental mounting for retained UI hierarchies.
//!
//! `terrane_core` takes an immutable tree of layout results, reduces it into
//! a flat, host-aware render tree, and incrementally mounts, unmounts, binds,
//! and unbinds platform content against that tree. It is `no_std` compatible
//! (with `alloc`); the resolve/commit pipeline in [`state`] requires the
//! `std` feature (enabled by default).
//!
//! # Architecture
//!
//! The crate is organized around a commit loop that turns resolved layout
//! trees into incremental content updates:
//!
//! ```text
//!   LayoutResult tree (external layout engine)
//!       │
//!       ▼
//!   reduce() ──► RenderTree ──► MountState::mount()
//!                                    │
//!                ┌───────────────────┘
//!                ▼
//!   mount / update / move / unmount per item
//!       │                     │
//!       ▼                     ▼
//!   RenderUnit binders   extension callbacks
//! ```
//!
//! **[`unit`]** — [`RenderUnit`](unit::RenderUnit), the immutable descriptor
//! of one mountable content item, and the three-phase binder protocol (fixed
//! mount, optional mount, attach) with explicit [`BinderKey`](unit::BinderKey)
//! deduplication.
//!
//! **[`tree`]** — The immutable [`RenderTree`](tree::RenderTree): a flat
//! array of nodes in depth-first mount order with duplicate-id validation.
//!
//! **[`reduce`]** — Depth-first reduction of a
//! [`LayoutResult`](reduce::LayoutResult) tree into a render tree,
//! collapsing transparent wrappers and introducing host boundaries only
//! where view grouping is structurally required.
//!
//! **[`mount`]** — The incremental mount engine.
//! [`MountState`](mount::MountState) diffs previous and next render trees by
//! unit id and mounts, updates, moves, or unmounts each item, coordinating
//! with registered extensions via reference counting.
//!
//! **[`extension`]** — The plugin bus. Extensions participate in reduction,
//! mounting, and visible-bounds changes without the core knowing their
//! identity, and may acquire logical mount references that defer or veto
//! physical unmounts.
//!
//! **[`pool`]** — Per-content-type object pools with pluggable policies and
//! scope-tied eviction.
//!
//! **[`content`]** — The contract with the platform view/drawable layer:
//! [`MountContent`](content::MountContent),
//! [`HostContent`](content::HostContent), and
//! [`ContentAllocator`](content::ContentAllocator).
//!
//! **[`constraints`]** — Compactly encoded
//! [`SizeConstraints`](constraints::SizeConstraints) with lossless
//! round-tripping of bounded dimensions and an explicit infinity sentinel.
//!
//! **[`state`]** (`std`) — [`RenderState`](state::RenderState):
//! double-buffers committed trees across a resolve → layout → commit
//! pipeline with batched state updates and commit-time staleness checks.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types for
//! pipeline instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Threading
//!
//! All mount-affecting calls on a [`MountState`](mount::MountState) must be
//! serialized by one logical owner thread; none of them are internally
//! synchronized. Tree resolution may be deferred through an
//! [`Executor`](state::Executor), whose tasks must likewise run serially on
//! the owner thread.
//!
//! # Crate features
//!
//! - `std` (enabled by default): Enables the [`state`] module and `std`
//!   support in dependencies.
//! - `trace` (disabled by default): Enables [`Tracer`](trace::Tracer) method
//!   bodies (one branch per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-item
//!   mount/unmount/update events.

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

// The harness's test doubles implement this crate's traits, but the unit
// tests below exercise `pub(crate)` internals in the same expressions. A
// normal dev-dependency on `terrane_harness` would link it against the
// separate non-test build of this crate, so its types would never unify
// with `crate::` paths. Compiling the harness source directly into the
// test build (with `self` aliased to the crate name its imports expect)
// makes both sides the same crate.
#[cfg(test)]
extern crate self as terrane_core;

#[cfg(test)]
#[path = "../../terrane_harness/src/lib.rs"]
mod terrane_harness;

pub mod constraints;
pub mod content;
pub mod extension;
pub mod mount;
pub mod pool;
pub mod reduce;
#[cfg(feature = "std")]
pub mod state;
pub mod trace;
pub mod tree;
pub mod unit;
