// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the reduce/mount pipeline.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! pipeline instrumentation calls at each stage. All method bodies default
//! to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional boxed sink. When the `trace` feature is
//! **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates per-item mount/unmount/update
//!   events plus the corresponding `TraceSink` methods.

use alloc::boxed::Box;
use core::fmt;

use crate::unit::RenderUnitId;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a mount pass begins.
#[derive(Clone, Copy, Debug)]
pub struct MountBeginEvent {
    /// Generation of the tree being mounted.
    pub generation: u64,
    /// Number of nodes in the incoming tree.
    pub node_count: u32,
}

/// Per-pass item accounting, emitted when a mount pass ends.
#[derive(Clone, Copy, Debug, Default)]
pub struct MountSummary {
    /// Items newly mounted.
    pub mounted: u32,
    /// Items updated in place.
    pub updated: u32,
    /// Items moved between host positions without rebinding.
    pub moved: u32,
    /// Items unmounted.
    pub unmounted: u32,
}

/// Emitted when a mount pass ends.
#[derive(Clone, Copy, Debug)]
pub struct MountEndEvent {
    /// Generation of the now-current tree.
    pub generation: u64,
    /// What the pass did.
    pub summary: MountSummary,
}

/// Emitted around a reduction pass.
#[derive(Clone, Copy, Debug)]
pub struct ReduceEvent {
    /// Generation assigned to the produced tree.
    pub generation: u64,
    /// Node count of the produced tree (zero on `begin`).
    pub node_count: u32,
}

/// Per-item lifecycle event.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct ItemEvent {
    /// The item's render unit id.
    pub id: RenderUnitId,
}

/// Sink for pipeline trace events. All methods default to no-ops.
pub trait TraceSink {
    /// A mount pass is starting.
    fn on_mount_begin(&mut self, _event: MountBeginEvent) {}

    /// A mount pass finished.
    fn on_mount_end(&mut self, _event: MountEndEvent) {}

    /// A reduction pass is starting.
    fn on_reduce_begin(&mut self, _event: ReduceEvent) {}

    /// A reduction pass finished.
    fn on_reduce_end(&mut self, _event: ReduceEvent) {}

    /// An item was physically mounted.
    #[cfg(feature = "trace-rich")]
    fn on_item_mounted(&mut self, _event: ItemEvent) {}

    /// An item was physically unmounted.
    #[cfg(feature = "trace-rich")]
    fn on_item_unmounted(&mut self, _event: ItemEvent) {}

    /// An item was updated in place.
    #[cfg(feature = "trace-rich")]
    fn on_item_updated(&mut self, _event: ItemEvent) {}
}

/// Zero-overhead wrapper around an optional [`TraceSink`].
///
/// Without the `trace` feature every method body compiles to nothing and
/// the wrapper carries no sink.
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "trace")]
        {
            return f
                .debug_struct("Tracer")
                .field("enabled", &self.sink.is_some())
                .finish();
        }
        #[cfg(not(feature = "trace"))]
        {
            f.debug_struct("Tracer").field("enabled", &false).finish()
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Tracer {
    /// A tracer that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            #[cfg(feature = "trace")]
            sink: None,
        }
    }

    /// A tracer dispatching to `sink`. Without the `trace` feature the sink
    /// is dropped and never called.
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        #[cfg(not(feature = "trace"))]
        let _ = sink;
        Self {
            #[cfg(feature = "trace")]
            sink: Some(sink),
        }
    }

    /// Takes the sink back out, if any.
    pub fn take_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            return self.sink.take();
        }
        #[cfg(not(feature = "trace"))]
        {
            None
        }
    }

    pub(crate) fn on_mount_begin(&mut self, generation: u64, node_count: u32) {
        #[cfg(not(feature = "trace"))]
        let _ = (generation, node_count);
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_mount_begin(MountBeginEvent {
                generation,
                node_count,
            });
        }
    }

    pub(crate) fn on_mount_end(&mut self, generation: u64, summary: MountSummary) {
        #[cfg(not(feature = "trace"))]
        let _ = (generation, summary);
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_mount_end(MountEndEvent {
                generation,
                summary,
            });
        }
    }

    pub(crate) fn on_reduce_begin(&mut self, generation: u64) {
        #[cfg(not(feature = "trace"))]
        let _ = generation;
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_reduce_begin(ReduceEvent {
                generation,
                node_count: 0,
            });
        }
    }

    pub(crate) fn on_reduce_end(&mut self, generation: u64, node_count: u32) {
        #[cfg(not(feature = "trace"))]
        let _ = (generation, node_count);
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_reduce_end(ReduceEvent {
                generation,
                node_count,
            });
        }
    }

    pub(crate) fn on_item_mounted(&mut self, id: RenderUnitId) {
        #[cfg(not(feature = "trace-rich"))]
        let _ = id;
        #[cfg(feature = "trace-rich")]
        if let Some(sink) = &mut self.sink {
            sink.on_item_mounted(ItemEvent { id });
        }
    }

    pub(crate) fn on_item_unmounted(&mut self, id: RenderUnitId) {
        #[cfg(not(feature = "trace-rich"))]
        let _ = id;
        #[cfg(feature = "trace-rich")]
        if let Some(sink) = &mut self.sink {
            sink.on_item_unmounted(ItemEvent { id });
        }
    }

    pub(crate) fn on_item_updated(&mut self, id: RenderUnitId) {
        #[cfg(not(feature = "trace-rich"))]
        let _ = id;
        #[cfg(feature = "trace-rich")]
        if let Some(sink) = &mut self.sink {
            sink.on_item_updated(ItemEvent { id });
        }
    }
}
