// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory trace recording.
//!
//! [`RecorderSink`] implements [`TraceSink`] and appends one fixed-size
//! little-endian record per event to a byte buffer, stamped with
//! microseconds since the sink was created. [`decode`] walks a recording
//! back into [`TraceRecord`]s; malformed trailing bytes and unknown tags
//! are skipped rather than failing the whole recording.

use std::time::Instant;

use terrane_core::trace::{
    ItemEvent, MountBeginEvent, MountEndEvent, MountSummary, ReduceEvent, TraceSink,
};
use terrane_core::unit::RenderUnitId;

/// Size of one encoded record in bytes.
pub const RECORD_LEN: usize = 40;

const TAG_MOUNT_BEGIN: u8 = 1;
const TAG_MOUNT_END: u8 = 2;
const TAG_REDUCE_BEGIN: u8 = 3;
const TAG_REDUCE_END: u8 = 4;
const TAG_ITEM_MOUNTED: u8 = 5;
const TAG_ITEM_UNMOUNTED: u8 = 6;
const TAG_ITEM_UPDATED: u8 = 7;

/// One decoded trace record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceRecord {
    /// A mount pass started.
    MountBegin {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// Generation of the incoming tree.
        generation: u64,
        /// Node count of the incoming tree.
        node_count: u32,
    },
    /// A mount pass finished.
    MountEnd {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// Generation of the now-current tree.
        generation: u64,
        /// Items newly mounted.
        mounted: u32,
        /// Items updated in place.
        updated: u32,
        /// Items moved without rebinding.
        moved: u32,
        /// Items unmounted.
        unmounted: u32,
    },
    /// A reduction pass started.
    ReduceBegin {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// Generation assigned to the produced tree.
        generation: u64,
    },
    /// A reduction pass finished.
    ReduceEnd {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// Generation assigned to the produced tree.
        generation: u64,
        /// Node count of the produced tree.
        node_count: u32,
    },
    /// An item was physically mounted.
    ItemMounted {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// The item's render unit id.
        id: RenderUnitId,
    },
    /// An item was physically unmounted.
    ItemUnmounted {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// The item's render unit id.
        id: RenderUnitId,
    },
    /// An item was updated in place.
    ItemUpdated {
        /// Microseconds since recording started.
        ts_micros: u64,
        /// The item's render unit id.
        id: RenderUnitId,
    },
}

/// A [`TraceSink`] that appends fixed-size records to an in-memory buffer.
#[derive(Debug)]
pub struct RecorderSink {
    started: Instant,
    buf: Vec<u8>,
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSink {
    /// Creates an empty recorder; timestamps count from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            buf: Vec::new(),
        }
    }

    /// The encoded recording so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the encoded recording.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of complete records captured.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.buf.len() / RECORD_LEN
    }

    fn now_micros(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn push(&mut self, tag: u8, f0: u64, f1: u64, f2: u64) {
        let mut record = [0u8; RECORD_LEN];
        record[0] = tag;
        record[8..16].copy_from_slice(&self.now_micros().to_le_bytes());
        record[16..24].copy_from_slice(&f0.to_le_bytes());
        record[24..32].copy_from_slice(&f1.to_le_bytes());
        record[32..40].copy_from_slice(&f2.to_le_bytes());
        self.buf.extend_from_slice(&record);
    }
}

impl TraceSink for RecorderSink {
    fn on_mount_begin(&mut self, event: MountBeginEvent) {
        self.push(
            TAG_MOUNT_BEGIN,
            event.generation,
            u64::from(event.node_count),
            0,
        );
    }

    fn on_mount_end(&mut self, event: MountEndEvent) {
        let MountSummary {
            mounted,
            updated,
            moved,
            unmounted,
        } = event.summary;
        self.push(
            TAG_MOUNT_END,
            event.generation,
            (u64::from(mounted) << 32) | u64::from(updated),
            (u64::from(moved) << 32) | u64::from(unmounted),
        );
    }

    fn on_reduce_begin(&mut self, event: ReduceEvent) {
        self.push(TAG_REDUCE_BEGIN, event.generation, 0, 0);
    }

    fn on_reduce_end(&mut self, event: ReduceEvent) {
        self.push(
            TAG_REDUCE_END,
            event.generation,
            u64::from(event.node_count),
            0,
        );
    }

    fn on_item_mounted(&mut self, event: ItemEvent) {
        self.push(TAG_ITEM_MOUNTED, event.id.0, 0, 0);
    }

    fn on_item_unmounted(&mut self, event: ItemEvent) {
        self.push(TAG_ITEM_UNMOUNTED, event.id.0, 0, 0);
    }

    fn on_item_updated(&mut self, event: ItemEvent) {
        self.push(TAG_ITEM_UPDATED, event.id.0, 0, 0);
    }
}

fn read_u64(record: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&record[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "node and item counts were widened from u32 at encode time"
)]
fn decode_one(record: &[u8]) -> Option<TraceRecord> {
    let ts_micros = read_u64(record, 8);
    let f0 = read_u64(record, 16);
    let f1 = read_u64(record, 24);
    let f2 = read_u64(record, 32);
    match record[0] {
        TAG_MOUNT_BEGIN => Some(TraceRecord::MountBegin {
            ts_micros,
            generation: f0,
            node_count: f1 as u32,
        }),
        TAG_MOUNT_END => Some(TraceRecord::MountEnd {
            ts_micros,
            generation: f0,
            mounted: (f1 >> 32) as u32,
            updated: f1 as u32,
            moved: (f2 >> 32) as u32,
            unmounted: f2 as u32,
        }),
        TAG_REDUCE_BEGIN => Some(TraceRecord::ReduceBegin {
            ts_micros,
            generation: f0,
        }),
        TAG_REDUCE_END => Some(TraceRecord::ReduceEnd {
            ts_micros,
            generation: f0,
            node_count: f1 as u32,
        }),
        TAG_ITEM_MOUNTED => Some(TraceRecord::ItemMounted {
            ts_micros,
            id: RenderUnitId(f0),
        }),
        TAG_ITEM_UNMOUNTED => Some(TraceRecord::ItemUnmounted {
            ts_micros,
            id: RenderUnitId(f0),
        }),
        TAG_ITEM_UPDATED => Some(TraceRecord::ItemUpdated {
            ts_micros,
            id: RenderUnitId(f0),
        }),
        _ => None,
    }
}

/// Decodes a recording, skipping unknown tags and trailing partial records.
pub fn decode(bytes: &[u8]) -> impl Iterator<Item = TraceRecord> + '_ {
    bytes.chunks_exact(RECORD_LEN).filter_map(decode_one)
}
