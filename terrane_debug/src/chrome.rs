// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome trace export.
//!
//! [`export`] converts a [`recorder`](crate::recorder) recording into the
//! Chrome trace-event JSON array format, loadable by `chrome://tracing` and
//! Perfetto. Reduce and mount passes become duration events (`B`/`E`);
//! per-item records become instant events on the same track.

use std::io::Write;

use serde_json::{Value, json};

use crate::recorder::{TraceRecord, decode};

const PID: u64 = 1;
const TID: u64 = 1;

fn duration(name: &str, phase: &str, ts_micros: u64, args: Value) -> Value {
    json!({
        "name": name,
        "ph": phase,
        "ts": ts_micros,
        "pid": PID,
        "tid": TID,
        "args": args,
    })
}

fn instant(name: &str, ts_micros: u64, args: Value) -> Value {
    json!({
        "name": name,
        "ph": "i",
        "s": "t",
        "ts": ts_micros,
        "pid": PID,
        "tid": TID,
        "args": args,
    })
}

fn event_for(record: TraceRecord) -> Value {
    match record {
        TraceRecord::ReduceBegin {
            ts_micros,
            generation,
        } => duration("reduce", "B", ts_micros, json!({ "generation": generation })),
        TraceRecord::ReduceEnd {
            ts_micros,
            generation,
            node_count,
        } => duration(
            "reduce",
            "E",
            ts_micros,
            json!({ "generation": generation, "nodes": node_count }),
        ),
        TraceRecord::MountBegin {
            ts_micros,
            generation,
            node_count,
        } => duration(
            "mount",
            "B",
            ts_micros,
            json!({ "generation": generation, "nodes": node_count }),
        ),
        TraceRecord::MountEnd {
            ts_micros,
            generation,
            mounted,
            updated,
            moved,
            unmounted,
        } => duration(
            "mount",
            "E",
            ts_micros,
            json!({
                "generation": generation,
                "mounted": mounted,
                "updated": updated,
                "moved": moved,
                "unmounted": unmounted,
            }),
        ),
        TraceRecord::ItemMounted { ts_micros, id } => {
            instant("item mounted", ts_micros, json!({ "unit": id.0 }))
        }
        TraceRecord::ItemUnmounted { ts_micros, id } => {
            instant("item unmounted", ts_micros, json!({ "unit": id.0 }))
        }
        TraceRecord::ItemUpdated { ts_micros, id } => {
            instant("item updated", ts_micros, json!({ "unit": id.0 }))
        }
    }
}

/// Writes a recording as a Chrome trace-event JSON array.
///
/// # Errors
///
/// Returns any error produced while serializing to `writer`.
pub fn export<W: Write>(recording: &[u8], writer: W) -> serde_json::Result<()> {
    let events: Vec<Value> = decode(recording).map(event_for).collect();
    serde_json::to_writer(writer, &events)
}
