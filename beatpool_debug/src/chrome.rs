// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Recorded events carry frame indices, not wall-clock time, so each frame is
//! laid out at a fixed interval.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Frame `n` is placed at `n * frame_interval_us` microseconds. Lifetime
/// updates become counter tracks of alive and tracked entries; everything
/// else becomes an instant event.
pub fn export(bytes: &[u8], frame_interval_us: f64, writer: &mut dyn Write) -> io::Result<()> {
    let ts = |frame_index: u64| frame_index as f64 * frame_interval_us;
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::LifetimeUpdate(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "Entries",
                    "cat": "Lifetime",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "alive": e.alive_count,
                        "tracked": e.tracked_count,
                    }
                }));
                events.push(json!({
                    "ph": "i",
                    "name": "Update",
                    "cat": "Lifetime",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                        "window_start_ms": finite_or_null(e.window_start),
                        "window_end_ms": finite_or_null(e.window_end),
                        "changed": e.changed,
                    }
                }));
            }
            RecordedEvent::EntryRemoved(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "EntryRemoved",
                    "cat": "Entry",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "entry": e.entry,
                        "reason": format!("{:?}", e.reason),
                    }
                }));
            }
            RecordedEvent::EntryTransition(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": if e.alive { "BecameAlive" } else { "BecameDead" },
                    "cat": "Entry",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "entry": e.entry,
                    }
                }));
            }
            RecordedEvent::BoundaryCrossing(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Crossing",
                    "cat": "Rich",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": 2,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "entry": e.entry,
                        "kind": format!("{:?}", e.kind),
                        "direction": format!("{:?}", e.direction),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

/// JSON has no infinities; an always-alive window exports as `null`.
fn finite_or_null(v: f64) -> Value {
    if v.is_finite() { json!(v) } else { Value::Null }
}
