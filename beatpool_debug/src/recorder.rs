// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Window bounds are stored as raw `f64` bits, so they survive the round trip
//! exactly, infinities included.

use beatpool_core::lifetime::{BoundaryKind, CrossingDirection};
use beatpool_core::trace::{
    BoundaryCrossingEvent, EntryRemovedEvent, EntryTransitionEvent, LifetimeUpdateEvent,
    RemovalReason, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_LIFETIME_UPDATE: u8 = 1;
const TAG_ENTRY_REMOVED: u8 = 2;
const TAG_ENTRY_TRANSITION: u8 = 3;
const TAG_BOUNDARY_CROSSING: u8 = 4;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "entry counts capped at u32::MAX for recording"
    )]
    fn write_count(&mut self, v: usize) {
        self.write_u32(v.min(u32::MAX as usize) as u32);
    }

    fn write_reason(&mut self, r: RemovalReason) {
        self.write_u8(match r {
            RemovalReason::Explicit => 0,
            RemovalReason::Rewound => 1,
            RemovalReason::Cleared => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_lifetime_update(&mut self, e: &LifetimeUpdateEvent) {
        self.write_u8(TAG_LIFETIME_UPDATE);
        self.write_u64(e.frame_index);
        self.write_f64(e.window_start);
        self.write_f64(e.window_end);
        self.write_count(e.alive_count);
        self.write_count(e.tracked_count);
        self.write_u8(u8::from(e.changed));
    }

    fn on_entry_removed(&mut self, e: &EntryRemovedEvent) {
        self.write_u8(TAG_ENTRY_REMOVED);
        self.write_u64(e.frame_index);
        self.write_u64(e.entry);
        self.write_reason(e.reason);
    }

    fn on_entry_transition(&mut self, e: &EntryTransitionEvent) {
        self.write_u8(TAG_ENTRY_TRANSITION);
        self.write_u64(e.frame_index);
        self.write_u64(e.entry);
        self.write_u8(u8::from(e.alive));
    }

    fn on_boundary_crossing(&mut self, e: &BoundaryCrossingEvent) {
        self.write_u8(TAG_BOUNDARY_CROSSING);
        self.write_u64(e.frame_index);
        self.write_u64(e.entry);
        self.write_u8(match e.kind {
            BoundaryKind::Start => 0,
            BoundaryKind::End => 1,
        });
        self.write_u8(match e.direction {
            CrossingDirection::Forward => 0,
            CrossingDirection::Backward => 1,
        });
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`LifetimeUpdateEvent`]. Counts are capped at `u32::MAX`.
    LifetimeUpdate(LifetimeUpdateEvent),
    /// An [`EntryRemovedEvent`].
    EntryRemoved(EntryRemovedEvent),
    /// An [`EntryTransitionEvent`].
    EntryTransition(EntryTransitionEvent),
    /// A [`BoundaryCrossingEvent`].
    BoundaryCrossing(BoundaryCrossingEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_count(&mut self) -> Option<usize> {
        self.read_u32().map(|v| v as usize)
    }

    fn read_reason(&mut self) -> Option<RemovalReason> {
        Some(match self.read_u8()? {
            0 => RemovalReason::Explicit,
            1 => RemovalReason::Rewound,
            _ => RemovalReason::Cleared,
        })
    }

    fn decode_lifetime_update(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LifetimeUpdate(LifetimeUpdateEvent {
            frame_index: self.read_u64()?,
            window_start: self.read_f64()?,
            window_end: self.read_f64()?,
            alive_count: self.read_count()?,
            tracked_count: self.read_count()?,
            changed: self.read_u8()? != 0,
        }))
    }

    fn decode_entry_removed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EntryRemoved(EntryRemovedEvent {
            frame_index: self.read_u64()?,
            entry: self.read_u64()?,
            reason: self.read_reason()?,
        }))
    }

    fn decode_entry_transition(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EntryTransition(EntryTransitionEvent {
            frame_index: self.read_u64()?,
            entry: self.read_u64()?,
            alive: self.read_u8()? != 0,
        }))
    }

    fn decode_boundary_crossing(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BoundaryCrossing(BoundaryCrossingEvent {
            frame_index: self.read_u64()?,
            entry: self.read_u64()?,
            kind: match self.read_u8()? {
                0 => BoundaryKind::Start,
                _ => BoundaryKind::End,
            },
            direction: match self.read_u8()? {
                0 => CrossingDirection::Forward,
                _ => CrossingDirection::Backward,
            },
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_LIFETIME_UPDATE => self.decode_lifetime_update(),
            TAG_ENTRY_REMOVED => self.decode_entry_removed(),
            TAG_ENTRY_TRANSITION => self.decode_entry_transition(),
            TAG_BOUNDARY_CROSSING => self.decode_boundary_crossing(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
