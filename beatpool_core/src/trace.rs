// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for container updates.
//!
//! Containers report what an update did through a [`TraceSink`], one method
//! per event, each defaulting to a no-op.
//!
//! The `*_traced` container methods take a [`Tracer`], which holds the sink
//! only when the `trace` feature is enabled. Without it, emitting an event is
//! a no-op the optimizer removes entirely.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates per-entry [`EntryTransitionEvent`]
//!   and [`BoundaryCrossingEvent`] plus the corresponding `TraceSink` methods.

#[cfg(feature = "trace-rich")]
use crate::lifetime::{BoundaryKind, CrossingDirection};

/// Why an entry left a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// The caller removed it.
    Explicit,
    /// The window was rewound past its start and the container drops
    /// rewound entries.
    Rewound,
    /// The container was cleared.
    Cleared,
}

/// Emitted after every lifetime update of a container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifetimeUpdateEvent {
    /// Monotonic update counter of the container.
    pub frame_index: u64,
    /// Start of the query window (current time minus past extension).
    pub window_start: f64,
    /// End of the query window (current time plus future extension).
    pub window_end: f64,
    /// Number of alive entries after the update.
    pub alive_count: usize,
    /// Number of tracked entries.
    pub tracked_count: usize,
    /// Whether any entry changed state.
    pub changed: bool,
}

/// Emitted when an entry is removed from a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryRemovedEvent {
    /// Update counter at the time of removal.
    pub frame_index: u64,
    /// Raw entry key (see [`EntryKey::to_raw`](crate::lifetime::EntryKey::to_raw)).
    pub entry: u64,
    /// Why the entry was removed.
    pub reason: RemovalReason,
}

/// Emitted when an entry becomes alive or dead.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryTransitionEvent {
    /// Update counter.
    pub frame_index: u64,
    /// Raw entry key.
    pub entry: u64,
    /// `true` if the entry became alive, `false` if it became dead.
    pub alive: bool,
}

/// Emitted when the window crosses an entry boundary.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryCrossingEvent {
    /// Update counter.
    pub frame_index: u64,
    /// Raw entry key.
    pub entry: u64,
    /// Which boundary.
    pub kind: BoundaryKind,
    /// Which way time moved.
    pub direction: CrossingDirection,
}

/// Receives trace events from containers.
///
/// Implement the methods for the events a sink records; the rest are no-ops.
pub trait TraceSink {
    /// Called after each lifetime update.
    fn on_lifetime_update(&mut self, e: &LifetimeUpdateEvent) {
        _ = e;
    }

    /// Called when an entry is removed.
    fn on_entry_removed(&mut self, e: &EntryRemovedEvent) {
        _ = e;
    }

    /// Called when an entry becomes alive or dead (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_entry_transition(&mut self, e: &EntryTransitionEvent) {
        _ = e;
    }

    /// Called when the window crosses an entry boundary (requires
    /// `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_boundary_crossing(&mut self, e: &BoundaryCrossingEvent) {
        _ = e;
    }
}

/// A sink that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Optional [`TraceSink`] handle threaded through container updates.
///
/// Holds no sink unless the `trace` feature is enabled.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that forwards events to `sink`.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer without a sink.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`LifetimeUpdateEvent`].
    #[inline]
    pub fn lifetime_update(&mut self, e: &LifetimeUpdateEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_lifetime_update(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`EntryRemovedEvent`].
    #[inline]
    pub fn entry_removed(&mut self, e: &EntryRemovedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_entry_removed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`EntryTransitionEvent`] (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn entry_transition(&mut self, e: &EntryTransitionEvent) {
        if let Some(s) = &mut self.sink {
            s.on_entry_transition(e);
        }
    }

    /// Emits a [`BoundaryCrossingEvent`] (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn boundary_crossing(&mut self, e: &BoundaryCrossingEvent) {
        if let Some(s) = &mut self.sink {
            s.on_boundary_crossing(e);
        }
    }
}
