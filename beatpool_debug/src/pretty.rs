// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Times are
//! the container's media time, in milliseconds.

use std::io::Write;

use beatpool_core::lifetime::{BoundaryKind, CrossingDirection};
use beatpool_core::trace::{
    BoundaryCrossingEvent, EntryRemovedEvent, EntryTransitionEvent, LifetimeUpdateEvent,
    RemovalReason, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    quiet: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            quiet: false,
        }
    }

    /// Skips lifetime updates that changed nothing.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn reason_name(reason: RemovalReason) -> &'static str {
    match reason {
        RemovalReason::Explicit => "explicit",
        RemovalReason::Rewound => "rewound",
        RemovalReason::Cleared => "cleared",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_lifetime_update(&mut self, e: &LifetimeUpdateEvent) {
        if self.quiet && !e.changed {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[update] frame={} window=[{:.1}, {:.1}]ms alive={}/{}{}",
            e.frame_index,
            e.window_start,
            e.window_end,
            e.alive_count,
            e.tracked_count,
            if e.changed { "" } else { " (unchanged)" },
        );
    }

    fn on_entry_removed(&mut self, e: &EntryRemovedEvent) {
        let _ = writeln!(
            self.writer,
            "[removed] frame={} entry={:#x} reason={}",
            e.frame_index,
            e.entry,
            reason_name(e.reason),
        );
    }

    fn on_entry_transition(&mut self, e: &EntryTransitionEvent) {
        let _ = writeln!(
            self.writer,
            "[{}] frame={} entry={:#x}",
            if e.alive { "alive" } else { "dead" },
            e.frame_index,
            e.entry,
        );
    }

    fn on_boundary_crossing(&mut self, e: &BoundaryCrossingEvent) {
        let kind = match e.kind {
            BoundaryKind::Start => "start",
            BoundaryKind::End => "end",
        };
        let arrow = match e.direction {
            CrossingDirection::Forward => "->",
            CrossingDirection::Backward => "<-",
        };
        let _ = writeln!(
            self.writer,
            "[cross] frame={} entry={:#x} {kind} {arrow}",
            e.frame_index, e.entry,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(changed: bool) -> LifetimeUpdateEvent {
        LifetimeUpdateEvent {
            frame_index: 4,
            window_start: 1_000.0,
            window_end: 1_250.0,
            alive_count: 3,
            tracked_count: 40,
            changed,
        }
    }

    #[test]
    fn pretty_print_update() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_lifetime_update(&update(true));
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("[update]"), "got: {output}");
        assert!(output.contains("frame=4"), "got: {output}");
        assert!(output.contains("alive=3/40"), "got: {output}");
    }

    #[test]
    fn quiet_sink_skips_idle_updates() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new()).quiet();
        sink.on_lifetime_update(&update(false));
        sink.on_entry_removed(&EntryRemovedEvent {
            frame_index: 4,
            entry: 0x1_0000_0002,
            reason: RemovalReason::Rewound,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "[removed] frame=4 entry=0x100000002 reason=rewound\n");
    }

    #[test]
    fn pretty_print_crossing() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_boundary_crossing(&BoundaryCrossingEvent {
            frame_index: 2,
            entry: 7,
            kind: BoundaryKind::Start,
            direction: CrossingDirection::Backward,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("start <-"), "got: {output}");
    }
}
