// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental alive/dead classification of entries against a moving window.
//!
//! [`LifetimeEntryManager`] keeps every tracked entry in exactly one of four
//! states:
//!
//! - **New**: registered but not yet classified (no window seen yet, or the
//!   entry's own window changed and it is waiting for the next update).
//! - **Future**: the query window ends before the entry starts.
//! - **Current**: the query window overlaps the entry. The entry is alive.
//! - **Past**: the query window starts at or after the entry ends.
//!
//! Future entries are kept sorted by start and past entries by end, so an
//! update only revisits entries near the edges of the window plus the alive
//! set, instead of scanning everything:
//!
//! ```text
//!            past (by end)        current         future (by start)
//!   ... ─────────────────┤ [query.start, query.end] ├──────────────── ...
//!                 pop from the back           pop from the front
//! ```
//!
//! Alive/dead notifications are delivered synchronously as entries are
//! reclassified. Boundary crossings are queued during the sweep and delivered
//! after it, so observers see the final alive set when they react to a
//! crossing. For a single entry the start crossing always precedes the end
//! crossing, in both directions.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use super::entry::{EntryId, LifetimeWindow};

/// A key a [`LifetimeEntryManager`] can track.
pub trait EntryKey: Copy + Ord + Debug {
    /// Returns a 64-bit encoding of the key for traces.
    fn to_raw(self) -> u64;
}

impl EntryKey for EntryId {
    fn to_raw(self) -> u64 {
        Self::to_raw(self)
    }
}

impl EntryKey for u32 {
    fn to_raw(self) -> u64 {
        u64::from(self)
    }
}

impl EntryKey for u64 {
    fn to_raw(self) -> u64 {
        self
    }
}

/// Classification of a tracked entry relative to the last query window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifetimeState {
    /// Not yet classified.
    New,
    /// The window has not reached the entry yet.
    Future,
    /// The window overlaps the entry.
    Current,
    /// The window has moved past the entry.
    Past,
}

/// Which edge of an entry's lifetime the window crossed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryKind {
    /// The lifetime start.
    Start,
    /// The lifetime end.
    End,
}

/// Whether time increased or decreased across a boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CrossingDirection {
    /// Time increased.
    Forward,
    /// Time decreased.
    Backward,
}

/// Receives lifetime notifications synchronously during
/// [`LifetimeEntryManager::update`].
///
/// All methods default to no-ops.
pub trait LifetimeObserver<K> {
    /// The entry became alive.
    fn entry_became_alive(&mut self, key: K) {
        _ = key;
    }

    /// The entry became dead (or was removed while alive).
    fn entry_became_dead(&mut self, key: K) {
        _ = key;
    }

    /// The window edge passed one of the entry's boundaries.
    fn entry_crossed_boundary(&mut self, key: K, kind: BoundaryKind, direction: CrossingDirection) {
        _ = (key, kind, direction);
    }
}

impl<K> LifetimeObserver<K> for () {}

/// A recorded lifetime notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifetimeEvent<K> {
    /// See [`LifetimeObserver::entry_became_alive`].
    BecameAlive(K),
    /// See [`LifetimeObserver::entry_became_dead`].
    BecameDead(K),
    /// See [`LifetimeObserver::entry_crossed_boundary`].
    CrossedBoundary(K, BoundaryKind, CrossingDirection),
}

impl<K> LifetimeObserver<K> for Vec<LifetimeEvent<K>> {
    fn entry_became_alive(&mut self, key: K) {
        self.push(LifetimeEvent::BecameAlive(key));
    }

    fn entry_became_dead(&mut self, key: K) {
        self.push(LifetimeEvent::BecameDead(key));
    }

    fn entry_crossed_boundary(&mut self, key: K, kind: BoundaryKind, direction: CrossingDirection) {
        self.push(LifetimeEvent::CrossedBoundary(key, kind, direction));
    }
}

/// Totally ordered `f64` for use in sorted sets.
#[derive(Clone, Copy, Debug)]
struct TimeKey(f64);

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
    window: LifetimeWindow,
    state: LifetimeState,
    /// Insertion sequence; breaks ties between equal times.
    seq: u64,
    pending: bool,
}

type Crossing<K> = (K, BoundaryKind, CrossingDirection);

/// Tracks which entries overlap a moving query window.
///
/// The window may move in either direction or jump arbitrarily. See the
/// [module documentation](self) for the sweep.
#[derive(Debug)]
pub struct LifetimeEntryManager<K> {
    tracked: BTreeMap<K, Tracked>,
    pending: Vec<K>,
    active: BTreeSet<K>,
    future: BTreeSet<(TimeKey, u64, K)>,
    past: BTreeSet<(TimeKey, u64, K)>,
    window: Option<LifetimeWindow>,
    next_seq: u64,
}

impl<K: EntryKey> Default for LifetimeEntryManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntryKey> LifetimeEntryManager<K> {
    /// Creates an empty manager that has not seen a window yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracked: BTreeMap::new(),
            pending: Vec::new(),
            active: BTreeSet::new(),
            future: BTreeSet::new(),
            past: BTreeSet::new(),
            window: None,
            next_seq: 0,
        }
    }

    /// Starts tracking `key` with the given lifetime window.
    ///
    /// If a window has been seen, the entry is classified immediately and
    /// `observer` is told if it is alive. Otherwise it is classified on the
    /// next [`update`](Self::update).
    ///
    /// # Panics
    ///
    /// Panics if `key` is already tracked.
    pub fn add_entry(
        &mut self,
        key: K,
        window: LifetimeWindow,
        observer: &mut impl LifetimeObserver<K>,
    ) {
        assert!(
            !self.tracked.contains_key(&key),
            "entry already registered: {key:?}"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tracked.insert(
            key,
            Tracked {
                window: normalize(window),
                state: LifetimeState::New,
                seq,
                pending: false,
            },
        );

        if let Some(query) = self.window {
            let mut crossings = Vec::new();
            self.reclassify(key, query, observer, &mut crossings);
            debug_assert!(crossings.is_empty(), "new entries never cross a boundary");
        } else {
            self.queue(key);
        }
    }

    /// Stops tracking `key`.
    ///
    /// Returns `false` if the key is not tracked. If the entry was alive,
    /// `observer` is told it became dead first.
    pub fn remove_entry(&mut self, key: K, observer: &mut impl LifetimeObserver<K>) -> bool {
        let Some(tracked) = self.tracked.remove(&key) else {
            return false;
        };
        match tracked.state {
            LifetimeState::Future => {
                self.future
                    .remove(&(TimeKey(tracked.window.start), tracked.seq, key));
            }
            LifetimeState::Past => {
                self.past
                    .remove(&(TimeKey(tracked.window.end), tracked.seq, key));
            }
            LifetimeState::Current => {
                self.active.remove(&key);
                observer.entry_became_dead(key);
            }
            LifetimeState::New => {}
        }
        if tracked.pending {
            self.pending.retain(|&k| k != key);
        }
        true
    }

    /// Changes the lifetime window of a tracked entry.
    ///
    /// The entry keeps its current state until the next
    /// [`update`](Self::update), which reclassifies it without a scan.
    /// Returns `false` if the key is not tracked.
    pub fn set_window(&mut self, key: K, window: LifetimeWindow) -> bool {
        let Some(tracked) = self.tracked.get_mut(&key) else {
            return false;
        };
        let window = normalize(window);
        if tracked.window == window {
            return true;
        }
        match tracked.state {
            LifetimeState::Future => {
                self.future
                    .remove(&(TimeKey(tracked.window.start), tracked.seq, key));
            }
            LifetimeState::Past => {
                self.past
                    .remove(&(TimeKey(tracked.window.end), tracked.seq, key));
            }
            LifetimeState::Current | LifetimeState::New => {}
        }
        tracked.window = window;
        let queue = !tracked.pending;
        if queue {
            self.queue(key);
        }
        true
    }

    /// Reclassifies entries against the window `[start, end]`.
    ///
    /// Returns whether any entry changed state. Calling this again with the
    /// same window and no intervening edits is a no-op that returns `false`.
    pub fn update(
        &mut self,
        start: f64,
        end: f64,
        observer: &mut impl LifetimeObserver<K>,
    ) -> bool {
        // An inverted query collapses to the point `start`.
        let query = LifetimeWindow::new(start, end.max(start));
        if self.window == Some(query) && self.pending.is_empty() {
            return false;
        }
        self.window = Some(query);

        let mut crossings = Vec::new();
        let mut changed = false;

        for key in core::mem::take(&mut self.pending) {
            changed |= self.reclassify(key, query, observer, &mut crossings);
        }

        while let Some(&(time, _, key)) = self.future.first() {
            if time.0 > query.end {
                break;
            }
            self.future.pop_first();
            changed |= self.reclassify(key, query, observer, &mut crossings);
        }

        while let Some(&(time, _, key)) = self.past.last() {
            if time.0 <= query.start {
                break;
            }
            self.past.pop_last();
            changed |= self.reclassify(key, query, observer, &mut crossings);
        }

        let leaving: Vec<K> = self
            .active
            .iter()
            .filter(|key| classify(self.tracked[*key].window, query) != LifetimeState::Current)
            .copied()
            .collect();
        for key in leaving {
            changed |= self.reclassify(key, query, observer, &mut crossings);
        }

        for (key, kind, direction) in crossings {
            observer.entry_crossed_boundary(key, kind, direction);
        }

        changed
    }

    /// Returns the state of a tracked entry.
    #[must_use]
    pub fn state(&self, key: K) -> Option<LifetimeState> {
        self.tracked.get(&key).map(|t| t.state)
    }

    /// Returns whether `key` is tracked and alive.
    #[must_use]
    pub fn is_alive(&self, key: K) -> bool {
        self.state(key) == Some(LifetimeState::Current)
    }

    /// Returns the alive entries in key order.
    pub fn alive_entries(&self) -> impl Iterator<Item = K> + '_ {
        self.active.iter().copied()
    }

    /// Returns the number of alive entries.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.active.len()
    }

    /// Returns every tracked entry in key order.
    pub fn entries(&self) -> impl Iterator<Item = K> + '_ {
        self.tracked.keys().copied()
    }

    /// Returns whether `key` is tracked.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.tracked.contains_key(&key)
    }

    /// Returns the lifetime window of a tracked entry.
    #[must_use]
    pub fn entry_window(&self, key: K) -> Option<LifetimeWindow> {
        self.tracked.get(&key).map(|t| t.window)
    }

    /// Returns the number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Returns whether no entries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Returns the last query window, if any.
    #[must_use]
    pub fn window(&self) -> Option<LifetimeWindow> {
        self.window
    }

    fn queue(&mut self, key: K) {
        if let Some(tracked) = self.tracked.get_mut(&key) {
            tracked.pending = true;
            self.pending.push(key);
        }
    }

    /// Classifies `key` against `query`, moves it into the matching set and
    /// emits notifications. The entry must not be in `future` or `past`.
    fn reclassify(
        &mut self,
        key: K,
        query: LifetimeWindow,
        observer: &mut impl LifetimeObserver<K>,
        crossings: &mut Vec<Crossing<K>>,
    ) -> bool {
        let Some(tracked) = self.tracked.get_mut(&key) else {
            return false;
        };
        tracked.pending = false;
        let old = tracked.state;
        let new = classify(tracked.window, query);
        tracked.state = new;

        match new {
            LifetimeState::Future => {
                self.future
                    .insert((TimeKey(tracked.window.start), tracked.seq, key));
            }
            LifetimeState::Past => {
                self.past
                    .insert((TimeKey(tracked.window.end), tracked.seq, key));
            }
            LifetimeState::Current => {
                self.active.insert(key);
            }
            LifetimeState::New => unreachable!("classification never yields New"),
        }
        if old == LifetimeState::Current && new != LifetimeState::Current {
            self.active.remove(&key);
        }

        if old == new {
            return false;
        }
        if new == LifetimeState::Current {
            observer.entry_became_alive(key);
        } else if old == LifetimeState::Current {
            observer.entry_became_dead(key);
        }
        queue_crossings(key, old, new, crossings);
        true
    }
}

/// The end never precedes the start.
fn normalize(window: LifetimeWindow) -> LifetimeWindow {
    LifetimeWindow::new(window.start, window.end.max(window.start))
}

fn classify(window: LifetimeWindow, query: LifetimeWindow) -> LifetimeState {
    if query.end < window.start {
        LifetimeState::Future
    } else if query.start >= window.end {
        LifetimeState::Past
    } else {
        LifetimeState::Current
    }
}

fn queue_crossings<K: Copy>(
    key: K,
    old: LifetimeState,
    new: LifetimeState,
    crossings: &mut Vec<Crossing<K>>,
) {
    use BoundaryKind::{End, Start};
    use CrossingDirection::{Backward, Forward};
    use LifetimeState::{Current, Future, Past};

    let edges: &[(BoundaryKind, CrossingDirection)] = match (old, new) {
        (Future, Current) => &[(Start, Forward)],
        (Future, Past) => &[(Start, Forward), (End, Forward)],
        (Current, Past) => &[(End, Forward)],
        (Current, Future) => &[(Start, Backward)],
        (Past, Current) => &[(End, Backward)],
        (Past, Future) => &[(Start, Backward), (End, Backward)],
        _ => &[],
    };
    crossings.extend(edges.iter().map(|&(kind, direction)| (key, kind, direction)));
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use BoundaryKind::{End, Start};
    use CrossingDirection::{Backward, Forward};
    use LifetimeEvent::{BecameAlive, BecameDead, CrossedBoundary};

    fn scenario() -> LifetimeEntryManager<u32> {
        let mut manager = LifetimeEntryManager::new();
        manager.add_entry(1, LifetimeWindow::new(0.0, 100.0), &mut ());
        manager.add_entry(2, LifetimeWindow::new(50.0, 150.0), &mut ());
        manager.add_entry(3, LifetimeWindow::new(200.0, 300.0), &mut ());
        manager
    }

    fn alive_and_dead(events: &[LifetimeEvent<u32>]) -> Vec<LifetimeEvent<u32>> {
        events
            .iter()
            .copied()
            .filter(|e| !matches!(e, CrossedBoundary(..)))
            .collect()
    }

    #[test]
    fn point_queries_match_window_membership() {
        let windows = [
            (0.0, 100.0),
            (50.0, 150.0),
            (120.0, 120.0),
            (130.0, 90.0),
            (-40.0, 10.0),
            (75.0, 400.0),
            (300.0, 301.0),
        ];
        let mut manager = LifetimeEntryManager::new();
        for (i, &(start, end)) in windows.iter().enumerate() {
            manager.add_entry(i as u32, LifetimeWindow::new(start, end), &mut ());
        }

        // Deterministic scrub: forward, backward and large jumps.
        let mut seed = 0x2545_f491_u32;
        let mut times = vec![0.0, 99.0, 100.0, 150.0, 10.0, 500.0, -100.0, 120.0, 300.0];
        for _ in 0..64 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            times.push(f64::from(seed % 500) - 50.0);
        }

        for t in times {
            manager.update(t, t, &mut ());
            for (i, &(start, end)) in windows.iter().enumerate() {
                let expected = start <= t && t < end;
                assert_eq!(manager.is_alive(i as u32), expected, "entry {i} at t={t}");
            }
            assert_eq!(
                manager.alive_count(),
                windows.iter().filter(|&&(s, e)| s <= t && t < e).count()
            );
        }
    }

    #[test]
    fn unchanged_window_is_a_no_op() {
        let mut manager = scenario();
        assert!(manager.update(60.0, 60.0, &mut ()));

        let mut events = Vec::new();
        assert!(!manager.update(60.0, 60.0, &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn forward_sweep_emits_one_transition_per_edge() {
        let mut manager = scenario();
        let mut events = Vec::new();
        let mut t = 0.0;
        while t <= 250.0 {
            manager.update(t, t, &mut events);
            if t == 60.0 {
                assert_eq!(manager.alive_count(), 2);
            }
            if t == 220.0 {
                assert_eq!(manager.alive_count(), 1);
            }
            t += 10.0;
        }

        assert_eq!(
            alive_and_dead(&events),
            [
                BecameAlive(1),
                BecameAlive(2),
                BecameDead(1),
                BecameDead(2),
                BecameAlive(3),
            ]
        );
        // Entry 3 is still alive at t=250; it would die at t=300.
        assert!(manager.is_alive(3));
    }

    #[test]
    fn rewind_restores_entries_without_reregistering() {
        let mut manager = scenario();
        let mut t = 0.0;
        while t <= 250.0 {
            manager.update(t, t, &mut ());
            t += 10.0;
        }

        let mut events = Vec::new();
        assert!(manager.update(10.0, 10.0, &mut events));

        assert!(events.contains(&BecameAlive(1)));
        assert!(events.contains(&CrossedBoundary(1, End, Backward)));
        assert!(events.contains(&BecameDead(3)));
        assert!(events.contains(&CrossedBoundary(3, Start, Backward)));
        // Entry 2 rewinds from past to future in one step: both crossings,
        // start first, but it never becomes alive.
        let two: Vec<_> = events
            .iter()
            .copied()
            .filter(|e| matches!(e, BecameAlive(2) | BecameDead(2) | CrossedBoundary(2, ..)))
            .collect();
        assert_eq!(
            two,
            [
                CrossedBoundary(2, Start, Backward),
                CrossedBoundary(2, End, Backward)
            ]
        );
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.state(2), Some(LifetimeState::Future));
    }

    #[test]
    fn rewind_into_overlap_revives_both_entries() {
        let mut manager = scenario();
        manager.update(250.0, 250.0, &mut ());

        let mut events = Vec::new();
        manager.update(60.0, 60.0, &mut events);
        assert!(events.contains(&BecameAlive(1)));
        assert!(events.contains(&BecameAlive(2)));
        assert!(events.contains(&BecameDead(3)));
        assert_eq!(manager.alive_entries().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn crossings_are_delivered_after_transitions() {
        let mut manager = scenario();
        manager.update(-10.0, -10.0, &mut ());

        let mut events = Vec::new();
        manager.update(60.0, 60.0, &mut events);
        assert_eq!(
            events,
            [
                BecameAlive(1),
                BecameAlive(2),
                CrossedBoundary(1, Start, Forward),
                CrossedBoundary(2, Start, Forward),
            ]
        );
    }

    #[test]
    fn jump_over_entry_crosses_both_boundaries_without_transition() {
        let mut manager = LifetimeEntryManager::new();
        manager.add_entry(7_u32, LifetimeWindow::new(100.0, 200.0), &mut ());
        manager.update(0.0, 0.0, &mut ());

        let mut events = Vec::new();
        assert!(manager.update(1_000.0, 1_000.0, &mut events));
        assert_eq!(
            events,
            [
                CrossedBoundary(7, Start, Forward),
                CrossedBoundary(7, End, Forward)
            ]
        );
    }

    #[test]
    fn wide_window_keeps_overlapping_entries_alive() {
        let mut manager = scenario();
        manager.update(90.0, 210.0, &mut ());
        assert_eq!(manager.alive_entries().collect::<Vec<_>>(), [1, 2, 3]);
        manager.update(100.0, 199.0, &mut ());
        assert_eq!(manager.alive_entries().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn inverted_window_collapses_to_its_start() {
        let mut manager = scenario();
        assert!(manager.update(60.0, 40.0, &mut ()));
        assert_eq!(manager.window(), Some(LifetimeWindow::new(60.0, 60.0)));
        assert_eq!(manager.alive_entries().collect::<Vec<_>>(), [1, 2]);
        assert!(!manager.update(60.0, 40.0, &mut ()));
    }

    #[test]
    fn add_after_update_classifies_immediately() {
        let mut manager = scenario();
        manager.update(60.0, 60.0, &mut ());

        let mut events = Vec::new();
        manager.add_entry(4, LifetimeWindow::new(55.0, 65.0), &mut events);
        assert_eq!(events, [BecameAlive(4)]);
        assert!(manager.is_alive(4));
    }

    #[test]
    fn remove_alive_entry_reports_death() {
        let mut manager = scenario();
        manager.update(60.0, 60.0, &mut ());

        let mut events = Vec::new();
        assert!(manager.remove_entry(1, &mut events));
        assert_eq!(events, [BecameDead(1)]);
        assert!(!manager.remove_entry(1, &mut events));
        assert!(!manager.contains(1));

        events.clear();
        assert!(manager.remove_entry(3, &mut events));
        assert!(events.is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn set_window_requeues_entry() {
        let mut manager = scenario();
        manager.update(250.0, 250.0, &mut ());
        assert!(!manager.is_alive(1));

        assert!(manager.set_window(1, LifetimeWindow::new(0.0, 1_000.0)));
        assert!(!manager.is_alive(1));

        let mut events = Vec::new();
        assert!(manager.update(250.0, 250.0, &mut events));
        assert_eq!(
            events,
            [BecameAlive(1), CrossedBoundary(1, End, Backward)]
        );
        assert!(!manager.set_window(42, LifetimeWindow::ALWAYS));
    }

    #[test]
    fn set_window_on_alive_entry_can_kill_it() {
        let mut manager = scenario();
        manager.update(60.0, 60.0, &mut ());
        manager.set_window(2, LifetimeWindow::new(500.0, 600.0));

        let mut events = Vec::new();
        manager.update(60.0, 60.0, &mut events);
        assert_eq!(
            events,
            [BecameDead(2), CrossedBoundary(2, Start, Backward)]
        );

        manager.update(550.0, 550.0, &mut ());
        assert!(manager.is_alive(2));
    }

    #[test]
    fn always_window_is_alive_everywhere() {
        let mut manager = LifetimeEntryManager::new();
        manager.add_entry(1_u32, LifetimeWindow::ALWAYS, &mut ());
        for t in [-1e9, 0.0, 1e9] {
            manager.update(t, t, &mut ());
            assert!(manager.is_alive(1));
        }
    }

    #[test]
    fn entries_added_before_first_update_are_pending() {
        let manager = scenario();
        assert_eq!(manager.state(1), Some(LifetimeState::New));
        assert_eq!(manager.alive_count(), 0);
        assert!(manager.window().is_none());
    }

    #[test]
    #[should_panic(expected = "entry already registered")]
    fn duplicate_add_panics() {
        let mut manager = scenario();
        manager.add_entry(1, LifetimeWindow::new(0.0, 1.0), &mut ());
    }
}
