// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifetime entries and the arena that owns them.

use alloc::vec::Vec;
use core::fmt;
use core::ops::Index;

use crate::beatmap::{HitObject, HitObjectId};

/// A half-open time interval `[start, end)`.
///
/// An interval with `start > end` is valid and never contains any time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifetimeWindow {
    /// Inclusive start.
    pub start: f64,
    /// Exclusive end.
    pub end: f64,
}

impl LifetimeWindow {
    /// The window that contains every time.
    pub const ALWAYS: Self = Self::new(f64::NEG_INFINITY, f64::INFINITY);

    /// Creates a window.
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Returns whether `t` lies inside the window.
    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// A handle to a [`LifetimeEntry`] in an [`EntryStore`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl EntryId {
    /// Returns a stable 64-bit encoding of the handle, used in traces.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.idx as u64
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({}@gen{})", self.idx, self.generation)
    }
}

/// The interval-tracked unit wrapping one hit object.
///
/// The entry remembers the window that was *requested* for it even while
/// [`keep_alive`](Self::set_keep_alive) forces the effective window to
/// [`LifetimeWindow::ALWAYS`], so turning keep-alive off restores it exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct LifetimeEntry {
    hit_object: HitObjectId,
    lifetime_start: f64,
    lifetime_end: f64,
    keep_alive: bool,
    initial_lifetime_offset: f64,
    trailing_lifetime_offset: f64,
    pub(crate) children: Vec<EntryId>,
}

impl LifetimeEntry {
    /// How long before its hit object starts an entry becomes alive, unless
    /// configured otherwise.
    pub const DEFAULT_INITIAL_LIFETIME_OFFSET: f64 = 10_000.0;

    /// Creates an entry for a hit object spanning `[start_time, end_time]`
    /// with the default offsets.
    #[must_use]
    pub fn new(hit_object: HitObjectId, start_time: f64, end_time: f64) -> Self {
        Self::with_offsets(
            hit_object,
            start_time,
            end_time,
            Self::DEFAULT_INITIAL_LIFETIME_OFFSET,
            0.0,
        )
    }

    /// Creates an entry with explicit lead-in and trailing offsets.
    #[must_use]
    pub fn with_offsets(
        hit_object: HitObjectId,
        start_time: f64,
        end_time: f64,
        initial_lifetime_offset: f64,
        trailing_lifetime_offset: f64,
    ) -> Self {
        let mut entry = Self {
            hit_object,
            lifetime_start: 0.0,
            lifetime_end: 0.0,
            keep_alive: false,
            initial_lifetime_offset,
            trailing_lifetime_offset,
            children: Vec::new(),
        };
        entry.refresh_lifetime(start_time, end_time);
        entry
    }

    /// Creates an entry for `object`, deriving its window from the object's
    /// start and end time.
    #[must_use]
    pub fn for_hit_object(
        id: HitObjectId,
        object: &HitObject,
        initial_lifetime_offset: f64,
        trailing_lifetime_offset: f64,
    ) -> Self {
        Self::with_offsets(
            id,
            object.start_time(),
            object.end_time(),
            initial_lifetime_offset,
            trailing_lifetime_offset,
        )
    }

    /// Re-derives the requested window from the hit object's times.
    ///
    /// The end never precedes the start.
    pub fn refresh_lifetime(&mut self, start_time: f64, end_time: f64) {
        self.lifetime_start = start_time - self.initial_lifetime_offset;
        self.lifetime_end = (end_time + self.trailing_lifetime_offset).max(self.lifetime_start);
    }

    /// Returns the wrapped hit object.
    #[must_use]
    pub fn hit_object(&self) -> HitObjectId {
        self.hit_object
    }

    /// Returns the requested lifetime start.
    #[must_use]
    pub fn lifetime_start(&self) -> f64 {
        self.lifetime_start
    }

    /// Returns the requested lifetime end.
    #[must_use]
    pub fn lifetime_end(&self) -> f64 {
        self.lifetime_end
    }

    /// Sets the requested lifetime start.
    ///
    /// Only this entry changes. If it is tracked, pass the new
    /// [`window`](Self::window) to the container's `set_entry_window` (or
    /// [`LifetimeEntryManager::set_window`](crate::lifetime::LifetimeEntryManager::set_window)).
    pub fn set_lifetime_start(&mut self, t: f64) {
        self.lifetime_start = t;
    }

    /// Sets the requested lifetime end.
    ///
    /// Only this entry changes. If it is tracked, pass the new
    /// [`window`](Self::window) to the container's `set_entry_window` (or
    /// [`LifetimeEntryManager::set_window`](crate::lifetime::LifetimeEntryManager::set_window)).
    pub fn set_lifetime_end(&mut self, t: f64) {
        self.lifetime_end = t;
    }

    /// Returns the requested window, ignoring keep-alive.
    #[must_use]
    pub fn requested_window(&self) -> LifetimeWindow {
        LifetimeWindow::new(self.lifetime_start, self.lifetime_end)
    }

    /// Returns the window a lifetime manager should classify this entry by.
    #[must_use]
    pub fn window(&self) -> LifetimeWindow {
        if self.keep_alive {
            LifetimeWindow::ALWAYS
        } else {
            self.requested_window()
        }
    }

    /// Returns whether keep-alive is active.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Forces the entry alive regardless of its requested window.
    ///
    /// Only this entry changes. If it is tracked, pass the new
    /// [`window`](Self::window) to the container's `set_entry_window` (or
    /// [`LifetimeEntryManager::set_window`](crate::lifetime::LifetimeEntryManager::set_window)).
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Returns the lead-in before the hit object's start time.
    #[must_use]
    pub fn initial_lifetime_offset(&self) -> f64 {
        self.initial_lifetime_offset
    }

    /// Sets the lead-in. Takes effect on the next
    /// [`refresh_lifetime`](Self::refresh_lifetime).
    pub fn set_initial_lifetime_offset(&mut self, offset: f64) {
        self.initial_lifetime_offset = offset;
    }

    /// Returns the time kept after the hit object's end time.
    #[must_use]
    pub fn trailing_lifetime_offset(&self) -> f64 {
        self.trailing_lifetime_offset
    }

    /// Returns the nested child entries, in the order they were added.
    #[must_use]
    pub fn children(&self) -> &[EntryId] {
        &self.children
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    entry: Option<LifetimeEntry>,
}

/// Generational arena owning every [`LifetimeEntry`] of a container.
///
/// Everything else holds [`EntryId`]s.
#[derive(Clone, Debug, Default)]
pub struct EntryStore {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
}

impl EntryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry and returns its handle.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot indices are u32 handles; a store never approaches 2^32 entries"
    )]
    pub fn insert(&mut self, entry: LifetimeEntry) -> EntryId {
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.entry = Some(entry);
            EntryId {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            EntryId { idx, generation: 0 }
        }
    }

    /// Removes an entry, returning it. Returns `None` for stale handles.
    pub fn remove(&mut self, id: EntryId) -> Option<LifetimeEntry> {
        let slot = self.slots.get_mut(id.idx as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation += 1;
        self.free_list.push(id.idx);
        self.len -= 1;
        Some(entry)
    }

    /// Returns the entry for a handle, or `None` if it is stale.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&LifetimeEntry> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    /// Returns the entry for a handle mutably, or `None` if it is stale.
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut LifetimeEntry> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Returns whether the handle refers to a live entry.
    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Index<EntryId> for EntryStore {
    type Output = LifetimeEntry;

    fn index(&self, id: EntryId) -> &LifetimeEntry {
        self.get(id)
            .unwrap_or_else(|| panic!("stale EntryId: {id:?}"))
    }
}
