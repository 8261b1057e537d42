// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hit objects and the beatmap that owns them.
//!
//! A [`Beatmap`] is an arena of [`HitObject`]s addressed by generational
//! [`HitObjectId`] handles. Sliders own generated nested objects (head,
//! ticks, repeats, tail) that are regenerated whenever defaults are applied,
//! which happens on insertion and after every timing edit.
//!
//! Mutations are recorded as [`HitObjectChange`] events. Containers drain
//! them once per tick with [`Beatmap::take_changes`] and react synchronously.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Point;

/// The closed set of hit object kinds.
///
/// Pool lookup is keyed by kind; see [`HitObjectKind::fallback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HitObjectKind {
    /// A single tap.
    Circle,
    /// A held path with nested objects.
    Slider,
    /// A spin lasting `duration`.
    Spinner,
    /// The start of a slider.
    SliderHead,
    /// An intermediate scoring point along a slider span.
    SliderTick,
    /// A reversal at the end of a non-final slider span.
    SliderRepeat,
    /// The end of a slider.
    SliderTail,
}

impl HitObjectKind {
    /// Returns the kind whose pool may stand in for this one when no pool is
    /// registered for it.
    #[must_use]
    pub const fn fallback(self) -> Option<Self> {
        match self {
            Self::SliderHead => Some(Self::Circle),
            Self::SliderRepeat | Self::SliderTail => Some(Self::SliderTick),
            Self::Circle | Self::Slider | Self::Spinner | Self::SliderTick => None,
        }
    }

    /// Returns whether objects of this kind only exist nested in a parent.
    #[must_use]
    pub const fn is_nested(self) -> bool {
        matches!(
            self,
            Self::SliderHead | Self::SliderTick | Self::SliderRepeat | Self::SliderTail
        )
    }
}

/// A handle to a hit object in a [`Beatmap`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HitObjectId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl HitObjectId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for HitObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HitObjectId({}@gen{})", self.idx, self.generation)
    }
}

/// A timed object in a beatmap.
#[derive(Clone, Debug, PartialEq)]
pub struct HitObject {
    kind: HitObjectKind,
    start_time: f64,
    span_duration: f64,
    repeat_count: u32,
    tick_interval: f64,
    position: Point,
    transient: bool,
    parent: Option<HitObjectId>,
    nested: Vec<HitObjectId>,
}

impl HitObject {
    fn new(kind: HitObjectKind, start_time: f64, span_duration: f64, position: Point) -> Self {
        Self {
            kind,
            start_time,
            span_duration,
            repeat_count: 0,
            tick_interval: 0.0,
            position,
            transient: false,
            parent: None,
            nested: Vec::new(),
        }
    }

    /// Creates a circle.
    #[must_use]
    pub fn circle(start_time: f64, position: Point) -> Self {
        Self::new(HitObjectKind::Circle, start_time, 0.0, position)
    }

    /// Creates a slider whose path takes `span_duration` to traverse once.
    #[must_use]
    pub fn slider(start_time: f64, span_duration: f64, position: Point) -> Self {
        Self::new(HitObjectKind::Slider, start_time, span_duration, position)
    }

    /// Creates a spinner.
    #[must_use]
    pub fn spinner(start_time: f64, duration: f64) -> Self {
        Self::new(HitObjectKind::Spinner, start_time, duration, Point::ORIGIN)
    }

    /// Sets how many times a slider reverses.
    #[must_use]
    pub fn with_repeats(mut self, repeat_count: u32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    /// Sets the distance in time between slider ticks. Zero disables ticks.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: f64) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Marks the object as transient (e.g. a placement preview). Containers
    /// never give transient objects an entry.
    #[must_use]
    pub fn into_transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> HitObjectKind {
        self.kind
    }

    /// Returns the start time.
    #[must_use]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Returns the total duration over all spans.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.span_duration * f64::from(self.repeat_count + 1)
    }

    /// Returns the end time.
    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration()
    }

    /// Returns the number of reversals.
    #[must_use]
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Returns the position on the playfield.
    #[must_use]
    pub fn position(&self) -> Point {
        self.position
    }

    /// Returns whether the object is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Returns the parent of a nested object.
    #[must_use]
    pub fn parent(&self) -> Option<HitObjectId> {
        self.parent
    }

    /// Returns the nested objects generated by the last defaults application.
    #[must_use]
    pub fn nested(&self) -> &[HitObjectId] {
        &self.nested
    }
}

/// A mutation recorded by a [`Beatmap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitObjectChange {
    /// A root hit object was added.
    Added(HitObjectId),
    /// A root hit object was removed, together with its nested objects.
    Removed(HitObjectId),
    /// The start time of a root hit object changed.
    StartTimeChanged(HitObjectId),
    /// Defaults were re-applied; the nested objects were regenerated.
    DefaultsApplied(HitObjectId),
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    object: Option<HitObject>,
}

/// An arena of hit objects.
#[derive(Clone, Debug, Default)]
pub struct Beatmap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    roots: Vec<HitObjectId>,
    changes: Vec<HitObjectChange>,
}

impl Beatmap {
    /// Creates an empty beatmap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root hit object, generating its nested objects.
    pub fn add(&mut self, object: HitObject) -> HitObjectId {
        let id = self.insert(object);
        self.roots.push(id);
        self.generate_nested(id);
        self.changes.push(HitObjectChange::Added(id));
        id
    }

    /// Removes a root hit object and its nested objects.
    ///
    /// Returns `false` if the handle is stale or refers to a nested object.
    pub fn remove(&mut self, id: HitObjectId) -> bool {
        let Some(pos) = self.roots.iter().position(|&r| r == id) else {
            return false;
        };
        self.roots.remove(pos);
        self.free_nested(id);
        self.free(id);
        self.changes.push(HitObjectChange::Removed(id));
        true
    }

    /// Moves a root hit object in time and re-applies its defaults.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn set_start_time(&mut self, id: HitObjectId, start_time: f64) {
        let object = self.object_mut(id);
        if object.start_time == start_time {
            return;
        }
        object.start_time = start_time;
        self.changes.push(HitObjectChange::StartTimeChanged(id));
        self.apply_defaults(id);
    }

    /// Changes how many times a slider reverses and re-applies its defaults.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn set_repeat_count(&mut self, id: HitObjectId, repeat_count: u32) {
        let object = self.object_mut(id);
        if object.repeat_count == repeat_count {
            return;
        }
        object.repeat_count = repeat_count;
        self.apply_defaults(id);
    }

    /// Regenerates the nested objects of a root hit object.
    ///
    /// The old nested objects are freed; their handles become stale.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn apply_defaults(&mut self, id: HitObjectId) {
        self.free_nested(id);
        self.generate_nested(id);
        self.changes.push(HitObjectChange::DefaultsApplied(id));
    }

    /// Returns the hit object for a handle, or `None` if it is stale.
    #[must_use]
    pub fn get(&self, id: HitObjectId) -> Option<&HitObject> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    /// Returns whether the handle refers to a live hit object.
    #[must_use]
    pub fn contains(&self, id: HitObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the root hit objects in insertion order.
    #[must_use]
    pub fn roots(&self) -> &[HitObjectId] {
        &self.roots
    }

    /// Returns the number of root hit objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns whether the beatmap has no hit objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Drains the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<HitObjectChange> {
        core::mem::take(&mut self.changes)
    }

    fn object_mut(&mut self, id: HitObjectId) -> &mut HitObject {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_mut())
            .unwrap_or_else(|| panic!("stale HitObjectId: {id:?}"))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot indices are u32 handles; a beatmap never approaches 2^32 objects"
    )]
    fn insert(&mut self, object: HitObject) -> HitObjectId {
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation += 1;
            slot.object = Some(object);
            HitObjectId {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            HitObjectId { idx, generation: 0 }
        }
    }

    fn free(&mut self, id: HitObjectId) {
        let slot = &mut self.slots[id.idx as usize];
        slot.object = None;
        slot.generation += 1;
        self.free_list.push(id.idx);
    }

    fn free_nested(&mut self, id: HitObjectId) {
        let nested = core::mem::take(&mut self.object_mut(id).nested);
        for child in nested {
            self.free_nested(child);
            self.free(child);
        }
    }

    fn generate_nested(&mut self, id: HitObjectId) {
        let parent = self.object_mut(id).clone();
        if parent.kind != HitObjectKind::Slider {
            return;
        }

        let mut nested = Vec::new();
        let mut push = |beatmap: &mut Self, kind, time| {
            let mut object = HitObject::new(kind, time, 0.0, parent.position);
            object.parent = Some(id);
            nested.push(beatmap.insert(object));
        };

        push(self, HitObjectKind::SliderHead, parent.start_time);
        for span in 0..=parent.repeat_count {
            let span_start = parent.start_time + parent.span_duration * f64::from(span);
            if parent.tick_interval > 0.0 {
                let mut offset = parent.tick_interval;
                while offset < parent.span_duration {
                    push(self, HitObjectKind::SliderTick, span_start + offset);
                    offset += parent.tick_interval;
                }
            }
            if span < parent.repeat_count {
                push(
                    self,
                    HitObjectKind::SliderRepeat,
                    span_start + parent.span_duration,
                );
            }
        }
        push(self, HitObjectKind::SliderTail, parent.end_time());

        self.object_mut(id).nested = nested;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(beatmap: &Beatmap, id: HitObjectId) -> Vec<HitObjectKind> {
        beatmap
            .get(id)
            .unwrap()
            .nested()
            .iter()
            .map(|&n| beatmap.get(n).unwrap().kind())
            .collect()
    }

    #[test]
    fn slider_generates_nested_objects() {
        let mut beatmap = Beatmap::new();
        let slider = beatmap.add(
            HitObject::slider(1000.0, 300.0, Point::ORIGIN)
                .with_repeats(1)
                .with_tick_interval(100.0),
        );

        use HitObjectKind::{SliderHead, SliderRepeat, SliderTail, SliderTick};
        assert_eq!(
            kinds(&beatmap, slider),
            [
                SliderHead,
                SliderTick,
                SliderTick,
                SliderRepeat,
                SliderTick,
                SliderTick,
                SliderTail
            ]
        );
        let object = beatmap.get(slider).unwrap();
        assert_eq!(object.end_time(), 1600.0);
        let tail = *object.nested().last().unwrap();
        assert_eq!(beatmap.get(tail).unwrap().start_time(), 1600.0);
        assert_eq!(beatmap.get(tail).unwrap().parent(), Some(slider));
    }

    #[test]
    fn circle_has_no_nested_objects() {
        let mut beatmap = Beatmap::new();
        let circle = beatmap.add(HitObject::circle(0.0, Point::new(256.0, 192.0)));
        assert!(beatmap.get(circle).unwrap().nested().is_empty());
        assert_eq!(beatmap.get(circle).unwrap().end_time(), 0.0);
    }

    #[test]
    fn set_start_time_regenerates_nested_objects() {
        let mut beatmap = Beatmap::new();
        let slider = beatmap.add(HitObject::slider(0.0, 200.0, Point::ORIGIN));
        let old_head = beatmap.get(slider).unwrap().nested()[0];
        let _ = beatmap.take_changes();

        beatmap.set_start_time(slider, 500.0);

        assert!(!beatmap.contains(old_head));
        let new_head = beatmap.get(slider).unwrap().nested()[0];
        assert_eq!(beatmap.get(new_head).unwrap().start_time(), 500.0);
        assert_eq!(
            beatmap.take_changes(),
            [
                HitObjectChange::StartTimeChanged(slider),
                HitObjectChange::DefaultsApplied(slider),
            ]
        );
    }

    #[test]
    fn unchanged_start_time_records_nothing() {
        let mut beatmap = Beatmap::new();
        let circle = beatmap.add(HitObject::circle(100.0, Point::ORIGIN));
        let _ = beatmap.take_changes();
        beatmap.set_start_time(circle, 100.0);
        assert!(beatmap.take_changes().is_empty());
    }

    #[test]
    fn remove_frees_nested_objects() {
        let mut beatmap = Beatmap::new();
        let slider = beatmap.add(HitObject::slider(0.0, 200.0, Point::ORIGIN));
        let nested = beatmap.get(slider).unwrap().nested().to_vec();

        assert!(beatmap.remove(slider));
        assert!(!beatmap.contains(slider));
        assert!(nested.iter().all(|&n| !beatmap.contains(n)));
        assert!(!beatmap.remove(slider));
        assert!(beatmap.is_empty());
    }

    #[test]
    fn nested_objects_cannot_be_removed_directly() {
        let mut beatmap = Beatmap::new();
        let slider = beatmap.add(HitObject::slider(0.0, 200.0, Point::ORIGIN));
        let head = beatmap.get(slider).unwrap().nested()[0];
        assert!(!beatmap.remove(head));
        assert!(beatmap.contains(head));
    }

    #[test]
    fn fallback_chain() {
        assert_eq!(HitObjectKind::SliderHead.fallback(), Some(HitObjectKind::Circle));
        assert_eq!(HitObjectKind::SliderTail.fallback(), Some(HitObjectKind::SliderTick));
        assert_eq!(HitObjectKind::Circle.fallback(), None);
        assert!(HitObjectKind::SliderRepeat.is_nested());
        assert!(!HitObjectKind::Spinner.is_nested());
    }

    #[test]
    #[should_panic(expected = "stale HitObjectId")]
    fn stale_handle_panics_on_edit() {
        let mut beatmap = Beatmap::new();
        let circle = beatmap.add(HitObject::circle(0.0, Point::ORIGIN));
        beatmap.remove(circle);
        beatmap.set_start_time(circle, 10.0);
    }
}
