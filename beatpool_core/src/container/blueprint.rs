// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The editor timeline's blueprint container.

use alloc::vec::Vec;
use core::mem;

use kurbo::Vec2;

use super::hit_object::HitObjectUsage;
use super::pooled::{DrawableHooks, PooledEntryDrawableContainer};
use crate::beatmap::{Beatmap, HitObjectChange, HitObjectId, HitObjectKind};
use crate::clock::FrameClock;
use crate::config::{ContainerConfig, PoolConfig};
use crate::lifetime::{EntryId, EntryStore, HitObjectEntryManager, LifetimeEntry};
use crate::pool::{Drawable, PoolRegistry, Poolable};
use crate::trace::Tracer;
use crate::tree::{NodeId, RenderTree};

/// Vertical distance between stacked blueprints.
const STACK_SPACING: f64 = 8.0;

/// Keeps a blueprint below any hit object drawable starting at the same time.
const DEPTH_BIAS: f64 = 0.001;

/// The selection and interaction handle of one hit object on the timeline.
#[derive(Debug)]
pub struct HitObjectBlueprint {
    node: NodeId,
    pool_kind: HitObjectKind,
    entry: Option<EntryId>,
    hit_object: Option<HitObjectId>,
    start_time: f64,
    end_time: f64,
    stack: u32,
    selected: bool,
}

impl HitObjectBlueprint {
    /// Returns the render-tree node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the entry the blueprint is bound to.
    #[must_use]
    pub fn entry(&self) -> Option<EntryId> {
        self.entry
    }

    /// Returns the hit object the blueprint represents.
    #[must_use]
    pub fn hit_object(&self) -> Option<HitObjectId> {
        self.hit_object
    }

    /// Returns the start time of the hit object.
    #[must_use]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Returns the end time of the hit object.
    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Returns how many overlapping blueprints this one is stacked on.
    #[must_use]
    pub fn stack(&self) -> u32 {
        self.stack
    }

    /// Returns whether the blueprint is selected.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Drops interaction state when the hit object leaves the timeline.
    fn on_killed(&mut self) {
        self.selected = false;
    }
}

impl Drawable for HitObjectBlueprint {
    fn node(&self) -> NodeId {
        self.node
    }
}

impl Poolable for HitObjectBlueprint {
    fn create(kind: HitObjectKind, tree: &mut RenderTree) -> Self {
        Self {
            node: tree.create_node(),
            pool_kind: kind,
            entry: None,
            hit_object: None,
            start_time: 0.0,
            end_time: 0.0,
            stack: 0,
            selected: false,
        }
    }

    fn pool_kind(&self) -> HitObjectKind {
        self.pool_kind
    }

    fn on_released(&mut self, tree: &mut RenderTree) {
        self.entry = None;
        self.hit_object = None;
        self.stack = 0;
        self.selected = false;
        tree.set_offset(self.node, Vec2::ZERO);
    }
}

type Inner = PooledEntryDrawableContainer<EntryId, HitObjectBlueprint>;

struct TimelineHooks<'a> {
    tree: &'a mut RenderTree,
    root: NodeId,
    beatmap: &'a Beatmap,
    store: &'a EntryStore,
    pools: &'a mut PoolRegistry<HitObjectBlueprint>,
    usage: &'a mut Vec<HitObjectUsage>,
}

impl DrawableHooks<EntryId, HitObjectBlueprint> for TimelineHooks<'_> {
    fn render_target(&mut self) -> (&mut RenderTree, NodeId) {
        (&mut *self.tree, self.root)
    }

    fn get_drawable(&mut self, entry: EntryId) -> HitObjectBlueprint {
        let id = self.store[entry].hit_object();
        let object = self
            .beatmap
            .get(id)
            .unwrap_or_else(|| panic!("entry {entry:?} outlived its hit object {id:?}"));
        let mut blueprint = self
            .pools
            .acquire(object.kind(), self.tree)
            .unwrap_or_else(|| panic!("no pool serves {:?}", object.kind()));
        blueprint.entry = Some(entry);
        blueprint.hit_object = Some(id);
        blueprint.start_time = object.start_time();
        blueprint.end_time = object.end_time();
        blueprint
    }

    fn release_drawable(&mut self, _entry: EntryId, drawable: HitObjectBlueprint) {
        self.pools.release(drawable, self.tree);
    }

    fn add_drawable(&mut self, _entry: EntryId, drawable: &HitObjectBlueprint) {
        self.tree
            .set_depth(drawable.node, drawable.start_time - DEPTH_BIAS);
        self.tree.add_child(self.root, drawable.node);
        if let Some(id) = drawable.hit_object {
            self.usage.push(HitObjectUsage::Began(id));
        }
    }

    fn remove_drawable(&mut self, entry: EntryId, mut drawable: HitObjectBlueprint) {
        drawable.on_killed();
        if self.tree.parent(drawable.node).is_some() {
            self.tree.remove_from_parent(drawable.node);
        }
        if let Some(id) = drawable.hit_object {
            self.usage.push(HitObjectUsage::Finished(id));
        }
        self.release_drawable(entry, drawable);
    }
}

/// Shows a blueprint for every alive root hit object on the editor timeline.
///
/// Blueprints are pooled only. After every update, overlapping blueprints are
/// stacked: walking them by start time, each one that starts before the
/// previous one ends sits one step above it, and any gap resets the stack.
/// This is a greedy run count, not an interval colouring.
#[derive(Debug)]
pub struct HitObjectBlueprintContainer {
    inner: Inner,
    store: EntryStore,
    nesting: HitObjectEntryManager,
    pools: PoolRegistry<HitObjectBlueprint>,
    root: NodeId,
    usage: Vec<HitObjectUsage>,
}

impl HitObjectBlueprintContainer {
    /// Creates a container with the [`timeline`](ContainerConfig::timeline)
    /// preset.
    pub fn new(tree: &mut RenderTree) -> Self {
        Self::with_config(tree, ContainerConfig::timeline())
    }

    /// Creates a container with an explicit configuration.
    pub fn with_config(tree: &mut RenderTree, config: ContainerConfig) -> Self {
        Self {
            inner: Inner::new(config),
            store: EntryStore::new(),
            nesting: HitObjectEntryManager::new(),
            pools: PoolRegistry::new(),
            root: tree.create_node(),
            usage: Vec::new(),
        }
    }

    /// Returns the node blueprints are attached under.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Registers the blueprint pool for one kind of hit object.
    ///
    /// # Panics
    ///
    /// Panics if a pool is already registered for `kind`.
    pub fn register_pool(&mut self, tree: &mut RenderTree, kind: HitObjectKind, config: PoolConfig) {
        self.pools.register(kind, config, tree);
    }

    /// Returns the pools.
    #[must_use]
    pub fn pools(&self) -> &PoolRegistry<HitObjectBlueprint> {
        &self.pools
    }

    /// Returns the container's clock mutably.
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        self.inner.clock_mut()
    }

    /// Starts showing a root hit object. Returns `None` for transient hit
    /// objects and kinds without a blueprint pool.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the hit object was already added.
    pub fn add_hit_object(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        id: HitObjectId,
    ) -> Option<EntryId> {
        let object = beatmap
            .get(id)
            .unwrap_or_else(|| panic!("stale HitObjectId: {id:?}"));
        if object.is_transient() || self.pools.lookup(object.kind()).is_none() {
            return None;
        }
        let config = self.inner.config();
        let entry = self.nesting.add(
            &mut self.store,
            LifetimeEntry::for_hit_object(
                id,
                object,
                config.initial_lifetime_offset,
                config.trailing_lifetime_offset,
            ),
            None,
        );
        let window = self.store[entry].window();
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.add_entry(entry, window, &mut hooks);
        Some(entry)
    }

    /// Stops showing a hit object. Returns `false` if it has no blueprint
    /// entry.
    pub fn remove_hit_object(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        id: HitObjectId,
    ) -> bool {
        let Some(entry) = self.nesting.get(id) else {
            return false;
        };
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.remove_entry(entry, &mut hooks);
        self.nesting.remove(&mut self.store, entry)
    }

    /// Re-derives the lifetime of a hit object whose timing changed.
    ///
    /// The blueprint's depth follows immediately; stacking follows on the
    /// next update.
    pub fn on_timing_changed(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        id: HitObjectId,
    ) -> bool {
        let (Some(entry), Some(object)) = (self.nesting.get(id), beatmap.get(id)) else {
            return false;
        };
        let Some(lifetime) = self.store.get_mut(entry) else {
            return false;
        };
        lifetime.refresh_lifetime(object.start_time(), object.end_time());
        let window = lifetime.window();
        self.inner.set_entry_window(entry, window);

        if let Some(blueprint) = self.inner.drawable_mut(entry) {
            blueprint.start_time = object.start_time();
            blueprint.end_time = object.end_time();
            tree.set_depth(blueprint.node, blueprint.start_time - DEPTH_BIAS);
        }
        true
    }

    /// Applies a batch of beatmap changes.
    pub fn apply_beatmap_changes(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        changes: &[HitObjectChange],
    ) {
        for &change in changes {
            match change {
                HitObjectChange::Added(id) => {
                    if beatmap.contains(id) && self.nesting.get(id).is_none() {
                        self.add_hit_object(tree, beatmap, id);
                    }
                }
                HitObjectChange::Removed(id) => {
                    self.remove_hit_object(tree, beatmap, id);
                }
                // Regenerated nested objects can change the end time.
                HitObjectChange::StartTimeChanged(id) | HitObjectChange::DefaultsApplied(id) => {
                    self.on_timing_changed(tree, beatmap, id);
                }
            }
        }
    }

    /// Reclassifies hit objects around `current_time` and restacks the alive
    /// blueprints.
    pub fn update(&mut self, tree: &mut RenderTree, beatmap: &Beatmap, current_time: f64) -> bool {
        self.update_traced(tree, beatmap, current_time, &mut Tracer::none())
    }

    /// Like [`update`](Self::update), reporting to `tracer`.
    pub fn update_traced(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        current_time: f64,
        tracer: &mut Tracer<'_>,
    ) -> bool {
        let (inner, mut hooks) = self.split(tree, beatmap);
        let changed = inner.update_traced(current_time, &mut hooks, tracer);
        self.restack(tree);
        changed
    }

    /// Advances the clock to `host_nanos` and updates around the resulting
    /// time.
    pub fn check_children_life(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        host_nanos: u64,
    ) -> bool {
        let (inner, mut hooks) = self.split(tree, beatmap);
        let changed = inner.check_children_life(host_nanos, &mut hooks);
        self.restack(tree);
        changed
    }

    /// Removes every hit object.
    pub fn clear(&mut self, tree: &mut RenderTree, beatmap: &Beatmap) {
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.clear(&mut hooks);
        let roots: Vec<EntryId> = self.nesting.roots().map(|(_, entry)| entry).collect();
        for entry in roots {
            self.nesting.remove(&mut self.store, entry);
        }
    }

    /// Returns the alive blueprints by ascending start time.
    #[must_use]
    pub fn all_objects(&self) -> Vec<&HitObjectBlueprint> {
        let mut objects: Vec<&HitObjectBlueprint> =
            self.inner.alive_entries().map(|(_, b)| b).collect();
        objects.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        objects
    }

    /// Returns the blueprint of an alive hit object.
    #[must_use]
    pub fn blueprint_of(&self, id: HitObjectId) -> Option<&HitObjectBlueprint> {
        self.inner.drawable(self.nesting.get(id)?)
    }

    /// Returns the stack height of an alive hit object's blueprint.
    #[must_use]
    pub fn stack_of(&self, id: HitObjectId) -> Option<u32> {
        self.blueprint_of(id).map(HitObjectBlueprint::stack)
    }

    /// Returns the number of alive blueprints.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.inner.alive_count()
    }

    /// Selects or deselects the blueprint of an alive hit object.
    ///
    /// Returns `false` if the hit object has no alive blueprint. Selection is
    /// dropped when the blueprint dies.
    pub fn set_selected(&mut self, id: HitObjectId, selected: bool) -> bool {
        let Some(entry) = self.nesting.get(id) else {
            return false;
        };
        let Some(blueprint) = self.inner.drawable_mut(entry) else {
            return false;
        };
        blueprint.selected = selected;
        true
    }

    /// Drains the usage notifications recorded since the last call.
    pub fn take_usage_events(&mut self) -> Vec<HitObjectUsage> {
        mem::take(&mut self.usage)
    }

    /// Walks alive blueprints by ascending start time, comparing each with
    /// the one before it. For the usual overlapping run this yields the same
    /// heights as walking by descending depth against the next earlier item,
    /// with the run's earliest blueprint at height 0.
    fn restack(&mut self, tree: &mut RenderTree) {
        let mut order: Vec<(f64, f64, EntryId)> = self
            .inner
            .alive_entries()
            .map(|(entry, b)| (b.start_time, b.end_time, entry))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut stack = 0_u32;
        let mut previous_end: Option<f64> = None;
        for (start, end, entry) in order {
            stack = if previous_end.is_some_and(|e| start < e) {
                stack + 1
            } else {
                0
            };
            previous_end = Some(end);
            if let Some(blueprint) = self.inner.drawable_mut(entry) {
                blueprint.stack = stack;
                tree.set_offset(
                    blueprint.node,
                    Vec2::new(0.0, -f64::from(stack) * STACK_SPACING),
                );
            }
        }
    }

    fn split<'a>(
        &'a mut self,
        tree: &'a mut RenderTree,
        beatmap: &'a Beatmap,
    ) -> (&'a mut Inner, TimelineHooks<'a>) {
        (
            &mut self.inner,
            TimelineHooks {
                tree,
                root: self.root,
                beatmap,
                store: &self.store,
                pools: &mut self.pools,
                usage: &mut self.usage,
            },
        )
    }
}
