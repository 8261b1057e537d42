// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The playfield container.
//!
//! [`HitObjectContainer`] gives every alive root hit object a pooled
//! [`DrawableHitObject`], with one nested drawable per nested hit object whose
//! kind has a pool. Drawables are depth-ordered by start time. Callers may
//! also hand in externally owned (non-pooled) drawables, which stay in the
//! tree for as long as they are added and only take part in the alive/dead
//! bookkeeping.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::mem;

use kurbo::Vec2;

use super::pooled::{DrawableHooks, PooledEntryDrawableContainer};
use crate::beatmap::{Beatmap, HitObject, HitObjectChange, HitObjectId, HitObjectKind};
use crate::clock::FrameClock;
use crate::config::{ContainerConfig, PoolConfig, RewindPolicy};
use crate::lifetime::{EntryId, EntryStore, HitObjectEntryManager, LifetimeEntry};
use crate::pool::{Drawable, PoolRegistry, Poolable};
use crate::trace::Tracer;
use crate::tree::{NodeId, RenderTree};

/// A judgement recorded on a drawable hit object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitResult {
    /// Not hit.
    Miss,
    /// Hit late or early.
    Meh,
    /// Hit close to the beat.
    Good,
    /// Hit on the beat.
    Great,
}

/// Mirrors alive/dead transitions at hit object granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitObjectUsage {
    /// A drawable for the hit object entered the tree.
    Began(HitObjectId),
    /// The hit object's drawable left the tree.
    Finished(HitObjectId),
}

/// The visual representation of a hit object on a playfield.
#[derive(Debug)]
pub struct DrawableHitObject {
    node: NodeId,
    pool_kind: HitObjectKind,
    pooled: bool,
    entry: Option<EntryId>,
    hit_object: Option<HitObjectId>,
    start_time: f64,
    nested: Vec<DrawableHitObject>,
    result: Option<HitResult>,
}

impl DrawableHitObject {
    /// Creates an externally owned drawable for `object`, to be handed to
    /// [`HitObjectContainer::add_drawable`].
    pub fn standalone(tree: &mut RenderTree, id: HitObjectId, object: &HitObject) -> Self {
        let mut drawable = Self::blank(object.kind(), false, tree);
        drawable.hit_object = Some(id);
        drawable.start_time = object.start_time();
        tree.set_offset(drawable.node, object.position().to_vec2());
        drawable
    }

    fn blank(kind: HitObjectKind, pooled: bool, tree: &mut RenderTree) -> Self {
        Self {
            node: tree.create_node(),
            pool_kind: kind,
            pooled,
            entry: None,
            hit_object: None,
            start_time: 0.0,
            nested: Vec::new(),
            result: None,
        }
    }

    fn apply(
        &mut self,
        tree: &mut RenderTree,
        entry: EntryId,
        id: HitObjectId,
        object: &HitObject,
        offset: Vec2,
    ) {
        self.entry = Some(entry);
        self.hit_object = Some(id);
        self.start_time = object.start_time();
        tree.set_offset(self.node, offset);
    }

    /// Returns the render-tree node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns whether the drawable came from a pool.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// Returns the entry the drawable is bound to.
    #[must_use]
    pub fn entry(&self) -> Option<EntryId> {
        self.entry
    }

    /// Returns the hit object the drawable shows.
    #[must_use]
    pub fn hit_object(&self) -> Option<HitObjectId> {
        self.hit_object
    }

    /// Returns the start time of the shown hit object.
    #[must_use]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Returns the drawables of the nested hit objects.
    #[must_use]
    pub fn nested(&self) -> &[Self] {
        &self.nested
    }

    /// Returns the judgement, if one was recorded since the drawable became
    /// alive.
    #[must_use]
    pub fn result(&self) -> Option<HitResult> {
        self.result
    }

    /// Records a judgement.
    pub fn apply_result(&mut self, result: HitResult) {
        self.result = Some(result);
    }

    /// Clears judgement state, nested drawables included.
    fn on_killed(&mut self) {
        self.result = None;
        for nested in &mut self.nested {
            nested.on_killed();
        }
    }
}

impl Drawable for DrawableHitObject {
    fn node(&self) -> NodeId {
        self.node
    }
}

impl Poolable for DrawableHitObject {
    fn create(kind: HitObjectKind, tree: &mut RenderTree) -> Self {
        Self::blank(kind, true, tree)
    }

    fn pool_kind(&self) -> HitObjectKind {
        self.pool_kind
    }

    fn on_released(&mut self, tree: &mut RenderTree) {
        debug_assert!(
            self.nested.is_empty(),
            "nested drawables must be released before their parent"
        );
        self.entry = None;
        self.hit_object = None;
        self.result = None;
        tree.set_offset(self.node, Vec2::ZERO);
    }
}

type Inner = PooledEntryDrawableContainer<EntryId, DrawableHitObject>;

/// The playfield's side of the drawable hooks, borrowed for one call.
struct PlayfieldHooks<'a> {
    tree: &'a mut RenderTree,
    root: NodeId,
    beatmap: &'a Beatmap,
    store: &'a mut EntryStore,
    nesting: &'a mut HitObjectEntryManager,
    pools: &'a mut PoolRegistry<DrawableHitObject>,
    non_pooled: &'a BTreeMap<EntryId, HitObjectId>,
    parked: &'a mut BTreeMap<EntryId, DrawableHitObject>,
    usage: &'a mut Vec<HitObjectUsage>,
}

fn hit_object_of<'b>(
    beatmap: &'b Beatmap,
    store: &EntryStore,
    entry: EntryId,
) -> (HitObjectId, &'b HitObject) {
    let id = store[entry].hit_object();
    let object = beatmap
        .get(id)
        .unwrap_or_else(|| panic!("entry {entry:?} outlived its hit object {id:?}"));
    (id, object)
}

fn release_tree(
    tree: &mut RenderTree,
    pools: &mut PoolRegistry<DrawableHitObject>,
    mut drawable: DrawableHitObject,
) {
    for nested in mem::take(&mut drawable.nested) {
        tree.remove_from_parent(nested.node);
        release_tree(tree, pools, nested);
    }
    pools.release(drawable, tree);
}

impl PlayfieldHooks<'_> {
    /// Acquires drawables for the children of `entry` that have a pool and
    /// attaches them under `drawable`.
    fn apply_nested(&mut self, drawable: &mut DrawableHitObject, entry: EntryId, parent: &HitObject) {
        let beatmap = self.beatmap;
        let children = self.store[entry].children().to_vec();
        for child in children {
            let (id, object) = hit_object_of(beatmap, self.store, child);
            let Some(mut nested) = self.pools.acquire(object.kind(), self.tree) else {
                continue;
            };
            nested.apply(self.tree, child, id, object, object.position() - parent.position());
            self.apply_nested(&mut nested, child, object);
            self.tree.set_depth(nested.node, object.start_time());
            self.tree.add_child(drawable.node, nested.node);
            drawable.nested.push(nested);
        }
    }
}

impl DrawableHooks<EntryId, DrawableHitObject> for PlayfieldHooks<'_> {
    fn render_target(&mut self) -> (&mut RenderTree, NodeId) {
        (&mut *self.tree, self.root)
    }

    fn get_drawable(&mut self, entry: EntryId) -> DrawableHitObject {
        if let Some(drawable) = self.parked.remove(&entry) {
            return drawable;
        }
        let beatmap = self.beatmap;
        let (id, object) = hit_object_of(beatmap, self.store, entry);
        let mut drawable = self
            .pools
            .acquire(object.kind(), self.tree)
            .unwrap_or_else(|| panic!("no pool serves {:?}", object.kind()));
        drawable.apply(self.tree, entry, id, object, object.position().to_vec2());
        self.apply_nested(&mut drawable, entry, object);
        drawable
    }

    fn release_drawable(&mut self, entry: EntryId, drawable: DrawableHitObject) {
        if self.non_pooled.contains_key(&entry) {
            self.parked.insert(entry, drawable);
        } else {
            release_tree(self.tree, self.pools, drawable);
        }
    }

    fn add_drawable(&mut self, entry: EntryId, drawable: &DrawableHitObject) {
        // Non-pooled drawables never leave the tree.
        if self.non_pooled.contains_key(&entry) {
            return;
        }
        self.tree.set_depth(drawable.node, drawable.start_time);
        self.tree.add_child(self.root, drawable.node);
        if let Some(id) = drawable.hit_object {
            self.usage.push(HitObjectUsage::Began(id));
        }
    }

    fn remove_drawable(&mut self, entry: EntryId, mut drawable: DrawableHitObject) {
        drawable.on_killed();
        if !self.non_pooled.contains_key(&entry) {
            self.tree.remove_from_parent(drawable.node);
            if let Some(id) = drawable.hit_object {
                self.usage.push(HitObjectUsage::Finished(id));
            }
        }
        self.release_drawable(entry, drawable);
    }

    fn entry_rewound(&mut self, entry: EntryId, policy: RewindPolicy) {
        if policy == RewindPolicy::RemoveWithChildren
            && let Some(id) = self.store.get(entry).map(LifetimeEntry::hit_object)
        {
            self.nesting.on_structure_changed(self.store, id);
        }
    }
}

/// Shows the alive hit objects of a beatmap on a playfield.
///
/// Only root hit objects are tracked for liveness. Nested hit objects get
/// entries in the nesting tree, and their drawables are acquired and released
/// together with their root's drawable.
#[derive(Debug)]
pub struct HitObjectContainer {
    inner: Inner,
    store: EntryStore,
    nesting: HitObjectEntryManager,
    pools: PoolRegistry<DrawableHitObject>,
    root: NodeId,
    non_pooled: BTreeMap<EntryId, HitObjectId>,
    parked: BTreeMap<EntryId, DrawableHitObject>,
    usage: Vec<HitObjectUsage>,
}

impl HitObjectContainer {
    /// Creates a container whose drawables live under a new node in `tree`.
    pub fn new(tree: &mut RenderTree, config: ContainerConfig) -> Self {
        Self {
            inner: Inner::new(config),
            store: EntryStore::new(),
            nesting: HitObjectEntryManager::new(),
            pools: PoolRegistry::new(),
            root: tree.create_node(),
            non_pooled: BTreeMap::new(),
            parked: BTreeMap::new(),
            usage: Vec::new(),
        }
    }

    /// Returns the node drawables are attached under.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Registers the pool for one kind of hit object.
    ///
    /// # Panics
    ///
    /// Panics if a pool is already registered for `kind`.
    pub fn register_pool(&mut self, tree: &mut RenderTree, kind: HitObjectKind, config: PoolConfig) {
        self.pools.register(kind, config, tree);
    }

    /// Returns the pools.
    #[must_use]
    pub fn pools(&self) -> &PoolRegistry<DrawableHitObject> {
        &self.pools
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        self.inner.config()
    }

    /// Sets how far behind the current time hit objects stay alive.
    pub fn set_past_lifetime_extension(&mut self, extension: f64) {
        self.inner.set_past_lifetime_extension(extension);
    }

    /// Sets how far ahead of the current time hit objects become alive.
    pub fn set_future_lifetime_extension(&mut self, extension: f64) {
        self.inner.set_future_lifetime_extension(extension);
    }

    /// Returns the container's clock.
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        self.inner.clock()
    }

    /// Returns the container's clock mutably.
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        self.inner.clock_mut()
    }

    /// Starts showing a root hit object.
    ///
    /// Returns `None` for transient hit objects and for kinds no pool
    /// serves; such hit objects are not shown here.
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
        let entry = self.register(beatmap, id, None);
        let window = self.store[entry].window();
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.add_entry(entry, window, &mut hooks);
        Some(entry)
    }

    /// Stops showing a root hit object, removing its nested entries too.
    ///
    /// Returns `false` if the hit object has no entry here or is nested.
    pub fn remove_hit_object(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        id: HitObjectId,
    ) -> bool {
        let Some(entry) = self.nesting.get(id) else {
            return false;
        };
        if self.nesting.parent_of(entry).is_some() {
            return false;
        }
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.remove_entry(entry, &mut hooks);
        self.nesting.remove(&mut self.store, entry)
    }

    /// Re-derives the lifetime of a hit object after its start time changed
    /// and re-sorts its drawable, pooled or not.
    pub fn on_start_time_changed(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        id: HitObjectId,
    ) -> bool {
        let (Some(entry), Some(object)) = (self.entry_for(id), beatmap.get(id)) else {
            return false;
        };
        self.refresh_window(entry, object);

        let drawable = match self.inner.drawable_mut(entry) {
            Some(drawable) => Some(drawable),
            None => self.parked.get_mut(&entry),
        };
        if let Some(drawable) = drawable {
            drawable.start_time = object.start_time();
            tree.set_depth(drawable.node, drawable.start_time);
        }
        true
    }

    /// Rebuilds the nested entries of a hit object after its nested objects
    /// were regenerated, re-acquiring nested drawables if it is alive.
    ///
    /// Non-pooled drawables have no nested drawables; only their lifetime is
    /// refreshed.
    pub fn on_defaults_applied(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        id: HitObjectId,
    ) -> bool {
        let (Some(entry), Some(object)) = (self.entry_for(id), beatmap.get(id)) else {
            return false;
        };
        if self.non_pooled.contains_key(&entry) {
            self.refresh_window(entry, object);
            return true;
        }

        if let Some(drawable) = self.inner.drawable_mut(entry) {
            for nested in mem::take(&mut drawable.nested) {
                tree.remove_from_parent(nested.node);
                release_tree(tree, &mut self.pools, nested);
            }
        }

        self.nesting.on_structure_changed(&mut self.store, id);
        for &child in object.nested() {
            self.register(beatmap, child, Some(id));
        }
        self.refresh_window(entry, object);

        let (inner, mut hooks) = self.split(tree, beatmap);
        if let Some(drawable) = inner.drawable_mut(entry) {
            hooks.apply_nested(drawable, entry, object);
        }
        true
    }

    /// Applies a batch of beatmap changes, typically from
    /// [`Beatmap::take_changes`].
    pub fn apply_beatmap_changes(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        changes: &[HitObjectChange],
    ) {
        for &change in changes {
            match change {
                HitObjectChange::Added(id) => {
                    // Added and removed again within the batch.
                    if beatmap.contains(id) && self.nesting.get(id).is_none() {
                        self.add_hit_object(tree, beatmap, id);
                    }
                }
                HitObjectChange::Removed(id) => {
                    self.remove_hit_object(tree, beatmap, id);
                }
                HitObjectChange::StartTimeChanged(id) => {
                    self.on_start_time_changed(tree, beatmap, id);
                }
                HitObjectChange::DefaultsApplied(id) => {
                    self.on_defaults_applied(tree, beatmap, id);
                }
            }
        }
    }

    /// Adds an externally owned drawable.
    ///
    /// The drawable is attached to the tree right away and stays attached
    /// until [`remove_drawable`](Self::remove_drawable), whether or not its
    /// entry is alive. Its entry is not part of the nesting tree.
    ///
    /// # Panics
    ///
    /// Panics if the drawable's hit object is not in `beatmap`.
    pub fn add_drawable(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        mut drawable: DrawableHitObject,
    ) -> EntryId {
        let object = drawable
            .hit_object
            .and_then(|id| beatmap.get(id).map(|object| (id, object)));
        let Some((id, object)) = object else {
            panic!(
                "non-pooled drawable for missing hit object {:?}",
                drawable.hit_object
            );
        };
        let config = *self.inner.config();
        let entry = self.store.insert(LifetimeEntry::for_hit_object(
            id,
            object,
            config.initial_lifetime_offset,
            config.trailing_lifetime_offset,
        ));
        let window = self.store[entry].window();

        drawable.entry = Some(entry);
        tree.set_depth(drawable.node, drawable.start_time);
        tree.add_child(self.root, drawable.node);
        self.non_pooled.insert(entry, id);
        self.parked.insert(entry, drawable);

        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.add_entry(entry, window, &mut hooks);
        entry
    }

    /// Removes an externally owned drawable and hands it back, detached.
    ///
    /// Returns `None` if `entry` does not belong to a non-pooled drawable.
    pub fn remove_drawable(
        &mut self,
        tree: &mut RenderTree,
        beatmap: &Beatmap,
        entry: EntryId,
    ) -> Option<DrawableHitObject> {
        if !self.non_pooled.contains_key(&entry) {
            return None;
        }
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.remove_entry(entry, &mut hooks);
        self.non_pooled.remove(&entry);
        self.store.remove(entry);

        let mut drawable = self.parked.remove(&entry)?;
        tree.remove_from_parent(drawable.node);
        drawable.entry = None;
        Some(drawable)
    }

    /// Reclassifies hit objects around `current_time`. Returns whether any
    /// drawable was added or removed.
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
        inner.update_traced(current_time, &mut hooks, tracer)
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
        inner.check_children_life(host_nanos, &mut hooks)
    }

    /// Removes every hit object and drawable.
    ///
    /// Non-pooled drawables are returned to the caller, detached.
    pub fn clear(&mut self, tree: &mut RenderTree, beatmap: &Beatmap) -> Vec<DrawableHitObject> {
        let (inner, mut hooks) = self.split(tree, beatmap);
        inner.clear(&mut hooks);

        let roots: Vec<EntryId> = self.nesting.roots().map(|(_, entry)| entry).collect();
        for entry in roots {
            self.nesting.remove(&mut self.store, entry);
        }

        let mut released = Vec::new();
        for (entry, _) in mem::take(&mut self.non_pooled) {
            self.store.remove(entry);
            if let Some(mut drawable) = self.parked.remove(&entry) {
                tree.remove_from_parent(drawable.node);
                drawable.entry = None;
                released.push(drawable);
            }
        }
        debug_assert!(self.store.is_empty(), "clear left entries behind");
        released
    }

    /// Returns every drawable in the tree, alive or parked, by start time.
    #[must_use]
    pub fn objects(&self) -> Vec<&DrawableHitObject> {
        let mut objects: Vec<&DrawableHitObject> = self
            .alive_objects()
            .chain(self.parked.values())
            .collect();
        objects.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        objects
    }

    /// Returns the drawables of alive entries, in entry order.
    pub fn alive_objects(&self) -> impl Iterator<Item = &DrawableHitObject> + '_ {
        self.inner.alive_entries().map(|(_, drawable)| drawable)
    }

    /// Returns the number of alive entries.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.inner.alive_count()
    }

    /// Returns the entry of a hit object.
    #[must_use]
    pub fn entry_of(&self, id: HitObjectId) -> Option<EntryId> {
        self.nesting.get(id)
    }

    /// Returns an entry.
    #[must_use]
    pub fn entry(&self, entry: EntryId) -> Option<&LifetimeEntry> {
        self.store.get(entry)
    }

    /// Returns the drawable of an alive root hit object.
    #[must_use]
    pub fn drawable_of(&self, id: HitObjectId) -> Option<&DrawableHitObject> {
        self.inner.drawable(self.nesting.get(id)?)
    }

    /// Returns the drawable of an alive root hit object mutably.
    pub fn drawable_of_mut(&mut self, id: HitObjectId) -> Option<&mut DrawableHitObject> {
        let entry = self.nesting.get(id)?;
        self.inner.drawable_mut(entry)
    }

    /// Forces a root hit object alive regardless of time, or releases the
    /// force. Takes effect on the next update.
    pub fn set_keep_alive(&mut self, id: HitObjectId, keep_alive: bool) -> bool {
        let Some(entry) = self.nesting.get(id) else {
            return false;
        };
        let Some(lifetime) = self.store.get_mut(entry) else {
            return false;
        };
        lifetime.set_keep_alive(keep_alive);
        let window = lifetime.window();
        self.inner.set_entry_window(entry, window)
    }

    /// Drains the usage notifications recorded since the last call.
    pub fn take_usage_events(&mut self) -> Vec<HitObjectUsage> {
        mem::take(&mut self.usage)
    }

    /// Finds the entry of a root hit object, whether it is pooled or was
    /// added through [`add_drawable`](Self::add_drawable).
    fn entry_for(&self, id: HitObjectId) -> Option<EntryId> {
        self.nesting.get(id).or_else(|| {
            self.non_pooled
                .iter()
                .find_map(|(&entry, &object)| (object == id).then_some(entry))
        })
    }

    fn refresh_window(&mut self, entry: EntryId, object: &HitObject) {
        if let Some(lifetime) = self.store.get_mut(entry) {
            lifetime.refresh_lifetime(object.start_time(), object.end_time());
            let window = lifetime.window();
            self.inner.set_entry_window(entry, window);
        }
    }

    fn register(
        &mut self,
        beatmap: &Beatmap,
        id: HitObjectId,
        parent: Option<HitObjectId>,
    ) -> EntryId {
        let object = beatmap
            .get(id)
            .unwrap_or_else(|| panic!("stale HitObjectId: {id:?}"));
        let config = *self.inner.config();
        let entry = self.nesting.add(
            &mut self.store,
            LifetimeEntry::for_hit_object(
                id,
                object,
                config.initial_lifetime_offset,
                config.trailing_lifetime_offset,
            ),
            parent,
        );
        for &child in object.nested() {
            self.register(beatmap, child, Some(id));
        }
        entry
    }

    fn split<'a>(
        &'a mut self,
        tree: &'a mut RenderTree,
        beatmap: &'a Beatmap,
    ) -> (&'a mut Inner, PlayfieldHooks<'a>) {
        (
            &mut self.inner,
            PlayfieldHooks {
                tree,
                root: self.root,
                beatmap,
                store: &mut self.store,
                nesting: &mut self.nesting,
                pools: &mut self.pools,
                non_pooled: &self.non_pooled,
                parked: &mut self.parked,
                usage: &mut self.usage,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::Point;

    use super::*;

    fn config(initial_lifetime_offset: f64) -> ContainerConfig {
        ContainerConfig {
            initial_lifetime_offset,
            ..ContainerConfig::playfield()
        }
    }

    fn setup(config: ContainerConfig) -> (RenderTree, Beatmap, HitObjectContainer) {
        let mut tree = RenderTree::new();
        let mut container = HitObjectContainer::new(&mut tree, config);
        container.register_pool(&mut tree, HitObjectKind::Circle, PoolConfig::default());
        container.register_pool(&mut tree, HitObjectKind::Slider, PoolConfig::default());
        container.register_pool(&mut tree, HitObjectKind::SliderTick, PoolConfig::nested());
        (tree, Beatmap::new(), container)
    }

    fn sync(tree: &mut RenderTree, beatmap: &mut Beatmap, container: &mut HitObjectContainer) {
        let changes = beatmap.take_changes();
        container.apply_beatmap_changes(tree, beatmap, &changes);
    }

    /// Slider at 1000 with one repeat: head, four ticks, a repeat and a tail.
    fn slider() -> HitObject {
        HitObject::slider(1_000.0, 300.0, Point::new(10.0, 20.0))
            .with_repeats(1)
            .with_tick_interval(100.0)
    }

    fn pooled_in_use(container: &HitObjectContainer) -> usize {
        fn count(d: &DrawableHitObject) -> usize {
            1 + d.nested().iter().map(count).sum::<usize>()
        }
        container.alive_objects().filter(|d| d.is_pooled()).map(count).sum()
    }

    #[test]
    fn alive_slider_gets_nested_drawables() {
        let (mut tree, mut beatmap, mut container) = setup(config(0.0));
        let id = beatmap.add(slider());
        sync(&mut tree, &mut beatmap, &mut container);

        container.update(&mut tree, &beatmap, 500.0);
        assert!(container.drawable_of(id).is_none());

        assert!(container.update(&mut tree, &beatmap, 1_100.0));
        let drawable = container.drawable_of(id).unwrap();
        assert_eq!(drawable.nested().len(), 7);
        assert_eq!(tree.children(container.root()).count(), 1);
        assert_eq!(tree.offset(drawable.node()), Vec2::new(10.0, 20.0));

        let depths: Vec<f64> = tree
            .children(drawable.node())
            .map(|n| tree.depth(n))
            .collect();
        assert_eq!(depths.len(), 7);
        assert!(depths.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(container.take_usage_events(), vec![HitObjectUsage::Began(id)]);
        assert_eq!(container.pools().in_use(), 8);

        container.update(&mut tree, &beatmap, 1_700.0);
        assert_eq!(container.take_usage_events(), vec![HitObjectUsage::Finished(id)]);
        assert_eq!(container.pools().in_use(), 0);
        assert_eq!(tree.children(container.root()).count(), 0);
    }

    #[test]
    fn drawables_are_reused_across_lifetimes() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let a = beatmap.add(HitObject::circle(1_000.0, Point::ZERO));
        let b = beatmap.add(HitObject::circle(2_000.0, Point::ZERO));
        sync(&mut tree, &mut beatmap, &mut container);

        container.update(&mut tree, &beatmap, 950.0);
        let node = container.drawable_of(a).unwrap().node();
        container.update(&mut tree, &beatmap, 1_500.0);
        container.update(&mut tree, &beatmap, 1_950.0);

        assert_eq!(container.drawable_of(b).unwrap().node(), node);
        let circles = container.pools().pool(HitObjectKind::Circle).unwrap();
        assert_eq!(circles.constructed(), 1);
    }

    #[test]
    fn transient_and_display_less_objects_are_skipped() {
        let (mut tree, mut beatmap, mut container) = setup(config(0.0));
        let spinner = beatmap.add(HitObject::spinner(0.0, 500.0));
        let preview = beatmap.add(HitObject::circle(0.0, Point::ZERO).into_transient());

        assert!(container.add_hit_object(&mut tree, &beatmap, spinner).is_none());
        assert!(container.add_hit_object(&mut tree, &beatmap, preview).is_none());
        assert!(container.entry_of(spinner).is_none());
    }

    #[test]
    fn start_time_change_resorts_depth() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let a = beatmap.add(HitObject::circle(1_040.0, Point::ZERO));
        let b = beatmap.add(HitObject::circle(1_050.0, Point::ZERO));
        sync(&mut tree, &mut beatmap, &mut container);
        container.update(&mut tree, &beatmap, 960.0);

        let a_node = container.drawable_of(a).unwrap().node();
        let b_node = container.drawable_of(b).unwrap().node();
        let order: Vec<NodeId> = tree.children(container.root()).collect();
        assert_eq!(order, [b_node, a_node]);

        beatmap.set_start_time(a, 1_060.0);
        sync(&mut tree, &mut beatmap, &mut container);

        assert_eq!(container.drawable_of(a).unwrap().start_time(), 1_060.0);
        let order: Vec<NodeId> = tree.children(container.root()).collect();
        assert_eq!(order, [a_node, b_node]);

        let entry = container.entry_of(a).unwrap();
        assert_eq!(container.entry(entry).unwrap().lifetime_start(), 960.0);
        container.update(&mut tree, &beatmap, 960.0);
        assert!(container.drawable_of(a).is_some());
    }

    #[test]
    fn defaults_applied_regenerates_nested_drawables() {
        let (mut tree, mut beatmap, mut container) = setup(config(0.0));
        let id = beatmap.add(
            HitObject::slider(1_000.0, 300.0, Point::ZERO).with_tick_interval(100.0),
        );
        sync(&mut tree, &mut beatmap, &mut container);
        container.update(&mut tree, &beatmap, 1_100.0);
        assert_eq!(container.drawable_of(id).unwrap().nested().len(), 4);

        beatmap.set_repeat_count(id, 1);
        sync(&mut tree, &mut beatmap, &mut container);

        let drawable = container.drawable_of(id).unwrap();
        assert_eq!(drawable.nested().len(), 7);
        assert!(
            drawable
                .nested()
                .iter()
                .all(|n| beatmap.contains(n.hit_object().unwrap()))
        );
        assert_eq!(container.pools().in_use(), 8);
        let entry = container.entry_of(id).unwrap();
        assert_eq!(container.entry(entry).unwrap().children().len(), 7);

        // The lifetime now ends with the second span.
        container.update(&mut tree, &beatmap, 1_500.0);
        assert!(container.drawable_of(id).is_some());
    }

    #[test]
    fn removing_hit_object_cascades_to_nested_entries() {
        let (mut tree, mut beatmap, mut container) = setup(config(0.0));
        let id = beatmap.add(slider());
        sync(&mut tree, &mut beatmap, &mut container);
        container.update(&mut tree, &beatmap, 1_100.0);
        let entry = container.entry_of(id).unwrap();
        let children = container.entry(entry).unwrap().children().to_vec();
        assert_eq!(children.len(), 7);

        beatmap.remove(id);
        sync(&mut tree, &mut beatmap, &mut container);

        assert!(container.entry_of(id).is_none());
        assert!(container.entry(entry).is_none());
        assert!(children.iter().all(|&c| container.entry(c).is_none()));
        assert_eq!(container.pools().in_use(), 0);
        assert!(!container.remove_hit_object(&mut tree, &beatmap, id));
    }

    #[test]
    fn non_pooled_drawable_stays_attached_while_dead() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let id = beatmap.add(HitObject::circle(1_000.0, Point::ZERO));
        beatmap.take_changes();
        let drawable = DrawableHitObject::standalone(&mut tree, id, beatmap.get(id).unwrap());
        let node = drawable.node();

        let entry = container.add_drawable(&mut tree, &beatmap, drawable);
        assert_eq!(tree.parent(node), Some(container.root()));
        container.update(&mut tree, &beatmap, 500.0);
        assert_eq!(tree.parent(node), Some(container.root()));
        assert_eq!(container.objects().len(), 1);

        container.update(&mut tree, &beatmap, 950.0);
        assert_eq!(container.alive_count(), 1);
        container
            .inner
            .drawable_mut(entry)
            .unwrap()
            .apply_result(HitResult::Great);

        container.update(&mut tree, &beatmap, 1_200.0);
        assert_eq!(container.alive_count(), 0);
        assert_eq!(container.objects()[0].result(), None);
        assert!(container.take_usage_events().is_empty());

        let drawable = container.remove_drawable(&mut tree, &beatmap, entry).unwrap();
        assert!(tree.parent(drawable.node()).is_none());
        assert!(!drawable.is_pooled());
        assert!(container.remove_drawable(&mut tree, &beatmap, entry).is_none());
        assert!(container.objects().is_empty());
    }

    #[test]
    fn non_pooled_drawable_follows_start_time_edits() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let id = beatmap.add(HitObject::circle(1_000.0, Point::ZERO));
        let other = beatmap.add(HitObject::circle(3_000.0, Point::ZERO));
        beatmap.take_changes();
        container.add_hit_object(&mut tree, &beatmap, other);
        let drawable = DrawableHitObject::standalone(&mut tree, id, beatmap.get(id).unwrap());
        let node = drawable.node();
        let entry = container.add_drawable(&mut tree, &beatmap, drawable);

        // Parked while dead.
        beatmap.set_start_time(id, 5_000.0);
        sync(&mut tree, &mut beatmap, &mut container);
        assert_eq!(tree.depth(node), 5_000.0);
        assert_eq!(container.entry(entry).unwrap().lifetime_start(), 4_900.0);
        let order: Vec<NodeId> = tree.children(container.root()).collect();
        assert_eq!(order[0], node);

        container.update(&mut tree, &beatmap, 950.0);
        assert_eq!(container.alive_count(), 0);
        container.update(&mut tree, &beatmap, 4_950.0);
        assert_eq!(container.alive_count(), 1);
        assert_eq!(container.objects()[0].start_time(), 5_000.0);

        // Bound while alive.
        beatmap.set_start_time(id, 2_000.0);
        sync(&mut tree, &mut beatmap, &mut container);
        assert_eq!(tree.depth(node), 2_000.0);
        assert_eq!(container.objects()[0].start_time(), 2_000.0);
        container.update(&mut tree, &beatmap, 4_950.0);
        assert_eq!(container.alive_count(), 0);
        container.update(&mut tree, &beatmap, 1_950.0);
        assert_eq!(container.alive_count(), 1);
        assert_eq!(tree.parent(node), Some(container.root()));
    }

    #[test]
    fn killed_drawables_forget_their_result() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let id = beatmap.add(HitObject::circle(1_000.0, Point::ZERO));
        sync(&mut tree, &mut beatmap, &mut container);

        container.update(&mut tree, &beatmap, 950.0);
        container
            .drawable_of_mut(id)
            .unwrap()
            .apply_result(HitResult::Meh);
        container.update(&mut tree, &beatmap, 500.0);
        container.update(&mut tree, &beatmap, 950.0);
        assert_eq!(container.drawable_of(id).unwrap().result(), None);
    }

    #[test]
    fn rewind_with_children_drops_nested_entries() {
        let config = config(0.0).with_rewind_policy(RewindPolicy::RemoveWithChildren);
        let (mut tree, mut beatmap, mut container) = setup(config);
        let id = beatmap.add(slider());
        sync(&mut tree, &mut beatmap, &mut container);

        container.update(&mut tree, &beatmap, 1_100.0);
        container.update(&mut tree, &beatmap, 500.0);
        let entry = container.entry_of(id).unwrap();
        assert!(container.entry(entry).unwrap().children().is_empty());
        assert_eq!(container.pools().in_use(), 0);

        container.update(&mut tree, &beatmap, 1_100.0);
        assert!(container.drawable_of(id).is_none());
        assert!(container.remove_hit_object(&mut tree, &beatmap, id));
    }

    #[test]
    fn keep_alive_overrides_time() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let id = beatmap.add(HitObject::circle(1_000.0, Point::ZERO));
        sync(&mut tree, &mut beatmap, &mut container);

        assert!(container.set_keep_alive(id, true));
        container.update(&mut tree, &beatmap, 0.0);
        assert!(container.drawable_of(id).is_some());
        container.set_keep_alive(id, false);
        container.update(&mut tree, &beatmap, 0.0);
        assert!(container.drawable_of(id).is_none());
    }

    #[test]
    fn pooled_drawables_match_alive_set_while_scrubbing() {
        let (mut tree, mut beatmap, mut container) = setup(config(50.0));
        for i in 0..12_u32 {
            let start = f64::from(i) * 250.0;
            if i % 3 == 0 {
                beatmap.add(
                    HitObject::slider(start, 200.0, Point::ZERO).with_tick_interval(50.0),
                );
            } else {
                beatmap.add(HitObject::circle(start, Point::ZERO));
            }
        }
        sync(&mut tree, &mut beatmap, &mut container);

        let mut seed = 0x2545_f491_u32;
        for _ in 0..300 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let t = f64::from(seed % 3_200);
            container.update(&mut tree, &beatmap, t);
            assert_eq!(container.pools().in_use(), pooled_in_use(&container));
            assert_eq!(
                tree.children(container.root()).count(),
                container.alive_count()
            );
        }

        let usage = container.take_usage_events();
        let began = usage
            .iter()
            .filter(|u| matches!(u, HitObjectUsage::Began(_)))
            .count();
        assert_eq!(began - (usage.len() - began), container.alive_count());
    }

    #[test]
    fn clear_returns_non_pooled_drawables_and_is_idempotent() {
        let (mut tree, mut beatmap, mut container) = setup(config(100.0));
        let pooled = beatmap.add(slider());
        let external = beatmap.add(HitObject::circle(1_050.0, Point::ZERO));
        beatmap.take_changes();
        container.add_hit_object(&mut tree, &beatmap, pooled);
        let drawable =
            DrawableHitObject::standalone(&mut tree, external, beatmap.get(external).unwrap());
        container.add_drawable(&mut tree, &beatmap, drawable);
        container.update(&mut tree, &beatmap, 1_000.0);
        assert_eq!(container.alive_count(), 2);

        let released = container.clear(&mut tree, &beatmap);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].hit_object(), Some(external));
        assert_eq!(container.alive_count(), 0);
        assert_eq!(container.pools().in_use(), 0);
        assert_eq!(tree.children(container.root()).count(), 0);
        assert!(container.entry_of(pooled).is_none());

        assert!(container.clear(&mut tree, &beatmap).is_empty());
        assert_eq!(container.alive_count(), 0);
    }

    #[test]
    #[should_panic(expected = "stale HitObjectId")]
    fn adding_stale_hit_object_panics() {
        let (mut tree, mut beatmap, mut container) = setup(config(0.0));
        let id = beatmap.add(HitObject::circle(0.0, Point::ZERO));
        beatmap.remove(id);
        container.add_hit_object(&mut tree, &beatmap, id);
    }

    #[test]
    #[should_panic(expected = "non-pooled drawable for missing hit object")]
    fn adding_drawable_for_removed_hit_object_panics() {
        let (mut tree, mut beatmap, mut container) = setup(config(0.0));
        let id = beatmap.add(HitObject::circle(0.0, Point::ZERO));
        let drawable = DrawableHitObject::standalone(&mut tree, id, beatmap.get(id).unwrap());
        beatmap.remove(id);
        container.add_drawable(&mut tree, &beatmap, drawable);
    }
}
