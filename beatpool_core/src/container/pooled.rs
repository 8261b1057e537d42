// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding alive entries to pooled drawables.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::clock::FrameClock;
use crate::config::{ContainerConfig, RewindPolicy};
use crate::lifetime::{
    BoundaryKind, CrossingDirection, EntryKey, LifetimeEntryManager, LifetimeObserver,
    LifetimeWindow,
};
use crate::pool::Drawable;
use crate::trace::{EntryRemovedEvent, LifetimeUpdateEvent, RemovalReason, Tracer};
use crate::tree::{NodeId, RenderTree};

/// The specialization points of a [`PooledEntryDrawableContainer`].
///
/// A container calls these synchronously from inside lifetime notifications,
/// so a drawable is in the tree before the update that made its entry alive
/// returns.
pub trait DrawableHooks<K, D: Drawable> {
    /// Returns the tree drawables live in and the node they are attached
    /// under.
    fn render_target(&mut self) -> (&mut RenderTree, NodeId);

    /// Produces the drawable for an entry that just became alive.
    fn get_drawable(&mut self, entry: K) -> D;

    /// Takes back a drawable whose entry died.
    fn release_drawable(&mut self, entry: K, drawable: D);

    /// Inserts a freshly bound drawable into the tree.
    fn add_drawable(&mut self, entry: K, drawable: &D) {
        _ = entry;
        let (tree, root) = self.render_target();
        tree.add_child(root, drawable.node());
    }

    /// Removes a drawable from the tree and hands it back. Pooled drawables
    /// are detached, never destroyed.
    fn remove_drawable(&mut self, entry: K, drawable: D) {
        let (tree, _) = self.render_target();
        if tree.parent(drawable.node()).is_some() {
            tree.remove_from_parent(drawable.node());
        }
        self.release_drawable(entry, drawable);
    }

    /// Called after an entry was dropped because the window was rewound past
    /// its start.
    fn entry_rewound(&mut self, entry: K, policy: RewindPolicy) {
        _ = (entry, policy);
    }
}

/// Translates lifetime notifications into drawable bindings.
struct Binder<'a, 't, K, D, H> {
    alive: &'a mut BTreeMap<K, D>,
    hooks: &'a mut H,
    rewound: &'a mut Vec<K>,
    policy: RewindPolicy,
    frame_index: u64,
    tracer: &'a mut Tracer<'t>,
}

impl<K: EntryKey, D, H> Binder<'_, '_, K, D, H> {
    fn trace_transition(&mut self, key: K, alive: bool) {
        #[cfg(feature = "trace-rich")]
        self.tracer
            .entry_transition(&crate::trace::EntryTransitionEvent {
                frame_index: self.frame_index,
                entry: key.to_raw(),
                alive,
            });
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = (self.frame_index, &self.tracer, key, alive);
        }
    }

    fn trace_crossing(&mut self, key: K, kind: BoundaryKind, direction: CrossingDirection) {
        #[cfg(feature = "trace-rich")]
        self.tracer
            .boundary_crossing(&crate::trace::BoundaryCrossingEvent {
                frame_index: self.frame_index,
                entry: key.to_raw(),
                kind,
                direction,
            });
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = (self.frame_index, &self.tracer, key, kind, direction);
        }
    }
}

impl<K, D, H> LifetimeObserver<K> for Binder<'_, '_, K, D, H>
where
    K: EntryKey,
    D: Drawable,
    H: DrawableHooks<K, D>,
{
    fn entry_became_alive(&mut self, key: K) {
        assert!(
            !self.alive.contains_key(&key),
            "entry {key:?} became alive while already bound"
        );
        let drawable = self.hooks.get_drawable(key);
        self.hooks.add_drawable(key, &drawable);
        self.alive.insert(key, drawable);
        self.trace_transition(key, true);
    }

    fn entry_became_dead(&mut self, key: K) {
        let drawable = self
            .alive
            .remove(&key)
            .unwrap_or_else(|| panic!("entry {key:?} died without a bound drawable"));
        self.hooks.remove_drawable(key, drawable);
        self.trace_transition(key, false);
    }

    fn entry_crossed_boundary(&mut self, key: K, kind: BoundaryKind, direction: CrossingDirection) {
        if self.policy.removes_rewound()
            && kind == BoundaryKind::Start
            && direction == CrossingDirection::Backward
        {
            self.rewound.push(key);
        }
        self.trace_crossing(key, kind, direction);
    }
}

/// Keeps exactly one drawable in the tree for every alive entry.
///
/// Entries are tracked by a [`LifetimeEntryManager`]. Each update widens the
/// current time by the configured past and future extensions, and the
/// resulting alive/dead transitions acquire and release drawables through
/// the caller's [`DrawableHooks`].
///
/// The set of bound entries always equals the manager's alive set.
#[derive(Debug)]
pub struct PooledEntryDrawableContainer<K, D> {
    lifetime: LifetimeEntryManager<K>,
    all_entries: BTreeSet<K>,
    alive: BTreeMap<K, D>,
    config: ContainerConfig,
    clock: FrameClock,
    frame_index: u64,
}

impl<K: EntryKey, D: Drawable> PooledEntryDrawableContainer<K, D> {
    /// Creates an empty container.
    #[must_use]
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            lifetime: LifetimeEntryManager::new(),
            all_entries: BTreeSet::new(),
            alive: BTreeMap::new(),
            config,
            clock: FrameClock::new(),
            frame_index: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Sets how far behind the current time entries stay alive.
    pub fn set_past_lifetime_extension(&mut self, extension: f64) {
        self.config.past_lifetime_extension = extension;
    }

    /// Sets how far ahead of the current time entries become alive.
    pub fn set_future_lifetime_extension(&mut self, extension: f64) {
        self.config.future_lifetime_extension = extension;
    }

    /// Returns the container's clock.
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Returns the container's clock mutably, for seeking and playback.
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// Starts tracking an entry. If a window has been seen and the entry
    /// overlaps it, its drawable is bound immediately.
    ///
    /// # Panics
    ///
    /// Panics if the entry is already tracked.
    pub fn add_entry(
        &mut self,
        entry: K,
        window: LifetimeWindow,
        hooks: &mut impl DrawableHooks<K, D>,
    ) {
        self.all_entries.insert(entry);
        let mut rewound = Vec::new();
        let mut tracer = Tracer::none();
        let mut binder = Binder {
            alive: &mut self.alive,
            hooks,
            rewound: &mut rewound,
            policy: self.config.rewind_policy,
            frame_index: self.frame_index,
            tracer: &mut tracer,
        };
        self.lifetime.add_entry(entry, window, &mut binder);
    }

    /// Stops tracking an entry, releasing its drawable if it is alive.
    ///
    /// Returns `false` if the entry is not tracked.
    pub fn remove_entry(&mut self, entry: K, hooks: &mut impl DrawableHooks<K, D>) -> bool {
        self.remove_entry_traced(entry, hooks, &mut Tracer::none())
    }

    /// Like [`remove_entry`](Self::remove_entry), reporting the removal to
    /// `tracer`.
    pub fn remove_entry_traced(
        &mut self,
        entry: K,
        hooks: &mut impl DrawableHooks<K, D>,
        tracer: &mut Tracer<'_>,
    ) -> bool {
        self.remove_with_reason(entry, hooks, tracer, RemovalReason::Explicit)
    }

    /// Changes the lifetime window of a tracked entry. The change takes effect
    /// on the next update. Returns `false` if the entry is not tracked.
    pub fn set_entry_window(&mut self, entry: K, window: LifetimeWindow) -> bool {
        self.lifetime.set_window(entry, window)
    }

    /// Reclassifies entries around `current_time` and rebinds drawables.
    ///
    /// Returns whether anything changed, i.e. whether a redraw is needed.
    pub fn update(&mut self, current_time: f64, hooks: &mut impl DrawableHooks<K, D>) -> bool {
        self.update_traced(current_time, hooks, &mut Tracer::none())
    }

    /// Like [`update`](Self::update), reporting to `tracer`.
    pub fn update_traced(
        &mut self,
        current_time: f64,
        hooks: &mut impl DrawableHooks<K, D>,
        tracer: &mut Tracer<'_>,
    ) -> bool {
        let start = current_time - self.config.past_lifetime_extension;
        let end = current_time + self.config.future_lifetime_extension;

        let mut rewound = Vec::new();
        let changed = {
            let mut binder = Binder {
                alive: &mut self.alive,
                hooks: &mut *hooks,
                rewound: &mut rewound,
                policy: self.config.rewind_policy,
                frame_index: self.frame_index,
                tracer: &mut *tracer,
            };
            self.lifetime.update(start, end, &mut binder)
        };

        for entry in rewound {
            if self.remove_with_reason(entry, hooks, tracer, RemovalReason::Rewound) {
                hooks.entry_rewound(entry, self.config.rewind_policy);
            }
        }

        debug_assert!(
            self.alive.keys().copied().eq(self.lifetime.alive_entries()),
            "bound drawables disagree with the alive set"
        );

        tracer.lifetime_update(&LifetimeUpdateEvent {
            frame_index: self.frame_index,
            window_start: start,
            window_end: end,
            alive_count: self.alive.len(),
            tracked_count: self.lifetime.len(),
            changed,
        });
        self.frame_index += 1;
        changed
    }

    /// Advances the container's clock to `host_nanos` and updates around the
    /// resulting time.
    pub fn check_children_life(
        &mut self,
        host_nanos: u64,
        hooks: &mut impl DrawableHooks<K, D>,
    ) -> bool {
        let current_time = self.clock.process_frame(host_nanos);
        self.update(current_time, hooks)
    }

    /// Removes every entry.
    ///
    /// # Panics
    ///
    /// Panics if a drawable is still bound afterwards.
    pub fn clear(&mut self, hooks: &mut impl DrawableHooks<K, D>) {
        self.clear_traced(hooks, &mut Tracer::none());
    }

    /// Like [`clear`](Self::clear), reporting each removal to `tracer`.
    pub fn clear_traced(&mut self, hooks: &mut impl DrawableHooks<K, D>, tracer: &mut Tracer<'_>) {
        let entries: Vec<K> = self.all_entries.iter().copied().collect();
        for entry in entries {
            self.remove_with_reason(entry, hooks, tracer, RemovalReason::Cleared);
        }
        assert!(
            self.alive.is_empty(),
            "clear left {} drawables bound",
            self.alive.len()
        );
    }

    /// Returns the alive entries and their drawables, in entry order.
    pub fn alive_entries(&self) -> impl Iterator<Item = (K, &D)> + '_ {
        self.alive.iter().map(|(&k, d)| (k, d))
    }

    /// Returns the drawable bound to an alive entry.
    #[must_use]
    pub fn drawable(&self, entry: K) -> Option<&D> {
        self.alive.get(&entry)
    }

    /// Returns the drawable bound to an alive entry mutably.
    pub fn drawable_mut(&mut self, entry: K) -> Option<&mut D> {
        self.alive.get_mut(&entry)
    }

    /// Returns every tracked entry, alive or not.
    pub fn entries(&self) -> impl Iterator<Item = K> + '_ {
        self.all_entries.iter().copied()
    }

    /// Returns whether an entry is tracked.
    #[must_use]
    pub fn contains(&self, entry: K) -> bool {
        self.all_entries.contains(&entry)
    }

    /// Returns whether an entry is alive.
    #[must_use]
    pub fn is_alive(&self, entry: K) -> bool {
        self.alive.contains_key(&entry)
    }

    /// Returns the number of alive entries.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    /// Returns the number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all_entries.len()
    }

    /// Returns whether no entries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all_entries.is_empty()
    }

    fn remove_with_reason(
        &mut self,
        entry: K,
        hooks: &mut impl DrawableHooks<K, D>,
        tracer: &mut Tracer<'_>,
        reason: RemovalReason,
    ) -> bool {
        let mut rewound = Vec::new();
        let removed = {
            let mut binder = Binder {
                alive: &mut self.alive,
                hooks,
                rewound: &mut rewound,
                policy: self.config.rewind_policy,
                frame_index: self.frame_index,
                tracer: &mut *tracer,
            };
            self.lifetime.remove_entry(entry, &mut binder)
        };
        if !removed {
            return false;
        }
        self.all_entries.remove(&entry);
        tracer.entry_removed(&EntryRemovedEvent {
            frame_index: self.frame_index,
            entry: entry.to_raw(),
            reason,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[derive(Debug)]
    struct Sprite {
        node: NodeId,
    }

    impl Drawable for Sprite {
        fn node(&self) -> NodeId {
            self.node
        }
    }

    /// Hands out sprites from a free list and logs every hook call.
    #[derive(Debug)]
    struct Hooks {
        tree: RenderTree,
        root: NodeId,
        free: Vec<Sprite>,
        created: usize,
        rewound: Vec<(u32, RewindPolicy)>,
    }

    impl Hooks {
        fn new() -> Self {
            let mut tree = RenderTree::new();
            let root = tree.create_node();
            Self {
                tree,
                root,
                free: Vec::new(),
                created: 0,
                rewound: Vec::new(),
            }
        }

        fn attached(&self) -> usize {
            self.tree.children(self.root).count()
        }
    }

    impl DrawableHooks<u32, Sprite> for Hooks {
        fn render_target(&mut self) -> (&mut RenderTree, NodeId) {
            (&mut self.tree, self.root)
        }

        fn get_drawable(&mut self, _entry: u32) -> Sprite {
            self.free.pop().unwrap_or_else(|| {
                self.created += 1;
                Sprite {
                    node: self.tree.create_node(),
                }
            })
        }

        fn release_drawable(&mut self, _entry: u32, drawable: Sprite) {
            self.free.push(drawable);
        }

        fn entry_rewound(&mut self, entry: u32, policy: RewindPolicy) {
            self.rewound.push((entry, policy));
        }
    }

    fn window(start: f64, end: f64) -> LifetimeWindow {
        LifetimeWindow::new(start, end)
    }

    fn container(config: ContainerConfig) -> PooledEntryDrawableContainer<u32, Sprite> {
        PooledEntryDrawableContainer::new(config)
    }

    fn assert_bindings_match(c: &PooledEntryDrawableContainer<u32, Sprite>, hooks: &Hooks) {
        let bound: Vec<u32> = c.alive_entries().map(|(k, _)| k).collect();
        let alive: Vec<u32> = c.lifetime.alive_entries().collect();
        assert_eq!(bound, alive);
        assert_eq!(hooks.attached(), alive.len());
    }

    #[test]
    fn alive_entries_get_attached_drawables() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(0.0, 100.0), &mut hooks);
        c.add_entry(2, window(50.0, 150.0), &mut hooks);

        assert!(c.update(60.0, &mut hooks));
        assert_eq!(c.alive_count(), 2);
        assert_eq!(hooks.attached(), 2);
        let node = c.drawable(1).unwrap().node();
        assert_eq!(hooks.tree.parent(node), Some(hooks.root));

        assert!(c.update(120.0, &mut hooks));
        assert_eq!(c.alive_count(), 1);
        assert!(hooks.tree.parent(node).is_none());
        assert!(hooks.tree.is_alive(node), "pooled drawables are not destroyed");
    }

    #[test]
    fn steady_state_scrubbing_reuses_drawables() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        for i in 0..20_u32 {
            let start = f64::from(i) * 100.0;
            c.add_entry(i, window(start, start + 150.0), &mut hooks);
        }

        for t in (0..2_000).step_by(25).chain((0..2_000).step_by(25).rev()) {
            c.update(f64::from(t), &mut hooks);
            assert_bindings_match(&c, &hooks);
        }
        assert_eq!(hooks.created, 2, "at most two entries overlap at once");
    }

    #[test]
    fn extensions_widen_the_window() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield().with_extensions(0.0, 500.0));
        c.add_entry(1, window(1_000.0, 1_100.0), &mut hooks);

        c.update(400.0, &mut hooks);
        assert!(!c.is_alive(1));
        c.update(500.0, &mut hooks);
        assert!(c.is_alive(1));

        c.set_past_lifetime_extension(200.0);
        c.set_future_lifetime_extension(0.0);
        c.update(1_250.0, &mut hooks);
        assert!(c.is_alive(1));
        c.update(1_300.0, &mut hooks);
        assert!(!c.is_alive(1));
    }

    #[test]
    fn removing_alive_entry_releases_drawable() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(0.0, 100.0), &mut hooks);
        c.update(10.0, &mut hooks);

        assert!(c.remove_entry(1, &mut hooks));
        assert_eq!(hooks.free.len(), 1);
        assert_eq!(hooks.attached(), 0);
        assert!(!c.remove_entry(1, &mut hooks));
        assert!(c.is_empty());
    }

    #[test]
    fn entry_added_inside_window_binds_immediately() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.update(10.0, &mut hooks);
        c.add_entry(1, window(0.0, 100.0), &mut hooks);
        assert!(c.is_alive(1));
        assert_eq!(hooks.attached(), 1);
    }

    #[test]
    fn rewound_entries_are_retained_by_default() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(100.0, 200.0), &mut hooks);
        c.update(150.0, &mut hooks);
        c.update(50.0, &mut hooks);

        assert!(c.contains(1));
        assert!(hooks.rewound.is_empty());
        c.update(150.0, &mut hooks);
        assert!(c.is_alive(1));
    }

    #[test]
    fn rewound_entries_are_removed_when_configured() {
        let mut hooks = Hooks::new();
        let mut c = container(
            ContainerConfig::playfield().with_rewind_policy(RewindPolicy::RemoveWithChildren),
        );
        c.add_entry(1, window(100.0, 200.0), &mut hooks);
        c.add_entry(2, window(0.0, 300.0), &mut hooks);
        c.update(150.0, &mut hooks);
        c.update(50.0, &mut hooks);

        assert!(!c.contains(1));
        assert!(c.contains(2));
        assert_eq!(hooks.rewound, vec![(1, RewindPolicy::RemoveWithChildren)]);
        assert_bindings_match(&c, &hooks);

        c.update(150.0, &mut hooks);
        assert!(!c.is_alive(1));
    }

    #[test]
    fn unchanged_time_reports_no_change() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(0.0, 100.0), &mut hooks);
        assert!(c.update(10.0, &mut hooks));
        assert!(!c.update(10.0, &mut hooks));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(0.0, 100.0), &mut hooks);
        c.add_entry(2, window(500.0, 600.0), &mut hooks);
        c.update(10.0, &mut hooks);

        c.clear(&mut hooks);
        assert_eq!(c.alive_count(), 0);
        assert!(c.is_empty());
        c.clear(&mut hooks);
        assert_eq!(c.alive_count(), 0);
        assert_eq!(hooks.attached(), 0);
    }

    #[test]
    fn check_children_life_follows_clock() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(1_000.0, 2_000.0), &mut hooks);
        c.clock_mut().seek(900.0);
        c.clock_mut().start();

        c.check_children_life(0, &mut hooks);
        assert!(!c.is_alive(1));
        assert!(c.check_children_life(200_000_000, &mut hooks));
        assert!(c.is_alive(1));
        assert_eq!(c.clock().current_time(), 1_100.0);
    }

    #[test]
    fn set_entry_window_applies_on_next_update() {
        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield());
        c.add_entry(1, window(0.0, 100.0), &mut hooks);
        c.update(50.0, &mut hooks);

        assert!(c.set_entry_window(1, window(500.0, 600.0)));
        assert!(c.is_alive(1));
        c.update(50.0, &mut hooks);
        assert!(!c.is_alive(1));
        assert_bindings_match(&c, &hooks);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn traced_update_reports_counts_and_removals() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Sink {
            updates: Vec<LifetimeUpdateEvent>,
            removed: Vec<EntryRemovedEvent>,
        }
        impl TraceSink for Sink {
            fn on_lifetime_update(&mut self, e: &LifetimeUpdateEvent) {
                self.updates.push(*e);
            }
            fn on_entry_removed(&mut self, e: &EntryRemovedEvent) {
                self.removed.push(*e);
            }
        }

        let mut hooks = Hooks::new();
        let mut c = container(ContainerConfig::playfield().with_rewind_policy(RewindPolicy::Remove));
        c.add_entry(1, window(100.0, 200.0), &mut hooks);
        c.add_entry(2, window(0.0, 300.0), &mut hooks);

        let mut sink = Sink::default();
        let mut tracer = Tracer::new(&mut sink);
        c.update_traced(150.0, &mut hooks, &mut tracer);
        c.update_traced(50.0, &mut hooks, &mut tracer);
        c.clear_traced(&mut hooks, &mut tracer);
        drop(tracer);

        assert_eq!(sink.updates.len(), 2);
        assert_eq!(sink.updates[0].alive_count, 2);
        assert_eq!(sink.updates[0].tracked_count, 2);
        assert_eq!(sink.updates[1].frame_index, 1);
        assert_eq!(sink.updates[1].alive_count, 1);
        assert_eq!(
            sink.removed.iter().map(|e| e.reason).collect::<Vec<_>>(),
            [RemovalReason::Rewound, RemovalReason::Cleared]
        );
    }
}
