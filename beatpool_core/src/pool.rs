// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded pools of reusable drawables.
//!
//! A [`DrawablePool`] hands out drawables of one [`HitObjectKind`] and takes
//! them back when their entry dies. A [`PoolRegistry`] maps every kind to the
//! pool that serves it. Kinds without a pool of their own are resolved
//! through [`HitObjectKind::fallback`]; the result (including "no pool") is
//! cached until the next registration.
//!
//! Pools never fail: an empty pool constructs a fresh drawable, and a full
//! pool destroys released drawables instead of keeping them.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::beatmap::HitObjectKind;
use crate::config::PoolConfig;
use crate::tree::{NodeId, RenderTree};

/// A visual representation backed by a render-tree node.
pub trait Drawable {
    /// Returns the render-tree node of the drawable.
    fn node(&self) -> NodeId;
}

/// A drawable that can be kept in a [`DrawablePool`].
pub trait Poolable: Drawable + Sized {
    /// Constructs a fresh drawable for the pool serving `kind`, creating its
    /// node in `tree`.
    fn create(kind: HitObjectKind, tree: &mut RenderTree) -> Self;

    /// Returns the kind of the pool the drawable belongs to.
    fn pool_kind(&self) -> HitObjectKind;

    /// Resets per-use state before the drawable is parked in its pool.
    fn on_released(&mut self, tree: &mut RenderTree) {
        _ = tree;
    }
}

/// A pool of drawables for one kind.
#[derive(Debug)]
pub struct DrawablePool<D> {
    kind: HitObjectKind,
    config: PoolConfig,
    available: Vec<D>,
    in_use: usize,
    constructed: usize,
}

impl<D: Poolable> DrawablePool<D> {
    /// Creates a pool, constructing `config.initial_size` drawables up front.
    pub fn new(kind: HitObjectKind, config: PoolConfig, tree: &mut RenderTree) -> Self {
        let available = (0..config.initial_size)
            .map(|_| D::create(kind, tree))
            .collect();
        Self {
            kind,
            config,
            available,
            in_use: 0,
            constructed: config.initial_size,
        }
    }

    /// Takes a drawable out of the pool, constructing one if none is idle.
    pub fn get(&mut self, tree: &mut RenderTree) -> D {
        self.in_use += 1;
        self.available.pop().unwrap_or_else(|| {
            self.constructed += 1;
            D::create(self.kind, tree)
        })
    }

    /// Returns a drawable to the pool.
    ///
    /// The drawable must be detached from the tree. If the pool already holds
    /// `max_size` idle drawables, the drawable's node is destroyed instead.
    ///
    /// # Panics
    ///
    /// Panics if the drawable belongs to another pool, is still attached, or
    /// more drawables are released than were taken.
    pub fn release(&mut self, mut drawable: D, tree: &mut RenderTree) {
        assert!(
            drawable.pool_kind() == self.kind,
            "drawable of pool {:?} released to pool {:?}",
            drawable.pool_kind(),
            self.kind
        );
        assert!(
            tree.parent(drawable.node()).is_none(),
            "pooled drawable released while attached"
        );
        assert!(self.in_use > 0, "release without a matching get");
        self.in_use -= 1;

        drawable.on_released(tree);
        if self
            .config
            .max_size
            .is_some_and(|max| self.available.len() >= max)
        {
            tree.destroy_node(drawable.node());
        } else {
            self.available.push(drawable);
        }
    }

    /// Returns the kind this pool serves.
    #[must_use]
    pub fn kind(&self) -> HitObjectKind {
        self.kind
    }

    /// Returns the number of idle drawables.
    #[must_use]
    pub fn available(&self) -> usize {
        self.available.len()
    }

    /// Returns the number of drawables currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Returns how many drawables this pool has constructed in total.
    #[must_use]
    pub fn constructed(&self) -> usize {
        self.constructed
    }
}

/// Maps hit object kinds to the pools that serve them.
#[derive(Debug)]
pub struct PoolRegistry<D> {
    pools: BTreeMap<HitObjectKind, DrawablePool<D>>,
    resolved: BTreeMap<HitObjectKind, Option<HitObjectKind>>,
}

impl<D: Poolable> Default for PoolRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Poolable> PoolRegistry<D> {
    /// Creates a registry with no pools.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pools: BTreeMap::new(),
            resolved: BTreeMap::new(),
        }
    }

    /// Registers a pool for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if a pool is already registered for `kind`.
    pub fn register(&mut self, kind: HitObjectKind, config: PoolConfig, tree: &mut RenderTree) {
        assert!(
            !self.pools.contains_key(&kind),
            "pool already registered for {kind:?}"
        );
        self.pools.insert(kind, DrawablePool::new(kind, config, tree));
        self.resolved.clear();
    }

    /// Returns the kind of the pool that serves `kind`, following the
    /// fallback chain. `None` means the kind is display-less here.
    pub fn lookup(&mut self, kind: HitObjectKind) -> Option<HitObjectKind> {
        if let Some(&resolved) = self.resolved.get(&kind) {
            return resolved;
        }
        let mut candidate = Some(kind);
        while let Some(k) = candidate {
            if self.pools.contains_key(&k) {
                break;
            }
            candidate = k.fallback();
        }
        self.resolved.insert(kind, candidate);
        candidate
    }

    /// Takes a drawable for `kind` from its pool, or `None` if no pool
    /// serves it.
    pub fn acquire(&mut self, kind: HitObjectKind, tree: &mut RenderTree) -> Option<D> {
        let pool_kind = self.lookup(kind)?;
        self.pools.get_mut(&pool_kind).map(|pool| pool.get(tree))
    }

    /// Returns a drawable to the pool it came from.
    ///
    /// # Panics
    ///
    /// Panics if the drawable's pool is not registered here.
    pub fn release(&mut self, drawable: D, tree: &mut RenderTree) {
        let kind = drawable.pool_kind();
        self.pools
            .get_mut(&kind)
            .unwrap_or_else(|| panic!("no pool registered for {kind:?}"))
            .release(drawable, tree);
    }

    /// Returns the pool registered for exactly `kind`.
    #[must_use]
    pub fn pool(&self, kind: HitObjectKind) -> Option<&DrawablePool<D>> {
        self.pools.get(&kind)
    }

    /// Returns the number of drawables handed out across all pools.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.pools.values().map(DrawablePool::in_use).sum()
    }
}
