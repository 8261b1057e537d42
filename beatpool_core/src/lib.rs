// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-windowed entry lifetimes and drawable pooling for beatmap editors.
//!
//! `beatpool_core` decides, for a large collection of timed hit objects,
//! which of them are alive as the edit cursor moves forward, backward, or by
//! arbitrary jumps, and binds a bounded set of reusable drawables to exactly
//! the alive subset. It is `no_std` compatible (with `alloc`) and stores
//! entries, hit objects and render nodes in arenas addressed by generational
//! handles.
//!
//! # Architecture
//!
//! Each frame, a container turns its current time into a query window and
//! pushes it through the lifetime manager. Alive/dead transitions come back
//! synchronously and drive pool acquire/release and render-tree edits:
//!
//! ```text
//!   Beatmap ──► HitObjectChange ──► Container::apply_beatmap_changes()
//!                                          │
//!   FrameClock ──► current time ──► Container::update()
//!                                          │
//!                                          ▼
//!                     LifetimeEntryManager::update(window)
//!                                          │
//!                  alive / dead / crossed  │
//!                                          ▼
//!             DrawableHooks ──► PoolRegistry ──► RenderTree::add_child()
//!                                                       │
//!                                                       ▼
//!                                      RenderTree::evaluate() ──► TreeChanges
//! ```
//!
//! **[`lifetime`]**: [`LifetimeEntry`](lifetime::LifetimeEntry) windows in
//! an [`EntryStore`](lifetime::EntryStore), the incremental
//! [`LifetimeEntryManager`](lifetime::LifetimeEntryManager) sweep, and the
//! [`HitObjectEntryManager`](lifetime::HitObjectEntryManager) nesting tree.
//!
//! **[`container`]**: The generic
//! [`PooledEntryDrawableContainer`](container::PooledEntryDrawableContainer)
//! and its playfield and timeline specializations.
//!
//! **[`pool`]**: Bounded drawable pools keyed by
//! [`HitObjectKind`](beatmap::HitObjectKind), with fallback resolution.
//!
//! **[`beatmap`]**: Hit objects, their generated nested objects, and the
//! change queue containers consume.
//!
//! **[`tree`]**: Struct-of-arrays render tree with depth-ordered siblings.
//!
//! **[`dirty`]**: Dirty channels of the render tree, via `understory_dirty`.
//!
//! **[`clock`]**: Seekable per-container frame clock with media sync.
//!
//! **[`config`]**: Container and pool configuration presets.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types,
//! with a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-entry
//!   transition and boundary-crossing events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod beatmap;
pub mod clock;
pub mod config;
pub mod container;
pub mod dirty;
pub mod lifetime;
pub mod pool;
pub mod trace;
pub mod tree;
