// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-windowed entry lifetimes.
//!
//! - [`LifetimeEntry`] wraps one hit object with a `[start, end)` window and
//!   lives in an [`EntryStore`] arena, addressed by [`EntryId`].
//! - [`LifetimeEntryManager`] decides which entries overlap the current query
//!   window as it moves forward, backward, or jumps, and reports alive, dead
//!   and boundary-crossing transitions to a [`LifetimeObserver`].
//! - [`HitObjectEntryManager`] mirrors the nesting of hit objects as a tree
//!   of entries and cascades removals through it.

mod entry;
mod manager;
mod nesting;

pub use entry::{EntryId, EntryStore, LifetimeEntry, LifetimeWindow};
pub use manager::{
    BoundaryKind, CrossingDirection, EntryKey, LifetimeEntryManager, LifetimeEvent,
    LifetimeObserver, LifetimeState,
};
pub use nesting::HitObjectEntryManager;
