// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Containers that bind alive entries to drawables in a [`RenderTree`].
//!
//! [`PooledEntryDrawableContainer`] is the generic engine: it owns a
//! [`LifetimeEntryManager`](crate::lifetime::LifetimeEntryManager), widens
//! the current time into a query window, and turns alive/dead transitions
//! into calls on a [`DrawableHooks`] implementation. The two hit object
//! containers specialize it:
//!
//! - [`HitObjectContainer`] for gameplay and composer playfields, with
//!   nested drawables and externally owned drawables.
//! - [`HitObjectBlueprintContainer`] for the editor timeline, with overlap
//!   stacking.
//!
//! [`RenderTree`]: crate::tree::RenderTree

mod blueprint;
mod hit_object;
mod pooled;

pub use blueprint::{HitObjectBlueprint, HitObjectBlueprintContainer};
pub use hit_object::{DrawableHitObject, HitObjectContainer, HitObjectUsage, HitResult};
pub use pooled::{DrawableHooks, PooledEntryDrawableContainer};
