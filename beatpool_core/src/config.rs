// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container and pool configuration.
//!
//! All configuration is plain `Copy` data with `const` presets, passed to
//! constructors explicitly.

/// What a container does with an entry when the window is rewound past the
/// entry's start boundary.
///
/// Passed to containers via [`ContainerConfig::rewind_policy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RewindPolicy {
    /// Keep the entry registered; it simply becomes dead until the window
    /// reaches it again.
    #[default]
    Retain,
    /// Remove the entry from the container entirely. Nested entries are left
    /// to the regular cascade when the hit object itself is removed.
    Remove,
    /// Remove the entry and immediately remove its nested child entries from
    /// the nesting manager.
    RemoveWithChildren,
}

impl RewindPolicy {
    /// Returns whether rewound entries are dropped under this policy.
    #[must_use]
    pub const fn removes_rewound(self) -> bool {
        !matches!(self, Self::Retain)
    }
}

/// Configuration for a pooled entry container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerConfig {
    /// How far behind the current time the query window extends.
    pub past_lifetime_extension: f64,
    /// How far ahead of the current time the query window extends.
    pub future_lifetime_extension: f64,
    /// Handling of entries rewound past their start.
    pub rewind_policy: RewindPolicy,
    /// How long before a hit object's start time its entry becomes alive.
    pub initial_lifetime_offset: f64,
    /// How long after a hit object's end time its entry stays alive.
    pub trailing_lifetime_offset: f64,
}

impl ContainerConfig {
    /// Gameplay and composer playfields: no window widening, long preload.
    #[must_use]
    pub const fn playfield() -> Self {
        Self {
            past_lifetime_extension: 0.0,
            future_lifetime_extension: 0.0,
            rewind_policy: RewindPolicy::Retain,
            initial_lifetime_offset: 10_000.0,
            trailing_lifetime_offset: 0.0,
        }
    }

    /// Editor timeline: entries stay alive two seconds on either side of the
    /// hit object.
    #[must_use]
    pub const fn timeline() -> Self {
        Self {
            past_lifetime_extension: 0.0,
            future_lifetime_extension: 0.0,
            rewind_policy: RewindPolicy::Retain,
            initial_lifetime_offset: 2_000.0,
            trailing_lifetime_offset: 2_000.0,
        }
    }

    /// Returns a copy with the given window extensions.
    #[must_use]
    pub const fn with_extensions(mut self, past: f64, future: f64) -> Self {
        self.past_lifetime_extension = past;
        self.future_lifetime_extension = future;
        self
    }

    /// Returns a copy with the given rewind policy.
    #[must_use]
    pub const fn with_rewind_policy(mut self, policy: RewindPolicy) -> Self {
        self.rewind_policy = policy;
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::playfield()
    }
}

/// Sizing for a [`DrawablePool`](crate::pool::DrawablePool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PoolConfig {
    /// Number of drawables constructed up front.
    pub initial_size: usize,
    /// Maximum number of idle drawables kept for reuse. Releases beyond this
    /// destroy the drawable. `None` keeps everything.
    pub max_size: Option<usize>,
}

impl PoolConfig {
    /// Creates a pool configuration.
    #[must_use]
    pub const fn new(initial_size: usize, max_size: Option<usize>) -> Self {
        Self {
            initial_size,
            max_size,
        }
    }

    /// Sizing used for the common hit object kinds of a ruleset.
    #[must_use]
    pub const fn hit_objects() -> Self {
        Self::new(10, Some(100))
    }

    /// Sizing used for nested hit objects, of which there are many more.
    #[must_use]
    pub const fn nested() -> Self {
        Self::new(20, Some(200))
    }
}
