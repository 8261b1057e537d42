// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants for the render tree.
//!
//! The [`RenderTree`](crate::tree::RenderTree) uses multi-channel dirty
//! tracking (via [`understory_dirty`]) so that a frame in which only a handful
//! of pooled drawables were attached or moved only revisits those nodes.
//!
//! - [`OFFSET`] propagates to descendants with
//!   [`EagerPolicy`](understory_dirty::EagerPolicy): a nested drawable's
//!   world offset follows its parent's, and so does its effective hidden
//!   state (hidden-flag changes are routed through this channel).
//! - [`DEPTH`] is local-only. Depth changes re-sort the node among its
//!   siblings immediately; the channel only reports which nodes moved.
//! - [`TOPOLOGY`] is marked on attach/detach/create/destroy and triggers a
//!   traversal-order rebuild during evaluation.
//!
//! Callers never query dirty state directly; each
//! [`RenderTree::evaluate`](crate::tree::RenderTree::evaluate) drains every
//! channel into [`TreeChanges`](crate::tree::TreeChanges).

use understory_dirty::Channel;

/// Offset or hidden flag changed; world offsets and effective hidden state of
/// the subtree must be recomputed.
pub const OFFSET: Channel = Channel::new(0);

/// Depth changed; the node was re-sorted among its siblings.
pub const DEPTH: Channel = Channel::new(1);

/// Tree topology changed; triggers traversal order rebuild.
pub const TOPOLOGY: Channel = Channel::new(2);
