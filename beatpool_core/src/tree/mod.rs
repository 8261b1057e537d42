// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render tree data model.
//!
//! Drawables produced by the pools are attached as nodes of a depth-ordered
//! tree. Each node has:
//!
//! - An identity ([`NodeId`]), a generational handle that becomes stale when
//!   the node is destroyed.
//! - Topology: parent, first-child, and sibling links. Siblings are kept
//!   sorted by descending [`depth`](RenderTree::set_depth), so a hit object
//!   whose depth is its start time is drawn beneath later ones.
//! - **Local properties** set by the caller: [`offset`](RenderTree::set_offset),
//!   [`depth`](RenderTree::set_depth), and [`hidden`](RenderTree::set_hidden).
//! - **Computed properties** produced by [`evaluate`](RenderTree::evaluate):
//!   `world_offset` and `effective_hidden`.
//!
//! Nodes are stored in struct-of-arrays layout with index-based handles.

mod evaluate;
mod id;
mod store;
mod traverse;

pub use evaluate::TreeChanges;
pub use id::{INVALID, NodeId};
pub use store::RenderTree;
pub use traverse::Children;
