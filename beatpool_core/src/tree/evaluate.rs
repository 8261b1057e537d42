// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame evaluation and change tracking.
//!
//! Evaluation drains each dirty channel in turn:
//!
//! 1. **OFFSET**: recompute each dirty node's `world_offset` as
//!    `parent_world + offset` and `effective_hidden` as
//!    `parent_effective_hidden || hidden`.
//! 2. **DEPTH**: collect the nodes that were re-sorted among their siblings.
//! 3. **TOPOLOGY**: drain and discard (the traversal order was already
//!    rebuilt at the start of evaluation if needed).
//!
//! [`TreeChanges`] uses raw slot indices (`u32`) so a presenter can index the
//! tree's arrays without paying for generation checks.

use alloc::vec::Vec;

use kurbo::Vec2;

use super::id::INVALID;
use super::store::RenderTree;
use crate::dirty;

/// The set of changes produced by a single [`RenderTree::evaluate`] call.
#[derive(Clone, Debug, Default)]
pub struct TreeChanges {
    /// Nodes whose world offset was recomputed.
    pub offsets: Vec<u32>,
    /// Nodes that transitioned from visible to effectively hidden.
    pub hidden: Vec<u32>,
    /// Nodes that transitioned from effectively hidden to visible.
    pub unhidden: Vec<u32>,
    /// Nodes whose depth changed.
    pub reordered: Vec<u32>,
    /// Nodes created since the last evaluate.
    pub added: Vec<u32>,
    /// Nodes destroyed since the last evaluate.
    pub removed: Vec<u32>,
    /// Whether the traversal order was rebuilt.
    pub topology_changed: bool,
}

impl TreeChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.offsets.clear();
        self.hidden.clear();
        self.unhidden.clear();
        self.reordered.clear();
        self.added.clear();
        self.removed.clear();
        self.topology_changed = false;
    }
}

impl RenderTree {
    /// Evaluates the tree, recomputing dirty properties and returning the set
    /// of changes.
    pub fn evaluate(&mut self) -> TreeChanges {
        let mut changes = TreeChanges::default();
        self.evaluate_into(&mut changes);
        changes
    }

    /// Like [`evaluate`](Self::evaluate), but reuses a caller-provided buffer.
    pub fn evaluate_into(&mut self, changes: &mut TreeChanges) {
        changes.clear();

        if self.traversal_dirty {
            self.rebuild_traversal_order();
            changes.topology_changed = true;
            self.traversal_dirty = false;
        }

        let dirty_offsets: Vec<u32> = self
            .dirty
            .drain(dirty::OFFSET)
            .affected()
            .deterministic()
            .run()
            .collect();
        for &idx in &dirty_offsets {
            let i = idx as usize;
            let parent_idx = self.parent[i];
            let (parent_world, parent_hidden) = if parent_idx != INVALID {
                (
                    self.world_offset[parent_idx as usize],
                    self.effective_hidden[parent_idx as usize],
                )
            } else {
                (Vec2::ZERO, false)
            };
            self.world_offset[i] = parent_world + self.offset[i];

            let new_hidden = parent_hidden || self.hidden[i];
            if new_hidden != self.effective_hidden[i] {
                if new_hidden {
                    changes.hidden.push(idx);
                } else {
                    changes.unhidden.push(idx);
                }
                self.effective_hidden[i] = new_hidden;
            }
        }
        changes.offsets = dirty_offsets;

        changes.reordered = self
            .dirty
            .drain(dirty::DEPTH)
            .deterministic()
            .run()
            .collect();

        let _: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();

        core::mem::swap(&mut self.pending_added, &mut changes.added);
        core::mem::swap(&mut self.pending_removed, &mut changes.removed);
    }

    /// Returns the current traversal order (depth-first pre-order, siblings
    /// highest depth first).
    ///
    /// Only valid after [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn traversal_order(&self) -> &[u32] {
        &self.traversal_order
    }

    fn rebuild_traversal_order(&mut self) {
        self.traversal_order.clear();
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID && !self.free_list.contains(&idx) {
                self.dfs_collect(idx);
            }
        }
    }

    fn dfs_collect(&mut self, idx: u32) {
        self.traversal_order.push(idx);
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.dfs_collect(child);
            child = self.next_sibling[child as usize];
        }
    }
}
