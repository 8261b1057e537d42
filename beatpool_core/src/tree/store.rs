// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with depth-ordered siblings.

use alloc::vec::Vec;

use kurbo::Vec2;
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::id::{INVALID, NodeId};
use super::traverse::Children;
use crate::dirty;

/// Struct-of-arrays storage for every node of the render tree.
///
/// Nodes are addressed by [`NodeId`] handles. Destroyed nodes are recycled via
/// a free list, and generation counters prevent stale handle access.
///
/// Siblings are always kept sorted by descending [`depth`](Self::depth): the
/// first child has the highest depth. Nodes of equal depth keep their
/// insertion order.
#[derive(Debug)]
pub struct RenderTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Local properties --
    pub(crate) offset: Vec<Vec2>,
    pub(crate) depth: Vec<f64>,
    pub(crate) hidden: Vec<bool>,

    // -- Computed properties (written by evaluate) --
    pub(crate) world_offset: Vec<Vec2>,
    pub(crate) effective_hidden: Vec<bool>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    pub(crate) dirty: DirtyTracker<u32>,

    pub(crate) traversal_order: Vec<u32>,
    pub(crate) traversal_dirty: bool,

    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,
}

impl Default for RenderTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            offset: Vec::new(),
            depth: Vec::new(),
            hidden: Vec::new(),
            world_offset: Vec::new(),
            effective_hidden: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            traversal_order: Vec::new(),
            traversal_dirty: true,
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
        }
    }

    /// Creates a detached node with zero offset and depth.
    pub fn create_node(&mut self) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.offset[i] = Vec2::ZERO;
            self.depth[i] = 0.0;
            self.hidden[i] = false;
            self.world_offset[i] = Vec2::ZERO;
            self.effective_hidden[i] = false;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.offset.push(Vec2::ZERO);
            self.depth.push(0.0);
            self.hidden.push(false);
            self.world_offset.push(Vec2::ZERO);
            self.effective_hidden.push(false);
            self.generation.push(0);
            idx
        };

        self.traversal_dirty = true;
        self.pending_added.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);

        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a node, freeing its slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the node still has children or if the handle is stale.
    pub fn destroy_node(&mut self, id: NodeId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy node with children"
        );

        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.dirty.remove_dependency(idx, p, dirty::OFFSET);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }

        self.dirty.remove_key(idx);
        self.generation[idx as usize] += 1;

        self.free_list.push(idx);
        self.traversal_dirty = true;
        self.pending_removed.push(idx);
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Topology --

    /// Attaches `child` under `parent`, placed among its siblings by depth.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.validate(parent);
        self.validate(child);
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );

        self.link_sorted(parent.idx, c);

        let _ = self.dirty.add_dependency(c, parent.idx, dirty::OFFSET);
        self.dirty.mark_with(c, dirty::OFFSET, &EagerPolicy);
        self.traversal_dirty = true;
        self.dirty.mark(parent.idx, dirty::TOPOLOGY);
    }

    /// Detaches `child` from its parent without destroying it.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the node has no parent.
    pub fn remove_from_parent(&mut self, child: NodeId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "node has no parent");

        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::OFFSET);

        self.dirty.mark_with(c, dirty::OFFSET, &EagerPolicy);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        if p == INVALID {
            None
        } else {
            Some(NodeId {
                idx: p,
                generation: self.generation[p as usize],
            })
        }
    }

    /// Returns an iterator over the direct children of a node, highest depth
    /// first.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the live nodes that have no parent.
    #[must_use]
    pub fn roots(&self) -> Vec<NodeId> {
        (0..self.len)
            .filter(|&idx| self.parent[idx as usize] == INVALID && !self.free_list.contains(&idx))
            .map(|idx| NodeId {
                idx,
                generation: self.generation[idx as usize],
            })
            .collect()
    }

    // -- Properties --

    /// Returns the local offset of a node.
    #[must_use]
    pub fn offset(&self, id: NodeId) -> Vec2 {
        self.validate(id);
        self.offset[id.idx as usize]
    }

    /// Returns the depth of a node.
    #[must_use]
    pub fn depth(&self, id: NodeId) -> f64 {
        self.validate(id);
        self.depth[id.idx as usize]
    }

    /// Returns the hidden flag of a node.
    #[must_use]
    pub fn hidden(&self, id: NodeId) -> bool {
        self.validate(id);
        self.hidden[id.idx as usize]
    }

    /// Returns the world offset (sum of ancestor offsets).
    ///
    /// Only valid after [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn world_offset(&self, id: NodeId) -> Vec2 {
        self.validate(id);
        self.world_offset[id.idx as usize]
    }

    /// Returns whether the node or one of its ancestors is hidden.
    ///
    /// Only valid after [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn effective_hidden(&self, id: NodeId) -> bool {
        self.validate(id);
        self.effective_hidden[id.idx as usize]
    }

    /// Sets the local offset of a node.
    pub fn set_offset(&mut self, id: NodeId, offset: Vec2) {
        self.validate(id);
        if self.offset[id.idx as usize] == offset {
            return;
        }
        self.offset[id.idx as usize] = offset;
        self.dirty.mark_with(id.idx, dirty::OFFSET, &EagerPolicy);
    }

    /// Sets the hidden flag of a node.
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        self.validate(id);
        self.hidden[id.idx as usize] = hidden;
        self.dirty.mark_with(id.idx, dirty::OFFSET, &EagerPolicy);
    }

    /// Sets the depth of a node, re-sorting it among its siblings if it is
    /// attached.
    pub fn set_depth(&mut self, id: NodeId, depth: f64) {
        self.validate(id);
        let idx = id.idx;
        if self.depth[idx as usize] == depth {
            return;
        }
        self.depth[idx as usize] = depth;

        let p = self.parent[idx as usize];
        if p != INVALID {
            self.unlink_from_parent(idx);
            self.link_sorted(p, idx);
            self.traversal_dirty = true;
        }
        self.dirty.mark(idx, dirty::DEPTH);
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: NodeId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Links `c` under `p` before the first sibling with a lower depth.
    fn link_sorted(&mut self, p: u32, c: u32) {
        let depth = self.depth[c as usize];
        self.parent[c as usize] = p;

        let mut prev = INVALID;
        let mut next = self.first_child[p as usize];
        while next != INVALID && self.depth[next as usize] >= depth {
            prev = next;
            next = self.next_sibling[next as usize];
        }

        self.prev_sibling[c as usize] = prev;
        self.next_sibling[c as usize] = next;
        if prev == INVALID {
            self.first_child[p as usize] = c;
        } else {
            self.next_sibling[prev as usize] = c;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = c;
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn create_and_destroy() {
        let mut tree = RenderTree::new();
        let id = tree.create_node();
        assert!(tree.is_alive(id));
        assert_eq!(tree.node_count(), 1);
        tree.destroy_node(id);
        assert!(!tree.is_alive(id));
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut tree = RenderTree::new();
        let a = tree.create_node();
        tree.destroy_node(a);
        let b = tree.create_node();
        assert!(!tree.is_alive(a));
        assert!(tree.is_alive(b));
        assert_eq!(a.idx, b.idx);
        assert_ne!(a.generation, b.generation);
    }

    #[test]
    fn children_are_sorted_by_descending_depth() {
        let mut tree = RenderTree::new();
        let root = tree.create_node();
        let early = tree.create_node();
        let late = tree.create_node();
        let middle = tree.create_node();
        tree.set_depth(early, 100.0);
        tree.set_depth(late, 900.0);
        tree.set_depth(middle, 500.0);

        tree.add_child(root, early);
        tree.add_child(root, late);
        tree.add_child(root, middle);

        let kids: Vec<_> = tree.children(root).collect();
        assert_eq!(kids, vec![late, middle, early]);
    }

    #[test]
    fn equal_depth_keeps_insertion_order() {
        let mut tree = RenderTree::new();
        let root = tree.create_node();
        let a = tree.create_node();
        let b = tree.create_node();
        tree.add_child(root, a);
        tree.add_child(root, b);
        let kids: Vec<_> = tree.children(root).collect();
        assert_eq!(kids, vec![a, b]);
    }

    #[test]
    fn set_depth_resorts_attached_node() {
        let mut tree = RenderTree::new();
        let root = tree.create_node();
        let a = tree.create_node();
        let b = tree.create_node();
        tree.set_depth(a, 10.0);
        tree.set_depth(b, 20.0);
        tree.add_child(root, a);
        tree.add_child(root, b);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![b, a]);

        tree.set_depth(a, 30.0);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.parent(a), Some(root));
    }

    #[test]
    fn remove_from_parent_detaches_without_destroying() {
        let mut tree = RenderTree::new();
        let root = tree.create_node();
        let child = tree.create_node();
        tree.add_child(root, child);
        tree.remove_from_parent(child);
        assert_eq!(tree.parent(child), None);
        assert!(tree.is_alive(child));
        assert!(tree.children(root).next().is_none());
    }

    #[test]
    fn roots_returns_parentless_nodes() {
        let mut tree = RenderTree::new();
        let a = tree.create_node();
        let b = tree.create_node();
        let c = tree.create_node();
        tree.add_child(a, c);

        let roots = tree.roots();
        assert!(roots.contains(&a));
        assert!(roots.contains(&b));
        assert!(!roots.contains(&c));
    }

    #[test]
    #[should_panic(expected = "cannot destroy node with children")]
    fn destroy_with_children_panics() {
        let mut tree = RenderTree::new();
        let parent = tree.create_node();
        let child = tree.create_node();
        tree.add_child(parent, child);
        tree.destroy_node(parent);
    }

    #[test]
    #[should_panic(expected = "child already has a parent")]
    fn double_attach_panics() {
        let mut tree = RenderTree::new();
        let a = tree.create_node();
        let b = tree.create_node();
        let child = tree.create_node();
        tree.add_child(a, child);
        tree.add_child(b, child);
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn destroyed_handle_panics_on_set_offset() {
        let mut tree = RenderTree::new();
        let id = tree.create_node();
        tree.destroy_node(id);
        tree.set_offset(id, Vec2::new(1.0, 2.0));
    }
}
