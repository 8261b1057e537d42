// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parent/child relationships between entries.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::entry::{EntryId, EntryStore, LifetimeEntry};
use crate::beatmap::HitObjectId;

/// Keeps the entry tree consistent with the nesting of hit objects.
///
/// Every managed hit object has exactly one entry. A nested entry is listed
/// in its parent entry's [`children`](LifetimeEntry::children) and never
/// outlives it. Entries that were inserted into the [`EntryStore`] directly
/// (synthetic entries) are not managed here.
#[derive(Clone, Debug, Default)]
pub struct HitObjectEntryManager {
    entries: BTreeMap<HitObjectId, EntryId>,
    parents: BTreeMap<EntryId, HitObjectId>,
}

impl HitObjectEntryManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry` and registers it for its hit object, optionally under
    /// the entry of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if the hit object already has an entry, or if `parent` has
    /// none.
    pub fn add(
        &mut self,
        store: &mut EntryStore,
        entry: LifetimeEntry,
        parent: Option<HitObjectId>,
    ) -> EntryId {
        let hit_object = entry.hit_object();
        assert!(
            !self.entries.contains_key(&hit_object),
            "hit object already has an entry: {hit_object:?}"
        );
        let parent_entry = parent.map(|p| {
            *self
                .entries
                .get(&p)
                .unwrap_or_else(|| panic!("parent hit object has no entry: {p:?}"))
        });

        let id = store.insert(entry);
        self.entries.insert(hit_object, id);
        if let (Some(parent), Some(parent_entry)) = (parent, parent_entry) {
            if let Some(parent_entry) = store.get_mut(parent_entry) {
                parent_entry.children.push(id);
            }
            self.parents.insert(id, parent);
        }
        id
    }

    /// Removes `entry`, detaching it from its parent and removing all of its
    /// descendants.
    ///
    /// Returns `false` for stale handles and for entries this manager does
    /// not manage.
    pub fn remove(&mut self, store: &mut EntryStore, entry: EntryId) -> bool {
        let Some(hit_object) = store.get(entry).map(LifetimeEntry::hit_object) else {
            return false;
        };
        if self.entries.get(&hit_object) != Some(&entry) {
            return false;
        }

        self.remove_children(store, entry);

        if let Some(parent) = self.parents.remove(&entry)
            && let Some(&parent_entry) = self.entries.get(&parent)
            && let Some(parent_entry) = store.get_mut(parent_entry)
        {
            parent_entry.children.retain(|&c| c != entry);
        }
        self.entries.remove(&hit_object);
        store.remove(entry);
        true
    }

    /// Removes every child of the hit object's entry, recursively.
    ///
    /// Called when the hit object's nested objects were regenerated; the
    /// caller re-adds fresh children afterwards. Returns the number of direct
    /// children removed.
    pub fn on_structure_changed(&mut self, store: &mut EntryStore, hit_object: HitObjectId) -> usize {
        match self.entries.get(&hit_object) {
            Some(&entry) => self.remove_children(store, entry),
            None => 0,
        }
    }

    /// Returns the entry of a hit object.
    #[must_use]
    pub fn get(&self, hit_object: HitObjectId) -> Option<EntryId> {
        self.entries.get(&hit_object).copied()
    }

    /// Returns the parent hit object of a nested entry.
    #[must_use]
    pub fn parent_of(&self, entry: EntryId) -> Option<HitObjectId> {
        self.parents.get(&entry).copied()
    }

    /// Returns whether `entry` is managed and has no parent.
    #[must_use]
    pub fn is_root(&self, entry: EntryId) -> bool {
        self.entries.values().any(|&e| e == entry) && !self.parents.contains_key(&entry)
    }

    /// Returns the managed entries without a parent, by hit object.
    pub fn roots(&self) -> impl Iterator<Item = (HitObjectId, EntryId)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !self.parents.contains_key(e))
            .map(|(&h, &e)| (h, e))
    }

    /// Returns the number of managed entries, nested ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no entries are managed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_children(&mut self, store: &mut EntryStore, entry: EntryId) -> usize {
        let children: Vec<EntryId> = store
            .get_mut(entry)
            .map(|e| core::mem::take(&mut e.children))
            .unwrap_or_default();
        for &child in &children {
            self.parents.remove(&child);
            self.remove(store, child);
        }
        children.len()
    }
}
