//! Item-level diffing between two collections.

use std::collections::BTreeSet;

use super::item::{Item, ItemDiff};

/// The classified difference between an old and a new item collection.
///
/// Produced by [`ItemChanges::between`], consumed once by the engine, then
/// discarded. Every set iterates in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    /// Positions present only in the new collection.
    pub insertions: BTreeSet<usize>,
    /// Positions whose content changed but whose view kind did not.
    pub updates: BTreeSet<usize>,
    /// Positions whose view kind changed and need a fresh cell.
    pub reloads: BTreeSet<usize>,
    /// Positions present only in the old collection.
    pub deletions: BTreeSet<usize>,
    /// Positions whose nested composite content changed.
    pub child_updates: BTreeSet<usize>,
}

impl ItemChanges {
    /// Diff two collections position by position.
    ///
    /// Returns `None` when the collections are equal.
    ///
    /// # Example
    ///
    /// ```
    /// use horizon_stack::model::{Item, ItemChanges};
    ///
    /// let old = vec![Item::new("A"), Item::new("B")];
    /// let new = vec![Item::new("A"), Item::new("b"), Item::new("C")];
    ///
    /// let changes = ItemChanges::between(&old, &new).unwrap();
    /// assert_eq!(changes.updates.iter().copied().collect::<Vec<_>>(), vec![1]);
    /// assert_eq!(changes.insertions.iter().copied().collect::<Vec<_>>(), vec![2]);
    /// ```
    pub fn between(old: &[Item], new: &[Item]) -> Option<Self> {
        if old == new {
            return None;
        }

        let diffs = Self::evaluate(old, new);
        Some(Self::from_diffs(&diffs))
    }

    /// Per-position diff of two collections.
    pub fn evaluate(old: &[Item], new: &[Item]) -> Vec<ItemDiff> {
        let len = old.len().max(new.len());
        (0..len)
            .map(|index| match (old.get(index), new.get(index)) {
                (Some(old), Some(new)) => new.diff(old),
                (None, Some(_)) => ItemDiff::New,
                (Some(_), None) => ItemDiff::Removed,
                (None, None) => ItemDiff::None,
            })
            .collect()
    }

    /// Classify a per-position diff list.
    pub fn from_diffs(diffs: &[ItemDiff]) -> Self {
        let mut changes = Self::default();
        for (index, diff) in diffs.iter().enumerate() {
            match diff {
                ItemDiff::None => {}
                ItemDiff::New => {
                    changes.insertions.insert(index);
                }
                ItemDiff::Removed => {
                    changes.deletions.insert(index);
                }
                ItemDiff::Kind => {
                    changes.reloads.insert(index);
                }
                ItemDiff::Children => {
                    changes.child_updates.insert(index);
                }
                ItemDiff::Identifier
                | ItemDiff::Title
                | ItemDiff::Subtitle
                | ItemDiff::Text
                | ItemDiff::Image
                | ItemDiff::Action
                | ItemDiff::Meta => {
                    changes.updates.insert(index);
                }
            }
        }
        changes
    }

    /// Returns `true` if there are insertions, deletions or reloads.
    pub fn has_structural_changes(&self) -> bool {
        !self.insertions.is_empty() || !self.deletions.is_empty() || !self.reloads.is_empty()
    }

    /// Returns `true` if nothing changed at all.
    pub fn is_empty(&self) -> bool {
        !self.has_structural_changes() && self.updates.is_empty() && self.child_updates.is_empty()
    }

    /// Insertions as an ordered vector.
    pub fn insertion_indexes(&self) -> Vec<usize> {
        self.insertions.iter().copied().collect()
    }

    /// Deletions as an ordered vector.
    pub fn deletion_indexes(&self) -> Vec<usize> {
        self.deletions.iter().copied().collect()
    }

    /// Reloads as an ordered vector.
    pub fn reload_indexes(&self) -> Vec<usize> {
        self.reloads.iter().copied().collect()
    }
}
