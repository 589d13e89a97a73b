//! Ordered, id-unique sequence of entries.

use super::entry::Entry;
use super::id::ProductId;
use super::price::Totals;

/// An ordered sequence of entries, unique by product id.
///
/// Every mutating method preserves uniqueness: inserting an id that is
/// already present is refused rather than producing a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Collection {
    entries: Vec<Entry>,
}

impl Collection {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Entries in display order (most recently added first).
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by product id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Insert an entry at the head. Returns false if the id is already present.
    pub fn insert_head(&mut self, entry: Entry) -> bool {
        if self.contains(&entry.id) {
            return false;
        }
        self.entries.insert(0, entry);
        true
    }

    /// Append an entry at the tail. Returns false if the id is already present.
    pub fn push_unique(&mut self, entry: Entry) -> bool {
        if self.contains(&entry.id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove the entry with the given id, if present.
    pub fn remove(&mut self, id: &ProductId) -> Option<Entry> {
        let index = self.entries.iter().position(|e| &e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Overwrite the quantity of an existing entry.
    ///
    /// Returns false if the id is absent. A quantity of zero is stored as 1;
    /// callers wanting removal must call [`Collection::remove`].
    pub fn set_quantity(&mut self, id: &ProductId, quantity: u32) -> bool {
        match self.entries.iter_mut().find(|e| &e.id == id) {
            Some(entry) => {
                entry.quantity = quantity.max(1);
                true
            }
            None => false,
        }
    }

    /// Increase the quantity of an existing entry, saturating at `u32::MAX`.
    ///
    /// Returns false if the id is absent.
    pub fn increment(&mut self, id: &ProductId, by: u32) -> bool {
        match self.entries.iter_mut().find(|e| &e.id == id) {
            Some(entry) => {
                entry.quantity = entry.quantity.saturating_add(by);
                true
            }
            None => false,
        }
    }

    /// Aggregate totals recomputed from the current entries.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::from_entries(&self.entries)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Entry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entry::ProductSnapshot;

    fn entry(id: &str, quantity: u32) -> Entry {
        Entry::reconciled(ProductId::new(id), quantity, ProductSnapshot::empty())
    }

    #[test]
    fn test_insert_head_puts_newest_first() {
        let mut collection = Collection::new();
        assert!(collection.insert_head(entry("P1", 1)));
        assert!(collection.insert_head(entry("P2", 1)));

        let ids: Vec<_> = collection.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["P2", "P1"]);
    }

    #[test]
    fn test_duplicate_ids_are_refused() {
        let mut collection = Collection::new();
        assert!(collection.insert_head(entry("P1", 1)));
        assert!(!collection.insert_head(entry("P1", 5)));
        assert!(!collection.push_unique(entry("P1", 5)));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get(&ProductId::new("P1")).map(|e| e.quantity), Some(1));
    }

    #[test]
    fn test_remove_absent_is_none() {
        let mut collection = Collection::new();
        collection.push_unique(entry("P1", 1));
        assert!(collection.remove(&ProductId::new("P9")).is_none());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_increment_saturates() {
        let mut collection = Collection::new();
        collection.push_unique(entry("P1", u32::MAX - 1));
        assert!(collection.increment(&ProductId::new("P1"), 5));
        assert_eq!(collection.get(&ProductId::new("P1")).map(|e| e.quantity), Some(u32::MAX));
    }

    #[test]
    fn test_set_quantity_on_absent_id() {
        let mut collection = Collection::new();
        assert!(!collection.set_quantity(&ProductId::new("P1"), 3));
        assert!(collection.is_empty());
    }
}
