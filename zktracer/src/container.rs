//! Rollback-aware chunk containers.
//!
//! Chunks live in a flat arena; entering a transaction records the current
//! arena length as a checkpoint, and popping the transaction truncates the
//! arena back to that checkpoint.

use core::hash::Hash;

use hashbrown::HashSet;

/// An append-only list of chunks with transactional rollback.
#[derive(Clone, Debug)]
pub struct StackedList<T> {
    items: Vec<T>,
    checkpoints: Vec<usize>,
}

impl<T> Default for StackedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StackedList<T> {
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Opens a new scope; everything added from now on is dropped by the
    /// matching [`StackedList::pop`].
    pub fn enter(&mut self) {
        self.checkpoints.push(self.items.len());
    }

    /// Discards every item added since the last [`StackedList::enter`].
    /// Popping without an open scope clears nothing.
    pub fn pop(&mut self) {
        if let Some(checkpoint) = self.checkpoints.pop() {
            self.items.truncate(checkpoint);
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Items added in the innermost open scope.
    pub fn current_scope(&self) -> &[T] {
        let start = self.checkpoints.last().copied().unwrap_or(0);
        &self.items[start..]
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.checkpoints.clear();
    }
}

impl<'a, T> IntoIterator for &'a StackedList<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A [`StackedList`] ignoring items it already holds, so that identical
/// requests are traced once.
#[derive(Clone, Debug)]
pub struct StackedSet<T> {
    list: StackedList<T>,
    seen: HashSet<T>,
}

impl<T: Clone + Eq + Hash> Default for StackedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> StackedSet<T> {
    pub fn new() -> Self {
        Self {
            list: StackedList::new(),
            seen: HashSet::new(),
        }
    }

    pub fn enter(&mut self) {
        self.list.enter();
    }

    pub fn pop(&mut self) {
        for item in self.list.current_scope() {
            self.seen.remove(item);
        }
        self.list.pop();
    }

    /// Adds `item` unless an equal item is already present. Returns whether
    /// it was added.
    pub fn insert(&mut self, item: T) -> bool {
        if !self.seen.insert(item.clone()) {
            return false;
        }
        self.list.push(item);
        true
    }

    pub fn contains(&self, item: &T) -> bool {
        self.seen.contains(item)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Items in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.list.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_discards_the_last_scope_only() {
        let mut list = StackedList::new();
        list.enter();
        list.push(1);
        list.push(2);
        list.enter();
        list.push(3);
        list.push(4);
        list.push(5);
        assert_eq!(list.current_scope(), &[3, 4, 5]);

        list.pop();
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(list.depth(), 1);

        list.enter();
        list.pop();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn pop_without_scope_is_a_no_op() {
        let mut list = StackedList::new();
        list.push("a");
        list.pop();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn set_forgets_popped_items() {
        let mut set = StackedSet::new();
        set.enter();
        assert!(set.insert(7));
        assert!(!set.insert(7));
        set.enter();
        assert!(set.insert(8));
        assert!(!set.insert(7));
        set.pop();
        assert!(!set.contains(&8));
        assert!(set.insert(8));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [7, 8]);
    }
}
