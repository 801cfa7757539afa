//! Depth-first iteration over the trie.
//!
//! Traversal is pre-order and lazy: a stack of slice iterators (one frame
//! per trie level, at most 8 deep) walks the node structure without
//! collecting entries up front. Order is unspecified but deterministic for
//! a given map instance: re-iterating the same map yields the same
//! sequence.

use std::iter::FusedIterator;
use std::slice;

use smallvec::SmallVec;

use crate::node::{Node, NodeRef};

/// Deepest possible frame stack: seven shard levels plus a root frame.
const MAX_TRIE_DEPTH: usize = 8;

/// One in-progress trie level.
enum Frame<'a, K, V> {
    /// Entries of an `ArrayMap` or `HashCollision` node.
    Entries(slice::Iter<'a, (K, V)>),
    /// Packed children of a `BitmapIndexed` node.
    Children(slice::Iter<'a, NodeRef<K, V>>),
    /// The 32 slots of a `HashArrayMap` node.
    Slots(slice::Iter<'a, Option<NodeRef<K, V>>>),
}

/// An iterator over key-value pairs of a
/// [`PersistentHashMap`](crate::PersistentHashMap).
pub struct PersistentHashMapIterator<'a, K, V> {
    /// Pending entry from a `Value` node awaiting yield.
    leaf: Option<(&'a K, &'a V)>,
    stack: SmallVec<[Frame<'a, K, V>; MAX_TRIE_DEPTH]>,
    remaining: usize,
}

impl<'a, K, V> PersistentHashMapIterator<'a, K, V> {
    pub(crate) fn new(root: Option<&'a Node<K, V>>, length: usize) -> Self {
        let mut iterator = Self {
            leaf: None,
            stack: SmallVec::new(),
            remaining: length,
        };
        if let Some(node) = root {
            iterator.enter(node);
        }
        iterator
    }

    /// Stages a node for traversal: leaves park their entry, branches push
    /// a frame.
    fn enter(&mut self, node: &'a Node<K, V>) {
        match node {
            Node::Value(leaf) => self.leaf = Some((&leaf.key, &leaf.value)),
            Node::ArrayMap(array_map) => {
                self.stack.push(Frame::Entries(array_map.entries.iter()));
            }
            Node::HashCollision(collision) => {
                self.stack.push(Frame::Entries(collision.entries.iter()));
            }
            Node::BitmapIndexed(bitmap_node) => {
                self.stack.push(Frame::Children(bitmap_node.children.iter()));
            }
            Node::HashArrayMap(hash_array) => {
                self.stack.push(Frame::Slots(hash_array.children.iter()));
            }
        }
    }
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.leaf.take() {
                self.remaining -= 1;
                return Some(entry);
            }
            let descend: &'a Node<K, V> = match self.stack.last_mut()? {
                Frame::Entries(entries) => match entries.next() {
                    Some((key, value)) => {
                        self.remaining -= 1;
                        return Some((key, value));
                    }
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                Frame::Children(children) => match children.next() {
                    Some(child) => child.as_ref(),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                Frame::Slots(slots) => match slots.next() {
                    Some(Some(child)) => child.as_ref(),
                    Some(None) => continue,
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
            };
            self.enter(descend);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for PersistentHashMapIterator<'_, K, V> {}

/// An owning iterator over key-value pairs of a
/// [`PersistentHashMap`](crate::PersistentHashMap).
pub struct PersistentHashMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> PersistentHashMapIntoIterator<K, V> {
    pub(crate) fn new(entries: Vec<(K, V)>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl<K, V> Iterator for PersistentHashMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> FusedIterator for PersistentHashMapIntoIterator<K, V> {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReferenceCounter;
    use crate::equality::hash_of;
    use crate::owner::OwnerId;
    use rstest::rstest;

    fn trie_with(keys: impl IntoIterator<Item = i32>) -> (NodeRef<i32, i32>, usize) {
        let mut keys = keys.into_iter();
        let first = keys.next().expect("at least one key");
        let mut root: NodeRef<i32, i32> =
            ReferenceCounter::new(Node::array_map_root(OwnerId::NONE, first, first * 2));
        let mut length = 1;
        for key in keys {
            let mut added = false;
            Node::insert(
                &mut root,
                OwnerId::NONE,
                0,
                hash_of(&key),
                &key,
                &(key * 2),
                &mut added,
            );
            if added {
                length += 1;
            }
        }
        (root, length)
    }

    #[rstest]
    fn test_empty_iterator_yields_nothing() {
        let mut iterator: PersistentHashMapIterator<'_, i32, i32> =
            PersistentHashMapIterator::new(None, 0);
        assert_eq!(iterator.next(), None);
        assert_eq!(iterator.len(), 0);
    }

    #[rstest]
    fn test_iterator_visits_every_entry_once() {
        let (root, length) = trie_with(0..100);
        let mut seen: Vec<i32> = PersistentHashMapIterator::new(Some(&*root), length)
            .map(|(key, _)| *key)
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_iterator_size_hint_is_exact() {
        let (root, length) = trie_with(0..40);
        let mut iterator = PersistentHashMapIterator::new(Some(&*root), length);
        assert_eq!(iterator.size_hint(), (40, Some(40)));
        iterator.next();
        assert_eq!(iterator.size_hint(), (39, Some(39)));
    }

    #[rstest]
    fn test_reiteration_yields_identical_sequence() {
        let (root, length) = trie_with(0..50);
        let first_pass: Vec<i32> = PersistentHashMapIterator::new(Some(&*root), length)
            .map(|(key, _)| *key)
            .collect();
        let second_pass: Vec<i32> = PersistentHashMapIterator::new(Some(&*root), length)
            .map(|(key, _)| *key)
            .collect();

        assert_eq!(first_pass, second_pass);
    }
}
