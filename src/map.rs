//! Persistent hash map façade and its transient counterpart.
//!
//! [`PersistentHashMap`] is the user-visible immutable map: every mutating
//! operation returns a new logical map sharing structure with its
//! predecessor, and an operation that changes nothing returns the receiver
//! with its root pointer intact.
//!
//! [`TransientHashMap`] is the batched-construction view. It holds a fresh
//! owner token; nodes created during the batch carry that token and are
//! edited in place, while nodes inherited from immutable maps are cloned on
//! first touch. Sealing with [`TransientHashMap::persistent`] consumes the
//! handle, so a sealed transient cannot be written again.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;

use crate::ReferenceCounter;
use crate::equality::hash_of;
use crate::iter::{PersistentHashMapIntoIterator, PersistentHashMapIterator};
use crate::node::{Node, NodeRef, Outcome};
use crate::owner::OwnerId;

// =============================================================================
// PersistentHashMap
// =============================================================================

/// A persistent (immutable) hash map backed by a Hash Array Mapped Trie.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
///
/// # Examples
///
/// ```rust
/// use shardmap::PersistentHashMap;
///
/// let map = PersistentHashMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
#[derive(Clone)]
pub struct PersistentHashMap<K, V> {
    /// Root node of the trie; `None` for the empty map.
    pub(crate) root: Option<NodeRef<K, V>>,
    /// Number of entries.
    pub(crate) length: usize,
}

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new empty map. Allocates nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether two maps share the same root node.
    ///
    /// This is the observable form of the structural-sharing guarantees:
    /// a no-op write returns a map for which `ptr_eq` with the receiver
    /// holds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::singleton("key".to_string(), 1);
    /// let same = map.insert("key".to_string(), 1);
    /// assert!(map.ptr_eq(&same));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns an iterator over key-value pairs.
    ///
    /// Order is unspecified but stable: re-iterating the same map instance
    /// yields the same sequence.
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator::new(self.root.as_deref(), self.length)
    }

    /// Returns an iterator over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 3);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K: Hash + Eq, V> PersistentHashMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash`
    /// and `Eq` on the borrowed form must match those for the key type.
    /// Misses return `None`, never an error.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_of(key);
        self.root
            .as_deref()
            .and_then(|node| Node::lookup(node, hash, key))
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K, V> PersistentHashMap<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
{
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced. When the
    /// stored value is already equal, the receiver is returned unchanged
    /// (`ptr_eq` holds).
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = hash_of(&key);
        let Some(root) = &self.root else {
            return Self {
                root: Some(ReferenceCounter::new(Node::array_map_root(
                    OwnerId::NONE,
                    key,
                    value,
                ))),
                length: 1,
            };
        };
        let mut updated = ReferenceCounter::clone(root);
        let mut added = false;
        let outcome = Node::insert(&mut updated, OwnerId::NONE, 0, hash, &key, &value, &mut added);
        if outcome == Outcome::Unchanged {
            return self.clone();
        }
        Self {
            root: Some(updated),
            length: self.length + usize::from(added),
        }
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. If the key is absent, the
    /// receiver is returned unchanged (`ptr_eq` holds).
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let removed = map.remove("a");
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get("a"), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_of(key);
        let Some(root) = &self.root else {
            return self.clone();
        };
        let mut updated = ReferenceCounter::clone(root);
        match Node::remove(&mut updated, OwnerId::NONE, 0, hash, key) {
            Outcome::Unchanged => self.clone(),
            Outcome::Edited => Self {
                root: Some(updated),
                length: self.length - 1,
            },
            Outcome::Removed => Self {
                root: None,
                length: self.length - 1,
            },
        }
    }

    /// Updates, inserts, or removes the entry for a key.
    ///
    /// The updater receives `Some(&V)` if the key exists, or `None` if it
    /// doesn't. Returning `Some(value)` inserts or replaces; returning
    /// `None` removes the entry (if any). An update that changes nothing
    /// returns the receiver unchanged.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("count".to_string(), 10);
    ///
    /// // Increment existing value
    /// let updated = map.update("count".to_string(), |current| {
    ///     current.map(|value| value + 1)
    /// });
    /// assert_eq!(updated.get("count"), Some(&11));
    ///
    /// // Insert if not exists
    /// let inserted = map.update("missing".to_string(), |current| {
    ///     Some(current.copied().unwrap_or(100))
    /// });
    /// assert_eq!(inserted.get("missing"), Some(&100));
    ///
    /// // Remove by returning None
    /// let removed = map.update("count".to_string(), |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update<F>(&self, key: K, updater: F) -> Self
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match updater(self.get(&key)) {
            Some(value) => self.insert(key, value),
            None => self.remove(&key),
        }
    }

    /// Merges another map into this one, with values from `other` taking
    /// precedence on key conflicts.
    ///
    /// Runs through an internal transient, so the batch costs one node
    /// path per distinct key rather than one map snapshot per key. When no
    /// entry effectively changes, the receiver is returned unchanged.
    ///
    /// # Complexity
    ///
    /// O(M log32 N) where M is the size of `other`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let map2 = PersistentHashMap::new()
    ///     .insert("b".to_string(), 3)
    ///     .insert("c".to_string(), 4);
    ///
    /// let merged = map1.merge(&map2);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&3)); // From map2
    /// assert_eq!(merged.get("c"), Some(&4));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.merge_with(|_, incoming, _| incoming.clone(), other)
    }

    /// Merges another map into this one, resolving key conflicts with
    /// `merger(current, incoming, key)`.
    ///
    /// The merger runs only for keys present in both maps; keys unique to
    /// `other` are taken as-is. No recursion into values happens.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let map2 = PersistentHashMap::new()
    ///     .insert("b".to_string(), 3)
    ///     .insert("c".to_string(), 4);
    ///
    /// let merged = map1.merge_with(|current, incoming, _| current + incoming, &map2);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&5));
    /// assert_eq!(merged.get("c"), Some(&4));
    /// ```
    #[must_use]
    pub fn merge_with<F>(&self, mut merger: F, other: &Self) -> Self
    where
        F: FnMut(&V, &V, &K) -> V,
    {
        if other.is_empty() {
            return self.clone();
        }
        let mut transient = self.clone().transient();
        for (key, incoming) in other.iter() {
            let merged = match transient.get(key) {
                Some(current) => merger(current, incoming, key),
                None => incoming.clone(),
            };
            transient.insert(key.clone(), merged);
        }
        transient.persistent()
    }

    /// Returns an empty map. When the receiver is already empty, it is
    /// returned unchanged.
    #[must_use]
    pub fn clear(&self) -> Self {
        if self.is_empty() {
            self.clone()
        } else {
            Self::new()
        }
    }

    /// Converts this map into a transient for batched mutation.
    ///
    /// The transient starts sharing this map's nodes; a fresh owner token
    /// confines in-place edits to nodes created during the batch.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<i32, i32> = PersistentHashMap::new();
    /// let mut transient = map.transient();
    /// for index in 0..100 {
    ///     transient.insert(index, index * index);
    /// }
    /// let built = transient.persistent();
    /// assert_eq!(built.len(), 100);
    /// assert_eq!(built.get(&10), Some(&100));
    /// ```
    #[must_use]
    pub fn transient(self) -> TransientHashMap<K, V> {
        TransientHashMap {
            root: self.root,
            length: self.length,
            owner: OwnerId::fresh(),
            altered: false,
        }
    }

    /// Applies a batch of mutations through a temporary transient and
    /// seals the result.
    ///
    /// Mutability is released on every exit path: the transient cannot
    /// outlive this call, even if the closure panics.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<i32, i32> = PersistentHashMap::new();
    /// let built = map.with_mutations(|batch| {
    ///     for index in 0..1000 {
    ///         batch.insert(index, index * index);
    ///     }
    /// });
    /// assert_eq!(built.len(), 1000);
    /// assert_eq!(built.get(&500), Some(&250_000));
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, mutator: F) -> Self
    where
        F: FnOnce(&mut TransientHashMap<K, V>),
    {
        let mut transient = self.clone().transient();
        mutator(&mut transient);
        transient.persistent()
    }

    /// Builds a new map by transforming every value.
    ///
    /// Visits each entry exactly once, building the result through one
    /// internal transient.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let doubled = map.map_values(|_, value| value * 2);
    ///
    /// assert_eq!(doubled.get("a"), Some(&2));
    /// assert_eq!(doubled.get("b"), Some(&4));
    /// ```
    #[must_use]
    pub fn map_values<W, F>(&self, mut function: F) -> PersistentHashMap<K, W>
    where
        W: Clone + PartialEq,
        F: FnMut(&K, &V) -> W,
    {
        let mut transient = TransientHashMap::new();
        for (key, value) in self.iter() {
            transient.insert(key.clone(), function(key, value));
        }
        transient.persistent()
    }

    /// Builds a new map keeping only the entries the predicate accepts.
    ///
    /// Visits each entry exactly once. Keeping everything returns the
    /// receiver unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shardmap::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<i32, i32> = (0..10).map(|i| (i, i)).collect();
    /// let even = map.filter(|_, value| value % 2 == 0);
    ///
    /// assert_eq!(even.len(), 5);
    /// assert!(even.contains_key(&4));
    /// assert!(!even.contains_key(&5));
    /// ```
    #[must_use]
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut transient = TransientHashMap::new();
        for (key, value) in self.iter() {
            if predicate(key, value) {
                transient.insert(key.clone(), value.clone());
            }
        }
        let filtered = transient.persistent();
        if filtered.len() == self.len() {
            self.clone()
        } else {
            filtered
        }
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentHashMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for PersistentHashMap<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
{
    /// Builds the map through a transient; duplicate keys resolve
    /// last-wins.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iterable: I) -> Self {
        let mut transient = TransientHashMap::new();
        for (key, value) in iterable {
            transient.insert(key, value);
        }
        transient.persistent()
    }
}

impl<K, V> From<HashMap<K, V>> for PersistentHashMap<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
{
    fn from(map: HashMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentHashMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentHashMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentHashMapIntoIterator::new(entries)
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }
        self.iter()
            .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentHashMap<K, V> {}

/// Order-independent content hash: equal maps hash equal regardless of how
/// they were constructed.
impl<K: Hash + Eq, V: Hash> Hash for PersistentHashMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut combined: u64 = 0;
        for (key, value) in self.iter() {
            let mut entry_hasher = DefaultHasher::new();
            key.hash(&mut entry_hasher);
            value.hash(&mut entry_hasher);
            combined = combined.wrapping_add(entry_hasher.finish());
        }
        state.write_usize(self.length);
        state.write_u64(combined);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// TransientHashMap
// =============================================================================

/// A mutable view over a persistent map for batched construction.
///
/// A transient holds an owner token unique to its session. Nodes created
/// while the transient is live carry that token and are mutated in place;
/// nodes shared with immutable maps are cloned on first edit, so no
/// previously sealed map ever observes a change.
///
/// Sealing with [`persistent`](Self::persistent) consumes the handle:
/// writing to a sealed transient is a compile error, not a runtime one.
///
/// # Examples
///
/// ```rust
/// use shardmap::TransientHashMap;
///
/// let mut transient = TransientHashMap::new();
/// transient.insert("a".to_string(), 1).insert("b".to_string(), 2);
/// let map = transient.persistent();
///
/// assert_eq!(map.len(), 2);
/// ```
pub struct TransientHashMap<K, V> {
    root: Option<NodeRef<K, V>>,
    length: usize,
    owner: OwnerId,
    altered: bool,
}

impl<K, V> TransientHashMap<K, V> {
    /// Creates an empty transient with a fresh owner token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: None,
            length: 0,
            owner: OwnerId::fresh(),
            altered: false,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the transient contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether any mutation has been applied since this transient was
    /// created.
    ///
    /// No-op writes (inserting an already-equal value, removing an absent
    /// key) do not count.
    #[inline]
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.altered
    }

    /// Returns an iterator over key-value pairs.
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator::new(self.root.as_deref(), self.length)
    }
}

impl<K: Hash + Eq, V> TransientHashMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_of(key);
        self.root
            .as_deref()
            .and_then(|node| Node::lookup(node, hash, key))
    }

    /// Returns `true` if the transient contains a value for the key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K, V> TransientHashMap<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
{
    /// Inserts a key-value pair, editing owned nodes in place.
    ///
    /// Returns `&mut Self` for chaining.
    pub fn insert(&mut self, key: K, value: V) -> &mut Self {
        let hash = hash_of(&key);
        match &mut self.root {
            None => {
                self.root = Some(ReferenceCounter::new(Node::array_map_root(
                    self.owner, key, value,
                )));
                self.length += 1;
                self.altered = true;
            }
            Some(root) => {
                let mut added = false;
                let outcome = Node::insert(root, self.owner, 0, hash, &key, &value, &mut added);
                if outcome != Outcome::Unchanged {
                    self.length += usize::from(added);
                    self.altered = true;
                }
            }
        }
        self
    }

    /// Removes a key. Returns `true` if an entry was removed.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_of(key);
        let Some(root) = &mut self.root else {
            return false;
        };
        match Node::remove(root, self.owner, 0, hash, key) {
            Outcome::Unchanged => false,
            Outcome::Edited => {
                self.length -= 1;
                self.altered = true;
                true
            }
            Outcome::Removed => {
                self.root = None;
                self.length -= 1;
                self.altered = true;
                true
            }
        }
    }

    /// Removes every entry, keeping the owner token.
    pub fn clear(&mut self) -> &mut Self {
        if self.root.is_some() {
            self.altered = true;
        }
        self.root = None;
        self.length = 0;
        self
    }

    /// Seals this transient into a persistent map.
    ///
    /// Consumes the handle. The owner token is dropped without walking the
    /// trie; stale stamps can never match a live session because tokens
    /// are never reused.
    #[must_use]
    pub fn persistent(self) -> PersistentHashMap<K, V> {
        PersistentHashMap {
            root: self.root,
            length: self.length,
        }
    }
}

impl<K, V> Default for TransientHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Extend<(K, V)> for TransientHashMap<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iterable: I) {
        for (key, value) in iterable {
            self.insert(key, value);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TransientHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_new_creates_empty() {
        let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert!(map.root.is_none());
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = PersistentHashMap::new()
            .insert("one".to_string(), 1)
            .insert("two".to_string(), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("one"), Some(&1));
        assert_eq!(map.get("two"), Some(&2));
        assert_eq!(map.get("three"), None);
    }

    #[rstest]
    fn test_small_map_root_is_linear() {
        let map: PersistentHashMap<i32, i32> = (0..8).map(|key| (key, key)).collect();
        assert!(matches!(
            map.root.as_deref(),
            Some(Node::ArrayMap(node)) if node.entries.len() == 8
        ));
    }

    #[rstest]
    fn test_ninth_entry_expands_linear_root() {
        let map: PersistentHashMap<i32, i32> = (0..9).map(|key| (key, key)).collect();
        assert!(!matches!(map.root.as_deref(), Some(Node::ArrayMap(_))));
        assert_eq!(map.len(), 9);
        for key in 0..9 {
            assert_eq!(map.get(&key), Some(&key));
        }
    }

    #[rstest]
    fn test_noop_insert_returns_receiver() {
        let map = PersistentHashMap::new().insert("key".to_string(), 1);
        let same = map.insert("key".to_string(), 1);
        assert!(map.ptr_eq(&same));
    }

    #[rstest]
    fn test_absent_remove_returns_receiver() {
        let map = PersistentHashMap::new().insert("key".to_string(), 1);
        let same = map.remove("missing");
        assert!(map.ptr_eq(&same));
    }

    #[rstest]
    fn test_remove_last_entry_empties_root() {
        let map = PersistentHashMap::new().insert("key".to_string(), 1);
        let emptied = map.remove("key");
        assert!(emptied.is_empty());
        assert!(emptied.root.is_none());
    }

    #[rstest]
    fn test_update_identity_returns_receiver() {
        let map = PersistentHashMap::new().insert("key".to_string(), 1);
        let same = map.update("key".to_string(), |current| current.copied());
        assert!(map.ptr_eq(&same));
    }

    #[rstest]
    fn test_merge_without_effective_change_returns_receiver() {
        let map = PersistentHashMap::new()
            .insert("a".to_string(), 1)
            .insert("b".to_string(), 2);
        let subset = PersistentHashMap::new().insert("a".to_string(), 1);
        let merged = map.merge(&subset);
        assert!(map.ptr_eq(&merged));
    }

    #[rstest]
    fn test_clear_of_empty_returns_receiver() {
        let empty: PersistentHashMap<String, i32> = PersistentHashMap::new();
        assert!(empty.clear().ptr_eq(&empty));

        let populated = PersistentHashMap::new().insert("key".to_string(), 1);
        assert!(populated.clear().is_empty());
    }

    #[rstest]
    fn test_transient_batch_leaves_source_untouched() {
        let source: PersistentHashMap<i32, i32> = (0..50).map(|key| (key, key)).collect();
        let built = source.with_mutations(|batch| {
            for key in 50..100 {
                batch.insert(key, key);
            }
            for key in 0..10 {
                batch.remove(&key);
            }
        });

        assert_eq!(source.len(), 50);
        assert_eq!(built.len(), 90);
        assert_eq!(source.get(&5), Some(&5));
        assert_eq!(built.get(&5), None);
        assert_eq!(built.get(&75), Some(&75));
    }

    #[rstest]
    fn test_was_altered_tracks_effective_changes_only() {
        let map = PersistentHashMap::new().insert("key".to_string(), 1);
        let mut transient = map.transient();
        assert!(!transient.was_altered());

        transient.insert("key".to_string(), 1); // no-op
        transient.remove("missing"); // no-op
        assert!(!transient.was_altered());

        transient.insert("key".to_string(), 2);
        assert!(transient.was_altered());
    }

    #[rstest]
    fn test_transient_clear_keeps_working() {
        let mut transient: TransientHashMap<i32, i32> = TransientHashMap::new();
        transient.insert(1, 1).insert(2, 2);
        transient.clear();
        assert!(transient.is_empty());

        transient.insert(3, 3);
        let map = transient.persistent();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&3), Some(&3));
    }

    #[rstest]
    fn test_persistent_and_transient_builds_agree() {
        let keys: Vec<i32> = (0..200).collect();

        let mut persistent: PersistentHashMap<i32, i32> = PersistentHashMap::new();
        for key in &keys {
            persistent = persistent.insert(*key, key * 3);
        }
        for key in keys.iter().step_by(4) {
            persistent = persistent.remove(key);
        }

        let batched = PersistentHashMap::new().with_mutations(|batch| {
            for key in &keys {
                batch.insert(*key, key * 3);
            }
            for key in keys.iter().step_by(4) {
                batch.remove(key);
            }
        });

        assert_eq!(persistent, batched);
    }

    #[rstest]
    fn test_equal_maps_hash_equal() {
        let forward: PersistentHashMap<i32, i32> = (0..60).map(|key| (key, key)).collect();
        let backward: PersistentHashMap<i32, i32> = (0..60).rev().map(|key| (key, key)).collect();

        assert_eq!(forward, backward);

        let mut forward_hasher = DefaultHasher::new();
        let mut backward_hasher = DefaultHasher::new();
        forward.hash(&mut forward_hasher);
        backward.hash(&mut backward_hasher);
        assert_eq!(forward_hasher.finish(), backward_hasher.finish());
    }

    #[rstest]
    fn test_map_values_and_filter() {
        let map: PersistentHashMap<i32, i32> = (0..20).map(|key| (key, key)).collect();

        let doubled = map.map_values(|_, value| value * 2);
        assert_eq!(doubled.get(&7), Some(&14));
        assert_eq!(doubled.len(), 20);

        let kept_all = map.filter(|_, _| true);
        assert!(kept_all.ptr_eq(&map));

        let odd = map.filter(|_, value| value % 2 == 1);
        assert_eq!(odd.len(), 10);
        assert!(odd.contains_key(&13));
        assert!(!odd.contains_key(&12));
    }

    #[rstest]
    fn test_from_hash_map() {
        let mut source = HashMap::new();
        source.insert("x".to_string(), 1);
        source.insert("y".to_string(), 2);

        let map = PersistentHashMap::from(source);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x"), Some(&1));
    }

    #[rstest]
    fn test_debug_formatting() {
        let map = PersistentHashMap::new().insert("key".to_string(), 1);
        assert_eq!(format!("{map:?}"), "{\"key\": 1}");
    }
}
