//! Trie node layer.
//!
//! Five node variants back the map, each keyed by 5-bit shards of a 32-bit
//! hash:
//!
//! - [`ArrayMapNode`]: linear `(key, value)` list; the root of small maps.
//! - [`BitmapIndexedNode`]: bitmap plus packed child array.
//! - [`HashArrayMapNode`]: fixed 32-slot array for dense levels.
//! - [`HashCollisionNode`]: linear bucket for keys sharing a full hash.
//! - [`ValueNode`]: single-entry leaf.
//!
//! Variant transitions: a root `ArrayMap` expands into the trie at 9
//! entries; a `BitmapIndexed` promotes to `HashArrayMap` at 17 children and
//! a `HashArrayMap` packs back below 12; a `BitmapIndexed` left with one
//! leaf child hoists it; a two-entry `HashCollision` shrinks to a leaf.
//!
//! Every node carries an owner stamp. `insert`/`remove` edit a node in
//! place only when the caller's token owns the stamp and nothing else
//! references the node; otherwise they clone, stamp the clone with the
//! caller's token, and leave the original untouched. An operation that
//! changes nothing leaves the slot's pointer identity intact.

use std::borrow::Borrow;
use std::hash::Hash;

use crate::ReferenceCounter;
use crate::equality::{BITS_PER_LEVEL, BRANCHING_FACTOR, MAX_SHIFT, hash_of, shard};
use crate::owner::OwnerId;

/// Shared handle to a trie node.
pub(crate) type NodeRef<K, V> = ReferenceCounter<Node<K, V>>;

/// Maximum entry count of a root `ArrayMap`; the 9th entry expands it.
pub(crate) const MAX_ARRAY_MAP_SIZE: usize = 8;

/// Maximum child count of a `BitmapIndexed`; the 17th child promotes it.
pub(crate) const MAX_BITMAP_INDEXED_SIZE: usize = 16;

/// Occupancy below which a `HashArrayMap` packs back into a `BitmapIndexed`.
pub(crate) const MIN_HASH_ARRAY_MAP_SIZE: usize = 12;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node of the trie.
#[derive(Clone)]
pub(crate) enum Node<K, V> {
    /// Linear entry list at the root of small maps.
    ArrayMap(ArrayMapNode<K, V>),
    /// Bitmap-indexed branch with a packed child array.
    BitmapIndexed(BitmapIndexedNode<K, V>),
    /// Dense branch holding all 32 slots directly.
    HashArrayMap(HashArrayMapNode<K, V>),
    /// Bucket of entries whose full 32-bit hashes are equal.
    HashCollision(HashCollisionNode<K, V>),
    /// Single-entry leaf.
    Value(ValueNode<K, V>),
}

/// Payload of [`Node::ArrayMap`].
#[derive(Clone)]
pub(crate) struct ArrayMapNode<K, V> {
    pub(crate) owner: OwnerId,
    pub(crate) entries: Vec<(K, V)>,
}

/// Payload of [`Node::BitmapIndexed`]. The bitmap's popcount equals the
/// child count; bit `i` maps to the child at the prefix-sum position.
#[derive(Clone)]
pub(crate) struct BitmapIndexedNode<K, V> {
    pub(crate) owner: OwnerId,
    pub(crate) bitmap: u32,
    pub(crate) children: Vec<NodeRef<K, V>>,
}

/// Payload of [`Node::HashArrayMap`]. `children` always holds 32 slots;
/// `count` tracks how many are populated.
#[derive(Clone)]
pub(crate) struct HashArrayMapNode<K, V> {
    pub(crate) owner: OwnerId,
    pub(crate) count: usize,
    pub(crate) children: Vec<Option<NodeRef<K, V>>>,
}

/// Payload of [`Node::HashCollision`]. Holds at least two entries with
/// pairwise-equal hashes and pairwise-distinct keys.
#[derive(Clone)]
pub(crate) struct HashCollisionNode<K, V> {
    pub(crate) owner: OwnerId,
    pub(crate) hash: u32,
    pub(crate) entries: Vec<(K, V)>,
}

/// Payload of [`Node::Value`].
#[derive(Clone)]
pub(crate) struct ValueNode<K, V> {
    pub(crate) owner: OwnerId,
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
}

/// Result of a structural operation on a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Nothing changed; the slot's pointer identity is intact.
    Unchanged,
    /// The slot now holds the updated node.
    Edited,
    /// The node vanished; the caller must drop the slot and compact.
    Removed,
}

// =============================================================================
// Shared accessors
// =============================================================================

impl<K, V> Node<K, V> {
    /// The owner stamp of this node.
    fn owner(&self) -> OwnerId {
        match self {
            Self::ArrayMap(node) => node.owner,
            Self::BitmapIndexed(node) => node.owner,
            Self::HashArrayMap(node) => node.owner,
            Self::HashCollision(node) => node.owner,
            Self::Value(node) => node.owner,
        }
    }

    /// Restamps this node with a new owner.
    fn stamp(&mut self, owner: OwnerId) {
        match self {
            Self::ArrayMap(node) => node.owner = owner,
            Self::BitmapIndexed(node) => node.owner = owner,
            Self::HashArrayMap(node) => node.owner = owner,
            Self::HashCollision(node) => node.owner = owner,
            Self::Value(node) => node.owner = owner,
        }
    }

    /// Whether this node terminates a trie path.
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Self::Value(_) | Self::HashCollision(_))
    }

    /// Finds the value for `key`, descending by shards of `hash`.
    pub(crate) fn lookup<'a, Q>(mut node: &'a Self, hash: u32, key: &Q) -> Option<&'a V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut shift = 0;
        loop {
            match node {
                Self::ArrayMap(array_map) => {
                    return array_map
                        .entries
                        .iter()
                        .find(|(entry_key, _)| entry_key.borrow() == key)
                        .map(|(_, value)| value);
                }
                Self::Value(leaf) => {
                    if leaf.hash == hash && leaf.key.borrow() == key {
                        return Some(&leaf.value);
                    }
                    return None;
                }
                Self::HashCollision(collision) => {
                    if collision.hash != hash {
                        return None;
                    }
                    return collision
                        .entries
                        .iter()
                        .find(|(entry_key, _)| entry_key.borrow() == key)
                        .map(|(_, value)| value);
                }
                Self::BitmapIndexed(bitmap_node) => {
                    let bit = 1u32 << shard(hash, shift);
                    if bitmap_node.bitmap & bit == 0 {
                        return None;
                    }
                    let position = (bitmap_node.bitmap & (bit - 1)).count_ones() as usize;
                    node = bitmap_node.children[position].as_ref();
                    shift += BITS_PER_LEVEL;
                }
                Self::HashArrayMap(hash_array) => match &hash_array.children[shard(hash, shift)] {
                    Some(child) => {
                        node = child.as_ref();
                        shift += BITS_PER_LEVEL;
                    }
                    None => return None,
                },
            }
        }
    }

    /// Total number of entries reachable from this node. Test support for
    /// checking the size invariant against the trie itself.
    #[cfg(test)]
    pub(crate) fn count_entries(&self) -> usize {
        match self {
            Self::ArrayMap(node) => node.entries.len(),
            Self::HashCollision(node) => node.entries.len(),
            Self::Value(_) => 1,
            Self::BitmapIndexed(node) => node
                .children
                .iter()
                .map(|child| child.count_entries())
                .sum(),
            Self::HashArrayMap(node) => node
                .children
                .iter()
                .flatten()
                .map(|child| child.count_entries())
                .sum(),
        }
    }
}

// =============================================================================
// Structural operations
// =============================================================================

impl<K, V> Node<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
{
    /// Root node for the first entry of a map.
    pub(crate) fn array_map_root(owner: OwnerId, key: K, value: V) -> Self {
        Self::ArrayMap(ArrayMapNode {
            owner,
            entries: vec![(key, value)],
        })
    }

    /// Clone-before-edit gate. A node owned by the active transient (and
    /// referenced nowhere else) is edited in place; any other node is
    /// replaced in the slot by a clone stamped with the caller's token.
    fn make_editable(slot: &mut NodeRef<K, V>, owner: OwnerId) -> &mut Self {
        let editable_in_place =
            owner.owns(slot.owner()) && ReferenceCounter::strong_count(slot) == 1;
        if !editable_in_place {
            let mut copied = (**slot).clone();
            copied.stamp(owner);
            *slot = ReferenceCounter::new(copied);
        }
        ReferenceCounter::make_mut(slot)
    }

    /// Fresh leaf for `entry`, hashed by its key.
    fn leaf_from(owner: OwnerId, entry: &(K, V)) -> NodeRef<K, V> {
        ReferenceCounter::new(Self::Value(ValueNode {
            owner,
            hash: hash_of(&entry.0),
            key: entry.0.clone(),
            value: entry.1.clone(),
        }))
    }

    /// Builds the branch separating two leaves with distinct hashes,
    /// nesting single-child levels while their shards still agree.
    fn merge_leaves(
        owner: OwnerId,
        shift: u32,
        left: NodeRef<K, V>,
        left_hash: u32,
        right: NodeRef<K, V>,
        right_hash: u32,
    ) -> Self {
        debug_assert!(
            shift <= MAX_SHIFT,
            "distinct hashes must diverge within the 32-bit shard space"
        );
        let left_index = shard(left_hash, shift);
        let right_index = shard(right_hash, shift);
        if left_index == right_index {
            let child = ReferenceCounter::new(Self::merge_leaves(
                owner,
                shift + BITS_PER_LEVEL,
                left,
                left_hash,
                right,
                right_hash,
            ));
            Self::BitmapIndexed(BitmapIndexedNode {
                owner,
                bitmap: 1u32 << left_index,
                children: vec![child],
            })
        } else {
            let bitmap = (1u32 << left_index) | (1u32 << right_index);
            let children = if left_index < right_index {
                vec![left, right]
            } else {
                vec![right, left]
            };
            Self::BitmapIndexed(BitmapIndexedNode {
                owner,
                bitmap,
                children,
            })
        }
    }

    /// Packs the populated slots of a 32-way node into a bitmap node.
    fn pack(owner: OwnerId, slots: &[Option<NodeRef<K, V>>]) -> Self {
        let mut bitmap = 0u32;
        let mut children = Vec::new();
        for (slot_index, child) in slots.iter().enumerate() {
            if let Some(child) = child {
                bitmap |= 1u32 << slot_index;
                children.push(ReferenceCounter::clone(child));
            }
        }
        Self::BitmapIndexed(BitmapIndexedNode {
            owner,
            bitmap,
            children,
        })
    }

    /// Inserts or replaces `key`'s entry under `slot`.
    ///
    /// `added` is set when a new entry appeared (as opposed to a value
    /// replacement). Returns [`Outcome::Unchanged`] without touching the
    /// slot when the key is already bound to an equal value.
    pub(crate) fn insert(
        slot: &mut NodeRef<K, V>,
        owner: OwnerId,
        shift: u32,
        hash: u32,
        key: &K,
        value: &V,
        added: &mut bool,
    ) -> Outcome {
        match &**slot {
            Self::Value(leaf) => {
                if leaf.hash == hash && leaf.key == *key {
                    if leaf.value == *value {
                        return Outcome::Unchanged;
                    }
                    if let Self::Value(editable) = Self::make_editable(slot, owner) {
                        editable.value = value.clone();
                    }
                    Outcome::Edited
                } else if leaf.hash == hash {
                    // Same full hash, different key: linear bucket.
                    let entries = vec![
                        (leaf.key.clone(), leaf.value.clone()),
                        (key.clone(), value.clone()),
                    ];
                    *slot = ReferenceCounter::new(Self::HashCollision(HashCollisionNode {
                        owner,
                        hash,
                        entries,
                    }));
                    *added = true;
                    Outcome::Edited
                } else {
                    let existing_hash = leaf.hash;
                    let existing = ReferenceCounter::clone(slot);
                    let incoming = ReferenceCounter::new(Self::Value(ValueNode {
                        owner,
                        hash,
                        key: key.clone(),
                        value: value.clone(),
                    }));
                    *slot = ReferenceCounter::new(Self::merge_leaves(
                        owner,
                        shift,
                        existing,
                        existing_hash,
                        incoming,
                        hash,
                    ));
                    *added = true;
                    Outcome::Edited
                }
            }
            Self::ArrayMap(array_map) => {
                let found = array_map
                    .entries
                    .iter()
                    .position(|(entry_key, _)| entry_key == key);
                if let Some(position) = found {
                    if array_map.entries[position].1 == *value {
                        return Outcome::Unchanged;
                    }
                    if let Self::ArrayMap(editable) = Self::make_editable(slot, owner) {
                        editable.entries[position].1 = value.clone();
                    }
                    Outcome::Edited
                } else if array_map.entries.len() < MAX_ARRAY_MAP_SIZE {
                    if let Self::ArrayMap(editable) = Self::make_editable(slot, owner) {
                        editable.entries.push((key.clone(), value.clone()));
                    }
                    *added = true;
                    Outcome::Edited
                } else {
                    // The 9th entry overflows the linear root: rebuild as a
                    // trie, re-inserting every entry by its hash.
                    let mut root = Self::leaf_from(owner, &array_map.entries[0]);
                    for entry in &array_map.entries[1..] {
                        let mut ignored = false;
                        let entry_hash = hash_of(&entry.0);
                        Self::insert(
                            &mut root,
                            owner,
                            shift,
                            entry_hash,
                            &entry.0,
                            &entry.1,
                            &mut ignored,
                        );
                    }
                    Self::insert(&mut root, owner, shift, hash, key, value, added);
                    *slot = root;
                    Outcome::Edited
                }
            }
            Self::HashCollision(collision) => {
                if collision.hash == hash {
                    let found = collision
                        .entries
                        .iter()
                        .position(|(entry_key, _)| entry_key == key);
                    if let Some(position) = found {
                        if collision.entries[position].1 == *value {
                            return Outcome::Unchanged;
                        }
                        if let Self::HashCollision(editable) = Self::make_editable(slot, owner) {
                            editable.entries[position].1 = value.clone();
                        }
                    } else {
                        if let Self::HashCollision(editable) = Self::make_editable(slot, owner) {
                            editable.entries.push((key.clone(), value.clone()));
                        }
                        *added = true;
                    }
                    Outcome::Edited
                } else {
                    // Different hash: the bucket moves below a new branch.
                    let existing_hash = collision.hash;
                    let existing = ReferenceCounter::clone(slot);
                    let incoming = ReferenceCounter::new(Self::Value(ValueNode {
                        owner,
                        hash,
                        key: key.clone(),
                        value: value.clone(),
                    }));
                    *slot = ReferenceCounter::new(Self::merge_leaves(
                        owner,
                        shift,
                        existing,
                        existing_hash,
                        incoming,
                        hash,
                    ));
                    *added = true;
                    Outcome::Edited
                }
            }
            Self::BitmapIndexed(bitmap_node) => {
                let index = shard(hash, shift);
                let bit = 1u32 << index;
                let position = (bitmap_node.bitmap & (bit - 1)).count_ones() as usize;
                if bitmap_node.bitmap & bit == 0 {
                    if bitmap_node.children.len() >= MAX_BITMAP_INDEXED_SIZE {
                        // The 17th child: spread into the 32-slot variant.
                        let mut slots: Vec<Option<NodeRef<K, V>>> = vec![None; BRANCHING_FACTOR];
                        let mut cursor = 0;
                        for slot_index in 0..BRANCHING_FACTOR {
                            if bitmap_node.bitmap & (1u32 << slot_index) != 0 {
                                slots[slot_index] =
                                    Some(ReferenceCounter::clone(&bitmap_node.children[cursor]));
                                cursor += 1;
                            }
                        }
                        slots[index] = Some(ReferenceCounter::new(Self::Value(ValueNode {
                            owner,
                            hash,
                            key: key.clone(),
                            value: value.clone(),
                        })));
                        let count = bitmap_node.children.len() + 1;
                        *slot = ReferenceCounter::new(Self::HashArrayMap(HashArrayMapNode {
                            owner,
                            count,
                            children: slots,
                        }));
                    } else {
                        let leaf = ReferenceCounter::new(Self::Value(ValueNode {
                            owner,
                            hash,
                            key: key.clone(),
                            value: value.clone(),
                        }));
                        if let Self::BitmapIndexed(editable) = Self::make_editable(slot, owner) {
                            editable.bitmap |= bit;
                            editable.children.insert(position, leaf);
                        }
                    }
                    *added = true;
                    Outcome::Edited
                } else if owner.owns(bitmap_node.owner) {
                    // Owned by the active transient: descend in place.
                    let mut outcome = Outcome::Unchanged;
                    if let Self::BitmapIndexed(editable) = Self::make_editable(slot, owner) {
                        outcome = Self::insert(
                            &mut editable.children[position],
                            owner,
                            shift + BITS_PER_LEVEL,
                            hash,
                            key,
                            value,
                            added,
                        );
                    }
                    if outcome == Outcome::Unchanged {
                        Outcome::Unchanged
                    } else {
                        Outcome::Edited
                    }
                } else {
                    // Shared: update a detached copy of the child and splice
                    // it in only if something actually changed.
                    let mut child = ReferenceCounter::clone(&bitmap_node.children[position]);
                    let child_outcome = Self::insert(
                        &mut child,
                        owner,
                        shift + BITS_PER_LEVEL,
                        hash,
                        key,
                        value,
                        added,
                    );
                    if child_outcome == Outcome::Unchanged {
                        return Outcome::Unchanged;
                    }
                    if let Self::BitmapIndexed(editable) = Self::make_editable(slot, owner) {
                        editable.children[position] = child;
                    }
                    Outcome::Edited
                }
            }
            Self::HashArrayMap(hash_array) => {
                let index = shard(hash, shift);
                match &hash_array.children[index] {
                    None => {
                        let leaf = ReferenceCounter::new(Self::Value(ValueNode {
                            owner,
                            hash,
                            key: key.clone(),
                            value: value.clone(),
                        }));
                        if let Self::HashArrayMap(editable) = Self::make_editable(slot, owner) {
                            editable.children[index] = Some(leaf);
                            editable.count += 1;
                        }
                        *added = true;
                        Outcome::Edited
                    }
                    Some(child) => {
                        if owner.owns(hash_array.owner) {
                            let mut outcome = Outcome::Unchanged;
                            if let Self::HashArrayMap(editable) = Self::make_editable(slot, owner) {
                                if let Some(child_slot) = editable.children[index].as_mut() {
                                    outcome = Self::insert(
                                        child_slot,
                                        owner,
                                        shift + BITS_PER_LEVEL,
                                        hash,
                                        key,
                                        value,
                                        added,
                                    );
                                }
                            }
                            if outcome == Outcome::Unchanged {
                                Outcome::Unchanged
                            } else {
                                Outcome::Edited
                            }
                        } else {
                            let mut detached = ReferenceCounter::clone(child);
                            let child_outcome = Self::insert(
                                &mut detached,
                                owner,
                                shift + BITS_PER_LEVEL,
                                hash,
                                key,
                                value,
                                added,
                            );
                            if child_outcome == Outcome::Unchanged {
                                return Outcome::Unchanged;
                            }
                            if let Self::HashArrayMap(editable) = Self::make_editable(slot, owner) {
                                editable.children[index] = Some(detached);
                            }
                            Outcome::Edited
                        }
                    }
                }
            }
        }
    }

    /// Removes `key`'s entry under `slot`, compacting as entries vanish.
    ///
    /// [`Outcome::Removed`] means the node itself disappeared and the
    /// caller must drop the slot; an interior removal that leaves the node
    /// standing reports [`Outcome::Edited`].
    pub(crate) fn remove<Q>(
        slot: &mut NodeRef<K, V>,
        owner: OwnerId,
        shift: u32,
        hash: u32,
        key: &Q,
    ) -> Outcome
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match &**slot {
            Self::Value(leaf) => {
                if leaf.hash == hash && leaf.key.borrow() == key {
                    Outcome::Removed
                } else {
                    Outcome::Unchanged
                }
            }
            Self::ArrayMap(array_map) => {
                let Some(position) = array_map
                    .entries
                    .iter()
                    .position(|(entry_key, _)| entry_key.borrow() == key)
                else {
                    return Outcome::Unchanged;
                };
                if array_map.entries.len() == 1 {
                    return Outcome::Removed;
                }
                if let Self::ArrayMap(editable) = Self::make_editable(slot, owner) {
                    editable.entries.remove(position);
                }
                Outcome::Edited
            }
            Self::HashCollision(collision) => {
                if collision.hash != hash {
                    return Outcome::Unchanged;
                }
                let Some(position) = collision
                    .entries
                    .iter()
                    .position(|(entry_key, _)| entry_key.borrow() == key)
                else {
                    return Outcome::Unchanged;
                };
                if collision.entries.len() == 2 {
                    // A single survivor no longer needs the bucket.
                    let (survivor_key, survivor_value) = collision.entries[1 - position].clone();
                    let survivor = Self::Value(ValueNode {
                        owner,
                        hash: collision.hash,
                        key: survivor_key,
                        value: survivor_value,
                    });
                    *slot = ReferenceCounter::new(survivor);
                    return Outcome::Edited;
                }
                if let Self::HashCollision(editable) = Self::make_editable(slot, owner) {
                    editable.entries.remove(position);
                }
                Outcome::Edited
            }
            Self::BitmapIndexed(bitmap_node) => {
                let index = shard(hash, shift);
                let bit = 1u32 << index;
                if bitmap_node.bitmap & bit == 0 {
                    return Outcome::Unchanged;
                }
                let position = (bitmap_node.bitmap & (bit - 1)).count_ones() as usize;
                if owner.owns(bitmap_node.owner) {
                    let mut replacement: Option<NodeRef<K, V>> = None;
                    let mut outcome = Outcome::Unchanged;
                    if let Self::BitmapIndexed(editable) = Self::make_editable(slot, owner) {
                        outcome = Self::remove(
                            &mut editable.children[position],
                            owner,
                            shift + BITS_PER_LEVEL,
                            hash,
                            key,
                        );
                        if outcome == Outcome::Removed {
                            editable.children.remove(position);
                            editable.bitmap &= !bit;
                            if editable.children.is_empty() {
                                return Outcome::Removed;
                            }
                            if editable.children.len() == 1 && editable.children[0].is_leaf() {
                                replacement = Some(ReferenceCounter::clone(&editable.children[0]));
                            }
                            outcome = Outcome::Edited;
                        }
                    }
                    if let Some(hoisted) = replacement {
                        *slot = hoisted;
                    }
                    outcome
                } else {
                    let mut detached = ReferenceCounter::clone(&bitmap_node.children[position]);
                    match Self::remove(&mut detached, owner, shift + BITS_PER_LEVEL, hash, key) {
                        Outcome::Unchanged => Outcome::Unchanged,
                        Outcome::Edited => {
                            if let Self::BitmapIndexed(editable) = Self::make_editable(slot, owner)
                            {
                                editable.children[position] = detached;
                            }
                            Outcome::Edited
                        }
                        Outcome::Removed => {
                            if bitmap_node.children.len() == 1 {
                                return Outcome::Removed;
                            }
                            if bitmap_node.children.len() == 2 {
                                // Hoist a lone remaining leaf.
                                let survivor =
                                    ReferenceCounter::clone(&bitmap_node.children[1 - position]);
                                if survivor.is_leaf() {
                                    *slot = survivor;
                                    return Outcome::Edited;
                                }
                            }
                            if let Self::BitmapIndexed(editable) = Self::make_editable(slot, owner)
                            {
                                editable.children.remove(position);
                                editable.bitmap &= !bit;
                            }
                            Outcome::Edited
                        }
                    }
                }
            }
            Self::HashArrayMap(hash_array) => {
                let index = shard(hash, shift);
                if hash_array.children[index].is_none() {
                    return Outcome::Unchanged;
                }
                if owner.owns(hash_array.owner) {
                    let mut replacement: Option<NodeRef<K, V>> = None;
                    let mut outcome = Outcome::Unchanged;
                    if let Self::HashArrayMap(editable) = Self::make_editable(slot, owner) {
                        if let Some(child_slot) = editable.children[index].as_mut() {
                            outcome = Self::remove(
                                child_slot,
                                owner,
                                shift + BITS_PER_LEVEL,
                                hash,
                                key,
                            );
                        }
                        if outcome == Outcome::Removed {
                            editable.children[index] = None;
                            editable.count -= 1;
                            if editable.count < MIN_HASH_ARRAY_MAP_SIZE {
                                replacement = Some(ReferenceCounter::new(Self::pack(
                                    owner,
                                    &editable.children,
                                )));
                            }
                            outcome = Outcome::Edited;
                        }
                    }
                    if let Some(packed) = replacement {
                        *slot = packed;
                    }
                    outcome
                } else {
                    let Some(child) = &hash_array.children[index] else {
                        return Outcome::Unchanged;
                    };
                    let mut detached = ReferenceCounter::clone(child);
                    match Self::remove(&mut detached, owner, shift + BITS_PER_LEVEL, hash, key) {
                        Outcome::Unchanged => Outcome::Unchanged,
                        Outcome::Edited => {
                            if let Self::HashArrayMap(editable) = Self::make_editable(slot, owner) {
                                editable.children[index] = Some(detached);
                            }
                            Outcome::Edited
                        }
                        Outcome::Removed => {
                            if hash_array.count <= MIN_HASH_ARRAY_MAP_SIZE {
                                // Dropping to the packing threshold:
                                // rebuild compactly.
                                let mut remaining = hash_array.children.clone();
                                remaining[index] = None;
                                *slot = ReferenceCounter::new(Self::pack(owner, &remaining));
                            } else if let Self::HashArrayMap(editable) =
                                Self::make_editable(slot, owner)
                            {
                                editable.children[index] = None;
                                editable.count -= 1;
                            }
                            Outcome::Edited
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
