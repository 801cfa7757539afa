//! Key equality and hashing for the trie.
//!
//! The trie consumes 32-bit hashes in 5-bit shards, one shard per level.
//! Keys participate through the standard `Hash + Eq` contract: any two keys
//! that compare equal occupy at most one position in the trie, and hashing
//! is deterministic within a process.
//!
//! Floating-point keys need care because `f64` is not `Eq`: NaN never
//! compares equal to itself and `+0.0 == -0.0` hash to different bit
//! patterns. [`FloatKey`] wraps an `f64` with canonicalized equality so that
//! NaN keys collapse to a single entry and both zeros address the same slot.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Bits of hash consumed per trie level.
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Branching factor of the trie (2^5 = 32).
pub(crate) const BRANCHING_FACTOR: usize = 1 << BITS_PER_LEVEL;

/// Bit mask for extracting a shard index within a node.
pub(crate) const MASK: u32 = (BRANCHING_FACTOR - 1) as u32;

/// Shift of the deepest shard; hashes differ at or before this level.
pub(crate) const MAX_SHIFT: u32 = 30;

/// Computes the 32-bit trie hash of a key.
///
/// The 64-bit `DefaultHasher` digest is folded to 32 bits by mixing the
/// high half into the low half, so entropy from both halves survives the
/// truncation.
pub(crate) fn hash_of<Q: Hash + ?Sized>(key: &Q) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    fold_hash(hasher.finish())
}

/// Folds a 64-bit digest into the 32-bit hash space of the trie.
#[inline]
pub(crate) const fn fold_hash(digest: u64) -> u32 {
    (digest ^ (digest >> 32)) as u32
}

/// Extracts the 5-bit shard of `hash` addressed at `shift`.
#[inline]
pub(crate) const fn shard(hash: u32, shift: u32) -> usize {
    ((hash >> shift) & MASK) as usize
}

// =============================================================================
// FloatKey
// =============================================================================

/// Canonical NaN bit pattern used for hashing and comparison.
const CANONICAL_NAN_BITS: u64 = f64::NAN.to_bits();

/// An `f64` wrapper with value-equality suitable for map keys.
///
/// Unlike raw `f64`, `FloatKey` is `Eq` and `Hash`:
///
/// - every NaN compares equal to every other NaN, so a map holds at most
///   one NaN entry;
/// - `+0.0` and `-0.0` compare equal and hash identically.
///
/// # Examples
///
/// ```rust
/// use shardmap::{FloatKey, PersistentHashMap};
///
/// let map = PersistentHashMap::new()
///     .insert(FloatKey::new(f64::NAN), 1)
///     .insert(FloatKey::new(f64::NAN), 2);
///
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.get(&FloatKey::new(f64::NAN)), Some(&2));
/// assert_eq!(
///     map.insert(FloatKey::new(0.0), 3).get(&FloatKey::new(-0.0)),
///     Some(&3)
/// );
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FloatKey(f64);

impl FloatKey {
    /// Wraps a float for use as a map key.
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the wrapped float.
    #[inline]
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Bit pattern with NaN and negative zero canonicalized.
    fn canonical_bits(self) -> u64 {
        if self.0.is_nan() {
            CANONICAL_NAN_BITS
        } else if self.0 == 0.0 {
            // Collapses -0.0 onto +0.0.
            0
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for FloatKey {}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.canonical_bits());
    }
}

impl From<f64> for FloatKey {
    #[inline]
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for FloatKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
