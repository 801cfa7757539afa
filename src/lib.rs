//! # shardmap
//!
//! A persistent (immutable) hash map backed by a Hash Array Mapped Trie,
//! with transient batch construction behind the immutable façade.
//!
//! ## Overview
//!
//! [`PersistentHashMap`] is a key→value container where every mutating
//! operation returns a new logical map that shares the bulk of its internal
//! structure with its predecessor:
//!
//! - O(log32 N) `get`, `insert`, `remove` (effectively O(1) in practice)
//! - O(1) `len` and `is_empty`
//! - No-op writes return the receiver with its root pointer intact
//!
//! [`TransientHashMap`] permits efficient in-place construction: nodes
//! created during a transient session carry that session's owner token and
//! may be edited in place, while all other nodes are cloned before editing,
//! so structural sharing is never broken by a batch.
//!
//! ```rust
//! use shardmap::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//!
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: share trie nodes through `Arc` instead of `Rc`, allowing
//!   immutable maps to be read from any thread.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Shared pointer carrying the trie's structural sharing.
///
/// Map versions hold their nodes through this alias; a node is edited in
/// place only while its owner token matches and exactly one strong
/// reference exists, so no sealed map ever observes a change.
///
/// With the `arc` feature enabled this is `std::sync::Arc` and immutable
/// maps may be read from any thread. By default it is `std::rc::Rc`,
/// which skips the atomic reference-count traffic.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

pub mod equality;
pub mod iter;
pub mod map;
pub mod path;

mod node;
mod owner;

pub use equality::FloatKey;
pub use iter::{PersistentHashMapIntoIterator, PersistentHashMapIterator};
pub use map::{PersistentHashMap, TransientHashMap};
pub use path::{NestedValue, PathError};

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use shardmap::prelude::*;
/// ```
pub mod prelude {
    pub use crate::equality::FloatKey;
    pub use crate::map::{PersistentHashMap, TransientHashMap};
    pub use crate::path::{NestedValue, PathError};
}
