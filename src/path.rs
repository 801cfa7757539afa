//! Deep operations over nested maps.
//!
//! Values opt into nesting through [`NestedValue`]: the trait lets the path
//! machinery view a value as a map (or not). With that hook in place,
//! [`PersistentHashMap::get_in`], [`set_in`](PersistentHashMap::set_in),
//! [`update_in`](PersistentHashMap::update_in),
//! [`delete_in`](PersistentHashMap::delete_in) and
//! [`merge_in`](PersistentHashMap::merge_in) recurse through arbitrary
//! nesting depth, fabricating empty maps for missing interior segments and
//! refusing to traverse through non-map values.

use std::fmt;
use std::hash::Hash;

use crate::map::PersistentHashMap;

// =============================================================================
// NestedValue
// =============================================================================

/// Hook letting the deep operations treat a value as a nested map.
///
/// Implement this for value enums that can hold either a leaf or a map of
/// further values. The hook is consulted at every path segment: a value
/// answering `None` from [`as_map`](Self::as_map) terminates descent.
///
/// # Examples
///
/// ```rust
/// use shardmap::{NestedValue, PersistentHashMap};
///
/// #[derive(Clone, PartialEq, Debug)]
/// enum Config {
///     Leaf(i64),
///     Section(PersistentHashMap<String, Config>),
/// }
///
/// impl NestedValue<String> for Config {
///     fn as_map(&self) -> Option<&PersistentHashMap<String, Config>> {
///         match self {
///             Config::Section(section) => Some(section),
///             Config::Leaf(_) => None,
///         }
///     }
///
///     fn from_map(map: PersistentHashMap<String, Config>) -> Self {
///         Config::Section(map)
///     }
/// }
///
/// let empty: PersistentHashMap<String, Config> = PersistentHashMap::new();
/// let configured = empty
///     .set_in(
///         &["server".to_string(), "port".to_string()],
///         Config::Leaf(8080),
///     )
///     .unwrap();
/// assert_eq!(
///     configured.get_in(&["server".to_string(), "port".to_string()]),
///     Some(&Config::Leaf(8080))
/// );
/// ```
pub trait NestedValue<K>: Clone {
    /// Views this value as a map, if it is one.
    fn as_map(&self) -> Option<&PersistentHashMap<K, Self>>;

    /// Wraps a map back into a value.
    fn from_map(map: PersistentHashMap<K, Self>) -> Self;
}

// =============================================================================
// PathError
// =============================================================================

/// Failure of a deep operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// The operation requires at least one path segment.
    EmptyPath,
    /// An existing value at `depth` is not a map and cannot be traversed.
    Unnavigable {
        /// Zero-based index of the path segment whose value refused
        /// descent.
        depth: usize,
    },
}

impl fmt::Display for PathError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => {
                write!(formatter, "path operations require at least one segment")
            }
            Self::Unnavigable { depth } => {
                write!(
                    formatter,
                    "cannot traverse into a non-map value at path depth {depth}"
                )
            }
        }
    }
}

impl std::error::Error for PathError {}

// =============================================================================
// Deep operations
// =============================================================================

impl<K, V> PersistentHashMap<K, V>
where
    K: Clone + Hash + Eq,
    V: NestedValue<K> + PartialEq,
{
    /// Returns the value at a path of nested keys.
    ///
    /// `None` when any segment is missing, any intermediate value is not a
    /// map, or the path is empty.
    ///
    /// # Complexity
    ///
    /// O(path length × log32 N)
    #[must_use]
    pub fn get_in(&self, path: &[K]) -> Option<&V> {
        let (first, rest) = path.split_first()?;
        let mut value = self.get(first)?;
        for key in rest {
            value = value.as_map()?.get(key)?;
        }
        Some(value)
    }

    /// Sets the value at a path of nested keys.
    ///
    /// Missing interior segments are fabricated as empty maps. Setting a
    /// value equal to the existing one returns the receiver unchanged.
    ///
    /// # Errors
    ///
    /// [`PathError::EmptyPath`] for an empty path;
    /// [`PathError::Unnavigable`] when an existing intermediate value is
    /// not a map. A failing call leaves the receiver untouched.
    pub fn set_in(&self, path: &[K], value: V) -> Result<Self, PathError> {
        self.set_in_at(path, 0, value)
    }

    fn set_in_at(&self, path: &[K], depth: usize, value: V) -> Result<Self, PathError> {
        let Some((first, rest)) = path.split_first() else {
            return Err(PathError::EmptyPath);
        };
        if rest.is_empty() {
            return Ok(self.insert(first.clone(), value));
        }
        let child = match self.get(first) {
            None => Self::new(),
            Some(existing) => existing
                .as_map()
                .ok_or(PathError::Unnavigable { depth })?
                .clone(),
        };
        let updated = child.set_in_at(rest, depth + 1, value)?;
        if updated.ptr_eq(&child) {
            return Ok(self.clone());
        }
        Ok(self.insert(first.clone(), V::from_map(updated)))
    }

    /// Updates the value at a path of nested keys.
    ///
    /// The updater receives the current value (or `None`); returning
    /// `Some` writes, returning `None` removes. Missing interior segments
    /// are fabricated only when the updater actually produces a value. The
    /// identity update returns the receiver unchanged, root pointer
    /// intact.
    ///
    /// # Errors
    ///
    /// [`PathError::EmptyPath`] for an empty path;
    /// [`PathError::Unnavigable`] when an existing intermediate value is
    /// not a map.
    pub fn update_in<F>(&self, path: &[K], updater: F) -> Result<Self, PathError>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        self.update_in_at(path, 0, updater)
    }

    fn update_in_at<F>(&self, path: &[K], depth: usize, updater: F) -> Result<Self, PathError>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let Some((first, rest)) = path.split_first() else {
            return Err(PathError::EmptyPath);
        };
        if rest.is_empty() {
            return Ok(self.update(first.clone(), updater));
        }
        match self.get(first) {
            Some(existing) => {
                let child = existing.as_map().ok_or(PathError::Unnavigable { depth })?;
                let updated = child.update_in_at(rest, depth + 1, updater)?;
                if updated.ptr_eq(child) {
                    return Ok(self.clone());
                }
                Ok(self.insert(first.clone(), V::from_map(updated)))
            }
            None => {
                let fabricated = Self::new().update_in_at(rest, depth + 1, updater)?;
                if fabricated.is_empty() {
                    return Ok(self.clone());
                }
                Ok(self.insert(first.clone(), V::from_map(fabricated)))
            }
        }
    }

    /// Removes the value at a path of nested keys.
    ///
    /// An absent path (or an empty one) returns the receiver unchanged.
    ///
    /// # Errors
    ///
    /// [`PathError::Unnavigable`] when an existing intermediate value is
    /// not a map.
    pub fn delete_in(&self, path: &[K]) -> Result<Self, PathError> {
        self.delete_in_at(path, 0)
    }

    fn delete_in_at(&self, path: &[K], depth: usize) -> Result<Self, PathError> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(self.clone());
        };
        if rest.is_empty() {
            return Ok(self.remove(first));
        }
        match self.get(first) {
            None => Ok(self.clone()),
            Some(existing) => {
                let child = existing.as_map().ok_or(PathError::Unnavigable { depth })?;
                let updated = child.delete_in_at(rest, depth + 1)?;
                if updated.ptr_eq(child) {
                    return Ok(self.clone());
                }
                Ok(self.insert(first.clone(), V::from_map(updated)))
            }
        }
    }

    /// Shallow-merges `other` into the map at a path of nested keys.
    ///
    /// Missing interior segments are fabricated; an empty path merges at
    /// the root. A non-map value already sitting at the destination is
    /// replaced wholesale by the merged entries.
    ///
    /// # Errors
    ///
    /// [`PathError::Unnavigable`] when an existing intermediate value is
    /// not a map.
    pub fn merge_in(&self, path: &[K], other: &Self) -> Result<Self, PathError> {
        self.merge_in_at(path, 0, other)
    }

    fn merge_in_at(&self, path: &[K], depth: usize, other: &Self) -> Result<Self, PathError> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(self.merge(other));
        };
        let child = match self.get(first) {
            None => Self::new(),
            Some(existing) => match existing.as_map() {
                Some(map) => map.clone(),
                // A leaf at the destination itself is replaced wholesale;
                // a leaf on the way there is a traversal failure.
                None if rest.is_empty() => Self::new(),
                None => return Err(PathError::Unnavigable { depth }),
            },
        };
        let updated = if rest.is_empty() {
            child.merge(other)
        } else {
            child.merge_in_at(rest, depth + 1, other)?
        };
        Ok(self.insert(first.clone(), V::from_map(updated)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Clone, PartialEq, Debug)]
    enum Value {
        Leaf(i64),
        Map(PersistentHashMap<String, Value>),
    }

    impl NestedValue<String> for Value {
        fn as_map(&self) -> Option<&PersistentHashMap<String, Value>> {
            match self {
                Self::Map(map) => Some(map),
                Self::Leaf(_) => None,
            }
        }

        fn from_map(map: PersistentHashMap<String, Value>) -> Self {
            Self::Map(map)
        }
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|segment| (*segment).to_string()).collect()
    }

    fn empty() -> PersistentHashMap<String, Value> {
        PersistentHashMap::new()
    }

    #[rstest]
    fn test_set_in_builds_missing_levels() {
        let map = empty()
            .set_in(&path(&["a", "b", "c"]), Value::Leaf(7))
            .unwrap();

        assert_eq!(map.get_in(&path(&["a", "b", "c"])), Some(&Value::Leaf(7)));

        // Equivalent to assembling the nesting by hand.
        let by_hand = empty().insert(
            "a".to_string(),
            Value::Map(empty().insert(
                "b".to_string(),
                Value::Map(empty().insert("c".to_string(), Value::Leaf(7))),
            )),
        );
        assert_eq!(map, by_hand);
    }

    #[rstest]
    fn test_get_in_misses_return_none() {
        let map = empty()
            .set_in(&path(&["a", "b"]), Value::Leaf(1))
            .unwrap();

        assert_eq!(map.get_in(&path(&["a", "x"])), None);
        assert_eq!(map.get_in(&path(&["x"])), None);
        assert_eq!(map.get_in(&path(&["a", "b", "c"])), None);
        assert_eq!(map.get_in(&[]), None);
    }

    #[rstest]
    fn test_set_in_through_leaf_fails_without_change() {
        let map = empty()
            .set_in(&path(&["a"]), Value::Leaf(1))
            .unwrap();

        let error = map
            .set_in(&path(&["a", "b"]), Value::Leaf(2))
            .unwrap_err();

        assert_eq!(error, PathError::Unnavigable { depth: 0 });
        assert_eq!(map.get_in(&path(&["a"])), Some(&Value::Leaf(1)));
    }

    #[rstest]
    fn test_set_in_empty_path_is_an_error() {
        assert_eq!(
            empty().set_in(&[], Value::Leaf(1)).unwrap_err(),
            PathError::EmptyPath
        );
    }

    #[rstest]
    fn test_update_in_identity_returns_receiver() {
        let map = empty()
            .set_in(&path(&["a", "b"]), Value::Leaf(1))
            .unwrap();

        let same = map
            .update_in(&path(&["a", "b"]), |current| current.cloned())
            .unwrap();

        assert!(map.ptr_eq(&same));
    }

    #[rstest]
    fn test_update_in_on_absent_path_without_value_is_identity() {
        let map = empty()
            .set_in(&path(&["a"]), Value::Leaf(1))
            .unwrap();

        let same = map.update_in(&path(&["x", "y"]), |_| None).unwrap();

        assert!(map.ptr_eq(&same));
    }

    #[rstest]
    fn test_update_in_fabricates_when_producing_a_value() {
        let map = empty()
            .update_in(&path(&["deep", "slot"]), |_| Some(Value::Leaf(9)))
            .unwrap();

        assert_eq!(map.get_in(&path(&["deep", "slot"])), Some(&Value::Leaf(9)));
    }

    #[rstest]
    fn test_delete_in_removes_nested_entry() {
        let map = empty()
            .set_in(&path(&["a", "b"]), Value::Leaf(1))
            .unwrap()
            .set_in(&path(&["a", "c"]), Value::Leaf(2))
            .unwrap();

        let pruned = map.delete_in(&path(&["a", "b"])).unwrap();

        assert_eq!(pruned.get_in(&path(&["a", "b"])), None);
        assert_eq!(pruned.get_in(&path(&["a", "c"])), Some(&Value::Leaf(2)));
    }

    #[rstest]
    fn test_delete_in_absent_path_returns_receiver() {
        let map = empty()
            .set_in(&path(&["a", "b"]), Value::Leaf(1))
            .unwrap();

        let same = map.delete_in(&path(&["x", "y"])).unwrap();
        assert!(map.ptr_eq(&same));
    }

    #[rstest]
    fn test_delete_in_through_leaf_fails() {
        let map = empty()
            .set_in(&path(&["a"]), Value::Leaf(1))
            .unwrap();

        assert_eq!(
            map.delete_in(&path(&["a", "b"])).unwrap_err(),
            PathError::Unnavigable { depth: 0 }
        );
    }

    #[rstest]
    fn test_merge_in_merges_at_depth() {
        let map = empty()
            .set_in(&path(&["settings", "a"]), Value::Leaf(1))
            .unwrap()
            .set_in(&path(&["settings", "b"]), Value::Leaf(2))
            .unwrap();
        let incoming = empty()
            .insert("b".to_string(), Value::Leaf(20))
            .insert("c".to_string(), Value::Leaf(30));

        let merged = map.merge_in(&path(&["settings"]), &incoming).unwrap();

        assert_eq!(merged.get_in(&path(&["settings", "a"])), Some(&Value::Leaf(1)));
        assert_eq!(merged.get_in(&path(&["settings", "b"])), Some(&Value::Leaf(20)));
        assert_eq!(merged.get_in(&path(&["settings", "c"])), Some(&Value::Leaf(30)));
    }

    #[rstest]
    fn test_merge_in_replaces_leaf_destination_wholesale() {
        let map = empty()
            .set_in(&path(&["slot"]), Value::Leaf(1))
            .unwrap();
        let incoming = empty().insert("inner".to_string(), Value::Leaf(2));

        let merged = map.merge_in(&path(&["slot"]), &incoming).unwrap();

        assert_eq!(merged.get_in(&path(&["slot", "inner"])), Some(&Value::Leaf(2)));
    }

    #[rstest]
    fn test_merge_in_empty_path_merges_at_root() {
        let map = empty().insert("a".to_string(), Value::Leaf(1));
        let incoming = empty().insert("b".to_string(), Value::Leaf(2));

        let merged = map.merge_in(&[], &incoming).unwrap();

        assert_eq!(merged.len(), 2);
    }

    #[rstest]
    fn test_path_error_display() {
        assert_eq!(
            format!("{}", PathError::EmptyPath),
            "path operations require at least one segment"
        );
        assert_eq!(
            format!("{}", PathError::Unnavigable { depth: 2 }),
            "cannot traverse into a non-map value at path depth 2"
        );
    }
}
