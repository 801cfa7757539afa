//! Owner tokens gating in-place edits during transient batches.
//!
//! Every trie node carries an [`OwnerId`] stamp. An operation tagged with a
//! non-empty token may structurally mutate exactly the nodes stamped with
//! the same token; every other node is cloned before editing. Tokens are
//! drawn from a global monotonic counter and never reused, so a node
//! stamped during an earlier (sealed) transient session can never match a
//! live one.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh owner tokens. Zero is reserved for [`OwnerId::NONE`].
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Identity of a transient session, or the immutable sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OwnerId(u64);

impl OwnerId {
    /// The "no owner" sentinel carried by immutable state.
    pub(crate) const NONE: Self = Self(0);

    /// Allocates a token no other session has ever held.
    pub(crate) fn fresh() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether an operation tagged with `self` may edit a node stamped
    /// with `stamp` in place. The immutable sentinel never owns anything.
    #[inline]
    pub(crate) fn owns(self, stamp: Self) -> bool {
        self != Self::NONE && self == stamp
    }
}
