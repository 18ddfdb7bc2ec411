//! Version tokens authorizing in-place node mutation.
//!
//! A transient session mints one [`Edit`] and stamps it on every node it
//! copies. A later edit in the same session that reaches a node carrying the
//! same stamp may mutate that node in place instead of copying it again.
//! Persistent nodes carry no stamp at all, so they always take the
//! copy-on-write path.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh token ids. Never reused within a process.
static NEXT_EDIT: AtomicU64 = AtomicU64::new(1);

/// Opaque, identity-comparable version token.
///
/// Two tokens compare equal only if they were produced by the same call to
/// [`Edit::mint`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Edit(NonZeroU64);

impl Edit {
    /// Mints a token distinct from every token minted before it.
    #[must_use]
    pub fn mint() -> Self {
        let raw = NEXT_EDIT.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 sessions to wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Returns the numeric id of this token (for diagnostics only).
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0.get()
    }
}

/// Returns `true` if a node stamped `stamp` may be mutated in place by a
/// caller presenting `edit`.
///
/// Only a live token that matches the stamp exactly grants ownership; the
/// persistent path (`edit == None`) never does.
#[inline]
#[must_use]
pub fn owns(stamp: Option<Edit>, edit: Option<Edit>) -> bool {
    edit.is_some() && stamp == edit
}
