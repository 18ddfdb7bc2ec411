//! Error type shared by the persistent and transient map facades.

use thiserror::Error;

/// Result alias for map operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by map operations.
///
/// Every error is local to the call that raised it: the handle the call was
/// made on is left exactly as it was before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Lookup or removal of a key that is not in the map.
    #[error("key not found")]
    KeyNotFound,

    /// Structural call on a transient map that was already frozen.
    #[error("transient map is frozen: to_persistent() was already called")]
    InvalidState,

    /// Internal trie invariant was broken. Indicates a bug in the engine.
    #[error("trie invariant violated: {0}")]
    InvariantViolation(&'static str),
}
