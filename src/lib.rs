//! Persistent hash map based on a HAMT, with version-token transients.
//!
//! A HAMT (Hash Array Mapped Trie) branches 32 ways on successive 5-bit
//! slices of a key's hash. Updates copy only the path from the root to the
//! edited slot and share every other node with the previous version, so old
//! versions stay valid and cheap to keep.
//!
//! # Key properties
//!
//! - **Snapshots**: [`PersistentMap`] updates return new maps; old handles
//!   are unaffected and can be read concurrently from any thread
//! - **Transients**: [`TransientMap`] batches edits, mutating nodes it has
//!   already copied in place, guarded by a per-session version token
//! - **Collisions**: keys with identical 32-bit hashes share a collision
//!   bucket; everything else diverges onto a deeper path
//! - **Structural equality**: maps compare and hash by content, never by
//!   tree shape
//! - **Zero `unsafe`**: enforced by `#![forbid(unsafe_code)]`
//!
//! # Example
//!
//! ```
//! use hamt_versioned::PersistentMap;
//!
//! let d = PersistentMap::new().insert("a", 1).insert("b", 2).insert("c", 3);
//! let d2 = d.remove(&"b").unwrap();
//! assert_eq!(d.len(), 3);
//! assert_eq!(d2.get(&"a"), Some(&1));
//! assert!(!d2.contains_key(&"b"));
//!
//! let mut t = d2.to_transient();
//! t.insert("d", 4).unwrap();
//! let d3 = t.to_persistent();
//! assert_eq!(d3.len(), 3);
//! assert!(t.insert("e", 5).is_err());
//! ```
//!
//! # References
//!
//! - Bagwell, 2001 — "Ideal Hash Trees"
//! - Hickey — Clojure `PersistentHashMap` and transients

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod adhash;
pub mod bucket;
pub mod edit;
pub mod error;
pub mod iter;
pub mod node;

mod map;
mod ops;
mod transient;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use map::PersistentMap;
pub use transient::TransientMap;
