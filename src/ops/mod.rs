//! Trie operations shared by the persistent and transient facades.
//!
//! Every structural operation takes the caller's version token: `None` on the
//! persistent path, the live session token on the transient path.

pub mod get;
pub mod insert;
pub mod remove;
