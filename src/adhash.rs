//! Key hashing and order-independent map hashing.
//!
//! Trie paths are driven by a 32-bit fold of the standard hasher's output.
//! The map-level hash is `φ(S) = Σ f(k, v)` over all entries with wrapping
//! arithmetic, so it does not depend on enumeration order or tree shape.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// First mixing seed (golden ratio constant).
const SEED_1: u64 = 0x9E37_79B9_7F4A_7C15;

/// Second mixing seed (large prime).
const SEED_2: u64 = 0x517C_C1B7_2722_0A95;

/// Computes the 64-bit hash of a value using the standard hasher.
#[must_use]
pub fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Computes the 32-bit trie hash of a key.
///
/// Keys with equal 64-bit hashes always fold to the same 32-bit hash.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn key_hash<K: Hash + ?Sized>(key: &K) -> u32 {
    let h = hash_one(key);
    ((h >> 32) ^ h) as u32
}

/// Computes the `AdHash` contribution of a single entry.
///
/// `f(k, v) = key_hash · SEED₁ ⊕ value_hash · SEED₂`
#[must_use]
pub const fn entry_adhash(key_hash: u64, value_hash: u64) -> u64 {
    key_hash.wrapping_mul(SEED_1) ^ value_hash.wrapping_mul(SEED_2)
}

/// Sums the contributions of every pair yielded by `entries`.
#[must_use]
pub fn adhash_of<'a, K, V, I>(entries: I) -> u64
where
    K: Hash + 'a,
    V: Hash + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    entries.into_iter().fold(0, |acc, (k, v)| {
        acc.wrapping_add(entry_adhash(hash_one(k), hash_one(v)))
    })
}
