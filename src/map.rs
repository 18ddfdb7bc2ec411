//! Immutable map facade.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops;
use std::sync::Arc;

use crate::adhash;
use crate::error::{Error, Result};
use crate::iter::{Iter, Keys, Values};
use crate::node::{Entry, Node};
use crate::ops::get::get_recursive;
use crate::ops::insert::insert_into_root;
use crate::ops::remove::remove_from_root;
use crate::transient::TransientMap;

/// Persistent hash map based on a HAMT trie.
///
/// Every update returns a new map and leaves `self` untouched. The two maps
/// share all trie nodes off the edited path, so an update costs
/// O(log₃₂ n) node copies rather than a full copy. Cloning is O(1).
///
/// Nodes reachable from a `PersistentMap` are never mutated again, so the
/// map can be read from any number of threads at once.
pub struct PersistentMap<K, V> {
    root: Option<Arc<Node<K, V>>>,
    size: usize,
}

// ---------------------------------------------------------------------------
// Construction & accessors — no trait bounds
// ---------------------------------------------------------------------------

impl<K, V> PersistentMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None, size: 0 }
    }

    pub(crate) const fn from_parts(root: Option<Arc<Node<K, V>>>, size: usize) -> Self {
        Self { root, size }
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// Sharing a root implies equality; the converse does not hold.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Opens a transient session over this map's contents.
    ///
    /// The transient starts out sharing every node with `self`; nodes are
    /// copied the first time the session touches them and edited in place
    /// afterwards. `self` is never affected.
    #[must_use]
    pub fn to_transient(&self) -> TransientMap<K, V> {
        TransientMap::from_parts(self.root.clone(), self.size)
    }

    /// Returns an iterator over `(&K, &V)` pairs in unspecified order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.as_deref())
    }

    /// Returns an iterator over the keys in unspecified order.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    /// Returns an iterator over the values in unspecified order.
    #[must_use]
    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    pub(crate) const fn root(&self) -> Option<&Arc<Node<K, V>>> {
        self.root.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Read operations — K: Hash + Eq
// ---------------------------------------------------------------------------

impl<K: Hash + Eq, V> PersistentMap<K, V> {
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let root = self.root.as_deref()?;
        get_recursive(root, adhash::key_hash(key), key, 0)
    }

    /// Returns a reference to the value associated with `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent.
    pub fn try_get(&self, key: &K) -> Result<&V> {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

impl<K, V: PartialEq> PersistentMap<K, V> {
    /// Returns `true` if any entry holds `value`. Linear in the map size.
    #[must_use]
    pub fn contains_value(&self, value: &V) -> bool {
        self.values().any(|v| v == value)
    }
}

// ---------------------------------------------------------------------------
// Write operations — K: Hash + Eq + Clone, V: Clone
// ---------------------------------------------------------------------------

impl<K: Hash + Eq + Clone, V: Clone> PersistentMap<K, V> {
    /// Returns a map with `key` bound to `value`.
    ///
    /// The length grows by one only if `key` was absent.
    ///
    /// # Panics
    ///
    /// Panics only if an internal trie invariant is broken.
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = adhash::key_hash(&key);
        let mut root = self.root.clone();
        match insert_into_root(&mut root, Entry { hash, key, value }, None) {
            Ok(replaced) => Self {
                root,
                size: self.size + usize::from(replaced.is_none()),
            },
            Err(err) => unreachable!("persistent insert failed: {err}"),
        }
    }

    /// Returns a map without `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent; `self` is unchanged
    /// either way.
    pub fn remove(&self, key: &K) -> Result<Self> {
        let mut root = self.root.clone();
        remove_from_root(&mut root, adhash::key_hash(key), key, None)?;
        Ok(Self {
            root,
            size: self.size - 1,
        })
    }
}

impl<K: Hash, V: Hash> PersistentMap<K, V> {
    /// Returns the order-independent `AdHash` of the contents.
    ///
    /// Maps with equal contents have equal `AdHash` regardless of how their
    /// tries are shaped.
    #[must_use]
    pub fn adhash(&self) -> u64 {
        adhash::adhash_of(self.iter())
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            size: self.size,
        }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentMap")
            .field("len", &self.size)
            .field("root", &self.root)
            .finish()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size {
            return false;
        }
        self.ptr_eq(other) || self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentMap<K, V> {}

impl<K: Hash, V: Hash> Hash for PersistentMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.adhash().hash(state);
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Extend<(K, V)> for PersistentMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let mut transient = self.to_transient();
        for (k, v) in iter {
            if let Err(err) = transient.insert(k, v) {
                unreachable!("live transient rejected insert: {err}");
            }
        }
        *self = transient.to_persistent();
    }
}

impl<K: Hash + Eq + Clone, V: Clone> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V> ops::Index<&K> for PersistentMap<K, V> {
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
