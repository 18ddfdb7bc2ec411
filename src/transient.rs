//! Transient (batch-mutable) map facade.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::adhash;
use crate::edit::Edit;
use crate::error::{Error, Result};
use crate::iter::Iter;
use crate::map::PersistentMap;
use crate::node::{Entry, Node};
use crate::ops::get::get_recursive;
use crate::ops::insert::insert_into_root;
use crate::ops::remove::remove_from_root;

/// Single-owner mutable view over a map, for cheap bulk edits.
///
/// A transient holds a live version token. The first edit that reaches a
/// node copies it and stamps the copy with that token; later edits reaching
/// the same node update it in place. Maps the transient was created from,
/// and maps it later produces, never observe those in-place writes.
///
/// [`to_persistent`](Self::to_persistent) ends the session: the token is
/// dropped, every later structural call fails with [`Error::InvalidState`],
/// and reads keep working.
///
/// Mutation goes through `&mut self`; sharing one transient across threads
/// behind a lock is a misuse the session does not guard against.
pub struct TransientMap<K, V> {
    root: Option<Arc<Node<K, V>>>,
    size: usize,
    edit: Option<Edit>,
}

// ---------------------------------------------------------------------------
// Session lifecycle & accessors — no trait bounds
// ---------------------------------------------------------------------------

impl<K, V> TransientMap<K, V> {
    /// Opens a session over an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(None, 0)
    }

    pub(crate) fn from_parts(root: Option<Arc<Node<K, V>>>, size: usize) -> Self {
        let edit = Edit::mint();
        #[cfg(feature = "tracing")]
        tracing::debug!(edit = edit.id(), size, "transient session opened");
        Self {
            root,
            size,
            edit: Some(edit),
        }
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

    /// Returns `true` once [`to_persistent`](Self::to_persistent) was called.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.edit.is_none()
    }

    /// Returns an iterator over `(&K, &V)` pairs in unspecified order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.as_deref())
    }

    /// Ends the session and returns an immutable map of the current contents.
    ///
    /// The returned map shares the transient's root. Calling this again
    /// returns another handle to the same contents.
    pub fn to_persistent(&mut self) -> PersistentMap<K, V> {
        if let Some(_edit) = self.edit.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(edit = _edit.id(), size = self.size, "transient session frozen");
        }
        PersistentMap::from_parts(self.root.clone(), self.size)
    }

    pub(crate) const fn root(&self) -> Option<&Arc<Node<K, V>>> {
        self.root.as_ref()
    }

    fn live_edit(&self) -> Result<Edit> {
        self.edit.ok_or(Error::InvalidState)
    }
}

// ---------------------------------------------------------------------------
// Read operations — K: Hash + Eq
// ---------------------------------------------------------------------------

impl<K: Hash + Eq, V> TransientMap<K, V> {
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

// ---------------------------------------------------------------------------
// Write operations — K: Hash + Eq + Clone, V: Clone
// ---------------------------------------------------------------------------

impl<K: Hash + Eq + Clone, V: Clone> TransientMap<K, V> {
    /// Binds `key` to `value`, returning the value it replaced.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the session is frozen.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let edit = self.live_edit()?;
        let hash = adhash::key_hash(&key);
        let replaced = insert_into_root(&mut self.root, Entry { hash, key, value }, Some(edit))?;
        if replaced.is_none() {
            self.size += 1;
        }
        Ok(replaced)
    }

    /// Binds `key` to `value` and returns `self` for chaining.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the session is frozen.
    pub fn set(&mut self, key: K, value: V) -> Result<&mut Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Removes `key`, returning its value.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the session is frozen, and
    /// [`Error::KeyNotFound`] if `key` is absent. The map is unchanged in
    /// both cases.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        let edit = self.live_edit()?;
        let removed = remove_from_root(&mut self.root, adhash::key_hash(key), key, Some(edit))?;
        self.size -= 1;
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl<K, V> Default for TransientMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for TransientMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientMap")
            .field("len", &self.size)
            .field("edit", &self.edit.map(Edit::id))
            .finish_non_exhaustive()
    }
}

impl<'a, K, V> IntoIterator for &'a TransientMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
