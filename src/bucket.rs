//! Collision buckets: linear storage for keys sharing one full 32-bit hash.

use std::fmt;
use std::sync::Arc;

use crate::edit::{self, Edit};
use crate::error::{Error, Result};
use crate::node::Entry;

/// Unordered list of at least two entries whose keys hash identically.
///
/// Invariant: `entries.len() >= 2` and every entry has `hash == self.hash`.
/// A bucket about to shrink to one entry is turned back into a plain value
/// slot by the engine instead of calling [`Bucket::remove`].
#[derive(Clone)]
pub struct Bucket<K, V> {
    hash: u32,
    entries: Vec<Entry<K, V>>,
    edit: Option<Edit>,
}

impl<K, V> Bucket<K, V> {
    /// Builds a bucket from `entries`, stamped with `edit`.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if fewer than two entries are given or
    /// their hashes differ.
    pub fn from_entries(entries: Vec<Entry<K, V>>, edit: Option<Edit>) -> Result<Self> {
        let [first, rest @ ..] = entries.as_slice() else {
            return Err(Error::InvariantViolation("collision bucket needs two entries"));
        };
        if rest.is_empty() {
            return Err(Error::InvariantViolation("collision bucket needs two entries"));
        }
        let hash = first.hash;
        if rest.iter().any(|e| e.hash != hash) {
            return Err(Error::InvariantViolation("collision bucket mixes hashes"));
        }
        Ok(Self { hash, entries, edit })
    }

    /// The hash shared by every entry.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }

    /// Number of entries (always at least two).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// The entries, in no particular order.
    #[must_use]
    pub fn entries(&self) -> &[Entry<K, V>] {
        &self.entries
    }

    /// Version stamp of this bucket.
    #[must_use]
    pub const fn edit(&self) -> Option<Edit> {
        self.edit
    }
}

impl<K: Eq, V> Bucket<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|e| e.key == *key)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.position(key).map(|i| &self.entries[i].value)
    }

    /// Returns `true` if `key` is in the bucket.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Returns the entry that survives removal of `excluding` from a
    /// two-entry bucket.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `excluding` is absent, and
    /// [`Error::InvariantViolation`] if the bucket does not hold exactly two
    /// entries.
    pub fn only_remaining(&self, excluding: &K) -> Result<&Entry<K, V>> {
        if self.entries.len() != 2 {
            return Err(Error::InvariantViolation("only_remaining on a bucket not of size two"));
        }
        match self.position(excluding) {
            Some(0) => Ok(&self.entries[1]),
            Some(_) => Ok(&self.entries[0]),
            None => Err(Error::KeyNotFound),
        }
    }
}

impl<K: Eq + Clone, V: Clone> Bucket<K, V> {
    /// Returns a mutable view of the bucket behind `this`, copying it first
    /// unless it is stamped with the live token `edit`.
    fn editable(this: &mut Arc<Self>, edit: Option<Edit>) -> &mut Self {
        if !edit::owns(this.edit, edit) {
            *this = Arc::new(Self {
                hash: this.hash,
                entries: this.entries.clone(),
                edit,
            });
        }
        Arc::make_mut(this)
    }

    /// Appends `entry`, which must carry the bucket's hash and a key not
    /// already present.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] on a hash mismatch or duplicate key.
    pub fn add(this: &mut Arc<Self>, entry: Entry<K, V>, edit: Option<Edit>) -> Result<()> {
        if entry.hash != this.hash {
            return Err(Error::InvariantViolation("bucket add with a foreign hash"));
        }
        if this.contains(&entry.key) {
            return Err(Error::InvariantViolation("bucket add with a present key"));
        }
        Self::editable(this, edit).entries.push(entry);
        Ok(())
    }

    /// Overwrites the value stored under `key`, returning the old value.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent.
    pub fn replace(this: &mut Arc<Self>, key: &K, value: V, edit: Option<Edit>) -> Result<V> {
        let pos = this.position(key).ok_or(Error::KeyNotFound)?;
        let bucket = Self::editable(this, edit);
        Ok(std::mem::replace(&mut bucket.entries[pos].value, value))
    }

    /// Removes `key` from a bucket holding three or more entries.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent, and
    /// [`Error::InvariantViolation`] if removal would leave fewer than two
    /// entries.
    pub fn remove(this: &mut Arc<Self>, key: &K, edit: Option<Edit>) -> Result<V> {
        if this.entries.len() <= 2 {
            return Err(Error::InvariantViolation("bucket remove below two entries"));
        }
        let pos = this.position(key).ok_or(Error::KeyNotFound)?;
        let bucket = Self::editable(this, edit);
        Ok(bucket.entries.swap_remove(pos).value)
    }
}

impl<K, V> fmt::Debug for Bucket<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("hash", &format_args!("{:#010x}", self.hash))
            .field("len", &self.entries.len())
            .field("edit", &self.edit.map(Edit::id))
            .finish()
    }
}
