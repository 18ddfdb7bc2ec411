//! HAMT trie node types and bitmap helpers.
//!
//! A node branches 32 ways on one 5-bit slice of a key's hash. Each of the
//! 32 slots is empty or holds exactly one of: an inline entry, a collision
//! bucket, or a child node. Three disjoint bitmaps record which kind owns a
//! slot, and three dense arrays hold the occupants in slot order, so an
//! occupant's array position is the rank of its bit in its own bitmap.

use std::fmt;
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::edit::{self, Edit};
use crate::error::{Error, Result};

/// Bits per trie level (5 → 32-way branching).
pub const BITS_PER_LEVEL: u32 = 5;

/// Width of the trie hash. Shifts at or beyond this consume no further bits.
pub const HASH_BITS: u32 = 32;

/// Maximum number of levels a descent can visit (shifts 0, 5, …, 30).
pub const MAX_DEPTH: u32 = HASH_BITS.div_ceil(BITS_PER_LEVEL);

/// Inline entry storing a key-value pair with its precomputed hash.
#[derive(Clone, Debug)]
pub struct Entry<K, V> {
    /// Precomputed 32-bit hash of the key.
    pub hash: u32,
    /// The key.
    pub key: K,
    /// The value.
    pub value: V,
}

/// What occupies a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// Nothing.
    Empty,
    /// An inline entry.
    Value,
    /// A collision bucket.
    Collision,
    /// A child node one level deeper.
    Reference,
}

/// An owned slot occupant, moved in and out of nodes.
pub enum Slot<K, V> {
    /// Inline entry.
    Value(Entry<K, V>),
    /// Collision bucket.
    Collision(Arc<Bucket<K, V>>),
    /// Child node.
    Reference(Arc<Node<K, V>>),
}

impl<K, V> Slot<K, V> {
    /// Full hash of a value or bucket occupant; `None` for child nodes.
    #[must_use]
    pub fn hash(&self) -> Option<u32> {
        match self {
            Self::Value(e) => Some(e.hash),
            Self::Collision(b) => Some(b.hash()),
            Self::Reference(_) => None,
        }
    }
}

/// How a key relates to the value or bucket occupying its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// The key is already stored there.
    Equal,
    /// Same full hash, different key.
    Collide,
    /// Different full hash; the two must be split onto a deeper path.
    Different,
}

/// HAMT trie node.
///
/// Invariant: `data_map`, `collision_map` and `node_map` are pairwise
/// disjoint, and each backing array's length equals its bitmap's popcount.
#[derive(Clone)]
pub struct Node<K, V> {
    data_map: u32,
    collision_map: u32,
    node_map: u32,
    values: Vec<Entry<K, V>>,
    buckets: Vec<Arc<Bucket<K, V>>>,
    children: Vec<Arc<Self>>,
    edit: Option<Edit>,
}

// ---------------------------------------------------------------------------
// Bitmap helpers
// ---------------------------------------------------------------------------

/// Extracts the 5-bit hash fragment at the given bit-shift depth.
///
/// `shift` must be below [`HASH_BITS`].
#[inline]
#[must_use]
pub const fn fragment(hash: u32, shift: u32) -> u32 {
    debug_assert!(shift < HASH_BITS);
    (hash >> shift) & 0x1F
}

/// Returns the single-bit mask for the given fragment (0..31).
#[inline]
#[must_use]
pub const fn mask(frag: u32) -> u32 {
    1 << frag
}

/// Returns the compact index of `bit` within `bitmap`.
///
/// Counts the number of set bits below `bit`.
#[inline]
#[must_use]
pub const fn index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// ---------------------------------------------------------------------------
// Construction & read accessors — no trait bounds
// ---------------------------------------------------------------------------

impl<K, V> Node<K, V> {
    const fn empty(edit: Option<Edit>) -> Self {
        Self {
            data_map: 0,
            collision_map: 0,
            node_map: 0,
            values: Vec::new(),
            buckets: Vec::new(),
            children: Vec::new(),
            edit,
        }
    }

    /// Creates a node with a single occupant at `frag`.
    #[must_use]
    pub fn singleton(frag: u32, slot: Slot<K, V>, edit: Option<Edit>) -> Self {
        let mut node = Self::empty(edit);
        node.put_slot(frag, slot);
        node
    }

    /// Creates a two-slot branch node. `a.0` and `b.0` must differ.
    #[must_use]
    pub fn pair(a: (u32, Slot<K, V>), b: (u32, Slot<K, V>), edit: Option<Edit>) -> Self {
        debug_assert_ne!(a.0, b.0);
        let mut node = Self::empty(edit);
        node.put_slot(a.0, a.1);
        node.put_slot(b.0, b.1);
        node
    }

    /// Version stamp of this node.
    #[must_use]
    pub const fn edit(&self) -> Option<Edit> {
        self.edit
    }

    /// Classifies the slot at `frag`.
    #[must_use]
    pub const fn slot_kind(&self, frag: u32) -> SlotKind {
        let bit = mask(frag);
        if self.node_map & bit != 0 {
            SlotKind::Reference
        } else if self.data_map & bit != 0 {
            SlotKind::Value
        } else if self.collision_map & bit != 0 {
            SlotKind::Collision
        } else {
            SlotKind::Empty
        }
    }

    /// Inline entry at `frag`, if that slot holds one.
    #[must_use]
    pub fn value_at(&self, frag: u32) -> Option<&Entry<K, V>> {
        let bit = mask(frag);
        (self.data_map & bit != 0).then(|| &self.values[index(self.data_map, bit)])
    }

    /// Collision bucket at `frag`, if that slot holds one.
    #[must_use]
    pub fn bucket_at(&self, frag: u32) -> Option<&Arc<Bucket<K, V>>> {
        let bit = mask(frag);
        (self.collision_map & bit != 0).then(|| &self.buckets[index(self.collision_map, bit)])
    }

    /// Child node at `frag`, if that slot holds one.
    #[must_use]
    pub fn child_at(&self, frag: u32) -> Option<&Arc<Self>> {
        let bit = mask(frag);
        (self.node_map & bit != 0).then(|| &self.children[index(self.node_map, bit)])
    }

    /// Mutable inline entry at `frag`.
    pub fn value_mut(&mut self, frag: u32) -> Option<&mut Entry<K, V>> {
        let bit = mask(frag);
        (self.data_map & bit != 0).then(|| &mut self.values[index(self.data_map, bit)])
    }

    /// Mutable collision bucket handle at `frag`.
    pub fn bucket_mut(&mut self, frag: u32) -> Option<&mut Arc<Bucket<K, V>>> {
        let bit = mask(frag);
        (self.collision_map & bit != 0).then(|| &mut self.buckets[index(self.collision_map, bit)])
    }

    /// Mutable child handle at `frag`.
    pub fn child_mut(&mut self, frag: u32) -> Option<&mut Arc<Self>> {
        let bit = mask(frag);
        (self.node_map & bit != 0).then(|| &mut self.children[index(self.node_map, bit)])
    }

    /// Inline entries in slot order.
    #[must_use]
    pub fn values(&self) -> &[Entry<K, V>] {
        &self.values
    }

    /// Collision buckets in slot order.
    #[must_use]
    pub fn buckets(&self) -> &[Arc<Bucket<K, V>>] {
        &self.buckets
    }

    /// Child nodes in slot order.
    #[must_use]
    pub fn children(&self) -> &[Arc<Self>] {
        &self.children
    }

    /// Number of value and bucket slots.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.values.len() + self.buckets.len()
    }

    /// Number of child slots.
    #[must_use]
    pub const fn children_len(&self) -> usize {
        self.children.len()
    }

    /// `true` if every slot is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        (self.data_map | self.collision_map | self.node_map) == 0
    }

    /// `true` if the node holds one value or bucket and no children.
    #[must_use]
    pub const fn is_single_leaf(&self) -> bool {
        self.payload_len() == 1 && self.node_map == 0
    }

    /// `true` if any slot other than `frag` is occupied.
    #[must_use]
    pub const fn has_other_occupants(&self, frag: u32) -> bool {
        (self.data_map | self.collision_map | self.node_map) & !mask(frag) != 0
    }

    /// Removes and returns the occupant of `frag`.
    pub fn take_slot(&mut self, frag: u32) -> Option<Slot<K, V>> {
        let bit = mask(frag);
        match self.slot_kind(frag) {
            SlotKind::Empty => None,
            SlotKind::Value => {
                let at = index(self.data_map, bit);
                self.data_map &= !bit;
                Some(Slot::Value(self.values.remove(at)))
            }
            SlotKind::Collision => {
                let at = index(self.collision_map, bit);
                self.collision_map &= !bit;
                Some(Slot::Collision(self.buckets.remove(at)))
            }
            SlotKind::Reference => {
                let at = index(self.node_map, bit);
                self.node_map &= !bit;
                Some(Slot::Reference(self.children.remove(at)))
            }
        }
    }

    /// Stores `slot` at `frag`, returning whatever occupied it before.
    pub fn put_slot(&mut self, frag: u32, slot: Slot<K, V>) -> Option<Slot<K, V>> {
        let displaced = self.take_slot(frag);
        let bit = mask(frag);
        match slot {
            Slot::Value(entry) => {
                self.data_map |= bit;
                self.values.insert(index(self.data_map, bit), entry);
            }
            Slot::Collision(bucket) => {
                self.collision_map |= bit;
                self.buckets.insert(index(self.collision_map, bit), bucket);
            }
            Slot::Reference(child) => {
                self.node_map |= bit;
                self.children.insert(index(self.node_map, bit), child);
            }
        }
        displaced
    }

    /// Slot index of the sole occupant of a single-leaf node.
    fn sole_frag(&self) -> Option<u32> {
        self.is_single_leaf()
            .then(|| (self.data_map | self.collision_map).trailing_zeros())
    }

    /// Moves the sole value or bucket out of a single-leaf node.
    fn into_sole_payload(mut self) -> Result<Slot<K, V>> {
        let frag = self
            .sole_frag()
            .ok_or(Error::InvariantViolation("merge of a node that is not a single leaf"))?;
        self.take_slot(frag)
            .ok_or(Error::InvariantViolation("single leaf lost its occupant"))
    }
}

impl<K: Eq, V> Node<K, V> {
    /// Classifies how `key` (with full hash `hash`) relates to the value or
    /// bucket at `frag`. Returns `None` for empty and child slots.
    #[must_use]
    pub fn relation_at(&self, frag: u32, hash: u32, key: &K) -> Option<Relation> {
        if let Some(entry) = self.value_at(frag) {
            return Some(if entry.hash != hash {
                Relation::Different
            } else if entry.key == *key {
                Relation::Equal
            } else {
                Relation::Collide
            });
        }
        self.bucket_at(frag).map(|bucket| {
            if bucket.hash() != hash {
                Relation::Different
            } else if bucket.contains(key) {
                Relation::Equal
            } else {
                Relation::Collide
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Version-token mutation — K: Clone, V: Clone
// ---------------------------------------------------------------------------

impl<K: Clone, V: Clone> Node<K, V> {
    /// Returns a mutable view of the node behind `this`.
    ///
    /// A node stamped with the live token `edit` is mutated in place. Any
    /// other node (persistent, or stamped by another session) is first
    /// replaced in `this` by a copy stamped with `edit`, leaving the
    /// original untouched for every other handle that shares it.
    pub fn editable(this: &mut Arc<Self>, edit: Option<Edit>) -> &mut Self {
        if !edit::owns(this.edit, edit) {
            *this = Arc::new(Self {
                data_map: this.data_map,
                collision_map: this.collision_map,
                node_map: this.node_map,
                values: this.values.clone(),
                buckets: this.buckets.clone(),
                children: this.children.clone(),
                edit,
            });
        }
        // Unique here unless an owned node was aliased, in which case this
        // clones rather than mutating a shared node.
        Arc::make_mut(this)
    }

    /// Sets `frag` to an inline entry.
    pub fn with_value(
        this: &mut Arc<Self>,
        frag: u32,
        entry: Entry<K, V>,
        edit: Option<Edit>,
    ) -> Option<Slot<K, V>> {
        Self::editable(this, edit).put_slot(frag, Slot::Value(entry))
    }

    /// Sets `frag` to a collision bucket.
    pub fn with_bucket(
        this: &mut Arc<Self>,
        frag: u32,
        bucket: Arc<Bucket<K, V>>,
        edit: Option<Edit>,
    ) -> Option<Slot<K, V>> {
        Self::editable(this, edit).put_slot(frag, Slot::Collision(bucket))
    }

    /// Sets `frag` to a child node.
    pub fn with_child(
        this: &mut Arc<Self>,
        frag: u32,
        child: Arc<Self>,
        edit: Option<Edit>,
    ) -> Option<Slot<K, V>> {
        Self::editable(this, edit).put_slot(frag, Slot::Reference(child))
    }

    /// Clears `frag`, returning its former occupant.
    pub fn without_slot(this: &mut Arc<Self>, frag: u32, edit: Option<Edit>) -> Option<Slot<K, V>> {
        if this.slot_kind(frag) == SlotKind::Empty {
            return None;
        }
        Self::editable(this, edit).take_slot(frag)
    }

    /// Replaces the single-leaf child at `frag` with that child's sole value
    /// or bucket, removing one level of indirection.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if `frag` does not hold a single-leaf
    /// child.
    pub fn merge(this: &mut Arc<Self>, frag: u32, edit: Option<Edit>) -> Result<()> {
        if !this.child_at(frag).is_some_and(|child| child.is_single_leaf()) {
            return Err(Error::InvariantViolation("merge without a single-leaf child"));
        }
        Self::editable(this, edit).merge_child(frag)
    }

    /// In-place form of [`Node::merge`] for a node already made editable.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if `frag` does not hold a single-leaf
    /// child.
    pub fn merge_child(&mut self, frag: u32) -> Result<()> {
        let Some(Slot::Reference(child)) = self.take_slot(frag) else {
            return Err(Error::InvariantViolation("merge without a child reference"));
        };
        let payload = Arc::unwrap_or_clone(child).into_sole_payload()?;
        self.put_slot(frag, payload);
        Ok(())
    }

    /// Moves the sole occupant of a single-leaf root to the slot its hash
    /// selects at depth 0.
    ///
    /// A single leaf promoted from deeper in the trie still sits at the slot
    /// of its old level. Does nothing if the occupant is already in place.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if the node is not a single leaf.
    pub fn root_normalize(this: &mut Arc<Self>, edit: Option<Edit>) -> Result<()> {
        let current = this
            .sole_frag()
            .ok_or(Error::InvariantViolation("root_normalize on a node that is not a single leaf"))?;
        let hash = match this.slot_kind(current) {
            SlotKind::Value => this.value_at(current).map(|e| e.hash),
            SlotKind::Collision => this.bucket_at(current).map(|b| b.hash()),
            SlotKind::Empty | SlotKind::Reference => None,
        }
        .ok_or(Error::InvariantViolation("single leaf without payload"))?;

        let target = fragment(hash, 0);
        if target != current {
            let node = Self::editable(this, edit);
            if let Some(slot) = node.take_slot(current) {
                node.put_slot(target, slot);
            }
        }
        Ok(())
    }
}

impl<K, V> Default for Node<K, V> {
    fn default() -> Self {
        Self::empty(None)
    }
}

impl<K, V> fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("data_map", &format_args!("{:#034b}", self.data_map))
            .field("collision_map", &format_args!("{:#034b}", self.collision_map))
            .field("node_map", &format_args!("{:#034b}", self.node_map))
            .field("edit", &self.edit.map(Edit::id))
            .finish_non_exhaustive()
    }
}
