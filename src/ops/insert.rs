//! Insertion operation — path-copy insert honoring the version token.

use std::mem;
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::edit::Edit;
use crate::error::{Error, Result};
use crate::node::{self, Entry, Node, Relation, Slot, SlotKind};

/// Inserts `entry` into the trie behind `root`, creating the root node if
/// the map is empty.
///
/// Returns the value previously stored under the key, if any.
///
/// # Errors
///
/// [`Error::InvariantViolation`] if the trie is malformed.
pub fn insert_into_root<K, V>(
    root: &mut Option<Arc<Node<K, V>>>,
    entry: Entry<K, V>,
    edit: Option<Edit>,
) -> Result<Option<V>>
where
    K: Eq + Clone,
    V: Clone,
{
    if let Some(node) = root {
        return insert_recursive(node, entry, 0, edit);
    }
    let frag = node::fragment(entry.hash, 0);
    *root = Some(Arc::new(Node::singleton(frag, Slot::Value(entry), edit)));
    Ok(None)
}

/// Inserts `entry` into the subtree rooted at `node`.
///
/// Nodes on the path are copied unless they carry the live token `edit`,
/// in which case they are updated in place.
///
/// # Errors
///
/// [`Error::InvariantViolation`] if the trie is malformed.
pub fn insert_recursive<K, V>(
    node: &mut Arc<Node<K, V>>,
    entry: Entry<K, V>,
    shift: u32,
    edit: Option<Edit>,
) -> Result<Option<V>>
where
    K: Eq + Clone,
    V: Clone,
{
    if shift >= node::HASH_BITS {
        return Err(Error::InvariantViolation("insert descended past the last hash slice"));
    }
    let frag = node::fragment(entry.hash, shift);

    match node.slot_kind(frag) {
        SlotKind::Empty => {
            Node::with_value(node, frag, entry, edit);
            Ok(None)
        }
        SlotKind::Reference => {
            let parent = Node::editable(node, edit);
            let child = parent
                .child_mut(frag)
                .ok_or(Error::InvariantViolation("reference slot without a child"))?;
            insert_recursive(child, entry, shift + node::BITS_PER_LEVEL, edit)
        }
        SlotKind::Value | SlotKind::Collision => {
            let relation = node
                .relation_at(frag, entry.hash, &entry.key)
                .ok_or(Error::InvariantViolation("occupied slot without payload"))?;
            match relation {
                Relation::Equal => overwrite(node, frag, entry, edit).map(Some),
                Relation::Collide => {
                    let parent = Node::editable(node, edit);
                    let existing = parent
                        .take_slot(frag)
                        .ok_or(Error::InvariantViolation("collision slot vanished"))?;
                    parent.put_slot(frag, merge_colliding(existing, entry, edit)?);
                    Ok(None)
                }
                Relation::Different => {
                    let parent = Node::editable(node, edit);
                    let existing = parent
                        .take_slot(frag)
                        .ok_or(Error::InvariantViolation("diverging slot vanished"))?;
                    let subtree =
                        common_path(existing, entry, shift + node::BITS_PER_LEVEL, edit)?;
                    parent.put_slot(frag, subtree);
                    Ok(None)
                }
            }
        }
    }
}

/// Overwrites the value of a key already stored at `frag`.
fn overwrite<K, V>(
    node: &mut Arc<Node<K, V>>,
    frag: u32,
    entry: Entry<K, V>,
    edit: Option<Edit>,
) -> Result<V>
where
    K: Eq + Clone,
    V: Clone,
{
    let parent = Node::editable(node, edit);
    if let Some(existing) = parent.value_mut(frag) {
        return Ok(mem::replace(&mut existing.value, entry.value));
    }
    let bucket = parent
        .bucket_mut(frag)
        .ok_or(Error::InvariantViolation("overwrite of an empty slot"))?;
    Bucket::replace(bucket, &entry.key, entry.value, edit)
}

/// Combines an occupant and a new entry with the same full hash.
///
/// A lone value escalates into a two-entry bucket; a bucket grows by one.
fn merge_colliding<K, V>(
    existing: Slot<K, V>,
    entry: Entry<K, V>,
    edit: Option<Edit>,
) -> Result<Slot<K, V>>
where
    K: Eq + Clone,
    V: Clone,
{
    match existing {
        Slot::Value(old) => {
            #[cfg(feature = "tracing")]
            tracing::trace!(hash = format_args!("{:#010x}", old.hash), "collision bucket created");
            let bucket = Bucket::from_entries(vec![old, entry], edit)?;
            Ok(Slot::Collision(Arc::new(bucket)))
        }
        Slot::Collision(mut bucket) => {
            Bucket::add(&mut bucket, entry, edit)?;
            Ok(Slot::Collision(bucket))
        }
        Slot::Reference(_) => Err(Error::InvariantViolation("collision against a child node")),
    }
}

/// Builds the subtree holding `existing` and `entry`, whose hashes agreed on
/// every slice above `shift`.
///
/// Emits one single-child node per further level where the slices still
/// agree, ending in a two-slot branch where they diverge. If the hash is
/// exhausted before any slice diverges the hashes are identical, and the
/// pair is stored as a collision bucket in the original slot instead.
pub(crate) fn common_path<K, V>(
    existing: Slot<K, V>,
    entry: Entry<K, V>,
    shift: u32,
    edit: Option<Edit>,
) -> Result<Slot<K, V>>
where
    K: Eq + Clone,
    V: Clone,
{
    let existing_hash = existing
        .hash()
        .ok_or(Error::InvariantViolation("common path from a child slot"))?;

    let mut shared = Vec::new();
    let mut shift = shift;
    let mut subtree = loop {
        if shift >= node::HASH_BITS {
            return merge_colliding(existing, entry, edit);
        }
        let f1 = node::fragment(existing_hash, shift);
        let f2 = node::fragment(entry.hash, shift);
        if f1 != f2 {
            break Node::pair((f1, existing), (f2, Slot::Value(entry)), edit);
        }
        shared.push(f1);
        shift += node::BITS_PER_LEVEL;
    };

    while let Some(frag) = shared.pop() {
        subtree = Node::singleton(frag, Slot::Reference(Arc::new(subtree)), edit);
    }
    Ok(Slot::Reference(Arc::new(subtree)))
}
