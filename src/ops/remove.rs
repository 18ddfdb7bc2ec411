//! Removal operation — path-copy delete with subtree compaction.

use std::sync::Arc;

use crate::bucket::Bucket;
use crate::edit::Edit;
use crate::error::{Error, Result};
use crate::node::{self, Node, Relation, Slot, SlotKind};
use crate::ops::get::get_recursive;

/// Removes `key` from the trie behind `root`.
///
/// The key is looked up before anything is written, so a failed removal
/// leaves the trie untouched even when nodes are owned by `edit`. When the
/// last entry goes the root becomes `None`; when a single value or bucket
/// remains it is moved to its depth-0 slot.
///
/// # Errors
///
/// [`Error::KeyNotFound`] if `key` is absent, and
/// [`Error::InvariantViolation`] if the trie is malformed.
pub fn remove_from_root<K, V>(
    root: &mut Option<Arc<Node<K, V>>>,
    hash: u32,
    key: &K,
    edit: Option<Edit>,
) -> Result<V>
where
    K: Eq + Clone,
    V: Clone,
{
    let node = root.as_mut().ok_or(Error::KeyNotFound)?;
    if get_recursive(node, hash, key, 0).is_none() {
        return Err(Error::KeyNotFound);
    }

    let removed = remove_recursive(node, hash, key, 0, edit)?;
    if node.is_empty() {
        *root = None;
    } else if node.is_single_leaf() {
        #[cfg(feature = "tracing")]
        tracing::trace!("root reduced to a single leaf, normalizing");
        Node::root_normalize(node, edit)?;
    }
    Ok(removed)
}

/// Removes `key` from the subtree rooted at `node`.
///
/// # Errors
///
/// [`Error::KeyNotFound`] if `key` is absent, and
/// [`Error::InvariantViolation`] if the trie is malformed.
pub fn remove_recursive<K, V>(
    node: &mut Arc<Node<K, V>>,
    hash: u32,
    key: &K,
    shift: u32,
    edit: Option<Edit>,
) -> Result<V>
where
    K: Eq + Clone,
    V: Clone,
{
    if shift >= node::HASH_BITS {
        return Err(Error::KeyNotFound);
    }
    let frag = node::fragment(hash, shift);

    match node.slot_kind(frag) {
        SlotKind::Empty => Err(Error::KeyNotFound),
        SlotKind::Value | SlotKind::Collision => {
            if node.relation_at(frag, hash, key) != Some(Relation::Equal) {
                return Err(Error::KeyNotFound);
            }
            remove_payload(node, frag, key, edit)
        }
        SlotKind::Reference => remove_through_child(node, frag, hash, key, shift, edit),
    }
}

/// Removes `key` from the value or bucket at `frag`, which must hold it.
fn remove_payload<K, V>(
    node: &mut Arc<Node<K, V>>,
    frag: u32,
    key: &K,
    edit: Option<Edit>,
) -> Result<V>
where
    K: Eq + Clone,
    V: Clone,
{
    if let Some(bucket) = node.bucket_at(frag) {
        if bucket.len() == 2 {
            // 2 → 1: the survivor goes back to being a plain value.
            let survivor = bucket.only_remaining(key)?.clone();
            let removed = bucket.lookup(key).cloned().ok_or(Error::KeyNotFound)?;
            Node::with_value(node, frag, survivor, edit);
            return Ok(removed);
        }
        let parent = Node::editable(node, edit);
        let bucket = parent
            .bucket_mut(frag)
            .ok_or(Error::InvariantViolation("collision slot vanished"))?;
        return Bucket::remove(bucket, key, edit);
    }

    match Node::without_slot(node, frag, edit) {
        Some(Slot::Value(entry)) => Ok(entry.value),
        _ => Err(Error::InvariantViolation("value slot vanished")),
    }
}

/// Removes `key` below the child at `frag`, then compacts.
///
/// A child left as a single leaf is merged into this node when this node
/// keeps other occupants. Otherwise this node would be a pointless hop, so
/// the leaf replaces it and the parent repeats the check one level up.
fn remove_through_child<K, V>(
    node: &mut Arc<Node<K, V>>,
    frag: u32,
    hash: u32,
    key: &K,
    shift: u32,
    edit: Option<Edit>,
) -> Result<V>
where
    K: Eq + Clone,
    V: Clone,
{
    let parent = Node::editable(node, edit);
    let child = parent
        .child_mut(frag)
        .ok_or(Error::InvariantViolation("reference slot without a child"))?;
    let removed = remove_recursive(child, hash, key, shift + node::BITS_PER_LEVEL, edit)?;
    let (emptied, single_leaf) = (child.is_empty(), child.is_single_leaf());

    if emptied {
        parent.take_slot(frag);
    } else if single_leaf {
        if parent.has_other_occupants(frag) {
            #[cfg(feature = "tracing")]
            tracing::trace!(frag, shift, "merging single-leaf child into parent");
            parent.merge_child(frag)?;
        } else {
            let leaf = parent
                .child_at(frag)
                .map(Arc::clone)
                .ok_or(Error::InvariantViolation("reference slot without a child"))?;
            *node = leaf;
        }
    }
    Ok(removed)
}
