//! Node, bucket and engine tests driven by hand-picked hashes.

use std::sync::Arc;

use super::{depth, validate};
use crate::bucket::Bucket;
use crate::edit::{self, Edit};
use crate::error::Error;
use crate::node::{self, Entry, Node, Relation, Slot, SlotKind};
use crate::ops::get::get_recursive;
use crate::ops::insert::{common_path, insert_into_root};
use crate::ops::remove::remove_from_root;

const fn entry(hash: u32, key: u32) -> Entry<u32, u32> {
    Entry {
        hash,
        key,
        value: key,
    }
}

fn count<K, V>(root: Option<&Arc<Node<K, V>>>) -> usize {
    root.map_or(0, |r| crate::iter::Iter::new(Some(&**r)).len())
}

// ---------------------------------------------------------------------------
// Bitmap helpers
// ---------------------------------------------------------------------------

#[test]
fn fragment_takes_five_bits_per_level() {
    let hash = 0b11111_00001_00010_00011;
    assert_eq!(node::fragment(hash, 0), 0b00011);
    assert_eq!(node::fragment(hash, 5), 0b00010);
    assert_eq!(node::fragment(hash, 10), 0b00001);
    assert_eq!(node::fragment(hash, 15), 0b11111);
    assert_eq!(node::fragment(u32::MAX, 30), 0b11);
}

#[test]
fn index_counts_lower_bits() {
    let bitmap = 0b1011_0100;
    assert_eq!(node::index(bitmap, node::mask(2)), 0);
    assert_eq!(node::index(bitmap, node::mask(4)), 1);
    assert_eq!(node::index(bitmap, node::mask(7)), 3);
    assert_eq!(node::index(u32::MAX, node::mask(31)), 31);
}

#[test]
fn max_depth_covers_the_hash() {
    assert_eq!(node::MAX_DEPTH, 7);
    assert!((node::MAX_DEPTH - 1) * node::BITS_PER_LEVEL < node::HASH_BITS);
}

// ---------------------------------------------------------------------------
// Node slots
// ---------------------------------------------------------------------------

#[test]
fn put_and_take_slots_keep_rank_order() {
    let mut n: Node<u32, u32> = Node::default();
    assert!(n.is_empty());
    for frag in [9, 3, 27, 14] {
        assert!(n.put_slot(frag, Slot::Value(entry(frag, frag))).is_none());
    }
    let keys: Vec<u32> = n.values().iter().map(|e| e.key).collect();
    assert_eq!(keys, [3, 9, 14, 27]);
    assert_eq!(n.slot_kind(14), SlotKind::Value);
    assert_eq!(n.slot_kind(15), SlotKind::Empty);

    let Some(Slot::Value(e)) = n.take_slot(9) else {
        panic!("slot 9 should hold a value");
    };
    assert_eq!(e.key, 9);
    assert_eq!(n.values().len(), 3);
    assert!(n.take_slot(9).is_none());
}

#[test]
fn put_slot_replaces_other_kinds() {
    let mut n: Node<u32, u32> = Node::singleton(4, Slot::Value(entry(4, 1)), None);
    let child = Arc::new(Node::singleton(0, Slot::Value(entry(4, 2)), None));
    let displaced = n.put_slot(4, Slot::Reference(child));
    assert!(matches!(displaced, Some(Slot::Value(_))));
    assert_eq!(n.slot_kind(4), SlotKind::Reference);
    assert!(n.values().is_empty());
    assert_eq!(n.children_len(), 1);
}

#[test]
fn single_leaf_and_other_occupants() {
    let mut n: Node<u32, u32> = Node::singleton(1, Slot::Value(entry(1, 1)), None);
    assert!(n.is_single_leaf());
    assert!(!n.has_other_occupants(1));
    assert!(n.has_other_occupants(2));

    n.put_slot(2, Slot::Value(entry(2, 2)));
    assert!(!n.is_single_leaf());
    assert!(n.has_other_occupants(1));
}

#[test]
fn relation_classifies_occupants() {
    let mut n: Node<u32, u32> = Node::singleton(5, Slot::Value(entry(5, 1)), None);
    assert_eq!(n.relation_at(5, 5, &1), Some(Relation::Equal));
    assert_eq!(n.relation_at(5, 5, &2), Some(Relation::Collide));
    assert_eq!(n.relation_at(5, 37, &1), Some(Relation::Different));
    assert_eq!(n.relation_at(6, 6, &1), None);

    let bucket = Bucket::from_entries(vec![entry(7, 10), entry(7, 11)], None).unwrap();
    n.put_slot(7, Slot::Collision(Arc::new(bucket)));
    assert_eq!(n.relation_at(7, 7, &11), Some(Relation::Equal));
    assert_eq!(n.relation_at(7, 7, &12), Some(Relation::Collide));
    assert_eq!(n.relation_at(7, 39, &10), Some(Relation::Different));
}

// ---------------------------------------------------------------------------
// Ownership protocol
// ---------------------------------------------------------------------------

#[test]
fn owns_requires_a_live_matching_token() {
    let a = Edit::mint();
    let b = Edit::mint();
    assert_ne!(a, b);
    assert!(edit::owns(Some(a), Some(a)));
    assert!(!edit::owns(Some(a), Some(b)));
    assert!(!edit::owns(None, Some(a)));
    assert!(!edit::owns(Some(a), None));
    assert!(!edit::owns(None, None));
}

#[test]
fn with_value_copies_unowned_nodes() {
    let original = Arc::new(Node::singleton(0, Slot::Value(entry(0, 0)), None));
    let mut handle = Arc::clone(&original);

    Node::with_value(&mut handle, 1, entry(1, 1), None);
    assert!(!Arc::ptr_eq(&original, &handle));
    assert_eq!(original.values().len(), 1);
    assert_eq!(handle.values().len(), 2);
    assert_eq!(handle.edit(), None);
}

#[test]
fn with_value_mutates_owned_nodes_in_place() {
    let token = Some(Edit::mint());
    let mut handle = Arc::new(Node::singleton(0, Slot::Value(entry(0, 0)), None));

    Node::with_value(&mut handle, 1, entry(1, 1), token);
    assert_eq!(handle.edit(), token);
    let owned = Arc::as_ptr(&handle);

    Node::with_value(&mut handle, 2, entry(2, 2), token);
    Node::without_slot(&mut handle, 0, token);
    assert_eq!(Arc::as_ptr(&handle), owned);
    assert_eq!(handle.values().len(), 2);
}

#[test]
fn foreign_token_forces_a_copy() {
    let first = Some(Edit::mint());
    let second = Some(Edit::mint());
    let stamped = Arc::new(Node::singleton(0, Slot::Value(entry(0, 0)), first));
    let mut handle = Arc::clone(&stamped);

    Node::with_value(&mut handle, 3, entry(3, 3), second);
    assert!(!Arc::ptr_eq(&stamped, &handle));
    assert_eq!(handle.edit(), second);
    assert_eq!(stamped.values().len(), 1);
}

#[test]
fn without_slot_on_empty_slot_does_not_copy() {
    let mut handle: Arc<Node<u32, u32>> = Arc::new(Node::singleton(0, Slot::Value(entry(0, 0)), None));
    let before = Arc::as_ptr(&handle);
    assert!(Node::without_slot(&mut handle, 9, None).is_none());
    assert_eq!(Arc::as_ptr(&handle), before);
}

#[test]
fn with_child_and_with_bucket_set_their_kinds() {
    let mut handle: Arc<Node<u32, u32>> = Arc::new(Node::default());
    let child = Arc::new(Node::pair((0, Slot::Value(entry(0, 0))), (1, Slot::Value(entry(32, 1))), None));
    Node::with_child(&mut handle, 0, child, None);
    let bucket = Arc::new(Bucket::from_entries(vec![entry(2, 2), entry(2, 3)], None).unwrap());
    Node::with_bucket(&mut handle, 2, bucket, None);

    assert_eq!(handle.slot_kind(0), SlotKind::Reference);
    assert_eq!(handle.slot_kind(2), SlotKind::Collision);
    assert_eq!(handle.payload_len(), 1);
    assert_eq!(handle.children_len(), 1);
}

// ---------------------------------------------------------------------------
// merge / root_normalize
// ---------------------------------------------------------------------------

#[test]
fn merge_absorbs_single_leaf_child() {
    let leaf = Arc::new(Node::singleton(3, Slot::Value(entry(0b00011_00001, 7)), None));
    let mut parent = Arc::new(Node::singleton(1, Slot::Reference(leaf), None));
    Node::with_value(&mut parent, 4, entry(4, 4), None);

    Node::merge(&mut parent, 1, None).unwrap();
    assert_eq!(parent.slot_kind(1), SlotKind::Value);
    assert_eq!(parent.value_at(1).map(|e| e.key), Some(7));
    assert_eq!(parent.children_len(), 0);
}

#[test]
fn merge_rejects_non_leaf_children() {
    let child = Arc::new(Node::pair((0, Slot::Value(entry(0, 0))), (1, Slot::Value(entry(32, 1))), None));
    let mut parent: Arc<Node<u32, u32>> = Arc::new(Node::singleton(0, Slot::Reference(child), None));
    assert!(matches!(Node::merge(&mut parent, 0, None), Err(Error::InvariantViolation(_))));
    assert!(matches!(Node::merge(&mut parent, 5, None), Err(Error::InvariantViolation(_))));
}

#[test]
fn root_normalize_moves_the_sole_occupant() {
    // Hash 0b00010_00111: depth-0 slot 7, but the entry sits at slot 2.
    let hash = 0b00010_00111;
    let mut root = Arc::new(Node::singleton(2, Slot::Value(entry(hash, 1)), None));
    Node::root_normalize(&mut root, None).unwrap();
    assert_eq!(root.slot_kind(2), SlotKind::Empty);
    assert_eq!(root.slot_kind(7), SlotKind::Value);

    // Already in place: untouched.
    let before = Arc::as_ptr(&root);
    Node::root_normalize(&mut root, None).unwrap();
    assert_eq!(Arc::as_ptr(&root), before);
}

#[test]
fn root_normalize_rejects_wider_nodes() {
    let mut root: Arc<Node<u32, u32>> =
        Arc::new(Node::pair((0, Slot::Value(entry(0, 0))), (1, Slot::Value(entry(1, 1))), None));
    assert!(Node::root_normalize(&mut root, None).is_err());
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

#[test]
fn bucket_needs_two_entries_of_one_hash() {
    assert!(Bucket::<u32, u32>::from_entries(vec![], None).is_err());
    assert!(Bucket::from_entries(vec![entry(1, 1)], None).is_err());
    assert!(Bucket::from_entries(vec![entry(1, 1), entry(2, 2)], None).is_err());
    let b = Bucket::from_entries(vec![entry(1, 1), entry(1, 2)], None).unwrap();
    assert_eq!(b.hash(), 1);
    assert_eq!(b.len(), 2);
}

#[test]
fn bucket_operations() {
    let mut b = Arc::new(Bucket::from_entries(vec![entry(9, 1), entry(9, 2)], None).unwrap());
    let shared = Arc::clone(&b);

    Bucket::add(&mut b, entry(9, 3), None).unwrap();
    assert_eq!(b.len(), 3);
    assert_eq!(shared.len(), 2);

    assert_eq!(Bucket::replace(&mut b, &3, 30, None), Ok(3));
    assert_eq!(b.lookup(&3), Some(&30));
    assert_eq!(Bucket::replace(&mut b, &4, 40, None), Err(Error::KeyNotFound));

    assert_eq!(Bucket::remove(&mut b, &1, None), Ok(1));
    assert!(!b.contains(&1));
    assert_eq!(b.len(), 2);
    assert!(matches!(Bucket::remove(&mut b, &2, None), Err(Error::InvariantViolation(_))));

    assert_eq!(b.only_remaining(&2).map(|e| e.key), Ok(3));
    assert_eq!(b.only_remaining(&3).map(|e| e.key), Ok(2));
    assert_eq!(b.only_remaining(&7).map(|e| e.key), Err(Error::KeyNotFound));
}

#[test]
fn bucket_add_rejects_bad_entries() {
    let mut b = Arc::new(Bucket::from_entries(vec![entry(9, 1), entry(9, 2)], None).unwrap());
    assert!(Bucket::add(&mut b, entry(8, 3), None).is_err());
    assert!(Bucket::add(&mut b, entry(9, 1), None).is_err());
    assert_eq!(b.len(), 2);
}

#[test]
fn owned_bucket_is_edited_in_place() {
    let token = Some(Edit::mint());
    let mut b = Arc::new(Bucket::from_entries(vec![entry(9, 1), entry(9, 2)], token).unwrap());
    let before = Arc::as_ptr(&b);
    Bucket::add(&mut b, entry(9, 3), token).unwrap();
    Bucket::replace(&mut b, &1, 10, token).unwrap();
    assert_eq!(Arc::as_ptr(&b), before);
    assert_eq!(b.edit(), token);
}

// ---------------------------------------------------------------------------
// Engine with crafted hashes
// ---------------------------------------------------------------------------

/// Hashes agreeing on every slice but the last build a chain down to the
/// deepest level.
#[test]
fn common_path_reaches_the_last_slice() {
    let mut root = None;
    insert_into_root(&mut root, entry(0x0000_0001, 1), None).unwrap();
    insert_into_root(&mut root, entry(0x4000_0001, 2), None).unwrap();

    validate(root.as_ref(), 2);
    assert_eq!(depth(root.as_ref()), node::MAX_DEPTH as usize);
    assert_eq!(get_recursive(root.as_deref().unwrap(), 0x4000_0001, &2, 0), Some(&2));

    // Removing either side collapses the chain back to a single root slot.
    let removed = remove_from_root(&mut root, 0x0000_0001, &1, None).unwrap();
    assert_eq!(removed, 1);
    validate(root.as_ref(), 1);
    assert_eq!(depth(root.as_ref()), 1);
    assert_eq!(root.as_ref().unwrap().slot_kind(1), SlotKind::Value);
}

#[test]
fn common_path_splits_at_first_differing_slice() {
    let mut root = None;
    insert_into_root(&mut root, entry(0b00000_00001, 1), None).unwrap();
    insert_into_root(&mut root, entry(0b00001_00001, 2), None).unwrap();

    let r = root.as_ref().unwrap();
    assert_eq!(r.slot_kind(1), SlotKind::Reference);
    let child = r.child_at(1).unwrap();
    assert_eq!(child.slot_kind(0), SlotKind::Value);
    assert_eq!(child.slot_kind(1), SlotKind::Value);
    validate(root.as_ref(), 2);
}

/// Identical hashes reaching the end of the hash become a bucket rather than
/// descending forever.
#[test]
fn common_path_falls_back_to_bucket() {
    let slot = common_path(Slot::Value(entry(0xDEAD, 1)), entry(0xDEAD, 2), node::HASH_BITS, None).unwrap();
    let Slot::Collision(bucket) = slot else {
        panic!("expected a collision bucket");
    };
    assert_eq!(bucket.len(), 2);

    let slot = common_path(Slot::Value(entry(0xDEAD, 1)), entry(0xDEAD, 2), 5, None).unwrap();
    assert!(matches!(slot, Slot::Collision(_)));
}

#[test]
fn chained_siblings_survive_partial_removal() {
    // All three share slice 0; `a` and `c` also share slice 1.
    let a = 0b00000_00000_00011;
    let b = 0b00000_00001_00011;
    let c = 0b00001_00000_00011;
    let mut root = None;
    for (i, h) in [a, b, c].into_iter().enumerate() {
        insert_into_root(&mut root, entry(h, u32::try_from(i).unwrap()), None).unwrap();
    }
    validate(root.as_ref(), 3);

    remove_from_root(&mut root, c, &2, None).unwrap();
    validate(root.as_ref(), 2);
    remove_from_root(&mut root, b, &1, None).unwrap();
    validate(root.as_ref(), 1);
    assert_eq!(count(root.as_ref()), 1);
    assert_eq!(depth(root.as_ref()), 1);
}

#[test]
fn remove_missing_key_writes_nothing() {
    let token = Some(Edit::mint());
    let mut root = None;
    for k in 0..40u32 {
        insert_into_root(&mut root, entry(k.wrapping_mul(0x9E37_79B9), k), token).unwrap();
    }
    let before = Arc::as_ptr(root.as_ref().unwrap());
    assert_eq!(remove_from_root(&mut root, 0x1234_5678, &999, token), Err(Error::KeyNotFound));
    assert_eq!(Arc::as_ptr(root.as_ref().unwrap()), before);
    validate(root.as_ref(), 40);
}

#[test]
fn remove_from_empty_root() {
    let mut root: Option<Arc<Node<u32, u32>>> = None;
    assert_eq!(remove_from_root(&mut root, 0, &0, None), Err(Error::KeyNotFound));
}
