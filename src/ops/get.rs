//! Lookup operation — traverses the trie to find a key.

use crate::node::{self, Node, SlotKind};

/// Searches for `key` in the subtree rooted at `node`.
///
/// Returns a reference to the value if found.
pub fn get_recursive<'a, K, V>(node: &'a Node<K, V>, hash: u32, key: &K, shift: u32) -> Option<&'a V>
where
    K: Eq,
{
    let frag = node::fragment(hash, shift);
    match node.slot_kind(frag) {
        SlotKind::Empty => None,
        SlotKind::Value => node
            .value_at(frag)
            .filter(|entry| entry.hash == hash && entry.key == *key)
            .map(|entry| &entry.value),
        SlotKind::Collision => node
            .bucket_at(frag)
            .filter(|bucket| bucket.hash() == hash)
            .and_then(|bucket| bucket.lookup(key)),
        SlotKind::Reference => {
            let next = shift + node::BITS_PER_LEVEL;
            if next >= node::HASH_BITS {
                return None;
            }
            let child = node.child_at(frag)?;
            get_recursive(child, hash, key, next)
        }
    }
}
