mod engine;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::node::{self, Node, SlotKind};

/// A key type with a controllable hash value for testing hash collisions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollidingKey {
    pub id: u32,
    pub forced_hash: u64,
}

impl CollidingKey {
    pub const fn new(id: u32, hash: u64) -> Self {
        Self {
            id,
            forced_hash: hash,
        }
    }
}

impl Hash for CollidingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.forced_hash.hash(state);
    }
}

/// Walks the trie behind `root` and checks every structural invariant.
///
/// Panics on the first violation. `len` is the entry count the map claims.
pub fn validate<K, V>(root: Option<&Arc<Node<K, V>>>, len: usize) {
    let mut count = 0usize;
    if let Some(root) = root {
        assert!(!root.is_empty(), "non-empty map must not keep an empty root");
        let mut path = Vec::new();
        walk(root, 0, true, &mut path, &mut count);
    } else {
        assert_eq!(len, 0, "empty root with a non-zero length");
    }
    assert_eq!(count, len, "reachable entries must match len");
}

fn walk<K, V>(node: &Node<K, V>, shift: u32, is_root: bool, path: &mut Vec<u32>, count: &mut usize) {
    assert!(shift < node::HASH_BITS, "node below the last hash slice");
    assert!(path.len() < node::MAX_DEPTH as usize, "trie deeper than MAX_DEPTH");
    if !is_root {
        assert!(!node.is_empty(), "empty interior node");
        assert!(!node.is_single_leaf(), "single-leaf child left uncollapsed");
    }

    let on_path = |hash: u32, path: &[u32]| {
        path.iter()
            .zip((0u32..).map(|level| level * node::BITS_PER_LEVEL))
            .all(|(&frag, shift)| node::fragment(hash, shift) == frag)
    };

    let (mut values, mut buckets, mut children) = (0usize, 0usize, 0usize);
    for frag in 0..32 {
        match node.slot_kind(frag) {
            SlotKind::Empty => {}
            SlotKind::Value => {
                values += 1;
                let entry = node.value_at(frag).expect("value bit without entry");
                assert_eq!(node::fragment(entry.hash, shift), frag, "value in the wrong slot");
                assert!(on_path(entry.hash, path), "value off its hash path");
                *count += 1;
            }
            SlotKind::Collision => {
                buckets += 1;
                let bucket = node.bucket_at(frag).expect("collision bit without bucket");
                assert!(bucket.len() >= 2, "bucket below two entries");
                assert_eq!(node::fragment(bucket.hash(), shift), frag, "bucket in the wrong slot");
                assert!(on_path(bucket.hash(), path), "bucket off its hash path");
                assert!(bucket.entries().iter().all(|e| e.hash == bucket.hash()));
                *count += bucket.len();
            }
            SlotKind::Reference => {
                children += 1;
                let child = node.child_at(frag).expect("node bit without child");
                path.push(frag);
                walk(child, shift + node::BITS_PER_LEVEL, false, path, count);
                path.pop();
            }
        }
        // Each slot has at most one kind.
        let kinds = [
            node.value_at(frag).is_some(),
            node.bucket_at(frag).is_some(),
            node.child_at(frag).is_some(),
        ];
        assert!(kinds.iter().filter(|&&k| k).count() <= 1, "slot claimed twice");
    }
    assert_eq!(values, node.values().len());
    assert_eq!(buckets, node.buckets().len());
    assert_eq!(children, node.children().len());
}

/// Depth of the deepest node (the root alone is depth 1).
pub fn depth<K, V>(root: Option<&Arc<Node<K, V>>>) -> usize {
    fn go<K, V>(node: &Node<K, V>) -> usize {
        1 + node.children().iter().map(|c| go(&**c)).max().unwrap_or(0)
    }
    root.map_or(0, |r| go(&**r))
}
