use super::*;

use crate::arena::NodeId;
use crate::node::Node;
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Every (key, value) pair in leaf-chain order, starting from the head.
pub(crate) fn chain_pairs<K: Clone, V: Clone>(t: &BPlusTree<K, V>) -> Vec<(K, V)> {
    let mut out = Vec::with_capacity(t.len());
    let mut leaf = Some(t.head());
    while let Some(current) = leaf {
        out.extend(
            current
                .entries()
                .iter()
                .map(|e| (e.key().clone(), e.value().clone())),
        );
        leaf = current.next_leaf();
    }
    out
}

struct Walk {
    leaves: Vec<NodeId>,
    leaf_depth: Option<usize>,
    entries: usize,
    nodes: usize,
    min_leaf: usize,
    min_children: usize,
    order: usize,
}

fn walk<'a, K: Ord + Debug, V>(
    t: &'a BPlusTree<K, V>,
    w: &mut Walk,
    id: NodeId,
    parent: Option<NodeId>,
    depth: usize,
    lower: Option<&'a K>,
    upper: Option<&'a K>,
) {
    w.nodes += 1;
    let node = &t.nodes[id];
    assert_eq!(node.parent(), parent, "parent link of {id:?}");
    let is_root = parent.is_none();

    let in_bounds = |k: &K| {
        lower.map_or(true, |lo| k >= lo) && upper.map_or(true, |hi| k < hi)
    };

    match node {
        Node::Leaf(leaf) => {
            let first_depth = *w.leaf_depth.get_or_insert(depth);
            assert_eq!(first_depth, depth, "leaf {id:?} at uneven depth");
            assert!(leaf.len() <= w.order, "leaf {id:?} overflows");
            if !is_root {
                assert!(
                    leaf.len() >= w.min_leaf,
                    "leaf {id:?} underflows: {} entries",
                    leaf.len()
                );
            }
            for pair in leaf.entries.windows(2) {
                assert!(pair[0].key() < pair[1].key(), "leaf {id:?} unsorted");
            }
            for e in &leaf.entries {
                assert!(in_bounds(e.key()), "key {:?} outside its range", e.key());
            }
            w.entries += leaf.len();
            w.leaves.push(id);
        }
        Node::Interior(interior) => {
            let n = interior.children.len();
            assert_eq!(interior.keys.len() + 1, n, "separator count of {id:?}");
            assert!(n <= w.order, "interior {id:?} overflows");
            if is_root {
                assert!(n >= 2, "interior root has {n} children");
            } else {
                assert!(n >= w.min_children, "interior {id:?} underflows: {n} children");
            }
            for pair in interior.keys.windows(2) {
                assert!(pair[0] < pair[1], "separators of {id:?} unsorted");
            }
            for k in &interior.keys {
                assert!(in_bounds(k), "separator {k:?} outside its range");
            }
            for (i, &child) in interior.children.iter().enumerate() {
                let lo = if i == 0 { lower } else { Some(&interior.keys[i - 1]) };
                let hi = interior.keys.get(i).or(upper);
                walk(t, w, child, Some(id), depth + 1, lo, hi);
            }
        }
    }
}

/// Asserts every structural invariant of the tree.
pub(crate) fn validate_tree<K: Ord + Debug, V>(t: &BPlusTree<K, V>) {
    let config = t.config();
    let mut w = Walk {
        leaves: Vec::new(),
        leaf_depth: None,
        entries: 0,
        nodes: 0,
        min_leaf: config.min_leaf_entries(),
        min_children: config.min_children(),
        order: config.order(),
    };
    walk(t, &mut w, t.root, None, 0, None, None);

    assert_eq!(w.entries, t.len(), "reachable entry count must match len");
    assert_eq!(w.nodes, t.nodes.live(), "unreachable nodes left in the arena");
    let depth = w.leaf_depth.unwrap_or(0);
    if t.is_empty() {
        assert_eq!(t.height(), 0);
        assert!(matches!(t.nodes[t.root], Node::Leaf(_)));
    } else {
        assert_eq!(t.height(), depth + 1, "height must count levels");
    }

    // Forward chain must visit exactly the leaves, left to right.
    assert_eq!(t.head, w.leaves[0], "head must be the leftmost leaf");
    let mut forward = Vec::new();
    let mut prev: Option<NodeId> = None;
    let mut leaf = Some(t.head());
    while let Some(current) = leaf {
        let node = t.nodes[current.id].as_leaf();
        assert_eq!(node.prev, prev, "prev link of {:?}", current.id);
        forward.push(current.id);
        prev = Some(current.id);
        leaf = current.next_leaf();
    }
    assert_eq!(forward, w.leaves, "leaf chain out of order");

    let mut backward = Vec::new();
    let mut leaf = Some(t.tail());
    while let Some(current) = leaf {
        backward.push(current.id);
        leaf = current.prev_leaf();
    }
    backward.reverse();
    assert_eq!(backward, w.leaves, "reverse leaf chain out of order");

    let mut last: Option<&K> = None;
    let mut leaf = Some(t.head());
    while let Some(current) = leaf {
        for e in current.entries() {
            if let Some(prev) = last {
                assert!(prev < e.key(), "chain keys not strictly ascending");
            }
            last = Some(e.key());
        }
        leaf = current.next_leaf();
    }
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Put(#[proptest(strategy = "0u16..512")] u16, u32),
    #[proptest(weight = 4)]
    Remove(#[proptest(strategy = "0u16..512")] u16),
    #[proptest(weight = 1)]
    Get(#[proptest(strategy = "0u16..512")] u16),
}

fn run_ops(order: usize, ops: Vec<Op>) -> std::result::Result<(), TestCaseError> {
    let mut t: BPlusTree<u16, u32> =
        BPlusTree::new(order).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let mut m: BTreeMap<u16, u32> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Put(key, value) => {
                prop_assert_eq!(t.put(key, value), m.insert(key, value));
            }
            Op::Remove(key) => {
                prop_assert_eq!(t.remove(&key), m.remove(&key));
                prop_assert_eq!(t.get(&key), None);
            }
            Op::Get(key) => {
                prop_assert_eq!(t.get(&key), m.get(&key));
            }
        }
        prop_assert_eq!(t.len(), m.len());
    }

    validate_tree(&t);
    let expected: Vec<(u16, u32)> = m.into_iter().collect();
    prop_assert_eq!(chain_pairs(&t), expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(order in 3usize..=8, ops in prop::collection::vec(any::<Op>(), 0..=1500)) {
        run_ops(order, ops)?;
    }

    #[test]
    fn prop_fill_then_drain(order in 3usize..=8, keys in prop::collection::btree_set(any::<u16>(), 0..=400)) {
        let mut t: BPlusTree<u16, u16> = BPlusTree::new(order).unwrap();
        for &k in &keys {
            prop_assert_eq!(t.put(k, k), None);
        }
        validate_tree(&t);
        for &k in keys.iter().rev() {
            prop_assert_eq!(t.remove(&k), Some(k));
            validate_tree(&t);
        }
        prop_assert!(t.is_empty());
        prop_assert_eq!(t.height(), 0);
    }
}

/// Calls `f` once for every ordering of `keys` (Heap's algorithm).
fn for_each_key_order(keys: &[u32], mut f: impl FnMut(&[u32])) {
    let mut order = keys.to_vec();
    let mut counters = vec![0usize; order.len()];
    f(&order);

    let mut i = 1;
    while i < order.len() {
        if counters[i] < i {
            let j = if i % 2 == 0 { 0 } else { counters[i] };
            order.swap(j, i);
            f(&order);
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
}

#[test]
fn key_orders_cover_every_permutation() {
    let mut seen = std::collections::BTreeSet::new();
    for_each_key_order(&[1, 2, 3, 4], |keys| {
        seen.insert(keys.to_vec());
    });
    assert_eq!(seen.len(), 24);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u32> = (1..=7).collect();

    for order in [3, 4] {
        for_each_key_order(&keys, |perm| {
            let mut t: BPlusTree<u32, u32> = BPlusTree::new(order).unwrap();
            let mut m: BTreeMap<u32, u32> = BTreeMap::new();

            for (i, &k) in perm.iter().enumerate() {
                let v = i as u32;
                assert_eq!(t.put(k, v), m.insert(k, v));
            }

            validate_tree(&t);
            let expected: Vec<(u32, u32)> = m.into_iter().collect();
            assert_eq!(chain_pairs(&t), expected);
        });
    }
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u32> = (1..=7).collect();

    for order in [3, 4] {
        // Insert in a fixed order, then remove in all permutations.
        let mut base: BPlusTree<u32, u32> = BPlusTree::new(order).unwrap();
        for &k in &keys {
            base.put(k, k * 10);
        }

        for_each_key_order(&keys, |perm| {
            let mut t = base.clone();
            let mut remaining = keys.len();

            for &k in perm {
                assert_eq!(t.remove(&k), Some(k * 10));
                assert_eq!(t.remove(&k), None);
                remaining -= 1;
                assert_eq!(t.len(), remaining);
                validate_tree(&t);
            }
            assert_eq!(t.height(), 0);
            assert!(t.head().is_empty());
        });
    }
}
