//! Leaf and interior node shapes.
//!
//! Interior separators partition the key space: `children[i]` holds every key
//! `k` with `keys[i - 1] <= k < keys[i]`, treating out-of-range bounds as
//! infinite. Leaves are threaded into a doubly linked chain in key order.

use std::borrow::Borrow;
use std::cmp::Ordering;

use crate::arena::NodeId;
use crate::entry::Entry;

#[derive(Clone, Debug)]
pub(crate) struct LeafNode<K, V> {
    pub(crate) entries: Vec<Entry<K, V>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub(crate) struct InteriorNode<K> {
    /// Always one shorter than `children`.
    pub(crate) keys: Vec<K>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub(crate) enum Node<K, V> {
    Leaf(LeafNode<K, V>),
    Interior(InteriorNode<K>),
}

impl<K, V> LeafNode<K, V> {
    pub(crate) fn new(parent: Option<NodeId>) -> Self {
        Self {
            entries: Vec::new(),
            parent,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Exact-match search: `Ok(index)` of the matching entry, or `Err(index)`
    /// where the key would be inserted.
    pub(crate) fn search<Q>(&self, key: &Q) -> Result<usize, usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.binary_search_by(|e| Ord::cmp(e.key().borrow(), key))
    }

    #[inline]
    pub(crate) fn first_key(&self) -> Option<&K> {
        self.entries.first().map(Entry::key)
    }
}

impl<K: Ord> InteriorNode<K> {
    /// Index of the child whose key range contains `key`.
    ///
    /// This is an upper-bound search over the separators, so a key equal to a
    /// separator routes to the child on its right.
    pub(crate) fn child_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        debug_assert_eq!(self.keys.len() + 1, self.children.len());
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0;
        };
        if key.cmp(first.borrow()) == Ordering::Less {
            return 0;
        }
        if key.cmp(last.borrow()) != Ordering::Less {
            return self.children.len() - 1;
        }
        self.keys
            .partition_point(|k| key.cmp(k.borrow()) != Ordering::Less)
    }
}

impl<K> InteriorNode<K> {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }
}

impl<K, V> Node<K, V> {
    #[inline]
    pub(crate) fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Interior(interior) => interior.parent,
        }
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Interior(interior) => interior.parent = parent,
        }
    }

    pub(crate) fn as_leaf(&self) -> &LeafNode<K, V> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Interior(_) => panic!("expected a leaf node, found an interior node"),
        }
    }

    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K, V> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Interior(_) => panic!("expected a leaf node, found an interior node"),
        }
    }

    pub(crate) fn as_interior(&self) -> &InteriorNode<K> {
        match self {
            Node::Interior(interior) => interior,
            Node::Leaf(_) => panic!("expected an interior node, found a leaf"),
        }
    }

    pub(crate) fn as_interior_mut(&mut self) -> &mut InteriorNode<K> {
        match self {
            Node::Interior(interior) => interior,
            Node::Leaf(_) => panic!("expected an interior node, found a leaf"),
        }
    }

    pub(crate) fn into_interior(self) -> InteriorNode<K> {
        match self {
            Node::Interior(interior) => interior,
            Node::Leaf(_) => panic!("expected an interior node, found a leaf"),
        }
    }

    pub(crate) fn into_leaf(self) -> LeafNode<K, V> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Interior(_) => panic!("expected a leaf node, found an interior node"),
        }
    }
}
