use std::borrow::Borrow;
use std::fmt;

use tracing::{debug, trace};

use crate::arena::{Arena, NodeId};
use crate::config::Config;
use crate::entry::Entry;
use crate::error::Result;
use crate::node::{InteriorNode, LeafNode, Node};

/// Interior nodes visited on the way down, each paired with the index of the
/// child that was followed.
type Path = Vec<(NodeId, usize)>;

/// An order-M B+Tree.
///
/// Entries live only in leaves; interior nodes hold separator keys. Every
/// leaf is linked to its neighbours, so the whole key space can be walked from
/// [`head`](Self::head) without descending the tree again.
#[derive(Clone)]
pub struct BPlusTree<K, V> {
    pub(crate) nodes: Arena<Node<K, V>>,
    pub(crate) root: NodeId,
    /// Leftmost leaf.
    pub(crate) head: NodeId,
    config: Config,
    /// 0 while empty, otherwise the number of levels including the leaves.
    height: usize,
    len: usize,
}

impl<K, V> BPlusTree<K, V> {
    /// Creates an empty tree of the given order.
    ///
    /// Fails with [`Error::InvalidOrder`](crate::Error::InvalidOrder) when
    /// `order` is below [`MIN_ORDER`](crate::MIN_ORDER).
    pub fn new(order: usize) -> Result<Self> {
        Ok(Self::with_config(Config::new(order)?))
    }

    pub fn with_config(config: Config) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.alloc(Node::Leaf(LeafNode::new(None)));
        Self {
            nodes,
            root,
            head: root,
            config,
            height: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.config.order()
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every entry and returns to a single empty root leaf.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = self.nodes.alloc(Node::Leaf(LeafNode::new(None)));
        self.head = self.root;
        self.height = 0;
        self.len = 0;
    }

    /// First leaf of the chain. Always present, possibly empty.
    pub fn head(&self) -> LeafRef<'_, K, V> {
        LeafRef {
            tree: self,
            id: self.head,
        }
    }

    /// Last leaf of the chain.
    pub fn tail(&self) -> LeafRef<'_, K, V> {
        let mut id = self.root;
        while let Node::Interior(interior) = &self.nodes[id] {
            id = *interior
                .children
                .last()
                .expect("interior node has at least one child");
        }
        LeafRef { tree: self, id }
    }

    fn siblings(&self, parent: NodeId, idx: usize) -> (Option<NodeId>, Option<NodeId>) {
        let parent = self.nodes[parent].as_interior();
        let prev = idx.checked_sub(1).map(|i| parent.children[i]);
        let next = parent.children.get(idx + 1).copied();
        (prev, next)
    }
}

impl<K: Ord, V> BPlusTree<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let leaf = self.nodes[self.find_leaf(key)].as_leaf();
        let idx = leaf.search(key).ok()?;
        Some(leaf.entries[idx].value())
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let leaf_id = self.find_leaf(key);
        let leaf = self.nodes[leaf_id].as_leaf_mut();
        let idx = leaf.search(key).ok()?;
        Some(leaf.entries[idx].value_mut())
    }

    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    fn find_leaf<Q>(&self, key: &Q) -> NodeId
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut id = self.root;
        while let Node::Interior(interior) = &self.nodes[id] {
            id = interior.children[interior.child_index(key)];
        }
        id
    }

    /// Like `find_leaf`, but records the route for upward propagation.
    fn descend<Q>(&self, key: &Q, path: &mut Path) -> NodeId
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut id = self.root;
        while let Node::Interior(interior) = &self.nodes[id] {
            let idx = interior.child_index(key);
            path.push((id, idx));
            id = interior.children[idx];
        }
        id
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Inserts or updates `key`, returning the value it replaced.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let mut path = Vec::with_capacity(self.height);
        let leaf_id = self.descend(&key, &mut path);
        let leaf = self.nodes[leaf_id].as_leaf_mut();
        let pos = match leaf.search(&key) {
            Ok(idx) => return Some(leaf.entries[idx].replace_value(value)),
            Err(idx) => idx,
        };
        leaf.entries.insert(pos, Entry::new(key, value));
        self.len += 1;
        if self.height == 0 {
            self.height = 1;
        }
        if leaf.len() > self.config.max_entries() {
            self.split_leaf(leaf_id, path);
        }
        None
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut path = Vec::with_capacity(self.height);
        let leaf_id = self.descend(key, &mut path);
        let leaf = self.nodes[leaf_id].as_leaf_mut();
        let idx = leaf.search(key).ok()?;
        let removed = leaf.entries.remove(idx).into_value();
        self.len -= 1;

        if path.is_empty() {
            if leaf.entries.is_empty() {
                self.height = 0;
            }
            return Some(removed);
        }
        if leaf.len() < self.config.min_leaf_entries() {
            self.rebalance_leaf(leaf_id, path);
        }
        Some(removed)
    }

    /// Splits a leaf holding `order + 1` entries. The original node keeps the
    /// larger left half and stays where it was in the chain.
    fn split_leaf(&mut self, leaf_id: NodeId, path: Path) {
        let left_len = self.config.split_left_len();
        let leaf = self.nodes[leaf_id].as_leaf_mut();
        let entries = leaf.entries.split_off(left_len);
        let separator = entries[0].key().clone();
        let old_next = leaf.next;
        let parent = leaf.parent;

        let right_id = self.nodes.alloc(Node::Leaf(LeafNode {
            entries,
            parent,
            prev: Some(leaf_id),
            next: old_next,
        }));
        self.nodes[leaf_id].as_leaf_mut().next = Some(right_id);
        if let Some(next) = old_next {
            self.nodes[next].as_leaf_mut().prev = Some(right_id);
        }
        trace!(left = ?leaf_id, right = ?right_id, "split leaf");

        self.insert_separator(path, leaf_id, separator, right_id);
    }

    /// Hangs `right` next to `left` in their parent, splitting ancestors as
    /// long as they overflow.
    fn insert_separator(
        &mut self,
        mut path: Path,
        mut left: NodeId,
        mut separator: K,
        mut right: NodeId,
    ) {
        while let Some((parent_id, idx)) = path.pop() {
            let parent = self.nodes[parent_id].as_interior_mut();
            debug_assert_eq!(parent.children[idx], left);
            parent.keys.insert(idx, separator);
            parent.children.insert(idx + 1, right);
            let overflow = parent.len() > self.config.max_children();
            self.nodes[right].set_parent(Some(parent_id));
            if !overflow {
                return;
            }

            let (promoted, sibling) = self.split_interior(parent_id);
            left = parent_id;
            separator = promoted;
            right = sibling;
        }
        self.grow_root(left, separator, right);
    }

    /// Splits an interior node holding `order + 1` children, returning the
    /// separator to promote and the new right sibling.
    fn split_interior(&mut self, id: NodeId) -> (K, NodeId) {
        let left_len = self.config.split_left_len();
        let node = self.nodes[id].as_interior_mut();
        let children = node.children.split_off(left_len);
        let keys = node.keys.split_off(left_len);
        let promoted = node
            .keys
            .pop()
            .expect("overflowing interior node has a boundary separator");
        let parent = node.parent;

        let sibling = self.nodes.alloc(Node::Interior(InteriorNode {
            keys,
            children: Vec::new(),
            parent,
        }));
        for &child in &children {
            self.nodes[child].set_parent(Some(sibling));
        }
        self.nodes[sibling].as_interior_mut().children = children;
        trace!(left = ?id, right = ?sibling, "split interior node");

        (promoted, sibling)
    }

    fn grow_root(&mut self, left: NodeId, separator: K, right: NodeId) {
        debug_assert_eq!(left, self.root);
        let root = self.nodes.alloc(Node::Interior(InteriorNode {
            keys: vec![separator],
            children: vec![left, right],
            parent: None,
        }));
        self.nodes[left].set_parent(Some(root));
        self.nodes[right].set_parent(Some(root));
        self.root = root;
        self.height += 1;
        debug!(height = self.height, "root split");
    }

    /// Restores the fill bound of a non-root leaf that just lost an entry.
    fn rebalance_leaf(&mut self, leaf_id: NodeId, mut path: Path) {
        let (parent_id, idx) = *path.last().expect("non-root leaf has a parent");
        debug_assert_eq!(self.nodes[leaf_id].parent(), Some(parent_id));
        let min = self.config.min_leaf_entries();
        let (prev, next) = self.siblings(parent_id, idx);

        if let Some(prev) = prev.filter(|&p| self.nodes[p].as_leaf().len() > min) {
            let (from, to) = self.nodes.pair_mut(prev, leaf_id);
            let moved = from
                .as_leaf_mut()
                .entries
                .pop()
                .expect("lending leaf is not empty");
            let separator = moved.key().clone();
            to.as_leaf_mut().entries.insert(0, moved);
            self.nodes[parent_id].as_interior_mut().keys[idx - 1] = separator;
            trace!(from = ?prev, to = ?leaf_id, "borrowed entry from previous leaf");
            return;
        }

        if let Some(next) = next.filter(|&n| self.nodes[n].as_leaf().len() > min) {
            let (to, from) = self.nodes.pair_mut(leaf_id, next);
            let from = from.as_leaf_mut();
            let moved = from.entries.remove(0);
            to.as_leaf_mut().entries.push(moved);
            let separator = from
                .first_key()
                .expect("lending leaf keeps entries")
                .clone();
            self.nodes[parent_id].as_interior_mut().keys[idx] = separator;
            trace!(from = ?next, to = ?leaf_id, "borrowed entry from next leaf");
            return;
        }

        // The left node of the pair always survives the merge.
        let (left, right, sep_idx) = match (prev, next) {
            (Some(prev), _) => (prev, leaf_id, idx - 1),
            (None, Some(next)) => (leaf_id, next, idx),
            (None, None) => panic!("interior node {parent_id:?} has a single child"),
        };
        self.merge_leaves(left, right);
        let parent = self.nodes[parent_id].as_interior_mut();
        parent.keys.remove(sep_idx);
        parent.children.remove(sep_idx + 1);

        path.pop();
        self.rebalance_interior(parent_id, path);
    }

    /// Moves every entry of `right` into `left`, then unlinks and frees `right`.
    fn merge_leaves(&mut self, left: NodeId, right: NodeId) {
        let right_leaf = self.nodes.free(right).into_leaf();
        let left_leaf = self.nodes[left].as_leaf_mut();
        debug_assert_eq!(left_leaf.next, Some(right));
        left_leaf.entries.extend(right_leaf.entries);
        left_leaf.next = right_leaf.next;
        if let Some(next) = right_leaf.next {
            self.nodes[next].as_leaf_mut().prev = Some(left);
        }
        if self.head == right {
            self.head = left;
        }
        trace!(into = ?left, from = ?right, "merged leaves");
    }

    /// Restores the fill bound of interior node `id` after it lost a child,
    /// walking up `path` (the ancestors of `id`) while merges keep cascading.
    fn rebalance_interior(&mut self, mut id: NodeId, mut path: Path) {
        let min = self.config.min_children();
        loop {
            let count = self.nodes[id].as_interior().len();
            let Some(&(parent_id, idx)) = path.last() else {
                if count == 1 {
                    self.collapse_root(id);
                }
                return;
            };
            if count >= min {
                return;
            }
            debug_assert_eq!(self.nodes[id].parent(), Some(parent_id));

            let (prev, next) = self.siblings(parent_id, idx);
            if let Some(prev) = prev.filter(|&p| self.nodes[p].as_interior().len() > min) {
                self.borrow_from_prev(parent_id, idx, prev, id);
                return;
            }
            if let Some(next) = next.filter(|&n| self.nodes[n].as_interior().len() > min) {
                self.borrow_from_next(parent_id, idx, id, next);
                return;
            }

            let (left, right, sep_idx) = match (prev, next) {
                (Some(prev), _) => (prev, id, idx - 1),
                (None, Some(next)) => (id, next, idx),
                (None, None) => panic!("interior node {parent_id:?} has a single child"),
            };
            self.merge_interiors(parent_id, sep_idx, left, right);

            path.pop();
            id = parent_id;
        }
    }

    /// Rotates the last child of `prev` into the front of `id` through the
    /// parent separator.
    fn borrow_from_prev(&mut self, parent_id: NodeId, idx: usize, prev: NodeId, id: NodeId) {
        let from = self.nodes[prev].as_interior_mut();
        let child = from.children.pop().expect("lending node has children");
        let up = from.keys.pop().expect("lending node has separators");
        let parent = self.nodes[parent_id].as_interior_mut();
        let down = std::mem::replace(&mut parent.keys[idx - 1], up);
        let to = self.nodes[id].as_interior_mut();
        to.keys.insert(0, down);
        to.children.insert(0, child);
        self.nodes[child].set_parent(Some(id));
        trace!(from = ?prev, to = ?id, "borrowed child from previous interior node");
    }

    /// Rotates the first child of `next` onto the back of `id` through the
    /// parent separator.
    fn borrow_from_next(&mut self, parent_id: NodeId, idx: usize, id: NodeId, next: NodeId) {
        let from = self.nodes[next].as_interior_mut();
        let child = from.children.remove(0);
        let up = from.keys.remove(0);
        let parent = self.nodes[parent_id].as_interior_mut();
        let down = std::mem::replace(&mut parent.keys[idx], up);
        let to = self.nodes[id].as_interior_mut();
        to.keys.push(down);
        to.children.push(child);
        self.nodes[child].set_parent(Some(id));
        trace!(from = ?next, to = ?id, "borrowed child from next interior node");
    }

    /// Pulls the separator at `sep_idx` down between `left` and `right` and
    /// folds `right` into `left`.
    fn merge_interiors(
        &mut self,
        parent_id: NodeId,
        sep_idx: usize,
        left: NodeId,
        right: NodeId,
    ) {
        let parent = self.nodes[parent_id].as_interior_mut();
        let separator = parent.keys.remove(sep_idx);
        let removed = parent.children.remove(sep_idx + 1);
        debug_assert_eq!(removed, right);

        let right_node = self.nodes.free(right).into_interior();
        for &child in &right_node.children {
            self.nodes[child].set_parent(Some(left));
        }
        let left_node = self.nodes[left].as_interior_mut();
        left_node.keys.push(separator);
        left_node.keys.extend(right_node.keys);
        left_node.children.extend(right_node.children);
        trace!(into = ?left, from = ?right, "merged interior nodes");
    }

    /// Replaces a root with a single child by that child.
    fn collapse_root(&mut self, id: NodeId) {
        debug_assert_eq!(id, self.root);
        let old = self.nodes.free(id).into_interior();
        let child = old.children[0];
        self.nodes[child].set_parent(None);
        self.root = child;
        self.height -= 1;
        debug!(height = self.height, "root collapsed");
    }
}

impl<K, V> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BPlusTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        let mut leaf = Some(self.head());
        while let Some(current) = leaf {
            map.entries(current.entries().iter().map(|e| (e.key(), e.value())));
            leaf = current.next_leaf();
        }
        map.finish()
    }
}

/// Read-only cursor over one leaf of the chain.
pub struct LeafRef<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    pub(crate) id: NodeId,
}

impl<'a, K, V> LeafRef<'a, K, V> {
    #[inline]
    fn leaf(&self) -> &'a LeafNode<K, V> {
        self.tree.nodes[self.id].as_leaf()
    }

    /// Entries of this leaf in ascending key order.
    pub fn entries(&self) -> &'a [Entry<K, V>] {
        &self.leaf().entries
    }

    pub fn len(&self) -> usize {
        self.leaf().len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf().entries.is_empty()
    }

    pub fn first_key(&self) -> Option<&'a K> {
        self.leaf().first_key()
    }

    pub fn last_key(&self) -> Option<&'a K> {
        self.leaf().entries.last().map(Entry::key)
    }

    pub fn next_leaf(&self) -> Option<Self> {
        self.leaf().next.map(|id| LeafRef {
            tree: self.tree,
            id,
        })
    }

    pub fn prev_leaf(&self) -> Option<Self> {
        self.leaf().prev.map(|id| LeafRef {
            tree: self.tree,
            id,
        })
    }
}

impl<K, V> Clone for LeafRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for LeafRef<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LeafRef<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries().iter().map(|e| (e.key(), e.value())))
            .finish()
    }
}
