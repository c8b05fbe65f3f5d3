//! Index-stable node storage.
//!
//! Nodes refer to each other by [`NodeId`] instead of by pointer. A parent owns
//! the ids listed in its child array; `parent`, `prev`, and `next` ids are plain
//! cross-links and never decide when a slot is released.

use std::fmt;
use std::ops::{Index, IndexMut};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slab of nodes with a free list of released slots.
#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<NodeId>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, value: T) -> NodeId {
        if let Some(id) = self.free.pop() {
            debug_assert!(self.slots[id.slot()].is_none());
            self.slots[id.slot()] = Some(value);
            return id;
        }
        let slot = self.slots.len();
        let raw = u32::try_from(slot)
            .unwrap_or_else(|_| panic!("node arena exhausted at {slot} slots"));
        self.slots.push(Some(value));
        NodeId(raw)
    }

    /// Releases the slot and hands back the node that lived there.
    pub(crate) fn free(&mut self, id: NodeId) -> T {
        let value = self.slots[id.slot()]
            .take()
            .unwrap_or_else(|| panic!("double free of node {id:?}"));
        self.free.push(id);
        value
    }

    /// Mutable access to two distinct live nodes at once.
    pub(crate) fn pair_mut(&mut self, a: NodeId, b: NodeId) -> (&mut T, &mut T) {
        assert_ne!(a, b, "pair_mut on the same node");
        let (lo, hi, swapped) = if a.slot() < b.slot() {
            (a, b, false)
        } else {
            (b, a, true)
        };
        let (head, tail) = self.slots.split_at_mut(hi.slot());
        let lo_ref = head[lo.slot()]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling node {lo:?}"));
        let hi_ref = tail[0]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling node {hi:?}"));
        if swapped {
            (hi_ref, lo_ref)
        } else {
            (lo_ref, hi_ref)
        }
    }

    /// Number of live nodes.
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: NodeId) -> &T {
        self.slots[id.slot()]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling node {id:?}"))
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        self.slots[id.slot()]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling node {id:?}"))
    }
}
