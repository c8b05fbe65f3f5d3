//! # bplus-tree
//!
//! An order-M B+Tree: a balanced, sorted key/value index with logarithmic
//! point lookup, upsert, and removal.
//!
//! Entries are stored only in leaves, and every leaf is threaded into a doubly
//! linked chain in ascending key order. The chain is reachable through
//! [`BPlusTree::head`] and [`BPlusTree::tail`], so sequential scans never need to
//! descend the tree again.
//!
//! Nodes live in an index-stable arena. Parent and sibling links are arena
//! indices, so the tree owns every node exactly once and back-references never
//! keep anything alive.
//!
//! ## Example
//!
//! ```rust
//! use bplus_tree::BPlusTree;
//!
//! let mut tree = BPlusTree::new(4).unwrap();
//! tree.put("hello", 1);
//! tree.put("world", 2);
//!
//! assert_eq!(tree.get("hello"), Some(&1));
//! assert_eq!(tree.remove("world"), Some(2));
//! assert_eq!(tree.get("world"), None);
//!
//! let first = tree.head();
//! assert_eq!(first.first_key(), Some(&"hello"));
//! ```

#![deny(unsafe_code)]

mod arena;
mod config;
mod entry;
mod error;
mod node;
mod tree;

pub use config::{Config, DEFAULT_ORDER, MIN_ORDER};
pub use entry::Entry;
pub use error::{Error, Result};
pub use tree::{BPlusTree, LeafRef};


#[cfg(test)]
mod proptests;
