//! Tree configuration and the fill thresholds derived from the order.

use crate::error::{Error, Result};

/// Smallest order for which splits and merges stay balanced.
pub const MIN_ORDER: usize = 3;

/// Order used by [`Config::default`].
pub const DEFAULT_ORDER: usize = 32;

/// Validated tree configuration.
///
/// The order `M` bounds both the number of entries in a leaf and the number of
/// children of an interior node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    order: usize,
}

impl Config {
    pub fn new(order: usize) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(Error::InvalidOrder {
                order,
                min: MIN_ORDER,
            });
        }
        Ok(Self { order })
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    #[inline]
    pub(crate) fn max_entries(&self) -> usize {
        self.order
    }

    #[inline]
    pub(crate) fn max_children(&self) -> usize {
        self.order
    }

    /// Fewest entries a non-root leaf may hold.
    #[inline]
    pub(crate) fn min_leaf_entries(&self) -> usize {
        self.order.div_ceil(2).max(2)
    }

    /// Fewest children a non-root interior node may hold.
    #[inline]
    pub(crate) fn min_children(&self) -> usize {
        self.order.div_ceil(2).max(2)
    }

    /// Size of the left half when `order + 1` items are split in two.
    #[inline]
    pub(crate) fn split_left_len(&self) -> usize {
        (self.order + 1).div_ceil(2)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
        }
    }
}
