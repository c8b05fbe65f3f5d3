//! Error types for tree construction.
//!
//! Lookups and removals of absent keys are not errors; they return `None`.

use thiserror::Error;

/// Result type alias for fallible tree operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested order cannot hold a balanced tree.
    #[error("order must be at least {min}, got {order}")]
    InvalidOrder { order: usize, min: usize },
}
