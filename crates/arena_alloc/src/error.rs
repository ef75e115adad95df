//! # Allocator Error Types
//!
//! Recoverable failures only. Contract violations (bad alignment, freeing on a
//! bump allocator, leaking at teardown) panic instead of showing up here.

use thiserror::Error;

/// Errors that can occur while allocating from an arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No free region can satisfy the request.
    #[error("out of space: requested {requested} bytes at alignment {alignment}")]
    OutOfSpace {
        /// Requested size in bytes.
        requested: usize,
        /// Requested alignment.
        alignment: usize,
    },

    /// The arena cannot even hold the allocator's own bookkeeping.
    #[error("arena too small: {size} bytes, need more than {minimum}")]
    ArenaTooSmall {
        /// Size of the supplied arena.
        size: usize,
        /// Minimum bookkeeping overhead.
        minimum: usize,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;
