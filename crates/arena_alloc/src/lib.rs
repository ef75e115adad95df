//! # Arena Alloc
//!
//! Deterministic allocation strategies over a caller-supplied byte region.
//! The allocators never reserve memory themselves: they borrow the arena and
//! own only the bookkeeping they write into it.
//!
//! ## Strategies
//!
//! 1. **[`BumpAllocator`]** - advance a cursor, free everything with `clear()`
//! 2. **[`FreeListAllocator`]** - first-fit reuse, adjacent free regions merge
//!
//! Both implement [`Allocator`], so callers can swap strategies (statically,
//! or at runtime through [`AllocatorConfig`]).
//!
//! ## Failure Model
//!
//! - Running out of space is an [`AllocError`] the caller can handle.
//! - Contract violations (non-power-of-two alignment, freeing on a bump
//!   allocator, dropping an allocator with live allocations) panic.
//!
//! ## Example
//!
//! ```rust
//! use arena_alloc::{typed, Allocator, FreeListAllocator};
//!
//! let mut memory = vec![0u8; 4096];
//! let mut heap = FreeListAllocator::new(&mut memory)?;
//!
//! let scores = typed::new_array_with(&mut heap, 4, |i| i as u32)?;
//! assert_eq!(typed::array(&heap, &scores), &[0, 1, 2, 3]);
//!
//! typed::delete_array(&mut heap, scores);
//! assert_eq!(heap.used_memory(), 0);
//! # Ok::<(), arena_alloc::AllocError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod align;
pub mod allocator;
pub mod bump;
pub mod config;
pub mod error;
pub mod free_list;
pub mod typed;

pub use allocator::{Allocation, Allocator, DEFAULT_ALIGNMENT};
pub use bump::BumpAllocator;
pub use config::{AllocatorConfig, ArenaAllocator, Strategy};
pub use error::{AllocError, AllocResult};
pub use free_list::{FreeBlockInfo, FreeListAllocator, FREE_BLOCK_SIZE, HEADER_SIZE};
pub use typed::{Typed, TypedArray};
