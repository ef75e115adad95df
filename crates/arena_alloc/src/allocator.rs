//! # Allocator Contract
//!
//! The capability every strategy implements: two operations, four accessors,
//! and a teardown invariant that can be checked without knowing the strategy.

use crate::error::AllocResult;

/// Alignment used by [`Allocator::allocate_default`].
pub const DEFAULT_ALIGNMENT: usize = 4;

/// A live allocation inside an arena.
///
/// `offset` indexes the arena slice; `address` is the absolute address the
/// alignment guarantee applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Allocation {
    /// Byte offset from the arena start.
    offset: usize,
    /// Absolute address (`arena start + offset`).
    address: usize,
}

impl Allocation {
    /// Creates a handle for `offset` in an arena starting at `start`.
    #[inline]
    #[must_use]
    pub(crate) const fn at(start: usize, offset: usize) -> Self {
        Self {
            offset,
            address: start + offset,
        }
    }

    /// Returns the byte offset from the arena start.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the absolute address.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> usize {
        self.address
    }
}

/// An allocation strategy over a borrowed arena.
///
/// # Contract
///
/// - `size` must be non-zero and `alignment` a power of two; violating either
///   panics.
/// - `deallocate` only accepts live allocations from the same instance.
///   Anything else is undefined and not detected.
/// - `used_memory()` and `num_allocations()` must both be zero when the
///   allocator is dropped.
pub trait Allocator {
    /// Allocates `size` bytes whose address is a multiple of `alignment`.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfSpace`](crate::AllocError::OutOfSpace) if no region
    /// fits. The allocator is left untouched in that case.
    fn allocate(&mut self, size: usize, alignment: usize) -> AllocResult<Allocation>;

    /// Returns an allocation to the allocator.
    fn deallocate(&mut self, allocation: Allocation);

    /// The managed region.
    fn arena(&self) -> &[u8];

    /// The managed region, mutably.
    fn arena_mut(&mut self) -> &mut [u8];

    /// Bytes currently handed out, including padding and headers.
    fn used_memory(&self) -> usize;

    /// Number of live allocations.
    fn num_allocations(&self) -> usize;

    /// Alignment used by [`Allocator::allocate_default`].
    fn default_alignment(&self) -> usize {
        DEFAULT_ALIGNMENT
    }

    /// Allocates `size` bytes at the default alignment.
    ///
    /// # Errors
    ///
    /// Same as [`Allocator::allocate`].
    fn allocate_default(&mut self, size: usize) -> AllocResult<Allocation> {
        let alignment = self.default_alignment();
        self.allocate(size, alignment)
    }

    /// Absolute address of the first arena byte.
    fn start(&self) -> usize {
        self.arena().as_ptr() as usize
    }

    /// Total arena size in bytes.
    fn size(&self) -> usize {
        self.arena().len()
    }

    /// Bytes not yet handed out.
    fn remaining(&self) -> usize {
        self.size() - self.used_memory()
    }

    /// The first `len` bytes of `allocation`.
    fn bytes(&self, allocation: Allocation, len: usize) -> &[u8] {
        &self.arena()[allocation.offset()..allocation.offset() + len]
    }

    /// The first `len` bytes of `allocation`, mutably.
    fn bytes_mut(&mut self, allocation: Allocation, len: usize) -> &mut [u8] {
        &mut self.arena_mut()[allocation.offset()..allocation.offset() + len]
    }
}

/// Asserts the request preconditions shared by every strategy.
#[inline]
pub(crate) fn check_request(size: usize, alignment: usize) {
    assert!(size != 0, "allocation size must be non-zero");
    assert!(
        alignment.is_power_of_two(),
        "alignment must be a power of two, got {alignment}"
    );
}

/// Teardown check run from every strategy's `Drop`.
///
/// A live allocation at teardown is a leak in the caller. Skipped while
/// unwinding so a failing test reports its own panic.
pub(crate) fn check_teardown(name: &str, used_memory: usize, num_allocations: usize) {
    if cfg!(debug_assertions)
        && !std::thread::panicking()
        && (used_memory != 0 || num_allocations != 0)
    {
        tracing::error!(
            "{} dropped with {} live allocations ({} bytes)",
            name,
            num_allocations,
            used_memory
        );
        panic!(
            "{name} dropped with {num_allocations} live allocations ({used_memory} bytes in use)"
        );
    }
}
