//! # Bump Allocator
//!
//! A linear allocator for transient allocations that are freed all at once.

use crate::align::align_forward_adjustment;
use crate::allocator::{check_request, check_teardown, Allocation, Allocator};
use crate::error::{AllocError, AllocResult};

/// A bump-pointer allocator over a borrowed arena.
///
/// Allocations are fast (just bump a cursor). Individual allocations cannot be
/// freed; [`BumpAllocator::clear`] reclaims the whole arena at once.
///
/// # Thread Safety
///
/// This allocator is NOT thread-safe. Use one allocator per thread.
///
/// # Example
///
/// ```rust
/// use arena_alloc::{Allocator, BumpAllocator};
///
/// let mut memory = [0u8; 1024];
/// let mut scratch = BumpAllocator::new(&mut memory)?;
///
/// let a = scratch.allocate(64, 8)?;
/// assert_eq!(a.address() % 8, 0);
///
/// // Reset once per work unit
/// scratch.clear();
/// # Ok::<(), arena_alloc::AllocError>(())
/// ```
pub struct BumpAllocator<'a> {
    /// The caller-owned storage.
    arena: &'a mut [u8],
    /// Offset of the next free byte.
    cursor: usize,
    /// Bytes handed out, including alignment padding.
    used_memory: usize,
    /// Allocations since the last clear.
    num_allocations: usize,
}

impl<'a> BumpAllocator<'a> {
    /// Creates a bump allocator over `arena`.
    ///
    /// # Errors
    ///
    /// [`AllocError::ArenaTooSmall`] if `arena` is empty.
    pub fn new(arena: &'a mut [u8]) -> AllocResult<Self> {
        if arena.is_empty() {
            return Err(AllocError::ArenaTooSmall {
                size: 0,
                minimum: 0,
            });
        }
        tracing::debug!("bump allocator over {} bytes", arena.len());

        Ok(Self {
            arena,
            cursor: 0,
            used_memory: 0,
            num_allocations: 0,
        })
    }

    /// Returns the offset of the next free byte.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Resets the allocator, invalidating all previous allocations.
    ///
    /// This is a **zero-cost** operation: the backing bytes are not touched.
    /// Previous handles become invalid and must not be used.
    #[inline]
    pub fn clear(&mut self) {
        tracing::debug!(
            "bump clear: releasing {} allocations ({} bytes)",
            self.num_allocations,
            self.used_memory
        );
        self.num_allocations = 0;
        self.used_memory = 0;
        self.cursor = 0;
    }
}

impl Allocator for BumpAllocator<'_> {
    fn allocate(&mut self, size: usize, alignment: usize) -> AllocResult<Allocation> {
        check_request(size, alignment);

        let start = self.start();
        let adjustment = align_forward_adjustment(start + self.cursor, alignment);

        if (self.used_memory + adjustment).saturating_add(size) > self.arena.len() {
            tracing::warn!(
                "bump out of space: {} bytes at alignment {} ({} of {} used)",
                size,
                alignment,
                self.used_memory,
                self.arena.len()
            );
            return Err(AllocError::OutOfSpace {
                requested: size,
                alignment,
            });
        }

        let offset = self.cursor + adjustment;
        self.cursor = offset + size;
        self.used_memory += adjustment + size;
        self.num_allocations += 1;

        tracing::trace!("bump allocate {} bytes at offset {}", size, offset);
        Ok(Allocation::at(start, offset))
    }

    fn deallocate(&mut self, _allocation: Allocation) {
        panic!("BumpAllocator cannot free individual allocations, use clear()");
    }

    fn arena(&self) -> &[u8] {
        &self.arena[..]
    }

    fn arena_mut(&mut self) -> &mut [u8] {
        &mut self.arena[..]
    }

    fn used_memory(&self) -> usize {
        self.used_memory
    }

    fn num_allocations(&self) -> usize {
        self.num_allocations
    }
}

impl Drop for BumpAllocator<'_> {
    fn drop(&mut self) {
        check_teardown("BumpAllocator", self.used_memory, self.num_allocations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8-aligned backing storage so offsets and addresses agree on alignment.
    fn backing(bytes: usize) -> Vec<u64> {
        vec![0u64; bytes / 8]
    }

    #[test]
    fn test_empty_arena_is_rejected() {
        assert_eq!(
            BumpAllocator::new(&mut []).err(),
            Some(AllocError::ArenaTooSmall {
                size: 0,
                minimum: 0
            })
        );
    }

    #[test]
    fn test_bump_allocation() {
        let mut memory = backing(256);
        let mut bump =
            BumpAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();

        let a = bump.allocate(3, 1).unwrap();
        let b = bump.allocate(8, 8).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 8);
        assert_eq!(bump.used_memory(), 16);
        assert_eq!(bump.num_allocations(), 2);

        bump.clear();
    }

    #[test]
    fn test_bump_exhaustion_and_reset() {
        let mut memory = [0u8; 256];
        let mut bump = BumpAllocator::new(&mut memory).unwrap();

        let first = bump.allocate(100, 4).unwrap();
        bump.allocate(100, 4).unwrap();

        let cursor = bump.cursor();
        let used = bump.used_memory();
        assert_eq!(
            bump.allocate(100, 4),
            Err(AllocError::OutOfSpace {
                requested: 100,
                alignment: 4
            })
        );
        assert_eq!(bump.cursor(), cursor);
        assert_eq!(bump.used_memory(), used);
        assert_eq!(bump.num_allocations(), 2);

        bump.clear();
        assert_eq!(bump.used_memory(), 0);
        assert_eq!(bump.num_allocations(), 0);

        let again = bump.allocate(100, 4).unwrap();
        assert_eq!(again.address(), first.address());

        bump.clear();
    }

    #[test]
    fn test_bump_bytes_are_writable() {
        let mut memory = backing(64);
        let mut bump =
            BumpAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();

        let a = bump.allocate(4, 4).unwrap();
        bump.bytes_mut(a, 4).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(bump.bytes(a, 4), &[1, 2, 3, 4]);

        bump.clear();
    }

    #[test]
    #[should_panic(expected = "use clear()")]
    fn test_bump_deallocate_is_invalid() {
        let mut memory = [0u8; 64];
        let mut bump = BumpAllocator::new(&mut memory).unwrap();
        let a = bump.allocate(8, 4).unwrap();
        bump.deallocate(a);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_size_is_rejected() {
        let mut memory = [0u8; 64];
        let mut bump = BumpAllocator::new(&mut memory).unwrap();
        let _ = bump.allocate(0, 8);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_alignment_is_rejected() {
        let mut memory = [0u8; 64];
        let mut bump = BumpAllocator::new(&mut memory).unwrap();
        let _ = bump.allocate(8, 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "BumpAllocator dropped with 1 live allocations")]
    fn test_drop_without_clear() {
        let mut memory = [0u8; 64];
        let mut bump = BumpAllocator::new(&mut memory).unwrap();
        bump.allocate(8, 4).unwrap();
        drop(bump);
    }
}
