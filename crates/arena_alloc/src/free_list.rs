//! # Free-List Allocator
//!
//! General-purpose allocator that reuses freed regions of one arena.
//!
//! ## Layout
//!
//! All bookkeeping lives inside the arena itself:
//!
//! ```text
//! | adjustment padding | AllocationHeader | user bytes ........ |
//! ^ block start        ^ offset - 16      ^ offset (aligned)
//! ```
//!
//! Unused regions start with a free-block node. Nodes are linked by offset
//! and kept sorted by address, so freeing a block only has to look at its two
//! neighbours to coalesce.

use bytemuck::{Pod, Zeroable};

use crate::align::{align_forward_adjustment_with_header, is_aligned};
use crate::allocator::{check_request, check_teardown, Allocation, Allocator};
use crate::error::{AllocError, AllocResult};

/// Terminates the free list.
const NIL: usize = usize::MAX;

/// Metadata stored immediately before every returned offset.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct AllocationHeader {
    /// Bytes consumed by the allocation, adjustment included.
    size: usize,
    /// Distance from the block start to the returned offset.
    adjustment: usize,
}

/// Node written at the start of every unused region.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FreeBlock {
    /// Size of the region in bytes.
    size: usize,
    /// Offset of the next free block, or `NIL`.
    next: usize,
}

/// Size of the header in front of every allocation.
pub const HEADER_SIZE: usize = std::mem::size_of::<AllocationHeader>();

/// Minimum bookkeeping an arena must be able to hold.
pub const FREE_BLOCK_SIZE: usize = std::mem::size_of::<FreeBlock>();

// Every freed block must be able to host a free-list node.
const _: () = assert!(HEADER_SIZE >= FREE_BLOCK_SIZE);

/// A snapshot of one unused region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlockInfo {
    /// Offset of the region from the arena start.
    pub offset: usize,
    /// Size of the region in bytes.
    pub size: usize,
}

/// A first-fit free-list allocator over a borrowed arena.
///
/// Allocations can be freed in any order. Freed regions are merged with any
/// physically adjacent free region, so alloc/free cycles don't fragment the
/// arena into slivers.
///
/// # Thread Safety
///
/// This allocator is NOT thread-safe. Use one allocator per thread or wrap in
/// a mutex.
///
/// # Example
///
/// ```rust
/// use arena_alloc::{Allocator, FreeListAllocator};
///
/// let mut memory = vec![0u8; 16 * 1024];
/// let mut heap = FreeListAllocator::new(&mut memory)?;
///
/// let a = heap.allocate(100, 8)?;
/// let b = heap.allocate(200, 16)?;
/// heap.deallocate(a);
/// heap.deallocate(b);
///
/// assert_eq!(heap.free_block_count(), 1);
/// # Ok::<(), arena_alloc::AllocError>(())
/// ```
pub struct FreeListAllocator<'a> {
    /// The caller-owned storage.
    arena: &'a mut [u8],
    /// Offset of the lowest free block.
    head: Option<usize>,
    /// Bytes handed out, headers and padding included.
    used_memory: usize,
    /// Live allocations.
    num_allocations: usize,
}

impl<'a> FreeListAllocator<'a> {
    /// Creates a free-list allocator with one free block spanning `arena`.
    ///
    /// # Errors
    ///
    /// [`AllocError::ArenaTooSmall`] if `arena` cannot hold a free-list node.
    pub fn new(arena: &'a mut [u8]) -> AllocResult<Self> {
        if arena.len() <= FREE_BLOCK_SIZE {
            return Err(AllocError::ArenaTooSmall {
                size: arena.len(),
                minimum: FREE_BLOCK_SIZE,
            });
        }

        let mut allocator = Self {
            arena,
            head: Some(0),
            used_memory: 0,
            num_allocations: 0,
        };
        let size = allocator.arena.len();
        allocator.write_block(0, FreeBlock { size, next: NIL });

        tracing::debug!("free-list allocator over {} bytes", size);
        Ok(allocator)
    }

    /// Number of unused regions.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.free_blocks().count()
    }

    /// Size of the biggest unused region.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks().map(|block| block.size).max().unwrap_or(0)
    }

    /// Iterates over unused regions in address order.
    pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlockInfo> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let offset = cursor?;
            let block = self.read_block(offset);
            cursor = link(block.next);
            Some(FreeBlockInfo {
                offset,
                size: block.size,
            })
        })
    }

    #[inline]
    fn read_block(&self, offset: usize) -> FreeBlock {
        bytemuck::pod_read_unaligned(&self.arena[offset..offset + FREE_BLOCK_SIZE])
    }

    #[inline]
    fn write_block(&mut self, offset: usize, block: FreeBlock) {
        self.arena[offset..offset + FREE_BLOCK_SIZE]
            .copy_from_slice(bytemuck::bytes_of(&block));
    }

    #[inline]
    fn read_header(&self, offset: usize) -> AllocationHeader {
        bytemuck::pod_read_unaligned(&self.arena[offset - HEADER_SIZE..offset])
    }

    #[inline]
    fn write_header(&mut self, offset: usize, header: AllocationHeader) {
        self.arena[offset - HEADER_SIZE..offset]
            .copy_from_slice(bytemuck::bytes_of(&header));
    }

    /// Points `prev` (or the list head) at `next`.
    #[inline]
    fn relink(&mut self, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(prev) => {
                let mut block = self.read_block(prev);
                block.next = next.unwrap_or(NIL);
                self.write_block(prev, block);
            }
            None => self.head = next,
        }
    }
}

/// Decodes a stored `next` field.
#[inline]
const fn link(next: usize) -> Option<usize> {
    if next == NIL {
        None
    } else {
        Some(next)
    }
}

impl Allocator for FreeListAllocator<'_> {
    fn allocate(&mut self, size: usize, alignment: usize) -> AllocResult<Allocation> {
        check_request(size, alignment);

        let start = self.start();
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(offset) = cursor {
            let block = self.read_block(offset);
            let adjustment =
                align_forward_adjustment_with_header(start + offset, alignment, HEADER_SIZE);
            let mut total = size.saturating_add(adjustment);

            if block.size < total {
                prev = cursor;
                cursor = link(block.next);
                continue;
            }

            if block.size - total <= HEADER_SIZE {
                // The tail could never host another allocation: take it all.
                total = block.size;
                self.relink(prev, link(block.next));
            } else {
                let tail = offset + total;
                self.write_block(
                    tail,
                    FreeBlock {
                        size: block.size - total,
                        next: block.next,
                    },
                );
                self.relink(prev, Some(tail));
            }

            let aligned = offset + adjustment;
            self.write_header(
                aligned,
                AllocationHeader {
                    size: total,
                    adjustment,
                },
            );

            self.used_memory += total;
            self.num_allocations += 1;

            debug_assert!(is_aligned(start + aligned, alignment));
            tracing::trace!(
                "free-list allocate {} bytes at offset {} (block {}, {} consumed)",
                size,
                aligned,
                offset,
                total
            );
            return Ok(Allocation::at(start, aligned));
        }

        tracing::warn!(
            "free-list out of space: {} bytes at alignment {} ({} of {} used, largest free {})",
            size,
            alignment,
            self.used_memory,
            self.arena.len(),
            self.largest_free_block()
        );
        Err(AllocError::OutOfSpace {
            requested: size,
            alignment,
        })
    }

    fn deallocate(&mut self, allocation: Allocation) {
        let header = self.read_header(allocation.offset());
        let block_start = allocation.offset() - header.adjustment;
        let block_end = block_start + header.size;

        // Find the first free block at or past the freed range.
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(offset) = cursor {
            if offset >= block_end {
                break;
            }
            prev = cursor;
            cursor = link(self.read_block(offset).next);
        }

        let mut freed = FreeBlock {
            size: header.size,
            next: cursor.unwrap_or(NIL),
        };

        // Merge with the following neighbour.
        if let Some(next) = cursor {
            if next == block_end {
                let following = self.read_block(next);
                freed.size += following.size;
                freed.next = following.next;
                tracing::debug!("coalesce {} with following block {}", block_start, next);
            }
        }

        // Merge with the preceding neighbour, or link in as a new node.
        match prev {
            Some(prev) => {
                let mut preceding = self.read_block(prev);
                if prev + preceding.size == block_start {
                    preceding.size += freed.size;
                    preceding.next = freed.next;
                    self.write_block(prev, preceding);
                    tracing::debug!("coalesce {} into preceding block {}", block_start, prev);
                } else {
                    self.write_block(block_start, freed);
                    preceding.next = block_start;
                    self.write_block(prev, preceding);
                }
            }
            None => {
                self.write_block(block_start, freed);
                self.head = Some(block_start);
            }
        }

        self.used_memory -= header.size;
        self.num_allocations -= 1;

        tracing::trace!(
            "free-list deallocate offset {} ({} bytes returned)",
            allocation.offset(),
            header.size
        );
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

impl Drop for FreeListAllocator<'_> {
    fn drop(&mut self) {
        check_teardown("FreeListAllocator", self.used_memory, self.num_allocations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8-aligned backing storage so offsets and addresses agree on alignment.
    fn backing(bytes: usize) -> Vec<u64> {
        vec![0u64; bytes / 8]
    }

    fn blocks(heap: &FreeListAllocator<'_>) -> Vec<(usize, usize)> {
        heap.free_blocks().map(|b| (b.offset, b.size)).collect()
    }

    #[test]
    fn test_arena_too_small() {
        let mut memory = [0u8; FREE_BLOCK_SIZE];
        assert_eq!(
            FreeListAllocator::new(&mut memory).err(),
            Some(AllocError::ArenaTooSmall {
                size: FREE_BLOCK_SIZE,
                minimum: FREE_BLOCK_SIZE
            })
        );
    }

    #[test]
    fn test_single_allocation_scenario() {
        let mut memory = backing(1024);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();
        assert_eq!(blocks(&heap), vec![(0, 1024)]);

        let a = heap.allocate(100, 8).unwrap();
        assert_eq!(a.offset(), HEADER_SIZE);
        assert_eq!(heap.used_memory(), 100 + HEADER_SIZE);
        assert_eq!(blocks(&heap), vec![(116, 908)]);

        assert!(matches!(
            heap.allocate(2000, 8),
            Err(AllocError::OutOfSpace {
                requested: 2000,
                ..
            })
        ));
        assert_eq!(heap.num_allocations(), 1);

        heap.deallocate(a);
        assert_eq!(heap.used_memory(), 0);
        assert_eq!(heap.num_allocations(), 0);
        assert_eq!(blocks(&heap), vec![(0, 1024)]);
    }

    #[test]
    fn test_small_tail_is_absorbed() {
        let mut memory = backing(128);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();

        // 128 - (100 + 16) = 12 bytes left: too small for another header.
        let a = heap.allocate(100, 8).unwrap();
        assert_eq!(heap.used_memory(), 128);
        assert_eq!(heap.free_block_count(), 0);
        assert!(heap.allocate(1, 1).is_err());

        heap.deallocate(a);
        assert_eq!(blocks(&heap), vec![(0, 128)]);
    }

    #[test]
    fn test_coalesce_forward_and_backward() {
        let mut memory = backing(512);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();

        let a = heap.allocate(48, 8).unwrap();
        let b = heap.allocate(48, 8).unwrap();
        let c = heap.allocate(48, 8).unwrap();
        assert_eq!(blocks(&heap), vec![(192, 320)]);

        // Middle first: no neighbours are free yet.
        heap.deallocate(b);
        assert_eq!(blocks(&heap), vec![(64, 64), (192, 320)]);

        // Merges into the block after it.
        heap.deallocate(a);
        assert_eq!(blocks(&heap), vec![(0, 128), (192, 320)]);

        // Bridges both neighbours.
        heap.deallocate(c);
        assert_eq!(blocks(&heap), vec![(0, 512)]);
    }

    #[test]
    fn test_first_fit_reuses_lowest_hole() {
        let mut memory = backing(512);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();

        let a = heap.allocate(48, 8).unwrap();
        let b = heap.allocate(48, 8).unwrap();
        heap.deallocate(a);

        let again = heap.allocate(48, 8).unwrap();
        assert_eq!(again.offset(), a.offset());

        heap.deallocate(again);
        heap.deallocate(b);
        assert_eq!(blocks(&heap), vec![(0, 512)]);
    }

    #[test]
    fn test_header_survives_user_writes() {
        let mut memory = backing(256);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();

        let a = heap.allocate(32, 16).unwrap();
        heap.bytes_mut(a, 32).fill(0xAB);
        assert!(heap.bytes(a, 32).iter().all(|&b| b == 0xAB));

        heap.deallocate(a);
        assert_eq!(heap.used_memory(), 0);
        assert_eq!(blocks(&heap), vec![(0, 256)]);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_size_is_rejected() {
        let mut memory = backing(128);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();
        let _ = heap.allocate(0, 8);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_alignment_is_rejected() {
        let mut memory = backing(128);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();
        let _ = heap.allocate(8, 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "FreeListAllocator dropped with 1 live allocations")]
    fn test_drop_with_live_allocation() {
        let mut memory = backing(128);
        let mut heap =
            FreeListAllocator::new(bytemuck::cast_slice_mut(memory.as_mut_slice())).unwrap();
        heap.allocate(32, 8).unwrap();
        drop(heap);
    }
}
