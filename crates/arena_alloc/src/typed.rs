//! # Typed Construction Helpers
//!
//! Single objects and counted arrays on top of any [`Allocator`].
//!
//! Values are plain data ([`Pod`]), so they can be written into and read out
//! of the arena as bytes. Construction writes the value in place; destruction
//! moves it back out and hands it to the caller (or drops it).
//!
//! ## Array Layout
//!
//! ```text
//! | header slots (count in last word) | elem 0 | elem 1 | ... |
//! ^ block start                       ^ array offset
//! ```
//!
//! The header is a whole number of element slots so the first element keeps
//! the element alignment.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};

use bytemuck::Pod;

use crate::allocator::{Allocation, Allocator};
use crate::error::AllocResult;

/// Bytes used to store an array's element count.
const COUNT_SIZE: usize = size_of::<usize>();

/// Handle to a single object allocated with [`new_object`].
///
/// Not `Clone`: deleting consumes the handle.
pub struct Typed<T> {
    /// Where the object lives.
    allocation: Allocation,
    /// Marker for T.
    _phantom: PhantomData<T>,
}

impl<T> Typed<T> {
    /// Returns the underlying allocation.
    #[inline]
    #[must_use]
    pub const fn allocation(&self) -> Allocation {
        self.allocation
    }
}

/// Handle to an array allocated with [`new_array`] or [`new_array_with`].
///
/// Points at the first element, not at the block start.
pub struct TypedArray<T> {
    /// Where the first element lives.
    first: Allocation,
    /// Marker for T.
    _phantom: PhantomData<T>,
}

impl<T> TypedArray<T> {
    /// Returns the allocation handle of the first element.
    #[inline]
    #[must_use]
    pub const fn first(&self) -> Allocation {
        self.first
    }
}

/// Number of whole elements needed in front of an array to hold its count.
///
/// # Panics
///
/// Panics for zero-sized `T`.
#[inline]
#[must_use]
pub fn header_slots<T>() -> usize {
    let element = size_of::<T>();
    assert!(element != 0, "arrays of zero-sized types are not supported");
    COUNT_SIZE.div_ceil(element)
}

/// Allocates room for `value` and moves it into the arena.
///
/// # Errors
///
/// [`AllocError::OutOfSpace`](crate::AllocError::OutOfSpace) if the allocator
/// cannot fit a `T`.
pub fn new_object<T: Pod, A: Allocator + ?Sized>(
    allocator: &mut A,
    value: T,
) -> AllocResult<Typed<T>> {
    let allocation = allocator.allocate(size_of::<T>().max(1), align_of::<T>())?;
    allocator
        .bytes_mut(allocation, size_of::<T>())
        .copy_from_slice(bytemuck::bytes_of(&value));

    Ok(Typed {
        allocation,
        _phantom: PhantomData,
    })
}

/// Borrows the object behind `handle`.
#[inline]
#[must_use]
pub fn object<'a, T: Pod, A: Allocator + ?Sized>(allocator: &'a A, handle: &Typed<T>) -> &'a T {
    bytemuck::from_bytes(allocator.bytes(handle.allocation, size_of::<T>()))
}

/// Mutably borrows the object behind `handle`.
#[inline]
pub fn object_mut<'a, T: Pod, A: Allocator + ?Sized>(
    allocator: &'a mut A,
    handle: &Typed<T>,
) -> &'a mut T {
    bytemuck::from_bytes_mut(allocator.bytes_mut(handle.allocation, size_of::<T>()))
}

/// Moves the object out of the arena and frees its memory.
pub fn delete_object<T: Pod, A: Allocator + ?Sized>(allocator: &mut A, handle: Typed<T>) -> T {
    let value = bytemuck::pod_read_unaligned(allocator.bytes(handle.allocation, size_of::<T>()));
    allocator.deallocate(handle.allocation);
    value
}

/// Allocates an array of `len` elements, building element `i` with `init(i)`.
///
/// `init` runs exactly once per element, in index order.
///
/// # Errors
///
/// [`AllocError::OutOfSpace`](crate::AllocError::OutOfSpace) if the array plus
/// its count header does not fit. `init` is not called in that case.
///
/// # Panics
///
/// Panics if `len` is zero or `T` is zero-sized.
pub fn new_array_with<T, A, F>(
    allocator: &mut A,
    len: usize,
    mut init: F,
) -> AllocResult<TypedArray<T>>
where
    T: Pod,
    A: Allocator + ?Sized,
    F: FnMut(usize) -> T,
{
    assert!(len != 0, "array length must be non-zero");

    let element = size_of::<T>();
    let slots = header_slots::<T>();
    let bytes = len.saturating_add(slots).saturating_mul(element);

    let block = allocator.allocate(bytes, align_of::<T>())?;
    let first = Allocation::at(allocator.start(), block.offset() + slots * element);

    let arena = allocator.arena_mut();
    arena[first.offset() - COUNT_SIZE..first.offset()]
        .copy_from_slice(&len.to_ne_bytes());
    for index in 0..len {
        let offset = first.offset() + index * element;
        arena[offset..offset + element]
            .copy_from_slice(bytemuck::bytes_of(&init(index)));
    }

    Ok(TypedArray {
        first,
        _phantom: PhantomData,
    })
}

/// Allocates an array of `len` default elements.
///
/// # Errors
///
/// Same as [`new_array_with`].
pub fn new_array<T: Pod + Default, A: Allocator + ?Sized>(
    allocator: &mut A,
    len: usize,
) -> AllocResult<TypedArray<T>> {
    new_array_with(allocator, len, |_| T::default())
}

/// Reads the element count stored in front of `array`.
#[inline]
#[must_use]
pub fn array_len<T, A: Allocator + ?Sized>(allocator: &A, array: &TypedArray<T>) -> usize {
    let offset = array.first.offset();
    bytemuck::pod_read_unaligned(&allocator.arena()[offset - COUNT_SIZE..offset])
}

/// Borrows the elements of `array`.
#[must_use]
pub fn array<'a, T: Pod, A: Allocator + ?Sized>(
    allocator: &'a A,
    array: &TypedArray<T>,
) -> &'a [T] {
    let len = array_len(allocator, array);
    bytemuck::cast_slice(allocator.bytes(array.first, len * size_of::<T>()))
}

/// Mutably borrows the elements of `array`.
pub fn array_mut<'a, T: Pod, A: Allocator + ?Sized>(
    allocator: &'a mut A,
    array: &TypedArray<T>,
) -> &'a mut [T] {
    let len = array_len(allocator, array);
    bytemuck::cast_slice_mut(allocator.bytes_mut(array.first, len * size_of::<T>()))
}

/// Moves every element out to `destroy`, then frees the whole block.
///
/// `destroy` runs exactly once per element, in index order. The block is
/// released from its true start, in front of the count header.
pub fn delete_array_with<T, A, F>(allocator: &mut A, array: TypedArray<T>, mut destroy: F)
where
    T: Pod,
    A: Allocator + ?Sized,
    F: FnMut(T),
{
    let element = size_of::<T>();
    let len = array_len(allocator, &array);

    for index in 0..len {
        let offset = array.first.offset() + index * element;
        destroy(bytemuck::pod_read_unaligned(&allocator.arena()[offset..offset + element]));
    }

    let block_start = array.first.offset() - header_slots::<T>() * element;
    let block = Allocation::at(allocator.start(), block_start);
    allocator.deallocate(block);
}

/// Discards every element of `array` and frees the block.
pub fn delete_array<T: Pod, A: Allocator + ?Sized>(allocator: &mut A, array: TypedArray<T>) {
    delete_array_with(allocator, array, |_| {});
}
