//! # Alignment Arithmetic
//!
//! Stateless address math shared by every allocator. All functions expect a
//! power-of-two `alignment`.

/// Rounds `address` up to the next multiple of `alignment`.
#[inline]
#[must_use]
pub const fn align_forward(address: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (address + (alignment - 1)) & !(alignment - 1)
}

/// Rounds `address` down to the previous multiple of `alignment`.
#[inline]
#[must_use]
pub const fn align_backward(address: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    address & !(alignment - 1)
}

/// Returns true if `address` is a multiple of `alignment`.
#[inline]
#[must_use]
pub const fn is_aligned(address: usize, alignment: usize) -> bool {
    address & (alignment - 1) == 0
}

/// Bytes to add to `address` to reach the next aligned address.
///
/// Zero when `address` is already aligned.
#[inline]
#[must_use]
pub const fn align_forward_adjustment(address: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    let misalignment = address & (alignment - 1);
    if misalignment == 0 {
        0
    } else {
        alignment - misalignment
    }
}

/// Forward adjustment that also leaves at least `header_size` bytes in front
/// of the aligned address.
///
/// The plain adjustment is grown in whole multiples of `alignment`, so the
/// result stays aligned.
#[inline]
#[must_use]
pub const fn align_forward_adjustment_with_header(
    address: usize,
    alignment: usize,
    header_size: usize,
) -> usize {
    let mut adjustment = align_forward_adjustment(address, alignment);

    if adjustment < header_size {
        let needed = header_size - adjustment;
        adjustment += alignment * (needed / alignment);
        if needed % alignment > 0 {
            adjustment += alignment;
        }
    }

    adjustment
}

/// Bytes to subtract from `address` to reach the previous aligned address.
#[inline]
#[must_use]
pub const fn align_backward_adjustment(address: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    address & (alignment - 1)
}
