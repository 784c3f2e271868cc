/// mask with the lower `width` bits set. `width` may be 32.
#[inline]
pub const fn low_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// logical right shift which yields 0 instead of overflowing when `amount` is 32.
#[inline]
pub const fn shr(bin: u32, amount: u32) -> u32 {
    if amount >= 32 {
        0
    } else {
        bin >> amount
    }
}

/// extracts `width` bits of `bin` starting from bit `from`.
#[inline]
pub const fn extract(bin: u32, from: u32, width: u32) -> u32 {
    shr(bin, from) & low_mask(width)
}

/// `log2(v)` if `v` is a positive power of two.
#[inline]
pub const fn log2_exact(v: u32) -> Option<u32> {
    if v.is_power_of_two() {
        Some(v.trailing_zeros())
    } else {
        None
    }
}
