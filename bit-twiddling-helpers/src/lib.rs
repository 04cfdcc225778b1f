//! Helpers for converting between native integers and zerocopy endian-aware integers,
//! and for reading/writing arbitrary bit ranges inside a slice of little-endian words.

pub mod conv_u64le {
    use zerocopy::{LE, U64};
    pub const fn from_inner(n: u64) -> U64<LE> {
        U64::<LE>::new(n)
    }
    pub const fn into_inner(v: U64<LE>) -> u64 {
        v.get()
    }
}

pub mod conv_u32le {
    use zerocopy::{LE, U32};
    pub const fn from_inner(n: u32) -> U32<LE> {
        U32::<LE>::new(n)
    }
    pub const fn into_inner(v: U32<LE>) -> u32 {
        v.get()
    }
}

pub mod conv_u16le {
    use zerocopy::{LE, U16};
    pub const fn from_inner(n: u16) -> U16<LE> {
        U16::<LE>::new(n)
    }
    pub const fn into_inner(v: U16<LE>) -> u16 {
        v.get()
    }
}

/// Bit range access over `[U32<LE>]` word arrays.
///
/// Bit `n` of the record lives in word `n / 32` at position `n % 32`.
/// A range may straddle two neighbouring words, but is never wider than 32 bits.
pub mod words {
    use zerocopy::{LE, U32};

    /// Bits per storage word.
    pub const WORD_BITS: u32 = 32;

    /// A mask with the lowest `width` bits set.
    #[inline]
    pub const fn low_mask(width: u32) -> u64 {
        if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        }
    }

    /// Number of words needed to hold `bits` bits.
    #[inline]
    pub const fn words_for_bits(bits: u32) -> usize {
        bits.div_ceil(WORD_BITS) as usize
    }

    /// Reads the two-word window starting at `index` as a u64 (missing high word is zero).
    #[inline]
    fn window(words: &[U32<LE>], index: usize) -> u64 {
        let low = u64::from(words[index].get());
        let high = words.get(index + 1).map_or(0, |w| u64::from(w.get()));
        low | (high << WORD_BITS)
    }

    /// Reads `width` bits starting at absolute bit `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside of `words`.
    /// Callers are expected to have validated their ranges against the record length up front.
    #[inline]
    pub fn read(words: &[U32<LE>], offset: u32, width: u32) -> u32 {
        debug_assert!(width > 0 && width <= WORD_BITS);
        let index = (offset / WORD_BITS) as usize;
        let shift = offset % WORD_BITS;
        let value = (window(words, index) >> shift) & low_mask(width);
        // Guaranteed to fit since width <= 32
        u32::try_from(value).unwrap_or(u32::MAX)
    }

    /// Writes the lowest `width` bits of `value` at absolute bit `offset`,
    /// leaving every other bit untouched.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside of `words`.
    #[inline]
    pub fn write(words: &mut [U32<LE>], offset: u32, width: u32, value: u32) {
        debug_assert!(width > 0 && width <= WORD_BITS);
        let index = (offset / WORD_BITS) as usize;
        let shift = offset % WORD_BITS;
        let mask = low_mask(width) << shift;
        let bits = (u64::from(value) << shift) & mask;
        let updated = (window(words, index) & !mask) | bits;

        words[index] = U32::new(lower_half(updated));
        if shift + width > WORD_BITS {
            words[index + 1] = U32::new(lower_half(updated >> WORD_BITS));
        }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    const fn lower_half(value: u64) -> u32 {
        // Truncation is the point here
        value as u32
    }

}
