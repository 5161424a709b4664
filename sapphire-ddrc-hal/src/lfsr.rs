//! 32-bit Fibonacci LFSR used to generate memory test patterns.
//!
//! Taps: 32, 30, 26, 25. Feedback polynomial: x^32 + x^30 + x^26 + x^25 + 1. In the shift
//! register's own bit order the taps are bits 0, 2, 6 and 7. The register shifts right and the
//! feedback bit enters at bit 31.

/// Seed used when the generator state is zero.
pub const DEFAULT_SEED: u32 = 0x123A_BC99;

/// LFSR iterations per generated test word.
pub const STEPS_PER_WORD: u32 = 2;

/// Advance the LFSR state `count` times and return the new state.
///
/// The new state is also the generated value. A nonzero state never produces zero.
#[inline]
pub const fn lfsr_next(state: u32, count: u32) -> u32 {
    let mut lfsr = state;
    let mut n = 0;
    while n < count {
        let bit = (lfsr ^ (lfsr >> 2) ^ (lfsr >> 6) ^ (lfsr >> 7)) & 1;
        lfsr = (lfsr >> 1) | (bit << 31);
        n += 1;
    }
    lfsr
}

/// Seed-chained pattern generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lfsr32 {
    state: u32,
}

impl Default for Lfsr32 {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl Lfsr32 {
    /// Create a generator. A zero seed is replaced by [DEFAULT_SEED], the all-zero state is a
    /// fixed point of the LFSR.
    #[inline]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }

    #[inline]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Generate the next test word.
    #[inline]
    pub fn next_word(&mut self) -> u32 {
        self.advance(STEPS_PER_WORD)
    }

    /// Advance the state `count` times and return the new state.
    #[inline]
    pub fn advance(&mut self, count: u32) -> u32 {
        self.state = lfsr_next(self.state, count);
        self.state
    }
}
