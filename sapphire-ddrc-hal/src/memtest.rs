//! # Pseudo-random memory exerciser
//!
//! Writes bursts of LFSR generated words into a test window and reads every burst back before
//! the next one is written. Calibration uses it to decide whether a read timing setting works.
use crate::lfsr::Lfsr32;

/// Words written and verified per burst.
pub const BURST_WORDS: usize = 16;

/// Default location of the test window.
pub const DEFAULT_WINDOW_ADDR: usize = 0x0000_1000;

/// Default size of the test window in words.
pub const DEFAULT_WINDOW_WORDS: usize = 128 * BURST_WORDS;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemTestError {
    #[error("memory address is not aligned to 4 bytes")]
    AddrNotAligned,
    #[error("test of {requested} words exceeds window of {available} words")]
    WindowTooSmall { requested: usize, available: usize },
    #[error("word {index} read {found:#010x}, expected {expected:#010x}")]
    Memory {
        index: usize,
        expected: u32,
        found: u32,
    },
}

/// Word addressable memory used by the exerciser.
pub trait TestWindow {
    /// Capacity in 32-bit words.
    fn words(&self) -> usize;

    fn write_word(&mut self, index: usize, value: u32);

    fn read_word(&mut self, index: usize) -> u32;
}

impl<T: TestWindow + ?Sized> TestWindow for &mut T {
    #[inline]
    fn words(&self) -> usize {
        (**self).words()
    }

    #[inline]
    fn write_word(&mut self, index: usize, value: u32) {
        (**self).write_word(index, value)
    }

    #[inline]
    fn read_word(&mut self, index: usize) -> u32 {
        (**self).read_word(index)
    }
}

impl TestWindow for [u32] {
    #[inline]
    fn words(&self) -> usize {
        self.len()
    }

    #[inline]
    fn write_word(&mut self, index: usize, value: u32) {
        self[index] = value;
    }

    #[inline]
    fn read_word(&mut self, index: usize) -> u32 {
        self[index]
    }
}

/// Memory-mapped test window accessed with volatile reads and writes.
#[derive(Debug)]
pub struct MmioWindow {
    base: *mut u32,
    words: usize,
}

unsafe impl Send for MmioWindow {}

impl MmioWindow {
    /// # Safety
    ///
    /// The memory block starting at the base address with the size `words` times 4 is
    /// overwritten by every exerciser run. Nothing else may use it while the window exists.
    pub unsafe fn new(base_addr: usize, words: usize) -> Result<Self, MemTestError> {
        if !base_addr.is_multiple_of(4) {
            return Err(MemTestError::AddrNotAligned);
        }
        Ok(Self {
            base: base_addr as *mut u32,
            words,
        })
    }

    /// Window at [DEFAULT_WINDOW_ADDR] with [DEFAULT_WINDOW_WORDS] words.
    ///
    /// # Safety
    ///
    /// See [Self::new].
    pub const unsafe fn new_fixed() -> Self {
        Self {
            base: DEFAULT_WINDOW_ADDR as *mut u32,
            words: DEFAULT_WINDOW_WORDS,
        }
    }
}

impl TestWindow for MmioWindow {
    #[inline]
    fn words(&self) -> usize {
        self.words
    }

    #[inline]
    fn write_word(&mut self, index: usize, value: u32) {
        assert!(index < self.words);
        // Safety: Index checked above, exclusive use of the block is a constructor contract.
        unsafe { core::ptr::write_volatile(self.base.add(index), value) }
    }

    #[inline]
    fn read_word(&mut self, index: usize) -> u32 {
        assert!(index < self.words);
        // Safety: Index checked above, exclusive use of the block is a constructor contract.
        unsafe { core::ptr::read_volatile(self.base.add(index)) }
    }
}

/// Memory exerciser owning a test window and the pattern generator state.
///
/// The generator state persists across runs, so consecutive runs never repeat a pattern.
pub struct MemoryExerciser<W> {
    window: W,
    lfsr: Lfsr32,
}

impl<W: TestWindow> MemoryExerciser<W> {
    pub fn new(window: W) -> Self {
        Self::new_with_seed(window, 0)
    }

    /// A zero seed selects [crate::lfsr::DEFAULT_SEED].
    pub fn new_with_seed(window: W, seed: u32) -> Self {
        Self {
            window,
            lfsr: Lfsr32::new(seed),
        }
    }

    #[inline]
    pub fn seed(&self) -> u32 {
        self.lfsr.state()
    }

    #[inline]
    pub fn window(&self) -> &W {
        &self.window
    }

    #[inline]
    pub fn release(self) -> W {
        self.window
    }

    /// Run one test over `words` words of the window.
    ///
    /// The test runs `words / BURST_WORDS` bursts, at least one. It stops at the first
    /// mismatching word, leaving the remaining bursts unexecuted and the generator state
    /// partially advanced. After a successful run the state is advanced by one additional
    /// burst-length step to decorrelate the next run.
    pub fn run_test(&mut self, words: usize) -> Result<(), MemTestError> {
        let bursts = core::cmp::max(words / BURST_WORDS, 1);
        let requested = bursts * BURST_WORDS;
        if requested > self.window.words() {
            return Err(MemTestError::WindowTooSmall {
                requested,
                available: self.window.words(),
            });
        }
        let mut burst = [0u32; BURST_WORDS];
        for burst_idx in 0..bursts {
            let base = burst_idx * BURST_WORDS;
            for (offset, word) in burst.iter_mut().enumerate() {
                *word = self.lfsr.next_word();
                self.window.write_word(base + offset, *word);
            }
            for (offset, expected) in burst.iter().enumerate() {
                let found = self.window.read_word(base + offset);
                if found != *expected {
                    return Err(MemTestError::Memory {
                        index: base + offset,
                        expected: *expected,
                        found,
                    });
                }
            }
        }
        self.lfsr.advance(BURST_WORDS as u32);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::lfsr::{DEFAULT_SEED, lfsr_next};
    use std::vec;
    use std::vec::Vec;

    /// Window which silently drops writes to one word.
    struct StuckWordWindow {
        mem: Vec<u32>,
        stuck: usize,
        writes: usize,
        reads: usize,
    }

    impl TestWindow for StuckWordWindow {
        fn words(&self) -> usize {
            self.mem.len()
        }

        fn write_word(&mut self, index: usize, value: u32) {
            self.writes += 1;
            if index != self.stuck {
                self.mem[index] = value;
            }
        }

        fn read_word(&mut self, index: usize) -> u32 {
            self.reads += 1;
            self.mem[index]
        }
    }

    #[test]
    fn undisturbed_window_passes() {
        let mut mem = vec![0u32; 256];
        let mut exerciser = MemoryExerciser::new(mem.as_mut_slice());
        assert_eq!(exerciser.run_test(256), Ok(()));
        let mem = exerciser.release();
        assert_eq!(mem[0], lfsr_next(DEFAULT_SEED, 2));
        assert_eq!(mem[1], lfsr_next(mem[0], 2));
        assert_eq!(mem[255], lfsr_next(mem[254], 2));
    }

    #[test]
    fn seed_mixed_after_success() {
        let mut mem = vec![0u32; 32];
        let mut exerciser = MemoryExerciser::new(mem.as_mut_slice());
        exerciser.run_test(32).unwrap();
        let last_word = exerciser.window()[31];
        assert_eq!(exerciser.seed(), lfsr_next(last_word, BURST_WORDS as u32));
    }

    #[test]
    fn consecutive_runs_use_fresh_patterns() {
        let mut mem = vec![0u32; 16];
        let mut exerciser = MemoryExerciser::new(mem.as_mut_slice());
        exerciser.run_test(16).unwrap();
        let first: Vec<u32> = exerciser.window().to_vec();
        exerciser.run_test(16).unwrap();
        assert_ne!(first.as_slice(), &exerciser.window()[..]);
    }

    #[test]
    fn small_request_runs_one_burst() {
        let mut window = StuckWordWindow {
            mem: vec![0; 64],
            stuck: usize::MAX,
            writes: 0,
            reads: 0,
        };
        let mut exerciser = MemoryExerciser::new(&mut window);
        exerciser.run_test(3).unwrap();
        // Partial bursts are dropped.
        exerciser.run_test(40).unwrap();
        drop(exerciser);
        assert_eq!(window.writes, BURST_WORDS * 3);
        assert_eq!(window.reads, BURST_WORDS * 3);
    }

    #[test]
    fn stuck_word_fails_fast() {
        let mut window = StuckWordWindow {
            mem: vec![0; 128],
            stuck: 37,
            writes: 0,
            reads: 0,
        };
        let mut exerciser = MemoryExerciser::new_with_seed(&mut window, 0x1234_5678);
        match exerciser.run_test(128) {
            Err(MemTestError::Memory { index, found, .. }) => {
                assert_eq!(index, 37);
                assert_eq!(found, 0);
            }
            other => panic!("unexpected result {other:?}"),
        }
        drop(exerciser);
        // The third burst is written completely, but verification stops at the stuck word.
        assert_eq!(window.writes, 3 * BURST_WORDS);
        assert_eq!(window.reads, 2 * BURST_WORDS + 6);
    }

    #[test]
    fn request_larger_than_window_is_rejected() {
        let mut mem = vec![0u32; 32];
        let mut exerciser = MemoryExerciser::new(mem.as_mut_slice());
        assert_eq!(
            exerciser.run_test(48),
            Err(MemTestError::WindowTooSmall {
                requested: 48,
                available: 32
            })
        );
        assert_eq!(exerciser.seed(), DEFAULT_SEED);
    }

    #[test]
    fn unaligned_window_is_rejected() {
        assert_eq!(
            unsafe { MmioWindow::new(0x1002, 16) }.unwrap_err(),
            MemTestError::AddrNotAligned
        );
    }

    #[test]
    fn mismatch_message_names_the_word() {
        use std::string::ToString;
        let err = MemTestError::Memory {
            index: 37,
            expected: 0x1234_5678,
            found: 0,
        };
        assert_eq!(
            err.to_string(),
            "word 37 read 0x00000000, expected 0x12345678"
        );
    }
}
