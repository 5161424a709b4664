//! Calibration configuration.
//!
//! The configuration is selected once at start-up and passed into the
//! [Calibrator](crate::training::Calibrator).
use core::iter::StepBy;
use core::ops::Range;

use sapphire_ddrc::MAX_SLICES;

use crate::memtest::DEFAULT_WINDOW_WORDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Ddr3,
    Lpddr3,
}

/// Number of active byte lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceCount {
    /// 8 bit data bus.
    One = 1,
    /// 16 bit data bus.
    Two = 2,
    /// 32 bit data bus.
    Four = 4,
}

impl SliceCount {
    #[inline]
    pub const fn count(&self) -> usize {
        *self as usize
    }

    #[inline]
    pub const fn is_active(&self, slice: usize) -> bool {
        slice < self.count()
    }
}

/// Phase correction applied to a detected gate edge, in fine steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOffset {
    QuarterCycle = 64,
    HalfCycle = 128,
}

impl GateOffset {
    #[inline]
    pub const fn fine_steps(&self) -> u8 {
        *self as u8
    }
}

/// Handling of transport errors and command timeouts during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// Log the error and continue. A failed read returns 0.
    #[default]
    Lenient,
    /// Abort calibration with the error.
    Strict,
}

/// Ascending half-open sweep range with a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    pub start: u8,
    pub end: u8,
    pub step: u8,
}

impl SweepRange {
    /// A step of 0 is treated as 1.
    pub const fn new(start: u8, end: u8, step: u8) -> Self {
        Self { start, end, step }
    }

    pub fn iter(&self) -> StepBy<Range<u8>> {
        (self.start..self.end).step_by(core::cmp::max(self.step, 1) as usize)
    }

    /// Last candidate of the sweep, [None] for an empty range.
    pub fn last(&self) -> Option<u8> {
        self.iter().last()
    }
}

impl IntoIterator for SweepRange {
    type Item = u8;
    type IntoIter = StepBy<Range<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub const CA_SWEEP: SweepRange = SweepRange::new(0x00, 0xBF, 1);
pub const WRITE_LEVEL_SWEEP: SweepRange = SweepRange::new(0x00, 0xBF, 2);
pub const GATE_FINE_SWEEP: SweepRange = SweepRange::new(0x00, 0x7F, 4);
pub const LPDDR3_GATE_COARSE_SWEEP: SweepRange = SweepRange::new(2, 6, 1);
pub const DDR3_GATE_COARSE_SWEEP: SweepRange = SweepRange::new(0, 3, 1);
pub const READ_LEVEL_SWEEP: SweepRange = SweepRange::new(0x00, 0xA0, 2);

/// Minimum width of the read leveling pass window.
pub const READ_MIN_WINDOW: u8 = 0x10;

/// Distance between a strobe delay and its data delay.
pub const QUARTER_CYCLE_DELAY: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    pub family: DeviceFamily,
    pub slices: SliceCount,
    pub gate_offset: GateOffset,
    pub policy: AccessPolicy,
    /// Run command/address training. Only supported for LPDDR3.
    pub ca_training: bool,
    pub write_leveling: bool,
    pub ca_sweep: SweepRange,
    pub write_level_sweep: SweepRange,
    pub gate_coarse_sweep: SweepRange,
    pub gate_fine_sweep: SweepRange,
    pub read_level_sweep: SweepRange,
    pub read_min_window: u8,
    /// Words exercised per read leveling candidate.
    pub read_test_words: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::new_lpddr3()
    }
}

impl CalibrationConfig {
    /// LPDDR3 on a 16 bit bus with read calibration only.
    pub const fn new_lpddr3() -> Self {
        Self {
            family: DeviceFamily::Lpddr3,
            slices: SliceCount::Two,
            gate_offset: GateOffset::QuarterCycle,
            policy: AccessPolicy::Lenient,
            ca_training: false,
            write_leveling: false,
            ca_sweep: CA_SWEEP,
            write_level_sweep: WRITE_LEVEL_SWEEP,
            gate_coarse_sweep: LPDDR3_GATE_COARSE_SWEEP,
            gate_fine_sweep: GATE_FINE_SWEEP,
            read_level_sweep: READ_LEVEL_SWEEP,
            read_min_window: READ_MIN_WINDOW,
            read_test_words: DEFAULT_WINDOW_WORDS,
        }
    }

    /// DDR3 on a 16 bit bus with read calibration only.
    pub const fn new_ddr3() -> Self {
        Self {
            family: DeviceFamily::Ddr3,
            gate_coarse_sweep: DDR3_GATE_COARSE_SWEEP,
            ..Self::new_lpddr3()
        }
    }

    pub const fn with_slices(mut self, slices: SliceCount) -> Self {
        self.slices = slices;
        self
    }

    pub const fn with_gate_offset(mut self, gate_offset: GateOffset) -> Self {
        self.gate_offset = gate_offset;
        self
    }

    pub const fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn with_ca_training(mut self, enable: bool) -> Self {
        self.ca_training = enable;
        self
    }

    pub const fn with_write_leveling(mut self, enable: bool) -> Self {
        self.write_leveling = enable;
        self
    }

    pub const fn with_read_test_words(mut self, words: usize) -> Self {
        self.read_test_words = words;
        self
    }

    /// Iterator over the indices of the active slices.
    #[inline]
    pub fn active_slices(&self) -> Range<usize> {
        0..core::cmp::min(self.slices.count(), MAX_SLICES)
    }
}
