//! # Register map of the Sapphire SoC DDR controller
//!
//! The DDR controller of the Efinix Sapphire SoC is not memory mapped. Its configuration space is
//! reached through a small bridge on the I2C bus: a 32-bit word address is written to the address
//! register of the bridge, after which the data register of the bridge reads or writes the
//! addressed configuration word.
//!
//! This crate only describes that configuration space: word addresses, per-slice register blocks
//! and the bit layout of the registers touched during access-timing calibration.
#![no_std]

use static_assertions::const_assert;

pub mod regs;

/// 7-bit I2C address of the DDR configuration bridge.
pub const BRIDGE_I2C_ADDR: u8 = 0x41;

/// Register select byte for the data register of the bridge.
pub const BRIDGE_SELECT_DATA: u8 = 0x00;
/// Register select byte for the address register of the bridge.
pub const BRIDGE_SELECT_ADDR: u8 = 0x01;

/// Maximum number of byte lanes (slices) of the data bus.
pub const MAX_SLICES: usize = 4;

/// Word distance between two per-slice register blocks.
pub const SLICE_STRIDE: u32 = 0x10;

/// Per-slice register offsets, relative to the start of a slice block.
pub mod slice {
    /// Read DQS delay, see [crate::regs::ReadDqsDelay].
    pub const READ_DQS: u32 = 0x00;
    /// Write leveling strobe trigger, see [crate::regs::WriteLevelCtrl].
    pub const WRLVL_CTRL: u32 = 0x01;
    /// Gate coarse position, see [crate::regs::GateCoarse].
    pub const GATE_COARSE: u32 = 0x02;
    /// Delay line settings, see [crate::regs::SliceDelay].
    pub const DELAY: u32 = 0x05;
    /// Gate training control, see [crate::regs::GateTrainingCtrl].
    pub const GATE_TRAINING: u32 = 0x0B;
    /// Gate training result, see [crate::regs::GateStatus].
    pub const GATE_STATUS: u32 = 0x0C;
    /// Write leveling result, see [crate::regs::WriteLevelStatus].
    pub const WRLVL_STATUS: u32 = 0x0F;
}

/// Command/address delay, see [regs::CaDelay].
pub const CA_DELAY: u32 = 0x45;
/// Command/address training status. Must be read before [CA_PATTERN] to latch the pattern.
pub const CA_STATUS: u32 = 0x53;
/// Training mode select, see [regs::TrainingMode].
pub const TRAINING_MODE: u32 = 0x59;
/// Command/address training pattern readback.
pub const CA_PATTERN: u32 = 0x5B;
/// Command issue register, see [regs::CommandIssue].
pub const COMMAND_ISSUE: u32 = 0x0412;
/// First command payload word, see [regs::CommandWord0].
pub const COMMAND_WORD0: u32 = 0x0420;
/// Second command payload word, see [regs::CommandWord1].
pub const COMMAND_WORD1: u32 = 0x0430;
/// PHY mode register.
pub const PHY_MODE: u32 = 0x0480;
/// Configuration update request, see [regs::UpdateRequest].
pub const UPDATE_REQUEST: u32 = 0x0483;

// The shared registers must not alias any per-slice block.
const_assert!(SLICE_STRIDE * MAX_SLICES as u32 <= CA_DELAY);
const_assert!(slice::WRLVL_STATUS < SLICE_STRIDE);

/// Word address of a register inside the block of the given slice.
///
/// The slice index is not checked against [MAX_SLICES].
#[inline]
pub const fn slice_reg(slice: usize, offset: u32) -> u32 {
    offset + SLICE_STRIDE * slice as u32
}
