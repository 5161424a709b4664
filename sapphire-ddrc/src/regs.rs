//! Bit layouts of the calibration related configuration registers.
use arbitrary_int::{u3, u4};

/// Per-slice read DQS delay register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct ReadDqsDelay {
    #[bits(16..=23, rw)]
    read_dqs: u8,
}

/// Per-slice write leveling control register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct WriteLevelCtrl {
    /// Writing 1 sends one write leveling strobe and latches the result into
    /// [WriteLevelStatus].
    #[bit(0, rw)]
    strobe: bool,
}

/// Per-slice gate coarse position register.
///
/// The coarse position is split: the upper three bits live in bits 0..=2 and the LSB in bit 29.
/// Use [GateCoarse::coarse] and [GateCoarse::with_coarse] to access the combined value.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct GateCoarse {
    #[bit(29, rw)]
    coarse_lsb: bool,
    #[bits(0..=2, rw)]
    coarse_upper: u3,
}

impl GateCoarse {
    /// Largest coarse position which can be encoded.
    pub const MAX_COARSE: u8 = 0xF;

    /// Combined 4-bit coarse position.
    #[inline]
    pub fn coarse(&self) -> u8 {
        (self.coarse_upper().value() << 1) | self.coarse_lsb() as u8
    }

    /// Set the combined coarse position. Bits above [Self::MAX_COARSE] are dropped.
    #[inline]
    pub fn with_coarse(self, coarse: u8) -> Self {
        self.with_coarse_upper(u3::new((coarse >> 1) & 0b111))
            .with_coarse_lsb(coarse & 0b1 != 0)
    }
}

/// Per-slice delay line register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct SliceDelay {
    /// Read gate fine position.
    #[bits(24..=31, rw)]
    gate_fine: u8,
    #[bits(16..=23, rw)]
    write_dqs: u8,
    /// Write DQ delay. Calibration places it a quarter cycle after [Self::write_dqs].
    #[bits(8..=15, rw)]
    write_dq: u8,
    #[bits(0..=7, rw)]
    read_dq: u8,
}

/// Per-slice gate training control register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct GateTrainingCtrl {
    #[bit(12, rw)]
    enable: bool,
}

/// Per-slice gate training result.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct GateStatus {
    #[bits(16..=23, r)]
    result: u8,
}

impl GateStatus {
    /// The read gate captured the expected calibration pattern.
    #[inline]
    pub fn passed(&self) -> bool {
        self.result() == 1
    }
}

/// Per-slice write leveling result.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct WriteLevelStatus {
    /// DQS sampled the clock high.
    #[bit(4, r)]
    result: bool,
}

/// Command/address delay register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct CaDelay {
    #[bits(16..=23, rw)]
    cmd_delay: u8,
    /// Calibration places it a quarter cycle after [Self::cmd_delay].
    #[bits(8..=15, rw)]
    cmd_data_delay: u8,
}

impl CaDelay {
    /// Reset value, also used between the two CA training sweeps.
    pub const RESET: Self = Self::new_with_raw_value(0x2000_4040);
}

/// Command issue register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct CommandIssue {
    /// Set by software to start the command, cleared by hardware on completion.
    #[bit(4, rw)]
    busy: bool,
    #[bits(0..=3, rw)]
    index: u4,
}

/// Configuration update request register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct UpdateRequest {
    /// Set by software to adopt the staged configuration, self-clearing.
    #[bit(0, rw)]
    request: bool,
}

/// First command payload word.
///
/// For LPDDR3 mode register writes, [Self::mode_addr] holds the mode register address. For DDR3
/// mode register sets it holds the lower byte of the opcode.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct CommandWord0 {
    #[bits(24..=31, rw)]
    mode_addr: u8,
    #[bits(9..=11, rw)]
    ca_low: u3,
}

impl CommandWord0 {
    /// Base value of a mode register access.
    pub const MODE_REG: Self = Self::new_with_raw_value(0x00FF_F001);
    /// DDR3 read command.
    pub const DDR3_READ: Self = Self::new_with_raw_value(0x00FF_FA01);
    /// LPDDR3 command/address training pattern command.
    pub const CA_PATTERN: Self = Self::new_with_raw_value(0xABFF_EA00);
}

/// Second command payload word of an LPDDR3 command.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct CommandWord1 {
    #[bits(12..=15, rw)]
    wait: u4,
    #[bit(8, rw)]
    ca3: bool,
    #[bits(0..=7, rw)]
    op: u8,
}

impl CommandWord1 {
    /// Second word of the LPDDR3 command/address training pattern command.
    pub const CA_PATTERN: Self = Self::new_with_raw_value(0x0000_A550);
}

/// Second command payload word of a DDR3 mode register set.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct Ddr3CommandWord1 {
    #[bits(8..=10, rw)]
    mode_reg: u3,
    #[bits(0..=7, rw)]
    op_high: u8,
}

/// Training mode select values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive)]
#[repr(u32)]
pub enum TrainingMode {
    Off = 0x00,
    CaTraining = 0x01,
    WriteLeveling = 0x02,
    GateLeveling = 0x14,
}

/// PHY mode values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive)]
#[repr(u32)]
pub enum PhyMode {
    Normal = 0x0020_A0A0,
    /// Calibration pattern capture enabled.
    Training = 0x0210_A0A0,
}

/// Expected [crate::CA_PATTERN] readback while MR41 CA training is active.
pub const CA_PATTERN_MR41: u32 = 0x9959;
/// Expected [crate::CA_PATTERN] readback while MR48 CA training is active.
pub const CA_PATTERN_MR48: u32 = 0x0101;
