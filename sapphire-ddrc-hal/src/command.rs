//! Memory device commands sent through the controller command registers.
use arbitrary_int::{u3, u4};
use sapphire_ddrc::regs::{CommandWord0, CommandWord1, Ddr3CommandWord1};

/// Command slot used for all calibration commands.
pub const COMMAND_SLOT: u8 = 0;

/// Wait cycles programmed into LPDDR3 commands.
const LPDDR3_COMMAND_WAIT: u4 = u4::new(4);

/// Payload of the two command words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand {
    pub word0: u32,
    pub word1: u32,
}

impl DeviceCommand {
    /// LPDDR3 mode register command.
    ///
    /// `ca30` carries command/address bits 3..=0 of the command, `mode_addr` the mode register
    /// address and `op` the opcode.
    pub fn lpddr3_mode_reg(ca30: u8, mode_addr: u8, op: u8) -> Self {
        Self {
            word0: CommandWord0::MODE_REG
                .with_ca_low(u3::new(ca30 & 0b111))
                .with_mode_addr(mode_addr)
                .raw_value(),
            word1: CommandWord1::DEFAULT
                .with_op(op)
                .with_ca3((ca30 >> 3) & 0b1 != 0)
                .with_wait(LPDDR3_COMMAND_WAIT)
                .raw_value(),
        }
    }

    /// LPDDR3 mode register write.
    #[inline]
    pub fn lpddr3_mrw(mode_addr: u8, op: u8) -> Self {
        Self::lpddr3_mode_reg(0x00, mode_addr, op)
    }

    /// LPDDR3 mode register read.
    #[inline]
    pub fn lpddr3_mrr(mode_addr: u8) -> Self {
        Self::lpddr3_mode_reg(0x08, mode_addr, 0x00)
    }

    /// DDR3 mode register set with a 13 bit opcode.
    pub fn ddr3_mrs(mode_reg: u8, op: u16) -> Self {
        let op = op & 0x1FFF;
        Self {
            word0: CommandWord0::MODE_REG
                .with_mode_addr((op & 0xFF) as u8)
                .raw_value(),
            word1: Ddr3CommandWord1::DEFAULT
                .with_mode_reg(u3::new(mode_reg & 0b111))
                .with_op_high((op >> 8) as u8)
                .raw_value(),
        }
    }

    /// DDR3 read, used as gate training stimulus.
    pub const fn ddr3_read() -> Self {
        Self {
            word0: CommandWord0::DDR3_READ.raw_value(),
            word1: 0,
        }
    }

    /// LPDDR3 command/address training pattern.
    pub const fn lpddr3_ca_pattern() -> Self {
        Self {
            word0: CommandWord0::CA_PATTERN.raw_value(),
            word1: CommandWord1::CA_PATTERN.raw_value(),
        }
    }
}

/// LPDDR3 mode register commands used by calibration.
pub mod lpddr3 {
    use super::DeviceCommand;

    /// MR2 with RL6/WL3 (up to 400 MHz) and write leveling enabled.
    pub fn write_leveling_enter() -> DeviceCommand {
        DeviceCommand::lpddr3_mrw(0x02, 0x84)
    }

    /// MR2 with RL6/WL3 (up to 400 MHz) and write leveling disabled.
    pub fn write_leveling_exit() -> DeviceCommand {
        DeviceCommand::lpddr3_mrw(0x02, 0x04)
    }

    /// Enter CA training through MR41.
    pub fn ca_training_mr41() -> DeviceCommand {
        DeviceCommand::lpddr3_mrw(41, 0xA4)
    }

    /// Enter CA training through MR48.
    pub fn ca_training_mr48() -> DeviceCommand {
        DeviceCommand::lpddr3_mrw(48, 0xC0)
    }

    /// Leave CA training through MR42.
    pub fn ca_training_exit() -> DeviceCommand {
        DeviceCommand::lpddr3_mrw(42, 0xA8)
    }

    /// Read MR32, the DQ calibration pattern A.
    pub fn read_dq_calibration() -> DeviceCommand {
        DeviceCommand::lpddr3_mrr(32)
    }
}

/// DDR3 mode register commands used by calibration.
pub mod ddr3 {
    use super::DeviceCommand;

    /// MR1 with write leveling enabled.
    pub fn write_leveling_enter() -> DeviceCommand {
        DeviceCommand::ddr3_mrs(1, 0x00A4)
    }

    pub fn write_leveling_exit() -> DeviceCommand {
        DeviceCommand::ddr3_mrs(1, 0x0024)
    }

    /// MR3 with the multi purpose register enabled for reads.
    pub fn mpr_enable() -> DeviceCommand {
        DeviceCommand::ddr3_mrs(3, 0x0004)
    }

    pub fn mpr_disable() -> DeviceCommand {
        DeviceCommand::ddr3_mrs(3, 0x0000)
    }
}
