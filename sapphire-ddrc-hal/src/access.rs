//! # Register access over the DDR configuration bridge
//!
//! The bridge sits on an I2C bus. A write transfer carries a register select byte followed by a
//! little-endian 32-bit payload. Selecting the address register latches the configuration word
//! address, selecting the data register writes the addressed word. A 4 byte read transfer
//! returns the addressed word, little-endian.
//!
//! Framing, acknowledge checking and the stop condition after an aborted transfer are handled by
//! the [embedded_hal::i2c::I2c] implementation.
use arbitrary_int::{Number, u4};
use embedded_hal::i2c::{ErrorKind, I2c, NoAcknowledgeSource};
use sapphire_ddrc::{
    BRIDGE_I2C_ADDR, BRIDGE_SELECT_ADDR, BRIDGE_SELECT_DATA, COMMAND_ISSUE, UPDATE_REQUEST,
    regs::{CommandIssue, UpdateRequest},
};

/// Polls of the command issue register before giving up.
pub const COMMAND_POLL_LIMIT: u32 = 32;
/// Polls of the update request register before giving up.
pub const UPDATE_POLL_LIMIT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("transfer not acknowledged: {0}")]
    Nack(NoAcknowledgeSource),
    #[error("transport error: {0}")]
    Transport(ErrorKind),
    #[error("register {addr:#x} still busy after {polls} polls")]
    Timeout { addr: u32, polls: u32 },
}

impl AccessError {
    /// Classify an error of the I2C transport.
    pub fn from_i2c<E: embedded_hal::i2c::Error>(err: E) -> Self {
        match err.kind() {
            ErrorKind::NoAcknowledge(source) => AccessError::Nack(source),
            kind => AccessError::Transport(kind),
        }
    }
}

/// Register access helpers for the DDR configuration space.
pub struct DdrcAccess<I2C> {
    i2c: I2C,
    dev_addr: u8,
}

impl<I2C: I2c> DdrcAccess<I2C> {
    /// Access the bridge at its default address [BRIDGE_I2C_ADDR].
    pub fn new(i2c: I2C) -> Self {
        Self::new_with_dev_addr(i2c, BRIDGE_I2C_ADDR)
    }

    pub fn new_with_dev_addr(i2c: I2C, dev_addr: u8) -> Self {
        Self { i2c, dev_addr }
    }

    /// Release the I2C transport.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_select(&mut self, select: u8, value: u32) -> Result<(), AccessError> {
        let payload = value.to_le_bytes();
        self.i2c
            .write(
                self.dev_addr,
                &[select, payload[0], payload[1], payload[2], payload[3]],
            )
            .map_err(AccessError::from_i2c)
    }

    /// Latch a configuration word address.
    #[inline]
    pub fn write_addr(&mut self, addr: u32) -> Result<(), AccessError> {
        self.write_select(BRIDGE_SELECT_ADDR, addr)
    }

    /// Write the configuration word at the latched address.
    #[inline]
    pub fn write_data(&mut self, data: u32) -> Result<(), AccessError> {
        self.write_select(BRIDGE_SELECT_DATA, data)
    }

    pub fn write_addr_data(&mut self, addr: u32, data: u32) -> Result<(), AccessError> {
        self.write_addr(addr)?;
        self.write_data(data)
    }

    /// Read the configuration word at the latched address.
    pub fn read_data(&mut self) -> Result<u32, AccessError> {
        let mut buf = [0u8; 4];
        self.i2c
            .read(self.dev_addr, &mut buf)
            .map_err(AccessError::from_i2c)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_addr_data(&mut self, addr: u32) -> Result<u32, AccessError> {
        self.write_addr(addr)?;
        self.read_data()
    }

    /// Issue a controller command and poll for completion.
    ///
    /// The command index is clamped to 15. Returns [AccessError::Timeout] if the busy bit is still
    /// set after [COMMAND_POLL_LIMIT] polls.
    pub fn issue_command(&mut self, index: u8) -> Result<(), AccessError> {
        let cmd = CommandIssue::DEFAULT
            .with_busy(true)
            .with_index(u4::new(index.min(u4::MAX.value())));
        self.write_addr_data(COMMAND_ISSUE, cmd.raw_value())?;
        // The address stays latched, so only the data register needs to be read.
        for _ in 0..COMMAND_POLL_LIMIT {
            if !CommandIssue::new_with_raw_value(self.read_data()?).busy() {
                return Ok(());
            }
        }
        Err(AccessError::Timeout {
            addr: COMMAND_ISSUE,
            polls: COMMAND_POLL_LIMIT,
        })
    }

    /// Request the controller to adopt the staged configuration and poll for completion.
    ///
    /// Returns [AccessError::Timeout] if the request bit did not clear after
    /// [UPDATE_POLL_LIMIT] polls.
    pub fn apply_config_update(&mut self) -> Result<(), AccessError> {
        self.write_addr_data(
            UPDATE_REQUEST,
            UpdateRequest::DEFAULT
                .with_request(true)
                .raw_value(),
        )?;
        for _ in 0..UPDATE_POLL_LIMIT {
            if !UpdateRequest::new_with_raw_value(self.read_addr_data(UPDATE_REQUEST)?).request() {
                return Ok(());
            }
        }
        Err(AccessError::Timeout {
            addr: UPDATE_REQUEST,
            polls: UPDATE_POLL_LIMIT,
        })
    }
}
