//! Simulated DDR controller behind the configuration bridge, for unit tests.
//!
//! The register file latches addresses like the bridge does. Update and command requests
//! self-clear unless they are configured to be stuck. The status registers read by calibration
//! are computed from the live register values and the synthetic edges and windows configured
//! on the simulator.
use std::{cell::RefCell, collections::BTreeMap, rc::Rc, vec, vec::Vec};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use sapphire_ddrc::{
    BRIDGE_I2C_ADDR, BRIDGE_SELECT_ADDR, BRIDGE_SELECT_DATA, CA_DELAY, CA_PATTERN, COMMAND_ISSUE,
    COMMAND_WORD0, COMMAND_WORD1, MAX_SLICES, UPDATE_REQUEST,
    regs::{
        CA_PATTERN_MR41, CA_PATTERN_MR48, CaDelay, CommandIssue, CommandWord0, GateCoarse,
        SliceDelay,
    },
    slice, slice_reg,
};

use crate::{command::DeviceCommand, memtest::TestWindow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write(u8, Vec<u8>),
    Read(u8, usize),
}

#[derive(Debug, Default)]
pub struct SimDdrc {
    regs: BTreeMap<u32, u32>,
    latched_addr: u32,
    ca_mode: Option<u8>,
    /// NACK every transfer.
    pub nack: bool,
    /// Command busy bit never clears.
    pub stuck_busy: bool,
    /// Update request bit never clears.
    pub stuck_update: bool,
    pub bus_log: Vec<BusOp>,
    /// Raw values written to the command issue register.
    pub commands: Vec<u32>,
    /// Command payloads at the time of each command issue.
    pub device_commands: Vec<DeviceCommand>,
    pub updates: usize,
    /// Per-slice write DQS delay from which write leveling samples pass.
    pub wrlvl_edge: [Option<u8>; MAX_SLICES],
    /// Per-slice gate position from which gate training samples pass.
    pub gate_edge: [Option<(u8, u8)>; MAX_SLICES],
    /// Inclusive read DQ delay window of slice 0 in which the test window reads back correctly.
    pub read_window: Option<(u8, u8)>,
    /// Inclusive command delay window in which MR41 CA training returns its pattern.
    pub ca_window_mr41: Option<(u8, u8)>,
    /// Inclusive command delay window in which MR48 CA training returns its pattern.
    pub ca_window_mr48: Option<(u8, u8)>,
}

impl SimDdrc {
    pub fn new_shared() -> SharedSim {
        SharedSim(Rc::new(RefCell::new(SimDdrc::default())))
    }

    /// Set a register without going through the bus.
    pub fn poke(&mut self, addr: u32, value: u32) {
        self.regs.insert(addr, value);
    }

    /// Raw register value without going through the bus.
    pub fn peek(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    pub fn slice_delay(&self, slice: usize) -> SliceDelay {
        SliceDelay::new_with_raw_value(self.peek(slice_reg(slice, slice::DELAY)))
    }

    pub fn gate_coarse(&self, slice: usize) -> u8 {
        GateCoarse::new_with_raw_value(self.peek(slice_reg(slice, slice::GATE_COARSE))).coarse()
    }

    /// Whether reads of the test window currently return the written data.
    pub fn read_timing_ok(&self) -> bool {
        let read_dq = self.slice_delay(0).read_dq();
        self.read_window
            .is_some_and(|(first, last)| (first..=last).contains(&read_dq))
    }

    fn read_reg(&self, addr: u32) -> u32 {
        for slice in 0..MAX_SLICES {
            if addr == slice_reg(slice, slice::WRLVL_STATUS) {
                let pass = self.wrlvl_edge[slice]
                    .is_some_and(|edge| self.slice_delay(slice).write_dqs() >= edge);
                return (pass as u32) << 4;
            }
            if addr == slice_reg(slice, slice::GATE_STATUS) {
                let position = (self.gate_coarse(slice), self.slice_delay(slice).gate_fine());
                let pass = self.gate_edge[slice].is_some_and(|edge| position >= edge);
                return (pass as u32) << 16;
            }
        }
        if addr == CA_PATTERN {
            let cmd_delay = CaDelay::new_with_raw_value(self.peek(CA_DELAY)).cmd_delay();
            let in_window =
                |window: Option<(u8, u8)>| window.is_some_and(|(lo, hi)| (lo..=hi).contains(&cmd_delay));
            return match self.ca_mode {
                Some(41) if in_window(self.ca_window_mr41) => CA_PATTERN_MR41,
                Some(48) if in_window(self.ca_window_mr48) => CA_PATTERN_MR48,
                _ => 0,
            };
        }
        self.peek(addr)
    }

    fn write_reg(&mut self, addr: u32, value: u32) {
        match addr {
            UPDATE_REQUEST => {
                self.updates += 1;
                let value = if self.stuck_update { value } else { value & !1 };
                self.poke(addr, value);
            }
            COMMAND_ISSUE => {
                self.commands.push(value);
                let cmd = CommandIssue::new_with_raw_value(value);
                if cmd.busy() {
                    self.execute_command();
                }
                let value = if self.stuck_busy {
                    value
                } else {
                    cmd.with_busy(false).raw_value()
                };
                self.poke(addr, value);
            }
            _ => self.poke(addr, value),
        }
    }

    fn execute_command(&mut self) {
        let word0 = self.peek(COMMAND_WORD0);
        let word1 = self.peek(COMMAND_WORD1);
        self.device_commands.push(DeviceCommand { word0, word1 });
        // Mode register accesses enter and leave CA training.
        if word0 & 0x00FF_F1FF == CommandWord0::MODE_REG.raw_value() {
            match CommandWord0::new_with_raw_value(word0).mode_addr() {
                41 => self.ca_mode = Some(41),
                48 => self.ca_mode = Some(48),
                42 => self.ca_mode = None,
                _ => (),
            }
        }
    }

    fn write_transfer(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let [select, b0, b1, b2, b3] = bytes else {
            return Err(ErrorKind::Other);
        };
        let value = u32::from_le_bytes([*b0, *b1, *b2, *b3]);
        match *select {
            BRIDGE_SELECT_ADDR => self.latched_addr = value,
            BRIDGE_SELECT_DATA => self.write_reg(self.latched_addr, value),
            _ => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        }
        Ok(())
    }

    fn read_transfer(&mut self, buf: &mut [u8]) {
        let value = self.read_reg(self.latched_addr).to_le_bytes();
        for (byte, value) in buf.iter_mut().zip(value.iter().cycle()) {
            *byte = *value;
        }
    }

    fn acknowledged(&self, address: u8) -> Result<(), ErrorKind> {
        if self.nack || address != BRIDGE_I2C_ADDR {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        Ok(())
    }
}

/// Shared handle to a simulator, so tests can inspect it while a driver owns the bus.
#[derive(Debug, Clone)]
pub struct SharedSim(Rc<RefCell<SimDdrc>>);

impl SharedSim {
    pub fn bus(&self) -> SimBus {
        SimBus(self.0.clone())
    }

    /// Test window of `words` words.
    pub fn window(&self, words: usize) -> SimWindow {
        SimWindow {
            sim: self.0.clone(),
            mem: vec![0; words],
        }
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, SimDdrc> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, SimDdrc> {
        self.0.borrow_mut()
    }
}

/// I2C master connected to the simulated bridge.
pub struct SimBus(Rc<RefCell<SimDdrc>>);

impl ErrorType for SimBus {
    type Error = ErrorKind;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut sim = self.0.borrow_mut();
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    sim.bus_log.push(BusOp::Write(address, bytes.to_vec()));
                    sim.acknowledged(address)?;
                    sim.write_transfer(*bytes)?;
                }
                Operation::Read(buf) => {
                    sim.bus_log.push(BusOp::Read(address, buf.len()));
                    sim.acknowledged(address)?;
                    sim.read_transfer(buf);
                }
            }
        }
        Ok(())
    }
}

/// Test window whose read-back is inverted while the read timing of the simulator is off.
pub struct SimWindow {
    sim: Rc<RefCell<SimDdrc>>,
    mem: Vec<u32>,
}

impl TestWindow for SimWindow {
    fn words(&self) -> usize {
        self.mem.len()
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.mem[index] = value;
    }

    fn read_word(&mut self, index: usize) -> u32 {
        if self.sim.borrow().read_timing_ok() {
            self.mem[index]
        } else {
            !self.mem[index]
        }
    }
}
