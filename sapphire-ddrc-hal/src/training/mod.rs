//! # Access-timing calibration engine
//!
//! Calibration runs once at boot, before the DDR memory is used. The phases run strictly in
//! order:
//!
//! 1. Command/address training, LPDDR3 only and optional.
//! 2. Write leveling, optional.
//! 3. Gate leveling.
//! 4. Read data leveling.
//!
//! Write and gate leveling sweep a delay parameter and look for the first fail to pass
//! transition on every slice. CA training and read leveling look for the window of passing
//! candidates and commit its midpoint.
//!
//! Register access errors are handled according to the configured [AccessPolicy].
use embedded_hal::i2c::I2c;
use sapphire_ddrc::{
    COMMAND_WORD0, COMMAND_WORD1, MAX_SLICES, PHY_MODE, TRAINING_MODE,
    regs::{GateCoarse, PhyMode, SliceDelay, TrainingMode},
    slice, slice_reg,
};

use crate::{
    access::{AccessError, DdrcAccess},
    command::{COMMAND_SLOT, DeviceCommand},
    config::{AccessPolicy, CalibrationConfig},
    memtest::{MemTestError, MemoryExerciser, TestWindow},
};

mod ca;
mod gate;
mod rdlvl;
pub mod sweep;
mod wrlvl;

pub use gate::GatePosition;
pub use wrlvl::NO_EDGE_SENTINEL;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CalibrationError {
    #[error("register access error: {0}")]
    Access(#[from] AccessError),
    #[error("memory test error: {0}")]
    MemTest(MemTestError),
}

/// Result of a calibration phase, or of one slice of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome<T> {
    /// The value was found and written to the controller.
    Committed(T),
    /// No usable result was found and the pre-calibration setting was restored.
    FellBackToDefault,
    /// The sweep ended without a fail to pass transition or overlapping pass windows. The value
    /// left in the controller is not calibrated.
    NoEdgeDetected,
}

impl<T: Copy> CalibrationOutcome<T> {
    #[inline]
    pub fn committed(&self) -> Option<T> {
        match self {
            CalibrationOutcome::Committed(value) => Some(*value),
            _ => None,
        }
    }

    #[inline]
    pub fn is_committed(&self) -> bool {
        self.committed().is_some()
    }
}

/// Outcomes of the active slices, indexed by slice.
pub type PerSlice<T> = heapless::Vec<CalibrationOutcome<T>, MAX_SLICES>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationReport {
    /// Command delay, [None] if the phase did not run.
    pub ca_training: Option<CalibrationOutcome<u8>>,
    /// Write DQS delay per slice, [None] if the phase did not run.
    pub write_leveling: Option<PerSlice<u8>>,
    pub gate_leveling: PerSlice<GatePosition>,
    /// Read DQ and DQS delay shared by all slices.
    pub read_leveling: CalibrationOutcome<u8>,
}

impl CalibrationReport {
    /// All phases which ran committed a result on every active slice.
    pub fn all_committed(&self) -> bool {
        self.ca_training.is_none_or(|outcome| outcome.is_committed())
            && self
                .write_leveling
                .as_ref()
                .is_none_or(|slices| slices.iter().all(CalibrationOutcome::is_committed))
            && self
                .gate_leveling
                .iter()
                .all(CalibrationOutcome::is_committed)
            && self.read_leveling.is_committed()
    }
}

/// Calibration session.
///
/// Owns the register access to the controller and the memory exerciser. The pattern generator
/// state of the exerciser carries over between the phases and between calls.
pub struct Calibrator<I2C, W> {
    access: DdrcAccess<I2C>,
    exerciser: MemoryExerciser<W>,
    config: CalibrationConfig,
}

impl<I2C: I2c, W: TestWindow> Calibrator<I2C, W> {
    pub fn new(i2c: I2C, window: W, config: CalibrationConfig) -> Self {
        Self::new_with_parts(DdrcAccess::new(i2c), MemoryExerciser::new(window), config)
    }

    pub fn new_with_parts(
        access: DdrcAccess<I2C>,
        exerciser: MemoryExerciser<W>,
        config: CalibrationConfig,
    ) -> Self {
        Self {
            access,
            exerciser,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    #[inline]
    pub fn exerciser(&self) -> &MemoryExerciser<W> {
        &self.exerciser
    }

    /// Release the I2C transport and the test window.
    pub fn release(self) -> (I2C, W) {
        (self.access.release(), self.exerciser.release())
    }

    /// Run all enabled phases in order.
    pub fn run(&mut self) -> Result<CalibrationReport, CalibrationError> {
        let ca_training = if self.config.ca_training {
            self.ca_training()?
        } else {
            None
        };
        let write_leveling = if self.config.write_leveling {
            Some(self.write_leveling()?)
        } else {
            None
        };
        let gate_leveling = self.gate_leveling()?;
        let read_leveling = self.read_leveling()?;
        Ok(CalibrationReport {
            ca_training,
            write_leveling,
            gate_leveling,
            read_leveling,
        })
    }

    fn tolerate<T>(
        &self,
        result: Result<T, AccessError>,
        fallback: T,
    ) -> Result<T, CalibrationError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => match self.config.policy {
                AccessPolicy::Lenient => {
                    log::trace!("ignored register access error: {err}");
                    Ok(fallback)
                }
                AccessPolicy::Strict => {
                    log::warn!("calibration aborted: {err}");
                    Err(err.into())
                }
            },
        }
    }

    /// Read a configuration word. Reads as 0 if the access fails under the lenient policy.
    fn read(&mut self, addr: u32) -> Result<u32, CalibrationError> {
        let result = self.access.read_addr_data(addr);
        self.tolerate(result, 0)
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<(), CalibrationError> {
        let result = self.access.write_addr_data(addr, value);
        self.tolerate(result, ())
    }

    fn modify(&mut self, addr: u32, f: impl FnOnce(u32) -> u32) -> Result<(), CalibrationError> {
        let value = self.read(addr)?;
        self.write(addr, f(value))
    }

    /// Commit the staged configuration.
    fn apply(&mut self) -> Result<(), CalibrationError> {
        let result = self.access.apply_config_update();
        self.tolerate(result, ())
    }

    /// Send a command to the memory device.
    fn send(&mut self, cmd: DeviceCommand) -> Result<(), CalibrationError> {
        self.write(COMMAND_WORD0, cmd.word0)?;
        self.write(COMMAND_WORD1, cmd.word1)?;
        let result = self.access.issue_command(COMMAND_SLOT);
        self.tolerate(result, ())
    }

    fn set_training_mode(&mut self, mode: TrainingMode) -> Result<(), CalibrationError> {
        self.write(TRAINING_MODE, mode.into())
    }

    fn set_phy_mode(&mut self, mode: PhyMode) -> Result<(), CalibrationError> {
        self.write(PHY_MODE, mode.into())
    }

    fn modify_slice_delay(
        &mut self,
        slice: usize,
        f: impl FnOnce(SliceDelay) -> SliceDelay,
    ) -> Result<(), CalibrationError> {
        self.modify(slice_reg(slice, slice::DELAY), |val| {
            f(SliceDelay::new_with_raw_value(val)).raw_value()
        })
    }

    fn set_gate_coarse(&mut self, slice: usize, coarse: u8) -> Result<(), CalibrationError> {
        self.modify(slice_reg(slice, slice::GATE_COARSE), |val| {
            GateCoarse::new_with_raw_value(val)
                .with_coarse(coarse)
                .raw_value()
        })
    }
}

/// Run a complete calibration with the given transport, test window and configuration.
pub fn calibrate<I2C: I2c, W: TestWindow>(
    i2c: I2C,
    window: W,
    config: CalibrationConfig,
) -> Result<CalibrationReport, CalibrationError> {
    let mut calibrator = Calibrator::new(i2c, window, config);
    let report = calibrator.run()?;
    if report.all_committed() {
        log::info!("DDR access timing calibration done");
    } else {
        log::warn!("DDR access timing calibration incomplete: {report:?}");
    }
    Ok(report)
}
