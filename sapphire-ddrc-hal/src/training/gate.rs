//! Read gate leveling.
use embedded_hal::i2c::I2c;
use sapphire_ddrc::{
    regs::{GateStatus, GateTrainingCtrl, PhyMode, TrainingMode},
    slice, slice_reg,
};

use super::{
    CalibrationError, CalibrationOutcome, Calibrator, PerSlice,
    sweep::{SweepStep, edge_sweep},
};
use crate::{
    command::{DeviceCommand, ddr3, lpddr3},
    config::{DeviceFamily, GateOffset},
    memtest::TestWindow,
};

/// Read gate position in coarse and fine steps.
///
/// Positions order by coarse step first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GatePosition {
    pub coarse: u8,
    pub fine: u8,
}

impl GatePosition {
    /// Move a detected edge back by the gate offset.
    ///
    /// Borrows one coarse step if the fine position is smaller than the offset. Returns [None]
    /// if the position would be before coarse step 0.
    pub fn corrected(&self, offset: GateOffset) -> Option<Self> {
        let offset = offset.fine_steps();
        if self.fine < offset {
            Some(Self {
                coarse: self.coarse.checked_sub(1)?,
                fine: self.fine + offset,
            })
        } else {
            Some(Self {
                coarse: self.coarse,
                fine: self.fine - offset,
            })
        }
    }
}

struct GateStep<'a, I2C, W> {
    cal: &'a mut Calibrator<I2C, W>,
    coarse: Option<u8>,
    validation: DeviceCommand,
}

impl<I2C: I2c, W: TestWindow> SweepStep<GatePosition> for GateStep<'_, I2C, W> {
    type Error = CalibrationError;

    fn apply(&mut self, position: GatePosition) -> Result<(), CalibrationError> {
        if self.coarse != Some(position.coarse) {
            for slice in self.cal.config.active_slices() {
                self.cal.set_gate_coarse(slice, position.coarse)?;
            }
            self.coarse = Some(position.coarse);
        }
        for slice in self.cal.config.active_slices() {
            self.cal
                .modify_slice_delay(slice, |delay| delay.with_gate_fine(position.fine))?;
        }
        self.cal.apply()?;
        self.cal.send(self.validation)
    }

    fn sample(&mut self, slice: usize) -> Result<bool, CalibrationError> {
        let status = self.cal.read(slice_reg(slice, slice::GATE_STATUS))?;
        Ok(GateStatus::new_with_raw_value(status).passed())
    }
}

impl<I2C: I2c, W: TestWindow> Calibrator<I2C, W> {
    fn set_gate_training(&mut self, enable: bool) -> Result<(), CalibrationError> {
        for slice in self.config.active_slices() {
            self.modify(slice_reg(slice, slice::GATE_TRAINING), |val| {
                GateTrainingCtrl::new_with_raw_value(val)
                    .with_enable(enable)
                    .raw_value()
            })?;
        }
        Ok(())
    }

    /// Run gate leveling and commit the corrected gate position of every active slice.
    ///
    /// Slices without an edge keep the last swept position.
    pub fn gate_leveling(&mut self) -> Result<PerSlice<GatePosition>, CalibrationError> {
        self.set_phy_mode(PhyMode::Training)?;
        let validation = match self.config.family {
            DeviceFamily::Lpddr3 => lpddr3::read_dq_calibration(),
            DeviceFamily::Ddr3 => {
                self.send(ddr3::mpr_enable())?;
                DeviceCommand::ddr3_read()
            }
        };
        self.set_training_mode(TrainingMode::GateLeveling)?;
        self.set_gate_training(true)?;

        let fine_sweep = self.config.gate_fine_sweep;
        let candidates = self
            .config
            .gate_coarse_sweep
            .iter()
            .flat_map(move |coarse| {
                fine_sweep
                    .iter()
                    .map(move |fine| GatePosition { coarse, fine })
            });
        let slices = self.config.slices;
        let mut step = GateStep {
            cal: self,
            coarse: None,
            validation,
        };
        let edges = edge_sweep(&mut step, slices, candidates)?;

        let offset = self.config.gate_offset;
        let outcomes: PerSlice<GatePosition> = self
            .config
            .active_slices()
            .map(|slice| match edges.rising_edge(slice) {
                Some(edge) => match edge.corrected(offset) {
                    Some(position) => CalibrationOutcome::Committed(position),
                    None => {
                        log::warn!(
                            "gate leveling slice {slice}: edge at {edge:?} too early for the gate offset"
                        );
                        CalibrationOutcome::NoEdgeDetected
                    }
                },
                None => {
                    log::warn!("gate leveling slice {slice}: no edge detected");
                    CalibrationOutcome::NoEdgeDetected
                }
            })
            .collect();
        for (slice, outcome) in outcomes.iter().enumerate() {
            if let Some(position) = outcome.committed() {
                log::debug!(
                    "gate leveling slice {slice}: coarse {:#x} fine {:#04x}",
                    position.coarse,
                    position.fine
                );
                self.set_gate_coarse(slice, position.coarse)?;
                self.modify_slice_delay(slice, |delay| delay.with_gate_fine(position.fine))?;
            }
        }
        log::info!("gate leveling done");

        self.apply()?;
        self.set_gate_training(false)?;
        if self.config.family == DeviceFamily::Ddr3 {
            self.send(ddr3::mpr_disable())?;
        }
        self.set_training_mode(TrainingMode::Off)?;
        self.set_phy_mode(PhyMode::Normal)?;
        Ok(outcomes)
    }
}
