//! Write leveling.
//!
//! The memory device samples the clock with the DQS strobe and reports the sampled level on the
//! data lines. The write DQS delay is swept until every slice sees the clock go high.
use embedded_hal::i2c::I2c;
use sapphire_ddrc::{
    regs::{TrainingMode, WriteLevelCtrl, WriteLevelStatus},
    slice, slice_reg,
};

use super::{
    CalibrationError, CalibrationOutcome, Calibrator, PerSlice,
    sweep::{SweepStep, edge_sweep},
};
use crate::{
    command::{ddr3, lpddr3},
    config::{DeviceFamily, QUARTER_CYCLE_DELAY},
    memtest::TestWindow,
};

/// Write DQS delay programmed into slices without a detected edge.
pub const NO_EDGE_SENTINEL: u8 = 0xFF;

struct WriteLevelStep<'a, I2C, W>(&'a mut Calibrator<I2C, W>);

impl<I2C: I2c, W: TestWindow> SweepStep<u8> for WriteLevelStep<'_, I2C, W> {
    type Error = CalibrationError;

    fn apply(&mut self, dqs: u8) -> Result<(), CalibrationError> {
        for slice in self.0.config.active_slices() {
            self.0
                .modify_slice_delay(slice, |delay| delay.with_write_dqs(dqs))?;
        }
        self.0.apply()
    }

    fn sample(&mut self, slice: usize) -> Result<bool, CalibrationError> {
        self.0.modify(slice_reg(slice, slice::WRLVL_CTRL), |val| {
            WriteLevelCtrl::new_with_raw_value(val)
                .with_strobe(true)
                .raw_value()
        })?;
        let status = self.0.read(slice_reg(slice, slice::WRLVL_STATUS))?;
        Ok(WriteLevelStatus::new_with_raw_value(status).result())
    }
}

impl<I2C: I2c, W: TestWindow> Calibrator<I2C, W> {
    /// Run write leveling and commit the write DQS and DQ delays of every active slice.
    ///
    /// The write DQ delay is placed a quarter cycle after the detected DQS edge. Slices without
    /// an edge get [NO_EDGE_SENTINEL] as DQS delay.
    pub fn write_leveling(&mut self) -> Result<PerSlice<u8>, CalibrationError> {
        let (enter, exit) = match self.config.family {
            DeviceFamily::Lpddr3 => (
                lpddr3::write_leveling_enter(),
                lpddr3::write_leveling_exit(),
            ),
            DeviceFamily::Ddr3 => (ddr3::write_leveling_enter(), ddr3::write_leveling_exit()),
        };
        self.send(enter)?;
        self.set_training_mode(TrainingMode::WriteLeveling)?;

        let slices = self.config.slices;
        let sweep = self.config.write_level_sweep;
        let edges = edge_sweep(&mut WriteLevelStep(self), slices, sweep)?;

        let outcomes: PerSlice<u8> = self
            .config
            .active_slices()
            .map(|slice| match edges.rising_edge(slice) {
                Some(dqs) => CalibrationOutcome::Committed(dqs),
                None => CalibrationOutcome::NoEdgeDetected,
            })
            .collect();
        for (slice, outcome) in outcomes.iter().enumerate() {
            let dqs = match outcome.committed() {
                Some(dqs) => {
                    log::debug!("write leveling slice {slice}: DQS delay {dqs:#04x}");
                    dqs
                }
                None => {
                    log::warn!("write leveling slice {slice}: no edge detected");
                    NO_EDGE_SENTINEL
                }
            };
            self.modify_slice_delay(slice, |delay| {
                delay
                    .with_write_dqs(dqs)
                    .with_write_dq(dqs.wrapping_add(QUARTER_CYCLE_DELAY))
            })?;
        }
        log::info!("write leveling done");

        self.apply()?;
        self.set_training_mode(TrainingMode::Off)?;
        self.send(exit)?;
        Ok(outcomes)
    }
}
