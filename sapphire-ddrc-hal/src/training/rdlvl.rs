//! Read data leveling.
use embedded_hal::i2c::I2c;
use sapphire_ddrc::{
    MAX_SLICES,
    regs::{ReadDqsDelay, SliceDelay},
    slice, slice_reg,
};

use super::{CalibrationError, CalibrationOutcome, Calibrator, sweep::PassWindow};
use crate::memtest::{MemTestError, TestWindow};

/// Delay and read DQS registers of a slice before read leveling.
#[derive(Debug, Default, Clone, Copy)]
struct ReadBaseline {
    delay: u32,
    read_dqs: u32,
}

impl<I2C: I2c, W: TestWindow> Calibrator<I2C, W> {
    fn set_read_delay(&mut self, delay: u8) -> Result<(), CalibrationError> {
        for slice in self.config.active_slices() {
            self.modify_slice_delay(slice, |val| val.with_read_dq(delay))?;
            self.modify(slice_reg(slice, slice::READ_DQS), |val| {
                ReadDqsDelay::new_with_raw_value(val)
                    .with_read_dqs(delay)
                    .raw_value()
            })?;
        }
        Ok(())
    }

    fn restore_read_baseline(
        &mut self,
        baseline: &[ReadBaseline; MAX_SLICES],
    ) -> Result<(), CalibrationError> {
        for slice in self.config.active_slices() {
            self.write(slice_reg(slice, slice::DELAY), baseline[slice].delay)?;
            self.write(slice_reg(slice, slice::READ_DQS), baseline[slice].read_dqs)?;
        }
        Ok(())
    }

    /// Run read data leveling and commit the read DQ and DQS delays of every active slice.
    ///
    /// Every candidate is validated with a run of the memory exerciser. The committed delay is
    /// the midpoint of the passing candidates. The pre-sweep registers are restored if nothing
    /// passed or the passing window is narrower than the configured minimum.
    pub fn read_leveling(&mut self) -> Result<CalibrationOutcome<u8>, CalibrationError> {
        let mut baseline = [ReadBaseline::default(); MAX_SLICES];
        for slice in self.config.active_slices() {
            baseline[slice] = ReadBaseline {
                delay: self.read(slice_reg(slice, slice::DELAY))?,
                read_dqs: self.read(slice_reg(slice, slice::READ_DQS))?,
            };
        }

        let mut window = PassWindow::new();
        for delay in self.config.read_level_sweep {
            self.set_read_delay(delay)?;
            self.apply()?;
            let pass = match self.exerciser.run_test(self.config.read_test_words) {
                Ok(()) => true,
                Err(MemTestError::Memory {
                    index,
                    expected,
                    found,
                }) => {
                    log::trace!(
                        "read delay {delay:#04x}: word {index} read {found:#010x}, expected {expected:#010x}"
                    );
                    false
                }
                Err(err) => {
                    self.restore_read_baseline(&baseline)?;
                    self.apply()?;
                    return Err(CalibrationError::MemTest(err));
                }
            };
            window.record(delay, pass);
        }
        log::debug!(
            "read leveling window {:x?}, midpoint {:x?}",
            window.bounds(),
            window.midpoint()
        );

        let outcome = match window.centre_with_min_width(self.config.read_min_window) {
            Some(delay) => {
                for slice in self.config.active_slices() {
                    let merged = SliceDelay::new_with_raw_value(baseline[slice].delay)
                        .with_read_dq(delay);
                    self.write(slice_reg(slice, slice::DELAY), merged.raw_value())?;
                    let merged = ReadDqsDelay::new_with_raw_value(baseline[slice].read_dqs)
                        .with_read_dqs(delay);
                    self.write(slice_reg(slice, slice::READ_DQS), merged.raw_value())?;
                }
                log::info!("read leveling done, read delay {delay:#04x}");
                CalibrationOutcome::Committed(delay)
            }
            None => {
                self.restore_read_baseline(&baseline)?;
                log::warn!("read leveling failed, restored baseline");
                CalibrationOutcome::FellBackToDefault
            }
        };
        self.apply()?;
        Ok(outcome)
    }
}
