//! LPDDR3 command/address training.
//!
//! While MR41 or MR48 CA training is active the device returns the command/address pattern it
//! sampled on the data lines. Both sweeps record the window of command delays which return the
//! expected pattern, the committed delay is the midpoint of the overlap.
use embedded_hal::i2c::I2c;
use sapphire_ddrc::{
    CA_DELAY, CA_PATTERN, CA_STATUS,
    regs::{CA_PATTERN_MR41, CA_PATTERN_MR48, CaDelay, PhyMode, TrainingMode},
};

use super::{CalibrationError, CalibrationOutcome, Calibrator, sweep::PassWindow};
use crate::{
    command::{DeviceCommand, lpddr3},
    config::{DeviceFamily, QUARTER_CYCLE_DELAY},
    memtest::TestWindow,
};

impl<I2C: I2c, W: TestWindow> Calibrator<I2C, W> {
    fn set_ca_delay(&mut self, delay: u8) -> Result<(), CalibrationError> {
        self.modify(CA_DELAY, |val| {
            CaDelay::new_with_raw_value(val)
                .with_cmd_delay(delay)
                .with_cmd_data_delay(delay.wrapping_add(QUARTER_CYCLE_DELAY))
                .raw_value()
        })
    }

    fn ca_sweep(&mut self, expected: u32) -> Result<PassWindow, CalibrationError> {
        let mut window = PassWindow::new();
        for delay in self.config.ca_sweep {
            self.set_ca_delay(delay)?;
            self.apply()?;
            self.send(DeviceCommand::lpddr3_ca_pattern())?;
            // Latches the sampled pattern.
            self.read(CA_STATUS)?;
            let pattern = self.read(CA_PATTERN)?;
            window.record(delay, pattern == expected);
        }
        Ok(window)
    }

    /// Run command/address training and commit the command delay.
    ///
    /// The delay centred between the latest window start and the earliest window end is always
    /// committed. If the MR41 and MR48 windows do not overlap the outcome is
    /// [CalibrationOutcome::NoEdgeDetected]. Returns [None] for DDR3 devices, which are left
    /// untouched.
    pub fn ca_training(&mut self) -> Result<Option<CalibrationOutcome<u8>>, CalibrationError> {
        if self.config.family != DeviceFamily::Lpddr3 {
            log::warn!("CA training is only supported for LPDDR3, skipped");
            return Ok(None);
        }
        self.send(lpddr3::ca_training_mr41())?;
        self.set_phy_mode(PhyMode::Training)?;
        self.set_training_mode(TrainingMode::CaTraining)?;
        let mr41 = self.ca_sweep(CA_PATTERN_MR41)?;

        self.write(CA_DELAY, CaDelay::RESET.raw_value())?;
        self.apply()?;
        self.send(lpddr3::ca_training_mr48())?;
        self.set_phy_mode(PhyMode::Training)?;
        let mr48 = self.ca_sweep(CA_PATTERN_MR48)?;

        let overlap = mr41.intersect(&mr48);
        log::debug!(
            "CA training windows: MR41 {:x?} MR48 {:x?} overlap {:x?}",
            mr41.bounds(),
            mr48.bounds(),
            overlap.bounds()
        );
        let delay = overlap_centre(&mr41, &mr48);
        self.set_ca_delay(delay)?;
        let outcome = if overlap.bounds().is_some() {
            log::info!("CA training done, command delay {delay:#04x}");
            CalibrationOutcome::Committed(delay)
        } else {
            log::warn!("CA training windows do not overlap, command delay {delay:#04x}");
            CalibrationOutcome::NoEdgeDetected
        };
        self.apply()?;

        self.set_phy_mode(PhyMode::Normal)?;
        self.set_training_mode(TrainingMode::Off)?;
        self.send(lpddr3::ca_training_exit())?;
        Ok(Some(outcome))
    }
}

/// Delay halfway between the latest window start and the earliest window end.
///
/// A window without passing delays starts and ends at 0.
fn overlap_centre(mr41: &PassWindow, mr48: &PassWindow) -> u8 {
    let (first_41, last_41) = mr41.bounds().unwrap_or((0, 0));
    let (first_48, last_48) = mr48.bounds().unwrap_or((0, 0));
    let first = first_41.max(first_48) as u16;
    let last = last_41.min(last_48) as u16;
    ((first + last) / 2) as u8
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::{config::CalibrationConfig, sim::SimDdrc};
    use sapphire_ddrc::{PHY_MODE, TRAINING_MODE};

    fn calibrator(
        sim: &crate::sim::SharedSim,
        config: CalibrationConfig,
    ) -> Calibrator<crate::sim::SimBus, crate::sim::SimWindow> {
        Calibrator::new(sim.bus(), sim.window(16), config)
    }

    #[test]
    fn commits_midpoint_of_overlap() {
        let sim = SimDdrc::new_shared();
        {
            let mut sim = sim.borrow_mut();
            sim.ca_window_mr41 = Some((0x20, 0x80));
            sim.ca_window_mr48 = Some((0x30, 0x90));
            sim.poke(CA_DELAY, 0xFF00_00FF);
        }
        let outcome = calibrator(&sim, CalibrationConfig::default())
            .ca_training()
            .unwrap();
        assert_eq!(outcome, Some(CalibrationOutcome::Committed(0x58)));

        let sim = sim.borrow();
        let delay = CaDelay::new_with_raw_value(sim.peek(CA_DELAY));
        assert_eq!(delay.cmd_delay(), 0x58);
        assert_eq!(delay.cmd_data_delay(), 0x98);
        // Bits outside the delay fields come from the reset value written between the sweeps.
        assert_eq!(sim.peek(CA_DELAY) & 0xFF00_00FF, 0x2000_0040);
        assert_eq!(sim.peek(PHY_MODE), u32::from(PhyMode::Normal));
        assert_eq!(sim.peek(TRAINING_MODE), u32::from(TrainingMode::Off));
        assert_eq!(
            sim.device_commands.first(),
            Some(&lpddr3::ca_training_mr41())
        );
        assert_eq!(
            sim.device_commands.last(),
            Some(&lpddr3::ca_training_exit())
        );
    }

    #[test]
    fn disjoint_windows_commit_gap_centre() {
        let sim = SimDdrc::new_shared();
        {
            let mut sim = sim.borrow_mut();
            sim.ca_window_mr41 = Some((0x10, 0x30));
            sim.ca_window_mr48 = Some((0x40, 0x60));
            sim.poke(CA_DELAY, 0x1234_5678);
        }
        let outcome = calibrator(&sim, CalibrationConfig::default())
            .ca_training()
            .unwrap();
        assert_eq!(outcome, Some(CalibrationOutcome::NoEdgeDetected));
        let sim = sim.borrow();
        let delay = CaDelay::new_with_raw_value(sim.peek(CA_DELAY));
        assert_eq!(delay.cmd_delay(), 0x38);
        assert_eq!(delay.cmd_data_delay(), 0x78);
        assert_eq!(sim.peek(TRAINING_MODE), u32::from(TrainingMode::Off));
    }

    #[test]
    fn missing_pattern_counts_as_zero_window() {
        let sim = SimDdrc::new_shared();
        sim.borrow_mut().ca_window_mr41 = Some((0x10, 0x30));
        let outcome = calibrator(&sim, CalibrationConfig::default())
            .ca_training()
            .unwrap();
        assert_eq!(outcome, Some(CalibrationOutcome::NoEdgeDetected));
        let delay = CaDelay::new_with_raw_value(sim.borrow().peek(CA_DELAY));
        assert_eq!(delay.cmd_delay(), 0x08);
    }

    #[test]
    fn single_delay_overlap() {
        let sim = SimDdrc::new_shared();
        {
            let mut sim = sim.borrow_mut();
            sim.ca_window_mr41 = Some((0x10, 0x40));
            sim.ca_window_mr48 = Some((0x40, 0x60));
        }
        let outcome = calibrator(&sim, CalibrationConfig::default())
            .ca_training()
            .unwrap();
        assert_eq!(outcome, Some(CalibrationOutcome::Committed(0x40)));
    }

    #[test]
    fn ddr3_is_left_untouched() {
        let sim = SimDdrc::new_shared();
        let outcome = calibrator(&sim, CalibrationConfig::new_ddr3())
            .ca_training()
            .unwrap();
        assert_eq!(outcome, None);
        assert!(sim.borrow().bus_log.is_empty());
    }
}
