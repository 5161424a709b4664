//! # DDR access-timing calibration for the Sapphire SoC
//!
//! The Efinix Sapphire SoC talks to its external DDR3 or LPDDR3 device through a hard DDR
//! controller whose configuration space sits behind an I2C bridge. Before the memory can be used
//! reliably, the delay lines of the controller have to be trained for the board at hand. This
//! crate implements that one-shot calibration on top of the
//! [register map](sapphire_ddrc) of the controller.
//!
//! Any I2C master implementing the [embedded-hal](https://github.com/rust-embedded/embedded-hal)
//! [I2c](embedded_hal::i2c::I2c) trait can be used as the transport. Read leveling validates
//! candidate delays by exercising a block of DDR memory, passed in as a [memtest::TestWindow].
//!
//! ```ignore
//! let window = unsafe { MmioWindow::new_fixed() };
//! let report = calibrate(i2c, window, CalibrationConfig::new_lpddr3())?;
//! ```
#![no_std]

#[cfg(test)]
extern crate std;

pub mod access;
pub mod command;
pub mod config;
pub mod lfsr;
pub mod memtest;
pub mod training;

#[cfg(test)]
mod sim;

pub use access::{AccessError, DdrcAccess};
pub use config::{AccessPolicy, CalibrationConfig, DeviceFamily, GateOffset, SliceCount};
pub use memtest::{MemTestError, MemoryExerciser, MmioWindow, TestWindow};
pub use training::{
    CalibrationError, CalibrationOutcome, CalibrationReport, Calibrator, GatePosition, calibrate,
};
