// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! A pure-Rust library for reading temperatures from the MLX90621 16x4 thermopile array over I²C.
//!
//! The MLX90621 keeps its factory calibration in a separate 256 byte EEPROM (at address 0x50)
//! alongside the sensor itself (at address 0x60). Turning raw readings into temperatures needs
//! that calibration, along with a couple of live readings taken when the calibration is loaded.
//!
//! This library uses the [`embedded-hal`][embedded-hal] I²C traits, so it should work on any
//! platform with an `embedded-hal` I²C implementation. It is also `no_std` compatible.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//!
//! # High-Level API
//! ```no_run
//! use linux_embedded_hal::{Delay, I2cdev};
//! use mlx90621::Mlx90621Driver;
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! let mut sensor = Mlx90621Driver::new(i2c_bus, Delay);
//! sensor.initialize()?;
//! loop {
//!     if sensor.check_fault().is_err() {
//!         sensor.initialize()?;
//!     }
//!     let frame = sensor.sample()?;
//!     println!("Ambient: {}℃, first pixel: {}℃", frame.ambient, frame.pixels[0]);
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//! }
//! # Ok::<(), mlx90621::Error<I2cdev>>(())
//! ```
//!
//! [`Mlx90621Driver`] tracks the sensor's state: it has to be initialized before sampling, and
//! a detected brown-out (or a bus failure) faults the driver until it is initialized again.
//!
//! # Low-Level API
//! The pieces the driver is built out of are available as well. [`EepromImage`] holds a copy of
//! the EEPROM, [`extract_coefficients`] derives a [`CalibrationCoefficients`] from it, and
//! [`calculations::convert`] applies the coefficients to a [`RawIrFrame`].
//! [`CalibrationData`][common::CalibrationData] can be implemented to supply coefficients from
//! somewhere else.

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

pub mod address;
pub mod calculations;
pub mod calibration;
pub mod common;
#[doc(hidden)]
pub mod driver;
pub mod eeprom;
#[doc(hidden)]
pub mod error;
pub mod frame;
pub mod register;
pub mod util;

/// The number of rows of pixels.
pub const HEIGHT: usize = 4;

/// The number of columns of pixels.
pub const WIDTH: usize = 16;

/// The number of pixels in a frame.
pub const NUM_PIXELS: usize = HEIGHT * WIDTH;

pub use address::{BUS_CLOCK_HZ, EEPROM_ADDRESS, SENSOR_ADDRESS};
pub use calculations::TemperatureFrame;
pub use calibration::{extract_coefficients, AmbientReadings, CalibrationCoefficients};
pub use common::CalibrationData;
#[doc(inline)]
pub use driver::{DeviceSession, DeviceState, Mlx90621Driver};
pub use eeprom::{EepromImage, PixelBank};
#[doc(inline)]
pub use error::{CalibrationError, Error};
pub use frame::RawIrFrame;
pub use register::{ConfigRegister, Register, TrimRegister, WritableRegister};
