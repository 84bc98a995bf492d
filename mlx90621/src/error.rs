// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use embedded_hal::blocking::i2c;

use crate::driver::DeviceState;

/// Errors from the calibration math that don't involve I²C.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationError {
    /// The term under the square root in the ambient temperature equation was negative.
    ///
    /// This happens when the PTAT reading is out of range for the calibration constants, and
    /// would otherwise poison every pixel with NaN.
    NegativeRadicand(f64),

    /// The ambient temperature came out as NaN or infinite (for example when K<sub>T2</sub> is 0).
    NonFiniteAmbient(f32),
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::NegativeRadicand(radicand) => write!(
                f,
                "ambient temperature radicand is negative ({})",
                radicand
            ),
            CalibrationError::NonFiniteAmbient(t_a) => {
                write!(f, "ambient temperature is not finite ({})", t_a)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CalibrationError {}

pub enum Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    /// Errors originating from a write-only I²C transaction.
    I2cWriteError(<I2C as i2c::Write>::Error),

    /// Errors originating from a combined write-read I²C transaction.
    I2cWriteReadError(<I2C as i2c::WriteRead>::Error),

    /// The calibration data could not be turned into usable coefficients.
    CalibrationError(CalibrationError),

    /// The sensor reported a brown-out in its configuration register.
    BrownOut { config: u16 },

    /// The requested operation is not valid in the driver's current state.
    InvalidState(DeviceState),
}

impl<I2C> Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    /// Whether this error came from the bus itself.
    pub fn is_bus_fault(&self) -> bool {
        matches!(self, Error::I2cWriteError(_) | Error::I2cWriteReadError(_))
    }
}

// Clone and PartialEq are implemented by hand so that they depend on the bus errors, not on the
// bus itself.
impl<I2C> Clone for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: Clone,
    <I2C as i2c::Write>::Error: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Error::I2cWriteError(err) => Error::I2cWriteError(err.clone()),
            Error::I2cWriteReadError(err) => Error::I2cWriteReadError(err.clone()),
            Error::CalibrationError(err) => Error::CalibrationError(*err),
            Error::BrownOut { config } => Error::BrownOut { config: *config },
            Error::InvalidState(state) => Error::InvalidState(*state),
        }
    }
}

impl<I2C> PartialEq for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: PartialEq,
    <I2C as i2c::Write>::Error: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::I2cWriteError(a), Error::I2cWriteError(b)) => a == b,
            (Error::I2cWriteReadError(a), Error::I2cWriteReadError(b)) => a == b,
            (Error::CalibrationError(a), Error::CalibrationError(b)) => a == b,
            (Error::BrownOut { config: a }, Error::BrownOut { config: b }) => a == b,
            (Error::InvalidState(a), Error::InvalidState(b)) => a == b,
            _ => false,
        }
    }
}

// Custom Debug implementation so that I2C doesn't need to implement Debug (like the one from
// linux-embedded-hal).
impl<I2C> fmt::Debug for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteError(err) => f.debug_tuple("Error::I2cWriteError").field(err).finish(),
            Error::I2cWriteReadError(err) => f
                .debug_tuple("Error::I2cWriteReadError")
                .field(err)
                .finish(),
            Error::CalibrationError(err) => f
                .debug_tuple("Error::CalibrationError")
                .field(err)
                .finish(),
            Error::BrownOut { config } => f
                .debug_struct("Error::BrownOut")
                .field("config", config)
                .finish(),
            Error::InvalidState(state) => {
                f.debug_tuple("Error::InvalidState").field(state).finish()
            }
        }
    }
}

impl<I2C> fmt::Display for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteError(err) => write!(f, "I2C write error: {:?}", err),
            Error::I2cWriteReadError(err) => write!(f, "I2C write-read error: {:?}", err),
            Error::CalibrationError(err) => write!(f, "Calibration error: {}", err),
            Error::BrownOut { config } => {
                write!(f, "Brown-out reported (config register {:#06X})", config)
            }
            Error::InvalidState(state) => write!(f, "Not valid while {:?}", state),
        }
    }
}

#[cfg(feature = "std")]
impl<I2C> std::error::Error for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: std::error::Error + 'static,
    <I2C as i2c::Write>::Error: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::I2cWriteError(err) => Some(err),
            Error::I2cWriteReadError(err) => Some(err),
            Error::CalibrationError(err) => Some(err),
            Error::BrownOut { .. } | Error::InvalidState(_) => None,
        }
    }
}

impl<I2C> From<CalibrationError> for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    fn from(err: CalibrationError) -> Self {
        Self::CalibrationError(err)
    }
}
