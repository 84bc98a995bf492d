// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use core::array;

use embedded_hal::blocking::i2c;

use crate::address::{Command, SENSOR_ADDRESS};
use crate::error::Error;
use crate::register::exchange;
use crate::util::signed16;
use crate::NUM_PIXELS;

/// The number of bytes the sensor sends for a full infrared frame.
pub const IR_FRAME_LENGTH: usize = NUM_PIXELS * 2;

/// One set of raw infrared readings, in row-major pixel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawIrFrame([i16; NUM_PIXELS]);

impl RawIrFrame {
    pub const fn new(pixels: [i16; NUM_PIXELS]) -> Self {
        Self(pixels)
    }

    /// Decode the little-endian words the sensor sends.
    pub fn from_bytes(bytes: &[u8; IR_FRAME_LENGTH]) -> Self {
        Self(array::from_fn(|index| {
            signed16(bytes[2 * index + 1], bytes[2 * index])
        }))
    }

    /// Read the full infrared array from the sensor.
    pub fn from_i2c<I2C>(bus: &mut I2C) -> Result<Self, Error<I2C>>
    where
        I2C: i2c::WriteRead + i2c::Write,
    {
        let mut bytes = [0u8; IR_FRAME_LENGTH];
        exchange(
            bus,
            SENSOR_ADDRESS,
            &Command::ReadIrArray.bytes(),
            &mut bytes,
        )?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn pixels(&self) -> &[i16; NUM_PIXELS] {
        &self.0
    }
}
