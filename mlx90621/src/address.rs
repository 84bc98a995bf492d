// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Bus addresses, read commands, and the EEPROM memory map.
use num_enum::IntoPrimitive;

/// The I²C address of the calibration EEPROM.
pub const EEPROM_ADDRESS: u8 = 0x50;

/// The I²C address of the sensor itself.
pub const SENSOR_ADDRESS: u8 = 0x60;

/// The bus clock rate the sensor is driven at.
///
/// On Linux this is a property of the I²C adapter, not something a userspace driver can set.
pub const BUS_CLOCK_HZ: u32 = 400_000;

/// The fixed read commands understood by the sensor.
///
/// Each command is four bytes: the read opcode, a start address, the address step, and the
/// number of words to read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// The full infrared array (64 words).
    ReadIrArray,
    /// Proportional to absolute temperature.
    ReadPtat,
    /// The compensation pixel.
    ReadCompensationPixel,
    ReadConfig,
    ReadTrim,
}

impl Command {
    pub const fn bytes(&self) -> [u8; 4] {
        match self {
            Command::ReadIrArray => [0x02, 0x00, 0x01, 0x40],
            Command::ReadPtat => [0x02, 0x40, 0x00, 0x01],
            Command::ReadCompensationPixel => [0x02, 0x41, 0x00, 0x01],
            Command::ReadConfig => [0x02, 0x92, 0x00, 0x01],
            Command::ReadTrim => [0x02, 0x93, 0x00, 0x01],
        }
    }
}

/// The single byte command that starts a full EEPROM dump from the first address.
pub const READ_EEPROM_COMMAND: [u8; 1] = [0x00];

/// Byte offsets into the EEPROM image.
///
/// Multi-byte values are stored little endian, so the variant named for a value points at its
/// low byte and the high byte is the next address.
// NOTE: To make it easier to compare against the datasheet, discriminant values should *always* be
// explicitly written out.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive)]
#[repr(u8)]
pub enum EepromAddress {
    /// Start of the per-pixel offset bank (A<sub>i(ij)</sub>).
    PixelOffsetStart = 0x00,

    /// Start of the per-pixel slope bank (B<sub>i(ij)</sub>).
    PixelSlopeStart = 0x40,

    /// Start of the per-pixel sensitivity bank (Δα<sub>ij</sub>).
    PixelSensitivityStart = 0x80,

    /// A<sub>common</sub>, shared by every pixel offset.
    OffsetCommon = 0xD0,

    /// Upper nibble is K<sub>T1</sub> scale, lower nibble K<sub>T2</sub> scale.
    PtatScales = 0xD2,

    /// A<sub>CP</sub>
    CompensationOffset = 0xD3,

    /// B<sub>CP</sub>, a single signed byte.
    CompensationSlope = 0xD5,

    /// α<sub>CP</sub>
    CompensationSensitivity = 0xD6,

    /// Upper nibble is the A<sub>i</sub> scale, lower nibble the B<sub>i</sub> scale.
    PixelScales = 0xD9,

    /// V<sub>TH</sub>
    Vth = 0xDA,

    /// K<sub>T1</sub>
    Kt1 = 0xDC,

    /// K<sub>T2</sub>
    Kt2 = 0xDE,

    /// α<sub>0</sub>, the common sensitivity.
    Sensitivity = 0xE0,

    /// α<sub>0</sub> scale, a signed exponent.
    SensitivityScale = 0xE2,

    /// Δα scale, a signed exponent.
    SensitivityDeltaScale = 0xE3,

    /// Low byte of the configuration register seed.
    ConfigLow = 0xF5,

    /// High byte of the configuration register seed.
    ConfigHigh = 0xF6,

    /// Oscillator trim seed.
    Trim = 0xF7,
}

impl EepromAddress {
    pub fn offset(self) -> usize {
        usize::from(u8::from(self))
    }
}
