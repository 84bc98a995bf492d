// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! The calibration EEPROM.
use core::{array, fmt};

use embedded_hal::blocking::i2c;

use crate::address::{EepromAddress, EEPROM_ADDRESS, READ_EEPROM_COMMAND};
use crate::error::Error;
use crate::register::{exchange, ConfigRegister, TrimRegister};
use crate::util::{high_nibble, low_nibble, signed16, signed8, unsigned16};
use crate::NUM_PIXELS;

/// The size of the calibration EEPROM in bytes.
pub const EEPROM_LENGTH: usize = 256;

/// The three blocks of per-pixel calibration values, one byte per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelBank {
    /// A<sub>i(ij)</sub>, unsigned.
    Offset,
    /// B<sub>i(ij)</sub>, signed.
    Slope,
    /// Δα<sub>ij</sub>, unsigned.
    Sensitivity,
}

impl PixelBank {
    /// The address of the first pixel in the bank.
    pub(crate) fn start(self) -> EepromAddress {
        match self {
            Self::Offset => EepromAddress::PixelOffsetStart,
            Self::Slope => EepromAddress::PixelSlopeStart,
            Self::Sensitivity => EepromAddress::PixelSensitivityStart,
        }
    }
}

/// A copy of the sensor's 256 byte calibration EEPROM.
///
/// There is no checksum on this data, so whatever the bus returns is taken as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct EepromImage([u8; EEPROM_LENGTH]);

impl EepromImage {
    pub const fn new(data: [u8; EEPROM_LENGTH]) -> Self {
        Self(data)
    }

    /// Dump the EEPROM over I²C.
    pub fn from_i2c<I2C>(bus: &mut I2C) -> Result<Self, Error<I2C>>
    where
        I2C: i2c::WriteRead + i2c::Write,
    {
        let mut data = [0u8; EEPROM_LENGTH];
        exchange(bus, EEPROM_ADDRESS, &READ_EEPROM_COMMAND, &mut data)?;
        Ok(Self(data))
    }

    pub fn as_bytes(&self) -> &[u8; EEPROM_LENGTH] {
        &self.0
    }

    /// The raw byte at `address`.
    pub fn byte(&self, address: EepromAddress) -> u8 {
        self.0[address.offset()]
    }

    /// A signed 16-bit value with its low byte at `address`.
    pub fn signed16(&self, address: EepromAddress) -> i16 {
        let offset = address.offset();
        signed16(self.0[offset + 1], self.0[offset])
    }

    /// A single signed byte at `address`.
    pub fn signed8(&self, address: EepromAddress) -> i8 {
        signed8(self.byte(address))
    }

    pub fn high_nibble(&self, address: EepromAddress) -> u8 {
        high_nibble(self.byte(address))
    }

    pub fn low_nibble(&self, address: EepromAddress) -> u8 {
        low_nibble(self.byte(address))
    }

    /// A copy of one of the per-pixel banks.
    pub fn pixel_bank(&self, bank: PixelBank) -> [u8; NUM_PIXELS] {
        let start = bank.start().offset();
        array::from_fn(|pixel| self.0[start + pixel])
    }

    /// The configuration register value the sensor should be started with.
    pub fn config_seed(&self) -> ConfigRegister {
        ConfigRegister::new(unsigned16(
            self.byte(EepromAddress::ConfigHigh),
            self.byte(EepromAddress::ConfigLow),
        ))
    }

    /// The oscillator trim value the sensor should be started with.
    pub fn trim_seed(&self) -> TrimRegister {
        TrimRegister::new(u16::from(self.byte(EepromAddress::Trim)))
    }
}

impl fmt::Debug for EepromImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EepromImage").field(&&self.0[..]).finish()
    }
}

impl From<[u8; EEPROM_LENGTH]> for EepromImage {
    fn from(data: [u8; EEPROM_LENGTH]) -> Self {
        Self(data)
    }
}

#[cfg(test)]
mod test {
    use mlx90621_test_data::{synthetic_eeprom, synthetic_sensor_bus, BusOperation, EEPROM_ADDRESS};

    use super::{EepromImage, PixelBank};
    use crate::address::EepromAddress;

    #[test]
    fn load_from_bus() {
        let mut mock_bus = synthetic_sensor_bus();
        mock_bus.clear_recent_operations();
        let image = EepromImage::from_i2c(&mut mock_bus).unwrap();
        assert_eq!(image.as_bytes(), &synthetic_eeprom());
        let ops = mock_bus.recent_operations();
        assert_eq!(ops.len(), 1, "The EEPROM should be read in one transaction");
        assert!(matches!(
            &ops[0],
            BusOperation::WriteRead { address: EEPROM_ADDRESS, length: 256, .. }
        ));
    }

    #[test]
    fn load_failure() {
        let mut mock_bus = synthetic_sensor_bus();
        mock_bus.fail_eeprom(true);
        let result = EepromImage::from_i2c(&mut mock_bus);
        assert!(result.is_err());
        assert!(result.unwrap_err().is_bus_fault());
    }

    #[test]
    fn accessors() {
        let mut data = [0u8; super::EEPROM_LENGTH];
        data[0xDA] = 0x38;
        data[0xDB] = 0xFF;
        data[0xD2] = 0xA5;
        data[0xD5] = 0xF0;
        data[0xF5] = 0x06;
        data[0xF6] = 0x08;
        data[0xF7] = 0x2C;
        let image = EepromImage::new(data);
        assert_eq!(image.signed16(EepromAddress::Vth), -200);
        assert_eq!(image.high_nibble(EepromAddress::PtatScales), 0xA);
        assert_eq!(image.low_nibble(EepromAddress::PtatScales), 0x5);
        assert_eq!(image.signed8(EepromAddress::CompensationSlope), -16);
        assert_eq!(image.config_seed().raw(), 0x0806);
        assert_eq!(image.trim_seed().raw(), 0x002C);
    }

    #[test]
    fn pixel_banks() {
        let mut data = [0u8; super::EEPROM_LENGTH];
        data.iter_mut()
            .enumerate()
            .for_each(|(index, byte)| *byte = index as u8);
        let image = EepromImage::new(data);
        let offsets = image.pixel_bank(PixelBank::Offset);
        let slopes = image.pixel_bank(PixelBank::Slope);
        let sensitivities = image.pixel_bank(PixelBank::Sensitivity);
        assert_eq!(offsets.len(), 64);
        assert_eq!(offsets[0], 0x00);
        assert_eq!(offsets[63], 0x3F);
        assert_eq!(slopes[0], 0x40);
        assert_eq!(slopes[63], 0x7F);
        assert_eq!(sensitivities[0], 0x80);
        assert_eq!(sensitivities[63], 0xBF);
        // Together the banks cover everything before the constants
        let banks = [PixelBank::Offset, PixelBank::Slope, PixelBank::Sensitivity];
        let mut covered = 0;
        for bank in banks {
            assert_eq!(bank.start().offset(), covered);
            covered += image.pixel_bank(bank).len();
        }
        assert_eq!(covered, 0xC0);
    }
}
