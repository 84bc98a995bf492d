// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register access for the MLX90621.
//!
//! The sensor doesn't use plain register addresses like most I²C devices. Every access is a
//! small command frame: reads are four bytes (opcode, start address, address step, count) and
//! writes to the configuration and trim registers use a "doubled-byte" frame where each data
//! byte is preceded by a check byte. The check byte is the data byte minus a per-register
//! constant, wrapping around at 8 bits.
use core::convert::TryInto;
use core::fmt;

use embedded_hal::blocking::i2c;

use crate::address::{Command, SENSOR_ADDRESS};
use crate::error::Error;
use crate::util::{is_bit_set, signed16, unsigned16};

/// Perform one bus transaction with a device.
///
/// An empty `response` means a write-only command, otherwise the command is written and then
/// `response.len()` bytes are read back after a repeated start. Decoding is left to the caller.
pub(crate) fn exchange<I2C>(
    bus: &mut I2C,
    device_address: u8,
    command: &[u8],
    response: &mut [u8],
) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    if response.is_empty() {
        bus.write(device_address, command)
            .map_err(Error::I2cWriteError)
    } else {
        bus.write_read(device_address, command, response)
            .map_err(Error::I2cWriteReadError)
    }
}

/// Read a two byte value from the sensor, returned in the order the sensor sent it (low byte
/// first).
pub(crate) fn read_word<I2C>(bus: &mut I2C, command: Command) -> Result<[u8; 2], Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let mut word = [0u8; 2];
    exchange(bus, SENSOR_ADDRESS, &command.bytes(), &mut word)?;
    Ok(word)
}

/// Read the PTAT (proportional to absolute temperature) value.
pub(crate) fn read_ptat<I2C>(bus: &mut I2C) -> Result<u16, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let [low, high] = read_word(bus, Command::ReadPtat)?;
    Ok(unsigned16(high, low))
}

/// Read the compensation pixel value (V<sub>CP</sub>).
pub(crate) fn read_vcomp<I2C>(bus: &mut I2C) -> Result<i16, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let [low, high] = read_word(bus, Command::ReadCompensationPixel)?;
    Ok(signed16(high, low))
}

/// Trait for common register functionality.
pub trait Register: Into<[u8; 2]> + for<'a> From<&'a [u8]> {
    /// The command that reads this register.
    fn read_command() -> Command;
}

/// Registers that can be written with the doubled-byte scheme.
pub trait WritableRegister: Register {
    /// The leading byte of the write frame.
    fn write_opcode() -> u8;

    /// The constant subtracted from each data byte to make its check byte.
    fn check_constant() -> u8;
}

/// Build the five byte write frame for a register value.
///
/// The layout is `[opcode, low - K, low, high - K, high]`, with `K` the register's check
/// constant.
pub fn doubled_byte_frame<R: WritableRegister>(register: R) -> [u8; 5] {
    let [low, high]: [u8; 2] = register.into();
    let check = R::check_constant();
    [
        R::write_opcode(),
        low.wrapping_sub(check),
        low,
        high.wrapping_sub(check),
        high,
    ]
}

pub(crate) fn read_register<R, I2C>(bus: &mut I2C) -> Result<R, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
    R: Register,
{
    let register_bytes = read_word(bus, R::read_command())?;
    Ok(R::from(&register_bytes[..]))
}

pub(crate) fn write_register<R, I2C>(bus: &mut I2C, register: R) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
    R: WritableRegister,
{
    let frame = doubled_byte_frame(register);
    exchange(bus, SENSOR_ADDRESS, &frame, &mut [])
}

/// Pull a little-endian 16-bit value out of a register buffer.
///
/// This method will `panic` if there aren't enough bytes in the slice.
fn word_from_le(buf: &[u8]) -> u16 {
    let (int_bytes, _) = buf.split_at(core::mem::size_of::<u16>());
    let int_bytes: [u8; 2] = int_bytes
        .try_into()
        .expect("Not enough bytes in register buffer");
    u16::from_le_bytes(int_bytes)
}

/// The configuration register.
///
/// Only the parts of the register this crate acts on are decoded: the ADC resolution bits that
/// feed into the calibration scaling, and the brown-out flag.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct ConfigRegister(u16);

impl ConfigRegister {
    /// Mask covering the ADC resolution bits used to derive [`max_res`][ConfigRegister::max_res].
    pub const RESOLUTION_MASK: u16 = 0x0018;

    /// The bit the sensor uses to flag a brown-out.
    pub const BROWN_OUT_BIT: usize = 10;

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    /// The resolution exponent used to rescale several calibration constants.
    ///
    /// This is `3 - resolution`, where `resolution` is the two bits covered by
    /// [`RESOLUTION_MASK`][ConfigRegister::RESOLUTION_MASK].
    pub fn max_res(&self) -> i32 {
        3 - i32::from((self.0 & Self::RESOLUTION_MASK) >> 3)
    }

    /// Whether the sensor is reporting a brown-out.
    pub fn brown_out(&self) -> bool {
        is_bit_set(self.0, Self::BROWN_OUT_BIT)
    }
}

impl fmt::Debug for ConfigRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigRegister({:#06X})", self.0)
    }
}

impl Register for ConfigRegister {
    fn read_command() -> Command {
        Command::ReadConfig
    }
}

impl WritableRegister for ConfigRegister {
    fn write_opcode() -> u8 {
        0x03
    }

    fn check_constant() -> u8 {
        0x55
    }
}

impl<'a> From<&'a [u8]> for ConfigRegister {
    fn from(buf: &'a [u8]) -> Self {
        Self(word_from_le(buf))
    }
}

impl From<ConfigRegister> for [u8; 2] {
    fn from(register: ConfigRegister) -> Self {
        register.0.to_le_bytes()
    }
}

/// The oscillator trim register.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct TrimRegister(u16);

impl TrimRegister {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Debug for TrimRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrimRegister({:#06X})", self.0)
    }
}

impl Register for TrimRegister {
    fn read_command() -> Command {
        Command::ReadTrim
    }
}

impl WritableRegister for TrimRegister {
    fn write_opcode() -> u8 {
        0x04
    }

    fn check_constant() -> u8 {
        0xAA
    }
}

impl<'a> From<&'a [u8]> for TrimRegister {
    fn from(buf: &'a [u8]) -> Self {
        Self(word_from_le(buf))
    }
}

impl From<TrimRegister> for [u8; 2] {
    fn from(register: TrimRegister) -> Self {
        register.0.to_le_bytes()
    }
}
