// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Turning the EEPROM and a couple of live readings into calibration coefficients.
//!
//! Everything here is derived together: the ambient temperature feeds into the compensation
//! pixel values and T<sub>ak4</sub>, so there is no way to refresh part of a
//! [`CalibrationCoefficients`].
use core::array;

#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use embedded_hal::blocking::i2c;

use crate::address::EepromAddress;
use crate::common::CalibrationData;
use crate::eeprom::{EepromImage, PixelBank};
use crate::error::{CalibrationError, Error};
use crate::expose_member;
use crate::register::{read_ptat, read_vcomp, ConfigRegister};
use crate::util::{pow2, signed8};
use crate::NUM_PIXELS;

/// The reference ambient temperature for the calibration constants, in ℃.
pub(crate) const T_A_REFERENCE: f32 = 25.0;

/// 0℃ in Kelvin.
pub(crate) const KELVIN_OFFSET: f64 = 273.15;

/// The live readings needed while extracting the calibration coefficients.
///
/// The extraction reads PTAT first (after the ambient constants have been decoded) and the
/// compensation pixel second (after the ambient temperature has been computed). If a read fails,
/// nothing after it is attempted.
pub trait AmbientReadings {
    type Error: From<CalibrationError>;

    /// The raw PTAT value.
    fn ptat(&mut self) -> Result<u16, Self::Error>;

    /// The raw compensation pixel value.
    fn compensation_pixel(&mut self) -> Result<i16, Self::Error>;
}

struct BusReadings<'a, I2C>(&'a mut I2C);

impl<'a, I2C> AmbientReadings for BusReadings<'a, I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    type Error = Error<I2C>;

    fn ptat(&mut self) -> Result<u16, Self::Error> {
        read_ptat(self.0)
    }

    fn compensation_pixel(&mut self) -> Result<i16, Self::Error> {
        read_vcomp(self.0)
    }
}

/// The calibration coefficients for one session with the sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationCoefficients {
    v_th: f32,
    k_t1: f32,
    k_t2: f32,
    ambient_temperature: f32,
    t_ak4: f32,
    offset_compensation_pixel: f32,
    slope_compensation_pixel: f32,
    alpha_compensation_pixel: f32,
    v_compensation: f32,
    sensitivity: f32,
    offset_per_pixel: [f32; NUM_PIXELS],
    slope_per_pixel: [f32; NUM_PIXELS],
    alpha_per_pixel: [f32; NUM_PIXELS],
}

impl CalibrationCoefficients {
    /// Extract the coefficients, reading PTAT and the compensation pixel over I²C.
    ///
    /// `config` should be the configuration register as read back from the sensor after it was
    /// written during initialization.
    pub fn from_i2c<I2C>(
        bus: &mut I2C,
        eeprom: &EepromImage,
        config: ConfigRegister,
    ) -> Result<Self, Error<I2C>>
    where
        I2C: i2c::WriteRead + i2c::Write,
    {
        extract_coefficients(eeprom, config, &mut BusReadings(bus))
    }
}

/// Divide a raw EEPROM value by 2<sup>`exponent`</sup>, rounding to `f32` only at the end.
///
/// The scale exponents come from signed EEPROM bytes, so they can run past what an `f32` power of
/// two can hold even when the quotient itself fits.
fn scaled<T: Into<f64>>(raw: T, exponent: i32) -> f32 {
    (raw.into() / pow2(exponent)) as f32
}

/// Calculate the ambient temperature (in ℃).
///
/// The precision of each step matters here, as the radicand is sensitive to rounding. The
/// squares and the constants are `f32`, the radicand and its root are `f64`.
fn ambient_temperature(
    v_th: f32,
    k_t1: f32,
    k_t2: f32,
    ptat: u16,
) -> Result<f32, CalibrationError> {
    let ptat_delta = v_th - f32::from(ptat);
    let radicand = f64::from(k_t1 * k_t1) - f64::from(ptat_delta) * 4.0 * f64::from(k_t2);
    // Also catches a NaN radicand
    if !(radicand >= 0.0) {
        return Err(CalibrationError::NegativeRadicand(radicand));
    }
    let mut t_a = (radicand.sqrt() - f64::from(k_t1)) as f32;
    t_a /= 2.0 * k_t2;
    t_a += T_A_REFERENCE;
    if t_a.is_finite() {
        Ok(t_a)
    } else {
        Err(CalibrationError::NonFiniteAmbient(t_a))
    }
}

/// Derive every calibration coefficient from the EEPROM image, the configuration register, and
/// live PTAT and compensation pixel readings.
///
/// This is a pure function of its inputs: the same EEPROM, configuration, and readings always
/// give bit-identical coefficients.
pub fn extract_coefficients<R>(
    eeprom: &EepromImage,
    config: ConfigRegister,
    readings: &mut R,
) -> Result<CalibrationCoefficients, R::Error>
where
    R: AmbientReadings,
{
    let max_res = config.max_res();
    let k_t1_scale = i32::from(eeprom.high_nibble(EepromAddress::PtatScales));
    let k_t2_scale = i32::from(eeprom.low_nibble(EepromAddress::PtatScales));
    let offset_scale = i32::from(eeprom.high_nibble(EepromAddress::PixelScales));
    let slope_scale = i32::from(eeprom.low_nibble(EepromAddress::PixelScales));
    let alpha_scale = i32::from(eeprom.signed8(EepromAddress::SensitivityScale));
    let delta_alpha_scale =
        pow2(-i32::from(eeprom.signed8(EepromAddress::SensitivityDeltaScale))) as f32;

    let v_th = scaled(eeprom.signed16(EepromAddress::Vth), max_res);
    let k_t1 = scaled(eeprom.signed16(EepromAddress::Kt1), k_t1_scale + max_res);
    let k_t2 = scaled(eeprom.signed16(EepromAddress::Kt2), 10 + k_t2_scale + max_res);

    let ptat = readings.ptat()?;
    let t_a = ambient_temperature(v_th, k_t1, k_t2, ptat)?;
    let v_cp = readings.compensation_pixel()?;

    let t_ak4 = (f64::from(t_a) + KELVIN_OFFSET).powi(4) as f32;
    let t_a_delta = f64::from(t_a) - f64::from(T_A_REFERENCE);

    let offset_compensation_pixel =
        scaled(eeprom.signed16(EepromAddress::CompensationOffset), max_res);
    let slope_compensation_pixel = scaled(
        eeprom.signed8(EepromAddress::CompensationSlope),
        slope_scale + max_res,
    );
    let alpha_compensation_pixel = scaled(
        eeprom.signed16(EepromAddress::CompensationSensitivity),
        alpha_scale + max_res,
    );
    let v_compensation = (f64::from(v_cp)
        - (f64::from(offset_compensation_pixel)
            + t_a_delta * f64::from(slope_compensation_pixel))) as f32;

    let offset_common = f64::from(eeprom.signed16(EepromAddress::OffsetCommon));
    let sensitivity = scaled(eeprom.signed16(EepromAddress::Sensitivity), alpha_scale);

    let offsets = eeprom.pixel_bank(PixelBank::Offset);
    let slopes = eeprom.pixel_bank(PixelBank::Slope);
    let alphas = eeprom.pixel_bank(PixelBank::Sensitivity);
    let offset_per_pixel = array::from_fn(|index| {
        ((f64::from(offsets[index]) * pow2(offset_scale) + offset_common) / pow2(max_res)) as f32
    });
    let slope_per_pixel =
        array::from_fn(|index| scaled(signed8(slopes[index]), slope_scale + max_res));
    let alpha_per_pixel = array::from_fn(|index| {
        ((f64::from(alphas[index]) * f64::from(delta_alpha_scale) + f64::from(sensitivity))
            / pow2(max_res)) as f32
    });

    Ok(CalibrationCoefficients {
        v_th,
        k_t1,
        k_t2,
        ambient_temperature: t_a,
        t_ak4,
        offset_compensation_pixel,
        slope_compensation_pixel,
        alpha_compensation_pixel,
        v_compensation,
        sensitivity,
        offset_per_pixel,
        slope_per_pixel,
        alpha_per_pixel,
    })
}

impl CalibrationData for CalibrationCoefficients {
    expose_member!(v_th, f32);
    expose_member!(k_t1, f32);
    expose_member!(k_t2, f32);
    expose_member!(ambient_temperature, f32);
    expose_member!(t_ak4, f32);
    expose_member!(offset_compensation_pixel, f32);
    expose_member!(slope_compensation_pixel, f32);
    expose_member!(alpha_compensation_pixel, f32);
    expose_member!(v_compensation, f32);
    expose_member!(sensitivity, f32);
    expose_member!(&offset_per_pixel, [f32]);
    expose_member!(&slope_per_pixel, [f32]);
    expose_member!(&alpha_per_pixel, [f32]);
}
