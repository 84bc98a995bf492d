// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Converting raw readings into temperatures.
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use crate::calibration::{KELVIN_OFFSET, T_A_REFERENCE};
use crate::common::CalibrationData;
use crate::frame::RawIrFrame;
use crate::NUM_PIXELS;

/// An ambient temperature and a full set of pixel temperatures, all in ℃.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureFrame {
    pub ambient: f32,
    pub pixels: [f32; NUM_PIXELS],
}

/// Calculate the temperature of a single pixel.
///
/// Invalid inputs (like a negative value under the fourth root) give NaN, which is returned
/// as-is.
pub fn pixel_temperature<Clb: CalibrationData>(calibration: &Clb, index: usize, raw: i16) -> f32 {
    let t_a_delta = f64::from(calibration.ambient_temperature()) - f64::from(T_A_REFERENCE);
    let offset = f64::from(calibration.offset_per_pixel()[index])
        + t_a_delta * f64::from(calibration.slope_per_pixel()[index]);
    let t = (f64::from(raw) - offset) / f64::from(calibration.alpha_per_pixel()[index])
        + f64::from(calibration.t_ak4());
    (t.sqrt().sqrt() - KELVIN_OFFSET) as f32
}

/// Convert a raw infrared frame into temperatures.
///
/// This is a pure function; the same frame and calibration always give the same result.
pub fn convert<Clb: CalibrationData>(raw: &RawIrFrame, calibration: &Clb) -> TemperatureFrame {
    let mut pixels = [0f32; NUM_PIXELS];
    pixels
        .iter_mut()
        .zip(raw.pixels().iter())
        .enumerate()
        .for_each(|(index, (temperature, raw))| {
            *temperature = pixel_temperature(calibration, index, *raw)
        });
    TemperatureFrame {
        ambient: calibration.ambient_temperature(),
        pixels,
    }
}
