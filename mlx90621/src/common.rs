// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Calibration data access.
//!
//! The MLX90621 datasheet writes most of its calibration formulas as manual sign extension and
//! scaling of EEPROM bytes. Every coefficient ends up as an `f32`, with the per-pixel values
//! stored as three 64 entry arrays in row-major order (see [`NUM_PIXELS`][crate::NUM_PIXELS]).
//!
//! # Glossary
//! <dl>
//! <dt>
//! A, offset
//! </dt><dd>
//! The raw reading of a pixel looking at something at ambient temperature.
//! </dd>
//! <dt>
//! B, slope
//! </dt><dd>
//! How much the offset changes for each degree the ambient temperature is away from 25℃.
//! </dd>
//! <dt>
//! C, α, alpha
//! </dt><dd>
//! Sensitivity coefficient
//! </dd>
//! <dt>
//! CP
//! </dt><dd>
//! Compensation pixel
//! </dd>
//! <dt>
//! PTAT
//! </dt><dd>
//! Proportional to absolute temperature
//! </dd>
//! <dt>
//! T<sub>a</sub>, T<sub>amb</sub>
//! </dt><dd>
//! Ambient temperature
//! </dd>
//! <dt>
//! T<sub>ak4</sub>
//! </dt><dd>
//! Ambient temperature in Kelvin, raised to the fourth power.
//! </dd>
//! </dl>

/// This trait provides access to the calibration coefficients.
///
/// The default implementation is [`CalibrationCoefficients`][crate::CalibrationCoefficients],
/// which derives everything from the EEPROM and a couple of live register reads. Method names
/// follow the symbols in the datasheet.
pub trait CalibrationData {
    /// Ambient temperature threshold (V<sub>TH</sub>).
    fn v_th(&self) -> f32;

    /// First order ambient temperature constant (K<sub>T1</sub>).
    fn k_t1(&self) -> f32;

    /// Second order ambient temperature constant (K<sub>T2</sub>).
    fn k_t2(&self) -> f32;

    /// The ambient temperature (in ℃) computed when the calibration was loaded.
    fn ambient_temperature(&self) -> f32;

    /// (T<sub>a</sub> + 273.15)<sup>4</sup>
    fn t_ak4(&self) -> f32;

    /// Compensation pixel offset (A<sub>CP</sub>).
    fn offset_compensation_pixel(&self) -> f32;

    /// Compensation pixel slope (B<sub>CP</sub>).
    fn slope_compensation_pixel(&self) -> f32;

    /// Compensation pixel sensitivity (α<sub>CP</sub>).
    fn alpha_compensation_pixel(&self) -> f32;

    /// The compensation pixel reading with its offset removed.
    fn v_compensation(&self) -> f32;

    /// Common sensitivity (α<sub>0</sub>, scaled).
    fn sensitivity(&self) -> f32;

    /// Per-pixel offsets (A<sub>i(i,j)</sub>).
    fn offset_per_pixel(&self) -> &[f32];

    /// Per-pixel slopes (B<sub>i(i,j)</sub>).
    fn slope_per_pixel(&self) -> &[f32];

    /// Per-pixel sensitivities (α<sub>(i,j)</sub>).
    fn alpha_per_pixel(&self) -> &[f32];
}
