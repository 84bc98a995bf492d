// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Console dumps of the sensor's memory, calibration, and readings.
use std::io::{self, Write};

use mlx90621::{CalibrationData, EepromImage, RawIrFrame, TemperatureFrame};

/// The number of values on each row of a table.
const ROW_LENGTH: usize = 16;

/// Format a value like C's `%.3e`, with a sign and at least two digits in the exponent.
fn scientific(value: f32) -> String {
    let formatted = format!("{:.3e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => {
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{}e{}{:02}", mantissa, sign, exponent.abs())
            }
            Err(_) => formatted,
        },
        // NaN and the infinities
        None => formatted,
    }
}

/// Write the title and the column header shared by both kinds of table.
fn table_header<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    write!(out, "{} :=\n    ", title)?;
    for column in 0..ROW_LENGTH {
        let separator = if column == ROW_LENGTH - 1 { '\n' } else { ' ' };
        write!(out, "   {:02x}{}", column, separator)?;
    }
    Ok(())
}

fn table<W, T, F>(out: &mut W, title: &str, values: &[T], mut cell: F) -> io::Result<()>
where
    W: Write,
    F: FnMut(&mut W, &T) -> io::Result<()>,
{
    table_header(out, title)?;
    for (index, value) in values.iter().enumerate() {
        if index % ROW_LENGTH == 0 {
            write!(out, "{:02x}: ", index)?;
        }
        cell(out, value)?;
        let last_in_row = index % ROW_LENGTH == ROW_LENGTH - 1 || index == values.len() - 1;
        write!(out, "{}", if last_in_row { '\n' } else { ' ' })?;
    }
    Ok(())
}

/// Write a table of bytes in hex, 16 to a row.
pub fn hex_table<W: Write>(out: &mut W, title: &str, bytes: &[u8]) -> io::Result<()> {
    table(out, title, bytes, |out, byte| write!(out, "   {:02x}", byte))
}

/// Write a table of floats with one decimal place, 16 to a row.
pub fn float_table<W: Write>(out: &mut W, title: &str, values: &[f32]) -> io::Result<()> {
    table(out, title, values, |out, value| write!(out, "{:05.1}", value))
}

pub fn eeprom<W: Write>(out: &mut W, eeprom: &EepromImage) -> io::Result<()> {
    hex_table(out, "EEprom", eeprom.as_bytes())
}

/// Write the scalar coefficients, and at `verbosity` 3 and above the per-pixel arrays as well.
pub fn coefficients<W, Clb>(out: &mut W, calibration: &Clb, verbosity: u8) -> io::Result<()>
where
    W: Write,
    Clb: CalibrationData,
{
    writeln!(out, "Vth  = {}", scientific(calibration.v_th()))?;
    writeln!(out, "Tamb = {:7.2}", calibration.ambient_temperature())?;
    writeln!(out, "Tak4 = {}", scientific(calibration.t_ak4()))?;
    writeln!(out, "Kt1  = {:7.2}", calibration.k_t1())?;
    writeln!(out, "Kt2  = {:7.2}", calibration.k_t2())?;
    writeln!(out, "Acp  = {:7.2}", calibration.offset_compensation_pixel())?;
    writeln!(out, "Bcp  = {:7.2}", calibration.slope_compensation_pixel())?;
    writeln!(out, "Ccp  = {}", scientific(calibration.alpha_compensation_pixel()))?;
    writeln!(out, "Vcomp= {:7.2}", calibration.v_compensation())?;
    writeln!(out, "Sens = {}", scientific(calibration.sensitivity()))?;
    if verbosity >= 3 {
        float_table(out, "Tarray Aij", calibration.offset_per_pixel())?;
        float_table(out, "Tarray Bij", calibration.slope_per_pixel())?;
        float_table(out, "Tarray Cij", calibration.alpha_per_pixel())?;
    }
    Ok(())
}

/// Write the raw infrared frame as the bytes the sensor sent.
pub fn raw_frame<W: Write>(out: &mut W, frame: &RawIrFrame) -> io::Result<()> {
    let bytes: Vec<u8> = frame
        .pixels()
        .iter()
        .flat_map(|pixel| pixel.to_le_bytes())
        .collect();
    hex_table(out, "Tarray", &bytes)
}

pub fn temperatures<W: Write>(out: &mut W, frame: &TemperatureFrame) -> io::Result<()> {
    write!(out, "Tamb {:2.1} 'C  ", frame.ambient)?;
    float_table(out, "Array temperature 'C", &frame.pixels)
}
