// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The size of the MLX90621 EEPROM in bytes.
pub const EEPROM_LENGTH: usize = 256;

/// The number of pixels on the sensor.
pub const NUM_PIXELS: usize = 64;

/// The configuration register value stored in the synthetic EEPROM (0xF5 and 0xF6).
pub const SYNTHETIC_CONFIG: u16 = 0x0806;

/// The trim value stored in the synthetic EEPROM (0xF7).
pub const SYNTHETIC_TRIM: u8 = 0x2C;

/// A made up, but plausible, calibration EEPROM.
///
/// There isn't a worked example for the MLX90621 like there is for the later cameras, so these
/// values were chosen to land somewhere in the ranges seen on real parts:
///
/// * Configuration seed 0x0806, which has a full resolution (`MaxRes` of 3) and no brown-out
///   flag.
/// * K<sub>T1</sub> and K<sub>T2</sub> scales of 7.
/// * V<sub>TH</sub> 26400, K<sub>T1</sub> 22118, K<sub>T2</sub> 19398 (all raw).
/// * A<sub>common</sub> of -40 with an A<sub>i</sub> scale of 1 and a B<sub>i</sub> scale of 4.
/// * A<sub>CP</sub> -30, B<sub>CP</sub> 16, α<sub>CP</sub> 512.
/// * α<sub>0</sub> 0x4000 with a scale of 40 and a Δα scale of 48.
///
/// The per-pixel banks vary a little from pixel to pixel so that index mix-ups show up in tests.
pub fn synthetic_eeprom() -> [u8; EEPROM_LENGTH] {
    let mut eeprom = [0u8; EEPROM_LENGTH];
    for pixel in 0..NUM_PIXELS {
        // A_i(ij)
        eeprom[pixel] = 20 + (pixel % 8) as u8;
        // B_i(ij), small negative slopes
        eeprom[0x40 + pixel] = 0xF0u8.wrapping_add((pixel % 4) as u8);
        // Δα(ij)
        eeprom[0x80 + pixel] = 100 + (pixel / 2) as u8;
    }
    let scalars: [(usize, u8); 24] = [
        // A_common
        (0xD0, 0xD8),
        (0xD1, 0xFF),
        // K_T1 and K_T2 scales
        (0xD2, 0x77),
        // A_CP
        (0xD3, 0xE2),
        (0xD4, 0xFF),
        // B_CP
        (0xD5, 0x10),
        // α_CP
        (0xD6, 0x00),
        (0xD7, 0x02),
        // A_i and B_i scales
        (0xD9, 0x14),
        // V_TH
        (0xDA, 0x20),
        (0xDB, 0x67),
        // K_T1
        (0xDC, 0x66),
        (0xDD, 0x56),
        // K_T2
        (0xDE, 0xC6),
        (0xDF, 0x4B),
        // α_0
        (0xE0, 0x00),
        (0xE1, 0x40),
        // α_0 scale
        (0xE2, 40),
        // Δα scale
        (0xE3, 48),
        // Emissivity, unused but present on real parts
        (0xE4, 0x00),
        (0xE5, 0x80),
        // Configuration seed
        (0xF5, (SYNTHETIC_CONFIG & 0xFF) as u8),
        (0xF6, (SYNTHETIC_CONFIG >> 8) as u8),
        // Oscillator trim
        (0xF7, SYNTHETIC_TRIM),
    ];
    for (address, value) in scalars.iter() {
        eeprom[*address] = *value;
    }
    eeprom
}
