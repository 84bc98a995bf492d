// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

// Various floating point operations are not implemented in core, so we use libm to provide them as
// needed.
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

#[doc(hidden)]
#[macro_export]
macro_rules! expose_member {
    ($name:ident, $typ:ty) => {
        fn $name(&self) -> $typ {
            self.$name
        }
    };
    (&$name:ident, $typ:ty) => {
        fn $name(&self) -> &$typ {
            &self.$name
        }
    };
}

/// Combine a high and low byte into a sign-extended 16-bit value.
///
/// Only the high byte carries the sign, the low byte is always treated as unsigned.
pub fn signed16(high: u8, low: u8) -> i16 {
    i16::from_be_bytes([high, low])
}

/// Combine a high and low byte into an unsigned 16-bit value.
pub fn unsigned16(high: u8, low: u8) -> u16 {
    u16::from_be_bytes([high, low])
}

/// Reinterpret a single byte as a two's complement signed value.
pub fn signed8(byte: u8) -> i8 {
    i8::from_be_bytes([byte])
}

/// The upper four bits of a byte, shifted down.
pub fn high_nibble(byte: u8) -> u8 {
    (byte & 0xF0) >> 4
}

/// The lower four bits of a byte.
pub fn low_nibble(byte: u8) -> u8 {
    byte & 0x0F
}

/// 2 raised to an integer power.
///
/// Several exponents come straight from signed EEPROM bytes, so this has to handle negative (and
/// fairly large) exponents. That range needs an `f64`.
pub(crate) fn pow2(exponent: i32) -> f64 {
    2f64.powi(exponent)
}

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set<B>(value: B, index: usize) -> bool
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    (value & (B::one() << index)) > B::zero()
}
