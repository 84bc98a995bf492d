// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
mod eeprom_data;
mod i2c_mock;

pub use eeprom_data::{
    synthetic_eeprom, EEPROM_LENGTH, NUM_PIXELS, SYNTHETIC_CONFIG, SYNTHETIC_TRIM,
};
pub use i2c_mock::{
    synthetic_sensor_bus, BusOperation, MockDelay, MockError, MockSensorBus, DEFAULT_IR_VALUE,
    DEFAULT_PTAT, DEFAULT_VCOMP, EEPROM_ADDRESS, SENSOR_ADDRESS,
};
