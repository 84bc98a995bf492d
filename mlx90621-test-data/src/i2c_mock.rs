// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use embedded_hal::blocking::{delay, i2c};

use crate::eeprom_data::{synthetic_eeprom, EEPROM_LENGTH, NUM_PIXELS};

/// The I²C address the EEPROM responds on.
pub const EEPROM_ADDRESS: u8 = 0x50;

/// The I²C address the sensor responds on.
pub const SENSOR_ADDRESS: u8 = 0x60;

const RECENT_OPERATIONS_QUEUE_LENGTH: usize = 32;

const READ_IR_COMMAND: [u8; 4] = [0x02, 0x00, 0x01, 0x40];
const READ_PTAT_COMMAND: [u8; 4] = [0x02, 0x40, 0x00, 0x01];
const READ_VCOMP_COMMAND: [u8; 4] = [0x02, 0x41, 0x00, 0x01];
const READ_CONFIG_COMMAND: [u8; 4] = [0x02, 0x92, 0x00, 0x01];
const READ_TRIM_COMMAND: [u8; 4] = [0x02, 0x93, 0x00, 0x01];

const WRITE_CONFIG_OPCODE: u8 = 0x03;
const CONFIG_CHECK_CONSTANT: u8 = 0x55;
const WRITE_TRIM_OPCODE: u8 = 0x04;
const TRIM_CHECK_CONSTANT: u8 = 0xAA;

const BROWN_OUT_FLAG: u16 = 0x0400;

/// Default PTAT reading for the synthetic sensor, chosen to give an ambient temperature a little
/// above 25℃ with the synthetic EEPROM.
pub const DEFAULT_PTAT: u16 = 3350;

/// Default compensation pixel reading.
pub const DEFAULT_VCOMP: i16 = -20;

/// Default raw reading for every pixel.
pub const DEFAULT_IR_VALUE: i16 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    /// The test asked for this transaction to fail.
    InjectedFailure,

    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The command bytes (or the amount of data requested) don't match anything the sensor
    /// understands.
    UnknownCommand,

    /// A doubled-byte write had a check byte that didn't match its data byte.
    IllegalWriteValue { opcode: u8, check: u8, value: u8 },
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockError::InjectedFailure => write!(f, "injected failure"),
            MockError::UnknownI2cAddress(address) => {
                write!(f, "unknown I2C address {:#04X}", address)
            }
            MockError::UnknownCommand => write!(f, "unknown command"),
            MockError::IllegalWriteValue {
                opcode,
                check,
                value,
            } => write!(
                f,
                "bad check byte {:#04X} for {:#04X} (opcode {:#04X})",
                check, value, opcode
            ),
        }
    }
}

impl std::error::Error for MockError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOperation {
    Write {
        address: u8,
        length: usize,
    },
    WriteRead {
        address: u8,
        command: Vec<u8>,
        length: usize,
    },
}

#[derive(Clone, Copy, Debug, Default)]
struct InjectedFailures {
    eeprom: bool,
    ptat: bool,
    vcomp: bool,
    config: bool,
    trim: bool,
    ir: bool,
    writes: bool,
}

#[derive(Clone, Debug)]
struct SensorState {
    eeprom: [u8; EEPROM_LENGTH],
    config: u16,
    trim: u16,
    brown_out: bool,
    ptat: u16,
    vcomp: i16,
    ir_frame: [i16; NUM_PIXELS],
    failures: InjectedFailures,
    eeprom_reads: usize,
}

/// A mock I²C bus with an MLX90621 (and its EEPROM) attached.
///
/// Clones share their state, so a test can keep a clone for fault injection and inspection after
/// handing the bus off to a driver.
#[derive(Clone, Debug)]
pub struct MockSensorBus {
    state: Rc<RefCell<SensorState>>,
    recent_operations: Rc<RefCell<VecDeque<BusOperation>>>,
}

impl MockSensorBus {
    pub fn new(eeprom: [u8; EEPROM_LENGTH]) -> Self {
        let state = SensorState {
            eeprom,
            config: 0,
            trim: 0,
            brown_out: false,
            ptat: DEFAULT_PTAT,
            vcomp: DEFAULT_VCOMP,
            ir_frame: [DEFAULT_IR_VALUE; NUM_PIXELS],
            failures: InjectedFailures::default(),
            eeprom_reads: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            recent_operations: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn set_eeprom(&mut self, eeprom: [u8; EEPROM_LENGTH]) {
        self.state.borrow_mut().eeprom = eeprom;
    }

    pub fn set_ptat(&mut self, ptat: u16) {
        self.state.borrow_mut().ptat = ptat;
    }

    pub fn set_vcomp(&mut self, vcomp: i16) {
        self.state.borrow_mut().vcomp = vcomp;
    }

    /// Replace the raw infrared readings, in pixel order.
    pub fn set_ir_frame(&mut self, ir_frame: [i16; NUM_PIXELS]) {
        self.state.borrow_mut().ir_frame = ir_frame;
    }

    /// Set the brown-out flag in the configuration register.
    ///
    /// The flag is cleared again by the next configuration register write, the same way
    /// re-initializing the sensor clears it.
    pub fn set_brown_out(&mut self, brown_out: bool) {
        self.state.borrow_mut().brown_out = brown_out;
    }

    /// The configuration register as the sensor would report it.
    pub fn config(&self) -> u16 {
        let state = self.state.borrow();
        if state.brown_out {
            state.config | BROWN_OUT_FLAG
        } else {
            state.config
        }
    }

    pub fn trim(&self) -> u16 {
        self.state.borrow().trim
    }

    /// How many times the EEPROM has been dumped (successfully or not).
    pub fn eeprom_reads(&self) -> usize {
        self.state.borrow().eeprom_reads
    }

    pub fn fail_eeprom(&mut self, fail: bool) {
        self.state.borrow_mut().failures.eeprom = fail;
    }

    pub fn fail_ptat(&mut self, fail: bool) {
        self.state.borrow_mut().failures.ptat = fail;
    }

    pub fn fail_vcomp(&mut self, fail: bool) {
        self.state.borrow_mut().failures.vcomp = fail;
    }

    /// Fail reads of the configuration register.
    pub fn fail_config(&mut self, fail: bool) {
        self.state.borrow_mut().failures.config = fail;
    }

    /// Fail reads of the trim register.
    pub fn fail_trim(&mut self, fail: bool) {
        self.state.borrow_mut().failures.trim = fail;
    }

    pub fn fail_ir(&mut self, fail: bool) {
        self.state.borrow_mut().failures.ir = fail;
    }

    /// Fail every write-only transaction (the register writes).
    pub fn fail_writes(&mut self, fail: bool) {
        self.state.borrow_mut().failures.writes = fail;
    }

    fn add_operation(&self, operation: BusOperation) {
        let mut recent_ops = self.recent_operations.borrow_mut();
        recent_ops.push_front(operation);
        recent_ops.truncate(RECENT_OPERATIONS_QUEUE_LENGTH);
    }

    /// The most recent bus transactions, newest first.
    pub fn recent_operations(&self) -> Ref<VecDeque<BusOperation>> {
        self.recent_operations.borrow()
    }

    pub fn clear_recent_operations(&self) {
        self.recent_operations.borrow_mut().clear()
    }

    fn read_eeprom(&self, command: &[u8], out_buffer: &mut [u8]) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        state.eeprom_reads += 1;
        if state.failures.eeprom {
            return Err(MockError::InjectedFailure);
        }
        // Only dumps from the start of the EEPROM are supported.
        if command != &[0x00][..] || out_buffer.len() > EEPROM_LENGTH {
            return Err(MockError::UnknownCommand);
        }
        let length = out_buffer.len();
        out_buffer.copy_from_slice(&state.eeprom[..length]);
        Ok(())
    }

    fn read_sensor(&self, command: &[u8], out_buffer: &mut [u8]) -> Result<(), MockError> {
        let state = self.state.borrow();
        let (failed, expected_length) = match command {
            c if c == &READ_IR_COMMAND[..] => (state.failures.ir, NUM_PIXELS * 2),
            c if c == &READ_PTAT_COMMAND[..] => (state.failures.ptat, 2),
            c if c == &READ_VCOMP_COMMAND[..] => (state.failures.vcomp, 2),
            c if c == &READ_CONFIG_COMMAND[..] => (state.failures.config, 2),
            c if c == &READ_TRIM_COMMAND[..] => (state.failures.trim, 2),
            _ => return Err(MockError::UnknownCommand),
        };
        if failed {
            return Err(MockError::InjectedFailure);
        }
        if out_buffer.len() != expected_length {
            return Err(MockError::UnknownCommand);
        }
        match command {
            c if c == &READ_IR_COMMAND[..] => {
                out_buffer
                    .chunks_exact_mut(2)
                    .zip(state.ir_frame.iter())
                    .for_each(|(bytes, value)| bytes.copy_from_slice(&value.to_le_bytes()));
            }
            c if c == &READ_PTAT_COMMAND[..] => {
                out_buffer.copy_from_slice(&state.ptat.to_le_bytes())
            }
            c if c == &READ_VCOMP_COMMAND[..] => {
                out_buffer.copy_from_slice(&state.vcomp.to_le_bytes())
            }
            c if c == &READ_CONFIG_COMMAND[..] => {
                let config = if state.brown_out {
                    state.config | BROWN_OUT_FLAG
                } else {
                    state.config
                };
                out_buffer.copy_from_slice(&config.to_le_bytes())
            }
            _ => out_buffer.copy_from_slice(&state.trim.to_le_bytes()),
        }
        Ok(())
    }

    fn write_register(&self, bytes: &[u8]) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        if state.failures.writes {
            return Err(MockError::InjectedFailure);
        }
        if bytes.len() != 5 {
            return Err(MockError::UnknownCommand);
        }
        let opcode = bytes[0];
        let check_constant = match opcode {
            WRITE_CONFIG_OPCODE => CONFIG_CHECK_CONSTANT,
            WRITE_TRIM_OPCODE => TRIM_CHECK_CONSTANT,
            _ => return Err(MockError::UnknownCommand),
        };
        // Check both halves before changing anything
        for pair in bytes[1..].chunks_exact(2) {
            let (check, value) = (pair[0], pair[1]);
            if value.wrapping_sub(check_constant) != check {
                return Err(MockError::IllegalWriteValue {
                    opcode,
                    check,
                    value,
                });
            }
        }
        let value = u16::from_le_bytes([bytes[2], bytes[4]]);
        if opcode == WRITE_CONFIG_OPCODE {
            state.config = value;
            state.brown_out = false;
        } else {
            state.trim = value;
        }
        Ok(())
    }
}

impl i2c::Write for MockSensorBus {
    type Error = MockError;

    fn write(&mut self, i2c_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if i2c_address != SENSOR_ADDRESS {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        self.add_operation(BusOperation::Write {
            address: i2c_address,
            length: bytes.len(),
        });
        self.write_register(bytes)
    }
}

impl i2c::WriteRead for MockSensorBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        i2c_address: u8,
        write_buffer: &[u8],
        out_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        if i2c_address != SENSOR_ADDRESS && i2c_address != EEPROM_ADDRESS {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        self.add_operation(BusOperation::WriteRead {
            address: i2c_address,
            command: write_buffer.to_vec(),
            length: out_buffer.len(),
        });
        if i2c_address == EEPROM_ADDRESS {
            self.read_eeprom(write_buffer, out_buffer)
        } else {
            self.read_sensor(write_buffer, out_buffer)
        }
    }
}

/// A delay that returns immediately, keeping a running total of the time it was asked to wait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockDelay {
    total_us: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_us(&self) -> u64 {
        self.total_us
    }
}

impl delay::DelayUs<u32> for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.total_us += u64::from(us);
    }
}

/// A mock bus using [`synthetic_eeprom`] and the default register values.
pub fn synthetic_sensor_bus() -> MockSensorBus {
    MockSensorBus::new(synthetic_eeprom())
}

#[cfg(test)]
mod test {
    use embedded_hal::blocking::i2c::{Write, WriteRead};

    use super::*;

    #[test]
    fn config_write_checked() {
        let mut bus = synthetic_sensor_bus();
        // Bad check byte for the high half
        let result = bus.write(SENSOR_ADDRESS, &[0x03, 0xB1, 0x06, 0xB4, 0x08]);
        assert_eq!(
            result,
            Err(MockError::IllegalWriteValue {
                opcode: 0x03,
                check: 0xB4,
                value: 0x08
            })
        );
        assert_eq!(bus.config(), 0);
        bus.write(SENSOR_ADDRESS, &[0x03, 0xB1, 0x06, 0xB3, 0x08])
            .unwrap();
        assert_eq!(bus.config(), 0x0806);
    }

    #[test]
    fn brown_out_cleared_by_config_write() {
        let mut bus = synthetic_sensor_bus();
        bus.set_brown_out(true);
        let mut config = [0u8; 2];
        bus.write_read(SENSOR_ADDRESS, &READ_CONFIG_COMMAND, &mut config)
            .unwrap();
        assert_eq!(config, [0x00, 0x04]);
        bus.write(SENSOR_ADDRESS, &[0x03, 0xB1, 0x06, 0xB3, 0x08])
            .unwrap();
        bus.write_read(SENSOR_ADDRESS, &READ_CONFIG_COMMAND, &mut config)
            .unwrap();
        assert_eq!(config, [0x06, 0x08]);
    }

    #[test]
    fn ir_frame_little_endian() {
        let mut bus = synthetic_sensor_bus();
        let mut frame = [0i16; NUM_PIXELS];
        frame[0] = -2;
        frame[63] = 0x0102;
        bus.set_ir_frame(frame);
        let mut raw = [0u8; NUM_PIXELS * 2];
        bus.write_read(SENSOR_ADDRESS, &READ_IR_COMMAND, &mut raw)
            .unwrap();
        assert_eq!(&raw[..2], &[0xFE, 0xFF]);
        assert_eq!(&raw[126..], &[0x02, 0x01]);
    }

    #[test]
    fn shared_state() {
        let bus = synthetic_sensor_bus();
        let mut handle = bus.clone();
        handle.fail_ptat(true);
        let mut bus = bus;
        let mut ptat = [0u8; 2];
        assert_eq!(
            bus.write_read(SENSOR_ADDRESS, &READ_PTAT_COMMAND, &mut ptat),
            Err(MockError::InjectedFailure)
        );
        assert_eq!(handle.recent_operations().len(), 1);
    }
}
