// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

use core::fmt;

use embedded_hal::blocking::{delay, i2c};
use log::{debug, info, warn};

use crate::address::BUS_CLOCK_HZ;
use crate::calculations::{convert, TemperatureFrame};
use crate::calibration::CalibrationCoefficients;
use crate::common::CalibrationData;
use crate::eeprom::EepromImage;
use crate::error::Error;
use crate::frame::RawIrFrame;
use crate::register::{read_register, write_register, ConfigRegister, TrimRegister};

/// How long to let the sensor settle after bringing up the bus, in microseconds.
const SETTLE_DELAY_US: u32 = 5_000;

/// The states a [`Mlx90621Driver`] moves through.
///
/// A driver starts out `Uninitialized`, and [`initialize`][Mlx90621Driver::initialize] moves it
/// through `Initializing` to either `Ready` or `Faulted`. A `Ready` driver becomes `Faulted` when
/// a fault is detected, and can be initialized again from there. `Shutdown` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Initializing,
    Ready,
    Faulted,
    Shutdown,
}

/// The calibration for the current session with the sensor.
///
/// A session is created by each successful initialization, and is invalidated (but kept around for
/// inspection) when a fault is detected.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSession {
    coefficients: CalibrationCoefficients,
    valid: bool,
}

impl DeviceSession {
    fn new(coefficients: CalibrationCoefficients) -> Self {
        Self {
            coefficients,
            valid: true,
        }
    }

    pub fn coefficients(&self) -> &CalibrationCoefficients {
        &self.coefficients
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Driver for the MLX90621.
///
/// The driver owns the bus (and a delay provider), along with the only copy of the current
/// [`DeviceSession`]. Every bus operation is blocking, and there is no timeout on any of them.
#[derive(Clone, Debug)]
pub struct Mlx90621Driver<I2C, D> {
    bus: I2C,

    delay: D,

    state: DeviceState,

    session: Option<DeviceSession>,

    /// The EEPROM as of the most recent initialization.
    eeprom: Option<EepromImage>,

    /// The most recently read configuration register.
    config: Option<ConfigRegister>,

    /// The raw readings from the most recent sample.
    last_raw_frame: Option<RawIrFrame>,
}

impl<I2C, D> Mlx90621Driver<I2C, D>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
    D: delay::DelayUs<u32>,
{
    /// Create a new driver. Nothing is sent over the bus until the driver is initialized.
    pub fn new(bus: I2C, delay: D) -> Self {
        Self {
            bus,
            delay,
            state: DeviceState::Uninitialized,
            session: None,
            eeprom: None,
            config: None,
            last_raw_frame: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// The current session, if the sensor has ever been initialized.
    ///
    /// Check [`DeviceSession::is_valid`] before trusting the coefficients.
    pub fn session(&self) -> Option<&DeviceSession> {
        self.session.as_ref()
    }

    /// The coefficients of the current session, but only if it is still valid.
    pub fn coefficients(&self) -> Option<&CalibrationCoefficients> {
        self.session
            .as_ref()
            .filter(|session| session.is_valid())
            .map(DeviceSession::coefficients)
    }

    /// The most recently loaded EEPROM.
    pub fn eeprom(&self) -> Option<&EepromImage> {
        self.eeprom.as_ref()
    }

    /// The most recently read value of the configuration register.
    pub fn config(&self) -> Option<ConfigRegister> {
        self.config
    }

    pub fn last_raw_frame(&self) -> Option<&RawIrFrame> {
        self.last_raw_frame.as_ref()
    }

    /// Read the oscillator trim register from the sensor.
    pub fn trim_register(&mut self) -> Result<TrimRegister, Error<I2C>> {
        self.reject_in(&[DeviceState::Shutdown])?;
        read_register(&mut self.bus)
    }

    fn reject_in(&self, states: &[DeviceState]) -> Result<(), Error<I2C>> {
        if states.contains(&self.state) {
            Err(Error::InvalidState(self.state))
        } else {
            Ok(())
        }
    }

    fn fault(&mut self) {
        if self.state != DeviceState::Faulted {
            warn!("Sensor moving from {:?} to Faulted", self.state);
        }
        self.state = DeviceState::Faulted;
        if let Some(session) = self.session.as_mut() {
            session.invalidate();
        }
    }

    /// (Re)initialize the sensor.
    ///
    /// This loads the EEPROM, writes the trim and configuration values from it to the sensor,
    /// reads the configuration back, and then extracts a fresh set of calibration coefficients.
    /// If any step fails the driver is left `Faulted` with no valid session.
    pub fn initialize(&mut self) -> Result<(), Error<I2C>> {
        self.reject_in(&[DeviceState::Shutdown, DeviceState::Initializing])?;
        self.state = DeviceState::Initializing;
        if let Some(session) = self.session.as_mut() {
            session.invalidate();
        }
        match self.bring_up() {
            Ok(session) => {
                info!(
                    "Sensor initialized, ambient temperature {:.2}℃",
                    session.coefficients().ambient_temperature()
                );
                self.session = Some(session);
                self.state = DeviceState::Ready;
                Ok(())
            }
            Err(err) => {
                warn!("Sensor initialization failed: {}", err);
                self.fault();
                Err(err)
            }
        }
    }

    fn bring_up(&mut self) -> Result<DeviceSession, Error<I2C>> {
        debug!("Bringing up the bus (expecting a {} Hz clock)", BUS_CLOCK_HZ);
        self.delay.delay_us(SETTLE_DELAY_US);
        debug!("Loading EEPROM");
        let eeprom = self.eeprom.insert(EepromImage::from_i2c(&mut self.bus)?);
        let trim = eeprom.trim_seed();
        debug!("Writing {:?}", trim);
        write_register(&mut self.bus, trim)?;
        let config_seed = eeprom.config_seed();
        debug!("Writing {:?}", config_seed);
        write_register(&mut self.bus, config_seed)?;
        let config: ConfigRegister = read_register(&mut self.bus)?;
        debug!("Read back {:?}", config);
        // A brown-out flag here is left for the next check_fault to report.
        self.config = Some(config);
        debug!("Extracting calibration coefficients");
        let coefficients = CalibrationCoefficients::from_i2c(&mut self.bus, eeprom, config)?;
        Ok(DeviceSession::new(coefficients))
    }

    /// Check the sensor for a brown-out.
    ///
    /// Failing to read the configuration register is treated the same as a brown-out; either way
    /// the driver becomes `Faulted` and needs to be initialized again.
    pub fn check_fault(&mut self) -> Result<(), Error<I2C>> {
        if self.state != DeviceState::Ready {
            return Err(Error::InvalidState(self.state));
        }
        match read_register::<ConfigRegister, _>(&mut self.bus) {
            Ok(config) => {
                self.config = Some(config);
                if config.brown_out() {
                    warn!("Brown-out detected ({:?})", config);
                    self.fault();
                    Err(Error::BrownOut {
                        config: config.raw(),
                    })
                } else {
                    Ok(())
                }
            }
            Err(err) => {
                warn!("Unable to read the configuration register: {}", err);
                self.fault();
                Err(err)
            }
        }
    }

    /// Read the infrared array and convert it to temperatures.
    ///
    /// Only valid when the driver is `Ready`. A bus failure faults the driver.
    pub fn sample(&mut self) -> Result<TemperatureFrame, Error<I2C>> {
        if self.state != DeviceState::Ready {
            return Err(Error::InvalidState(self.state));
        }
        let session = match self.session.as_ref() {
            Some(session) if session.is_valid() => session,
            _ => return Err(Error::InvalidState(self.state)),
        };
        match RawIrFrame::from_i2c(&mut self.bus) {
            Ok(raw) => {
                let frame = convert(&raw, &session.coefficients);
                self.last_raw_frame = Some(raw);
                Ok(frame)
            }
            Err(err) => {
                warn!("Unable to read the infrared array: {}", err);
                self.fault();
                Err(err)
            }
        }
    }

    /// Stop using the sensor. No other operations are allowed after this.
    pub fn shutdown(&mut self) {
        debug!("Shutting down sensor driver");
        self.state = DeviceState::Shutdown;
        if let Some(session) = self.session.as_mut() {
            session.invalidate();
        }
    }

    /// Consume the driver, returning the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.bus, self.delay)
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::vec;

    use mlx90621_test_data::{
        synthetic_eeprom, synthetic_sensor_bus, BusOperation, MockDelay, MockSensorBus,
        EEPROM_ADDRESS, SENSOR_ADDRESS, SYNTHETIC_CONFIG, SYNTHETIC_TRIM,
    };

    use crate::calibration::extract_coefficients;
    use crate::common::CalibrationData;
    use crate::eeprom::EepromImage;
    use crate::error::{CalibrationError, Error};
    use crate::register::ConfigRegister;

    use super::{DeviceState, Mlx90621Driver};

    fn create_driver() -> (Mlx90621Driver<MockSensorBus, MockDelay>, MockSensorBus) {
        let mock_bus = synthetic_sensor_bus();
        let handle = mock_bus.clone();
        (Mlx90621Driver::new(mock_bus, MockDelay::new()), handle)
    }

    #[test]
    fn new_is_uninitialized() {
        let (driver, handle) = create_driver();
        assert_eq!(driver.state(), DeviceState::Uninitialized);
        assert!(driver.session().is_none());
        assert!(driver.coefficients().is_none());
        assert!(driver.eeprom().is_none());
        assert!(
            handle.recent_operations().is_empty(),
            "Creating a driver shouldn't touch the bus"
        );
    }

    #[test]
    fn initialize() {
        let (mut driver, handle) = create_driver();
        driver.initialize().unwrap();
        assert_eq!(driver.state(), DeviceState::Ready);
        assert!(driver.session().unwrap().is_valid());
        assert_eq!(handle.config(), SYNTHETIC_CONFIG);
        assert_eq!(handle.trim(), u16::from(SYNTHETIC_TRIM));
        assert_eq!(driver.config(), Some(ConfigRegister::new(SYNTHETIC_CONFIG)));
        assert_eq!(driver.eeprom().unwrap().as_bytes(), &synthetic_eeprom());
        let (_, delay) = driver.release();
        assert_eq!(delay.total_us(), 5_000);
    }

    #[test]
    fn initialize_sequence() {
        let (mut driver, handle) = create_driver();
        driver.initialize().unwrap();
        let ops = handle.recent_operations();
        // Newest first
        let expected = [
            BusOperation::WriteRead {
                address: SENSOR_ADDRESS,
                command: vec![0x02, 0x41, 0x00, 0x01],
                length: 2,
            },
            BusOperation::WriteRead {
                address: SENSOR_ADDRESS,
                command: vec![0x02, 0x40, 0x00, 0x01],
                length: 2,
            },
            BusOperation::WriteRead {
                address: SENSOR_ADDRESS,
                command: vec![0x02, 0x92, 0x00, 0x01],
                length: 2,
            },
            // Config write
            BusOperation::Write {
                address: SENSOR_ADDRESS,
                length: 5,
            },
            // Trim write
            BusOperation::Write {
                address: SENSOR_ADDRESS,
                length: 5,
            },
            BusOperation::WriteRead {
                address: EEPROM_ADDRESS,
                command: vec![0x00],
                length: 256,
            },
        ];
        assert_eq!(ops.len(), expected.len());
        for (op, expected_op) in ops.iter().zip(expected.iter()) {
            assert_eq!(op, expected_op);
        }
    }

    #[test]
    fn session_matches_extraction() {
        let (mut driver, _handle) = create_driver();
        driver.initialize().unwrap();
        struct Readings;
        impl crate::calibration::AmbientReadings for Readings {
            type Error = CalibrationError;
            fn ptat(&mut self) -> Result<u16, Self::Error> {
                Ok(mlx90621_test_data::DEFAULT_PTAT)
            }
            fn compensation_pixel(&mut self) -> Result<i16, Self::Error> {
                Ok(mlx90621_test_data::DEFAULT_VCOMP)
            }
        }
        let expected = extract_coefficients(
            &EepromImage::new(synthetic_eeprom()),
            ConfigRegister::new(SYNTHETIC_CONFIG),
            &mut Readings,
        )
        .unwrap();
        assert_eq!(driver.coefficients(), Some(&expected));
    }

    #[test]
    fn sample() {
        let (mut driver, _handle) = create_driver();
        driver.initialize().unwrap();
        let frame = driver.sample().unwrap();
        let ambient = driver.coefficients().unwrap().ambient_temperature();
        assert_eq!(frame.ambient, ambient);
        assert!(frame.pixels.iter().all(|t| t.is_finite()));
        assert_eq!(driver.state(), DeviceState::Ready);
        assert!(driver.last_raw_frame().is_some());
    }

    #[test]
    fn sample_requires_ready() {
        let (mut driver, _handle) = create_driver();
        assert!(matches!(
            driver.sample(),
            Err(Error::InvalidState(DeviceState::Uninitialized))
        ));
    }

    #[test]
    fn brown_out_recovery() {
        let (mut driver, mut handle) = create_driver();
        driver.initialize().unwrap();
        assert!(driver.check_fault().is_ok());
        handle.set_brown_out(true);
        let fault = driver.check_fault();
        assert!(matches!(fault, Err(Error::BrownOut { config: 0x0C06 })));
        assert_eq!(driver.state(), DeviceState::Faulted);
        assert!(!driver.session().unwrap().is_valid());
        assert!(driver.coefficients().is_none());
        // Rejected until initialized again
        assert!(matches!(
            driver.sample(),
            Err(Error::InvalidState(DeviceState::Faulted))
        ));
        assert!(matches!(
            driver.sample(),
            Err(Error::InvalidState(DeviceState::Faulted))
        ));
        driver.initialize().unwrap();
        assert_eq!(driver.state(), DeviceState::Ready);
        assert!(driver.sample().is_ok());
    }

    #[test]
    fn brown_out_on_read_back() {
        // A seed with the brown-out flag set reads back with it set
        let (mut driver, mut handle) = create_driver();
        let mut eeprom = synthetic_eeprom();
        eeprom[0xF6] |= 0x04;
        handle.set_eeprom(eeprom);
        driver.initialize().unwrap();
        assert_eq!(driver.state(), DeviceState::Ready);
        assert!(driver.config().unwrap().brown_out());
        assert!(driver.session().unwrap().is_valid());
        let fault = driver.check_fault();
        assert!(matches!(fault, Err(Error::BrownOut { config: 0x0C06 })));
        assert_eq!(driver.state(), DeviceState::Faulted);
    }

    #[test]
    fn unreadable_config_is_fault() {
        let (mut driver, mut handle) = create_driver();
        driver.initialize().unwrap();
        handle.fail_config(true);
        let fault = driver.check_fault();
        assert!(fault.unwrap_err().is_bus_fault());
        assert_eq!(driver.state(), DeviceState::Faulted);
    }

    #[test]
    fn eeprom_failure() {
        let (mut driver, mut handle) = create_driver();
        handle.fail_eeprom(true);
        let result = driver.initialize();
        assert!(result.unwrap_err().is_bus_fault());
        assert_eq!(driver.state(), DeviceState::Faulted);
        assert!(driver.session().is_none());
        assert!(driver.coefficients().is_none());
        assert!(matches!(
            driver.sample(),
            Err(Error::InvalidState(DeviceState::Faulted))
        ));
        // Nothing after the EEPROM load was attempted
        assert_eq!(handle.recent_operations().len(), 1);
        handle.fail_eeprom(false);
        driver.initialize().unwrap();
        assert_eq!(driver.state(), DeviceState::Ready);
    }

    #[test]
    fn reinitialize_failure_invalidates_session() {
        let (mut driver, mut handle) = create_driver();
        driver.initialize().unwrap();
        handle.fail_writes(true);
        assert!(driver.initialize().is_err());
        assert_eq!(driver.state(), DeviceState::Faulted);
        assert!(!driver.session().unwrap().is_valid());
        assert!(driver.coefficients().is_none());
    }

    #[test]
    fn reinitialize_from_ready() {
        let (mut driver, handle) = create_driver();
        driver.initialize().unwrap();
        driver.initialize().unwrap();
        assert_eq!(driver.state(), DeviceState::Ready);
        assert_eq!(handle.eeprom_reads(), 2);
    }

    #[test]
    fn negative_radicand_faults() {
        let mut eeprom = synthetic_eeprom();
        // K_T2 of -19398
        eeprom[0xDE] = 0x3A;
        eeprom[0xDF] = 0xB4;
        let mut mock_bus = MockSensorBus::new(eeprom);
        mock_bus.set_ptat(60000);
        let mut driver = Mlx90621Driver::new(mock_bus, MockDelay::new());
        let result = driver.initialize();
        assert!(matches!(
            result,
            Err(Error::CalibrationError(CalibrationError::NegativeRadicand(_)))
        ));
        assert_eq!(driver.state(), DeviceState::Faulted);
        assert!(driver.session().is_none());
    }

    #[test]
    fn sample_failure_faults() {
        let (mut driver, mut handle) = create_driver();
        driver.initialize().unwrap();
        handle.fail_ir(true);
        assert!(driver.sample().unwrap_err().is_bus_fault());
        assert_eq!(driver.state(), DeviceState::Faulted);
    }

    #[test]
    fn trim_register() {
        let (mut driver, _handle) = create_driver();
        driver.initialize().unwrap();
        assert_eq!(driver.trim_register().unwrap().raw(), 0x002C);
    }

    #[test]
    fn shutdown() {
        let (mut driver, _handle) = create_driver();
        driver.initialize().unwrap();
        driver.shutdown();
        assert_eq!(driver.state(), DeviceState::Shutdown);
        assert!(driver.coefficients().is_none());
        assert!(matches!(
            driver.initialize(),
            Err(Error::InvalidState(DeviceState::Shutdown))
        ));
        assert!(matches!(
            driver.sample(),
            Err(Error::InvalidState(DeviceState::Shutdown))
        ));
        assert!(matches!(
            driver.check_fault(),
            Err(Error::InvalidState(DeviceState::Shutdown))
        ));
        let (_bus, _delay) = driver.release();
    }
}
