// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The sampling loop.
//!
//! Every cycle the sensor is (re)initialized if it needs to be, checked for a brown-out, sampled,
//! and the frame published. Faults are logged and the next cycle tries again, so the loop only
//! ends when it is cancelled.
use std::fmt;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use embedded_hal::blocking::{delay, i2c};
use log::{debug, warn};
use mlx90621::{DeviceState, Mlx90621Driver, TemperatureFrame, NUM_PIXELS};

use crate::cancel::CancellationToken;
use crate::dump;
use crate::fifo::FramePipe;

/// The time between the start of one cycle and the next one.
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(1);

/// Somewhere to send temperature frames.
pub trait FramePublisher {
    /// Publish one frame, returning `Ok(false)` if `token` was cancelled first.
    fn publish(&mut self, pixels: &[f32; NUM_PIXELS], token: &CancellationToken) -> Result<bool>;
}

impl FramePublisher for FramePipe {
    fn publish(&mut self, pixels: &[f32; NUM_PIXELS], token: &CancellationToken) -> Result<bool> {
        self.write_frame(pixels, token)
    }
}

pub struct Monitor<I2C, D, P, W> {
    driver: Mlx90621Driver<I2C, D>,

    publisher: Option<P>,

    /// Where the dumps selected by `verbosity` are written.
    console: W,

    token: CancellationToken,

    verbosity: u8,

    cadence: Duration,

    /// The number of initialization attempts so far.
    attempts: usize,
}

impl<I2C, D, P, W> Monitor<I2C, D, P, W>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
    D: delay::DelayUs<u32>,
    P: FramePublisher,
    W: Write,
{
    pub fn new(
        driver: Mlx90621Driver<I2C, D>,
        publisher: Option<P>,
        console: W,
        token: CancellationToken,
        verbosity: u8,
    ) -> Self {
        Self {
            driver,
            publisher,
            console,
            token,
            verbosity,
            cadence: DEFAULT_CADENCE,
            attempts: 0,
        }
    }

    #[cfg(test)]
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    #[cfg(test)]
    pub fn driver(&self) -> &Mlx90621Driver<I2C, D> {
        &self.driver
    }

    /// Run cycles until cancelled, then shut the driver down and hand back the bus and delay.
    pub fn run(mut self) -> (I2C, D) {
        while !self.token.is_cancelled() {
            if let Err(err) = self.cycle() {
                warn!("{:#}", err);
            }
            if !self.token.sleep(self.cadence) {
                break;
            }
        }
        debug!("Sampling loop cancelled");
        self.driver.shutdown();
        self.driver.release()
    }

    /// Run a single cycle.
    ///
    /// Sensor faults are logged and leave the driver ready to be initialized on the next cycle.
    /// Only console and publishing failures are returned.
    fn cycle(&mut self) -> Result<()> {
        if self.driver.state() != DeviceState::Ready && !self.initialize()? {
            return Ok(());
        }
        if let Err(err) = self.driver.check_fault() {
            debug!("Skipping this cycle: {}", err);
            return Ok(());
        }
        let frame = match self.driver.sample() {
            Ok(frame) => frame,
            Err(err) => {
                debug!("Skipping this cycle: {}", err);
                return Ok(());
            }
        };
        self.show_sample(&frame)
            .context("Unable to write to the console")?;
        if self.token.is_cancelled() {
            return Ok(());
        }
        if let Some(publisher) = self.publisher.as_mut() {
            if !publisher.publish(&frame.pixels, &self.token)? {
                debug!("Publishing cancelled");
            }
        }
        Ok(())
    }

    /// Initialize the sensor, returning whether it succeeded.
    fn initialize(&mut self) -> Result<bool> {
        self.attempts += 1;
        let result = self.driver.initialize();
        if let Err(err) = &result {
            debug!("Initialization attempt {} failed: {}", self.attempts, err);
        }
        if self.verbosity >= 2 {
            if let Some(coefficients) = self.driver.coefficients() {
                dump::coefficients(&mut self.console, coefficients, self.verbosity)
                    .context("Unable to write to the console")?;
            }
        }
        if self.attempts > 1 && self.verbosity >= 1 {
            if let Some(eeprom) = self.driver.eeprom() {
                dump::eeprom(&mut self.console, eeprom).context("Unable to write to the console")?;
            }
        }
        Ok(result.is_ok())
    }

    fn show_sample(&mut self, frame: &TemperatureFrame) -> std::io::Result<()> {
        if self.verbosity >= 3 {
            if let Some(raw) = self.driver.last_raw_frame() {
                dump::raw_frame(&mut self.console, raw)?;
            }
        }
        if self.verbosity >= 1 {
            dump::temperatures(&mut self.console, frame)?;
        }
        Ok(())
    }
}
