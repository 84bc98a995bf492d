// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Read temperatures from an MLX90621 and publish them to a named pipe.
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use linux_embedded_hal::{Delay, I2cdev};
use log::info;
use mlx90621::Mlx90621Driver;

mod cancel;
mod dump;
mod fifo;
mod monitor;
mod test_pattern;

use cancel::CancellationToken;
use fifo::FramePipe;
use monitor::Monitor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TestMode {
    /// Write a moving test pattern to the pipe every second.
    Write,
    /// Read frames from the pipe and print them.
    Read,
}

/// Reads data from a Melexis MLX90621 and calculates temperature readings.
///
/// Needs permission to use the I²C bus and to create the pipe.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// How much to print: 1 adds the temperatures each cycle, 2 the calibration after each
    /// initialization, and 3 the raw readings and per-pixel calibration.
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbosity: u8,

    /// Write temperature frames to the pipe.
    #[arg(short, long)]
    write_fifo: bool,

    /// Exercise the pipe with a test pattern instead of using the sensor.
    #[arg(short, long, value_enum)]
    test: Option<TestMode>,

    /// The I²C bus the sensor is on.
    #[arg(long, default_value = "/dev/i2c-1")]
    bus: PathBuf,

    /// The named pipe frames are written to.
    #[arg(long, default_value = "/var/run/mlx.sock")]
    fifo: PathBuf,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_sensor(args: &Args, token: CancellationToken) -> Result<()> {
    let publisher = if args.write_fifo {
        Some(FramePipe::create(&args.fifo)?)
    } else {
        None
    };
    let bus = I2cdev::new(&args.bus)
        .with_context(|| format!("Unable to open I²C bus {}", args.bus.display()))?;
    let driver = Mlx90621Driver::new(bus, Delay);
    let monitor = Monitor::new(driver, publisher, io::stdout(), token, args.verbosity);
    // The pipe is removed when the monitor finishes, and the bus closed when it is dropped here.
    monitor.run();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity);
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("Unable to install the signal handler")?;
    match args.test {
        Some(TestMode::Write) => {
            let pipe = FramePipe::create(&args.fifo)?;
            test_pattern::run_write_test(&pipe, &mut io::stdout().lock(), &token)?;
        }
        Some(TestMode::Read) => {
            test_pattern::run_read_test(&args.fifo, &mut io::stdout().lock(), &token)?;
        }
        None => run_sensor(&args, token)?,
    }
    info!("Exiting");
    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use clap::{CommandFactory, Parser};

    use super::{Args, TestMode};

    #[test]
    fn cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["mlxd"]).unwrap();
        assert_eq!(args.verbosity, 0);
        assert!(!args.write_fifo);
        assert_eq!(args.test, None);
        assert_eq!(args.bus, Path::new("/dev/i2c-1"));
        assert_eq!(args.fifo, Path::new("/var/run/mlx.sock"));
    }

    #[test]
    fn short_options() {
        let args = Args::try_parse_from(["mlxd", "-v", "2", "-w", "-t", "read"]).unwrap();
        assert_eq!(args.verbosity, 2);
        assert!(args.write_fifo);
        assert_eq!(args.test, Some(TestMode::Read));
    }

    #[test]
    fn verbosity_range() {
        assert!(Args::try_parse_from(["mlxd", "-v", "4"]).is_err());
        assert!(Args::try_parse_from(["mlxd", "--test", "sideways"]).is_err());
    }
}
