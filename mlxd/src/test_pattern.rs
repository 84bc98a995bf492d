// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Test modes for checking the frame channel without a sensor attached.
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use mlx90621::NUM_PIXELS;

use crate::cancel::CancellationToken;
use crate::fifo::{read_frame, FramePipe};

/// The value written into the marker pixel of a test frame.
pub const MARKER: f32 = 17.0;

/// How often the write test publishes a frame.
const WRITE_INTERVAL: Duration = Duration::from_secs(1);

/// A ramp of `2.3 × index`, with [`MARKER`] at `marker`.
pub fn ramp_frame(marker: usize) -> [f32; NUM_PIXELS] {
    let mut pixels = [0f32; NUM_PIXELS];
    pixels
        .iter_mut()
        .enumerate()
        .for_each(|(index, pixel)| *pixel = (index as f64 * 2.3) as f32);
    pixels[marker % NUM_PIXELS] = MARKER;
    pixels
}

/// Publish test frames until cancelled, moving the marker one pixel each time.
pub fn run_write_test<W: Write>(
    pipe: &FramePipe,
    console: &mut W,
    token: &CancellationToken,
) -> Result<()> {
    info!("Writing test frames to {}", pipe.path().display());
    let mut marker = 0;
    while !token.is_cancelled() {
        writeln!(console, "j={}", marker).context("Unable to write to the console")?;
        if !pipe.write_frame(&ramp_frame(marker), token)? {
            break;
        }
        marker = (marker + 1) % NUM_PIXELS;
        if !token.sleep(WRITE_INTERVAL) {
            break;
        }
    }
    Ok(())
}

/// Write one frame as four rows of 16 values.
pub fn print_frame<W: Write>(console: &mut W, pixels: &[f32; NUM_PIXELS]) -> std::io::Result<()> {
    for (index, pixel) in pixels.iter().enumerate() {
        let separator = if index % 16 == 15 { "\n" } else { "   " };
        write!(console, "{:5.1} {}", pixel, separator)?;
    }
    Ok(())
}

/// Read and print frames until cancelled.
///
/// The pipe at `path` belongs to whoever is writing to it, so it is neither created nor removed
/// here.
pub fn run_read_test<W: Write>(
    path: &Path,
    console: &mut W,
    token: &CancellationToken,
) -> Result<()> {
    info!("Reading frames from {}", path.display());
    while let Some(pixels) = read_frame(path, token)? {
        print_frame(console, &pixels).context("Unable to write to the console")?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Duration;

    use float_cmp::assert_approx_eq;
    use mlx90621::NUM_PIXELS;

    use super::{print_frame, ramp_frame, run_read_test, run_write_test, MARKER};
    use crate::cancel::CancellationToken;
    use crate::fifo::{read_frame, FramePipe};

    #[test]
    fn ramp() {
        let frame = ramp_frame(5);
        assert_approx_eq!(f32, frame[0], 0.0);
        assert_approx_eq!(f32, frame[4], 9.2);
        assert_eq!(frame[5], MARKER);
        assert_approx_eq!(f32, frame[6], 13.8);
        assert_approx_eq!(f32, frame[63], 144.9);
        let moved = ramp_frame(0);
        assert_eq!(moved[0], MARKER);
        assert_approx_eq!(f32, moved[5], 11.5);
    }

    #[test]
    fn printed_rows() {
        let mut out = Vec::new();
        print_frame(&mut out, &ramp_frame(0)).unwrap();
        let output = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(" 17.0      2.3      4.6 "));
    }

    #[test]
    fn reader_sees_ramp() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = FramePipe::create(dir.path().join("mlx.sock")).unwrap();
        let token = CancellationToken::new();
        let reader_path = pipe.path().to_path_buf();
        let reader_token = token.clone();
        let reader = thread::spawn(move || read_frame(&reader_path, &reader_token));
        let marker = 9;
        assert!(pipe.write_frame(&ramp_frame(marker), &token).unwrap());
        let frame = reader.join().unwrap().unwrap().unwrap();
        assert_eq!(frame[marker], MARKER);
        for (index, pixel) in frame.iter().enumerate().filter(|(i, _)| *i != marker) {
            assert_approx_eq!(f32, *pixel, index as f32 * 2.3, epsilon = 1e-4);
        }
        assert_eq!(frame.len(), NUM_PIXELS);
    }

    #[test]
    fn write_test_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = FramePipe::create(dir.path().join("mlx.sock")).unwrap();
        let path = pipe.path().to_path_buf();
        let token = CancellationToken::new();
        let writer_token = token.clone();
        let writer = thread::spawn(move || {
            let mut console = Vec::new();
            run_write_test(&pipe, &mut console, &writer_token).unwrap();
            console
        });
        let frame = read_frame(&path, &token).unwrap().unwrap();
        token.cancel();
        let console = String::from_utf8(writer.join().unwrap()).unwrap();
        assert_eq!(frame[0], MARKER);
        assert!(console.starts_with("j=0\n"));
        // The writer owned the pipe
        assert!(!path.exists());
    }

    #[test]
    fn read_test_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = FramePipe::create(dir.path().join("mlx.sock")).unwrap();
        let token = CancellationToken::new();
        let writer_token = token.clone();
        let path = pipe.path().to_path_buf();
        let writer = thread::spawn(move || {
            assert!(pipe.write_frame(&ramp_frame(3), &writer_token).unwrap());
            thread::sleep(Duration::from_millis(50));
            writer_token.cancel();
            // Keep the pipe around until the reader has given up
            pipe
        });
        let mut console = Vec::new();
        run_read_test(&path, &mut console, &token).unwrap();
        drop(writer.join().unwrap());
        let output = String::from_utf8(console).unwrap();
        assert_eq!(output.lines().count(), 4);
        assert!(output.contains(" 17.0 "));
    }
}
