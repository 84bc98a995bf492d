// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The named pipe frames are published on.
//!
//! Each frame is 64 little-endian `f32`s (256 bytes) with no header or delimiter. The writer
//! opens the pipe, writes one frame, and closes it again; a reader does the same for each frame
//! it reads. Both ends wait for the other to show up, checking a [`CancellationToken`] while
//! they do.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use mlx90621::NUM_PIXELS;
use nix::libc;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::cancel::CancellationToken;

/// The size of one frame on the wire.
pub const FRAME_LENGTH: usize = NUM_PIXELS * 4;

pub fn encode_frame(pixels: &[f32; NUM_PIXELS]) -> [u8; FRAME_LENGTH] {
    let mut bytes = [0u8; FRAME_LENGTH];
    bytes
        .chunks_exact_mut(4)
        .zip(pixels.iter())
        .for_each(|(chunk, pixel)| chunk.copy_from_slice(&pixel.to_le_bytes()));
    bytes
}

pub fn decode_frame(bytes: &[u8; FRAME_LENGTH]) -> [f32; NUM_PIXELS] {
    let mut pixels = [0f32; NUM_PIXELS];
    pixels
        .iter_mut()
        .zip(bytes.chunks_exact(4))
        .for_each(|(pixel, chunk)| {
            *pixel = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        });
    pixels
}

/// Owns the named pipe on the filesystem, removing it when dropped.
#[derive(Debug)]
pub struct FramePipe {
    path: PathBuf,
}

impl FramePipe {
    /// Create the named pipe at `path` (mode 0666, before the umask).
    ///
    /// An existing pipe at `path` is reused. Anything else already there is an error.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.file_type().is_fifo() => {
                debug!("Reusing existing pipe at {}", path.display());
            }
            Ok(_) => bail!("{} exists and is not a named pipe", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                mkfifo(&path, Mode::from_bits_truncate(0o666))
                    .with_context(|| format!("Unable to create named pipe {}", path.display()))?;
                debug!("Created pipe at {}", path.display());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Unable to inspect {}", path.display()))
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one frame. See [`write_frame`].
    pub fn write_frame(
        &self,
        pixels: &[f32; NUM_PIXELS],
        token: &CancellationToken,
    ) -> Result<bool> {
        write_frame(&self.path, pixels, token)
    }
}

impl Drop for FramePipe {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed pipe at {}", self.path.display()),
            Err(err) => warn!("Unable to remove pipe at {}: {}", self.path.display(), err),
        }
    }
}

/// Open the write end of the pipe, waiting for a reader.
fn open_writer(path: &Path, token: &CancellationToken) -> Result<Option<File>> {
    loop {
        let opened = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path);
        match opened {
            Ok(file) => return Ok(Some(file)),
            // No reader yet
            Err(err) if err.raw_os_error() == Some(libc::ENXIO) => {
                if !token.pause() {
                    return Ok(None);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Unable to open {} for writing", path.display()))
            }
        }
    }
}

/// Write one frame to the pipe at `path`.
///
/// This waits for a reader to open the other end. Returns `Ok(false)` if `token` was cancelled
/// before the whole frame was written.
pub fn write_frame(
    path: &Path,
    pixels: &[f32; NUM_PIXELS],
    token: &CancellationToken,
) -> Result<bool> {
    let mut file = match open_writer(path, token)? {
        Some(file) => file,
        None => return Ok(false),
    };
    let bytes = encode_frame(pixels);
    let mut written = 0;
    while written < FRAME_LENGTH {
        match file.write(&bytes[written..]) {
            Ok(count) => written += count,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if !token.pause() {
                    return Ok(false);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
            Err(err) => {
                return Err(err).with_context(|| format!("Unable to write to {}", path.display()))
            }
        }
    }
    Ok(true)
}

/// Read one frame from the pipe at `path`.
///
/// This waits for a writer and for a full frame of data. Returns `Ok(None)` if `token` was
/// cancelled first.
pub fn read_frame(path: &Path, token: &CancellationToken) -> Result<Option<[f32; NUM_PIXELS]>> {
    let mut file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .with_context(|| format!("Unable to open {} for reading", path.display()))?;
    let mut bytes = [0u8; FRAME_LENGTH];
    let mut filled = 0;
    while filled < FRAME_LENGTH {
        match file.read(&mut bytes[filled..]) {
            Ok(count) if count > 0 => filled += count,
            // Either no writer has connected yet, or no data has been written yet.
            Ok(_) => {
                if !token.pause() {
                    return Ok(None);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if !token.pause() {
                    return Ok(None);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
            Err(err) => {
                return Err(err).with_context(|| format!("Unable to read from {}", path.display()))
            }
        }
    }
    Ok(Some(decode_frame(&bytes)))
}
