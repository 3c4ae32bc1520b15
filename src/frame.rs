//! Captured frame handles.
//!
//! - `Frame`: one captured image, owned by the frame source until released.
//! - `PixelFormat`: the session's fixed pixel layout.
//! - `FrameGeometry`: dimensions + format, fixed once the device is initialised.
//!
//! A `Frame` is never retained across loop iterations. The session controller
//! hands it back to its source with `FrameSource::release` on every path.

use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;

/// Pixel layouts the recorder knows how to size.
///
/// The symbolic names match what the camera reports and what the session
/// summary records, so downstream converters can size frames from the summary
/// alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Mono8,
    BayerRG8,
    Mono16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Mono8 | PixelFormat::BayerRG8 => 1,
            PixelFormat::Mono16 => 2,
        }
    }

    pub fn symbolic(self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "Mono8",
            PixelFormat::BayerRG8 => "BayerRG8",
            PixelFormat::Mono16 => "Mono16",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbolic())
    }
}

impl FromStr for PixelFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Mono8" => Ok(PixelFormat::Mono8),
            "BayerRG8" => Ok(PixelFormat::BayerRG8),
            "Mono16" => Ok(PixelFormat::Mono16),
            other => Err(anyhow!("unsupported pixel format: {}", other)),
        }
    }
}

/// Image dimensions and pixel format of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl FrameGeometry {
    /// Exact payload size of one frame in the binary artifact.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    /// A frame is usable only when complete and exactly one payload long.
    /// Anything else would shift every later frame in the binary artifact.
    pub fn accepts(&self, frame: &Frame) -> bool {
        frame.is_complete() && frame.byte_len() == self.frame_len()
    }
}

/// One captured image.
///
/// Frames have no `Clone` impl: the payload belongs to the device buffer pool
/// and goes back to it through `FrameSource::release`.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    frame_id: u64,
    complete: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl Frame {
    /// Create a frame. Called only by frame source backends.
    pub(crate) fn new(data: Vec<u8>, frame_id: u64, complete: bool, geometry: FrameGeometry) -> Self {
        Self {
            data,
            frame_id,
            complete,
            width: geometry.width,
            height: geometry.height,
            pixel_format: geometry.pixel_format,
        }
    }

    /// Device-issued identifier, monotonic within a device session.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        }
    }

    /// Hand the payload buffer back to the owning backend for reuse.
    pub(crate) fn into_buffer(self) -> Vec<u8> {
        self.data
    }
}
