//! Camera frame sources.
//!
//! This module provides the device side of the recorder:
//! - `FrameSource`: the capability the session loop and recovery controller drive
//! - `CameraSource`: backend selection by device URI
//! - Synthetic cameras (`stub://`) with scripted faults for tests and dry runs
//! - V4L2 device nodes (feature: device-v4l2)
//!
//! Vendor exception hierarchies collapse into `DeviceError`. Callers only need
//! to know whether a failure is a transient capture fault or a configuration
//! fault.

use std::time::Duration;
use thiserror::Error;

use crate::frame::{Frame, FrameGeometry, PixelFormat};

pub mod synthetic;
#[cfg(feature = "device-v4l2")]
pub mod v4l2;

pub use synthetic::{SyntheticCamera, SyntheticConfig, SyntheticStep};
#[cfg(feature = "device-v4l2")]
pub use v4l2::V4l2Camera;

/// Device failure kinds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("frame fetch timed out")]
    Timeout,

    #[error("frame incomplete")]
    Incomplete,

    #[error("device fault: {0}")]
    Fault(String),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("device is not acquiring")]
    NotAcquiring,
}

impl DeviceError {
    /// Configuration faults fail the current init or recovery attempt. Everything
    /// else is a transient capture fault handled by bounded recovery.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DeviceError::Configuration(_))
    }
}

/// Full device configuration, re-applied after every reinitialisation.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSettings {
    /// Acquisition frame rate in frames per second.
    pub frame_rate: f64,
    /// GPIO line switched to output mode (strobe for external sync).
    pub output_line: Option<String>,
    /// Lower bound for continuous auto-exposure, in microseconds.
    pub exposure_lower_limit_us: f64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            output_line: Some("Line2".to_string()),
            exposure_lower_limit_us: 4000.0,
        }
    }
}

/// Capability the session loop drives.
///
/// `apply_configuration` must be idempotent: recovery re-invokes it after every
/// reinitialisation because device state is not assumed to survive a fault.
pub trait FrameSource {
    fn init(&mut self) -> Result<(), DeviceError>;

    fn deinit(&mut self) -> Result<(), DeviceError>;

    fn apply_configuration(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError>;

    fn begin_acquisition(&mut self) -> Result<(), DeviceError>;

    fn end_acquisition(&mut self) -> Result<(), DeviceError>;

    /// Wait up to `timeout` for the next image.
    ///
    /// `Ok(None)` means the device handed back no image at all. An image whose
    /// transfer did not finish comes back as a frame with `is_complete() == false`.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, DeviceError>;

    /// Return a frame to the device buffer pool.
    fn release(&mut self, frame: Frame);

    /// Active geometry. Only meaningful after `init` + `apply_configuration`.
    fn geometry(&self) -> Result<FrameGeometry, DeviceError>;
}

/// Camera selection.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device URI: `stub://<name>` for a synthetic camera, otherwise a device node.
    pub device: String,
    /// Requested sensor width.
    pub width: u32,
    /// Requested sensor height.
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://rig_camera".to_string(),
            width: 720,
            height: 540,
            pixel_format: PixelFormat::Mono8,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub outstanding_frames: usize,
    pub device: String,
}

/// Frame source selected by device URI.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "device-v4l2")]
    V4l2(V4l2Camera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> anyhow::Result<Self> {
        if config.device.starts_with("stub://") {
            let synthetic = SyntheticConfig {
                name: config.device.clone(),
                geometry: FrameGeometry {
                    width: config.width,
                    height: config.height,
                    pixel_format: config.pixel_format,
                },
                paced: true,
                ..SyntheticConfig::default()
            };
            Ok(Self::synthetic(synthetic))
        } else {
            #[cfg(feature = "device-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::V4l2(V4l2Camera::new(config)),
                })
            }
            #[cfg(not(feature = "device-v4l2"))]
            {
                anyhow::bail!(
                    "camera {} requires the device-v4l2 feature",
                    config.device
                )
            }
        }
    }

    /// Synthetic camera with an explicit fault script.
    pub fn synthetic(config: SyntheticConfig) -> Self {
        Self {
            backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "device-v4l2")]
            CameraBackend::V4l2(camera) => camera.stats(),
        }
    }

    fn source_mut(&mut self) -> &mut dyn FrameSource {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera,
            #[cfg(feature = "device-v4l2")]
            CameraBackend::V4l2(camera) => camera,
        }
    }

    fn source(&self) -> &dyn FrameSource {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera,
            #[cfg(feature = "device-v4l2")]
            CameraBackend::V4l2(camera) => camera,
        }
    }
}

impl FrameSource for CameraSource {
    fn init(&mut self) -> Result<(), DeviceError> {
        self.source_mut().init()
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        self.source_mut().deinit()
    }

    fn apply_configuration(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        self.source_mut().apply_configuration(settings)
    }

    fn begin_acquisition(&mut self) -> Result<(), DeviceError> {
        self.source_mut().begin_acquisition()
    }

    fn end_acquisition(&mut self) -> Result<(), DeviceError> {
        self.source_mut().end_acquisition()
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, DeviceError> {
        self.source_mut().next_frame(timeout)
    }

    fn release(&mut self, frame: Frame) {
        self.source_mut().release(frame)
    }

    fn geometry(&self) -> Result<FrameGeometry, DeviceError> {
        self.source().geometry()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let device = self.stats().device;
        let source = self.source_mut();
        if let Err(err) = source.end_acquisition() {
            log::debug!("CameraSource: end acquisition on drop ({}): {}", device, err);
        }
        if let Err(err) = source.deinit() {
            log::debug!("CameraSource: deinit on drop ({}): {}", device, err);
        }
    }
}
