//! Synthetic camera (`stub://`).
//!
//! Produces deterministic pattern frames with monotonically increasing frame ids.
//! A fault script drives the next fetches (incomplete image, truncated image,
//! timeout, device fault, missing image) so the recovery path can be exercised without hardware.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{CameraStats, DeviceError, DeviceSettings, FrameSource};
use crate::frame::{Frame, FrameGeometry, PixelFormat};

/// Outcome of one scripted fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticStep {
    Frame,
    Incomplete,
    /// Flagged complete by the driver but shorter than one frame.
    Truncated,
    Timeout,
    Fault,
    Missing,
}

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub geometry: FrameGeometry,
    /// Consumed one step per `next_frame` call (recovery test fetches included).
    /// Once exhausted, every fetch yields a complete frame.
    pub script: Vec<SyntheticStep>,
    /// Number of `apply_configuration` calls that fail before one succeeds.
    pub configuration_failures: u32,
    pub first_frame_id: u64,
    /// Sleep to honour the configured frame rate between frames.
    pub paced: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://rig_camera".to_string(),
            geometry: FrameGeometry {
                width: 64,
                height: 48,
                pixel_format: PixelFormat::Mono8,
            },
            script: Vec::new(),
            configuration_failures: 0,
            first_frame_id: 0,
            paced: false,
        }
    }
}

pub struct SyntheticCamera {
    config: SyntheticConfig,
    script: VecDeque<SyntheticStep>,
    configuration_failures: u32,
    initialized: bool,
    configured: bool,
    acquiring: bool,
    next_frame_id: u64,
    frames_captured: u64,
    outstanding: usize,
    pool: Vec<Vec<u8>>,
    frame_interval: Option<Duration>,
    last_frame_at: Option<Instant>,
    /// Simulated scene state so consecutive frames differ.
    scene_state: u8,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            script: config.script.iter().copied().collect(),
            configuration_failures: config.configuration_failures,
            next_frame_id: config.first_frame_id,
            config,
            initialized: false,
            configured: false,
            acquiring: false,
            frames_captured: 0,
            outstanding: 0,
            pool: Vec::new(),
            frame_interval: None,
            last_frame_at: None,
            scene_state: 0,
        }
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frames_captured,
            outstanding_frames: self.outstanding,
            device: self.config.name.clone(),
        }
    }

    fn pace(&mut self) {
        if !self.config.paced {
            return;
        }
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn generate_pixels(&mut self, frame_id: u64, len: usize) -> Vec<u8> {
        if frame_id % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = self.pool.pop().unwrap_or_default();
        pixels.clear();
        pixels.resize(len, 0);
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + frame_id + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticCamera {
    fn init(&mut self) -> Result<(), DeviceError> {
        self.initialized = true;
        log::info!("SyntheticCamera: initialised {}", self.config.name);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        self.acquiring = false;
        self.configured = false;
        self.initialized = false;
        Ok(())
    }

    fn apply_configuration(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        if !self.initialized {
            return Err(DeviceError::Configuration(
                "device not initialised".to_string(),
            ));
        }
        if self.configuration_failures > 0 {
            self.configuration_failures -= 1;
            return Err(DeviceError::Configuration(
                "unable to set frame rate".to_string(),
            ));
        }
        if settings.frame_rate.is_nan() || settings.frame_rate <= 0.0 {
            return Err(DeviceError::Configuration(format!(
                "frame rate must be positive, got {}",
                settings.frame_rate
            )));
        }
        self.frame_interval = Some(Duration::from_secs_f64(1.0 / settings.frame_rate));
        self.configured = true;
        Ok(())
    }

    fn begin_acquisition(&mut self) -> Result<(), DeviceError> {
        if !self.configured {
            return Err(DeviceError::Fault(
                "acquisition started before configuration".to_string(),
            ));
        }
        self.acquiring = true;
        self.last_frame_at = None;
        Ok(())
    }

    fn end_acquisition(&mut self) -> Result<(), DeviceError> {
        if !self.acquiring {
            return Err(DeviceError::NotAcquiring);
        }
        self.acquiring = false;
        Ok(())
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>, DeviceError> {
        if !self.acquiring {
            return Err(DeviceError::NotAcquiring);
        }

        let step = self.script.pop_front().unwrap_or(SyntheticStep::Frame);
        match step {
            SyntheticStep::Timeout => return Err(DeviceError::Timeout),
            SyntheticStep::Fault => {
                return Err(DeviceError::Fault("simulated resource conflict".to_string()))
            }
            SyntheticStep::Missing => return Ok(None),
            SyntheticStep::Frame | SyntheticStep::Incomplete | SyntheticStep::Truncated => {}
        }

        self.pace();

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        let complete = step != SyntheticStep::Incomplete;
        let full_len = self.config.geometry.frame_len();
        // Incomplete and truncated transfers carry a short payload.
        let len = if step == SyntheticStep::Frame {
            full_len
        } else {
            full_len / 2
        };
        let pixels = self.generate_pixels(frame_id, len);

        self.frames_captured += 1;
        self.outstanding += 1;
        Ok(Some(Frame::new(
            pixels,
            frame_id,
            complete,
            self.config.geometry,
        )))
    }

    fn release(&mut self, frame: Frame) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.pool.push(frame.into_buffer());
    }

    fn geometry(&self) -> Result<FrameGeometry, DeviceError> {
        if !self.initialized {
            return Err(DeviceError::Configuration(
                "device not initialised".to_string(),
            ));
        }
        Ok(self.config.geometry)
    }
}
