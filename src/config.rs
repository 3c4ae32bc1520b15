use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::{CameraConfig, DeviceSettings};
use crate::frame::PixelFormat;
use crate::ledger::DEFAULT_FLUSH_THRESHOLD;
use crate::preview::DEFAULT_MAX_DISPLAY_FPS;
use crate::recovery::RecoveryPolicy;

const DEFAULT_OUTPUT_ROOT: &str = "test_vid_output";
const DEFAULT_DEVICE: &str = "stub://rig_camera";
const DEFAULT_SENSOR_WIDTH: u32 = 720;
const DEFAULT_SENSOR_HEIGHT: u32 = 540;
const DEFAULT_SIGNAL_CHECK_INTERVAL: u64 = 30;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 1000;
const DEFAULT_EXPOSURE_LOWER_LIMIT_US: f64 = 4000.0;
const DEFAULT_OUTPUT_LINE: &str = "Line2";

/// Cameras installed on the rigs: (rig, serial, max fps, pixel format).
const DEFAULT_RIGS: &[(u32, &str, f64, PixelFormat)] = &[
    (1, "22181614", 170.0, PixelFormat::Mono8),
    (2, "20530175", 170.0, PixelFormat::Mono8),
    (3, "24174008", 170.0, PixelFormat::Mono8),
    (4, "24174020", 170.0, PixelFormat::Mono8),
    (5, "23606054", 170.0, PixelFormat::BayerRG8),
    (6, "21423798", 59.6, PixelFormat::Mono8),
];

#[derive(Debug, Deserialize, Default)]
struct RecorderConfigFile {
    output_root: Option<PathBuf>,
    device: Option<String>,
    sensor: Option<SensorConfigFile>,
    ledger: Option<LedgerConfigFile>,
    signals: Option<SignalsConfigFile>,
    preview: Option<PreviewConfigFile>,
    capture: Option<CaptureConfigFile>,
    recovery: Option<RecoveryConfigFile>,
    rigs: Option<Vec<RigConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct SensorConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LedgerConfigFile {
    flush_threshold: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SignalsConfigFile {
    check_interval_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PreviewConfigFile {
    max_display_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    fetch_timeout_ms: Option<u64>,
    exposure_lower_limit_us: Option<f64>,
    output_line: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RecoveryConfigFile {
    max_attempts: Option<u32>,
    cooldown_secs: Option<u64>,
    settle_ms: Option<u64>,
    probe_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RigConfigFile {
    rig: u32,
    serial: String,
    max_frame_rate: f64,
    pixel_format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub output_root: PathBuf,
    pub device: String,
    pub sensor_width: u32,
    pub sensor_height: u32,
    pub flush_threshold: usize,
    pub signal_check_interval: u64,
    pub max_display_fps: u32,
    pub fetch_timeout: Duration,
    pub exposure_lower_limit_us: f64,
    pub output_line: Option<String>,
    pub recovery: RecoveryPolicy,
    pub rigs: BTreeMap<u32, RigProfile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigProfile {
    pub serial: String,
    pub max_frame_rate: f64,
    pub pixel_format: PixelFormat,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let rigs = DEFAULT_RIGS
            .iter()
            .map(|&(rig, serial, max_frame_rate, pixel_format)| {
                (
                    rig,
                    RigProfile {
                        serial: serial.to_string(),
                        max_frame_rate,
                        pixel_format,
                    },
                )
            })
            .collect();
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            device: DEFAULT_DEVICE.to_string(),
            sensor_width: DEFAULT_SENSOR_WIDTH,
            sensor_height: DEFAULT_SENSOR_HEIGHT,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            signal_check_interval: DEFAULT_SIGNAL_CHECK_INTERVAL,
            max_display_fps: DEFAULT_MAX_DISPLAY_FPS,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            exposure_lower_limit_us: DEFAULT_EXPOSURE_LOWER_LIMIT_US,
            output_line: Some(DEFAULT_OUTPUT_LINE.to_string()),
            recovery: RecoveryPolicy::default(),
            rigs,
        }
    }
}

impl RecorderConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RIG_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RecorderConfigFile) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(root) = file.output_root {
            cfg.output_root = root;
        }
        if let Some(device) = file.device {
            cfg.device = device;
        }
        if let Some(sensor) = file.sensor {
            cfg.sensor_width = sensor.width.unwrap_or(cfg.sensor_width);
            cfg.sensor_height = sensor.height.unwrap_or(cfg.sensor_height);
        }
        if let Some(threshold) = file.ledger.and_then(|ledger| ledger.flush_threshold) {
            cfg.flush_threshold = threshold;
        }
        if let Some(interval) = file.signals.and_then(|signals| signals.check_interval_frames) {
            cfg.signal_check_interval = interval;
        }
        if let Some(fps) = file.preview.and_then(|preview| preview.max_display_fps) {
            cfg.max_display_fps = fps;
        }
        if let Some(capture) = file.capture {
            if let Some(ms) = capture.fetch_timeout_ms {
                cfg.fetch_timeout = Duration::from_millis(ms);
            }
            if let Some(limit) = capture.exposure_lower_limit_us {
                cfg.exposure_lower_limit_us = limit;
            }
            if let Some(line) = capture.output_line {
                cfg.output_line = if line.trim().is_empty() { None } else { Some(line) };
            }
        }
        if let Some(recovery) = file.recovery {
            let policy = &mut cfg.recovery;
            policy.max_attempts = recovery.max_attempts.unwrap_or(policy.max_attempts);
            if let Some(secs) = recovery.cooldown_secs {
                policy.cooldown = Duration::from_secs(secs);
            }
            if let Some(ms) = recovery.settle_ms {
                policy.settle = Duration::from_millis(ms);
            }
            if let Some(ms) = recovery.probe_timeout_ms {
                policy.probe_timeout = Duration::from_millis(ms);
            }
        }
        for rig in file.rigs.unwrap_or_default() {
            let pixel_format = match rig.pixel_format.as_deref() {
                Some(name) => name.parse()?,
                None => PixelFormat::Mono8,
            };
            cfg.rigs.insert(
                rig.rig,
                RigProfile {
                    serial: rig.serial,
                    max_frame_rate: rig.max_frame_rate,
                    pixel_format,
                },
            );
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("RIG_OUTPUT_ROOT") {
            if !root.trim().is_empty() {
                self.output_root = PathBuf::from(root);
            }
        }
        if let Ok(device) = std::env::var("RIG_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(threshold) = std::env::var("RIG_FLUSH_THRESHOLD") {
            self.flush_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("RIG_FLUSH_THRESHOLD must be a positive integer"))?;
        }
        if let Ok(attempts) = std::env::var("RIG_MAX_RECOVERY_ATTEMPTS") {
            self.recovery.max_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("RIG_MAX_RECOVERY_ATTEMPTS must be a positive integer"))?;
        }
        if let Ok(cooldown) = std::env::var("RIG_RECOVERY_COOLDOWN_SECS") {
            let seconds: u64 = cooldown.parse().map_err(|_| {
                anyhow!("RIG_RECOVERY_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.recovery.cooldown = Duration::from_secs(seconds);
        }
        if let Ok(fps) = std::env::var("RIG_MAX_DISPLAY_FPS") {
            self.max_display_fps = fps
                .parse()
                .map_err(|_| anyhow!("RIG_MAX_DISPLAY_FPS must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(anyhow!("flush threshold must be greater than zero"));
        }
        if self.signal_check_interval == 0 {
            return Err(anyhow!("signal check interval must be greater than zero"));
        }
        if self.recovery.max_attempts == 0 {
            return Err(anyhow!("max recovery attempts must be greater than zero"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(anyhow!("fetch timeout must be greater than zero"));
        }
        if self.sensor_width == 0 || self.sensor_height == 0 {
            return Err(anyhow!("sensor dimensions must be non-zero"));
        }
        if self.rigs.is_empty() {
            return Err(anyhow!("at least one rig must be configured"));
        }
        for (rig, profile) in &self.rigs {
            if profile.max_frame_rate.is_nan() || profile.max_frame_rate <= 0.0 {
                return Err(anyhow!("rig {} has an invalid max frame rate", rig));
            }
        }
        Ok(())
    }

    pub fn rig(&self, rig: u32) -> Result<&RigProfile> {
        self.rigs
            .get(&rig)
            .ok_or_else(|| anyhow!("invalid camera number {}", rig))
    }

    /// Requested rate clamped to what the rig's camera can deliver.
    pub fn effective_frame_rate(&self, rig: u32, requested: f64) -> Result<f64> {
        if requested.is_nan() || requested <= 0.0 {
            return Err(anyhow!("frame rate must be positive, got {}", requested));
        }
        let profile = self.rig(rig)?;
        if requested > profile.max_frame_rate {
            log::warn!(
                "config: requested {} fps exceeds rig {} maximum, using {}",
                requested,
                rig,
                profile.max_frame_rate
            );
            return Ok(profile.max_frame_rate);
        }
        Ok(requested)
    }

    pub fn camera_config(&self, rig: u32) -> Result<CameraConfig> {
        let profile = self.rig(rig)?;
        Ok(CameraConfig {
            device: self.device.clone(),
            width: self.sensor_width,
            height: self.sensor_height,
            pixel_format: profile.pixel_format,
        })
    }

    pub fn device_settings(&self, frame_rate: f64) -> DeviceSettings {
        DeviceSettings {
            frame_rate,
            output_line: self.output_line.clone(),
            exposure_lower_limit_us: self.exposure_lower_limit_us,
        }
    }
}

fn read_config_file(path: &Path) -> Result<RecorderConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
