//! V4L2 camera backend.
//!
//! Drives a local device node (e.g. /dev/video0) through libv4l:
//! - `init` opens a control handle used for format, frame rate and exposure
//! - `begin_acquisition` opens a streaming handle with mmap buffers
//! - `next_frame` dequeues one buffer and copies it out as a `Frame`
//!
//! The sequence counter from the driver is the frame id. Buffers flagged with
//! an error or carrying fewer bytes than one full frame come back incomplete.

use ouroboros::self_referencing;
use std::io;
use std::time::Duration;

use super::{CameraConfig, CameraStats, DeviceError, DeviceSettings, FrameSource};
use crate::frame::{Frame, FrameGeometry, PixelFormat};

const V4L2_CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const V4L2_EXPOSURE_APERTURE_PRIORITY: i64 = 3;
const STREAM_BUFFERS: u32 = 4;

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Camera {
    config: CameraConfig,
    control: Option<v4l::Device>,
    stream: Option<StreamState>,
    geometry: Option<FrameGeometry>,
    frames_captured: u64,
    outstanding: usize,
}

impl V4l2Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            control: None,
            stream: None,
            geometry: None,
            frames_captured: 0,
            outstanding: 0,
        }
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frames_captured,
            outstanding_frames: self.outstanding,
            device: self.config.device.clone(),
        }
    }

    fn control(&self) -> Result<&v4l::Device, DeviceError> {
        self.control
            .as_ref()
            .ok_or_else(|| DeviceError::Configuration("device not initialised".to_string()))
    }

    fn apply_format(&mut self) -> Result<(), DeviceError> {
        use v4l::video::Capture;

        let device = self.control()?;
        let mut format = device
            .format()
            .map_err(|err| configuration("read v4l2 format", err))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = fourcc(self.config.pixel_format);

        let applied = device
            .set_format(&format)
            .map_err(|err| configuration("set v4l2 format", err))?;
        if applied.fourcc != format.fourcc {
            return Err(DeviceError::Configuration(format!(
                "{} does not support pixel format {}",
                self.config.device, self.config.pixel_format
            )));
        }

        self.geometry = Some(FrameGeometry {
            width: applied.width,
            height: applied.height,
            pixel_format: self.config.pixel_format,
        });
        Ok(())
    }

    fn apply_frame_rate(&self, frame_rate: f64) -> Result<(), DeviceError> {
        use v4l::video::Capture;

        if frame_rate.is_nan() || frame_rate < 1.0 {
            return Err(DeviceError::Configuration(format!(
                "unable to set frame rate {}",
                frame_rate
            )));
        }
        let params = v4l::video::capture::Parameters::with_fps(frame_rate.round() as u32);
        self.control()?
            .set_params(&params)
            .map_err(|err| configuration("set v4l2 frame rate", err))?;
        Ok(())
    }

    fn apply_exposure(&self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        let control = v4l::control::Control {
            id: V4L2_CID_EXPOSURE_AUTO,
            value: v4l::control::Value::Integer(V4L2_EXPOSURE_APERTURE_PRIORITY),
        };
        self.control()?
            .set_control(control)
            .map_err(|err| configuration("set continuous auto exposure", err))?;
        log::debug!(
            "V4l2Camera: exposure lower limit {}us is not exposed by v4l2 on {}",
            settings.exposure_lower_limit_us,
            self.config.device
        );
        Ok(())
    }
}

impl FrameSource for V4l2Camera {
    fn init(&mut self) -> Result<(), DeviceError> {
        let device = v4l::Device::with_path(&self.config.device).map_err(|err| {
            DeviceError::Fault(format!("open v4l2 device {}: {}", self.config.device, err))
        })?;
        self.control = Some(device);
        log::info!("V4l2Camera: opened {}", self.config.device);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        self.stream = None;
        self.control = None;
        Ok(())
    }

    fn apply_configuration(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        self.apply_format()?;
        self.apply_frame_rate(settings.frame_rate)?;
        self.apply_exposure(settings)?;
        if let Some(line) = &settings.output_line {
            log::warn!(
                "V4l2Camera: output line {} has no v4l2 equivalent on {}, skipping",
                line,
                self.config.device
            );
        }
        Ok(())
    }

    fn begin_acquisition(&mut self) -> Result<(), DeviceError> {
        use v4l::buffer::Type;

        let device = v4l::Device::with_path(&self.config.device).map_err(|err| {
            DeviceError::Fault(format!("open v4l2 stream {}: {}", self.config.device, err))
        })?;
        let state = StreamStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
        .map_err(|err| DeviceError::Fault(format!("create v4l2 buffer stream: {}", err)))?;
        self.stream = Some(state);
        Ok(())
    }

    fn end_acquisition(&mut self) -> Result<(), DeviceError> {
        match self.stream.take() {
            Some(_) => Ok(()),
            None => Err(DeviceError::NotAcquiring),
        }
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, DeviceError> {
        use v4l::io::traits::CaptureStream;

        let geometry = self.geometry()?;
        let state = self.stream.as_mut().ok_or(DeviceError::NotAcquiring)?;
        let expected = geometry.frame_len();

        let frame = state.with_mut(|fields| {
            fields.stream.set_timeout(timeout);
            let (buf, meta) = fields.stream.next().map_err(|err| match err.kind() {
                io::ErrorKind::TimedOut => DeviceError::Timeout,
                _ => DeviceError::Fault(format!("dequeue v4l2 buffer: {}", err)),
            })?;
            let used = (meta.bytesused as usize).min(buf.len());
            let complete =
                !meta.flags.contains(v4l::buffer::Flags::ERROR) && used >= expected;
            let payload = buf[..used.min(expected)].to_vec();
            Ok::<_, DeviceError>(Frame::new(
                payload,
                meta.sequence as u64,
                complete,
                geometry,
            ))
        })?;

        self.frames_captured += 1;
        self.outstanding += 1;
        Ok(Some(frame))
    }

    fn release(&mut self, frame: Frame) {
        // The mmap buffer was requeued on dequeue; the copy is simply dropped.
        drop(frame);
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    fn geometry(&self) -> Result<FrameGeometry, DeviceError> {
        self.geometry
            .ok_or_else(|| DeviceError::Configuration("device not configured".to_string()))
    }
}

fn fourcc(format: PixelFormat) -> v4l::FourCC {
    match format {
        PixelFormat::Mono8 => v4l::FourCC::new(b"GREY"),
        PixelFormat::BayerRG8 => v4l::FourCC::new(b"RGGB"),
        PixelFormat::Mono16 => v4l::FourCC::new(b"Y16 "),
    }
}

fn configuration(what: &str, err: io::Error) -> DeviceError {
    DeviceError::Configuration(format!("{}: {}", what, err))
}
