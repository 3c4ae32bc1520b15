//! Live preview at a capped display rate.
//!
//! Rendering is an external capability behind `Presenter`. The session loop
//! only decides *when* to present: `PreviewPacer` lets a frame through once the
//! display budget (1000 / max display fps, in whole milliseconds) has elapsed
//! since the last rendered frame, so render cost never throttles capture.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::frame::Frame;

pub const DEFAULT_MAX_DISPLAY_FPS: u32 = 30;
pub const DEFAULT_WINDOW_WIDTH: u32 = 800;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 600;

/// Preview window parameters handed to whatever renders frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub title: String,
    pub max_display_fps: u32,
}

impl PreviewConfig {
    pub fn for_rig(rig: u32) -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            title: format!("Rig {}. Press 'Esc' to stop session.", rig),
            max_display_fps: DEFAULT_MAX_DISPLAY_FPS,
        }
    }

    pub fn display_interval(&self) -> Duration {
        display_interval(self.max_display_fps)
    }
}

/// Minimum time between rendered frames. Zero fps disables the cap.
pub fn display_interval(max_display_fps: u32) -> Duration {
    if max_display_fps == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from(1000 / max_display_fps))
}

/// What the presenter saw from the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Continue,
    /// Window closed or abort key pressed.
    StopRequested,
}

pub trait Presenter {
    /// Render one frame and poll local input.
    fn present(&mut self, frame: &Frame) -> Result<PresentOutcome>;

    /// Tear down window resources. Called once when the loop exits.
    fn close(&mut self) {}
}

/// Display-rate gate.
#[derive(Debug)]
pub struct PreviewPacer {
    interval: Duration,
    last: Option<Instant>,
}

impl PreviewPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when the display budget has elapsed. Marks `now` as the last render.
    pub fn tick(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Headless presenter: logs what would have been drawn.
pub struct LogPresenter {
    config: PreviewConfig,
    rendered: u64,
}

impl LogPresenter {
    pub fn new(config: PreviewConfig) -> Self {
        log::info!(
            "preview: {} ({}x{}, max {} fps)",
            config.title,
            config.window_width,
            config.window_height,
            config.max_display_fps
        );
        Self {
            config,
            rendered: 0,
        }
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl Presenter for LogPresenter {
    fn present(&mut self, frame: &Frame) -> Result<PresentOutcome> {
        self.rendered += 1;
        log::debug!(
            "preview: frame {} mean intensity {:.1}",
            frame.frame_id(),
            mean_intensity(frame.payload())
        );
        Ok(PresentOutcome::Continue)
    }

    fn close(&mut self) {
        log::info!(
            "preview: closed {} after {} rendered frames",
            self.config.title,
            self.rendered
        );
    }
}

/// Mean of a sparse sample of the payload bytes.
fn mean_intensity(payload: &[u8]) -> f64 {
    let step = (payload.len() / 1024).max(1);
    let (sum, count) = payload
        .iter()
        .step_by(step)
        .fold((0u64, 0u64), |(sum, count), &b| (sum + u64::from(b), count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameGeometry, PixelFormat};

    #[test]
    fn display_interval_uses_whole_milliseconds() {
        assert_eq!(display_interval(30), Duration::from_millis(33));
        assert_eq!(display_interval(1000), Duration::from_millis(1));
        assert_eq!(display_interval(0), Duration::ZERO);
    }

    #[test]
    fn pacer_skips_frames_inside_budget() {
        let mut pacer = PreviewPacer::new(Duration::from_millis(33));
        let start = Instant::now();
        assert!(pacer.tick(start));
        assert!(!pacer.tick(start + Duration::from_millis(10)));
        assert!(!pacer.tick(start + Duration::from_millis(32)));
        assert!(pacer.tick(start + Duration::from_millis(33)));
        assert!(!pacer.tick(start + Duration::from_millis(40)));
    }

    #[test]
    fn zero_interval_renders_every_frame() {
        let mut pacer = PreviewPacer::new(Duration::ZERO);
        let now = Instant::now();
        assert!(pacer.tick(now));
        assert!(pacer.tick(now));
    }

    #[test]
    fn log_presenter_never_requests_stop() -> Result<()> {
        let mut presenter = LogPresenter::new(PreviewConfig::for_rig(2));
        let geometry = FrameGeometry {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Mono8,
        };
        let frame = Frame::new(vec![0, 10, 20, 30], 1, true, geometry);
        assert_eq!(presenter.present(&frame)?, PresentOutcome::Continue);
        assert_eq!(presenter.rendered(), 1);
        assert!((mean_intensity(frame.payload()) - 15.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn title_names_the_rig() {
        assert_eq!(
            PreviewConfig::for_rig(4).title,
            "Rig 4. Press 'Esc' to stop session."
        );
    }
}
