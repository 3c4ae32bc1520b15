//! Session controller: the acquisition-and-recovery loop.
//!
//! One iteration fetches a frame with a bounded wait, persists it (binary sink
//! and frame id ledger), offers it to the preview at the display cadence, and
//! releases it. Faults go to the `RecoveryController`; durable-medium faults
//! stop the loop at once.
//!
//! Cancellation is polled on the display cadence only (presenter input, the
//! abort flag and the stop-signal file), so its latency is bounded by the
//! display interval plus the signal check interval, never by the capture rate.
//! Nothing is polled while recovery runs: one failing attempt blocks for up
//! to `2 * settle + probe_timeout + fetch_timeout + cooldown`, so a stop can
//! wait `max_attempts` times that before the loop gives up on its own.
//!
//! Every exit path finalises the summary and then writes the completion signal.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RecorderConfig;
use crate::device::{DeviceError, DeviceSettings, FrameSource};
use crate::frame::{Frame, FrameGeometry};
use crate::ledger::{FrameIdLedger, DEFAULT_FLUSH_THRESHOLD};
use crate::preview::{display_interval, PresentOutcome, Presenter, PreviewPacer};
use crate::recovery::{RecoveryController, RecoveryOutcome, RecoveryPolicy};
use crate::signals::SignalFiles;
use crate::sink::BinarySink;
use crate::summary::SessionSummary;

pub const DEFAULT_SUBJECT_ID: &str = "NoID";
pub const DEFAULT_RIG: u32 = 2;
pub const DEFAULT_FRAME_RATE: f64 = 60.0;
pub const DEFAULT_SIGNAL_CHECK_INTERVAL: u64 = 30;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Timestamp format used for session start/end and artifact names.
pub const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

/// Local time formatted as `yymmdd_HHMMSS`.
pub fn session_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Artifact locations for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPaths {
    pub dir: PathBuf,
    pub binary: PathBuf,
    pub backup: PathBuf,
    pub summary: PathBuf,
}

impl SessionPaths {
    pub fn new(dir: impl AsRef<Path>, start_time: &str, subject_id: &str) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let prefix = format!("{}_{}", start_time, subject_id);
        Self {
            binary: dir.join(format!("{}_binary_video.bin", prefix)),
            backup: dir.join(format!("{}_frame_ids_backup.txt", prefix)),
            summary: dir.join(format!("{}_Tracker_data.json", prefix)),
            dir,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub subject_id: String,
    pub start_time: String,
    pub rig: u32,
    /// Device identifier, for the log and session record.
    pub device: String,
    /// Serial of the camera installed on `rig`, when known.
    pub camera_serial: Option<String>,
    pub requested_frame_rate: f64,
    /// Applied on every (re)initialisation. `frame_rate` is the effective rate.
    pub settings: DeviceSettings,
    /// Write the binary artifact and frame id ledger.
    pub save: bool,
    pub flush_threshold: usize,
    /// Minimum frames between two stop-signal checks.
    pub signal_check_interval: u64,
    pub fetch_timeout: Duration,
    /// Minimum time between two preview ticks.
    pub display_interval: Duration,
    pub recovery: RecoveryPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            subject_id: DEFAULT_SUBJECT_ID.to_string(),
            start_time: session_timestamp(),
            rig: DEFAULT_RIG,
            device: "stub://rig_camera".to_string(),
            camera_serial: None,
            requested_frame_rate: DEFAULT_FRAME_RATE,
            settings: DeviceSettings::default(),
            save: true,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            signal_check_interval: DEFAULT_SIGNAL_CHECK_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            display_interval: display_interval(crate::preview::DEFAULT_MAX_DISPLAY_FPS),
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl SessionOptions {
    /// Options for `rig`, with the requested rate clamped to the rig maximum.
    pub fn from_config(
        config: &RecorderConfig,
        rig: u32,
        requested_frame_rate: f64,
        subject_id: &str,
        start_time: &str,
    ) -> Result<Self> {
        let frame_rate = config.effective_frame_rate(rig, requested_frame_rate)?;
        Ok(Self {
            subject_id: subject_id.to_string(),
            start_time: start_time.to_string(),
            rig,
            device: config.device.clone(),
            camera_serial: Some(config.rig(rig)?.serial.clone()),
            requested_frame_rate,
            settings: config.device_settings(frame_rate),
            save: true,
            flush_threshold: config.flush_threshold,
            signal_check_interval: config.signal_check_interval,
            fetch_timeout: config.fetch_timeout,
            display_interval: display_interval(config.max_display_fps),
            recovery: config.recovery.clone(),
        })
    }
}

/// Record of one recording attempt.
#[derive(Clone, Debug)]
pub struct Session {
    pub subject_id: String,
    pub rig: u32,
    pub device: String,
    pub camera_serial: Option<String>,
    pub start_time: String,
    /// Set once, when the loop exits.
    pub end_time: Option<String>,
    pub requested_frame_rate: f64,
    pub frame_rate: f64,
    pub dir: PathBuf,
    pub geometry: FrameGeometry,
}

/// Why the loop exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Presenter stop request or the local abort flag.
    UserAbort,
    StopSignal,
    RecoveryExhausted,
    SinkWriteFailed,
    LedgerWriteFailed,
}

impl StopReason {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            StopReason::RecoveryExhausted
                | StopReason::SinkWriteFailed
                | StopReason::LedgerWriteFailed
        )
    }
}

#[derive(Clone, Debug)]
pub struct SessionReport {
    pub reason: StopReason,
    pub frames_captured: u64,
    pub frames_saved: usize,
    pub bytes_written: u64,
    pub recovery_attempts: u64,
    pub start_time: String,
    pub end_time: String,
    pub paths: SessionPaths,
}

impl SessionReport {
    pub fn is_failure(&self) -> bool {
        self.reason.is_failure()
    }
}

enum Persist {
    Saved,
    /// `recorded` is set when the payload and id reached the session record
    /// before the failure, so the frame still counts as captured.
    Failed { reason: StopReason, recorded: bool },
}

pub struct SessionController<S: FrameSource> {
    source: S,
    session: Session,
    options: SessionOptions,
    paths: SessionPaths,
    signals: SignalFiles,
    sink: Option<BinarySink>,
    ledger: Option<FrameIdLedger>,
    recovery: RecoveryController,
    presenter: Option<Box<dyn Presenter>>,
    abort: Arc<AtomicBool>,
    summary: SessionSummary,
    frame_count: u64,
    finished: bool,
}

impl<S: FrameSource> SessionController<S> {
    /// Bring the device up and open the session artifacts.
    ///
    /// The start-state summary (empty `end_time`) is on disk when this returns.
    pub fn new(mut source: S, options: SessionOptions, paths: SessionPaths) -> Result<Self> {
        std::fs::create_dir_all(&paths.dir)
            .with_context(|| format!("create session directory {}", paths.dir.display()))?;

        source
            .init()
            .map_err(|e| anyhow!("initialise camera {}: {}", options.device, e))?;
        source
            .apply_configuration(&options.settings)
            .map_err(|e| anyhow!("configure camera {}: {}", options.device, e))?;
        source
            .begin_acquisition()
            .map_err(|e| anyhow!("start acquisition on {}: {}", options.device, e))?;
        let geometry = source
            .geometry()
            .map_err(|e| anyhow!("read geometry from {}: {}", options.device, e))?;

        let (sink, ledger) = if options.save {
            (
                Some(BinarySink::open(&paths.binary)?),
                Some(FrameIdLedger::open(&paths.backup, options.flush_threshold)?),
            )
        } else {
            (None, None)
        };

        let session = Session {
            subject_id: options.subject_id.clone(),
            rig: options.rig,
            device: options.device.clone(),
            camera_serial: options.camera_serial.clone(),
            start_time: options.start_time.clone(),
            end_time: None,
            requested_frame_rate: options.requested_frame_rate,
            frame_rate: options.settings.frame_rate,
            dir: paths.dir.clone(),
            geometry,
        };

        let summary = SessionSummary::started(session.frame_rate, &session.start_time, geometry);
        summary.write(&paths.summary)?;

        log::info!(
            "session: rig {} (camera {} serial {}) subject {} at {} fps ({}x{} {}), artifacts in {}",
            session.rig,
            session.device,
            session.camera_serial.as_deref().unwrap_or("unknown"),
            session.subject_id,
            session.frame_rate,
            geometry.width,
            geometry.height,
            geometry.pixel_format,
            paths.dir.display()
        );

        Ok(Self {
            signals: SignalFiles::new(&paths.dir, options.rig),
            recovery: RecoveryController::new(options.recovery.clone()),
            source,
            session,
            options,
            paths,
            sink,
            ledger,
            presenter: None,
            abort: Arc::new(AtomicBool::new(false)),
            summary,
            frame_count: 0,
            finished: false,
        })
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Replace the local abort flag (e.g. one shared with a Ctrl-C handler).
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run until a stop condition, then finalise the artifacts.
    ///
    /// Errors only when finalisation itself fails; the stop reason, fatal or
    /// not, is in the report.
    pub fn run(&mut self) -> Result<SessionReport> {
        if self.finished {
            bail!("session {} already finished", self.session.start_time);
        }
        let mut reason = self.capture_loop();
        if let Some(fatal) = self.finalize_ledger() {
            if !reason.is_failure() {
                reason = fatal;
            }
        }
        self.shutdown_device();
        self.finalize(reason)
    }

    fn capture_loop(&mut self) -> StopReason {
        let mut pacer = PreviewPacer::new(self.options.display_interval);
        let mut frames_since_signal_check = 0u64;

        loop {
            let frame = match self.fetch() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!(
                        "session: capture fault after {} frames: {}",
                        self.frame_count,
                        err
                    );
                    match self.recovery.recover(
                        &mut self.source,
                        &self.options.settings,
                        self.session.geometry,
                    ) {
                        RecoveryOutcome::Recovered => continue,
                        RecoveryOutcome::RetryAfter(cooldown) => {
                            std::thread::sleep(cooldown);
                            continue;
                        }
                        RecoveryOutcome::Exhausted => {
                            log::error!("session: unable to recover camera, stopping recording");
                            return StopReason::RecoveryExhausted;
                        }
                    }
                }
            };

            self.recovery.record_success();

            if let Persist::Failed { reason, recorded } = self.persist(&frame) {
                self.source.release(frame);
                if recorded {
                    self.frame_count += 1;
                }
                return reason;
            }

            frames_since_signal_check += 1;
            let mut stop = None;
            if pacer.tick(Instant::now()) {
                stop = self.present(&frame);
                if stop.is_none() && self.abort.load(Ordering::SeqCst) {
                    log::info!("session: abort requested");
                    stop = Some(StopReason::UserAbort);
                }
                if stop.is_none() && frames_since_signal_check >= self.options.signal_check_interval
                {
                    frames_since_signal_check = 0;
                    if self.signals.stop_requested() {
                        log::info!(
                            "session: stop signal {} found",
                            self.signals.stop_path().display()
                        );
                        stop = Some(StopReason::StopSignal);
                    }
                }
            }

            self.source.release(frame);
            self.frame_count += 1;

            if let Some(reason) = stop {
                return reason;
            }
        }
    }

    /// Next complete frame of the session geometry. Anything else is released
    /// and reported as a fault.
    fn fetch(&mut self) -> Result<Frame, DeviceError> {
        let frame = self
            .source
            .next_frame(self.options.fetch_timeout)?
            .ok_or_else(|| DeviceError::Fault("no image returned".to_string()))?;
        let geometry = self.session.geometry;
        if !geometry.accepts(&frame) {
            log::warn!(
                "session: frame {} incomplete ({} of {} bytes)",
                frame.frame_id(),
                frame.byte_len(),
                geometry.frame_len()
            );
            self.source.release(frame);
            return Err(DeviceError::Incomplete);
        }
        Ok(frame)
    }

    fn persist(&mut self, frame: &Frame) -> Persist {
        let (Some(sink), Some(ledger)) = (self.sink.as_mut(), self.ledger.as_mut()) else {
            return Persist::Saved;
        };
        if let Err(err) = sink.write(frame.payload()) {
            log::error!("session: {:#}", err);
            return Persist::Failed {
                reason: StopReason::SinkWriteFailed,
                recorded: false,
            };
        }
        // The payload is in the binary artifact, so the id belongs in the
        // summary even if the mirror cannot take it.
        ledger.append(frame.frame_id());
        if let Err(err) = ledger.flush_if_full() {
            log::error!("session: {:#}", err);
            return Persist::Failed {
                reason: StopReason::LedgerWriteFailed,
                recorded: true,
            };
        }
        Persist::Saved
    }

    fn present(&mut self, frame: &Frame) -> Option<StopReason> {
        let presenter = self.presenter.as_mut()?;
        match presenter.present(frame) {
            Ok(PresentOutcome::Continue) => None,
            Ok(PresentOutcome::StopRequested) => {
                log::info!("session: preview requested stop");
                Some(StopReason::UserAbort)
            }
            Err(err) => {
                // Capture continues headless; stop conditions are still polled.
                log::error!("session: preview failed, disabling it: {:#}", err);
                if let Some(mut presenter) = self.presenter.take() {
                    presenter.close();
                }
                None
            }
        }
    }

    fn finalize_ledger(&mut self) -> Option<StopReason> {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.sync() {
                log::warn!("session: {:#}", err);
            }
        }
        let ledger = self.ledger.as_mut()?;
        match ledger.final_flush() {
            Ok(()) => None,
            Err(err) => {
                log::error!("session: {:#}", err);
                Some(StopReason::LedgerWriteFailed)
            }
        }
    }

    fn shutdown_device(&mut self) {
        if let Some(mut presenter) = self.presenter.take() {
            presenter.close();
        }
        if let Err(err) = self.source.end_acquisition() {
            log::debug!("session: end acquisition: {}", err);
        }
        if let Err(err) = self.source.deinit() {
            log::debug!("session: deinit: {}", err);
        }
    }

    fn finalize(&mut self, reason: StopReason) -> Result<SessionReport> {
        self.finished = true;
        let end_time = session_timestamp();
        self.session.end_time = Some(end_time.clone());

        self.summary.end_time = end_time.clone();
        self.summary.frame_ids = self
            .ledger
            .as_ref()
            .map(|ledger| ledger.frame_ids().to_vec())
            .unwrap_or_default();
        self.summary.write(&self.paths.summary)?;
        self.signals.mark_finished()?;

        let report = SessionReport {
            reason,
            frames_captured: self.frame_count,
            frames_saved: self.summary.frame_count(),
            bytes_written: self.sink.as_ref().map_or(0, BinarySink::bytes_written),
            recovery_attempts: self.recovery.total_attempts(),
            start_time: self.session.start_time.clone(),
            end_time,
            paths: self.paths.clone(),
        };
        if report.is_failure() {
            log::error!(
                "session: stopped ({:?}) after {} frames",
                reason,
                report.frames_captured
            );
        } else {
            log::info!(
                "session: stopped ({:?}) after {} frames",
                reason,
                report.frames_captured
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SyntheticCamera, SyntheticConfig, SyntheticStep};
    use tempfile::TempDir;

    /// Requests a stop after `limit` presented frames.
    struct StopAfter {
        limit: u64,
        seen: u64,
    }

    impl Presenter for StopAfter {
        fn present(&mut self, _frame: &Frame) -> Result<PresentOutcome> {
            self.seen += 1;
            if self.seen >= self.limit {
                Ok(PresentOutcome::StopRequested)
            } else {
                Ok(PresentOutcome::Continue)
            }
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            start_time: "240101_120000".to_string(),
            display_interval: Duration::ZERO,
            recovery: RecoveryPolicy {
                cooldown: Duration::ZERO,
                settle: Duration::ZERO,
                ..RecoveryPolicy::default()
            },
            ..SessionOptions::default()
        }
    }

    fn camera(script: Vec<SyntheticStep>) -> SyntheticCamera {
        SyntheticCamera::new(SyntheticConfig {
            script,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn artifact_names_follow_start_and_subject() {
        let paths = SessionPaths::new("/data/240101_120000_M7", "240101_120000", "M7");
        assert_eq!(
            paths.binary,
            PathBuf::from("/data/240101_120000_M7/240101_120000_M7_binary_video.bin")
        );
        assert_eq!(
            paths.backup,
            PathBuf::from("/data/240101_120000_M7/240101_120000_M7_frame_ids_backup.txt")
        );
        assert_eq!(
            paths.summary,
            PathBuf::from("/data/240101_120000_M7/240101_120000_M7_Tracker_data.json")
        );
    }

    #[test]
    fn start_summary_is_written_at_construction() -> Result<()> {
        let dir = TempDir::new()?;
        let opts = options();
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let controller = SessionController::new(camera(Vec::new()), opts, paths.clone())?;

        let summary = SessionSummary::load(&paths.summary)?;
        assert!(!summary.is_finalized());
        assert_eq!(summary.image_width, 64);
        assert_eq!(summary.image_height, 48);
        assert!(controller.session().end_time.is_none());
        assert!(!SignalFiles::new(dir.path(), 2).is_finished());
        Ok(())
    }

    #[test]
    fn configuration_failure_aborts_construction() -> Result<()> {
        let dir = TempDir::new()?;
        let source = SyntheticCamera::new(SyntheticConfig {
            configuration_failures: 1,
            ..SyntheticConfig::default()
        });
        let opts = options();
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        assert!(SessionController::new(source, opts, paths.clone()).is_err());
        assert!(!paths.summary.exists());
        Ok(())
    }

    #[test]
    fn presenter_stop_finalizes_session() -> Result<()> {
        let dir = TempDir::new()?;
        let opts = options();
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let mut controller = SessionController::new(camera(Vec::new()), opts, paths.clone())?
            .with_presenter(Box::new(StopAfter { limit: 12, seen: 0 }));

        let report = controller.run()?;
        assert_eq!(report.reason, StopReason::UserAbort);
        assert!(!report.is_failure());
        assert_eq!(report.frames_captured, 12);
        assert_eq!(report.frames_saved, 12);
        assert_eq!(controller.source().stats().outstanding_frames, 0);

        let summary = SessionSummary::load(&paths.summary)?;
        assert!(summary.is_finalized());
        assert_eq!(summary.frame_ids, (0..12).collect::<Vec<u64>>());
        assert!(SignalFiles::new(dir.path(), 2).is_finished());
        assert!(controller.run().is_err());
        Ok(())
    }

    #[test]
    fn abort_flag_is_polled_without_presenter() -> Result<()> {
        let dir = TempDir::new()?;
        let opts = options();
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let mut controller = SessionController::new(camera(Vec::new()), opts, paths)?;
        controller.abort_handle().store(true, Ordering::SeqCst);

        let report = controller.run()?;
        assert_eq!(report.reason, StopReason::UserAbort);
        assert_eq!(report.frames_captured, 1);
        Ok(())
    }

    #[test]
    fn abort_is_not_polled_while_recovery_fails() -> Result<()> {
        let dir = TempDir::new()?;
        let opts = options();
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let mut controller =
            SessionController::new(camera(vec![SyntheticStep::Timeout; 6]), opts, paths)?;
        controller.abort_handle().store(true, Ordering::SeqCst);

        // The loop only polls after a good frame, so recovery runs to the end.
        let report = controller.run()?;
        assert_eq!(report.reason, StopReason::RecoveryExhausted);
        assert_eq!(report.recovery_attempts, 3);
        assert_eq!(report.frames_captured, 0);
        Ok(())
    }

    #[test]
    fn missing_frame_triggers_recovery_and_capture_resumes() -> Result<()> {
        let dir = TempDir::new()?;
        let opts = options();
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let source = camera(vec![
            SyntheticStep::Frame,
            SyntheticStep::Missing,
            SyntheticStep::Frame,
        ]);
        let mut controller = SessionController::new(source, opts, paths)?
            .with_presenter(Box::new(StopAfter { limit: 5, seen: 0 }));

        let report = controller.run()?;
        assert_eq!(report.reason, StopReason::UserAbort);
        assert_eq!(report.recovery_attempts, 1);
        assert_eq!(report.frames_captured, 5);
        // Frame 1 was the recovery test frame and is not recorded.
        let summary = SessionSummary::load(&report.paths.summary)?;
        assert_eq!(summary.frame_ids, vec![0, 2, 3, 4, 5]);
        Ok(())
    }

    #[test]
    fn recording_disabled_session_writes_no_payloads() -> Result<()> {
        let dir = TempDir::new()?;
        let opts = SessionOptions {
            save: false,
            ..options()
        };
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let mut controller = SessionController::new(camera(Vec::new()), opts, paths.clone())?
            .with_presenter(Box::new(StopAfter { limit: 3, seen: 0 }));

        let report = controller.run()?;
        assert_eq!(report.frames_captured, 3);
        assert_eq!(report.bytes_written, 0);
        assert!(!paths.binary.exists());
        assert!(!paths.backup.exists());
        assert!(SessionSummary::load(&paths.summary)?.frame_ids.is_empty());
        Ok(())
    }

    #[test]
    fn options_from_config_clamp_rate_and_name_the_rig_camera() -> Result<()> {
        let config = RecorderConfig::default();
        let opts = SessionOptions::from_config(&config, 6, 120.0, "M7", "240101_120000")?;
        assert_eq!(opts.settings.frame_rate, 59.6);
        assert_eq!(opts.requested_frame_rate, 120.0);
        assert_eq!(opts.camera_serial.as_deref(), Some("21423798"));

        let dir = TempDir::new()?;
        let opts = SessionOptions {
            display_interval: Duration::ZERO,
            ..SessionOptions::from_config(&config, 2, 60.0, "M7", "240101_120000")?
        };
        let paths = SessionPaths::new(dir.path(), &opts.start_time, &opts.subject_id);
        let controller = SessionController::new(camera(Vec::new()), opts, paths)?;
        assert_eq!(controller.session().camera_serial.as_deref(), Some("20530175"));
        assert_eq!(controller.session().frame_rate, 60.0);

        assert!(SessionOptions::from_config(&config, 9, 60.0, "M7", "240101_120000").is_err());
        Ok(())
    }

    #[test]
    fn only_fatal_reasons_are_failures() {
        assert!(!StopReason::UserAbort.is_failure());
        assert!(!StopReason::StopSignal.is_failure());
        assert!(StopReason::RecoveryExhausted.is_failure());
        assert!(StopReason::SinkWriteFailed.is_failure());
        assert!(StopReason::LedgerWriteFailed.is_failure());
    }
}
