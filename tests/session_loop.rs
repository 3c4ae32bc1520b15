use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use rig_capture::{
    read_frame_id_backup, verify, CameraSource, Frame, PresentOutcome, Presenter,
    RecoveryPolicy, SessionController, SessionOptions, SessionPaths, SessionSummary, SignalFiles,
    StopReason, SyntheticConfig, SyntheticStep,
};

const FRAME_LEN: u64 = 64 * 48;

fn options() -> SessionOptions {
    SessionOptions {
        start_time: "240101_120000".to_string(),
        subject_id: "M7".to_string(),
        display_interval: Duration::ZERO,
        recovery: RecoveryPolicy {
            max_attempts: 3,
            cooldown: Duration::ZERO,
            settle: Duration::ZERO,
            probe_timeout: Duration::from_millis(10),
        },
        ..SessionOptions::default()
    }
}

fn camera(script: Vec<SyntheticStep>) -> CameraSource {
    CameraSource::synthetic(SyntheticConfig {
        script,
        ..SyntheticConfig::default()
    })
}

fn paths(dir: &TempDir) -> SessionPaths {
    SessionPaths::new(dir.path(), "240101_120000", "M7")
}

/// Stops after `limit` rendered frames.
struct StopAfter {
    limit: u64,
    seen: u64,
}

impl StopAfter {
    fn boxed(limit: u64) -> Box<Self> {
        Box::new(Self { limit, seen: 0 })
    }
}

impl Presenter for StopAfter {
    fn present(&mut self, _frame: &Frame) -> Result<PresentOutcome> {
        self.seen += 1;
        Ok(if self.seen >= self.limit {
            PresentOutcome::StopRequested
        } else {
            PresentOutcome::Continue
        })
    }
}

/// Records the backup line count at selected frames, then stops.
struct BackupWatcher {
    backup: PathBuf,
    seen: u64,
    limit: u64,
    at: Vec<u64>,
    observed: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl Presenter for BackupWatcher {
    fn present(&mut self, _frame: &Frame) -> Result<PresentOutcome> {
        self.seen += 1;
        if self.at.contains(&self.seen) {
            let lines = read_frame_id_backup(&self.backup)?.len();
            self.observed.lock().unwrap().push((self.seen, lines));
        }
        Ok(if self.seen >= self.limit {
            PresentOutcome::StopRequested
        } else {
            PresentOutcome::Continue
        })
    }
}

/// Writes the stop file when it sees frame `at`; never asks to stop itself.
struct StopFileWriter {
    stop_path: PathBuf,
    seen: u64,
    at: u64,
}

impl Presenter for StopFileWriter {
    fn present(&mut self, _frame: &Frame) -> Result<PresentOutcome> {
        self.seen += 1;
        if self.seen == self.at {
            std::fs::write(&self.stop_path, b"")?;
        }
        Ok(PresentOutcome::Continue)
    }
}

#[test]
fn recovery_succeeds_on_third_attempt() -> Result<()> {
    let dir = TempDir::new()?;
    let mut script = vec![SyntheticStep::Frame; 5];
    script.extend([
        SyntheticStep::Incomplete, // fault in steady state
        SyntheticStep::Incomplete, // attempt 1
        SyntheticStep::Timeout,
        SyntheticStep::Incomplete, // attempt 2
        SyntheticStep::Timeout,
        SyntheticStep::Frame, // attempt 3
    ]);
    let mut controller = SessionController::new(camera(script), options(), paths(&dir))?
        .with_presenter(StopAfter::boxed(10));

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::UserAbort);
    assert!(!report.is_failure());
    assert_eq!(report.recovery_attempts, 3);
    assert_eq!(report.frames_captured, 10);
    assert_eq!(controller.source().stats().outstanding_frames, 0);

    let summary = SessionSummary::load(&report.paths.summary)?;
    assert_eq!(summary.frame_ids, vec![0, 1, 2, 3, 4, 9, 10, 11, 12, 13]);
    assert_eq!(std::fs::metadata(&report.paths.binary)?.len(), 10 * FRAME_LEN);
    Ok(())
}

#[test]
fn exhausted_recovery_still_finalizes_session() -> Result<()> {
    let dir = TempDir::new()?;
    let mut script = vec![SyntheticStep::Frame; 10];
    script.extend([SyntheticStep::Incomplete; 6]);
    let mut controller = SessionController::new(camera(script), options(), paths(&dir))?;

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::RecoveryExhausted);
    assert!(report.is_failure());
    assert_eq!(report.recovery_attempts, 3);
    assert_eq!(report.frames_captured, 10);
    assert_eq!(controller.source().stats().outstanding_frames, 0);

    let summary = SessionSummary::load(&report.paths.summary)?;
    assert!(summary.is_finalized());
    assert_eq!(summary.frame_ids, (0..10).collect::<Vec<u64>>());
    assert!(SignalFiles::new(dir.path(), 2).is_finished());

    // A short session is still a consistent one.
    let verified = verify::verify_session(&report.paths.summary, 2)?;
    assert!(verified.is_ok(), "{:?}", verified.violations);
    Ok(())
}

#[test]
fn backup_is_written_in_full_batches_plus_final_flush() -> Result<()> {
    let dir = TempDir::new()?;
    let paths = paths(&dir);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let watcher = BackupWatcher {
        backup: paths.backup.clone(),
        seen: 0,
        limit: 450,
        at: vec![199, 200, 399, 400, 449],
        observed: Arc::clone(&observed),
    };
    let opts = SessionOptions {
        flush_threshold: 200,
        ..options()
    };
    let mut controller =
        SessionController::new(camera(Vec::new()), opts, paths.clone())?.with_presenter(Box::new(watcher));

    let report = controller.run()?;
    assert_eq!(report.frames_captured, 450);
    assert_eq!(
        *observed.lock().unwrap(),
        vec![(199, 0), (200, 200), (399, 200), (400, 400), (449, 400)]
    );

    let backup = read_frame_id_backup(&paths.backup)?;
    let summary = SessionSummary::load(&paths.summary)?;
    assert_eq!(backup.len(), 450);
    assert_eq!(backup, summary.frame_ids);
    assert_eq!(std::fs::metadata(&paths.binary)?.len(), 450 * FRAME_LEN);
    Ok(())
}

#[test]
fn stop_signal_is_honoured_at_the_next_check() -> Result<()> {
    let dir = TempDir::new()?;
    let signals = SignalFiles::new(dir.path(), 2);
    let writer = StopFileWriter {
        stop_path: signals.stop_path().to_path_buf(),
        seen: 0,
        at: 10,
    };
    let opts = SessionOptions {
        signal_check_interval: 30,
        ..options()
    };
    let mut controller =
        SessionController::new(camera(Vec::new()), opts, paths(&dir))?.with_presenter(Box::new(writer));

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::StopSignal);
    // Appeared at frame 10, noticed at the check after frame 30, not before.
    assert_eq!(report.frames_captured, 30);
    assert!(signals.is_finished());
    Ok(())
}

#[test]
fn stop_signal_for_another_rig_is_ignored() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(SignalFiles::new(dir.path(), 5).stop_path(), b"")?;
    let opts = SessionOptions {
        signal_check_interval: 5,
        ..options()
    };
    let mut controller =
        SessionController::new(camera(Vec::new()), opts, paths(&dir))?.with_presenter(StopAfter::boxed(40));

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::UserAbort);
    assert_eq!(report.frames_captured, 40);
    Ok(())
}

#[test]
fn clean_session_passes_verification() -> Result<()> {
    let dir = TempDir::new()?;
    let mut controller = SessionController::new(camera(Vec::new()), options(), paths(&dir))?
        .with_presenter(StopAfter::boxed(25));

    let report = controller.run()?;
    assert_eq!(report.bytes_written, 25 * FRAME_LEN);

    let verified = verify::verify_session(&report.paths.summary, 2)?;
    assert!(verified.is_ok(), "{:?}", verified.violations);
    assert_eq!(verified.binary_len, Some(25 * FRAME_LEN));
    assert_eq!(verified.summary.frame_rate, 60.0);
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn sink_write_failure_is_fatal() -> Result<()> {
    if !std::path::Path::new("/dev/full").exists() {
        return Ok(());
    }
    let dir = TempDir::new()?;
    let paths = SessionPaths {
        binary: PathBuf::from("/dev/full"),
        ..paths(&dir)
    };
    let mut controller = SessionController::new(camera(Vec::new()), options(), paths.clone())?
        .with_presenter(StopAfter::boxed(100));

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::SinkWriteFailed);
    assert!(report.is_failure());
    assert_eq!(report.frames_captured, 0);
    assert_eq!(controller.source().stats().outstanding_frames, 0);

    let summary = SessionSummary::load(&paths.summary)?;
    assert!(summary.is_finalized());
    assert!(summary.frame_ids.is_empty());
    assert!(SignalFiles::new(dir.path(), 2).is_finished());
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn backup_write_failure_stops_session_with_consistent_record() -> Result<()> {
    if !std::path::Path::new("/dev/full").exists() {
        return Ok(());
    }
    let dir = TempDir::new()?;
    let paths = SessionPaths {
        backup: PathBuf::from("/dev/full"),
        ..paths(&dir)
    };
    let opts = SessionOptions {
        flush_threshold: 10,
        ..options()
    };
    let mut controller = SessionController::new(camera(Vec::new()), opts, paths.clone())?
        .with_presenter(StopAfter::boxed(100));

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::LedgerWriteFailed);
    assert!(report.is_failure());
    // The tenth payload reached the binary artifact before its batch failed.
    assert_eq!(report.frames_captured, 10);
    assert_eq!(report.frames_saved, 10);
    assert_eq!(report.bytes_written, 10 * FRAME_LEN);
    assert_eq!(controller.source().stats().outstanding_frames, 0);

    let summary = SessionSummary::load(&paths.summary)?;
    assert!(summary.is_finalized());
    assert_eq!(summary.frame_ids, (0..10).collect::<Vec<u64>>());
    assert_eq!(std::fs::metadata(&paths.binary)?.len(), 10 * FRAME_LEN);
    assert!(SignalFiles::new(dir.path(), 2).is_finished());
    Ok(())
}

#[test]
fn truncated_frames_during_recovery_exhaust_it() -> Result<()> {
    let dir = TempDir::new()?;
    let mut script = vec![SyntheticStep::Frame; 3];
    // Flagged complete but half a frame long, for every fetch and test fetch.
    script.extend([SyntheticStep::Truncated; 6]);
    let mut controller = SessionController::new(camera(script), options(), paths(&dir))?;

    let report = controller.run()?;
    assert_eq!(report.reason, StopReason::RecoveryExhausted);
    assert_eq!(report.recovery_attempts, 3);
    assert_eq!(report.frames_captured, 3);
    assert_eq!(controller.source().stats().outstanding_frames, 0);

    let summary = SessionSummary::load(&report.paths.summary)?;
    assert_eq!(summary.frame_ids, vec![0, 1, 2]);
    assert_eq!(std::fs::metadata(&report.paths.binary)?.len(), 3 * FRAME_LEN);

    let verified = verify::verify_session(&report.paths.summary, 2)?;
    assert!(verified.is_ok(), "{:?}", verified.violations);
    Ok(())
}
