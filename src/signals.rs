//! Filesystem coordination with the controlling process.
//!
//! - inbound: `stop_camera_<N>.signal` requests a graceful stop
//! - outbound: `rig_<N>_camera_finished.signal` marks the artifacts complete
//!
//! Both live in the session directory. Absence of the stop file means keep running.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct SignalFiles {
    stop_path: PathBuf,
    finished_path: PathBuf,
}

impl SignalFiles {
    pub fn new(session_dir: impl AsRef<Path>, rig: u32) -> Self {
        let dir = session_dir.as_ref();
        Self {
            stop_path: dir.join(stop_signal_name(rig)),
            finished_path: dir.join(finished_signal_name(rig)),
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_path.exists()
    }

    /// Create the empty completion marker.
    pub fn mark_finished(&self) -> Result<()> {
        File::create(&self.finished_path).with_context(|| {
            format!(
                "create completion signal {}",
                self.finished_path.display()
            )
        })?;
        log::info!("signals: wrote {}", self.finished_path.display());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished_path.exists()
    }

    pub fn stop_path(&self) -> &Path {
        &self.stop_path
    }

    pub fn finished_path(&self) -> &Path {
        &self.finished_path
    }
}

pub fn stop_signal_name(rig: u32) -> String {
    format!("stop_camera_{}.signal", rig)
}

pub fn finished_signal_name(rig: u32) -> String {
    format!("rig_{}_camera_finished.signal", rig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn signal_names_follow_rig_number() {
        assert_eq!(stop_signal_name(3), "stop_camera_3.signal");
        assert_eq!(finished_signal_name(3), "rig_3_camera_finished.signal");
    }

    #[test]
    fn stop_signal_tracks_file_presence() -> Result<()> {
        let dir = TempDir::new()?;
        let signals = SignalFiles::new(dir.path(), 2);
        assert!(!signals.stop_requested());

        std::fs::write(signals.stop_path(), b"")?;
        assert!(signals.stop_requested());

        // Another rig's stop file is ignored.
        let other = SignalFiles::new(dir.path(), 5);
        assert!(!other.stop_requested());
        Ok(())
    }

    #[test]
    fn completion_marker_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let signals = SignalFiles::new(dir.path(), 1);
        assert!(!signals.is_finished());
        signals.mark_finished()?;
        assert!(signals.is_finished());
        assert_eq!(std::fs::metadata(signals.finished_path())?.len(), 0);
        Ok(())
    }
}
