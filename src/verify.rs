//! Offline checks of a finished session.
//!
//! Given the summary file, re-derive every artifact path and confirm that the
//! session is internally consistent: the binary artifact holds exactly one
//! payload per recorded frame id, the backup ledger replays the same id
//! sequence, and the completion signal exists for a finalised summary.

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::frame::PixelFormat;
use crate::ledger::read_frame_id_backup;
use crate::session::SessionPaths;
use crate::signals::SignalFiles;
use crate::summary::SessionSummary;

const SUMMARY_SUFFIX: &str = "_Tracker_data.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("binary artifact is {actual} bytes, expected {expected} ({frames} frames x {frame_len} bytes)")]
    BinaryLength {
        expected: u64,
        actual: u64,
        frames: usize,
        frame_len: usize,
    },

    #[error("binary artifact missing")]
    BinaryMissing,

    #[error("frame id backup has {backup} ids, summary has {summary}; first difference at index {index}")]
    BackupMismatch {
        backup: usize,
        summary: usize,
        index: usize,
    },

    #[error("frame id backup missing")]
    BackupMissing,

    #[error("summary end_time is empty")]
    NotFinalized,

    #[error("completion signal missing")]
    CompletionSignalMissing,
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub paths: SessionPaths,
    pub summary: SessionSummary,
    pub frame_len: usize,
    pub binary_len: Option<u64>,
    /// Lowercase hex SHA-256 of the binary artifact.
    pub binary_digest: Option<String>,
    pub violations: Vec<Violation>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Session paths recovered from a `<start>_<id>_Tracker_data.json` path.
pub fn paths_from_summary(summary_path: &Path) -> Result<SessionPaths> {
    let file_name = summary_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid summary path {}", summary_path.display()))?;
    let prefix = file_name.strip_suffix(SUMMARY_SUFFIX).ok_or_else(|| {
        anyhow!(
            "{} is not a session summary (expected *{})",
            file_name,
            SUMMARY_SUFFIX
        )
    })?;
    let (start_time, subject_id) = prefix
        .rsplit_once('_')
        .ok_or_else(|| anyhow!("summary name {} has no subject id", file_name))?;
    let dir = summary_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(SessionPaths::new(dir, start_time, subject_id))
}

/// Check one session's artifacts. `rig` selects the completion signal name.
pub fn verify_session(summary_path: &Path, rig: u32) -> Result<VerifyReport> {
    let paths = paths_from_summary(summary_path)?;
    let summary = SessionSummary::load(&paths.summary)?;
    let pixel_format: PixelFormat = summary.pixel_format.parse()?;
    let frame_len = summary.image_width as usize
        * summary.image_height as usize
        * pixel_format.bytes_per_pixel();
    let frames = summary.frame_count();
    let mut violations = Vec::new();

    let binary_len = match std::fs::metadata(&paths.binary) {
        Ok(meta) => Some(meta.len()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("stat {}", paths.binary.display()));
        }
    };
    match binary_len {
        Some(actual) => {
            let expected = frames as u64 * frame_len as u64;
            if actual != expected {
                violations.push(Violation::BinaryLength {
                    expected,
                    actual,
                    frames,
                    frame_len,
                });
            }
        }
        None if frames > 0 => violations.push(Violation::BinaryMissing),
        None => {}
    }

    if paths.backup.exists() {
        let backup = read_frame_id_backup(&paths.backup)?;
        if backup != summary.frame_ids {
            let index = backup
                .iter()
                .zip(&summary.frame_ids)
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| backup.len().min(frames));
            violations.push(Violation::BackupMismatch {
                backup: backup.len(),
                summary: frames,
                index,
            });
        }
    } else if frames > 0 {
        violations.push(Violation::BackupMissing);
    }

    if !summary.is_finalized() {
        violations.push(Violation::NotFinalized);
    }
    if !SignalFiles::new(&paths.dir, rig).is_finished() {
        violations.push(Violation::CompletionSignalMissing);
    }

    let binary_digest = match binary_len {
        Some(_) => Some(file_digest(&paths.binary)?),
        None => None,
    };

    Ok(VerifyReport {
        paths,
        summary,
        frame_len,
        binary_len,
        binary_digest,
        violations,
    })
}

/// Streaming SHA-256 of a file, hex encoded.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1 << 16];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
