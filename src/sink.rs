//! Append-only binary artifact.
//!
//! Raw frame payloads are concatenated in arrival order with no headers or
//! delimiters. Downstream converters locate frame N purely by position
//! (`N * frame_len`), so a short or failed write corrupts every later frame.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct BinarySink {
    path: PathBuf,
    file: File,
    bytes_written: u64,
    frames_written: u64,
}

impl BinarySink {
    /// Open once per session. Append mode: prior content is never overwritten.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open binary artifact {}", path.display()))?;
        Ok(Self {
            path,
            file,
            bytes_written: 0,
            frames_written: 0,
        })
    }

    /// Append one payload. Any error is fatal to the session.
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.file
            .write_all(payload)
            .with_context(|| format!("write binary artifact {}", self.path.display()))?;
        self.bytes_written += payload.len() as u64;
        self.frames_written += 1;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .with_context(|| format!("sync binary artifact {}", self.path.display()))
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
