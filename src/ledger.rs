//! Frame identifier ledger.
//!
//! Keeps every frame id of the session in memory for the summary, and mirrors
//! them to an append-only text file (one decimal id per line) in fixed-size
//! batches. If the process dies before the summary is finalised, the mirror is
//! the only durable record of which frames reached the binary artifact.
//!
//! A batch lands with a single `write_all` on the unbuffered file. When that
//! fails, whatever part of the batch reached the file is truncated away and
//! the ids stay pending, so a later flush writes them exactly once. If the
//! truncation fails too, the mirror is torn and refuses further writes.

use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Default number of ids buffered between flushes.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 200;

/// Append-only destination of the mirror.
pub trait MirrorFile: Write {
    /// Cut the file back to `len` bytes.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl MirrorFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

pub struct FrameIdLedger<F: MirrorFile = File> {
    path: PathBuf,
    file: F,
    /// Bytes of whole batches known to be in the file.
    committed_len: u64,
    torn: bool,
    pending: Vec<u64>,
    all: Vec<u64>,
    capacity: usize,
    flushes: usize,
}

impl FrameIdLedger<File> {
    /// Open (or continue) the mirror file in append mode.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open frame id backup {}", path.display()))?;
        let committed_len = file
            .metadata()
            .with_context(|| format!("stat frame id backup {}", path.display()))?
            .len();
        Ok(Self::with_file(path, file, committed_len, capacity))
    }
}

impl<F: MirrorFile> FrameIdLedger<F> {
    /// Mirror into an already open file holding `committed_len` bytes.
    pub fn with_file(path: PathBuf, file: F, committed_len: u64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            path,
            file,
            committed_len,
            torn: false,
            pending: Vec::with_capacity(capacity),
            all: Vec::new(),
            capacity,
            flushes: 0,
        }
    }

    pub fn append(&mut self, frame_id: u64) {
        self.pending.push(frame_id);
        self.all.push(frame_id);
    }

    /// Flush when the buffer has reached capacity. Returns whether a flush happened.
    pub fn flush_if_full(&mut self) -> Result<bool> {
        if self.pending.len() < self.capacity {
            return Ok(false);
        }
        self.write_pending()?;
        Ok(true)
    }

    /// Flush whatever is buffered, regardless of occupancy.
    pub fn final_flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.write_pending()
    }

    /// The buffer is cleared only after the whole batch is in the file.
    fn write_pending(&mut self) -> Result<()> {
        if self.torn {
            bail!(
                "frame id backup {} holds a partial batch, refusing to append",
                self.path.display()
            );
        }
        let mut batch = String::with_capacity(self.pending.len() * 8);
        for id in &self.pending {
            batch.push_str(&id.to_string());
            batch.push('\n');
        }

        if let Err(err) = self.file.write_all(batch.as_bytes()) {
            if let Err(truncate_err) = self.file.truncate_to(self.committed_len) {
                self.torn = true;
                log::error!(
                    "ledger: cannot roll back partial batch in {}: {}",
                    self.path.display(),
                    truncate_err
                );
            }
            return Err(err)
                .with_context(|| format!("write frame id backup {}", self.path.display()));
        }
        self.file
            .flush()
            .with_context(|| format!("flush frame id backup {}", self.path.display()))?;

        self.committed_len += batch.len() as u64;
        log::debug!(
            "ledger: flushed {} frame ids to {}",
            self.pending.len(),
            self.path.display()
        );
        self.pending.clear();
        self.flushes += 1;
        Ok(())
    }

    /// Full-session sequence in arrival order.
    pub fn frame_ids(&self) -> &[u64] {
        &self.all
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of batches written so far (threshold and final flushes).
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// A failed batch could not be rolled back; the mirror accepts no more writes.
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a mirror file back into the id sequence it records.
pub fn read_frame_id_backup(path: impl AsRef<Path>) -> Result<Vec<u64>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("open frame id backup {}", path.display()))?;
    let mut ids = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read frame id backup {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let id = trimmed.parse::<u64>().with_context(|| {
            format!("invalid frame id on line {} of {}", index + 1, path.display())
        })?;
        ids.push(id);
    }
    Ok(ids)
}
