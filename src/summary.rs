//! Session summary artifact.
//!
//! Written twice: at session start with an empty `end_time`, and again when the
//! loop exits with every field populated. A crash in between still leaves the
//! start-state record on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::frame::FrameGeometry;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub frame_rate: f64,
    pub start_time: String,
    pub end_time: String,
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_format: String,
    #[serde(rename = "frame_IDs")]
    pub frame_ids: Vec<u64>,
}

impl SessionSummary {
    pub fn started(frame_rate: f64, start_time: &str, geometry: FrameGeometry) -> Self {
        Self {
            frame_rate,
            start_time: start_time.to_string(),
            end_time: String::new(),
            image_width: geometry.width,
            image_height: geometry.height,
            pixel_format: geometry.pixel_format.symbolic().to_string(),
            frame_ids: Vec::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        !self.end_time.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_ids.len()
    }

    /// Pretty-printed with 4-space indentation, replaced atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut encoded = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut encoded, formatter);
        self.serialize(&mut serializer)
            .context("encode session summary")?;
        encoded.push(b'\n');
        write_atomic(path, &encoded)
            .with_context(|| format!("write session summary {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read session summary {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid session summary {}", path.display()))
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
