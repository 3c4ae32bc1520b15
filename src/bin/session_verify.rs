//! session_verify - check a recorded session before it is consumed
//!
//! This tool proves:
//! - The binary artifact holds exactly one payload per recorded frame id
//! - The frame id backup replays the summary's `frame_IDs` in order
//! - The summary was finalised and the completion signal exists
//!
//! It also prints the SHA-256 of the binary artifact for archival.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use rig_capture::verify;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "session_verify",
    about = "Verify rig session artifacts (binary length, frame id backup, completion signal)"
)]
struct Args {
    /// Path to the session summary (<start>_<id>_Tracker_data.json)
    summary: PathBuf,

    /// Rig number the session was recorded on
    #[arg(long, default_value_t = 2)]
    rig: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = ui::Ui::from_args(&args.ui, is_tty, !std::io::stdout().is_terminal());

    let report = {
        let mut stage = ui.stage("Verify session artifacts");
        let report = verify::verify_session(&args.summary, args.rig)?;
        if !report.is_ok() {
            stage.fail(format!("{} violation(s)", report.violations.len()));
        }
        report
    };

    println!("session_verify: checking {}", args.summary.display());
    println!(
        "frames: {} ({}x{} {}, {} bytes each)",
        report.summary.frame_count(),
        report.summary.image_width,
        report.summary.image_height,
        report.summary.pixel_format,
        report.frame_len
    );
    println!(
        "start: {}  end: {}",
        report.summary.start_time,
        if report.summary.end_time.is_empty() {
            "<unfinished>"
        } else {
            report.summary.end_time.as_str()
        }
    );
    if let Some(len) = report.binary_len {
        println!("binary: {} bytes", len);
    }
    if let Some(digest) = &report.binary_digest {
        println!("binary sha256: {}", digest);
    }
    if args.verbose {
        println!("binary path: {}", report.paths.binary.display());
        println!("backup path: {}", report.paths.backup.display());
    }

    if report.is_ok() {
        println!("OK");
        return Ok(());
    }
    for violation in &report.violations {
        println!("FAIL: {}", violation);
    }
    Err(anyhow!(
        "{} violation(s) in {}",
        report.violations.len(),
        args.summary.display()
    ))
}
