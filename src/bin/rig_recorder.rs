//! rig_recorder - record one rig camera session
//!
//! Brings the camera up at the requested rate (clamped to the rig maximum),
//! streams raw frames to `<start>_<id>_binary_video.bin`, mirrors frame ids to
//! the backup ledger, and finishes with the session summary plus
//! `rig_<N>_camera_finished.signal`.
//!
//! Stops on Ctrl-C, on `stop_camera_<N>.signal` in the session directory, or
//! when recovery gives up. The exit code is non-zero for fatal outcomes.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rig_capture::{
    preview::DEFAULT_WINDOW_HEIGHT, preview::DEFAULT_WINDOW_WIDTH, session_timestamp,
    CameraSource, LogPresenter, PreviewConfig, RecorderConfig, SessionController, SessionOptions,
    SessionPaths,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "rig_recorder", about = "Record a rig camera session to disk")]
struct Args {
    /// Subject identifier used in artifact names
    #[arg(long, default_value = "NoID")]
    id: String,

    /// Session start timestamp (yymmdd_HHMMSS); defaults to now
    #[arg(long)]
    date: Option<String>,

    /// Session directory; defaults to <output_root>/<date>_<id>
    #[arg(long)]
    path: Option<PathBuf>,

    /// Rig number, selects the camera profile
    #[arg(long, default_value_t = 2)]
    rig: u32,

    /// Target frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    #[arg(long, default_value_t = DEFAULT_WINDOW_WIDTH)]
    window_width: u32,

    #[arg(long, default_value_t = DEFAULT_WINDOW_HEIGHT)]
    window_height: u32,

    /// Device URI, overrides RIG_DEVICE and the config file
    #[arg(long)]
    device: Option<String>,

    /// Run without the live preview
    #[arg(long)]
    no_preview: bool,

    /// Capture without writing frames
    #[arg(long)]
    no_save: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = ui::Ui::from_args(&args.ui, is_tty, !std::io::stdout().is_terminal());

    let mut config = {
        let _stage = ui.stage("Load configuration");
        RecorderConfig::load()?
    };
    if let Some(device) = &args.device {
        config.device = device.clone();
    }

    let start_time = args.date.clone().unwrap_or_else(session_timestamp);
    let dir = args
        .path
        .clone()
        .unwrap_or_else(|| config.output_root.join(format!("{}_{}", start_time, args.id)));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create session directory {}", dir.display()))?;

    let mut options = SessionOptions::from_config(&config, args.rig, args.fps, &args.id, &start_time)?;
    options.save = !args.no_save;
    let paths = SessionPaths::new(&dir, &start_time, &args.id);

    let mut controller = {
        let _stage = ui.stage(&format!("Open camera {}", config.device));
        let camera = CameraSource::new(config.camera_config(args.rig)?)?;
        SessionController::new(camera, options, paths)?
    };

    if !args.no_preview {
        let preview = PreviewConfig {
            window_width: args.window_width,
            window_height: args.window_height,
            max_display_fps: config.max_display_fps,
            ..PreviewConfig::for_rig(args.rig)
        };
        controller = controller.with_presenter(Box::new(LogPresenter::new(preview)));
    }

    let abort = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&abort);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");
    let mut controller = controller.with_abort_flag(abort);

    log::info!(
        "rig_recorder: recording rig {} into {}",
        args.rig,
        dir.display()
    );
    let report = controller.run()?;

    println!("session: {}", report.start_time);
    println!("stop reason: {:?}", report.reason);
    println!("frames captured: {}", report.frames_captured);
    println!("frames saved: {}", report.frames_saved);
    println!("bytes written: {}", report.bytes_written);
    println!("recovery attempts: {}", report.recovery_attempts);
    println!("summary: {}", report.paths.summary.display());

    if report.is_failure() {
        return Err(anyhow!("session ended abnormally: {:?}", report.reason));
    }
    Ok(())
}
