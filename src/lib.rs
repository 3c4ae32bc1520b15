//! Rig camera capture
//!
//! This crate records one camera per rig to disk at a fixed frame rate and
//! keeps recording through transient device faults.
//!
//! # Architecture
//!
//! A single-threaded loop owns the device and both output files:
//!
//! 1. **Fetch** the next frame with a bounded wait. Timeouts, missing and
//!    incomplete frames are faults, never silently skipped.
//! 2. **Recover** through a bounded reinitialise-and-test-fetch cycle. Exhausting
//!    the attempts ends the session rather than leaving a gap of unknown size.
//! 3. **Persist** the raw payload to the binary artifact and the frame id to
//!    the batched backup ledger. A write failure ends the session.
//! 4. **Preview and poll** at a capped display rate: render, check the local
//!    abort input and the external stop signal.
//!
//! Every exit finalises the session summary and then creates the completion
//! signal for downstream tools.
//!
//! # Module Structure
//!
//! - `frame`: frame handles, geometry and pixel formats
//! - `device`: frame sources (synthetic `stub://`, V4L2) and `DeviceError`
//! - `recovery`: bounded recovery state machine
//! - `ledger`, `sink`, `summary`: session artifacts
//! - `preview`: display pacing and the `Presenter` capability
//! - `signals`: filesystem stop/completion signals
//! - `session`: the acquisition loop
//! - `config`: recorder configuration and the rig table
//! - `verify`: offline checks of a finished session

pub mod config;
pub mod device;
pub mod frame;
pub mod ledger;
pub mod preview;
pub mod recovery;
pub mod session;
pub mod signals;
pub mod sink;
pub mod summary;
pub mod verify;

pub use config::{RecorderConfig, RigProfile};
pub use device::{
    CameraConfig, CameraSource, CameraStats, DeviceError, DeviceSettings, FrameSource,
    SyntheticCamera, SyntheticConfig, SyntheticStep,
};
pub use frame::{Frame, FrameGeometry, PixelFormat};
pub use ledger::{read_frame_id_backup, FrameIdLedger};
pub use preview::{LogPresenter, PresentOutcome, Presenter, PreviewConfig, PreviewPacer};
pub use recovery::{RecoveryController, RecoveryOutcome, RecoveryPolicy, RecoveryState};
pub use session::{
    session_timestamp, Session, SessionController, SessionOptions, SessionPaths, SessionReport,
    StopReason,
};
pub use signals::SignalFiles;
pub use sink::BinarySink;
pub use summary::SessionSummary;
pub use verify::{verify_session, VerifyReport};
