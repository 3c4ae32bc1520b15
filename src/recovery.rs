//! Bounded camera recovery.
//!
//! States: `Healthy`, `Recovering(n)` after n failed attempts, and terminal
//! `Failed`. One attempt is a full reset of the device:
//!
//! 1. end acquisition, settle
//! 2. deinitialise, settle
//! 3. initialise and re-apply the full device configuration
//! 4. begin acquisition and fetch one test frame
//!
//! The test frame must pass the same check the capture loop applies
//! ([`FrameGeometry::accepts`]): a frame the loop would reject cannot end
//! a recovery.
//!
//! The whole configuration is re-applied every time; register state is not
//! assumed to survive a fault. Once `max_attempts` attempts have failed the
//! controller refuses further work, and the session must stop rather than
//! record an unbounded gap.

use std::time::Duration;

use crate::device::{DeviceError, DeviceSettings, FrameSource};
use crate::frame::FrameGeometry;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryState {
    Healthy,
    Recovering(u32),
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecoveryPolicy {
    pub max_attempts: u32,
    /// Pause before the next loop iteration after a failed attempt.
    pub cooldown: Duration,
    /// Pause after stopping acquisition and after deinitialising.
    pub settle: Duration,
    pub probe_timeout: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_COOLDOWN,
            settle: DEFAULT_SETTLE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// What the session loop should do after a recovery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Test frame fetched and accepted; resume capture.
    Recovered,
    /// Attempt failed; sleep this long, then continue the loop.
    RetryAfter(Duration),
    /// Attempts exhausted. Terminal.
    Exhausted,
}

pub struct RecoveryController {
    policy: RecoveryPolicy,
    state: RecoveryState,
    total_attempts: u64,
}

impl RecoveryController {
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self {
            policy,
            state: RecoveryState::Healthy,
            total_attempts: 0,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Failed attempts since the last good frame.
    pub fn attempts(&self) -> u32 {
        match self.state {
            RecoveryState::Healthy => 0,
            RecoveryState::Recovering(n) => n,
            RecoveryState::Failed => self.policy.max_attempts,
        }
    }

    /// Attempts made over the whole session, successful or not.
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// A complete frame arrived; any pending recovery is over.
    pub fn record_success(&mut self) {
        if let RecoveryState::Recovering(n) = self.state {
            log::info!(
                "recovery: capture healthy again after {} failed attempt(s)",
                n
            );
            self.state = RecoveryState::Healthy;
        }
    }

    /// Run one recovery attempt against `source`. The test frame is judged
    /// against the session `geometry`.
    pub fn recover(
        &mut self,
        source: &mut dyn FrameSource,
        settings: &DeviceSettings,
        geometry: FrameGeometry,
    ) -> RecoveryOutcome {
        let attempt = match self.state {
            RecoveryState::Failed => {
                log::error!("recovery: max recovery attempts reached, camera error persists");
                return RecoveryOutcome::Exhausted;
            }
            RecoveryState::Healthy => 1,
            RecoveryState::Recovering(n) => n + 1,
        };
        let max = self.policy.max_attempts;
        self.total_attempts += 1;

        log::warn!(
            "recovery: attempting camera recovery (attempt {} of {})",
            attempt,
            max
        );

        match self.reset_and_fetch(source, settings, geometry) {
            Ok(()) => {
                log::info!("recovery: camera recovered on attempt {} of {}", attempt, max);
                self.state = RecoveryState::Healthy;
                RecoveryOutcome::Recovered
            }
            Err(err) => {
                log::error!(
                    "recovery: attempt {} of {} failed: {}",
                    attempt,
                    max,
                    err
                );
                if attempt >= max {
                    self.state = RecoveryState::Failed;
                    RecoveryOutcome::Exhausted
                } else {
                    self.state = RecoveryState::Recovering(attempt);
                    RecoveryOutcome::RetryAfter(self.policy.cooldown)
                }
            }
        }
    }

    fn reset_and_fetch(
        &self,
        source: &mut dyn FrameSource,
        settings: &DeviceSettings,
        geometry: FrameGeometry,
    ) -> Result<(), DeviceError> {
        // A device that already stopped streaming still gets the full reset.
        if let Err(err) = source.end_acquisition() {
            log::debug!("recovery: end acquisition: {}", err);
        }
        pause(self.policy.settle);

        if let Err(err) = source.deinit() {
            log::debug!("recovery: deinit: {}", err);
        }
        pause(self.policy.settle);

        source.init()?;
        source.apply_configuration(settings)?;
        source.begin_acquisition()?;

        match source.next_frame(self.policy.probe_timeout)? {
            None => Err(DeviceError::Fault(
                "recovery test fetch returned no frame".to_string(),
            )),
            Some(frame) if !geometry.accepts(&frame) => {
                log::debug!(
                    "recovery: test frame {} rejected ({} of {} bytes)",
                    frame.frame_id(),
                    frame.byte_len(),
                    geometry.frame_len()
                );
                source.release(frame);
                Err(DeviceError::Incomplete)
            }
            Some(frame) => {
                source.release(frame);
                Ok(())
            }
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
