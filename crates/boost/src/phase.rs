//! Boost phases and the restore decision
//!
//! `Start → ReadOriginal → Applied → Waiting → Refreshing → Verifying →
//! {Restoring → Restored | LeftAsIs} → Done`, with any failed step going to
//! `Aborted`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostPhase {
    Start,
    /// Capturing the setpoint to restore later
    ReadOriginal,
    /// Desired setpoint sent to the device
    Applied,
    Waiting,
    /// Exchanging the stored refresh token for a new access token
    Refreshing,
    /// Re-reading the setpoint with the new token
    Verifying,
    /// Writing the original setpoint back
    Restoring,
    Restored,
    LeftAsIs,
    Done,
    Aborted,
}

impl BoostPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostPhase::Start => "start",
            BoostPhase::ReadOriginal => "read_original",
            BoostPhase::Applied => "applied",
            BoostPhase::Waiting => "waiting",
            BoostPhase::Refreshing => "refreshing",
            BoostPhase::Verifying => "verifying",
            BoostPhase::Restoring => "restoring",
            BoostPhase::Restored => "restored",
            BoostPhase::LeftAsIs => "left_as_is",
            BoostPhase::Done => "done",
            BoostPhase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for BoostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do once the boost window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestoreDecision {
    /// Setpoint is still what the boost applied; put the original back.
    Restore,
    /// Setpoint changed during the window; leave it alone.
    LeaveAsIs { observed: f32 },
}

/// Decide whether the original setpoint may be restored.
///
/// Exact comparison: the device echoes back the value it was sent, so any
/// difference means the setpoint was changed outside this boost.
#[allow(clippy::float_cmp)]
pub fn restore_decision(observed: f32, desired: f32) -> RestoreDecision {
    if observed == desired {
        RestoreDecision::Restore
    } else {
        RestoreDecision::LeaveAsIs { observed }
    }
}
