//! Temporary thermostat boost with drift-safe restore
//!
//! A boost raises a thermostat's heat setpoint for a fixed number of minutes
//! and then puts the previous setpoint back, unless someone changed the
//! setpoint in the meantime. Each boost runs as its own background task,
//! independent of the request that started it.
//!
//! Flow:
//! 1. Read the current setpoint (nothing changed yet; failure just stops)
//! 2. Apply the desired setpoint
//! 3. Sleep for the whole duration
//! 4. Refresh the access token, which may have expired while sleeping
//! 5. Re-read the setpoint and restore only if it still equals the desired one

pub mod error;
pub mod orchestrator;
pub mod phase;

pub use error::BoostError;
pub use orchestrator::{BoostHandle, BoostOutcome, BoostRequest, BoostTask, Orchestrator};
pub use phase::{BoostPhase, RestoreDecision, restore_decision};
