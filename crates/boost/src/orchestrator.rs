//! Runs boosts as background tasks
//!
//! The orchestrator holds no per-boost state. Each spawned task owns its
//! captured original setpoint and token copy, so concurrent boosts never
//! share anything mutable. Two boosts on the same device are not
//! coordinated: the later one may capture the earlier one's boosted value
//! as its original.

use std::sync::Arc;
use std::time::Duration;

use nest_auth::{AccessToken, TokenRefresher};
use nest_device::DeviceControl;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::BoostError;
use crate::phase::{BoostPhase, RestoreDecision, restore_decision};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostRequest {
    pub device_id: String,
    pub desired_temperature: f32,
    pub duration_minutes: u32,
}

impl BoostRequest {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }
}

/// State of one running boost once the original setpoint is known.
#[derive(Clone)]
pub struct BoostTask {
    pub id: Uuid,
    pub request: BoostRequest,
    pub original_temperature: f32,
    refresh_token: String,
}

impl std::fmt::Debug for BoostTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoostTask")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("original_temperature", &self.original_temperature)
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// How a boost ended.
#[derive(Debug)]
pub enum BoostOutcome {
    /// Original setpoint was put back.
    Restored { original: f32 },
    /// Setpoint was changed during the boost and left untouched.
    LeftAsIs { observed: f32 },
    /// A step failed; the device keeps whatever the last successful call set.
    Aborted { phase: BoostPhase, error: BoostError },
}

impl BoostOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BoostOutcome::Restored { .. } => "restored",
            BoostOutcome::LeftAsIs { .. } => "left_as_is",
            BoostOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// Handle to a spawned boost.
///
/// Callers may drop it; the task keeps running to completion either way.
#[derive(Debug)]
pub struct BoostHandle {
    id: Uuid,
    device_id: String,
    join: JoinHandle<BoostOutcome>,
}

impl BoostHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the boost to finish. Fails only if the task panicked.
    pub async fn join(self) -> Result<BoostOutcome, tokio::task::JoinError> {
        self.join.await
    }
}

/// Runs boosts against a device API, refreshing tokens as needed.
#[derive(Clone)]
pub struct Orchestrator {
    tokens: Arc<dyn TokenRefresher>,
    devices: Arc<dyn DeviceControl>,
}

impl Orchestrator {
    pub fn new(tokens: Arc<dyn TokenRefresher>, devices: Arc<dyn DeviceControl>) -> Self {
        Self { tokens, devices }
    }

    /// Start a boost in the background and return immediately.
    ///
    /// `token` is used straight away for the first two steps, and its
    /// refresh token for the rest. An already expired token is refreshed
    /// before any device call.
    pub fn spawn(&self, token: AccessToken, request: BoostRequest) -> BoostHandle {
        let id = Uuid::new_v4();
        let device_id = request.device_id.clone();
        let span = info_span!("boost", task_id = %id, device_id = %request.device_id);
        let orchestrator = self.clone();
        let join = tokio::spawn(
            async move { orchestrator.run_task(id, token, request).await }.instrument(span),
        );
        BoostHandle {
            id,
            device_id,
            join,
        }
    }

    /// Run one boost to completion in the current task.
    pub async fn run(&self, token: AccessToken, request: BoostRequest) -> BoostOutcome {
        self.run_task(Uuid::new_v4(), token, request).await
    }

    async fn run_task(&self, id: Uuid, token: AccessToken, request: BoostRequest) -> BoostOutcome {
        info!(
            phase = %BoostPhase::Start,
            desired = request.desired_temperature,
            minutes = request.duration_minutes,
            "boost started"
        );
        let outcome = match self.drive(id, token, request).await {
            Ok(outcome) => outcome,
            Err((phase, error)) => {
                warn!(phase = %phase, kind = error.kind(), error = %error, "boost aborted");
                metrics::counter!(
                    "boost_aborts_total",
                    "phase" => phase.as_str(),
                    "kind" => error.kind()
                )
                .increment(1);
                BoostOutcome::Aborted { phase, error }
            }
        };
        metrics::counter!("boost_runs_total", "outcome" => outcome.label()).increment(1);
        let phase = match outcome {
            BoostOutcome::Aborted { .. } => BoostPhase::Aborted,
            _ => BoostPhase::Done,
        };
        debug!(phase = %phase, outcome = outcome.label(), "boost finished");
        outcome
    }

    /// Each error is tagged with the phase that was being entered.
    async fn drive(
        &self,
        id: Uuid,
        token: AccessToken,
        request: BoostRequest,
    ) -> Result<BoostOutcome, (BoostPhase, BoostError)> {
        let device_id = request.device_id.as_str();

        let token = if token.is_expired() {
            debug!("access token expired before start, refreshing");
            self.tokens
                .refresh_access_token(&token.refresh_token)
                .await
                .map_err(|e| (BoostPhase::Refreshing, e.into()))?
        } else {
            token
        };

        let original_temperature = self
            .devices
            .get_temperature(&token.access_token, device_id)
            .await
            .map_err(|e| (BoostPhase::ReadOriginal, e.into()))?;

        self.devices
            .set_temperature(&token.access_token, device_id, request.desired_temperature)
            .await
            .map_err(|e| (BoostPhase::Applied, e.into()))?;

        let task = BoostTask {
            id,
            original_temperature,
            refresh_token: token.refresh_token,
            request,
        };
        debug!(phase = %BoostPhase::Waiting, original = task.original_temperature, "setpoint applied");

        tokio::time::sleep(task.request.duration()).await;

        let fresh = self
            .tokens
            .refresh_access_token(&task.refresh_token)
            .await
            .map_err(|e| (BoostPhase::Refreshing, e.into()))?;

        let observed = self
            .devices
            .get_temperature(&fresh.access_token, &task.request.device_id)
            .await
            .map_err(|e| (BoostPhase::Verifying, e.into()))?;

        match restore_decision(observed, task.request.desired_temperature) {
            RestoreDecision::LeaveAsIs { observed } => {
                info!(
                    phase = %BoostPhase::LeftAsIs,
                    current = observed,
                    expected = task.request.desired_temperature,
                    "setpoint changed since boosting, leaving as is"
                );
                Ok(BoostOutcome::LeftAsIs { observed })
            }
            RestoreDecision::Restore => {
                self.devices
                    .set_temperature(
                        &fresh.access_token,
                        &task.request.device_id,
                        task.original_temperature,
                    )
                    .await
                    .map_err(|e| (BoostPhase::Restoring, e.into()))?;
                info!(
                    phase = %BoostPhase::Restored,
                    original = task.original_temperature,
                    "original setpoint restored"
                );
                Ok(BoostOutcome::Restored {
                    original: task.original_temperature,
                })
            }
        }
    }
}
