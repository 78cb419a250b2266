//! Errors that abort a boost

/// Token and device failures surfaced while a boost runs.
///
/// None of these are retried; the task logs and stops.
#[derive(Debug, thiserror::Error)]
pub enum BoostError {
    #[error(transparent)]
    Auth(#[from] nest_auth::Error),

    #[error(transparent)]
    Device(#[from] nest_device::Error),
}

impl BoostError {
    /// Error taxonomy label: transport, auth, rate_limited, api, protocol or config.
    pub fn kind(&self) -> &'static str {
        match self {
            BoostError::Auth(e) => e.kind(),
            BoostError::Device(e) => e.kind(),
        }
    }
}
