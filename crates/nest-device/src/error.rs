//! Error types for device API calls

/// Errors from the device API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("device API request failed: {0}")]
    Transport(String),

    /// Google throttles the SDM API aggressively; callers should back off
    /// and tell the user instead of treating this as fatal.
    #[error("too many requests")]
    RateLimited,

    #[error("got an error response from Nest ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response from Nest: {0}")]
    Protocol(String),

    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),
}

impl Error {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::RateLimited => "rate_limited",
            Error::Api { .. } => "api",
            Error::Protocol(_) => "protocol",
            Error::InvalidDeviceId(_) => "invalid_device_id",
        }
    }
}

/// Result alias for device operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            Error::Transport("x".into()).kind(),
            Error::RateLimited.kind(),
            Error::Api {
                status: 500,
                body: String::new(),
            }
            .kind(),
            Error::Protocol("x".into()).kind(),
            Error::InvalidDeviceId("x".into()).kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn api_error_carries_body() {
        let err = Error::Api {
            status: 404,
            body: r#"{"error":"not found"}"#.into(),
        };
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("404"));
    }
}
