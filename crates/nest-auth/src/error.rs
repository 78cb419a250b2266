//! Error types for OAuth token operations

/// Errors from OAuth token operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("invalid credentials ({status}): {body}")]
    InvalidCredentials { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Http(_) => "transport",
            Error::TokenExchange { .. } | Error::InvalidCredentials { .. } => "auth",
            Error::InvalidResponse(_) => "protocol",
            Error::InvalidUrl(_) => "config",
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
