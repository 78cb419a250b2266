//! Request errors that end in an error page
//!
//! Most handler failures are reported to the user as flash messages and a
//! redirect. Only the failures below produce a non-redirect error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum Error {
    /// Authorization code could not be exchanged for tokens.
    #[error("Error: {0}")]
    CodeExchange(#[from] nest_auth::Error),

    /// OAuth callback carried neither `code` nor `error`.
    #[error("authorization callback is missing the code parameter")]
    MissingCode,

    #[error("failed to write session cookie: {0}")]
    Session(#[from] cookie_state::CodecError),

    #[error("failed to build authorization URL: {0}")]
    AuthorizeUrl(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        let body = match &self {
            // Shown verbatim so the user can see what Google rejected
            Error::CodeExchange(_) => self.to_string(),
            _ => "Internal Server Error".to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
