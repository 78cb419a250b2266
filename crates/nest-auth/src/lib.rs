//! Google OAuth for the Smart Device Management API
//!
//! Exchanges authorization codes and refresh tokens for access tokens. The
//! crate keeps no token state of its own: every call returns a fresh
//! [`AccessToken`] owned by the caller.
//!
//! Flow:
//! 1. Browser is sent to `authorize::build_authorization_url()`
//! 2. Callback hands the code to `TokenClient::exchange_code()`
//! 3. Refresh token is kept client-side in the session cookie
//! 4. Each later request or boost step calls `TokenClient::refresh()`

pub mod authorize;
pub mod constants;
pub mod error;
pub mod token;

pub use authorize::build_authorization_url;
pub use constants::*;
pub use error::{Error, Result};
pub use token::{AccessToken, TokenClient, TokenRefresher};
