//! Typed authorization session stored in a signed cookie
//!
//! On the wire the session stays a string map (`authorizationCode`,
//! `refresh_token`) so the cookie format is independent of this struct.
//! A key that is present but empty is treated the same as a missing key.

use std::collections::HashMap;
use std::fmt;

use axum_extra::extract::cookie::CookieJar;
use time::Duration;
use tracing::warn;

use crate::codec::CookieCodec;
use crate::cookies::{CookieOptions, removal_cookie};
use crate::error::Result;

/// Cookie carrying the session map.
pub const SESSION_COOKIE: &str = "nest-boost";

/// Session cookies live for a year; the refresh token is long-lived.
pub const SESSION_MAX_AGE: Duration = Duration::days(365);

const AUTHORIZATION_CODE_KEY: &str = "authorizationCode";
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Authorization state of one browser.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    authorization_code: Option<String>,
    refresh_token: Option<String>,
}

/// What a request handler can do with the session.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionCredentials<'a> {
    Authorized {
        authorization_code: &'a str,
        refresh_token: &'a str,
    },
    Missing,
}

impl SessionState {
    pub fn new(authorization_code: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            authorization_code: non_empty(authorization_code.into()),
            refresh_token: non_empty(refresh_token.into()),
        }
    }

    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            authorization_code: map.get(AUTHORIZATION_CODE_KEY).cloned().and_then(non_empty),
            refresh_token: map.get(REFRESH_TOKEN_KEY).cloned().and_then(non_empty),
        }
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(code) = &self.authorization_code {
            map.insert(AUTHORIZATION_CODE_KEY.to_string(), code.clone());
        }
        if let Some(token) = &self.refresh_token {
            map.insert(REFRESH_TOKEN_KEY.to_string(), token.clone());
        }
        map
    }

    /// Both values must be present and non-empty to count as authorized.
    pub fn credentials(&self) -> SessionCredentials<'_> {
        match (&self.authorization_code, &self.refresh_token) {
            (Some(authorization_code), Some(refresh_token)) => SessionCredentials::Authorized {
                authorization_code,
                refresh_token,
            },
            _ => SessionCredentials::Missing,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("authorization_code", &self.authorization_code.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Load the session from the incoming jar.
///
/// A missing cookie is an empty session. A cookie that fails verification is
/// logged, cleared on the response, and also treated as an empty session.
pub fn load(codec: &CookieCodec, jar: CookieJar) -> (CookieJar, SessionState) {
    match codec.read::<HashMap<String, String>>(&jar, SESSION_COOKIE) {
        Ok(map) => (jar, SessionState::from_map(&map)),
        Err(e) => {
            warn!(error = %e, "discarding unreadable session cookie");
            (jar.add(removal_cookie(SESSION_COOKIE)), SessionState::default())
        }
    }
}

/// Write the session to the outgoing jar.
pub fn store(
    codec: &CookieCodec,
    jar: CookieJar,
    session: &SessionState,
    secure: bool,
) -> Result<CookieJar> {
    codec.write(
        jar,
        SESSION_COOKIE,
        &session.to_map(),
        CookieOptions::new(Some(SESSION_MAX_AGE), secure),
    )
}
