//! One-shot flash messages carried in a cookie
//!
//! `push` writes the whole batch as one cookie. `drain` reads it back and, in
//! the same response, replaces it with a removal cookie, so each batch is
//! shown at most once. Messages keep insertion order and are never merged.
//!
//! The cookie value is URL-safe base64 of a JSON array, which keeps it valid
//! in a `Set-Cookie` header. It is not signed: flashes are presentation
//! hints and carry nothing an attacker gains by forging.

use axum_extra::extract::cookie::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::cookies::{CookieOptions, build_cookie, removal_cookie};
use crate::error::FlashError;

/// Cookie carrying pending flashes.
pub const FLASH_COOKIE: &str = "_flash";

/// Largest encoded batch accepted by `push`. Browsers cap a cookie at
/// roughly 4KB including its name and attributes.
pub const MAX_FLASH_COOKIE_LEN: usize = 3800;

/// Unread flashes expire with the cookie.
pub const FLASH_MAX_AGE: Duration = Duration::minutes(5);

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// Bootstrap alert class used when rendering.
    pub fn css_class(&self) -> &'static str {
        match self {
            Level::Info => "alert-success",
            Level::Warn => "alert-warning",
            Level::Error => "alert-danger",
        }
    }
}

/// A single leveled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// Serialize a batch into a cookie-safe string.
pub fn encode(flashes: &[Flash]) -> Result<String, FlashError> {
    let json = serde_json::to_vec(flashes).map_err(|e| FlashError::Encode(e.to_string()))?;
    let encoded = URL_SAFE_NO_PAD.encode(json);
    if encoded.len() > MAX_FLASH_COOKIE_LEN {
        return Err(FlashError::TooLarge {
            len: encoded.len(),
            max: MAX_FLASH_COOKIE_LEN,
        });
    }
    Ok(encoded)
}

/// Parse a cookie value produced by [`encode`]. An empty value is an empty batch.
pub fn decode(value: &str) -> Result<Vec<Flash>, FlashError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    let json = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| FlashError::Decode(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&json).map_err(|e| FlashError::Decode(format!("invalid JSON: {e}")))
}

/// Queue `flashes` for the next response that drains them.
///
/// An empty batch leaves the jar untouched.
pub fn push(jar: CookieJar, flashes: &[Flash], secure: bool) -> Result<CookieJar, FlashError> {
    if flashes.is_empty() {
        return Ok(jar);
    }
    let value = encode(flashes)?;
    Ok(jar.add(build_cookie(
        FLASH_COOKIE,
        value,
        CookieOptions::new(Some(FLASH_MAX_AGE), secure),
    )))
}

/// Take all pending flashes and clear the cookie.
///
/// The removal cookie is added whenever a flash cookie was present, including
/// when it fails to decode, so a corrupt value is not resurfaced on every
/// request. A missing cookie yields an empty batch.
pub fn drain(jar: CookieJar) -> (CookieJar, Result<Vec<Flash>, FlashError>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, Ok(Vec::new()));
    };
    let flashes = decode(cookie.value());
    (jar.add(removal_cookie(FLASH_COOKIE)), flashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::http::header::COOKIE;

    /// Simulate the browser sending back the cookie value from a response jar.
    fn incoming_jar(name: &str, value: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, format!("{name}={value}").parse().unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn push_then_drain_returns_same_batch() {
        let flashes = vec![Flash::info(
            "Setting heating to 21.5\u{b0}C for 30 minute(s)",
        )];
        let jar = push(CookieJar::new(), &flashes, false).unwrap();
        let value = jar.get(FLASH_COOKIE).unwrap().value().to_string();

        let (jar, drained) = drain(incoming_jar(FLASH_COOKIE, &value));
        let drained = drained.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].level, Level::Info);
        assert_eq!(
            drained[0].message,
            "Setting heating to 21.5\u{b0}C for 30 minute(s)"
        );

        let cleared = jar.get(FLASH_COOKIE).unwrap();
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn drain_preserves_insertion_order_and_duplicates() {
        let flashes = vec![
            Flash::error("Unable to find the thermostat to adjust"),
            Flash::warn("second"),
            Flash::info("third"),
            Flash::warn("second"),
        ];
        let value = encode(&flashes).unwrap();
        let (_, drained) = drain(incoming_jar(FLASH_COOKIE, &value));
        assert_eq!(drained.unwrap(), flashes);
    }

    #[test]
    fn second_drain_is_empty() {
        let value = encode(&[Flash::info("once")]).unwrap();
        let (jar, first) = drain(incoming_jar(FLASH_COOKIE, &value));
        assert_eq!(first.unwrap().len(), 1);

        let (_, second) = drain(jar);
        assert!(second.unwrap().is_empty());
    }

    #[test]
    fn drain_without_cookie_is_empty_and_sets_nothing() {
        let (jar, drained) = drain(CookieJar::new());
        assert!(drained.unwrap().is_empty());
        assert!(jar.get(FLASH_COOKIE).is_none());
    }

    #[test]
    fn malformed_cookie_errors_but_is_cleared() {
        let (jar, drained) = drain(incoming_jar(FLASH_COOKIE, "invalid"));
        assert!(matches!(drained, Err(FlashError::Decode(_))));
        let cleared = jar.get(FLASH_COOKIE).unwrap();
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn push_empty_batch_is_noop() {
        let jar = push(CookieJar::new(), &[], true).unwrap();
        assert!(jar.get(FLASH_COOKIE).is_none());
    }

    #[test]
    fn push_rejects_oversized_batch() {
        let flashes: Vec<Flash> = (0..100)
            .map(|i| Flash::info(format!("message number {i} with some padding text")))
            .collect();
        let result = push(CookieJar::new(), &flashes, false);
        assert!(matches!(result, Err(FlashError::TooLarge { .. })));
    }

    #[test]
    fn levels_serialize_uppercase() {
        let json = serde_json::to_string(&Flash::warn("w")).unwrap();
        assert_eq!(json, r#"{"level":"WARN","message":"w"}"#);
    }

    #[test]
    fn css_classes_match_levels() {
        assert_eq!(Level::Info.css_class(), "alert-success");
        assert_eq!(Level::Warn.css_class(), "alert-warning");
        assert_eq!(Level::Error.css_class(), "alert-danger");
    }
}
