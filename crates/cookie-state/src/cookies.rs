use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Attributes applied to every cookie this crate writes.
///
/// `max_age: None` produces a browser-session cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub max_age: Option<Duration>,
    pub secure: bool,
}

impl CookieOptions {
    pub fn new(max_age: Option<Duration>, secure: bool) -> Self {
        Self { max_age, secure }
    }
}

/// Build an HttpOnly, site-wide cookie.
pub(crate) fn build_cookie(name: &str, value: String, options: CookieOptions) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(options.secure)
        .same_site(SameSite::Lax)
        .path("/".to_string());
    if let Some(max_age) = options.max_age {
        builder = builder.max_age(max_age);
    }
    builder.build()
}

/// Create a removal cookie: empty value, expires immediately.
pub(crate) fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
