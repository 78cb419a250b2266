//! Page and form handlers
//!
//! All per-browser state lives in two cookies: the signed session
//! (`nest-boost`) and the one-shot flash queue (`_flash`). Handlers load
//! what they need from the jar and hand the updated jar back with the
//! response.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use boost::BoostRequest;
use cookie_state::{Flash, SessionCredentials, SessionState, flash, session};
use nest_device::Devices;
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{Error, Result};
use crate::html;

const RATE_LIMITED_MESSAGE: &str =
    "Google have blocked requests temporarily. Please try again in a couple of minutes.";
const LIST_FAILED_MESSAGE: &str =
    "Unable to get a list of devices. Please try authorization access to Nest again";
const AUTHENTICATED_MESSAGE: &str = "Successfully authenticated with Google";

/// Add `flashes` to the jar. A batch that cannot be encoded is dropped.
fn with_flashes(jar: CookieJar, flashes: &[Flash], secure: bool) -> CookieJar {
    match flash::push(jar.clone(), flashes, secure) {
        Ok(jar) => jar,
        Err(e) => {
            warn!(error = %e, "dropping flash messages");
            jar
        }
    }
}

/// Take pending flashes. An unreadable batch is logged and skipped.
fn drain_flashes(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    let (jar, drained) = flash::drain(jar);
    match drained {
        Ok(flashes) => (jar, flashes),
        Err(e) => {
            warn!(error = %e, "failed to read flashes");
            (jar, Vec::new())
        }
    }
}

/// OAuth callback URL for this request.
///
/// The configured override wins. Otherwise the callback is on the same host,
/// over https only when a proxy in front reports `X-Forwarded-Proto: https`.
pub fn redirect_url(override_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = override_url {
        return url.to_string();
    }
    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}/code")
}

/// `GET /`: thermostat list and boost form.
pub async fn home(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, session) = session::load(&state.codec, jar);
    let SessionCredentials::Authorized { refresh_token, .. } = session.credentials() else {
        info!("no authorization code found, redirecting to /authorize");
        return (jar, Redirect::to("/authorize")).into_response();
    };

    let token = match state.tokens.refresh(refresh_token).await {
        Ok(token) => token,
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "failed to get token from refresh token");
            return (jar, Redirect::to("/authorize")).into_response();
        }
    };

    let secure = state.settings.secure_cookies;
    let mut flashes = Vec::new();
    let mut enable_submit = true;
    let (jar, devices) = match state.devices.list_devices(&token.access_token).await {
        Ok(devices) => {
            let (jar, pending) = drain_flashes(jar);
            flashes = pending;
            (jar, devices)
        }
        Err(nest_device::Error::RateLimited) => {
            flashes.push(Flash::warn(RATE_LIMITED_MESSAGE));
            enable_submit = false;
            (jar, Devices::default())
        }
        Err(e) => {
            warn!(error = %e, "unable to get a list of devices");
            let jar = with_flashes(jar, &[Flash::warn(LIST_FAILED_MESSAGE)], secure);
            return (jar, Redirect::to("/authorize")).into_response();
        }
    };

    let page = html::home_page(&flashes, devices.thermostats(), enable_submit);
    (jar, Html(page)).into_response()
}

/// `GET /authorize`: link to Google's consent screen.
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response> {
    let settings = &state.settings;
    let redirect_uri = redirect_url(settings.redirect_url.as_deref(), &headers);
    let url = nest_auth::build_authorization_url(
        &settings.authorize_base_url,
        &settings.project_id,
        &settings.client_id,
        &redirect_uri,
    )
    .map_err(|e| Error::AuthorizeUrl(e.to_string()))?;

    let (jar, flashes) = drain_flashes(jar);
    Ok((jar, Html(html::authorize_page(&flashes, &url))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// `GET /code`: OAuth callback.
pub async fn code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response> {
    if let Some(code) = params.code {
        let redirect_uri = redirect_url(state.settings.redirect_url.as_deref(), &headers);
        let token = state.tokens.exchange_code(&code, &redirect_uri).await?;

        // Google requires one device call after authorization before the
        // grant is usable; the result itself is not needed.
        match state.devices.list_devices(&token.access_token).await {
            Ok(devices) => info!(devices = devices.devices.len(), "initial device listing"),
            Err(e) => warn!(error = %e, "initial device listing failed"),
        }

        let secure = state.settings.secure_cookies;
        let session = SessionState::new(code, token.refresh_token);
        let jar = session::store(&state.codec, jar, &session, secure)?;
        let jar = with_flashes(jar, &[Flash::info(AUTHENTICATED_MESSAGE)], secure);
        info!("authorization completed");
        return Ok((jar, Redirect::temporary("/")).into_response());
    }

    if let Some(error) = params.error {
        warn!(error = %error, "authorization declined");
        return Ok((
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("Got an error response from Google: {error}"),
        )
            .into_response());
    }

    Err(Error::MissingCode)
}

/// Validated boost form, or the messages explaining why it is invalid.
fn parse_boost_form(
    form: &HashMap<String, String>,
) -> std::result::Result<(BoostRequest, String), Vec<Flash>> {
    let device = form.get("device").map(String::as_str).unwrap_or_default();
    let raw_temperature = form
        .get("temperature")
        .map(String::as_str)
        .unwrap_or_default();
    let raw_duration = form.get("duration").map(String::as_str).unwrap_or_default();

    let mut errors = Vec::new();
    if !nest_device::is_valid_device_id(device) {
        errors.push(Flash::error("Unable to find the thermostat to adjust"));
    }
    let temperature = match raw_temperature.trim().parse::<f32>() {
        Ok(t) if t.is_finite() => Some(t),
        Ok(_) => {
            errors.push(Flash::error(
                "Unable to get the temperature to set to: not a finite number",
            ));
            None
        }
        Err(e) => {
            errors.push(Flash::error(format!(
                "Unable to get the temperature to set to: {e}"
            )));
            None
        }
    };
    let duration = match raw_duration.trim().parse::<u16>() {
        Ok(d) => Some(d),
        Err(e) => {
            errors.push(Flash::error(format!(
                "Unable to get the duration to run the heating for: {e}"
            )));
            None
        }
    };

    match (temperature, duration) {
        (Some(desired_temperature), Some(duration)) if errors.is_empty() => Ok((
            BoostRequest {
                device_id: device.to_string(),
                desired_temperature,
                duration_minutes: u32::from(duration),
            },
            raw_temperature.trim().to_string(),
        )),
        _ => Err(errors),
    }
}

/// `POST /boost`: start a boost and go back to the home page.
pub async fn boost(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let secure = state.settings.secure_cookies;
    let (request, shown_temperature) = match parse_boost_form(&form) {
        Ok(parsed) => parsed,
        Err(errors) => {
            let jar = with_flashes(jar, &errors, secure);
            return (jar, Redirect::to("/")).into_response();
        }
    };

    let (jar, session) = session::load(&state.codec, jar);
    let token = match session.refresh_token() {
        Some(refresh_token) => state.tokens.refresh(refresh_token).await,
        None => Err(nest_auth::Error::InvalidCredentials {
            status: 401,
            body: "not authorized with Google".into(),
        }),
    };
    let token = match token {
        Ok(token) => token,
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "failed to run boost");
            let jar = with_flashes(
                jar,
                &[Flash::error(format!("Failed to run boost: {e}"))],
                secure,
            );
            return (jar, Redirect::to("/")).into_response();
        }
    };

    let message = format!(
        "Setting heating to {shown_temperature}\u{b0}C for {} minute(s)",
        request.duration_minutes
    );
    let handle = state.orchestrator.spawn(token, request);
    state.stats.boosts_started.fetch_add(1, Ordering::Relaxed);
    info!(task_id = %handle.id(), device_id = handle.device_id(), "boost scheduled");

    let jar = with_flashes(jar, &[Flash::info(message)], secure);
    (jar, Redirect::to("/")).into_response()
}

/// `GET /health`: liveness with uptime and boost count.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.stats.started_at.elapsed().as_secs(),
        "boosts_started": state.stats.boosts_started.load(Ordering::Relaxed),
    });
    ([(CONTENT_TYPE, "application/json")], body.to_string())
}

/// `GET /ready`
pub async fn ready() -> impl IntoResponse {
    axum::http::StatusCode::OK
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
