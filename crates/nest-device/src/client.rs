//! HTTP client for the SDM device endpoints

use std::future::Future;
use std::pin::Pin;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::model::{Device, Devices, SETPOINT_TRAIT, is_valid_device_id};

pub const DEFAULT_API_BASE_URL: &str = "https://smartdevicemanagement.googleapis.com/v1";

const SET_HEAT_COMMAND: &str = "sdm.devices.commands.ThermostatTemperatureSetpoint.SetHeat";

/// Thermostat operations needed outside a request.
///
/// Uses `Pin<Box<dyn Future>>` so implementations can sit behind `Arc<dyn DeviceControl>`.
pub trait DeviceControl: Send + Sync {
    fn list_devices<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Devices>> + Send + 'a>>;

    fn get_temperature<'a>(
        &'a self,
        access_token: &'a str,
        device_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f32>> + Send + 'a>>;

    fn set_temperature<'a>(
        &'a self,
        access_token: &'a str,
        device_id: &'a str,
        celsius: f32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Client scoped to one Device Access project.
#[derive(Clone)]
pub struct SdmClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
}

impl SdmClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
        }
    }

    fn devices_url(&self) -> String {
        format!("{}/enterprises/{}/devices", self.base_url, self.project_id)
    }

    /// Rejects ids that would change the request path or query.
    fn device_url(&self, device_id: &str) -> Result<String> {
        if !is_valid_device_id(device_id) {
            let err = Error::InvalidDeviceId(device_id.to_string());
            record_error(&err);
            return Err(err);
        }
        Ok(format!("{}/{}", self.devices_url(), device_id))
    }

    pub async fn list_devices(&self, access_token: &str) -> Result<Devices> {
        self.call::<Devices, ()>(Method::GET, &self.devices_url(), access_token, None)
            .await
    }

    /// Current heat setpoint of a thermostat.
    ///
    /// A response without the setpoint trait is a [`Error::Protocol`] error,
    /// never a zero reading.
    pub async fn get_temperature(&self, access_token: &str, device_id: &str) -> Result<f32> {
        let device: Device = self
            .call::<Device, ()>(Method::GET, &self.device_url(device_id)?, access_token, None)
            .await?;
        device.heat_setpoint().ok_or_else(|| {
            let err = Error::Protocol(format!(
                "device {device_id} has no {SETPOINT_TRAIT}.heatCelsius; traits: {}",
                Value::Object(device.traits.clone())
            ));
            record_error(&err);
            err
        })
    }

    pub async fn set_temperature(
        &self,
        access_token: &str,
        device_id: &str,
        celsius: f32,
    ) -> Result<()> {
        let command = json!({
            "command": SET_HEAT_COMMAND,
            "params": { "heatCelsius": celsius },
        });
        let url = format!("{}:executeCommand", self.device_url(device_id)?);
        // Success body is an empty object; only the status matters.
        self.call::<Value, Value>(Method::POST, &url, access_token, Some(&command))
            .await?;
        debug!(device_id, celsius, "heat setpoint updated");
        Ok(())
    }

    #[instrument(skip_all, fields(method = %method, url = %url))]
    async fn call<T, B>(
        &self,
        method: Method,
        url: &str,
        access_token: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = self.send(method, url, access_token, body).await;
        if let Err(e) = &result {
            record_error(e);
        }
        result
    }

    async fn send<T, B>(
        &self,
        method: Method,
        url: &str,
        access_token: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::Protocol(e.to_string()))
    }
}

fn record_error(err: &Error) {
    warn!(kind = err.kind(), error = %err, "device API call failed");
    metrics::counter!("device_api_errors_total", "kind" => err.kind()).increment(1);
}

impl DeviceControl for SdmClient {
    fn list_devices<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Devices>> + Send + 'a>> {
        Box::pin(SdmClient::list_devices(self, access_token))
    }

    fn get_temperature<'a>(
        &'a self,
        access_token: &'a str,
        device_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f32>> + Send + 'a>> {
        Box::pin(SdmClient::get_temperature(self, access_token, device_id))
    }

    fn set_temperature<'a>(
        &'a self,
        access_token: &'a str,
        device_id: &'a str,
        celsius: f32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(SdmClient::set_temperature(
            self,
            access_token,
            device_id,
            celsius,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    const TOKEN: &str = "ya29.test";

    #[derive(Default)]
    struct Recorded {
        commands: Mutex<Vec<(String, Value)>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer ya29.test")
    }

    /// Fake SDM API for project `p`: thermostat `t1` has a setpoint, `t2`
    /// has none, `limited` answers 429, anything else 404.
    async fn start_api() -> (String, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route(
                "/v1/enterprises/p/devices",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({"devices": [
                            {"name": "enterprises/p/devices/t1", "type": "sdm.devices.types.THERMOSTAT",
                             "traits": {}, "parentRelations": [{"parent": "x", "displayName": "Lounge"}]}
                        ]})),
                    )
                }),
            )
            .route(
                "/v1/enterprises/p/devices/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})));
                    }
                    match id.as_str() {
                        "t1" => (
                            StatusCode::OK,
                            Json(json!({"name": "enterprises/p/devices/t1",
                                "traits": {"sdm.devices.traits.ThermostatTemperatureSetpoint": {"heatCelsius": 18.5}}})),
                        ),
                        "t2" => (
                            StatusCode::OK,
                            Json(json!({"name": "enterprises/p/devices/t2", "traits": {}})),
                        ),
                        "limited" => (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))),
                        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "device not found"}))),
                    }
                })
                // `{id}` captures `t1:executeCommand` for commands
                .post(
                    |State(recorded): State<Arc<Recorded>>,
                     Path(command): Path<String>,
                     Json(body): Json<Value>| async move {
                        recorded.commands.lock().unwrap().push((command, body));
                        Json(json!({}))
                    },
                ),
            )
            .with_state(recorded.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), recorded)
    }

    fn client(base: &str) -> SdmClient {
        SdmClient::new(reqwest::Client::new(), base, "p")
    }

    #[tokio::test]
    async fn list_devices_parses_response() {
        let (base, _) = start_api().await;
        let devices = client(&base).list_devices(TOKEN).await.unwrap();
        assert_eq!(devices.devices.len(), 1);
        assert_eq!(devices.devices[0].device_id(), "t1");
        assert_eq!(devices.devices[0].display_name(), "Lounge");
    }

    #[tokio::test]
    async fn bad_token_is_api_error_with_body() {
        let (base, _) = start_api().await;
        let err = client(&base).list_devices("wrong").await.unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("unauthenticated"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_temperature_reads_heat_setpoint() {
        let (base, _) = start_api().await;
        let temp = client(&base).get_temperature(TOKEN, "t1").await.unwrap();
        assert_eq!(temp, 18.5);
    }

    #[tokio::test]
    async fn get_temperature_without_setpoint_is_protocol_error() {
        let (base, _) = start_api().await;
        let err = client(&base).get_temperature(TOKEN, "t2").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let (base, _) = start_api().await;
        let err = client(&base)
            .get_temperature(TOKEN, "limited")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited), "got: {err:?}");
    }

    #[tokio::test]
    async fn path_like_device_ids_are_rejected_before_sending() {
        let (base, recorded) = start_api().await;
        let client = client(&base);

        let err = client.get_temperature(TOKEN, "../t1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceId(_)), "got: {err:?}");

        let err = client
            .set_temperature(TOKEN, "t1:executeCommand?x=", 21.0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceId(_)), "got: {err:?}");
        assert!(recorded.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_temperature_posts_set_heat_command() {
        let (base, recorded) = start_api().await;
        client(&base).set_temperature(TOKEN, "t1", 21.5).await.unwrap();

        let commands = recorded.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "t1:executeCommand");
        assert_eq!(
            commands[0].1,
            json!({
                "command": "sdm.devices.commands.ThermostatTemperatureSetpoint.SetHeat",
                "params": {"heatCelsius": 21.5}
            })
        );
    }

    #[tokio::test]
    async fn unreachable_api_is_transport_error() {
        let err = client("http://127.0.0.1:1/v1")
            .list_devices(TOKEN)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn trait_object_delegates() {
        let (base, _) = start_api().await;
        let devices: Arc<dyn DeviceControl> = Arc::new(client(&base));
        assert_eq!(devices.get_temperature(TOKEN, "t1").await.unwrap(), 18.5);
    }

    #[test]
    fn record_error_counts_by_kind() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_error(&Error::RateLimited);
        record_error(&Error::Protocol("missing trait".into()));

        let output = handle.render();
        assert!(output.contains("device_api_errors_total"));
        assert!(output.contains("kind=\"rate_limited\""));
        assert!(output.contains("kind=\"protocol\""));
    }
}
