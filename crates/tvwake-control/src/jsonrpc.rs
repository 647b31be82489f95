//! Sony BRAVIA JSON-RPC adapter
//!
//! BRAVIA TVs authenticate with a pre-shared key configured on the TV and
//! sent in the `X-Auth-PSK` header on every request. There is no pairing
//! handshake: a present PSK is assumed valid until the first real call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ControlError, Outcome, Result};
use crate::http::{self, cancellable};
use crate::plugin::{settle, wake_and_settle, PinPrompt, TvOperation, TvPlugin};
use crate::types::{
    DeviceCredential, Manufacturer, PairingResult, PowerStatus, TlsPolicy, TvState, WakeHint,
};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 80;

/// Header carrying the pre-shared key
pub const PSK_HEADER: &str = "X-Auth-PSK";

/// Power service endpoint
pub const SYSTEM_ENDPOINT: &str = "/sony/system";

/// Application service endpoint
pub const APP_CONTROL_ENDPOINT: &str = "/sony/appControl";

/// JSON-RPC connection configuration
#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    pub host: String,
    /// HTTP port (default 80)
    pub port: u16,
    /// Per-request timeout (default 5s)
    pub timeout: Duration,
    /// Pause after sending a wake packet (default 1500ms)
    pub wake_delay: Duration,
}

impl JsonRpcConfig {
    /// Create new JSON-RPC config
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(5),
            wake_delay: Duration::from_millis(1500),
        }
    }

    /// Set custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set custom request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set custom post-wake delay
    pub fn with_wake_delay(mut self, delay: Duration) -> Self {
        self.wake_delay = delay;
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// JSON-RPC request envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcRequest {
    pub method: &'static str,
    pub params: Vec<Value>,
    pub id: u32,
    pub version: &'static str,
}

impl RpcRequest {
    pub fn new(method: &'static str, params: Vec<Value>) -> Self {
        Self {
            method,
            params,
            id: 1,
            version: "1.0",
        }
    }

    pub fn get_power_status() -> Self {
        Self::new("getPowerStatus", Vec::new())
    }

    pub fn set_power_status(on: bool) -> Self {
        Self::new("setPowerStatus", vec![json!({ "status": on })])
    }

    pub fn set_active_app(uri: &str) -> Self {
        Self::new("setActiveApp", vec![json!({ "uri": uri })])
    }
}

/// Reject replies carrying a JSON-RPC `error` member (`[code, message]`)
fn check_rpc_error(value: &Value) -> Result<()> {
    match value.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(error) => Err(ControlError::Http {
            status: "JSON-RPC error".to_string(),
            body: error.to_string(),
        }),
    }
}

/// Parse a 2xx reply body; anything that is not JSON reads as `Null`
///
/// The 2xx status alone decides success for `setPowerStatus` and
/// `setActiveApp`, so a non-JSON body must not turn into a failure.
fn decode_reply(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "2xx reply is not JSON");
            Value::Null
        }
    }
}

/// Map `result[0].status` of a `getPowerStatus` reply
fn parse_power_status(value: &Value) -> PowerStatus {
    let status = value
        .get("result")
        .and_then(Value::as_array)
        .and_then(|result| result.first())
        .and_then(|first| first.get("status"))
        .and_then(Value::as_str);

    match status.map(str::to_ascii_lowercase).as_deref() {
        Some("active") => PowerStatus::On,
        Some("standby") => PowerStatus::Standby,
        _ => PowerStatus::Unknown,
    }
}

/// BRAVIA JSON-RPC adapter
#[derive(Debug)]
pub struct JsonRpcAdapter {
    config: JsonRpcConfig,
    client: Client,
    credential: DeviceCredential,
}

impl JsonRpcAdapter {
    /// Create a new adapter; performs no network I/O
    pub fn new(config: JsonRpcConfig, credential: DeviceCredential) -> Result<Self> {
        let client = http::build_client(config.timeout, TlsPolicy::Verify)?;
        Ok(Self {
            config,
            client,
            credential,
        })
    }

    pub fn config(&self) -> &JsonRpcConfig {
        &self.config
    }

    fn psk(&self) -> Option<&str> {
        self.credential.secret()
    }

    /// POST an envelope and return the parsed reply
    async fn call(&self, endpoint: &str, request: &RpcRequest) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url(), endpoint);
        let body = serde_json::to_value(request)?;
        let headers: Vec<(&'static str, &str)> = self
            .psk()
            .map(|psk| vec![(PSK_HEADER, psk)])
            .unwrap_or_default();

        debug!(url = %url, method = request.method, "JSON-RPC call");
        let reply = http::send(&self.client, Method::POST, &url, Some(&body), &headers).await?;
        if !reply.is_success() {
            return Err(reply.error());
        }

        let value = decode_reply(&reply.body);
        check_rpc_error(&value)?;
        Ok(value)
    }

    async fn query_state(&self) -> Result<TvState> {
        let value = self
            .call(SYSTEM_ENDPOINT, &RpcRequest::get_power_status())
            .await?;
        Ok(TvState::with_power(parse_power_status(&value)))
    }

    async fn request_power_off(&self) -> Result<bool> {
        self.call(SYSTEM_ENDPOINT, &RpcRequest::set_power_status(false))
            .await?;
        info!(host = %self.config.host, "Standby requested");
        Ok(true)
    }

    async fn request_launch(&self, app_id: &str) -> Result<bool> {
        if app_id.trim().is_empty() {
            return Err(ControlError::UnsupportedOperation("empty app id".to_string()));
        }
        self.call(APP_CONTROL_ENDPOINT, &RpcRequest::set_active_app(app_id))
            .await?;
        info!(host = %self.config.host, app = %app_id, "App launch requested");
        Ok(true)
    }

    async fn probe(&self) -> Result<bool> {
        let value = self
            .call(SYSTEM_ENDPOINT, &RpcRequest::get_power_status())
            .await?;
        Ok(!value.is_null())
    }
}

#[async_trait]
impl TvPlugin for JsonRpcAdapter {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::JsonRpc
    }

    fn model_hint(&self) -> &'static str {
        "Sony BRAVIA (JSON-RPC)"
    }

    fn host(&self) -> &str {
        &self.config.host
    }

    fn port(&self) -> u16 {
        self.config.port
    }

    fn credential(&self) -> &DeviceCredential {
        &self.credential
    }

    async fn discover(&self, cancel: &CancellationToken) -> Outcome<bool> {
        let result = cancellable(cancel, self.probe()).await;
        settle("discover", self.host(), result, false)
    }

    async fn pair(&mut self, _prompt: &dyn PinPrompt, cancel: &CancellationToken) -> PairingResult {
        if cancel.is_cancelled() {
            return PairingResult::cancelled("Pairing cancelled");
        }
        if self.psk().is_none() {
            info!(host = %self.config.host, "No pre-shared key configured");
            return PairingResult::needs_user_psk();
        }
        PairingResult::success(self.credential.clone())
    }

    async fn wake(&self, hint: &WakeHint, cancel: &CancellationToken) -> Outcome<bool> {
        wake_and_settle(hint, self.config.wake_delay, self.host(), cancel).await
    }

    async fn get_state(&self, cancel: &CancellationToken) -> Outcome<TvState> {
        let result = cancellable(cancel, self.query_state()).await;
        settle("get_state", self.host(), result, TvState::unknown())
    }

    async fn power_off(&self, cancel: &CancellationToken) -> Outcome<bool> {
        let result = cancellable(cancel, self.request_power_off()).await;
        settle("power_off", self.host(), result, false)
    }

    async fn send_key(&self, key: &str, cancel: &CancellationToken) -> Outcome<bool> {
        if key.trim().eq_ignore_ascii_case("standby") {
            return self.power_off(cancel).await;
        }
        let err = ControlError::UnsupportedOperation(format!("BRAVIA key {:?}", key));
        let result = cancellable(cancel, async { Err(err) }).await;
        settle("send_key", self.host(), result, false)
    }

    async fn launch_app(&self, app_id: &str, cancel: &CancellationToken) -> Outcome<bool> {
        let result = cancellable(cancel, self.request_launch(app_id)).await;
        settle("launch_app", self.host(), result, false)
    }

    fn supports_operation(&self, _op: TvOperation) -> bool {
        true
    }
}
