//! Philips JointSPACE v6 adapter
//!
//! JointSPACE exposes a REST API on port 1926 (HTTPS, Digest auth) and an
//! older unauthenticated one on 1925 (HTTP). Authenticated calls need a
//! device id and auth key obtained through the two-step pairing handshake
//! in [`pairing`].

pub mod keys;
pub mod pairing;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Outcome, Result};
use crate::http::{self, cancellable, DigestAuth};
use crate::plugin::{settle, wake_and_settle, PinPrompt, TvOperation, TvPlugin};
use crate::types::{
    DeviceCredential, Manufacturer, PairingResult, PowerStatus, TlsPolicy, TvState, WakeHint,
};

use pairing::{generate_device_id, DeviceDescriptor, PairingSession};

/// Default authenticated control port (HTTPS)
pub const DEFAULT_PORT: u16 = 1926;

/// Alternate unauthenticated port (HTTP) tried by discovery
pub const ALTERNATE_PORT: u16 = 1925;

/// API version prefix
const API_PREFIX: &str = "/6";

/// JointSPACE connection configuration
#[derive(Debug, Clone)]
pub struct JointSpaceConfig {
    pub host: String,
    /// Primary control port (default 1926)
    pub port: u16,
    /// Use HTTPS on the primary port (default true)
    pub secure: bool,
    /// Plain HTTP port probed when the primary port fails (default 1925)
    pub alternate_port: u16,
    /// Certificate handling for the primary port
    pub tls: TlsPolicy,
    /// Per-request timeout (default 10s)
    pub timeout: Duration,
    /// Pause after sending a wake packet (default 2500ms)
    pub wake_delay: Duration,
    /// Descriptor presented during pairing
    pub descriptor: DeviceDescriptor,
}

impl JointSpaceConfig {
    /// Create new JointSPACE config
    ///
    /// TVs use self-signed certificates, so `tls` is normally
    /// [`TlsPolicy::AcceptInvalidCerts`]; it is required here so that the
    /// choice is always visible at the call site.
    pub fn new(host: impl Into<String>, tls: TlsPolicy) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            secure: true,
            alternate_port: ALTERNATE_PORT,
            tls,
            timeout: Duration::from_secs(10),
            wake_delay: Duration::from_millis(2500),
            descriptor: DeviceDescriptor::default(),
        }
    }

    /// Set custom primary port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Speak plain HTTP on the primary port
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set custom alternate port
    pub fn with_alternate_port(mut self, port: u16) -> Self {
        self.alternate_port = port;
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

    /// Base URL of the primary control endpoint, including the API prefix
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, API_PREFIX)
    }

    /// Base URL of the alternate endpoint
    pub fn alternate_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.alternate_port, API_PREFIX)
    }
}

#[derive(Debug, Deserialize)]
struct PowerStateReply {
    powerstate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolumeReply {
    current: Option<i64>,
}

/// Map a JointSPACE `powerstate` value
fn parse_power_state(value: &str) -> PowerStatus {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" => PowerStatus::On,
        "standby" | "standbykeep" => PowerStatus::Standby,
        _ => PowerStatus::Unknown,
    }
}

/// JointSPACE v6 adapter
#[derive(Debug)]
pub struct JointSpaceAdapter {
    config: JointSpaceConfig,
    client: Client,
    credential: DeviceCredential,
}

impl JointSpaceAdapter {
    /// Create a new adapter; performs no network I/O
    pub fn new(config: JointSpaceConfig, credential: DeviceCredential) -> Result<Self> {
        if config.secure && config.tls.accepts_invalid_certs() {
            warn!(
                host = %config.host,
                port = config.port,
                "TLS certificate validation disabled for JointSPACE endpoint"
            );
        }
        let client = http::build_client(config.timeout, config.tls)?;

        Ok(Self {
            config,
            client,
            credential,
        })
    }

    pub fn config(&self) -> &JointSpaceConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    fn digest_auth(&self) -> Result<DigestAuth<'_>> {
        match (self.credential.principal(), self.credential.secret()) {
            (Some(username), Some(password)) => Ok(DigestAuth { username, password }),
            _ => Err(ControlError::MissingCredential(format!(
                "{} is not paired",
                self.config.host
            ))),
        }
    }

    async fn probe(&self, url: &str) -> Result<bool> {
        let reply = http::send(&self.client, Method::GET, url, None, &[]).await?;
        debug!(url = %url, status = %reply.status, "JointSPACE probe");
        Ok(reply.is_success())
    }

    async fn post_key(&self, key: &str) -> Result<bool> {
        let key = keys::canonical(key).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("JointSPACE key {:?}", key))
        })?;
        let auth = self.digest_auth()?;

        let body = json!({ "key": key });
        let reply = http::send_with_digest(
            &self.client,
            Method::POST,
            &self.url("/input/key"),
            Some(&body),
            auth,
        )
        .await?;

        if !reply.is_success() {
            return Err(reply.error());
        }
        info!(host = %self.config.host, key = key, "Key sent");
        Ok(true)
    }

    async fn authenticated_get(&self, path: &str) -> Result<serde_json::Value> {
        let auth = self.digest_auth()?;
        let reply =
            http::send_with_digest(&self.client, Method::GET, &self.url(path), None, auth).await?;
        if !reply.is_success() {
            return Err(reply.error());
        }
        reply.json()
    }

    async fn query_state(&self) -> Result<TvState> {
        let reply: PowerStateReply = serde_json::from_value(self.authenticated_get("/powerstate").await?)?;
        let power = reply
            .powerstate
            .as_deref()
            .map(parse_power_state)
            .unwrap_or_default();

        let mut state = TvState::with_power(power);
        if power == PowerStatus::On {
            // Volume is advisory; a failure here still leaves a valid power state
            match self.authenticated_get("/audio/volume").await {
                Ok(value) => {
                    state.volume = serde_json::from_value::<VolumeReply>(value)
                        .ok()
                        .and_then(|v| v.current);
                }
                Err(e) => debug!(host = %self.config.host, error = %e, "Volume query failed"),
            }
        }
        Ok(state)
    }

    /// Execute both pairing steps and return the granted credential
    async fn run_pairing(
        &self,
        prompt: &dyn PinPrompt,
        cancel: &CancellationToken,
    ) -> Result<DeviceCredential> {
        let device_id = self
            .credential
            .principal()
            .map(str::to_string)
            .unwrap_or_else(generate_device_id);
        let mut session = PairingSession::new(device_id, self.config.descriptor.clone());

        info!(host = %self.config.host, device_id = %session.device_id(), "Starting pairing");

        let body = session.request_body();
        let reply = cancellable(
            cancel,
            http::send(&self.client, Method::POST, &self.url("/pair/request"), Some(&body), &[]),
        )
        .await
        .map_err(|e| session.fail(e))?;
        session.accept_request_reply(&reply)?;

        let pin = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            pin = prompt.ask_for_pin() => pin,
        };
        session.supply_pin(pin)?;

        let body = session.grant_body()?;
        let auth_key = session
            .intermediate_auth_key()
            .map(str::to_string)
            .unwrap_or_default();
        let auth = DigestAuth {
            username: session.device_id(),
            password: &auth_key,
        };
        let reply = cancellable(
            cancel,
            http::send_with_digest(&self.client, Method::POST, &self.url("/pair/grant"), Some(&body), auth),
        )
        .await;
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return Err(session.fail(e)),
        };

        session.accept_grant_reply(&reply, &self.config.host)
    }
}

/// Convert a pairing failure into a terminal result
fn pairing_failure(err: ControlError) -> PairingResult {
    match err {
        ControlError::Cancelled => PairingResult::cancelled("Pairing cancelled"),
        ControlError::NetworkUnreachable(_) | ControlError::Timeout(_) => {
            PairingResult::network_error(format!("Pairing failed: {}", err))
        }
        ControlError::PairingRejected { .. } => PairingResult::rejected(format!(
            "The TV did not accept pairing. Is JointSPACE enabled? {}",
            err
        )),
        other => PairingResult::rejected(format!("Pairing failed: {}", other)),
    }
}

#[async_trait]
impl TvPlugin for JointSpaceAdapter {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::JointSpace
    }

    fn model_hint(&self) -> &'static str {
        "Philips Android/Google TV (JointSPACE v6)"
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
        let primary = format!("{}/system", self.config.base_url());
        match cancellable(cancel, self.probe(&primary)).await {
            Ok(true) => return Ok(true),
            Err(ControlError::Cancelled) => return settle("discover", self.host(), Err(ControlError::Cancelled), false),
            Ok(false) => debug!(url = %primary, "Primary port answered with an error status"),
            Err(e) => debug!(url = %primary, error = %e, "Primary port unreachable"),
        }

        let alternate = format!("{}/system", self.config.alternate_url());
        let result = cancellable(cancel, self.probe(&alternate)).await;
        settle("discover", self.host(), result, false)
    }

    async fn pair(&mut self, prompt: &dyn PinPrompt, cancel: &CancellationToken) -> PairingResult {
        match self.run_pairing(prompt, cancel).await {
            Ok(credential) => {
                self.credential = credential.clone();
                PairingResult::success(credential)
            }
            Err(e) => {
                warn!(host = %self.config.host, error = %e, "Pairing did not complete");
                pairing_failure(e)
            }
        }
    }

    async fn wake(&self, hint: &WakeHint, cancel: &CancellationToken) -> Outcome<bool> {
        wake_and_settle(hint, self.config.wake_delay, self.host(), cancel).await
    }

    async fn get_state(&self, cancel: &CancellationToken) -> Outcome<TvState> {
        let result = if self.credential.is_paired() {
            cancellable(cancel, self.query_state()).await
        } else {
            debug!(host = %self.config.host, "Not paired; power state unknown");
            cancellable(cancel, async { Ok(TvState::unknown()) }).await
        };
        settle("get_state", self.host(), result, TvState::unknown())
    }

    async fn power_off(&self, cancel: &CancellationToken) -> Outcome<bool> {
        self.send_key("Standby", cancel).await
    }

    async fn send_key(&self, key: &str, cancel: &CancellationToken) -> Outcome<bool> {
        let result = cancellable(cancel, self.post_key(key)).await;
        settle("send_key", self.host(), result, false)
    }

    async fn launch_app(&self, app_id: &str, cancel: &CancellationToken) -> Outcome<bool> {
        let err = ControlError::UnsupportedOperation(format!("JointSPACE app launch ({})", app_id));
        let result = cancellable(cancel, async { Err(err) }).await;
        settle("launch_app", self.host(), result, false)
    }

    fn supports_operation(&self, op: TvOperation) -> bool {
        !matches!(op, TvOperation::LaunchApp)
    }
}
