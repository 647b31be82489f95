//! JointSPACE v6 pairing handshake
//!
//! ```text
//! Idle ──request──▶ RequestSent ──PIN──▶ AwaitingPin ──grant──▶ Granted
//!                        │                    │
//!                        └──────────▶ Failed ◀┘
//! ```
//!
//! A [`PairingSession`] is created per attempt and dropped once it reaches
//! `Granted` or `Failed`. It never touches the network itself; the adapter
//! feeds it replies and asks it for request bodies.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use sha1::Sha1;
use tracing::{debug, info};

use crate::error::{ControlError, Result};
use crate::http::{trim_body, HttpReply};
use crate::types::{DeviceCredential, Manufacturer};

type HmacSha1 = Hmac<Sha1>;

/// Vendor secret used to sign `timestamp + pin`
const SHARED_SECRET_B64: &str =
    "ZmVay1EQVFOaZhwQ4Kv81ypLAZNczV9sG4KkseXWn1NEk6cXmPKO/MCa9sryslvLCFMnNe4Z4CPXzToowvhHvA==";

/// App id sent in the grant body
const GRANT_APP_ID: &str = "1";

/// Length of generated device ids
const DEVICE_ID_LEN: usize = 16;

/// Device descriptor presented to the TV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_name: String,
    pub device_os: String,
    pub app_name: String,
    pub app_type: String,
    pub app_id: String,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            device_name: "tvwake".to_string(),
            device_os: "Linux".to_string(),
            app_name: "tvwake".to_string(),
            app_type: "native".to_string(),
            app_id: "app.id".to_string(),
        }
    }
}

impl DeviceDescriptor {
    fn to_json(&self, device_id: &str) -> Value {
        json!({
            "device_name": self.device_name,
            "device_os": self.device_os,
            "app_name": self.app_name,
            "type": self.app_type,
            "app_id": self.app_id,
            "id": device_id,
        })
    }
}

/// Pairing handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// Nothing sent yet
    Idle,
    /// Pair request in flight
    RequestSent,
    /// TV is showing a PIN
    AwaitingPin,
    /// Grant accepted
    Granted,
    /// Terminal failure
    Failed,
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PairingState::Idle => "idle",
            PairingState::RequestSent => "request-sent",
            PairingState::AwaitingPin => "awaiting-pin",
            PairingState::Granted => "granted",
            PairingState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Transient state of one pairing attempt
#[derive(Debug)]
pub struct PairingSession {
    device_id: String,
    descriptor: DeviceDescriptor,
    timestamp: Option<String>,
    intermediate_auth_key: Option<String>,
    pin: Option<String>,
    state: PairingState,
}

impl PairingSession {
    pub fn new(device_id: impl Into<String>, descriptor: DeviceDescriptor) -> Self {
        Self {
            device_id: device_id.into(),
            descriptor,
            timestamp: None,
            intermediate_auth_key: None,
            pin: None,
            state: PairingState::Idle,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Digest secret issued by the TV in the request step
    pub fn intermediate_auth_key(&self) -> Option<&str> {
        self.intermediate_auth_key.as_deref()
    }

    /// Body for `POST /6/pair/request`
    pub fn request_body(&self) -> Value {
        json!({
            "scope": ["read", "write", "control"],
            "device": self.descriptor.to_json(&self.device_id),
        })
    }

    /// `Idle → RequestSent`, or `Failed` on a bad reply
    pub(crate) fn accept_request_reply(&mut self, reply: &HttpReply) -> Result<()> {
        self.require_state(PairingState::Idle)?;

        if !reply.is_success() {
            return Err(self.fail(reply.rejection()));
        }

        let parsed: PairRequestReply = match serde_json::from_str(&reply.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(self.fail(ControlError::MalformedResponse(format!(
                    "unexpected /pair/request response ({}): {}",
                    e,
                    trim_body(&reply.body)
                ))))
            }
        };

        let (Some(timestamp), Some(auth_key)) = (
            parsed.timestamp.and_then(Scalar::into_text),
            parsed.auth_key.and_then(Scalar::into_text),
        ) else {
            return Err(self.fail(ControlError::MalformedResponse(format!(
                "/pair/request response missing timestamp or auth_key: {}",
                trim_body(&reply.body)
            ))));
        };

        debug!(device_id = %self.device_id, timestamp = %timestamp, "Pair request accepted");
        self.timestamp = Some(timestamp);
        self.intermediate_auth_key = Some(auth_key);
        self.state = PairingState::RequestSent;
        Ok(())
    }

    /// `RequestSent → AwaitingPin`
    ///
    /// A missing or blank PIN cancels the attempt.
    pub fn supply_pin(&mut self, pin: Option<String>) -> Result<()> {
        self.require_state(PairingState::RequestSent)?;

        match pin.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
            Some(pin) => {
                self.pin = Some(pin);
                self.state = PairingState::AwaitingPin;
                Ok(())
            }
            None => Err(self.fail(ControlError::Cancelled)),
        }
    }

    /// Body for `POST /6/pair/grant`
    pub fn grant_body(&self) -> Result<Value> {
        self.require_state(PairingState::AwaitingPin)?;
        let (timestamp, pin) = self.timestamp_and_pin()?;

        Ok(json!({
            "auth": {
                "auth_AppId": GRANT_APP_ID,
                "pin": pin,
                "auth_timestamp": timestamp,
                "auth_signature": sign(timestamp, pin)?,
            },
            "device": self.descriptor.to_json(&self.device_id),
        }))
    }

    /// `AwaitingPin → Granted`, or `Failed` on any non-2xx reply
    ///
    /// On success the intermediate auth key becomes the long-lived secret.
    pub(crate) fn accept_grant_reply(&mut self, reply: &HttpReply, host: &str) -> Result<DeviceCredential> {
        self.require_state(PairingState::AwaitingPin)?;

        if !reply.is_success() {
            return Err(self.fail(reply.rejection()));
        }

        let secret = self
            .intermediate_auth_key
            .clone()
            .ok_or_else(|| ControlError::MalformedResponse("no auth key in session".to_string()))?;

        self.state = PairingState::Granted;
        info!(host = %host, device_id = %self.device_id, "Pairing granted");

        Ok(DeviceCredential {
            manufacturer: Manufacturer::JointSpace,
            host: host.to_string(),
            auth_principal: Some(self.device_id.clone()),
            auth_secret: Some(secret),
            paired_at: Some(Utc::now()),
        })
    }

    /// Mark the session failed and hand back the error
    pub fn fail(&mut self, err: ControlError) -> ControlError {
        debug!(device_id = %self.device_id, from = %self.state, error = %err, "Pairing failed");
        self.state = PairingState::Failed;
        err
    }

    fn require_state(&self, state: PairingState) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(ControlError::InvalidConfig(format!(
                "pairing step requires state {} but session is {}",
                state, self.state
            )))
        }
    }

    fn timestamp_and_pin(&self) -> Result<(&str, &str)> {
        match (self.timestamp.as_deref(), self.pin.as_deref()) {
            (Some(ts), Some(pin)) => Ok((ts, pin)),
            _ => Err(ControlError::InvalidConfig(
                "pairing session missing timestamp or PIN".to_string(),
            )),
        }
    }
}

/// `timestamp` / `auth_key` arrive as strings or numbers depending on firmware
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        let text = match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct PairRequestReply {
    timestamp: Option<Scalar>,
    auth_key: Option<Scalar>,
}

/// Sign `timestamp + pin` with the vendor secret
///
/// `base64(HMAC-SHA1(secret, utf8(timestamp + pin)))`
pub fn sign(timestamp: &str, pin: &str) -> Result<String> {
    let secret = STANDARD
        .decode(SHARED_SECRET_B64)
        .map_err(|e| ControlError::InvalidConfig(format!("bad shared secret: {}", e)))?;
    sign_with_secret(&secret, timestamp, pin)
}

/// Sign `timestamp + pin` with an explicit secret
pub fn sign_with_secret(secret: &[u8], timestamp: &str, pin: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| ControlError::InvalidConfig(format!("bad HMAC key: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(pin.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Random alphanumeric device id
pub fn generate_device_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DEVICE_ID_LEN)
        .map(char::from)
        .collect()
}
