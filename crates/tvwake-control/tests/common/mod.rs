//! In-process fake TVs for adapter integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tvwake_control::digest::DigestChallenge;
use tvwake_control::jointspace::pairing::sign;

pub const REALM: &str = "XTV";
pub const NONCE: &str = "7c1f4a0e9b2d";
pub const AUTH_KEY: &str = "d8b0c1f4e2a3";
pub const TIMESTAMP: u64 = 1_700_000_000;

/// Serve `router` on an ephemeral loopback port
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A loopback port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn challenge_header() -> String {
    format!(r#"Digest realm="{}", nonce="{}", qop="auth", algorithm=MD5"#, REALM, NONCE)
}

fn quoted_param(header: &str, name: &str) -> Option<String> {
    let marker = format!("{}=\"", name);
    let start = header.find(&marker)? + marker.len();
    let end = header[start..].find('"')?;
    Some(header[start..start + end].to_string())
}

/// Recompute the expected `Authorization` value from the client's cnonce
fn digest_ok(headers: &HeaderMap, username: &str, password: &str, method: &str, uri: &str) -> bool {
    let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(cnonce) = quoted_param(value, "cnonce") else {
        return false;
    };
    DigestChallenge::parse(&challenge_header())
        .and_then(|c| c.authorization_with_cnonce(username, password, method, uri, &cnonce))
        .map(|expected| expected == value)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, challenge_header())],
        "<html><body><h1>401 Unauthorized</h1></body></html>",
    )
        .into_response()
}

/// JointSPACE v6 behaviour
#[derive(Debug, Default)]
pub struct JointSpaceTv {
    pub numeric_timestamp: bool,
    pub reject_grant: bool,
    pub pin: String,
    pub powerstate: String,
    pub device_id: Mutex<Option<String>>,
    pub grant_bodies: Mutex<Vec<Value>>,
    pub keys: Mutex<Vec<String>>,
    pub hits: Mutex<Vec<String>>,
}

impl JointSpaceTv {
    pub fn new(pin: &str) -> Self {
        Self {
            pin: pin.to_string(),
            powerstate: "On".to_string(),
            ..Default::default()
        }
    }

    /// Pretend a previous pairing already registered `device_id`
    pub fn paired(self, device_id: &str) -> Self {
        *self.device_id.lock().unwrap() = Some(device_id.to_string());
        self
    }

    fn hit(&self, what: &str) {
        self.hits.lock().unwrap().push(what.to_string());
    }

    fn authorized(&self, headers: &HeaderMap, method: &str, uri: &str) -> bool {
        match self.device_id.lock().unwrap().as_deref() {
            Some(device_id) => digest_ok(headers, device_id, AUTH_KEY, method, uri),
            None => false,
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/6/system", get(js_system))
            .route("/6/pair/request", post(js_pair_request))
            .route("/6/pair/grant", post(js_pair_grant))
            .route("/6/powerstate", get(js_powerstate))
            .route("/6/audio/volume", get(js_volume))
            .route("/6/input/key", post(js_key))
            .with_state(self)
    }
}

async fn js_system(State(tv): State<Arc<JointSpaceTv>>) -> Json<Value> {
    tv.hit("system");
    Json(json!({ "name": "Fake 55OLED", "api_version": { "Major": 6 } }))
}

async fn js_pair_request(State(tv): State<Arc<JointSpaceTv>>, Json(body): Json<Value>) -> Response {
    tv.hit("pair/request");
    let Some(device_id) = body["device"]["id"].as_str() else {
        return (StatusCode::BAD_REQUEST, "missing device id").into_response();
    };
    *tv.device_id.lock().unwrap() = Some(device_id.to_string());

    let timestamp = if tv.numeric_timestamp {
        json!(TIMESTAMP)
    } else {
        json!(TIMESTAMP.to_string())
    };
    Json(json!({
        "error_id": "SUCCESS",
        "error_text": "Authorization required",
        "auth_key": AUTH_KEY,
        "timestamp": timestamp,
        "timeout": 60,
    }))
    .into_response()
}

async fn js_pair_grant(
    State(tv): State<Arc<JointSpaceTv>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    tv.hit("pair/grant");
    if !tv.authorized(&headers, "POST", "/6/pair/grant") {
        return unauthorized();
    }
    tv.grant_bodies.lock().unwrap().push(body.clone());

    let expected = sign(&TIMESTAMP.to_string(), &tv.pin).unwrap();
    if tv.reject_grant || body["auth"]["auth_signature"] != json!(expected) {
        return (StatusCode::UNAUTHORIZED, "<p>Pairing denied</p>").into_response();
    }
    Json(json!({ "error_id": "SUCCESS", "error_text": "Pairing completed" })).into_response()
}

async fn js_powerstate(State(tv): State<Arc<JointSpaceTv>>, headers: HeaderMap) -> Response {
    tv.hit("powerstate");
    if !tv.authorized(&headers, "GET", "/6/powerstate") {
        return unauthorized();
    }
    Json(json!({ "powerstate": tv.powerstate })).into_response()
}

async fn js_volume(State(tv): State<Arc<JointSpaceTv>>, headers: HeaderMap) -> Response {
    tv.hit("audio/volume");
    if !tv.authorized(&headers, "GET", "/6/audio/volume") {
        return unauthorized();
    }
    Json(json!({ "muted": false, "current": 17, "min": 0, "max": 60 })).into_response()
}

async fn js_key(State(tv): State<Arc<JointSpaceTv>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    tv.hit("input/key");
    if !tv.authorized(&headers, "POST", "/6/input/key") {
        return unauthorized();
    }
    match body["key"].as_str() {
        Some(key) => {
            tv.keys.lock().unwrap().push(key.to_string());
            StatusCode::OK.into_response()
        }
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// BRAVIA JSON-RPC behaviour
#[derive(Debug, Default)]
pub struct BraviaTv {
    pub psk: String,
    /// Value of `result[0].status` for getPowerStatus
    pub power_status: String,
    /// Answer every call with a JSON-RPC error member
    pub rpc_error: bool,
    /// Acknowledge set* calls with a bare `200 OK` text body
    pub plain_ack: bool,
    /// Hold every reply this long
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<(String, String, Value)>>,
}

impl BraviaTv {
    pub fn new(psk: &str, power_status: &str) -> Self {
        Self {
            psk: psk.to_string(),
            power_status: power_status.to_string(),
            ..Default::default()
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/sony/system", post(bravia_system))
            .route("/sony/appControl", post(bravia_app_control))
            .with_state(self)
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, m, _)| m.clone()).collect()
    }

    fn check(&self, endpoint: &str, headers: &HeaderMap, body: &Value) -> Result<String, Response> {
        let method = body["method"].as_str().unwrap_or_default().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), method.clone(), body.clone()));

        let psk = headers.get("X-Auth-PSK").and_then(|v| v.to_str().ok());
        if psk != Some(self.psk.as_str()) {
            return Err((StatusCode::FORBIDDEN, "Forbidden").into_response());
        }
        if body["version"] != "1.0" || body["id"] != 1 {
            return Err((StatusCode::BAD_REQUEST, "bad envelope").into_response());
        }
        if self.rpc_error {
            return Err(Json(json!({ "error": [40005, "Display Is Turned off"], "id": 1 })).into_response());
        }
        Ok(method)
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

async fn bravia_system(State(tv): State<Arc<BraviaTv>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let method = match tv.check("system", &headers, &body) {
        Ok(method) => method,
        Err(response) => return response,
    };
    tv.stall().await;
    match method.as_str() {
        "getPowerStatus" => Json(json!({ "result": [{ "status": tv.power_status }], "id": 1 })).into_response(),
        "setPowerStatus" if body["params"][0]["status"] == false && tv.plain_ack => {
            (StatusCode::OK, "OK").into_response()
        }
        "setPowerStatus" if body["params"][0]["status"] == false => {
            Json(json!({ "result": [], "id": 1 })).into_response()
        }
        _ => Json(json!({ "error": [12, "No Such Method"], "id": 1 })).into_response(),
    }
}

async fn bravia_app_control(
    State(tv): State<Arc<BraviaTv>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = match tv.check("appControl", &headers, &body) {
        Ok(method) => method,
        Err(response) => return response,
    };
    tv.stall().await;
    match (method.as_str(), body["params"][0]["uri"].as_str()) {
        ("setActiveApp", Some(uri)) if !uri.is_empty() && tv.plain_ack => (StatusCode::OK, "OK").into_response(),
        ("setActiveApp", Some(uri)) if !uri.is_empty() => Json(json!({ "result": [], "id": 1 })).into_response(),
        _ => Json(json!({ "error": [3, "Illegal Argument"], "id": 1 })).into_response(),
    }
}
