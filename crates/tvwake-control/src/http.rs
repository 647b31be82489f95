//! HTTP transport shared by the TV adapters

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::digest::DigestChallenge;
use crate::error::{ControlError, Result};
use crate::types::TlsPolicy;

/// Longest response excerpt carried in error messages
const MAX_BODY_EXCERPT: usize = 300;

/// Build a client with a fixed timeout and TLS policy
pub(crate) fn build_client(timeout: Duration, tls: TlsPolicy) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(tls.accepts_invalid_certs())
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ControlError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

/// Race a request against the caller's cancellation token
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ControlError::Cancelled),
        result = fut => result,
    }
}

/// Status code and body text of a completed exchange
#[derive(Debug, Clone)]
pub(crate) struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn status_line(&self) -> String {
        status_line(self.status)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Non-success reply as an error
    pub fn error(&self) -> ControlError {
        ControlError::Http {
            status: self.status_line(),
            body: trim_body(&self.body),
        }
    }

    /// Non-success reply during pairing as an error
    pub fn rejection(&self) -> ControlError {
        ControlError::PairingRejected {
            status: self.status_line(),
            body: trim_body(&self.body),
        }
    }
}

/// `401 Unauthorized` style status line
pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Strip markup and line breaks from a response body for error messages
pub(crate) fn trim_body(body: &str) -> String {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if in_tag => {}
            _ => text.push(c),
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_BODY_EXCERPT {
        let cut: String = collapsed.chars().take(MAX_BODY_EXCERPT).collect();
        format!("{}...", cut)
    } else {
        collapsed
    }
}

/// Send a request once and collect the reply
pub(crate) async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
    headers: &[(&'static str, &str)],
) -> Result<HttpReply> {
    let mut request = client.request(method, url).header(ACCEPT, "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    debug!(url = %url, status = %status, "HTTP exchange complete");

    Ok(HttpReply { status, body })
}

/// Username/password pair for Digest authentication
#[derive(Debug, Clone, Copy)]
pub(crate) struct DigestAuth<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Send a request, answering one Digest challenge if the server issues it
///
/// Returns the reply to the authenticated attempt, or the first reply
/// when the server did not ask for Digest credentials.
pub(crate) async fn send_with_digest(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
    auth: DigestAuth<'_>,
) -> Result<HttpReply> {
    let mut request = client
        .request(method.clone(), url)
        .header(ACCEPT, "application/json");
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await?;
    if response.status() != StatusCode::UNAUTHORIZED {
        let status = response.status();
        let body = response.text().await?;
        return Ok(HttpReply { status, body });
    }

    let challenge = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| DigestChallenge::parse(value).ok());

    let Some(challenge) = challenge else {
        warn!(url = %url, "Server answered 401 without a Digest challenge");
        let status = response.status();
        let body = response.text().await?;
        return Ok(HttpReply { status, body });
    };

    let uri = request_uri(url)?;
    let authorization =
        challenge.authorization(auth.username, auth.password, method.as_str(), &uri)?;
    debug!(url = %url, realm = %challenge.realm, "Answering Digest challenge");

    let mut retry = client
        .request(method, url)
        .header(ACCEPT, "application/json")
        .header(AUTHORIZATION, authorization);
    if let Some(body) = body {
        retry = retry.json(body);
    }

    let response = retry.send().await?;
    let status = response.status();
    let body = response.text().await?;
    debug!(url = %url, status = %status, "Digest-authenticated exchange complete");

    Ok(HttpReply { status, body })
}

/// Path and query of a URL, as used in the Digest `uri` field
fn request_uri(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ControlError::InvalidConfig(format!("invalid URL {}: {}", url, e)))?;
    Ok(match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    })
}
