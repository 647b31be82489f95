//! HTTP Digest access authentication (RFC 7616 / RFC 2617)
//!
//! JointSPACE TVs protect their control API with Digest auth. The client
//! sends the request once, receives a `401` with a `WWW-Authenticate: Digest`
//! challenge, and resends with an `Authorization` header computed here.
//! Each challenge is answered once (nonce count `00000001`); sessions are
//! not kept alive.

use std::fmt;

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{ControlError, Result};

/// Hash algorithm announced by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl DigestAlgorithm {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Ok(DigestAlgorithm::Md5),
            "MD5-SESS" => Ok(DigestAlgorithm::Md5Sess),
            "SHA-256" => Ok(DigestAlgorithm::Sha256),
            "SHA-256-SESS" => Ok(DigestAlgorithm::Sha256Sess),
            other => Err(ControlError::UnsupportedOperation(format!(
                "digest algorithm {}",
                other
            ))),
        }
    }

    fn is_session(self) -> bool {
        matches!(self, DigestAlgorithm::Md5Sess | DigestAlgorithm::Sha256Sess)
    }

    fn hash(self, data: &str) -> String {
        match self {
            DigestAlgorithm::Md5 | DigestAlgorithm::Md5Sess => {
                format!("{:x}", md5::compute(data.as_bytes()))
            }
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha256Sess => {
                format!("{:x}", Sha256::digest(data.as_bytes()))
            }
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Md5Sess => "MD5-sess",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha256Sess => "SHA-256-sess",
        };
        f.write_str(name)
    }
}

/// Parsed `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: DigestAlgorithm,
    /// Offered quality-of-protection values; empty for legacy RFC 2069 servers
    pub qop: Vec<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value
    pub fn parse(header: &str) -> Result<Self> {
        let start = find_digest_scheme(header)
            .ok_or_else(|| ControlError::MalformedResponse(format!("not a digest challenge: {}", header)))?;

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = DigestAlgorithm::default();
        let mut qop = Vec::new();

        for (key, value) in parse_params(&header[start..]) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => algorithm = DigestAlgorithm::parse(&value)?,
                "qop" => {
                    qop = value
                        .split(',')
                        .map(|q| q.trim().to_ascii_lowercase())
                        .filter(|q| !q.is_empty())
                        .collect()
                }
                _ => {}
            }
        }

        Ok(Self {
            realm: realm.unwrap_or_default(),
            nonce: nonce.ok_or_else(|| {
                ControlError::MalformedResponse(format!("digest challenge without nonce: {}", header))
            })?,
            opaque,
            algorithm,
            qop,
        })
    }

    /// Build the `Authorization` header value with a random client nonce
    pub fn authorization(&self, username: &str, password: &str, method: &str, uri: &str) -> Result<String> {
        let cnonce = format!("{:016x}", rand::thread_rng().gen::<u64>());
        self.authorization_with_cnonce(username, password, method, uri, &cnonce)
    }

    /// Build the `Authorization` header value with a caller-chosen client nonce
    pub fn authorization_with_cnonce(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> Result<String> {
        let nc = "00000001";
        let use_qop = if self.qop.is_empty() {
            false
        } else if self.qop.iter().any(|q| q == "auth") {
            true
        } else {
            return Err(ControlError::UnsupportedOperation(format!(
                "digest qop {}",
                self.qop.join(",")
            )));
        };

        let response = self.response(username, password, method, uri, nc, cnonce, use_qop);

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            escape(username),
            escape(&self.realm),
            escape(&self.nonce),
            uri,
            self.algorithm,
            response
        );
        if use_qop {
            header.push_str(&format!(", qop=auth, nc={}, cnonce=\"{}\"", nc, cnonce));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", escape(opaque)));
        }
        Ok(header)
    }

    /// Compute the `response` field
    #[allow(clippy::too_many_arguments)]
    fn response(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nc: &str,
        cnonce: &str,
        use_qop: bool,
    ) -> String {
        let alg = self.algorithm;

        let mut ha1 = alg.hash(&format!("{}:{}:{}", username, self.realm, password));
        if alg.is_session() {
            ha1 = alg.hash(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = alg.hash(&format!("{}:{}", method, uri));

        if use_qop {
            alg.hash(&format!("{}:{}:{}:{}:auth:{}", ha1, self.nonce, nc, cnonce, ha2))
        } else {
            alg.hash(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Offset just past a `Digest` scheme token
///
/// The token only counts at the start of the value or after a comma that
/// separates challenges, never inside a quoted parameter.
fn find_digest_scheme(header: &str) -> Option<usize> {
    let bytes = header.as_bytes();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut at_boundary = true;

    for (i, &b) in bytes.iter().enumerate() {
        if in_quotes {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => {
                in_quotes = true;
                at_boundary = false;
            }
            b',' => at_boundary = true,
            b' ' | b'\t' => {}
            _ if at_boundary => {
                let rest = &bytes[i..];
                let named_digest = rest.len() > 6
                    && rest[..6].eq_ignore_ascii_case(b"digest")
                    && rest[6].is_ascii_whitespace();
                if named_digest {
                    return Some(i + 7);
                }
                at_boundary = false;
            }
            _ => {}
        }
    }
    None
}

/// Split `key=value, key="quoted, value"` pairs
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if key.is_empty() {
            break;
        }

        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.peek() != Some(&'=') {
            params.push((key.to_ascii_lowercase(), String::new()));
            continue;
        }
        chars.next();
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.push((key.to_ascii_lowercase(), value));
    }

    params
}
