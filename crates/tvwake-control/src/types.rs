//! Common types for TV control operations

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{ControlError, Result};

/// Default Wake-on-LAN destination port
pub const DEFAULT_WOL_PORT: u16 = 9;

/// Supported TV families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Manufacturer {
    /// Philips Android TVs speaking JointSPACE v6 (challenge/response pairing)
    JointSpace,
    /// Sony BRAVIA TVs speaking JSON-RPC with a pre-shared key
    JsonRpc,
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Manufacturer::JointSpace => write!(f, "Philips"),
            Manufacturer::JsonRpc => write!(f, "Sony"),
        }
    }
}

impl FromStr for Manufacturer {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "philips" | "jointspace" => Ok(Manufacturer::JointSpace),
            "sony" | "bravia" | "jsonrpc" => Ok(Manufacturer::JsonRpc),
            other => Err(ControlError::InvalidConfig(format!(
                "unknown manufacturer: {}",
                other
            ))),
        }
    }
}

/// Power state reported by a TV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerStatus {
    /// State could not be determined
    #[default]
    Unknown,
    /// Fully off (not reachable on the network)
    Off,
    /// Screen on
    On,
    /// Network standby
    Standby,
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerStatus::Unknown => write!(f, "unknown"),
            PowerStatus::Off => write!(f, "off"),
            PowerStatus::On => write!(f, "on"),
            PowerStatus::Standby => write!(f, "standby"),
        }
    }
}

/// Snapshot of TV state, recomputed on every query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TvState {
    pub power: PowerStatus,
    pub input: Option<String>,
    pub volume: Option<i64>,
}

impl TvState {
    /// State with only the power field known
    pub fn with_power(power: PowerStatus) -> Self {
        Self {
            power,
            ..Default::default()
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

/// TLS certificate handling for HTTPS control endpoints
///
/// TVs ship self-signed certificates, so pairing against real hardware
/// normally needs [`TlsPolicy::AcceptInvalidCerts`]. There is no default;
/// callers pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Validate the certificate chain and hostname
    Verify,
    /// Skip certificate validation (self-signed local devices)
    AcceptInvalidCerts,
}

impl TlsPolicy {
    pub fn accepts_invalid_certs(self) -> bool {
        matches!(self, TlsPolicy::AcceptInvalidCerts)
    }
}

/// Credential used for authenticated calls
///
/// For JointSPACE the principal is the device id and the secret is the
/// digest password obtained during pairing. For JSON-RPC the secret is the
/// pre-shared key and there is no principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCredential {
    pub manufacturer: Manufacturer,
    pub host: String,
    pub auth_principal: Option<String>,
    pub auth_secret: Option<String>,
    pub paired_at: Option<DateTime<Utc>>,
}

impl DeviceCredential {
    /// Empty credential for a host that has not been paired yet
    pub fn empty(manufacturer: Manufacturer, host: impl Into<String>) -> Self {
        Self {
            manufacturer,
            host: host.into(),
            auth_principal: None,
            auth_secret: None,
            paired_at: None,
        }
    }

    /// Credential holding a pre-shared key
    pub fn with_psk(host: impl Into<String>, psk: impl Into<String>) -> Self {
        Self {
            auth_secret: Some(psk.into()),
            ..Self::empty(Manufacturer::JsonRpc, host)
        }
    }

    /// Set the principal (device id / user)
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.auth_principal = Some(principal.into());
        self
    }

    /// Set the secret (digest password / PSK)
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth_secret = Some(secret.into());
        self
    }

    /// Principal, treating blank strings as absent
    pub fn principal(&self) -> Option<&str> {
        non_blank(self.auth_principal.as_deref())
    }

    /// Secret, treating blank strings as absent
    pub fn secret(&self) -> Option<&str> {
        non_blank(self.auth_secret.as_deref())
    }

    /// Whether the credential is complete enough for authenticated calls
    pub fn is_paired(&self) -> bool {
        match self.manufacturer {
            Manufacturer::JointSpace => self.principal().is_some() && self.secret().is_some(),
            Manufacturer::JsonRpc => self.secret().is_some(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Terminal outcome of a pairing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// Credential granted
    Success,
    /// A pre-shared key must be configured on the TV first
    NeedsUserPsk,
    /// A PIN is required but none was supplied
    NeedsUserPin,
    /// The TV refused the request or the PIN
    Rejected,
    /// The TV could not be reached or answered garbage
    NetworkError,
    /// PIN prompt declined or cancellation token fired
    Cancelled,
}

impl fmt::Display for PairingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PairingOutcome::Success => "success",
            PairingOutcome::NeedsUserPsk => "needs user PSK",
            PairingOutcome::NeedsUserPin => "needs user PIN",
            PairingOutcome::Rejected => "rejected",
            PairingOutcome::NetworkError => "network error",
            PairingOutcome::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of [`TvPlugin::pair`](crate::TvPlugin::pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingResult {
    pub outcome: PairingOutcome,
    pub message: Option<String>,
    /// Fresh credential, present only on success
    pub credential: Option<DeviceCredential>,
}

impl PairingResult {
    pub fn success(credential: DeviceCredential) -> Self {
        Self {
            outcome: PairingOutcome::Success,
            message: None,
            credential: Some(credential),
        }
    }

    pub fn needs_user_psk() -> Self {
        Self::failure(
            PairingOutcome::NeedsUserPsk,
            "Enter the pre-shared key configured on the TV",
        )
    }

    pub fn needs_user_pin() -> Self {
        Self::failure(PairingOutcome::NeedsUserPin, "Enter the PIN shown on the TV")
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::failure(PairingOutcome::Rejected, message)
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::failure(PairingOutcome::NetworkError, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::failure(PairingOutcome::Cancelled, message)
    }

    fn failure(outcome: PairingOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: Some(message.into()),
            credential: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PairingOutcome::Success
    }
}

/// Six raw MAC bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = ControlError;

    /// Accepts 12 hex digits with any mix of `:`, `-` and `.` separators
    fn from_str(s: &str) -> Result<Self> {
        let clean: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();

        if clean.len() != 12 || !clean.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ControlError::InvalidMacFormat(format!(
                "{:?} must be 12 hex digits",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&clean[i * 2..i * 2 + 2], 16)
                .map_err(|e| ControlError::InvalidMacFormat(e.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

/// Where and how to send a wake packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeHint {
    pub mac: MacAddress,
    /// Broadcast address (defaults to 255.255.255.255)
    pub broadcast_address: Option<Ipv4Addr>,
    /// UDP port (default 9)
    pub port: u16,
}

impl WakeHint {
    /// Parse the MAC; fails with [`ControlError::InvalidMacFormat`]
    pub fn new(mac: &str) -> Result<Self> {
        Ok(Self {
            mac: mac.parse()?,
            broadcast_address: None,
            port: DEFAULT_WOL_PORT,
        })
    }

    /// Set custom broadcast address
    pub fn with_broadcast(mut self, addr: Ipv4Addr) -> Self {
        self.broadcast_address = Some(addr);
        self
    }

    /// Set custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Broadcast address to use, falling back to the limited broadcast
    pub fn target_address(&self) -> IpAddr {
        IpAddr::V4(self.broadcast_address.unwrap_or(Ipv4Addr::BROADCAST))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturer_parse() {
        assert_eq!("Philips".parse::<Manufacturer>().unwrap(), Manufacturer::JointSpace);
        assert_eq!("jointspace".parse::<Manufacturer>().unwrap(), Manufacturer::JointSpace);
        assert_eq!("SONY".parse::<Manufacturer>().unwrap(), Manufacturer::JsonRpc);
        assert_eq!(" bravia ".parse::<Manufacturer>().unwrap(), Manufacturer::JsonRpc);
        assert!(matches!(
            "lg".parse::<Manufacturer>(),
            Err(ControlError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_manufacturer_display_round_trips() {
        for m in [Manufacturer::JointSpace, Manufacturer::JsonRpc] {
            assert_eq!(m.to_string().parse::<Manufacturer>().unwrap(), m);
        }
    }

    #[test]
    fn test_power_status_display() {
        assert_eq!(PowerStatus::On.to_string(), "on");
        assert_eq!(PowerStatus::Standby.to_string(), "standby");
        assert_eq!(PowerStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_mac_separators() {
        let expected = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        for input in [
            "aa:bb:cc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "aabb.ccdd.eeff",
            "aabbccddeeff",
            "aa:bb-cc.dd:eeff",
        ] {
            let mac: MacAddress = input.parse().unwrap();
            assert_eq!(mac.octets(), expected, "input {}", input);
        }
    }

    #[test]
    fn test_mac_invalid() {
        for input in ["", "aa:bb:cc", "aa:bb:cc:dd:ee:ff:00", "aa:bb:cc:dd:ee:gg", "aa bb cc dd ee ff"] {
            assert!(
                matches!(input.parse::<MacAddress>(), Err(ControlError::InvalidMacFormat(_))),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_mac_display() {
        let mac: MacAddress = "001122AABBCC".parse().unwrap();
        assert_eq!(mac.to_string(), "00:11:22:aa:bb:cc");
    }

    #[test]
    fn test_wake_hint_defaults() {
        let hint = WakeHint::new("00:11:22:33:44:55").unwrap();
        assert_eq!(hint.port, 9);
        assert_eq!(hint.target_address(), IpAddr::V4(Ipv4Addr::BROADCAST));

        let hint = hint
            .with_broadcast(Ipv4Addr::new(192, 168, 1, 255))
            .with_port(7);
        assert_eq!(hint.port, 7);
        assert_eq!(
            hint.target_address(),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 255))
        );
    }

    #[test]
    fn test_credential_is_paired() {
        let cred = DeviceCredential::empty(Manufacturer::JointSpace, "10.0.0.2");
        assert!(!cred.is_paired());

        let cred = cred.with_principal("dev").with_secret("  ");
        assert!(!cred.is_paired());

        let cred = cred.with_secret("key");
        assert!(cred.is_paired());

        assert!(DeviceCredential::with_psk("10.0.0.3", "0000").is_paired());
        assert!(!DeviceCredential::with_psk("10.0.0.3", "").is_paired());
    }

    #[test]
    fn test_pairing_result_constructors() {
        assert_eq!(PairingResult::needs_user_psk().outcome, PairingOutcome::NeedsUserPsk);
        assert!(PairingResult::rejected("no").credential.is_none());

        let cred = DeviceCredential::with_psk("tv", "1234");
        let result = PairingResult::success(cred.clone());
        assert!(result.is_success());
        assert_eq!(result.credential, Some(cred));
    }
}
