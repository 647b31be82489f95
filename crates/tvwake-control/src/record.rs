//! Persisted device record
//!
//! The on-disk shape shared with other tools that manage the same TV.
//! Field names are snake_case; the camelCase spellings are accepted on read.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::types::{DeviceCredential, Manufacturer, WakeHint};
use crate::wol::directed_broadcast;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// JointSPACE digest principal
    #[serde(default, alias = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// JointSPACE digest secret, or the BRAVIA pre-shared key
    #[serde(default, alias = "authKey", skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, alias = "pairedAt", skip_serializing_if = "Option::is_none")]
    pub paired_at: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    /// Parsed manufacturer tag, if one is recorded
    pub fn manufacturer(&self) -> Result<Option<Manufacturer>> {
        match non_blank(&self.manufacturer) {
            Some(tag) => Ok(Some(tag.parse()?)),
            None => Ok(None),
        }
    }

    /// TV address; fails with [`ControlError::InvalidConfig`] when unset
    pub fn host(&self) -> Result<&str> {
        non_blank(&self.ip).ok_or_else(|| ControlError::InvalidConfig("no TV address configured".to_string()))
    }

    /// Credential for `manufacturer` built from the stored fields
    pub fn credential(&self, manufacturer: Manufacturer) -> Result<DeviceCredential> {
        let mut credential = DeviceCredential::empty(manufacturer, self.host()?);
        if manufacturer == Manufacturer::JointSpace {
            credential.auth_principal = non_blank(&self.device_id).map(str::to_string);
        }
        credential.auth_secret = non_blank(&self.auth_key).map(str::to_string);
        credential.paired_at = self.paired_at;
        Ok(credential)
    }

    /// Copy a freshly granted credential into the record
    pub fn apply_credential(&mut self, credential: &DeviceCredential) {
        self.ip = Some(credential.host.clone());
        self.manufacturer = Some(credential.manufacturer.to_string());
        if credential.manufacturer == Manufacturer::JointSpace {
            self.device_id = credential.auth_principal.clone();
        }
        self.auth_key = credential.auth_secret.clone();
        if credential.paired_at.is_some() {
            self.paired_at = credential.paired_at;
        }
    }

    /// Wake target from the stored MAC
    ///
    /// With no explicit broadcast address, an IPv4 `ip` yields its `/24`
    /// directed broadcast.
    pub fn wake_hint(&self) -> Result<WakeHint> {
        let mac = non_blank(&self.mac)
            .ok_or_else(|| ControlError::InvalidConfig("no MAC address configured".to_string()))?;
        let hint = WakeHint::new(mac)?;
        Ok(match non_blank(&self.ip).and_then(|ip| ip.parse::<Ipv4Addr>().ok()) {
            Some(ip) => hint.with_broadcast(directed_broadcast(ip)),
            None => hint,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MacAddress;

    #[test]
    fn test_accepts_both_spellings() {
        let snake: DeviceRecord = serde_json::from_str(
            r#"{"ip":"192.168.1.40","device_id":"abc","auth_key":"secret","manufacturer":"Philips"}"#,
        )
        .unwrap();
        let camel: DeviceRecord = serde_json::from_str(
            r#"{"ip":"192.168.1.40","deviceId":"abc","authKey":"secret","manufacturer":"Philips"}"#,
        )
        .unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake.device_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_writes_snake_case_only_set_fields() {
        let record = DeviceRecord {
            ip: Some("10.0.0.5".to_string()),
            auth_key: Some("k".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({ "ip": "10.0.0.5", "auth_key": "k" }));
    }

    #[test]
    fn test_empty_object_is_empty_record() {
        let record: DeviceRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, DeviceRecord::default());
        assert!(record.manufacturer().unwrap().is_none());
        assert!(matches!(record.host(), Err(ControlError::InvalidConfig(_))));
    }

    #[test]
    fn test_jointspace_credential() {
        let record = DeviceRecord {
            ip: Some("192.168.1.40".to_string()),
            device_id: Some("abcdEFGH12345678".to_string()),
            auth_key: Some("intermediate".to_string()),
            manufacturer: Some("philips".to_string()),
            ..Default::default()
        };
        let manufacturer = record.manufacturer().unwrap().unwrap();
        let credential = record.credential(manufacturer).unwrap();
        assert_eq!(credential.manufacturer, Manufacturer::JointSpace);
        assert_eq!(credential.principal(), Some("abcdEFGH12345678"));
        assert_eq!(credential.secret(), Some("intermediate"));
        assert!(credential.is_paired());
    }

    #[test]
    fn test_jsonrpc_credential_ignores_device_id() {
        let record = DeviceRecord {
            ip: Some("192.168.1.41".to_string()),
            device_id: Some("leftover".to_string()),
            auth_key: Some("0000".to_string()),
            ..Default::default()
        };
        let credential = record.credential(Manufacturer::JsonRpc).unwrap();
        assert_eq!(credential.principal(), None);
        assert_eq!(credential.secret(), Some("0000"));
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let record = DeviceRecord {
            ip: Some("tv".to_string()),
            device_id: Some("  ".to_string()),
            auth_key: Some(String::new()),
            manufacturer: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(record.manufacturer().unwrap().is_none());
        assert!(!record.credential(Manufacturer::JointSpace).unwrap().is_paired());
    }

    #[test]
    fn test_apply_credential() {
        let mut record = DeviceRecord {
            mac: Some("aa:bb:cc:dd:ee:ff".to_string()),
            ..Default::default()
        };
        let credential = DeviceCredential::empty(Manufacturer::JointSpace, "192.168.1.40")
            .with_principal("dev")
            .with_secret("key");
        record.apply_credential(&credential);

        assert_eq!(record.ip.as_deref(), Some("192.168.1.40"));
        assert_eq!(record.manufacturer.as_deref(), Some("Philips"));
        assert_eq!(record.device_id.as_deref(), Some("dev"));
        assert_eq!(record.auth_key.as_deref(), Some("key"));
        assert_eq!(record.mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(record.credential(Manufacturer::JointSpace).unwrap(), credential);
    }

    #[test]
    fn test_wake_hint_uses_directed_broadcast() {
        let record = DeviceRecord {
            ip: Some("192.168.1.40".to_string()),
            mac: Some("AA-BB-CC-DD-EE-FF".to_string()),
            ..Default::default()
        };
        let hint = record.wake_hint().unwrap();
        assert_eq!(hint.mac, MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(hint.broadcast_address, Some(Ipv4Addr::new(192, 168, 1, 255)));
        assert_eq!(hint.port, 9);
    }

    #[test]
    fn test_wake_hint_without_mac() {
        assert!(matches!(
            DeviceRecord::default().wake_hint(),
            Err(ControlError::InvalidConfig(_))
        ));

        let bad = DeviceRecord {
            mac: Some("zz".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.wake_hint(), Err(ControlError::InvalidMacFormat(_))));
    }
}
