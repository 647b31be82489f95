//! Adapter selection by manufacturer
//!
//! Resolving a plugin is pure construction: no request is sent until the
//! caller invokes an operation on the returned adapter.

use tracing::debug;

use crate::error::{ControlError, Result};
use crate::jointspace::{JointSpaceAdapter, JointSpaceConfig};
use crate::jsonrpc::{JsonRpcAdapter, JsonRpcConfig};
use crate::plugin::TvPlugin;
use crate::types::{DeviceCredential, Manufacturer, TlsPolicy};

/// Where a TV lives and what we already know about it
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    /// Overrides the adapter's default port
    pub port: Option<u16>,
    /// Stored credential, or `None` for a TV that has never been paired
    pub credential: Option<DeviceCredential>,
    /// Certificate policy for HTTPS adapters
    pub tls: TlsPolicy,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, tls: TlsPolicy) -> Self {
        Self {
            host: host.into(),
            port: None,
            credential: None,
            tls,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credential(mut self, credential: DeviceCredential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// Maps a manufacturer to its adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct PluginFactory;

impl PluginFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build an adapter bound to `params`
    ///
    /// A stored credential for a different manufacturer is rejected with
    /// [`ControlError::InvalidConfig`].
    pub fn create(&self, manufacturer: Manufacturer, params: ConnectionParams) -> Result<Box<dyn TvPlugin>> {
        let credential = match params.credential {
            Some(credential) if credential.manufacturer != manufacturer => {
                return Err(ControlError::InvalidConfig(format!(
                    "credential for {} cannot drive a {} adapter",
                    credential.manufacturer, manufacturer
                )));
            }
            Some(credential) => credential,
            None => DeviceCredential::empty(manufacturer, params.host.clone()),
        };

        debug!(
            manufacturer = %manufacturer,
            host = %params.host,
            paired = credential.is_paired(),
            "Creating TV plugin"
        );

        match manufacturer {
            Manufacturer::JointSpace => {
                let mut config = JointSpaceConfig::new(params.host, params.tls);
                if let Some(port) = params.port {
                    config = config.with_port(port);
                }
                Ok(Box::new(JointSpaceAdapter::new(config, credential)?))
            }
            Manufacturer::JsonRpc => {
                let mut config = JsonRpcConfig::new(params.host);
                if let Some(port) = params.port {
                    config = config.with_port(port);
                }
                Ok(Box::new(JsonRpcAdapter::new(config, credential)?))
            }
        }
    }

    /// Same as [`create`](Self::create), taking a manufacturer tag such as
    /// `"philips"` or `"sony"`
    pub fn create_from_tag(&self, tag: &str, params: ConnectionParams) -> Result<Box<dyn TvPlugin>> {
        self.create(tag.parse()?, params)
    }
}
