//! Subcommand implementations

pub mod control;
pub mod pair;
pub mod wake;

use clap::Args;
use color_eyre::eyre::{eyre, Result};
use tracing::{debug, warn};
use tvwake_control::{
    Cancelled, ConnectionParams, DeviceRecord, Manufacturer, Outcome, PluginFactory, TlsPolicy,
    TvPlugin,
};

/// Target TV, overriding the device record
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// TV IP address or host name
    #[arg(long, global = true)]
    pub ip: Option<String>,

    /// TV family: philips or sony
    #[arg(long, global = true)]
    pub manufacturer: Option<String>,

    /// Control port (defaults to the manufacturer's standard port)
    #[arg(long = "tv-port", global = true)]
    pub tv_port: Option<u16>,

    /// JointSPACE Digest user (the paired device id)
    #[arg(long = "device-id", visible_alias = "user", global = true)]
    pub device_id: Option<String>,

    /// JointSPACE Digest secret (the paired auth key)
    #[arg(long = "auth-key", visible_alias = "pass", global = true)]
    pub auth_key: Option<String>,

    /// BRAVIA pre-shared key
    #[arg(long, global = true)]
    pub psk: Option<String>,

    /// Verify the TV's TLS certificate (JointSPACE TVs ship self-signed ones)
    #[arg(long, global = true, default_value_t = false)]
    pub verify_tls: bool,
}

impl DeviceArgs {
    /// Fold command-line overrides into the stored record
    pub fn apply(&self, record: &mut DeviceRecord) {
        if let Some(ip) = &self.ip {
            record.ip = Some(ip.clone());
        }
        if let Some(manufacturer) = &self.manufacturer {
            record.manufacturer = Some(manufacturer.clone());
        }
        if let Some(device_id) = &self.device_id {
            record.device_id = Some(device_id.clone());
        }
        if let Some(auth_key) = &self.auth_key {
            record.auth_key = Some(auth_key.clone());
        }
        if let Some(psk) = &self.psk {
            match record.manufacturer() {
                Ok(Some(Manufacturer::JsonRpc)) => record.auth_key = Some(psk.clone()),
                _ => warn!("--psk only applies to Sony BRAVIA TVs; ignoring it"),
            }
        }
    }

    fn tls(&self) -> TlsPolicy {
        if self.verify_tls {
            TlsPolicy::Verify
        } else {
            TlsPolicy::AcceptInvalidCerts
        }
    }
}

/// Build the adapter for the TV described by `record`
///
/// Records without a manufacturer are treated as Philips.
pub fn open_plugin(record: &DeviceRecord, args: &DeviceArgs) -> Result<Box<dyn TvPlugin>> {
    let manufacturer = record.manufacturer()?.unwrap_or(Manufacturer::JointSpace);
    let credential = record.credential(manufacturer)?;
    debug!(manufacturer = %manufacturer, host = %credential.host, "Opening TV");

    let mut params = ConnectionParams::new(credential.host.clone(), args.tls()).with_credential(credential);
    if let Some(port) = args.tv_port {
        params = params.with_port(port);
    }
    Ok(PluginFactory::new().create(manufacturer, params)?)
}

/// Turn a cancelled outcome into a command failure
pub fn finished<T>(outcome: Outcome<T>) -> Result<T> {
    outcome.map_err(|Cancelled| eyre!("Interrupted"))
}
