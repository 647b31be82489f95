//! TV power control
//!
//! This crate wakes network TVs and drives their local control APIs
//! (standby, power state, remote keys, app launch).
//!
//! # Supported Protocols
//!
//! - **JointSPACE v6**: Philips Android TVs. PIN pairing signed with
//!   HMAC-SHA1, then HTTP Digest auth on every call
//! - **JSON-RPC**: Sony BRAVIA TVs authenticated with a pre-shared key
//! - **Wake-on-LAN**: magic packet broadcast, used by both adapters to power on
//!
//! # Example
//!
//! ```
//! use tvwake_control::{wol, WakeSignal};
//!
//! # fn example() -> tvwake_control::error::Result<()> {
//! let signal = WakeSignal::from_mac("aa:bb:cc:dd:ee:ff")?;
//! let packet = signal.packet();
//! assert_eq!(packet.len(), wol::MAGIC_PACKET_LEN);
//! assert_eq!(&packet[..6], &[0xff; 6]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Adapter Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use tvwake_control::{
//!     ConnectionParams, DeviceCredential, Manufacturer, PluginFactory, TlsPolicy,
//! };
//!
//! # async fn example() -> tvwake_control::error::Result<()> {
//! let params = ConnectionParams::new("192.168.1.41", TlsPolicy::Verify)
//!     .with_credential(DeviceCredential::with_psk("192.168.1.41", "0000"));
//! let tv = PluginFactory::new().create(Manufacturer::JsonRpc, params)?;
//!
//! let cancel = CancellationToken::new();
//! if let Ok(state) = tv.get_state(&cancel).await {
//!     println!("power: {}", state.power);
//! }
//! # Ok(())
//! # }
//! ```

pub mod digest;
pub mod error;
pub mod factory;
mod http;
pub mod jointspace;
pub mod jsonrpc;
pub mod plugin;
pub mod record;
pub mod types;
pub mod wol;

pub use error::{Cancelled, ControlError, Outcome, Result};
pub use factory::{ConnectionParams, PluginFactory};
pub use jointspace::{JointSpaceAdapter, JointSpaceConfig};
pub use jsonrpc::{JsonRpcAdapter, JsonRpcConfig};
pub use plugin::{FixedPin, NoPrompt, PinPrompt, TvOperation, TvPlugin};
pub use record::DeviceRecord;
pub use types::{
    DeviceCredential, MacAddress, Manufacturer, PairingOutcome, PairingResult, PowerStatus,
    TlsPolicy, TvState, WakeHint,
};
pub use wol::WakeSignal;
