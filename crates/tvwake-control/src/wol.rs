//! Wake-on-LAN implementation
//!
//! Wake-on-LAN sends a "magic packet" that powers on a sleeping device's
//! network interface. Delivery is best effort: a successful send only means
//! the datagram left this host.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{ControlError, Result};
use crate::types::{MacAddress, WakeHint};

/// Magic packet length: 6 bytes of 0xFF plus 16 copies of the MAC
pub const MAGIC_PACKET_LEN: usize = 102;

/// Build the magic packet for a MAC address string
///
/// Fails with [`ControlError::InvalidMacFormat`] unless the input
/// normalizes to exactly 12 hex digits.
pub fn build_packet(mac: &str) -> Result<[u8; MAGIC_PACKET_LEN]> {
    let mac: MacAddress = mac.parse()?;
    Ok(magic_packet(mac))
}

/// Build the magic packet for an already parsed MAC address
///
/// Magic packet format:
/// - 6 bytes of 0xFF
/// - Target MAC repeated 16 times (96 bytes)
/// - Total: 102 bytes
pub fn magic_packet(mac: MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
    let octets = mac.octets();

    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&octets);
    }

    packet
}

/// Send a packet once on a broadcast-enabled UDP socket
pub async fn send(packet: &[u8], broadcast_address: IpAddr, port: u16) -> Result<()> {
    let bind_addr = match broadcast_address {
        IpAddr::V4(_) => "0.0.0.0:0",
        IpAddr::V6(_) => "[::]:0",
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| ControlError::NetworkUnreachable(e.to_string()))?;

    socket
        .set_broadcast(true)
        .map_err(|e| ControlError::NetworkUnreachable(e.to_string()))?;

    let target = SocketAddr::new(broadcast_address, port);
    let sent = socket
        .send_to(packet, target)
        .await
        .map_err(|e| ControlError::NetworkUnreachable(e.to_string()))?;

    debug!(target = %target, bytes = sent, "Wake-on-LAN packet sent");
    Ok(())
}

/// Derive the /24 directed broadcast address for a host
///
/// `192.168.1.37` becomes `192.168.1.255`.
pub fn directed_broadcast(host: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = host.octets();
    Ipv4Addr::new(a, b, c, 255)
}

/// Magic packet sender bound to a wake hint
#[derive(Debug, Clone)]
pub struct WakeSignal {
    hint: WakeHint,
}

impl WakeSignal {
    pub fn new(hint: WakeHint) -> Self {
        Self { hint }
    }

    /// Create from MAC address string with default broadcast and port
    pub fn from_mac(mac: &str) -> Result<Self> {
        Ok(Self::new(WakeHint::new(mac)?))
    }

    pub fn hint(&self) -> &WakeHint {
        &self.hint
    }

    pub fn packet(&self) -> [u8; MAGIC_PACKET_LEN] {
        magic_packet(self.hint.mac)
    }

    /// Send the packet once
    pub async fn send(&self) -> Result<()> {
        send(&self.packet(), self.hint.target_address(), self.hint.port).await
    }
}
