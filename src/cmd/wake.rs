//! `tvwake wake`: broadcast a magic packet

use std::net::Ipv4Addr;

use clap::Args;
use color_eyre::eyre::{eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tvwake_control::{ControlError, DeviceRecord, WakeHint, WakeSignal};

#[derive(Args, Debug, Clone)]
pub struct WakeArgs {
    /// TV MAC address (aa:bb:cc:dd:ee:ff, aa-bb-..., or 12 hex digits)
    #[arg(long)]
    pub mac: Option<String>,

    /// Broadcast address (defaults to the TV's /24 broadcast, or 255.255.255.255)
    #[arg(long)]
    pub bcast: Option<Ipv4Addr>,

    /// UDP port
    #[arg(long)]
    pub port: Option<u16>,
}

/// Work out where to send the packet
pub fn wake_hint(args: &WakeArgs, record: &DeviceRecord) -> Result<WakeHint> {
    let mut record = record.clone();
    if let Some(mac) = &args.mac {
        record.mac = Some(mac.clone());
    }

    let mut hint = record.wake_hint().map_err(|e| match e {
        ControlError::InvalidConfig(_) => {
            eyre!("No MAC address: pass --mac or add \"mac\" to the device record")
        }
        other => other.into(),
    })?;
    if let Some(bcast) = args.bcast {
        hint = hint.with_broadcast(bcast);
    }
    if let Some(port) = args.port {
        hint = hint.with_port(port);
    }
    Ok(hint)
}

pub async fn run_wake(args: WakeArgs, record: DeviceRecord, cancel: CancellationToken) -> Result<()> {
    let hint = wake_hint(&args, &record)?;
    let target = hint.target_address();
    let port = hint.port;
    let mac = hint.mac;
    let signal = WakeSignal::new(hint);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(eyre!("Interrupted")),
        sent = signal.send() => sent?,
    }

    info!(mac = %mac, target = %target, port = port, "Magic packet sent");
    println!("Sent magic packet to {} via {}:{}", mac, target, port);
    Ok(())
}
