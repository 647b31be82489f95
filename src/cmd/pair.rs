//! `tvwake pair`: authenticate with the TV and store the credential

use std::path::Path;

use async_trait::async_trait;
use color_eyre::eyre::{bail, eyre, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tvwake_control::{DeviceRecord, PairingOutcome, PinPrompt, TvPlugin};

use crate::config;

/// Reads the PIN shown on the TV from stdin; a blank line declines
#[derive(Debug, Default)]
pub struct StdinPrompt;

#[async_trait]
impl PinPrompt for StdinPrompt {
    async fn ask_for_pin(&self) -> Option<String> {
        let mut stderr = tokio::io::stderr();
        let _ = stderr.write_all(b"Enter the PIN shown on the TV: ").await;
        let _ = stderr.flush().await;

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()).filter(|pin| !pin.is_empty()),
            Err(e) => {
                debug!(error = %e, "Failed to read PIN");
                None
            }
        }
    }
}

pub async fn run_pair(
    tv: &mut dyn TvPlugin,
    prompt: &dyn PinPrompt,
    mut record: DeviceRecord,
    config_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    info!(host = %tv.host(), manufacturer = %tv.manufacturer(), "Pairing");
    let result = tv.pair(prompt, cancel).await;
    let message = result.message.clone().unwrap_or_default();

    match result.outcome {
        PairingOutcome::Success => {
            let credential = result
                .credential
                .ok_or_else(|| eyre!("Pairing succeeded without a credential"))?;
            record.apply_credential(&credential);
            config::save(config_path, &record)?;
            println!("Paired with {}; saved to {}", tv.host(), config_path.display());
            Ok(())
        }
        PairingOutcome::NeedsUserPsk => {
            bail!("{} needs a pre-shared key: set one on the TV and pass --psk", tv.host())
        }
        PairingOutcome::NeedsUserPin => bail!("A PIN is required to pair with {}", tv.host()),
        PairingOutcome::Cancelled => bail!("Pairing cancelled"),
        PairingOutcome::Rejected | PairingOutcome::NetworkError => bail!("{}", message),
    }
}
