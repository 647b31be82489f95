//! Commands that talk to a reachable TV

use color_eyre::eyre::{bail, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tvwake_control::{PowerStatus, TvPlugin};

use super::finished;

pub async fn run_standby(tv: &dyn TvPlugin, cancel: &CancellationToken) -> Result<()> {
    if !finished(tv.power_off(cancel).await)? {
        bail!("{} did not accept the standby request", tv.host());
    }
    println!("Standby sent to {}", tv.host());
    Ok(())
}

pub async fn run_state(tv: &dyn TvPlugin, cancel: &CancellationToken) -> Result<()> {
    let state = finished(tv.get_state(cancel).await)?;
    info!(host = %tv.host(), power = %state.power, "Power state");

    println!("Power: {}", state.power);
    if let Some(input) = &state.input {
        println!("Input: {}", input);
    }
    if let Some(volume) = state.volume {
        println!("Volume: {}", volume);
    }
    if state.power == PowerStatus::Unknown && !tv.credential().is_paired() {
        println!("Hint: run `tvwake pair` first");
    }
    Ok(())
}

pub async fn run_discover(tv: &dyn TvPlugin, cancel: &CancellationToken) -> Result<()> {
    if !finished(tv.discover(cancel).await)? {
        bail!("No {} TV answered at {}", tv.manufacturer(), tv.host());
    }
    println!("Found {} at {}:{}", tv.model_hint(), tv.host(), tv.port());
    Ok(())
}

pub async fn run_key(tv: &dyn TvPlugin, key: &str, cancel: &CancellationToken) -> Result<()> {
    if !finished(tv.send_key(key, cancel).await)? {
        bail!("Key {:?} was not delivered to {}", key, tv.host());
    }
    println!("Sent {} to {}", key, tv.host());
    Ok(())
}

pub async fn run_launch(tv: &dyn TvPlugin, app: &str, cancel: &CancellationToken) -> Result<()> {
    if !finished(tv.launch_app(app, cancel).await)? {
        bail!("{} could not launch {:?}", tv.host(), app);
    }
    println!("Launched {} on {}", app, tv.host());
    Ok(())
}
