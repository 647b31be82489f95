use std::io::stderr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;
mod config;

use cmd::wake::WakeArgs;
use cmd::DeviceArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Wake and control JointSPACE and BRAVIA televisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Device record file
    #[arg(long, global = true, env = "TVWAKE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    device: DeviceArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sends a Wake-on-LAN magic packet.
    Wake(WakeArgs),
    /// Puts the TV into standby.
    Standby,
    /// Pairs with the TV and saves the credential.
    Pair,
    /// Shows the TV's power state.
    State,
    /// Checks whether the TV's control API answers.
    Discover,
    /// Sends a remote-control key (e.g. VolumeUp).
    Key {
        /// Key name
        name: String,
    },
    /// Launches an app by id or URI.
    Launch {
        /// App id or URI
        app: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "tvwake={level},tvwake_control={level},reqwest=warn,hyper=warn,rustls=warn",
        level = default_level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, cancelling...");
            ctrl_c.cancel();
        }
    });

    let config_path = config::resolve_path(cli.config);
    let mut record = config::load(&config_path)?;
    cli.device.apply(&mut record);
    debug!(path = %config_path.display(), "Device record loaded");

    match cli.command {
        Commands::Wake(args) => cmd::wake::run_wake(args, record, cancel).await,
        Commands::Pair => {
            let mut tv = cmd::open_plugin(&record, &cli.device)?;
            cmd::pair::run_pair(tv.as_mut(), &cmd::pair::StdinPrompt, record, &config_path, &cancel).await
        }
        Commands::Standby => {
            let tv = cmd::open_plugin(&record, &cli.device)?;
            cmd::control::run_standby(tv.as_ref(), &cancel).await
        }
        Commands::State => {
            let tv = cmd::open_plugin(&record, &cli.device)?;
            cmd::control::run_state(tv.as_ref(), &cancel).await
        }
        Commands::Discover => {
            let tv = cmd::open_plugin(&record, &cli.device)?;
            cmd::control::run_discover(tv.as_ref(), &cancel).await
        }
        Commands::Key { name } => {
            let tv = cmd::open_plugin(&record, &cli.device)?;
            cmd::control::run_key(tv.as_ref(), &name, &cancel).await
        }
        Commands::Launch { app } => {
            let tv = cmd::open_plugin(&record, &cli.device)?;
            cmd::control::run_launch(tv.as_ref(), &app, &cancel).await
        }
    }
}
