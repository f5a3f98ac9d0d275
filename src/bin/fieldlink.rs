//! Fieldlink agent binary.
//!
//! Runs the device session against a coordinator, using the host machine as
//! the device.
//!
//! # Commands
//!
//! - `run` - Connect and keep the session alive until Ctrl-C
//! - `config` - Print the default configuration as TOML
//! - `check` - Validate a configuration file

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use fieldlink::{Client, Config, Device, HostDevice, LinkStatus, WebSocketTransport, VERSION};
use tokio::time::MissedTickBehavior;

#[derive(Parser)]
#[command(name = "fieldlink")]
#[command(version = VERSION)]
#[command(about = "Fieldlink - device session agent for a remote coordinator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the coordinator and run the session
    Run {
        /// Config file path (default: <config dir>/fieldlink/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Print the default configuration
    Config,

    /// Validate configuration without connecting
    Check {
        /// Config file path (default: <config dir>/fieldlink/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            verbose,
            json_logs,
        } => cmd_run(config, verbose, json_logs),
        Commands::Config => cmd_config(),
        Commands::Check { config } => cmd_check(config),
    }
}

fn cmd_run(path: Option<PathBuf>, verbose: bool, json_logs: bool) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = load_config(path)?;
    config.validate()?;

    let mut client = Client::builder(
        WebSocketTransport::new(config.websocket_config()),
        HostDevice::new(),
    )
    .credentials(config.credentials())
    .endpoint(config.endpoint())
    .session_config(config.session_config())
    .on_status_change(|status: LinkStatus| {
        tracing::info!(
            connected = status.connected,
            authenticated = status.authenticated,
            "Status changed"
        );
    })
    .build()?;

    tracing::info!("Starting fieldlink {} against {}", VERSION, config.endpoint());
    client.connect()?;

    let tick_interval = Duration::from_millis(config.agent.tick_interval_ms);
    let telemetry_interval = Duration::from_secs(config.agent.telemetry_interval_secs);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_telemetry = Instant::now();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    client.tick();

                    if !telemetry_interval.is_zero()
                        && client.is_authenticated()
                        && last_telemetry.elapsed() >= telemetry_interval
                    {
                        last_telemetry = Instant::now();
                        let reading = client.device_mut().sample();
                        if let Err(e) = client.send_telemetry(reading) {
                            tracing::warn!("Telemetry not sent: {}", e);
                        }
                    }
                }
                result = &mut shutdown => {
                    result?;
                    tracing::info!("Shutting down");
                    break;
                }
            }
        }

        client.transport_mut().shutdown();
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_config() -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(&Config::default())?);
    Ok(())
}

fn cmd_check(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    config.validate()?;

    let session = config.session_config();
    println!("Endpoint:     {}", config.endpoint());
    println!("Credentials:  {:?}", config.credentials());
    println!(
        "Session:      heartbeat {:?}, timeout {:?}",
        session.heartbeat_interval, session.connection_timeout
    );
    println!("Transport:    {:?}", config.websocket_config());
    println!("OK");
    Ok(())
}

/// File config (explicit path, else the default path if present), overlaid
/// with `FIELDLINK_*` environment variables.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let file_config = match path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        },
    };

    Ok(file_config.merge(Config::from_env()))
}
