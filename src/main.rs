//! Ohm64 GW
//!
//! Keeps a Livid Ohm64 button/LED grid in sync with a host.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ohm64_gw::cli::{self, HostCommand};
use ohm64_gw::config::{AppConfig, ConfigWatcher};
use ohm64_gw::midi::format_hex;
use ohm64_gw::ohm64::sysex::Polarity;
use ohm64_gw::ohm64::Ohm64Driver;
use ohm64_gw::{sniffer, transport, Surface};

/// Ohm64 Gateway - drive the Ohm64 button/LED grid from a host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Monitor an input port and decode LED frames
    #[arg(long, value_name = "PORT", num_args = 0..=1, default_missing_value = "Ohm64")]
    sniffer: Option<String>,

    /// Run without the interactive host console
    #[arg(long)]
    no_repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Ohm64 GW...");
    info!("Configuration file: {}", args.config);

    if args.list_ports {
        sniffer::list_ports_formatted();
        return Ok(());
    }

    if let Some(pattern) = &args.sniffer {
        // The sniffer works without a config; use its polarity if there is one
        let polarity = match AppConfig::load(&args.config).await {
            Ok(config) => config.surface.polarity,
            Err(_) => Polarity::default(),
        };
        return sniffer::run_cli_sniffer(pattern, polarity).await;
    }

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    run_app(initial_config, config_watcher, !args.no_repl, shutdown_signal()).await?;

    info!("Ohm64 GW shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mut config_watcher: ConfigWatcher,
    with_repl: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (surface, outbound_rx) = Surface::new(config.surface.options())?;
    let note_channel = config.surface.note_channel;

    let mut driver = Ohm64Driver::new(&config);
    driver.connect()?;

    let mut device_rx = driver
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("Failed to get Ohm64 event receiver"))?;

    // Outbound pump: surface -> device, one packet per message
    let output = driver.output()?;
    let pump = tokio::spawn(async move {
        transport::forward(outbound_rx, &output).await;
    });

    if config.surface.sync_on_connect {
        surface.clear();
    }

    let (host_tx, mut host_rx) = mpsc::channel::<HostCommand>(64);
    if with_repl {
        println!("{}", cli::HELP);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = cli::run_repl(host_tx) {
                warn!("Host console stopped: {}", e);
            }
        });
    } else {
        drop(host_tx);
    }

    info!("Ready to process button events!");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Button presses from the Ohm64
            Some(event) = device_rx.recv() => {
                match event.button_press(note_channel) {
                    Some(press) => {
                        if let Err(e) = surface.on_button_event(press.id.into(), press.pressed) {
                            warn!("Ignoring button event: {}", e);
                        }
                    }
                    None => trace!(
                        "Unhandled Ohm64 input: {} ({})",
                        event.message,
                        format_hex(&event.raw_data)
                    ),
                }
            }

            // Commands from the host console
            Some(command) = host_rx.recv() => {
                debug!("Host command: {:?}", command);
                if !command.apply(&surface) {
                    info!("Exit requested");
                    break;
                }
            }

            // Live surface settings from the config file
            Some(settings) = config_watcher.next_surface() => {
                surface.reconfigure(settings.options());
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    surface.shutdown();
    drop(surface);

    // Dropping the surface closes the outbound queue; let the pump flush
    if tokio::time::timeout(Duration::from_secs(1), pump).await.is_err() {
        warn!("Outbound queue did not drain before shutdown");
    }
    driver.disconnect();

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
