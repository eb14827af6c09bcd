//! boardcast - main entry point
//!
//! Headless soundboard engine: loads the persisted configuration, builds the
//! playback dispatcher, and serves the HTTP + SSE control surface until
//! shutdown. The graphical front-end and the OS keyboard hook are separate
//! processes talking to this one.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use boardcast::api;
use boardcast::audio::device;
use boardcast::audio::output::CpalOpener;
use boardcast::hotkey::{spawn_key_router, StdinKeySource};
use boardcast::playback::Dispatcher;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for boardcast
#[derive(Parser, Debug)]
#[command(name = "boardcast")]
#[command(about = "Headless soundboard playback engine")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "boardcast.json", env = "BOARDCAST_CONFIG")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value = "5725", env = "BOARDCAST_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "BOARDCAST_BIND")]
    bind: String,

    /// Print available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Read key names from stdin (one per line) as a hotkey source
    #[arg(long)]
    stdin_keys: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        let devices = device::list_output_devices();
        if devices.is_empty() {
            println!("No output devices available");
        } else {
            let default = device::default_output_device();
            for dev in devices {
                let marker = if Some(&dev.id) == default.as_ref() {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{}", dev.display_name, marker);
            }
        }
        return Ok(());
    }

    info!("Starting boardcast on port {}", args.port);
    info!("Configuration file: {}", args.config.display());

    // Build the dispatcher against the real audio backend
    let dispatcher = Arc::new(Dispatcher::new(args.config.clone(), Arc::new(CpalOpener)));

    // Optional stdin hotkey source for driving the engine from a terminal
    if args.stdin_keys {
        info!("Reading key events from stdin");
        spawn_key_router(StdinKeySource, Arc::clone(&dispatcher));
    }

    // Build the application router; download/TTS collaborators are wired in
    // by deployments that have them
    let app_state = api::AppState {
        dispatcher: Arc::clone(&dispatcher),
        downloader: None,
        synthesizer: None,
        port: args.port,
    };

    let app = api::create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Fade out and join whatever is still playing
    dispatcher.shutdown();

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
