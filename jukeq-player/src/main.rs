//! JukeQ queue player - Main entry point
//!
//! Wires the queue store, filler supplier, scheduler, playback device, and
//! HTTP/SSE interface together and runs until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jukeq_common::config::ConfigStore;
use jukeq_common::events::EventBus;
use jukeq_player::api::{self, AppContext};
use jukeq_player::device::RodioDevice;
use jukeq_player::filler::FillerSupplier;
use jukeq_player::media::{CommandArchiver, MediaResolver, YtDlpResolver};
use jukeq_player::scheduler::Scheduler;
use jukeq_player::store::QueueStore;

/// Command-line arguments for jukeq-player
#[derive(Parser, Debug)]
#[command(name = "jukeq-player")]
#[command(about = "Song request queue player for JukeQ")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "JUKEQ_PORT")]
    port: u16,

    /// Directory holding the queue file and media slots
    #[arg(short, long, default_value = ".", env = "JUKEQ_DATA_DIR")]
    data_dir: PathBuf,

    /// Path to the shared JSON config file
    #[arg(short, long, default_value = "config.json", env = "JUKEQ_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jukeq_player=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting JukeQ queue player on port {}", args.port);
    info!("Data directory: {}", args.data_dir.display());

    std::fs::create_dir_all(&args.data_dir).context("Failed to create data directory")?;
    let thumbnails_dir = args.data_dir.join("thumbnails");
    std::fs::create_dir_all(&thumbnails_dir).context("Failed to create thumbnails directory")?;

    let config = Arc::new(ConfigStore::new(&args.config));
    let settings = config.load().context("Failed to load config file")?;

    let store = Arc::new(QueueStore::open(&args.data_dir).context("Failed to open queue store")?);
    let bus = Arc::new(EventBus::new());
    let resolver: Arc<dyn MediaResolver> = Arc::new(YtDlpResolver::new(&thumbnails_dir));

    let device = Arc::new(
        RodioDevice::new(settings.output_device.as_deref())
            .context("Failed to open playback device")?,
    );

    let archiver = settings
        .archive_command
        .clone()
        .and_then(CommandArchiver::from_command)
        .map(|a| Arc::new(a) as Arc<dyn jukeq_player::media::Archiver>);
    if archiver.is_none() {
        info!("No archive command configured, watched-playlist archival disabled");
    }

    let filler = Arc::new(FillerSupplier::new(Arc::clone(&resolver), Arc::clone(&config)));
    if let Err(e) = filler.configure_from_saved().await {
        warn!("Filler not available at startup: {}", e);
    }

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&filler),
        Arc::clone(&resolver),
        archiver,
        device,
        Arc::clone(&bus),
    ));
    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run());
    info!("Scheduler started");

    let ctx = AppContext {
        scheduler: Arc::clone(&scheduler),
        filler,
        bus,
        config,
    };
    let app = api::create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Waiting for scheduler to stop");
    scheduler.shutdown();
    if tokio::time::timeout(Duration::from_secs(5), scheduler_task)
        .await
        .is_err()
    {
        warn!("Scheduler failed to stop within 5 seconds");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
