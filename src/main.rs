//! segue - main entry point
//!
//! Wires the pieces together: configuration, track catalog, settings store,
//! audio output, the crossfade engine and its state machine, and the HTTP
//! control surface. The settings database and the audio device are both
//! optional at runtime: the player degrades to no persistence and blocked
//! playback rather than refusing to start.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rodio::OutputStreamBuilder;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use segue::api::{create_router, AppContext};
use segue::catalog::Catalog;
use segue::config::Config;
use segue::db;
use segue::events::EventBus;
use segue::playback::{
    AudioSource, CrossfadeEngine, EngineConfig, PlayerController, RodioSource,
};
use segue::session::SessionStore;

/// Command-line arguments for segue
#[derive(Parser, Debug)]
#[command(name = "segue")]
#[command(about = "Crossfading audio player with synced lyrics")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "segue.toml", env = "SEGUE_CONFIG")]
    config: PathBuf,

    /// Override the configured HTTP port
    #[arg(short, long, env = "SEGUE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config).with_context(|| {
        format!("Failed to load configuration from {}", args.config.display())
    })?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "segue={},tower_http=warn",
                    config.logging.level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = args.port.unwrap_or(config.port);
    info!("Starting segue on port {}", port);

    let catalog = Arc::new(
        Catalog::load(&config.catalog_path).context("Failed to load track catalog")?,
    );
    info!("Catalog loaded: {} tracks", catalog.len());

    // Settings store; run without persistence when unavailable.
    let store = match db::init::open_pool(&config.database_path).await {
        Ok(pool) => SessionStore::new(pool),
        Err(e) => {
            warn!(
                "Settings database unavailable ({}); session will not persist",
                e
            );
            SessionStore::unavailable()
        }
    };

    // Audio output. The stream must stay alive for the life of the process;
    // a missing device degrades every play request to a blocked outcome.
    let stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Audio output unavailable ({}); playback will be blocked", e);
            None
        }
    };
    let mixer = stream.as_ref().map(|s| s.mixer().clone());

    let bus = EventBus::new(256);
    let sources: [Box<dyn AudioSource + Send>; 2] = [
        Box::new(RodioSource::new(mixer.clone())),
        Box::new(RodioSource::new(mixer)),
    ];
    let engine = CrossfadeEngine::new(
        sources,
        bus.clone(),
        EngineConfig {
            swap_margin: config.playback.swap_margin(),
            tick_interval: config.playback.tick_interval(),
        },
    );
    let controller = PlayerController::new(
        engine,
        catalog,
        store,
        bus,
        config.playback.clone(),
    );

    controller.start().await;
    if let Err(e) = controller.restore().await {
        warn!("Session restore failed: {}", e);
    }

    // Build and run the control surface
    let app = create_router(AppContext {
        controller: controller.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Final persistence pass before the process goes away.
    controller.shutdown().await;
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
