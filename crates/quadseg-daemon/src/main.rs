//! quadseg daemon
//!
//! Shows live event counters on an HT16K33 alphanumeric display and exposes
//! a JSON API for events and display control.

mod config;
mod housekeeping;
mod presenter;
mod tally;
mod web;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use presenter::{Presenter, Timing};
use quadseg_hw::{BlinkRate, Display, FirmataBus, FlushHandle, NullBus};
use web::PanelBus;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = Config::load(&config_path).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", config_path);

    // Open the bus; without one nothing else can work
    let mut flusher: Option<FlushHandle> = None;
    let mut activity = None;
    let bus: PanelBus = if config.device.headless {
        info!("Running headless, display writes are discarded");
        Box::new(NullBus)
    } else {
        let bus = FirmataBus::open(&config.device.port, config.device.baud)
            .with_context(|| format!("Failed to open display link on {}", config.device.port))?;
        flusher = Some(bus.flush_handle());
        if let Some(flash) = config.device.activity_flash() {
            let pin = bus
                .digital_output(config.device.activity_pin)
                .context("Failed to configure activity LED")?;
            activity = Some((pin, flash));
        }
        Box::new(bus)
    };

    let mut display = Display::new(bus, config.device.address);
    display
        .initialize(config.display.brightness)
        .context("Failed to initialize display")?;
    display
        .set_blink_rate(BlinkRate::from_raw(config.display.blink))
        .context("Failed to set blink rate")?;

    let mut presenter = Presenter::new(display, Timing::from(&config.timing));
    if let Some((pin, flash)) = activity {
        presenter = presenter.with_activity_led(pin, flash);
    }

    // Start daily rollover
    if config.logs.rollover {
        std::fs::create_dir_all(&config.logs.dir).with_context(|| {
            format!(
                "Failed to create log directory: {}",
                config.logs.dir.display()
            )
        })?;
        let rollover_presenter = presenter.clone();
        let dir = config.logs.dir.clone();
        tokio::spawn(async move {
            housekeeping::run_daily_rollover(rollover_presenter, dir).await;
        });
    }

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    // Optionally start web server
    if config.web.enable {
        let app = web::create_router(presenter.clone());
        let addr: SocketAddr = config
            .web
            .listen
            .parse()
            .context("Invalid listen address")?;
        let listener = TcpListener::bind(addr).await?;
        info!("API listening on http://{}", addr);

        // Run server with shutdown handling
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
            }
        }
    } else {
        info!("API disabled");
        // Wait for shutdown signal
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
            }
        }
    }

    if let Err(e) = presenter.shutdown() {
        warn!("Failed to blank display on shutdown: {}", e);
    }
    // The final frame must reach the board before the runtime stops
    if let Some(flusher) = flusher {
        if let Err(e) = flusher.flush().await {
            warn!("Display link closed before the final frame was sent: {}", e);
        }
    }

    Ok(())
}
