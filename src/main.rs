use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use rdpinspector::api::{routes, AppState};
use rdpinspector::capture::events::IngestEvent;
use rdpinspector::capture::presenter::SharedPresenter;
use rdpinspector::capture::service::{CaptureHandle, CaptureService};
use rdpinspector::capture::store::CaptureStore;
use rdpinspector::models::config::AppConfig;
use rdpinspector::utils::logging;

/// Capacity of the command channel between the API and the capture service
const COMMAND_QUEUE_SIZE: usize = 256;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Remote debugging protocol packet inspector with REST API")]
struct Args {
    /// Port for the REST API server
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Maximum number of packets kept in the buffer
    #[clap(long, default_value = "1000")]
    packet_limit: usize,

    /// Debounce window for view refreshes, in milliseconds
    #[clap(long, default_value = "200")]
    refresh_timeout_ms: u64,

    /// Report the transport packet cache as enabled
    #[clap(long)]
    packet_cache: bool,

    /// Render packet details inline
    #[clap(long)]
    show_inline_details: bool,

    /// Dump file to restore on start-up
    #[clap(long)]
    load: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_logger(logging::get_log_level(&args.log_level));

    info!("Starting RDP Inspector v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig {
        port: args.port,
        packet_limit: args.packet_limit,
        refresh_timeout_ms: args.refresh_timeout_ms,
        packet_cache_enabled: args.packet_cache,
        show_inline_details: args.show_inline_details,
    };
    info!(
        "Packet limit {}, refresh timeout {}ms",
        config.packet_limit, config.refresh_timeout_ms
    );

    // Wire the store to its presenter and command source
    let presenter = SharedPresenter::new(config.display_options());
    let store = CaptureStore::new(&config, presenter.clone());
    let (capture, commands) = CaptureHandle::channel(COMMAND_QUEUE_SIZE);
    let service = CaptureService::attach(store, commands);

    if let Some(path) = &args.load {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read dump file {}", path))?;
        capture
            .ingest(IngestEvent::LoadedPacketListFile(text))
            .await
            .context("Capture service stopped while loading dump file")?;
        if let Some(error) = presenter.state().error {
            warn!("{}: {}", error.message, error.details);
        }
    }

    let app_state = web::Data::new(AppState {
        capture: capture.clone(),
        presenter,
    });

    info!("Starting RDP Inspector API server on port {}", config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind(format!("127.0.0.1:{}", config.port))?
    .run()
    .await?;

    // Dropping the last handle lets the service drain; dispose releases it
    drop(capture);
    if service.dispose().await.is_none() {
        warn!("Capture service did not shut down cleanly");
    }

    Ok(())
}
