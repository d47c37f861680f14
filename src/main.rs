//! Searchwatch Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SEARCHWATCH_CONFIG: Checks file (default: checks.yaml)
//! - SEARCHWATCH_ELASTIC_URL: Elasticsearch base URL (default: http://localhost:9200)
//! - SEARCHWATCH_WORKERS: Worker pool size (default: pool_size from the checks file, else 4)
//! - SEARCHWATCH_HOST: Status API bind address (default: 0.0.0.0)
//! - SEARCHWATCH_PORT: Status API port (default: 8080)
//! - RUST_LOG: Log level (default: info)

use std::sync::Arc;

use searchwatch::alerts::AlertChecker;
use searchwatch::api::{run_server, ServerConfig};
use searchwatch::config::load_checks;
use searchwatch::dispatch::Dispatcher;
use searchwatch::search::ElasticClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_WORKERS: usize = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "searchwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse configuration from environment
    let config_path =
        std::env::var("SEARCHWATCH_CONFIG").unwrap_or_else(|_| "checks.yaml".to_string());
    let elastic_url = std::env::var("SEARCHWATCH_ELASTIC_URL")
        .unwrap_or_else(|_| "http://localhost:9200".to_string());
    let host = std::env::var("SEARCHWATCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("SEARCHWATCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let checks = load_checks(&config_path)?;
    let workers = std::env::var("SEARCHWATCH_WORKERS")
        .ok()
        .and_then(|w| w.parse::<usize>().ok())
        .or(checks.pool_size)
        .unwrap_or(DEFAULT_WORKERS);

    tracing::info!("Searchwatch configuration:");
    tracing::info!("  Checks file: {}", config_path);
    tracing::info!("  Elasticsearch: {}", elastic_url);
    tracing::info!("  Workers: {}", workers);
    tracing::info!("  Status API: {}:{}", host, port);

    let backend = Arc::new(ElasticClient::new(elastic_url)?);
    match backend.health_check().await {
        Ok(true) => tracing::info!("Elasticsearch is reachable"),
        Ok(false) => tracing::warn!("Elasticsearch reported an unhealthy cluster"),
        Err(e) => tracing::warn!(error = %e, "Elasticsearch is not reachable yet"),
    }

    let dispatcher = Arc::new(Dispatcher::start(workers));
    let checker = Arc::new(AlertChecker::new(backend, Arc::clone(&dispatcher)));

    let definitions = checks.definitions();
    let total = definitions.len();
    let mut registered = 0;
    for definition in definitions {
        let id = definition.id.clone();
        match checker.register(definition) {
            Ok(()) => registered += 1,
            Err(e) => tracing::error!(check_id = %id, error = %e, "Check rejected"),
        }
    }
    tracing::info!("{} of {} checks registered", registered, total);

    run_server(ServerConfig { host, port }, Arc::clone(&checker), shutdown_signal()).await?;

    tracing::info!("Stopping checks...");
    checker.shutdown().await;
    dispatcher.stop().await;

    tracing::info!("Searchwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received");
}
