//! Tsunami Hazard Analyzer — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the dataset, engine, region proxy,
//! and middleware.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tsunami_hazard_analyzer::api::{create_router, AppState};
use tsunami_hazard_analyzer::config::{self, AnalyzerConfig};
use tsunami_hazard_analyzer::dataset::Dataset;
use tsunami_hazard_analyzer::engine::ScenarioEngine;
use tsunami_hazard_analyzer::metrics::Metrics;
use tsunami_hazard_analyzer::regions::{HttpRegionSource, RegionProxy, SystemClock};
use tsunami_hazard_analyzer::scoring::HotReloadWeights;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tsunami_hazard_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AnalyzerConfig::load()?;
    let dataset = Dataset::load_csv(&config.dataset_path, &config.schema)?;
    tracing::info!(
        rows = dataset.len(),
        path = %config.dataset_path,
        "baseline dataset loaded"
    );

    let metrics = Metrics::init(dataset.len(), config.region_cache_ttl_secs);

    let engine = Arc::new(ScenarioEngine::new(
        dataset,
        config.build_matcher(),
        config.default_amplification,
    ));
    let regions = Arc::new(RegionProxy::new(
        Box::new(HttpRegionSource::new()),
        Box::new(SystemClock),
        Duration::from_secs(config.region_cache_ttl_secs),
    ));
    let weights = HotReloadWeights::new(config::weights_path());

    let port = config.port;
    let state = AppState::new(engine, weights, regions, config);
    let router = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
