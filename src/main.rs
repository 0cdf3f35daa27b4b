//! EOL exporter daemon.
//!
//! Discovers installed products (OS, kernel, and any enabled providers),
//! keeps their end-of-life data fresh from endoflife.date, and serves it
//! as Prometheus gauges.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use eol_exporter::api::LifecycleClient;
use eol_exporter::config::{self, Args, Settings};
use eol_exporter::metrics::MetricSchema;
use eol_exporter::providers::{self, os::hostname, ProviderRegistry};
use eol_exporter::scheduler::Scheduler;
use eol_exporter::server;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (file, config_path) = config::load_file(args.config.as_deref())
        .context("Failed to load configuration file")?;
    let settings = Settings::resolve(&args, file, hostname).context("Invalid configuration")?;

    init_tracing(settings.log_json);

    info!("EOL Exporter v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!(path = %path.display(), "Using config file");
    }

    let result = run(settings).await;
    if let Err(e) = &result {
        error!("Exporter stopped: {:#}", e);
    }
    result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eol_exporter=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(settings: Settings) -> Result<()> {
    // ── Discovery ───────────────────────────────────────────────────
    let registry = ProviderRegistry::with_declared(&settings.command_providers)
        .context("Failed to load command providers")?;
    let enabled = registry
        .select(&settings.providers)
        .context("Failed to load configured providers")?;

    let mut discovery = providers::builtin_providers(settings.builtin.os, settings.builtin.kernel);
    discovery.extend(enabled);

    let targets = providers::discover_targets(&discovery).await;
    if targets.is_empty() {
        warn!("No targets discovered, serving an empty registry");
    }

    // ── Metrics ─────────────────────────────────────────────────────
    let schema = Arc::new(MetricSchema::new().context("Failed to build metric schema")?);

    // ── Lifecycle Client ────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(concat!("eol-exporter/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let client = Arc::new(LifecycleClient::with_base_url(http, settings.api_url.clone()));

    // ── Refresh Tasks ───────────────────────────────────────────────
    let mut scheduler = Scheduler::new(
        client,
        Arc::clone(&schema),
        settings.host.clone(),
        settings.refresh_interval,
    );
    scheduler.spawn_all(targets);
    info!(
        targets = scheduler.len(),
        host = %settings.host,
        api = %settings.api_url,
        "Refresh tasks running"
    );

    // ── Scrape Endpoint ─────────────────────────────────────────────
    let addr = settings.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Serving metrics at /metrics");

    let token = scheduler.token();
    let serve = axum::serve(listener, server::router(schema))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
                _ = token.cancelled() => {}
            }
        })
        .await;

    scheduler.shutdown().await;
    serve.context("HTTP server failed")
}
