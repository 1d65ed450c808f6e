mod api;
mod cli;
mod config;
mod dispatch;
mod error;
mod freshness;
mod notify;
mod render;
mod rows;
mod scheduler;
mod types;

use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::cli::Cli;
use crate::config::Config;
use crate::dispatch::SnapshotDispatcher;
use crate::error::Result;
use crate::notify::{Notifier, ReqwestTransport, RetryPolicy};
use crate::render::{ImageExporter, SnapshotRenderer, SvgTableExporter};
use crate::scheduler::{JobRegistry, ProcessLauncher, Scheduler};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let filter = if cli.debug { "debug" } else { cfg.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    if let Err(e) = run(cfg, cli).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config, cli: Cli) -> Result<()> {
    info!(
        "Starting: project root {}, snapshots in {}, min EV {:.1}%, odds [{}, {}]",
        cfg.project_root.display(),
        cfg.resolve(&cfg.snapshot_dir).display(),
        cfg.min_ev,
        cfg.odds_range.0,
        cfg.odds_range.1,
    );
    if cfg.webhook_url.is_none() && cfg.market_webhooks.is_empty() {
        warn!("WEBHOOK_URL and MARKET_WEBHOOKS unset; digests will be rendered but not delivered");
    }

    // --- Shared state ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let registry = Arc::new(JobRegistry::new(cfg.max_tracked_jobs));

    // --- Delivery path ---
    let exporter: Option<Box<dyn ImageExporter>> = if cfg.render_images {
        Some(Box::new(SvgTableExporter::new(cfg.max_image_rows)))
    } else {
        None
    };
    let transport = Arc::new(ReqwestTransport::new(cfg.request_timeout)?);
    let notifier = Notifier::new(transport, RetryPolicy::new(cfg.attempts, cfg.backoff_base))
        .with_latency(Arc::clone(&latency));
    let dispatcher = SnapshotDispatcher::new(cfg.clone(), SnapshotRenderer::new(exporter), notifier)
        .with_health(Arc::clone(&health));

    // --- Scheduler ---
    let launcher = Arc::new(ProcessLauncher::new(Arc::clone(&registry)));
    let mut scheduler = Scheduler::from_config(&cfg, launcher)
        .with_registry(Arc::clone(&registry))
        .with_health(Arc::clone(&health));

    if cli.once {
        // Monitors outlive a single pass; leave them to the long-running mode.
        scheduler = scheduler.with_monitors(&[]);
        let fired = scheduler.run_once(Local::now());
        info!("[SCHED] fired {} tasks", fired.len());
        let summary = dispatcher.run_cycle(Local::now()).await;
        if let Some(reason) = summary.skipped {
            info!("[DISPATCH] skipped: {reason:?}");
        }
        return Ok(());
    }

    // HTTP status API
    if !cli.no_api {
        let api_state = ApiState {
            health: Arc::clone(&health),
            tasks: scheduler.board(),
            jobs: Arc::clone(&registry),
            latency: Arc::clone(&latency),
        };
        let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        info!("HTTP API listening on {bind_addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(api_state)).await {
                error!("HTTP API stopped: {e}");
            }
        });
    }

    // Delivery loop (background, every DISPATCH_INTERVAL_SECS)
    info!("[DISPATCH] running every {}s", dispatcher.interval().as_secs());
    tokio::spawn(async move { dispatcher.run().await });

    scheduler.run().await;
    Ok(())
}
