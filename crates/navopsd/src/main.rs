//! navopsd — the navops daemon.
//!
//! Single binary that assembles the resilience control loop:
//! - Metrics sampler (background sampling loop)
//! - Resilient executor (exception ledger + circuit breakers)
//! - Autoscaler over a pluggable deployment backend
//! - Notification dispatcher
//! - REST API
//!
//! # Usage
//!
//! ```text
//! navopsd --port 8080 --backend kubectl --deployment navops
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};

use navops_api::ApiState;
use navops_autoscale::{
    Autoscaler, ComposeBackend, DeploymentBackend, KubectlBackend, NoopBackend, SystemdBackend,
};
use navops_core::metrics::Thresholds;
use navops_core::notify::{ChannelConfig, NotifyConfig};
use navops_core::resilience::RetryConfig;
use navops_core::scaling::ScalingAction;
use navops_monitor::{MetricsSampler, SystemGauge};
use navops_notify::Notifier;
use navops_resilience::ResilientExecutor;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    Kubectl,
    Compose,
    Systemd,
    Noop,
}

#[derive(Parser)]
#[command(name = "navopsd", about = "navops resilience daemon")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Metrics sampling interval in seconds.
    #[arg(long, default_value = "30")]
    sample_interval: u64,

    /// Autoscaler evaluation interval in seconds (0 disables the loop;
    /// scaling then happens only via the API).
    #[arg(long, default_value = "0")]
    autoscale_interval: u64,

    /// Deployment backend to scale through.
    #[arg(long, value_enum, default_value = "noop")]
    backend: BackendKind,

    /// Deployment name passed to the backend.
    #[arg(long, default_value = "navops")]
    deployment: String,

    #[arg(long, default_value = "3")]
    min_replicas: u32,

    #[arg(long, default_value = "10")]
    max_replicas: u32,

    /// Enable outbound notifications.
    #[arg(long)]
    notify_enabled: bool,

    /// Generic webhook endpoint for notifications.
    #[arg(long)]
    webhook_url: Option<String>,

    /// Slack incoming-webhook endpoint.
    #[arg(long)]
    slack_webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,navopsd=debug,navops=debug".parse().expect("valid filter")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("navops daemon starting");

    if cli.min_replicas > cli.max_replicas {
        anyhow::bail!(
            "min replicas ({}) exceeds max replicas ({})",
            cli.min_replicas,
            cli.max_replicas
        );
    }

    // ── Initialize components ──────────────────────────────────

    let gauge = Arc::new(SystemGauge::new());
    let sampler = Arc::new(MetricsSampler::new(gauge, Thresholds::default()));
    info!(interval = cli.sample_interval, "metrics sampler initialized");

    let executor = Arc::new(ResilientExecutor::new(RetryConfig::default()));
    info!("resilient executor initialized");

    let backend: Arc<dyn DeploymentBackend> = match cli.backend {
        BackendKind::Kubectl => Arc::new(KubectlBackend),
        BackendKind::Compose => Arc::new(ComposeBackend),
        BackendKind::Systemd => Arc::new(SystemdBackend),
        BackendKind::Noop => Arc::new(NoopBackend),
    };
    let scaler = Arc::new(Autoscaler::new(
        backend.clone(),
        cli.deployment.clone(),
        cli.min_replicas,
        cli.max_replicas,
    ));
    info!(
        backend = backend.kind(),
        deployment = %cli.deployment,
        min = cli.min_replicas,
        max = cli.max_replicas,
        "autoscaler initialized"
    );

    let mut channels = Vec::new();
    if let Some(url) = cli.webhook_url {
        channels.push(ChannelConfig::Webhook { url });
    }
    if let Some(webhook_url) = cli.slack_webhook_url {
        channels.push(ChannelConfig::Slack { webhook_url });
    }
    if cli.notify_enabled && channels.is_empty() {
        warn!("notifications enabled but no channels configured");
    }
    let notifier = Arc::new(Notifier::new(NotifyConfig {
        enabled: cli.notify_enabled,
        channels,
    })?);
    info!(enabled = cli.notify_enabled, "notifier initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler_shutdown = shutdown_rx.clone();
    let autoscale_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    let sampler_task = sampler.clone();
    let sampler_handle = tokio::spawn(async move {
        sampler_task
            .run(Duration::from_secs(cli.sample_interval), sampler_shutdown)
            .await;
    });

    let autoscale_handle = if cli.autoscale_interval > 0 {
        info!(interval = cli.autoscale_interval, "autoscale loop enabled");
        Some(tokio::spawn(autoscale_loop(
            sampler.clone(),
            scaler.clone(),
            notifier.clone(),
            Duration::from_secs(cli.autoscale_interval),
            autoscale_shutdown,
        )))
    } else {
        None
    };

    // ── Start API server ───────────────────────────────────────

    let router = navops_api::build_router(ApiState {
        sampler,
        executor,
        scaler,
        notifier,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install shutdown handler");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = sampler_handle.await;
    if let Some(handle) = autoscale_handle {
        let _ = handle.await;
    }

    info!("navops daemon stopped");
    Ok(())
}

/// Periodic recommendation-to-action loop. Each tick evaluates the
/// current recommendation and, when the scaler acted, dispatches a
/// scaling report.
async fn autoscale_loop(
    sampler: Arc<MetricsSampler>,
    scaler: Arc<Autoscaler>,
    notifier: Arc<Notifier>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let rec = sampler.recommendation().await;
                let event = scaler.evaluate(&rec).await;
                if event.action != ScalingAction::NoAction {
                    info!(
                        action = event.action.as_str(),
                        success = event.success,
                        "autoscale loop acted"
                    );
                    let report = scaler.generate_report(&event);
                    notifier.send_scaling_report(&report).await;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("autoscale loop stopping");
                    break;
                }
            }
        }
    }
}
