//! navops-api — REST surface over the resilience control loop.
//!
//! Thin axum handlers over the four in-process components. Handlers
//! never hold state of their own; everything lives in the components
//! shared through [`ApiState`].
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/monitoring/status` | Current status report |
//! | GET | `/monitoring/metrics/history?minutes=N` | Samples from the last N minutes |
//! | GET | `/monitoring/alerts?include_resolved=bool` | Alert list |
//! | POST | `/monitoring/alerts/{metric_type}/resolve` | Resolve an alert |
//! | GET | `/exceptions/summary` | Exception ledger summary |
//! | GET | `/exceptions/unresolved` | Unresolved exception records |
//! | POST | `/exceptions/{kind}/resolve` | Bulk resolve by kind |
//! | GET | `/scaling/recommendation` | Current scaling recommendation |
//! | POST | `/scaling/evaluate` | Evaluate and apply the recommendation |
//! | POST | `/scaling/manual?replicas=N&reason=S` | Manual scale |
//! | GET | `/scaling/history?limit=N` | Recent scaling events |
//! | GET | `/scaling/summary` | Scaling aggregate view |
//! | GET | `/notifications/history?limit=N` | Recent send attempts |
//! | GET | `/notifications/stats` | Notification counters |
//! | POST | `/notifications/test` | Send a synthetic info alert |
//! | GET | `/health/detailed` | Aggregate subsystem health |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use navops_autoscale::Autoscaler;
use navops_monitor::MetricsSampler;
use navops_notify::Notifier;
use navops_resilience::ResilientExecutor;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub sampler: Arc<MetricsSampler>,
    pub executor: Arc<ResilientExecutor>,
    pub scaler: Arc<Autoscaler>,
    pub notifier: Arc<Notifier>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/monitoring/status", get(handlers::monitoring_status))
        .route("/monitoring/metrics/history", get(handlers::metrics_history))
        .route("/monitoring/alerts", get(handlers::list_alerts))
        .route(
            "/monitoring/alerts/{metric_type}/resolve",
            post(handlers::resolve_alert),
        )
        .route("/exceptions/summary", get(handlers::exception_summary))
        .route("/exceptions/unresolved", get(handlers::unresolved_exceptions))
        .route("/exceptions/{kind}/resolve", post(handlers::resolve_exceptions))
        .route("/scaling/recommendation", get(handlers::scaling_recommendation))
        .route("/scaling/evaluate", post(handlers::evaluate_scaling))
        .route("/scaling/manual", post(handlers::manual_scale))
        .route("/scaling/history", get(handlers::scaling_history))
        .route("/scaling/summary", get(handlers::scaling_summary))
        .route("/notifications/history", get(handlers::notification_history))
        .route("/notifications/stats", get(handlers::notification_stats))
        .route("/notifications/test", post(handlers::test_notification))
        .route("/health/detailed", get(handlers::detailed_health))
        .with_state(state)
}
