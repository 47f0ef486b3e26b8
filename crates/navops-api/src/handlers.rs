//! REST API handlers.
//!
//! Each handler delegates to one component and wraps the result in a
//! JSON envelope. Subsystem failures surface as JSON bodies, not 5xx.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use navops_core::metrics::MetricKind;
use navops_core::notify::AlertLevel;
use navops_core::scaling::ScalingAction;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Monitoring ─────────────────────────────────────────────────

/// GET /monitoring/status
pub async fn monitoring_status(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.sampler.current_status().await)
}

#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_minutes")]
    pub minutes: u64,
}

fn default_minutes() -> u64 {
    60
}

/// GET /monitoring/metrics/history?minutes=N
pub async fn metrics_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    ApiResponse::ok(state.sampler.history(params.minutes).await)
}

#[derive(Deserialize)]
pub struct AlertParams {
    #[serde(default)]
    pub include_resolved: bool,
}

/// GET /monitoring/alerts?include_resolved=bool
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(params): Query<AlertParams>,
) -> impl IntoResponse {
    ApiResponse::ok(state.sampler.alerts(params.include_resolved).await)
}

/// POST /monitoring/alerts/{metric_type}/resolve
pub async fn resolve_alert(
    State(state): State<ApiState>,
    Path(metric_type): Path<String>,
) -> impl IntoResponse {
    match MetricKind::from_str(&metric_type) {
        Ok(metric) => {
            let resolved = state.sampler.resolve_alert(metric).await;
            ApiResponse::ok(json!({
                "metric_type": metric.as_str(),
                "resolved": resolved,
            }))
            .into_response()
        }
        Err(e) => error_response(&e, StatusCode::BAD_REQUEST).into_response(),
    }
}

// ── Exceptions ─────────────────────────────────────────────────

/// GET /exceptions/summary
pub async fn exception_summary(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.executor.summary())
}

/// GET /exceptions/unresolved
pub async fn unresolved_exceptions(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.executor.unresolved())
}

/// POST /exceptions/{kind}/resolve
pub async fn resolve_exceptions(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    let count = state.executor.mark_resolved(&kind);
    ApiResponse::ok(json!({ "kind": kind, "resolved_count": count }))
}

// ── Scaling ────────────────────────────────────────────────────

/// GET /scaling/recommendation
pub async fn scaling_recommendation(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.sampler.recommendation().await)
}

/// POST /scaling/evaluate
pub async fn evaluate_scaling(State(state): State<ApiState>) -> impl IntoResponse {
    let rec = state.sampler.recommendation().await;
    let event = state.scaler.evaluate(&rec).await;
    if event.action != ScalingAction::NoAction {
        let report = state.scaler.generate_report(&event);
        state.notifier.send_scaling_report(&report).await;
    }
    ApiResponse::ok(event)
}

#[derive(Deserialize)]
pub struct ManualScaleParams {
    pub replicas: u32,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "manual".to_string()
}

/// POST /scaling/manual?replicas=N&reason=S
pub async fn manual_scale(
    State(state): State<ApiState>,
    Query(params): Query<ManualScaleParams>,
) -> impl IntoResponse {
    match state.scaler.manual_scale(params.replicas, params.reason).await {
        Ok(event) => ApiResponse::ok(event).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// GET /scaling/history?limit=N
pub async fn scaling_history(
    State(state): State<ApiState>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    ApiResponse::ok(state.scaler.history(params.limit).await)
}

/// GET /scaling/summary
pub async fn scaling_summary(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.scaler.summary().await)
}

// ── Notifications ──────────────────────────────────────────────

/// GET /notifications/history?limit=N
pub async fn notification_history(
    State(state): State<ApiState>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    ApiResponse::ok(state.notifier.history(params.limit))
}

/// GET /notifications/stats
pub async fn notification_stats(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.notifier.stats())
}

/// POST /notifications/test
pub async fn test_notification(State(state): State<ApiState>) -> impl IntoResponse {
    state
        .notifier
        .send_alert(
            "Test notification",
            "This is a test notification from navops.",
            AlertLevel::Info,
            None,
        )
        .await;
    let recent = state.notifier.history(Some(1));
    ApiResponse::ok(json!({
        "sent": true,
        "record": recent.last(),
    }))
}

// ── Health ─────────────────────────────────────────────────────

/// GET /health/detailed
///
/// Aggregates the four subsystems into one overall status. Always
/// returns 200; per-subsystem trouble shows up in the body.
pub async fn detailed_health(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.sampler.current_status().await;
    let exceptions = state.executor.summary();
    let degraded_ops = state.executor.degraded_operations();
    let scaling = state.scaler.summary().await;
    let notifications = state.notifier.stats();

    let monitoring_health = match status.status {
        navops_core::metrics::OverallStatus::Healthy => "healthy",
        navops_core::metrics::OverallStatus::Warning => "degraded",
        navops_core::metrics::OverallStatus::Critical => "critical",
    };
    let resilience_health = if !degraded_ops.is_empty() {
        "critical"
    } else if exceptions.unresolved > 0 {
        "degraded"
    } else {
        "healthy"
    };
    let scaling_health = match &scaling.last_event {
        Some(event) if !event.success => "degraded",
        _ => "healthy",
    };
    let notification_health = if notifications.failed > 0 {
        "degraded"
    } else {
        "healthy"
    };

    let subsystems = [
        monitoring_health,
        resilience_health,
        scaling_health,
        notification_health,
    ];
    let overall = if subsystems.contains(&"critical") {
        "critical"
    } else if subsystems.contains(&"degraded") {
        "degraded"
    } else {
        "healthy"
    };

    ApiResponse::ok(json!({
        "status": overall,
        "monitoring": {
            "health": monitoring_health,
            "detail": status,
        },
        "exceptions": {
            "health": resilience_health,
            "degraded_operations": degraded_ops,
            "detail": exceptions,
        },
        "scaling": {
            "health": scaling_health,
            "detail": scaling,
        },
        "notifications": {
            "health": notification_health,
            "detail": notifications,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use navops_autoscale::{Autoscaler, NoopBackend};
    use navops_core::metrics::Thresholds;
    use navops_core::notify::NotifyConfig;
    use navops_core::resilience::RetryConfig;
    use navops_monitor::{MetricsSampler, StaticGauge};
    use navops_notify::Notifier;
    use navops_resilience::ResilientExecutor;

    fn make_state(cpu: f64) -> ApiState {
        let gauge = Arc::new(StaticGauge::new(cpu, 50.0, 50.0));
        ApiState {
            sampler: Arc::new(MetricsSampler::new(gauge, Thresholds::default())),
            executor: Arc::new(ResilientExecutor::new(RetryConfig::default())),
            scaler: Arc::new(Autoscaler::new(Arc::new(NoopBackend), "svc", 3, 10)),
            notifier: Arc::new(Notifier::new(NotifyConfig::default()).unwrap()),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_endpoint_reports_current_state() {
        let state = make_state(50.0);
        state.sampler.sample().await;
        let response = monitoring_status(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn resolve_alert_rejects_unknown_metric() {
        let state = make_state(50.0);
        let response = resolve_alert(State(state), Path("bogus".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn resolve_alert_accepts_known_metric() {
        let state = make_state(96.0);
        state.sampler.sample().await;
        let response = resolve_alert(State(state), Path("cpu".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["resolved"], true);
    }

    #[tokio::test]
    async fn manual_scale_out_of_bounds_is_400() {
        let state = make_state(50.0);
        let response = manual_scale(
            State(state),
            Query(ManualScaleParams {
                replicas: 15,
                reason: "test".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_scale_within_bounds_succeeds() {
        let state = make_state(50.0);
        let response = manual_scale(
            State(state),
            Query(ManualScaleParams {
                replicas: 6,
                reason: "test".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["after"]["replicas"], 6);
    }

    #[tokio::test]
    async fn evaluate_dispatches_report_when_action_taken() {
        // 96% cpu drives a scale-up recommendation after one sample.
        let state = make_state(96.0);
        state.sampler.sample().await;
        let response = evaluate_scaling(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["action"], "scale_up");

        // Notifications are disabled, so the dispatch left a mock record.
        let history = state.notifier.history(None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].channel, "mock");
    }

    #[tokio::test]
    async fn test_notification_endpoint_records_send() {
        let state = make_state(50.0);
        let response = test_notification(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.notifier.stats().total, 1);
    }

    #[tokio::test]
    async fn detailed_health_is_healthy_at_rest() {
        let state = make_state(50.0);
        state.sampler.sample().await;
        let response = detailed_health(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn detailed_health_goes_critical_under_pressure() {
        let state = make_state(96.0);
        state.sampler.sample().await;
        let response = detailed_health(State(state)).await.into_response();
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "critical");
        assert_eq!(body["data"]["monitoring"]["health"], "critical");
    }

    #[tokio::test]
    async fn history_returns_recent_samples() {
        let state = make_state(50.0);
        state.sampler.sample().await;
        let response = metrics_history(
            State(state),
            Query(HistoryParams { minutes: 60 }),
        )
        .await
        .into_response();
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }
}
