//! Replica-count decision loop.
//!
//! Turns a [`ScalingRecommendation`] into a backend call. The step
//! sizes are fixed: scale-up adds two replicas, scale-down removes
//! one, both clamped to the configured `[min, max]` band. The lock on
//! the internal state is held across the read, the backend call, and
//! the update, so concurrent evaluations serialize and never double
//! apply a step.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use navops_core::epoch_secs;
use navops_core::scaling::{
    ReplicaStatus, ScalingAction, ScalingEvent, ScalingRecommendation, ScalingReport,
    ScalingSummary,
};

use crate::backend::DeploymentBackend;

const SCALE_UP_STEP: u32 = 2;
const SCALE_DOWN_STEP: u32 = 1;
const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("target replicas {target} outside allowed range [{min}, {max}]")]
    OutOfBounds { target: u32, min: u32, max: u32 },
}

struct Inner {
    current_replicas: u32,
    history: Vec<ScalingEvent>,
}

/// Drives replica-count changes through a [`DeploymentBackend`].
pub struct Autoscaler {
    backend: Arc<dyn DeploymentBackend>,
    deployment_name: String,
    min_replicas: u32,
    max_replicas: u32,
    inner: Mutex<Inner>,
}

impl Autoscaler {
    pub fn new(
        backend: Arc<dyn DeploymentBackend>,
        deployment_name: impl Into<String>,
        min_replicas: u32,
        max_replicas: u32,
    ) -> Self {
        Self {
            backend,
            deployment_name: deployment_name.into(),
            min_replicas,
            max_replicas,
            inner: Mutex::new(Inner {
                current_replicas: min_replicas,
                history: Vec::new(),
            }),
        }
    }

    pub fn min_replicas(&self) -> u32 {
        self.min_replicas
    }

    pub fn max_replicas(&self) -> u32 {
        self.max_replicas
    }

    pub async fn current_replicas(&self) -> u32 {
        self.inner.lock().await.current_replicas
    }

    fn replica_status(&self, replicas: u32, now: u64) -> ReplicaStatus {
        ReplicaStatus {
            replicas,
            ready_replicas: None,
            available_replicas: None,
            backend: self.backend.kind().to_string(),
            deployment: self.deployment_name.clone(),
            timestamp: now,
        }
    }

    /// Apply a recommendation. Scale-up wins if both flags are set.
    /// A `no_action` outcome is returned to the caller but never
    /// enters the history.
    pub async fn evaluate(&self, rec: &ScalingRecommendation) -> ScalingEvent {
        let mut inner = self.inner.lock().await;
        let now = epoch_secs();
        let current = inner.current_replicas;

        let (action, target) = if rec.should_scale_up {
            (
                ScalingAction::ScaleUp,
                (current + SCALE_UP_STEP).min(self.max_replicas),
            )
        } else if rec.should_scale_down {
            (
                ScalingAction::ScaleDown,
                current.saturating_sub(SCALE_DOWN_STEP).max(self.min_replicas),
            )
        } else {
            (ScalingAction::NoAction, current)
        };

        if action == ScalingAction::NoAction || target == current {
            return ScalingEvent {
                timestamp: now,
                action: ScalingAction::NoAction,
                reasons: rec.reasons.clone(),
                before: self.replica_status(current, now),
                after: self.replica_status(current, now),
                success: true,
                error_message: None,
            };
        }

        let event = self
            .apply(&mut inner, action, target, rec.reasons.clone(), now)
            .await;
        inner.history.push(event.clone());
        event
    }

    /// Scale straight to `target`, bypassing the recommendation rule.
    /// Rejects targets outside the allowed band before touching the
    /// backend; a rejected request leaves no trace in the history.
    pub async fn manual_scale(
        &self,
        target: u32,
        reason: impl Into<String>,
    ) -> Result<ScalingEvent, ScaleError> {
        if target < self.min_replicas || target > self.max_replicas {
            return Err(ScaleError::OutOfBounds {
                target,
                min: self.min_replicas,
                max: self.max_replicas,
            });
        }

        let mut inner = self.inner.lock().await;
        let now = epoch_secs();
        let current = inner.current_replicas;
        let action = if target > current {
            ScalingAction::ScaleUp
        } else if target < current {
            ScalingAction::ScaleDown
        } else {
            ScalingAction::NoAction
        };

        let mut event = self
            .apply(&mut inner, action, target, vec![reason.into()], now)
            .await;
        if !event.success {
            // Nothing changed, so the event reports no action taken.
            event.action = ScalingAction::NoAction;
        }
        inner.history.push(event.clone());
        Ok(event)
    }

    async fn apply(
        &self,
        inner: &mut Inner,
        action: ScalingAction,
        target: u32,
        reasons: Vec<String>,
        now: u64,
    ) -> ScalingEvent {
        let current = inner.current_replicas;
        let before = self.replica_status(current, now);

        match self.backend.scale(&self.deployment_name, target).await {
            Ok(()) => {
                inner.current_replicas = target;
                info!(
                    deployment = %self.deployment_name,
                    action = action.as_str(),
                    from = current,
                    to = target,
                    "scaling applied"
                );
                ScalingEvent {
                    timestamp: now,
                    action,
                    reasons,
                    before,
                    after: self.replica_status(target, now),
                    success: true,
                    error_message: None,
                }
            }
            Err(e) => {
                warn!(
                    deployment = %self.deployment_name,
                    action = action.as_str(),
                    from = current,
                    to = target,
                    error = %e,
                    "scaling failed, replica count unchanged"
                );
                ScalingEvent {
                    timestamp: now,
                    action,
                    reasons,
                    before,
                    after: self.replica_status(current, now),
                    success: false,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    /// Most recent events, newest last.
    pub async fn history(&self, limit: Option<usize>) -> Vec<ScalingEvent> {
        let inner = self.inner.lock().await;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let start = inner.history.len().saturating_sub(limit);
        inner.history[start..].to_vec()
    }

    pub async fn summary(&self) -> ScalingSummary {
        let inner = self.inner.lock().await;
        let total = inner.history.len();
        let scale_up_count = inner
            .history
            .iter()
            .filter(|e| e.action == ScalingAction::ScaleUp)
            .count();
        let scale_down_count = inner
            .history
            .iter()
            .filter(|e| e.action == ScalingAction::ScaleDown)
            .count();
        let successful = inner.history.iter().filter(|e| e.success).count();
        ScalingSummary {
            current_replicas: inner.current_replicas,
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            backend: self.backend.kind().to_string(),
            total_events: total,
            scale_up_count,
            scale_down_count,
            successful_events: successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            last_event: inner.history.last().cloned(),
        }
    }

    /// Expand an event into a notifier-ready report.
    pub fn generate_report(&self, event: &ScalingEvent) -> ScalingReport {
        let recommendation = match event.action {
            ScalingAction::ScaleUp => {
                "Capacity was increased; watch whether load pressure subsides.".to_string()
            }
            ScalingAction::ScaleDown => {
                "Capacity was reduced; watch for renewed load pressure.".to_string()
            }
            ScalingAction::NoAction => "No scaling was required.".to_string(),
        };
        ScalingReport {
            title: format!("Scaling report: {}", self.deployment_name),
            timestamp: event.timestamp,
            action: event.action,
            reasons: event.reasons.clone(),
            before: event.before.clone(),
            after: event.after.clone(),
            success: event.success,
            error_message: event.error_message.clone(),
            recommendation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendStatus, NoopBackend};
    use async_trait::async_trait;

    struct FailingBackend;

    #[async_trait]
    impl DeploymentBackend for FailingBackend {
        async fn scale(&self, _deployment: &str, _replicas: u32) -> anyhow::Result<()> {
            anyhow::bail!("backend unavailable")
        }

        async fn status(&self, _deployment: &str) -> BackendStatus {
            BackendStatus::default()
        }

        fn kind(&self) -> &'static str {
            "failing"
        }
    }

    fn make_scaler() -> Autoscaler {
        Autoscaler::new(Arc::new(NoopBackend), "svc", 3, 10)
    }

    fn make_recommendation(up: bool, down: bool) -> ScalingRecommendation {
        ScalingRecommendation {
            timestamp: epoch_secs(),
            should_scale_up: up,
            should_scale_down: down,
            current: navops_core::scaling::RecommendationMetrics {
                cpu_percent: 50.0,
                memory_percent: 50.0,
                avg_response_time_ms: 100.0,
                request_count: 10,
            },
            reasons: vec!["test".to_string()],
        }
    }

    #[tokio::test]
    async fn scale_up_adds_two_replicas() {
        let scaler = make_scaler();
        let event = scaler.evaluate(&make_recommendation(true, false)).await;
        assert_eq!(event.action, ScalingAction::ScaleUp);
        assert!(event.success);
        assert_eq!(event.before.replicas, 3);
        assert_eq!(event.after.replicas, 5);
        assert_eq!(scaler.current_replicas().await, 5);
    }

    #[tokio::test]
    async fn scale_down_removes_one_replica() {
        let scaler = make_scaler();
        scaler.evaluate(&make_recommendation(true, false)).await;
        let event = scaler.evaluate(&make_recommendation(false, true)).await;
        assert_eq!(event.action, ScalingAction::ScaleDown);
        assert_eq!(event.before.replicas, 5);
        assert_eq!(event.after.replicas, 4);
        assert_eq!(scaler.current_replicas().await, 4);
    }

    #[tokio::test]
    async fn scale_up_wins_when_both_flags_set() {
        let scaler = make_scaler();
        let event = scaler.evaluate(&make_recommendation(true, true)).await;
        assert_eq!(event.action, ScalingAction::ScaleUp);
        assert_eq!(event.after.replicas, 5);
    }

    #[tokio::test]
    async fn replicas_never_exceed_max() {
        let scaler = make_scaler();
        for _ in 0..10 {
            scaler.evaluate(&make_recommendation(true, false)).await;
        }
        assert_eq!(scaler.current_replicas().await, 10);
    }

    #[tokio::test]
    async fn replicas_never_drop_below_min() {
        let scaler = make_scaler();
        for _ in 0..5 {
            scaler.evaluate(&make_recommendation(false, true)).await;
        }
        assert_eq!(scaler.current_replicas().await, 3);
    }

    #[tokio::test]
    async fn no_action_not_recorded_in_history() {
        let scaler = make_scaler();
        let event = scaler.evaluate(&make_recommendation(false, false)).await;
        assert_eq!(event.action, ScalingAction::NoAction);
        assert!(scaler.history(None).await.is_empty());

        // Steady state at the floor is also a no-action.
        let event = scaler.evaluate(&make_recommendation(false, true)).await;
        assert_eq!(event.action, ScalingAction::NoAction);
        assert!(scaler.history(None).await.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_leaves_replicas_unchanged() {
        let scaler = Autoscaler::new(Arc::new(FailingBackend), "svc", 3, 10);
        let event = scaler.evaluate(&make_recommendation(true, false)).await;
        assert!(!event.success);
        assert_eq!(event.after.replicas, 3);
        assert!(event.error_message.as_deref().unwrap().contains("unavailable"));
        assert_eq!(scaler.current_replicas().await, 3);

        // The failed attempt is still part of the history.
        let history = scaler.history(None).await;
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
    }

    #[tokio::test]
    async fn manual_scale_within_bounds() {
        let scaler = make_scaler();
        let event = scaler.manual_scale(7, "capacity test").await.unwrap();
        assert_eq!(event.action, ScalingAction::ScaleUp);
        assert_eq!(event.after.replicas, 7);
        assert_eq!(scaler.current_replicas().await, 7);
        assert_eq!(event.reasons, vec!["capacity test".to_string()]);
    }

    #[tokio::test]
    async fn manual_scale_backend_failure_reports_no_action() {
        let scaler = Autoscaler::new(Arc::new(FailingBackend), "svc", 3, 10);
        let event = scaler.manual_scale(7, "capacity test").await.unwrap();
        assert_eq!(event.action, ScalingAction::NoAction);
        assert!(!event.success);
        assert_eq!(scaler.current_replicas().await, 3);
        assert_eq!(scaler.history(None).await.len(), 1);
    }

    #[tokio::test]
    async fn manual_scale_out_of_bounds_is_rejected() {
        let scaler = make_scaler();
        let err = scaler.manual_scale(15, "too big").await.unwrap_err();
        match err {
            ScaleError::OutOfBounds { target, min, max } => {
                assert_eq!(target, 15);
                assert_eq!(min, 3);
                assert_eq!(max, 10);
            }
        }
        assert_eq!(scaler.current_replicas().await, 3);
        assert!(scaler.history(None).await.is_empty());
    }

    #[tokio::test]
    async fn summary_counts_actions() {
        let scaler = make_scaler();
        scaler.evaluate(&make_recommendation(true, false)).await;
        scaler.evaluate(&make_recommendation(false, true)).await;
        let summary = scaler.summary().await;
        assert_eq!(summary.total_events, 2);
        assert_eq!(summary.scale_up_count, 1);
        assert_eq!(summary.scale_down_count, 1);
        assert_eq!(summary.successful_events, 2);
        assert!((summary.success_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.current_replicas, 4);
    }

    #[tokio::test]
    async fn report_describes_event() {
        let scaler = make_scaler();
        let event = scaler.evaluate(&make_recommendation(true, false)).await;
        let report = scaler.generate_report(&event);
        assert_eq!(report.action, ScalingAction::ScaleUp);
        assert!(report.title.contains("svc"));
        assert!(report.recommendation.contains("increased"));
    }
}
