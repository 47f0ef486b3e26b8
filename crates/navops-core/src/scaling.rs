//! Scaling recommendations, events, and reports.

use serde::{Deserialize, Serialize};

/// Ephemeral judgment of whether to add or remove capacity.
///
/// Computed on demand from the latest metric sample; never persisted.
/// Both flags may be false (steady state). The autoscaler gives
/// scale-up priority if both are somehow set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingRecommendation {
    pub timestamp: u64,
    pub should_scale_up: bool,
    pub should_scale_down: bool,
    /// Snapshot of the metrics that drove the judgment.
    pub current: RecommendationMetrics,
    /// Human-readable triggering conditions, for display in reports.
    pub reasons: Vec<String>,
}

/// The subset of a `MetricSample` consulted by the recommendation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub avg_response_time_ms: f64,
    pub request_count: u64,
}

/// What the autoscaler decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    NoAction,
}

impl ScalingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingAction::ScaleUp => "scale_up",
            ScalingAction::ScaleDown => "scale_down",
            ScalingAction::NoAction => "no_action",
        }
    }
}

/// Replica-count view of a deployment at a point in time.
///
/// `ready_replicas` / `available_replicas` are only populated by
/// backends that expose them (the orchestrator adapter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaStatus {
    pub replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<u32>,
    pub backend: String,
    pub deployment: String,
    pub timestamp: u64,
}

/// One executed (or skipped) scaling operation. Append-only history,
/// immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingEvent {
    pub timestamp: u64,
    pub action: ScalingAction,
    pub reasons: Vec<String>,
    pub before: ReplicaStatus,
    pub after: ReplicaStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Human-readable explanation of a scaling event, for the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingReport {
    pub title: String,
    pub timestamp: u64,
    pub action: ScalingAction,
    pub reasons: Vec<String>,
    pub before: ReplicaStatus,
    pub after: ReplicaStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub recommendation: String,
}

/// Aggregate view of the scaling history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingSummary {
    pub current_replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub backend: String,
    pub total_events: usize,
    pub scale_up_count: usize,
    pub scale_down_count: usize,
    pub successful_events: usize,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<ScalingEvent>,
}
