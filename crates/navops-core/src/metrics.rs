//! Metric samples, alerts, and status reports.

use serde::{Deserialize, Serialize};

// ── Samples ───────────────────────────────────────────────────────

/// Point-in-time process health sample.
///
/// Created once per sampling tick and immutable once appended to the
/// sampler's history ring. Counters are cumulative since process start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// Unix timestamp (seconds) the sample was taken.
    pub timestamp: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub memory_available_mb: f64,
    pub disk_percent: f64,
    /// Cumulative request count.
    pub request_count: u64,
    /// Cumulative error count.
    pub error_count: u64,
    /// Average over the sliding response-time window.
    pub avg_response_time_ms: f64,
    pub active_connections: u32,
}

/// Threshold configuration for alert evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    /// Error rate as a fraction (0.0–1.0).
    pub error_rate: f64,
    pub response_time_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            disk_percent: 90.0,
            error_rate: 0.05,
            response_time_ms: 1000.0,
        }
    }
}

// ── Alerts ────────────────────────────────────────────────────────

/// The metric a threshold breach is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    ErrorRate,
    ResponseTime,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Disk => "disk",
            MetricKind::ErrorRate => "error_rate",
            MetricKind::ResponseTime => "response_time",
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(MetricKind::Cpu),
            "memory" => Ok(MetricKind::Memory),
            "disk" => Ok(MetricKind::Disk),
            "error_rate" => Ok(MetricKind::ErrorRate),
            "response_time" => Ok(MetricKind::ResponseTime),
            other => Err(format!("unknown metric type: {other}")),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

/// A standing, resolvable record of a threshold breach.
///
/// At most one unresolved alert exists per `metric` at any time; a new
/// breach while one is unresolved is suppressed. Alerts are never
/// deleted, only marked resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub timestamp: u64,
    pub severity: AlertSeverity,
    pub metric: MetricKind,
    /// Observed value at breach time.
    pub value: f64,
    /// The threshold that was crossed.
    pub threshold: f64,
    pub message: String,
    pub resolved: bool,
}

// ── Status ────────────────────────────────────────────────────────

/// Overall health derived from unresolved alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Warning,
    Critical,
}

/// Per-severity counts of unresolved alerts, plus the most recent ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertCounts {
    pub total: usize,
    pub critical: usize,
    pub error: usize,
    pub warning: usize,
    /// Last five unresolved alerts, oldest first.
    pub recent: Vec<Alert>,
}

/// Aggregate status view returned by `MetricsSampler::current_status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub timestamp: u64,
    pub status: OverallStatus,
    pub metrics: MetricSample,
    /// Derived from the cumulative counters (0.0 when no requests).
    pub error_rate: f64,
    pub alerts: AlertCounts,
    pub thresholds: Thresholds,
}
