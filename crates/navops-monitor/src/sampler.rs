//! The metrics sampler — counters, history ring, and threshold alerts.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use navops_core::{
    epoch_secs, Alert, AlertCounts, AlertSeverity, MetricKind, MetricSample, OverallStatus,
    RecommendationMetrics, ScalingRecommendation, StatusReport, Thresholds,
};

use crate::gauge::MetricGauge;

/// Maximum retained samples (oldest evicted first).
const HISTORY_CAP: usize = 1000;

/// Sliding window size for the average response time.
const WINDOW_CAP: usize = 100;

/// State mutated by both the request path and the sampling tick.
/// Guarded by a single mutex so every sample is a consistent snapshot.
struct Inner {
    history: VecDeque<MetricSample>,
    response_times: VecDeque<f64>,
    request_count: u64,
    error_count: u64,
    active_connections: u32,
    alerts: Vec<Alert>,
}

/// Samples process health on a fixed interval and tracks request
/// counters fed in by request handlers.
pub struct MetricsSampler {
    gauge: Arc<dyn MetricGauge>,
    thresholds: Thresholds,
    inner: Mutex<Inner>,
}

impl MetricsSampler {
    pub fn new(gauge: Arc<dyn MetricGauge>, thresholds: Thresholds) -> Self {
        info!(
            cpu = thresholds.cpu_percent,
            memory = thresholds.memory_percent,
            disk = thresholds.disk_percent,
            "metrics sampler initialized"
        );
        Self {
            gauge,
            thresholds,
            inner: Mutex::new(Inner {
                history: VecDeque::with_capacity(HISTORY_CAP),
                response_times: VecDeque::with_capacity(WINDOW_CAP),
                request_count: 0,
                error_count: 0,
                active_connections: 0,
                alerts: Vec::new(),
            }),
        }
    }

    /// Record one handled request. Never fails.
    pub async fn record_request(&self, latency_ms: f64, is_error: bool) {
        let mut inner = self.inner.lock().await;
        inner.request_count += 1;
        if is_error {
            inner.error_count += 1;
        }
        if inner.response_times.len() == WINDOW_CAP {
            inner.response_times.pop_front();
        }
        inner.response_times.push_back(latency_ms);
    }

    pub async fn increment_connections(&self) {
        let mut inner = self.inner.lock().await;
        inner.active_connections += 1;
    }

    /// Saturating at zero.
    pub async fn decrement_connections(&self) {
        let mut inner = self.inner.lock().await;
        inner.active_connections = inner.active_connections.saturating_sub(1);
    }

    /// Take a sample: gauge read, counter snapshot, history append, and
    /// threshold evaluation — the latter three in one critical section.
    pub async fn sample(&self) -> MetricSample {
        // Gauge introspection may block briefly; keep it off the
        // request-path lock.
        let reading = self.gauge.read();

        let mut inner = self.inner.lock().await;
        let sample = Self::sample_locked(&mut inner, &reading);
        self.check_thresholds(&mut inner, &sample);
        sample
    }

    fn sample_locked(inner: &mut Inner, reading: &crate::gauge::GaugeReading) -> MetricSample {
        let avg_response_time_ms = if inner.response_times.is_empty() {
            0.0
        } else {
            inner.response_times.iter().sum::<f64>() / inner.response_times.len() as f64
        };

        let sample = MetricSample {
            timestamp: epoch_secs(),
            cpu_percent: reading.cpu_percent,
            memory_percent: reading.memory_percent,
            memory_used_mb: reading.memory_used_mb,
            memory_available_mb: reading.memory_available_mb,
            disk_percent: reading.disk_percent,
            request_count: inner.request_count,
            error_count: inner.error_count,
            avg_response_time_ms,
            active_connections: inner.active_connections,
        };

        if inner.history.len() == HISTORY_CAP {
            inner.history.pop_front();
        }
        inner.history.push_back(sample.clone());
        sample
    }

    /// Five independent checks; each may create at most one unresolved
    /// alert per metric type.
    fn check_thresholds(&self, inner: &mut Inner, sample: &MetricSample) {
        let t = &self.thresholds;

        if sample.cpu_percent > t.cpu_percent {
            let severity = if sample.cpu_percent > 95.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            Self::create_alert(
                inner,
                severity,
                MetricKind::Cpu,
                sample.cpu_percent,
                t.cpu_percent,
                format!("cpu usage high: {:.1}%", sample.cpu_percent),
            );
        }

        if sample.memory_percent > t.memory_percent {
            let severity = if sample.memory_percent > 95.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            Self::create_alert(
                inner,
                severity,
                MetricKind::Memory,
                sample.memory_percent,
                t.memory_percent,
                format!("memory usage high: {:.1}%", sample.memory_percent),
            );
        }

        if sample.disk_percent > t.disk_percent {
            Self::create_alert(
                inner,
                AlertSeverity::Error,
                MetricKind::Disk,
                sample.disk_percent,
                t.disk_percent,
                format!("disk usage high: {:.1}%", sample.disk_percent),
            );
        }

        if sample.request_count > 0 {
            let error_rate = sample.error_count as f64 / sample.request_count as f64;
            if error_rate > t.error_rate {
                Self::create_alert(
                    inner,
                    AlertSeverity::Error,
                    MetricKind::ErrorRate,
                    error_rate,
                    t.error_rate,
                    format!(
                        "error rate high: {:.2}% ({}/{})",
                        error_rate * 100.0,
                        sample.error_count,
                        sample.request_count
                    ),
                );
            }
        }

        if sample.avg_response_time_ms > t.response_time_ms {
            Self::create_alert(
                inner,
                AlertSeverity::Warning,
                MetricKind::ResponseTime,
                sample.avg_response_time_ms,
                t.response_time_ms,
                format!(
                    "average response time high: {:.1}ms",
                    sample.avg_response_time_ms
                ),
            );
        }
    }

    fn create_alert(
        inner: &mut Inner,
        severity: AlertSeverity,
        metric: MetricKind,
        value: f64,
        threshold: f64,
        message: String,
    ) {
        // Suppress while an unresolved alert for this metric exists.
        let already_open = inner
            .alerts
            .iter()
            .any(|a| !a.resolved && a.metric == metric);
        if already_open {
            return;
        }

        warn!(%metric, ?severity, value, threshold, "alert created: {message}");
        inner.alerts.push(Alert {
            timestamp: epoch_secs(),
            severity,
            metric,
            value,
            threshold,
            message,
            resolved: false,
        });
    }

    /// Take a sample and derive the overall status from unresolved
    /// alerts: critical > warning > healthy.
    pub async fn current_status(&self) -> StatusReport {
        let reading = self.gauge.read();

        let mut inner = self.inner.lock().await;
        let sample = Self::sample_locked(&mut inner, &reading);
        self.check_thresholds(&mut inner, &sample);

        let unresolved: Vec<&Alert> = inner.alerts.iter().filter(|a| !a.resolved).collect();
        let status = if unresolved
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical)
        {
            OverallStatus::Critical
        } else if unresolved.is_empty() {
            OverallStatus::Healthy
        } else {
            OverallStatus::Warning
        };

        let error_rate = if sample.request_count > 0 {
            sample.error_count as f64 / sample.request_count as f64
        } else {
            0.0
        };

        let recent: Vec<Alert> = unresolved
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|a| (*a).clone())
            .collect();

        StatusReport {
            timestamp: sample.timestamp,
            status,
            error_rate,
            alerts: AlertCounts {
                total: unresolved.len(),
                critical: unresolved
                    .iter()
                    .filter(|a| a.severity == AlertSeverity::Critical)
                    .count(),
                error: unresolved
                    .iter()
                    .filter(|a| a.severity == AlertSeverity::Error)
                    .count(),
                warning: unresolved
                    .iter()
                    .filter(|a| a.severity == AlertSeverity::Warning)
                    .count(),
                recent,
            },
            metrics: sample,
            thresholds: self.thresholds.clone(),
        }
    }

    /// Samples from the last `minutes` minutes, oldest first.
    pub async fn history(&self, minutes: u64) -> Vec<MetricSample> {
        let cutoff = epoch_secs().saturating_sub(minutes * 60);
        let inner = self.inner.lock().await;
        inner
            .history
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub async fn alerts(&self, include_resolved: bool) -> Vec<Alert> {
        let inner = self.inner.lock().await;
        inner
            .alerts
            .iter()
            .filter(|a| include_resolved || !a.resolved)
            .cloned()
            .collect()
    }

    /// Mark all unresolved alerts for a metric as resolved. Returns
    /// whether any alert was affected.
    pub async fn resolve_alert(&self, metric: MetricKind) -> bool {
        let mut inner = self.inner.lock().await;
        let mut any = false;
        for alert in inner.alerts.iter_mut() {
            if alert.metric == metric && !alert.resolved {
                alert.resolved = true;
                any = true;
                info!(%metric, "alert resolved: {}", alert.message);
            }
        }
        any
    }

    /// Zero the request/error counters and the latency window.
    pub async fn reset_counters(&self) {
        let mut inner = self.inner.lock().await;
        inner.request_count = 0;
        inner.error_count = 0;
        inner.response_times.clear();
        info!("request counters reset");
    }

    /// Derive a scaling recommendation from a fresh sample.
    ///
    /// The rule is deterministic over the latest sample with no
    /// hysteresis; oscillation near the cutoffs is a known limitation.
    pub async fn recommendation(&self) -> ScalingRecommendation {
        let sample = self.sample().await;
        let t = &self.thresholds;

        let should_scale_up = sample.cpu_percent > 70.0
            || sample.memory_percent > 75.0
            || sample.avg_response_time_ms > t.response_time_ms * 0.8;

        let should_scale_down = sample.cpu_percent < 30.0
            && sample.memory_percent < 40.0
            && sample.avg_response_time_ms < t.response_time_ms * 0.3
            && sample.request_count < 100;

        let mut reasons = Vec::new();
        if should_scale_up {
            if sample.cpu_percent > 70.0 {
                reasons.push(format!("cpu usage high: {:.1}%", sample.cpu_percent));
            }
            if sample.memory_percent > 75.0 {
                reasons.push(format!("memory usage high: {:.1}%", sample.memory_percent));
            }
            if sample.avg_response_time_ms > t.response_time_ms * 0.8 {
                reasons.push(format!(
                    "slow responses: {:.1}ms",
                    sample.avg_response_time_ms
                ));
            }
        }
        if should_scale_down {
            reasons.push("resource usage low, safe to scale down".to_string());
        }
        if !should_scale_up && !should_scale_down {
            reasons.push("resource usage normal, no adjustment needed".to_string());
        }

        ScalingRecommendation {
            timestamp: sample.timestamp,
            should_scale_up,
            should_scale_down,
            current: RecommendationMetrics {
                cpu_percent: sample.cpu_percent,
                memory_percent: sample.memory_percent,
                avg_response_time_ms: sample.avg_response_time_ms,
                request_count: sample.request_count,
            },
            reasons,
        }
    }

    /// Run the sampling loop until the shutdown signal fires. An
    /// in-flight tick always completes before exit.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "metrics sampler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let sample = self.sample().await;
                    debug!(
                        cpu = sample.cpu_percent,
                        memory = sample.memory_percent,
                        requests = sample.request_count,
                        "sample taken"
                    );
                }
                _ = shutdown.changed() => {
                    info!("metrics sampler shutting down");
                    break;
                }
            }
        }
    }
}
