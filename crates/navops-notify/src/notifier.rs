//! The notification dispatcher.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use navops_core::epoch_secs;
use navops_core::metrics::StatusReport;
use navops_core::notify::{
    AlertLevel, ChannelConfig, NotificationRecord, NotifyConfig, NotifyStats,
};
use navops_core::resilience::ExceptionSummary;
use navops_core::scaling::ScalingReport;

use crate::format;

const MESSAGE_CAP: usize = 200;
const DEFAULT_HISTORY_LIMIT: usize = 50;
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans alerts out to the configured channels and keeps an append-only
/// send history. Cheap to share behind an `Arc`.
pub struct Notifier {
    config: NotifyConfig,
    client: reqwest::Client,
    history: Mutex<Vec<NotificationRecord>>,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            config,
            client,
            history: Mutex::new(Vec::new()),
        })
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NotificationRecord>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one alert to every configured channel. Per-channel
    /// failures are recorded in the history and never propagated.
    pub async fn send_alert(
        &self,
        subject: &str,
        message: &str,
        level: AlertLevel,
        data: Option<Value>,
    ) {
        let kind = format!("alert_{}", level.as_str());
        let message = truncate(message);
        let now = epoch_secs();

        if !self.config.enabled {
            debug!(subject, "notifications disabled, recording mock send");
            self.lock().push(NotificationRecord {
                timestamp: now,
                channel: "mock".to_string(),
                kind,
                subject: subject.to_string(),
                message,
                success: true,
                error_message: None,
            });
            return;
        }

        for channel in &self.config.channels {
            let (url, payload) = match channel {
                ChannelConfig::Webhook { url } => (
                    url,
                    format::webhook_payload(&kind, subject, &message, now, data.as_ref()),
                ),
                ChannelConfig::Slack { webhook_url } => (
                    webhook_url,
                    format::slack_payload(level, subject, &message, now),
                ),
                ChannelConfig::Dingtalk { webhook_url } => {
                    (webhook_url, format::dingtalk_payload(subject, &message))
                }
                ChannelConfig::Wechat { webhook_url } => {
                    (webhook_url, format::wechat_payload(subject, &message))
                }
            };

            let result = self.post(url, &payload).await;
            match &result {
                Ok(()) => info!(channel = channel.name(), subject, "notification sent"),
                Err(e) => {
                    warn!(channel = channel.name(), subject, error = %e, "notification failed")
                }
            }
            self.lock().push(NotificationRecord {
                timestamp: now,
                channel: channel.name().to_string(),
                kind: kind.clone(),
                subject: subject.to_string(),
                message: message.clone(),
                success: result.is_ok(),
                error_message: result.err().map(|e| e.to_string()),
            });
        }
    }

    async fn post(&self, url: &str, payload: &Value) -> anyhow::Result<()> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            anyhow::bail!("endpoint returned {status}")
        }
    }

    /// Notify the outcome of a scaling operation.
    pub async fn send_scaling_report(&self, report: &ScalingReport) {
        let level = if report.success {
            AlertLevel::Info
        } else {
            AlertLevel::Error
        };
        let mut message = format!(
            "{}: {} -> {} replicas ({})",
            report.action.as_str(),
            report.before.replicas,
            report.after.replicas,
            if report.success { "succeeded" } else { "failed" },
        );
        if !report.reasons.is_empty() {
            message.push_str(&format!("; reasons: {}", report.reasons.join(", ")));
        }
        if let Some(err) = &report.error_message {
            message.push_str(&format!("; error: {err}"));
        }
        let data = serde_json::to_value(report).ok();
        self.send_alert(&report.title, &message, level, data).await;
    }

    /// Notify the state of the exception ledger. Critical when any
    /// critical-severity exceptions are present.
    pub async fn send_exception_alert(&self, summary: &ExceptionSummary) {
        let level = if summary.severity_counts.critical > 0 {
            AlertLevel::Critical
        } else {
            AlertLevel::Error
        };
        let message = format!(
            "{} exceptions recorded, {} unresolved ({} critical, {} high)",
            summary.total,
            summary.unresolved,
            summary.severity_counts.critical,
            summary.severity_counts.high,
        );
        let data = serde_json::to_value(summary).ok();
        self.send_alert("Exception summary", &message, level, data)
            .await;
    }

    /// Notify degraded system health.
    pub async fn send_performance_alert(&self, report: &StatusReport) {
        let level = if report.alerts.critical > 0 {
            AlertLevel::Critical
        } else {
            AlertLevel::Warning
        };
        let message = format!(
            "status {:?}: cpu {:.1}%, memory {:.1}%, disk {:.1}%, error rate {:.2}%, {} unresolved alerts",
            report.status,
            report.metrics.cpu_percent,
            report.metrics.memory_percent,
            report.metrics.disk_percent,
            report.error_rate * 100.0,
            report.alerts.total,
        );
        let data = serde_json::to_value(report).ok();
        self.send_alert("Performance alert", &message, level, data)
            .await;
    }

    /// Most recent send attempts, newest last.
    pub fn history(&self, limit: Option<usize>) -> Vec<NotificationRecord> {
        let history = self.lock();
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    pub fn stats(&self) -> NotifyStats {
        let history = self.lock();
        let total = history.len();
        let successful = history.iter().filter(|r| r.success).count();
        let mut by_channel: HashMap<String, u64> = HashMap::new();
        for record in history.iter() {
            *by_channel.entry(record.channel.clone()).or_default() += 1;
        }
        NotifyStats {
            total,
            successful,
            failed: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            by_channel,
            enabled: self.config.enabled,
            channels: self
                .config
                .channels
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        }
    }
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MESSAGE_CAP {
        message.to_string()
    } else {
        message.chars().take(MESSAGE_CAP).collect()
    }
}
