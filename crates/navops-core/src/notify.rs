//! Notification configuration, history records, and stats.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity attached to an outgoing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }
}

/// A configured delivery channel with its endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    Webhook { url: String },
    Slack { webhook_url: String },
    Dingtalk { webhook_url: String },
    Wechat { webhook_url: String },
}

impl ChannelConfig {
    /// Channel name used in history records and stats.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelConfig::Webhook { .. } => "webhook",
            ChannelConfig::Slack { .. } => "slack",
            ChannelConfig::Dingtalk { .. } => "dingtalk",
            ChannelConfig::Wechat { .. } => "wechat",
        }
    }
}

/// Process-wide notification settings, read-only after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub channels: Vec<ChannelConfig>,
}

/// One send attempt on one channel. Append-only history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub timestamp: u64,
    /// Channel name, or "mock" for suppressed sends.
    pub channel: String,
    /// Notification type, e.g. "alert_critical" or "scaling_report".
    pub kind: String,
    pub subject: String,
    /// Message body truncated to 200 characters.
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate notification counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub by_channel: HashMap<String, u64>,
    pub enabled: bool,
    pub channels: Vec<String>,
}
