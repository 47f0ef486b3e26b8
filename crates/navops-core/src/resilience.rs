//! Exception records, circuit-breaker views, and retry configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How bad a failed attempt was, by keyword/category heuristic.
///
/// Classification feeds the exception ledger and aggregate summary only;
/// it has no effect on retry or circuit-breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One failed attempt of a wrapped operation.
///
/// Created per attempt, not per logical call; resolved only via bulk
/// resolve-by-kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionRecord {
    pub timestamp: u64,
    pub operation: String,
    /// Coarse error category (io, parse, json, http, other, ...).
    pub kind: String,
    pub message: String,
    pub severity: ExceptionSeverity,
    pub context: HashMap<String, String>,
    /// 1-based attempt number within the logical call.
    pub attempt: u32,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_time: Option<u64>,
}

/// Circuit-breaker state as exposed in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Open,
    Closed,
}

/// Per-operation breaker view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakerStatus {
    pub failure_count: u32,
    pub state: BreakerState,
}

/// Per-severity counts for the summary histogram.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Retry and circuit-breaker tuning for the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Consecutive failures before a breaker opens.
    pub breaker_threshold: u32,
    /// Cooldown before an open breaker allows a probe.
    pub breaker_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            breaker_threshold: 5,
            breaker_timeout_secs: 60,
        }
    }
}

/// Aggregate view of the exception ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionSummary {
    pub timestamp: u64,
    pub total: usize,
    pub unresolved: usize,
    pub severity_counts: SeverityCounts,
    /// Occurrences per error kind.
    pub kinds: HashMap<String, u64>,
    /// Last ten records, oldest first.
    pub recent: Vec<ExceptionRecord>,
    pub breakers: HashMap<String, BreakerStatus>,
    pub config: RetryConfig,
}
