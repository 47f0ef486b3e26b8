//! The resilient executor — retry loop, breaker map, exception ledger.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use navops_core::{
    epoch_secs, BreakerState, BreakerStatus, ExceptionRecord, ExceptionSummary, RetryConfig,
    SeverityCounts,
};

use crate::classify::{classify_kind, classify_severity};

/// Records kept in the `recent` slice of a summary.
const RECENT_RECORDS: usize = 10;

/// Errors surfaced to callers of [`ResilientExecutor::run`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// The breaker for this operation is open; the operation was not
    /// invoked and no retry budget was consumed.
    #[error("circuit breaker open for operation {operation}")]
    CircuitOpen { operation: String },

    /// All retry attempts failed; the final error is attached.
    #[error("operation {operation} failed after {attempts} attempts")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

/// Per-operation breaker bookkeeping. Owned exclusively by the executor.
struct Breaker {
    consecutive_failures: u32,
    is_open: bool,
    opened_at: Option<Instant>,
    /// Set when the cooldown elapsed and the next attempt is the probe.
    half_open: bool,
}

impl Breaker {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            is_open: false,
            opened_at: None,
            half_open: false,
        }
    }
}

struct Inner {
    records: Vec<ExceptionRecord>,
    breakers: HashMap<String, Breaker>,
}

/// Wraps operations with bounded retry and per-operation circuit
/// breakers. Cheap to share behind an `Arc`; all state sits behind one
/// mutex that is never held across an await or a sleep.
pub struct ResilientExecutor {
    config: RetryConfig,
    inner: Mutex<Inner>,
}

impl ResilientExecutor {
    pub fn new(config: RetryConfig) -> Self {
        info!(
            max_attempts = config.max_attempts,
            breaker_threshold = config.breaker_threshold,
            "resilient executor initialized"
        );
        Self {
            config,
            inner: Mutex::new(Inner {
                records: Vec::new(),
                breakers: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run an async operation with retry and circuit breaking.
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ExecError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run_with_context(operation, HashMap::new(), op).await
    }

    /// Like [`run`](Self::run), with caller-supplied context recorded on
    /// every exception record.
    pub async fn run_with_context<T, F, Fut>(
        &self,
        operation: &str,
        context: HashMap<String, String>,
        op: F,
    ) -> Result<T, ExecError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.gate(operation, &context, attempt)?;

            match op().await {
                Ok(value) => {
                    self.record_success(operation);
                    return Ok(value);
                }
                Err(err) => {
                    self.record_failure(operation, &context, attempt, &err);
                    if attempt < self.config.max_attempts {
                        warn!(
                            operation,
                            attempt,
                            error = %err,
                            "attempt failed, retrying"
                        );
                        // Sleep with no lock held.
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    } else {
                        error!(operation, attempts = attempt, error = %err, "all attempts failed");
                        return Err(ExecError::Exhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                }
            }
        }
    }

    /// Blocking variant with identical semantics; sleeps on the calling
    /// thread between attempts.
    pub fn run_blocking<T, F>(
        &self,
        operation: &str,
        context: HashMap<String, String>,
        mut op: F,
    ) -> Result<T, ExecError>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.gate(operation, &context, attempt)?;

            match op() {
                Ok(value) => {
                    self.record_success(operation);
                    return Ok(value);
                }
                Err(err) => {
                    self.record_failure(operation, &context, attempt, &err);
                    if attempt < self.config.max_attempts {
                        warn!(operation, attempt, error = %err, "attempt failed, retrying");
                        std::thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                    } else {
                        error!(operation, attempts = attempt, error = %err, "all attempts failed");
                        return Err(ExecError::Exhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                }
            }
        }
    }

    /// Evaluate the breaker for one attempt. Openness check and state
    /// mutation happen in a single lock scope; an open breaker records a
    /// synthetic ledger entry and short-circuits without consuming the
    /// caller's retry budget.
    fn gate(
        &self,
        operation: &str,
        context: &HashMap<String, String>,
        attempt: u32,
    ) -> Result<(), ExecError> {
        let mut inner = self.lock();

        let timeout = Duration::from_secs(self.config.breaker_timeout_secs);
        let breaker = inner
            .breakers
            .entry(operation.to_string())
            .or_insert_with(Breaker::new);

        if breaker.is_open {
            let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed >= timeout {
                // Cooldown elapsed: this attempt is the half-open probe.
                breaker.is_open = false;
                breaker.half_open = true;
                info!(operation, "circuit breaker half-open, allowing probe");
            } else {
                let failures = breaker.consecutive_failures;
                warn!(operation, failures, "circuit breaker open, short-circuiting");

                let message = format!("circuit breaker open for operation {operation}");
                let mut ctx = context.clone();
                ctx.insert("operation".to_string(), operation.to_string());
                inner.records.push(ExceptionRecord {
                    timestamp: epoch_secs(),
                    operation: operation.to_string(),
                    kind: "circuit_open".to_string(),
                    severity: classify_severity("circuit_open", &message),
                    message,
                    context: ctx,
                    attempt,
                    resolved: false,
                    resolution_time: None,
                });
                return Err(ExecError::CircuitOpen {
                    operation: operation.to_string(),
                });
            }
        }
        Ok(())
    }

    fn record_failure(
        &self,
        operation: &str,
        context: &HashMap<String, String>,
        attempt: u32,
        err: &anyhow::Error,
    ) {
        let kind = classify_kind(err);
        let message = format!("{err:#}");
        let severity = classify_severity(&kind, &message);

        let mut ctx = context.clone();
        ctx.insert("operation".to_string(), operation.to_string());

        let mut inner = self.lock();
        inner.records.push(ExceptionRecord {
            timestamp: epoch_secs(),
            operation: operation.to_string(),
            kind,
            message,
            severity,
            context: ctx,
            attempt,
            resolved: false,
            resolution_time: None,
        });

        let threshold = self.config.breaker_threshold;
        let breaker = inner
            .breakers
            .entry(operation.to_string())
            .or_insert_with(Breaker::new);
        breaker.consecutive_failures += 1;

        if breaker.half_open {
            // Failed probe: re-open immediately, fresh cooldown.
            breaker.half_open = false;
            breaker.is_open = true;
            breaker.opened_at = Some(Instant::now());
            error!(operation, "circuit breaker probe failed, re-opened");
        } else if !breaker.is_open && breaker.consecutive_failures >= threshold {
            breaker.is_open = true;
            breaker.opened_at = Some(Instant::now());
            error!(
                operation,
                failures = breaker.consecutive_failures,
                "circuit breaker opened"
            );
        }
    }

    fn record_success(&self, operation: &str) {
        let mut inner = self.lock();
        if let Some(breaker) = inner.breakers.get_mut(operation) {
            if breaker.half_open {
                info!(operation, "circuit breaker recovered, closed");
            }
            breaker.consecutive_failures = 0;
            breaker.is_open = false;
            breaker.half_open = false;
            breaker.opened_at = None;
        }
    }

    /// Aggregate view of the ledger and all breakers.
    pub fn summary(&self) -> ExceptionSummary {
        let inner = self.lock();

        let total = inner.records.len();
        let unresolved = inner.records.iter().filter(|r| !r.resolved).count();

        let mut severity_counts = SeverityCounts::default();
        let mut kinds: HashMap<String, u64> = HashMap::new();
        for record in &inner.records {
            match record.severity {
                navops_core::ExceptionSeverity::Critical => severity_counts.critical += 1,
                navops_core::ExceptionSeverity::High => severity_counts.high += 1,
                navops_core::ExceptionSeverity::Medium => severity_counts.medium += 1,
                navops_core::ExceptionSeverity::Low => severity_counts.low += 1,
            }
            *kinds.entry(record.kind.clone()).or_insert(0) += 1;
        }

        let recent: Vec<ExceptionRecord> = inner
            .records
            .iter()
            .rev()
            .take(RECENT_RECORDS)
            .rev()
            .cloned()
            .collect();

        let breakers = inner
            .breakers
            .iter()
            .map(|(name, b)| {
                (
                    name.clone(),
                    BreakerStatus {
                        failure_count: b.consecutive_failures,
                        state: if b.is_open {
                            BreakerState::Open
                        } else {
                            BreakerState::Closed
                        },
                    },
                )
            })
            .collect();

        ExceptionSummary {
            timestamp: epoch_secs(),
            total,
            unresolved,
            severity_counts,
            kinds,
            recent,
            breakers,
            config: self.config.clone(),
        }
    }

    /// All unresolved records, oldest first.
    pub fn unresolved(&self) -> Vec<ExceptionRecord> {
        let inner = self.lock();
        inner
            .records
            .iter()
            .filter(|r| !r.resolved)
            .cloned()
            .collect()
    }

    /// Bulk-resolve all unresolved records of a kind. Returns the count
    /// affected.
    pub fn mark_resolved(&self, kind: &str) -> usize {
        let now = epoch_secs();
        let mut inner = self.lock();
        let mut count = 0;
        for record in inner.records.iter_mut() {
            if record.kind == kind && !record.resolved {
                record.resolved = true;
                record.resolution_time = Some(now);
                count += 1;
            }
        }
        if count > 0 {
            info!(kind, count, "exception records marked resolved");
        }
        count
    }

    /// Operation names whose breakers are currently open.
    pub fn degraded_operations(&self) -> Vec<String> {
        let inner = self.lock();
        inner
            .breakers
            .iter()
            .filter(|(_, b)| b.is_open)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Drop all records and breaker state.
    pub fn clear_history(&self) {
        let mut inner = self.lock();
        inner.records.clear();
        inner.breakers.clear();
        info!("exception history and breaker state cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32, breaker_threshold: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            retry_delay_ms: 1,
            breaker_threshold,
            breaker_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn success_passes_value_through() {
        let exec = ResilientExecutor::new(fast_config(3, 5));
        let result: Result<u32, _> = exec.run("ok_op", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(exec.summary().total, 0);
    }

    #[tokio::test]
    async fn exhaustion_records_one_entry_per_attempt() {
        let exec = ResilientExecutor::new(fast_config(3, 5));
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result: Result<(), _> = exec
            .run("always_fails", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("boom"))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(ExecError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let summary = exec.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unresolved, 3);
        assert_eq!(
            summary.breakers.get("always_fails").unwrap().failure_count,
            3
        );
        // Attempt numbers are 1-based and per logical call.
        let attempts: Vec<u32> = exec.unresolved().iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn transient_failure_recovers_mid_call() {
        let exec = ResilientExecutor::new(fast_config(3, 5));
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result = exec
            .run("flaky", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(anyhow::anyhow!("transient"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        // Two failed attempts were still recorded.
        assert_eq!(exec.summary().total, 2);
        // Success reset the breaker.
        assert_eq!(exec.summary().breakers.get("flaky").unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn breaker_opens_and_short_circuits() {
        // Threshold 2, one call with 2 attempts opens the breaker.
        let exec = ResilientExecutor::new(fast_config(2, 2));
        let _ = exec
            .run::<(), _, _>("db_op", || async { Err(anyhow::anyhow!("boom")) })
            .await;

        let summary = exec.summary();
        assert_eq!(summary.breakers.get("db_op").unwrap().state, BreakerState::Open);
        assert_eq!(exec.degraded_operations(), vec!["db_op".to_string()]);

        // Next call short-circuits without invoking the operation.
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = exec
            .run("db_op", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(ExecError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // The short-circuit still lands in the ledger.
        assert_eq!(exec.summary().total, 3);
        assert_eq!(
            exec.unresolved().last().unwrap().kind,
            "circuit_open".to_string()
        );
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_success() {
        let exec = ResilientExecutor::new(fast_config(1, 1));
        let _ = exec
            .run::<(), _, _>("probe_op", || async { Err(anyhow::anyhow!("boom")) })
            .await;
        assert_eq!(exec.degraded_operations().len(), 1);

        // Before the cooldown the breaker stays open.
        let result: Result<(), _> = exec.run("probe_op", || async { Ok(()) }).await;
        assert!(matches!(result, Err(ExecError::CircuitOpen { .. })));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        // After the cooldown exactly one probe goes through and closes it.
        let result = exec.run("probe_op", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);

        let status = exec.summary().breakers.get("probe_op").cloned().unwrap();
        assert_eq!(status.state, BreakerState::Closed);
        assert_eq!(status.failure_count, 0);
    }

    #[tokio::test]
    async fn half_open_probe_reopens_on_failure() {
        let exec = ResilientExecutor::new(fast_config(3, 1));
        let _ = exec
            .run::<(), _, _>("bad_probe", || async { Err(anyhow::anyhow!("boom")) })
            .await;
        assert_eq!(exec.degraded_operations().len(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Probe fails on attempt 1, re-opens immediately; attempt 2
        // short-circuits, so the call ends with CircuitOpen.
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = exec
            .run("bad_probe", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("still broken"))
                }
            })
            .await;

        assert!(matches!(result, Err(ExecError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exec.degraded_operations().len(), 1);
    }

    #[tokio::test]
    async fn severity_and_kind_classification_lands_in_ledger() {
        let exec = ResilientExecutor::new(fast_config(1, 5));
        let _ = exec
            .run::<(), _, _>("db_call", || async {
                Err(anyhow::anyhow!("database connection lost"))
            })
            .await;

        let records = exec.unresolved();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, navops_core::ExceptionSeverity::Critical);
        assert_eq!(records[0].kind, "other");
        assert_eq!(records[0].context.get("operation").unwrap(), "db_call");
    }

    #[tokio::test]
    async fn mark_resolved_by_kind() {
        let exec = ResilientExecutor::new(fast_config(2, 10));
        let _ = exec
            .run::<(), _, _>("io_op", || async {
                Err(anyhow::Error::from(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )))
            })
            .await;
        let _ = exec
            .run::<(), _, _>("misc_op", || async { Err(anyhow::anyhow!("odd")) })
            .await;

        assert_eq!(exec.summary().unresolved, 4);
        assert_eq!(exec.mark_resolved("io"), 2);
        assert_eq!(exec.summary().unresolved, 2);
        // Resolving again is a no-op.
        assert_eq!(exec.mark_resolved("io"), 0);

        let resolved: Vec<_> = exec
            .summary()
            .recent
            .into_iter()
            .filter(|r| r.resolved)
            .collect();
        assert!(resolved.iter().all(|r| r.resolution_time.is_some()));
    }

    #[test]
    fn blocking_variant_retries_and_exhausts() {
        let exec = ResilientExecutor::new(fast_config(3, 5));
        let mut calls = 0;
        let result: Result<(), _> = exec.run_blocking("sync_op", HashMap::new(), || {
            calls += 1;
            Err(anyhow::anyhow!("boom"))
        });

        assert!(matches!(
            result,
            Err(ExecError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(calls, 3);
        assert_eq!(exec.summary().total, 3);
    }

    #[tokio::test]
    async fn clear_history_resets_everything() {
        let exec = ResilientExecutor::new(fast_config(1, 1));
        let _ = exec
            .run::<(), _, _>("op", || async { Err(anyhow::anyhow!("boom")) })
            .await;
        assert_eq!(exec.summary().total, 1);
        assert_eq!(exec.degraded_operations().len(), 1);

        exec.clear_history();
        assert_eq!(exec.summary().total, 0);
        assert!(exec.degraded_operations().is_empty());
    }

    #[tokio::test]
    async fn summary_kinds_histogram() {
        let exec = ResilientExecutor::new(fast_config(2, 10));
        let _ = exec
            .run::<(), _, _>("p", || async { Err(anyhow::Error::from("x".parse::<u32>().unwrap_err())) })
            .await;

        let summary = exec.summary();
        assert_eq!(summary.kinds.get("parse"), Some(&2));
        assert_eq!(summary.severity_counts.medium, 2);
    }
}
