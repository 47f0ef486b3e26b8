//! navops-resilience — retrying executor with per-operation circuit breakers.
//!
//! `ResilientExecutor` wraps arbitrary operations with bounded retry and
//! a circuit breaker keyed by operation name. Every failed attempt lands
//! in an exception ledger with a keyword-classified severity; sustained
//! failure opens the breaker, which short-circuits callers until a
//! cooldown elapses and a single half-open probe is allowed through.
//!
//! # Breaker state machine
//!
//! ```text
//! CLOSED ──(threshold consecutive failures)──▶ OPEN
//! OPEN   ──(cooldown elapsed, next call)─────▶ HALF_OPEN (one probe)
//! HALF_OPEN ──(probe succeeds)──▶ CLOSED (failures reset)
//! HALF_OPEN ──(probe fails)────▶ OPEN (immediately, fresh cooldown)
//! ```
//!
//! The single-probe guarantee holds for sequential callers: the gate
//! clears the open flag when the cooldown elapses, so a second call
//! arriving while a probe is still in flight is also allowed through
//! rather than short-circuited.

pub mod classify;
pub mod executor;

pub use classify::{classify_kind, classify_severity};
pub use executor::{ExecError, ResilientExecutor};
