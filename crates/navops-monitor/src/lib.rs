//! navops-monitor — process health sampling and alerting.
//!
//! The `MetricsSampler` owns a bounded ring of `MetricSample`s and the
//! cumulative request/error counters. A background loop takes a sample
//! on a fixed interval, evaluates thresholds, and maintains the alert
//! list (deduplicated per metric type while unresolved). Scaling
//! recommendations are derived on demand from a fresh sample.
//!
//! # Architecture
//!
//! ```text
//! MetricsSampler
//!   ├── record_request() ← called per HTTP request
//!   ├── sample() → MetricGauge read + counters, one critical section
//!   │     └── threshold checks → Alert list
//!   ├── recommendation() → ScalingRecommendation
//!   └── run() → periodic sampling loop
//! ```

pub mod gauge;
pub mod sampler;

pub use gauge::{GaugeReading, MetricGauge, StaticGauge, SystemGauge};
pub use sampler::MetricsSampler;
