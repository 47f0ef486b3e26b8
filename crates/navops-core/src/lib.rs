//! navops-core — shared domain types for the navops resilience stack.
//!
//! Every value that crosses a component boundary lives here: metric
//! samples, alerts, scaling recommendations and events, exception
//! records, and notification history. Components own their mutable
//! state exclusively; only these serializable snapshots move between
//! them.

pub mod metrics;
pub mod notify;
pub mod resilience;
pub mod scaling;

pub use metrics::*;
pub use notify::*;
pub use resilience::*;
pub use scaling::*;

/// Current unix timestamp in seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
