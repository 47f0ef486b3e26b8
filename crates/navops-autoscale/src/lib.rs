//! navops-autoscale — recommendation-driven replica scaling.
//!
//! The `Autoscaler` consumes `ScalingRecommendation`s, decides
//! scale-up / scale-down / no-action within `[min, max]` replicas, and
//! executes decisions against a pluggable `DeploymentBackend`. Step
//! sizes are asymmetric: +2 on scale-up, −1 on scale-down, biasing
//! availability over cost.
//!
//! # Backends
//!
//! ```text
//! DeploymentBackend
//!   ├── KubectlBackend  → kubectl scale / kubectl get -o json
//!   ├── ComposeBackend  → docker compose up -d --scale
//!   ├── SystemdBackend  → always fails (manual intervention)
//!   └── NoopBackend     → always succeeds (dev / tests)
//! ```
//!
//! Backend failure (including a missing CLI tool or a timeout) is
//! recorded on the `ScalingEvent` and leaves the replica count
//! untouched; it never escalates to the caller.

pub mod backend;
pub mod scaler;

pub use backend::{
    BackendStatus, ComposeBackend, DeploymentBackend, KubectlBackend, NoopBackend, SystemdBackend,
};
pub use scaler::{Autoscaler, ScaleError};
