//! Deployment backend adapters.
//!
//! Each adapter shells out to its platform tool with a hard timeout.
//! Absence of the tool is an ordinary failure, logged and reported to
//! the scaler, never fatal to the process.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Replica-count view a backend can report for a deployment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendStatus {
    pub replicas: Option<u32>,
    pub ready_replicas: Option<u32>,
    pub available_replicas: Option<u32>,
}

/// The external mechanism that changes the number of running instances.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Scale the deployment to `replicas`. An `Err` means the scaling
    /// did not take effect.
    async fn scale(&self, deployment: &str, replicas: u32) -> anyhow::Result<()>;

    /// Best-effort status; fields the backend cannot observe stay `None`.
    async fn status(&self, deployment: &str) -> BackendStatus;

    /// Short name used in events and logs.
    fn kind(&self) -> &'static str;
}

// ── kubectl ───────────────────────────────────────────────────────

/// Scales a cluster deployment via the `kubectl` CLI.
pub struct KubectlBackend;

const KUBECTL_SCALE_TIMEOUT: Duration = Duration::from_secs(30);
const KUBECTL_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
impl DeploymentBackend for KubectlBackend {
    async fn scale(&self, deployment: &str, replicas: u32) -> anyhow::Result<()> {
        let output = tokio::time::timeout(
            KUBECTL_SCALE_TIMEOUT,
            Command::new("kubectl")
                .arg("scale")
                .arg(format!("deployment/{deployment}"))
                .arg(format!("--replicas={replicas}"))
                .output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("kubectl scale timed out"))?
        .map_err(|e| anyhow::anyhow!("failed to run kubectl: {e}"))?;

        if output.status.success() {
            info!(deployment, replicas, "kubectl scaling succeeded");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(deployment, replicas, %stderr, "kubectl scaling failed");
            anyhow::bail!("kubectl scale failed: {}", stderr.trim())
        }
    }

    async fn status(&self, deployment: &str) -> BackendStatus {
        let result = tokio::time::timeout(
            KUBECTL_STATUS_TIMEOUT,
            Command::new("kubectl")
                .arg("get")
                .arg("deployment")
                .arg(deployment)
                .arg("-o")
                .arg("json")
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(o)) if o.status.success() => o,
            Ok(Ok(o)) => {
                warn!(
                    deployment,
                    stderr = %String::from_utf8_lossy(&o.stderr),
                    "kubectl get failed"
                );
                return BackendStatus::default();
            }
            Ok(Err(e)) => {
                warn!(deployment, error = %e, "failed to run kubectl");
                return BackendStatus::default();
            }
            Err(_) => {
                warn!(deployment, "kubectl get timed out");
                return BackendStatus::default();
            }
        };

        match serde_json::from_slice::<serde_json::Value>(&output.stdout) {
            Ok(info) => BackendStatus {
                replicas: info
                    .pointer("/spec/replicas")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
                ready_replicas: info
                    .pointer("/status/readyReplicas")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
                available_replicas: info
                    .pointer("/status/availableReplicas")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
            },
            Err(e) => {
                warn!(deployment, error = %e, "failed to parse kubectl output");
                BackendStatus::default()
            }
        }
    }

    fn kind(&self) -> &'static str {
        "kubectl"
    }
}

// ── docker compose ────────────────────────────────────────────────

/// Scales a compose-style multi-process group via `docker compose`.
pub struct ComposeBackend;

const COMPOSE_SCALE_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
impl DeploymentBackend for ComposeBackend {
    async fn scale(&self, deployment: &str, replicas: u32) -> anyhow::Result<()> {
        let output = tokio::time::timeout(
            COMPOSE_SCALE_TIMEOUT,
            Command::new("docker")
                .arg("compose")
                .arg("up")
                .arg("-d")
                .arg("--scale")
                .arg(format!("{deployment}={replicas}"))
                .output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("docker compose scale timed out"))?
        .map_err(|e| anyhow::anyhow!("failed to run docker compose: {e}"))?;

        if output.status.success() {
            info!(deployment, replicas, "compose scaling succeeded");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(deployment, replicas, %stderr, "compose scaling failed");
            anyhow::bail!("docker compose scale failed: {}", stderr.trim())
        }
    }

    async fn status(&self, _deployment: &str) -> BackendStatus {
        // Compose does not expose readiness counts.
        BackendStatus::default()
    }

    fn kind(&self) -> &'static str {
        "compose"
    }
}

// ── systemd ───────────────────────────────────────────────────────

/// Process-supervisor placeholder. Supervisor units cannot be scaled
/// programmatically here; every request fails and asks for manual
/// intervention.
pub struct SystemdBackend;

#[async_trait]
impl DeploymentBackend for SystemdBackend {
    async fn scale(&self, deployment: &str, replicas: u32) -> anyhow::Result<()> {
        warn!(
            deployment,
            replicas, "systemd scaling requires manual intervention"
        );
        anyhow::bail!("systemd scaling not supported, manual intervention required")
    }

    async fn status(&self, _deployment: &str) -> BackendStatus {
        BackendStatus::default()
    }

    fn kind(&self) -> &'static str {
        "systemd"
    }
}

// ── no-op ─────────────────────────────────────────────────────────

/// Always succeeds without touching anything. Used for dry runs and
/// tests.
#[derive(Default)]
pub struct NoopBackend;

#[async_trait]
impl DeploymentBackend for NoopBackend {
    async fn scale(&self, deployment: &str, replicas: u32) -> anyhow::Result<()> {
        info!(deployment, replicas, "noop backend: scaling accepted");
        Ok(())
    }

    async fn status(&self, _deployment: &str) -> BackendStatus {
        BackendStatus::default()
    }

    fn kind(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_backend_accepts_everything() {
        let backend = NoopBackend;
        assert!(backend.scale("svc", 5).await.is_ok());
        assert_eq!(backend.status("svc").await, BackendStatus::default());
        assert_eq!(backend.kind(), "noop");
    }

    #[tokio::test]
    async fn systemd_backend_always_fails() {
        let backend = SystemdBackend;
        let err = backend.scale("svc", 5).await.unwrap_err();
        assert!(err.to_string().contains("manual intervention"));
    }
}
