//! Platform gauge sources for CPU, memory, and disk.
//!
//! The sampler only depends on the `MetricGauge` trait; the sysinfo
//! implementation is the production source, the static one backs tests
//! and the daemon's dry-run mode.

use std::sync::Mutex;

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

/// One reading of the platform-level gauges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeReading {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub memory_available_mb: f64,
    pub disk_percent: f64,
}

/// Source of platform-level resource percentages.
///
/// Implementations may block briefly on OS introspection; the sampler
/// calls `read` outside any lock shared with request-handling paths.
pub trait MetricGauge: Send + Sync {
    fn read(&self) -> GaugeReading;
}

/// Gauge backed by [`sysinfo`].
///
/// CPU usage is computed between consecutive refreshes, so the very
/// first reading after startup reports 0.0.
pub struct SystemGauge {
    system: Mutex<System>,
}

impl SystemGauge {
    pub fn new() -> Self {
        let refresh = RefreshKind::new()
            .with_cpu(CpuRefreshKind::new().with_cpu_usage())
            .with_memory(MemoryRefreshKind::everything());
        Self {
            system: Mutex::new(System::new_with_specifics(refresh)),
        }
    }
}

impl Default for SystemGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricGauge for SystemGauge {
    fn read(&self) -> GaugeReading {
        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpu_percent = sys.global_cpu_info().cpu_usage() as f64;

        let total = sys.total_memory();
        let used = sys.used_memory();
        let available = sys.available_memory();
        let memory_percent = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        // Aggregate across all mounted disks.
        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_available) = disks
            .iter()
            .fold((0u64, 0u64), |(t, a), d| {
                (t + d.total_space(), a + d.available_space())
            });
        let disk_percent = if disk_total > 0 {
            (disk_total - disk_available) as f64 / disk_total as f64 * 100.0
        } else {
            0.0
        };

        GaugeReading {
            cpu_percent,
            memory_percent,
            memory_used_mb: used as f64 / (1024.0 * 1024.0),
            memory_available_mb: available as f64 / (1024.0 * 1024.0),
            disk_percent,
        }
    }
}

/// Gauge that returns a fixed reading. Used in tests and dry-run mode.
#[derive(Debug, Clone, Default)]
pub struct StaticGauge {
    pub reading: GaugeReading,
}

impl StaticGauge {
    pub fn new(cpu_percent: f64, memory_percent: f64, disk_percent: f64) -> Self {
        Self {
            reading: GaugeReading {
                cpu_percent,
                memory_percent,
                memory_used_mb: 512.0,
                memory_available_mb: 1536.0,
                disk_percent,
            },
        }
    }
}

impl MetricGauge for StaticGauge {
    fn read(&self) -> GaugeReading {
        self.reading.clone()
    }
}
