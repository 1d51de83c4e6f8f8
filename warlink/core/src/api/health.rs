//! System Health Monitoring
//!
//! Wire types for the backend's `/api/system/health` snapshot and a
//! background monitor that polls it on an interval, publishing the latest
//! snapshot on a `watch` channel.
//!
//! A failed poll keeps the last good stats and records the error, so a
//! consumer can keep rendering stale numbers while flagging them as stale.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::BackendClient;

// =============================================================================
// Wire Types
// =============================================================================

/// GPU section of the health snapshot
///
/// Richer than the telemetry pushed over the link: includes the device name,
/// utilization, and power draw.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GpuHealth {
    /// Device name as reported by the driver
    pub name: String,
    /// Total VRAM, in gigabytes
    pub vram_total_gb: f64,
    /// VRAM currently in use, in gigabytes
    pub vram_used_gb: f64,
    /// VRAM still free, in gigabytes
    pub vram_free_gb: f64,
    /// VRAM usage as a percentage
    pub vram_percent: f64,
    /// GPU core temperature in Celsius
    pub temperature_c: f64,
    /// GPU utilization as a percentage
    pub gpu_util_percent: f64,
    /// Current power draw in watts
    pub power_draw_w: f64,
    /// Whether the device is usable for inference
    pub is_available: bool,
}

/// One snapshot from the health endpoint
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SystemHealth {
    /// CPU utilization as a percentage across all cores
    pub cpu_percent: f64,
    /// Number of logical CPU cores
    pub cpu_count: u32,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
    /// Total RAM, in gigabytes
    pub ram_total_gb: f64,
    /// RAM in use, in gigabytes
    pub ram_used_gb: f64,
    /// RAM free, in gigabytes
    pub ram_free_gb: f64,
    /// RAM usage as a percentage
    pub ram_percent: f64,
    /// Total disk space, in gigabytes
    pub disk_total_gb: f64,
    /// Disk space in use, in gigabytes
    pub disk_used_gb: f64,
    /// Disk space free, in gigabytes
    pub disk_free_gb: f64,
    /// Disk usage as a percentage
    pub disk_percent: f64,
    /// Seconds since host boot
    pub uptime_seconds: u64,
    /// Boot time as reported by the host
    pub boot_time: String,
    /// GPU section; `null` when the host has no usable GPU
    #[serde(default)]
    pub gpu: Option<GpuHealth>,
    /// When the snapshot was collected, server-side
    pub timestamp: String,
}

/// Format an uptime as the dashboard renders it
///
/// `"3d 4h 7m"`, dropping zero components, or `"< 1m"` under a minute.
#[must_use]
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }

    if parts.is_empty() {
        "< 1m".to_string()
    } else {
        parts.join(" ")
    }
}

// =============================================================================
// Monitor
// =============================================================================

/// Latest known health, as published by the monitor
#[derive(Clone, Debug, Default)]
pub struct HealthSnapshot {
    /// Last successfully fetched stats, kept across failed polls
    pub stats: Option<SystemHealth>,
    /// Error from the most recent poll, cleared on success
    pub error: Option<String>,
    /// When stats were last refreshed
    pub last_updated: Option<DateTime<Utc>>,
}

/// Background poller for the health endpoint
///
/// Fetches immediately on start, then on every interval. The task dies with
/// the monitor.
pub struct HealthMonitor {
    snapshot_rx: watch::Receiver<HealthSnapshot>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start polling with the given client and interval
    #[must_use]
    pub fn start(client: BackendClient, poll_interval: Duration) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(HealthSnapshot::default());

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let mut snapshot = snapshot_tx.borrow().clone();
                match client.fetch_health().await {
                    Ok(stats) => {
                        snapshot.stats = Some(stats);
                        snapshot.error = None;
                        snapshot.last_updated = Some(Utc::now());
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Health poll failed");
                        snapshot.error = Some(e.to_string());
                    }
                }
                snapshot_tx.send_replace(snapshot);
            }
        });

        Self { snapshot_rx, task }
    }

    /// The latest snapshot
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stop polling
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Tests
// =============================================================================
