//! Fixed-cadence background loops owned by the binary: heartbeat and sync backup.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swarm_notify::WebhookClient;
use sysinfo::{Disks, System};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backup::sync_backup;
use crate::error::NodeResult;

// ─── System info ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemInfo {
    pub cpu_percent: f32,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

impl SystemInfo {
    /// Sample CPU, memory and root-disk usage. Blocking.
    pub fn sample() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_used) = disks
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .map(|d| (d.total_space(), d.total_space() - d.available_space()))
            .unwrap_or((0, 0));

        Self {
            cpu_percent: sys.global_cpu_usage(),
            memory_percent: percent(sys.used_memory(), sys.total_memory()),
            disk_percent: percent(disk_used, disk_total),
        }
    }
}

/// Hours since `started_at`, one decimal, e.g. `3.5h`.
pub fn uptime_hours(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0);
    format!("{:.1}h", secs as f64 / 3600.0)
}

pub fn heartbeat_payload(uptime: &str, info: &SystemInfo) -> Value {
    json!({
        "uptime": uptime,
        "system_info": info,
    })
}

/// Sample the host and send one heartbeat envelope.
pub async fn send_heartbeat(
    webhook: &WebhookClient,
    started_at: DateTime<Utc>,
) -> NodeResult<()> {
    let info = tokio::task::spawn_blocking(SystemInfo::sample).await?;
    let uptime = uptime_hours(started_at, Utc::now());
    webhook
        .send_heartbeat(heartbeat_payload(&uptime, &info))
        .await?;
    debug!(%uptime, "heartbeat sent");
    Ok(())
}

// ─── Loops ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopCadence {
    pub interval: Duration,
    pub cooldown: Duration,
}

/// Wait `d` or until cancelled. Returns `false` on cancellation.
async fn pause(d: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(d) => true,
        _ = cancel.cancelled() => false,
    }
}

pub async fn run_heartbeat(
    webhook: Arc<WebhookClient>,
    started_at: DateTime<Utc>,
    cadence: LoopCadence,
    cancel: CancellationToken,
) {
    if !webhook.is_enabled() {
        info!("webhook disabled, heartbeat not started");
        return;
    }
    info!(interval = ?cadence.interval, "heartbeat started");
    while !cancel.is_cancelled() {
        let wait = match send_heartbeat(&webhook, started_at).await {
            Ok(()) => cadence.interval,
            Err(e) => {
                error!(error = %e, "heartbeat failed");
                cadence.cooldown
            }
        };
        if !pause(wait, &cancel).await {
            break;
        }
    }
    info!("heartbeat stopped");
}

pub async fn run_sync_backup(
    files: Vec<PathBuf>,
    dir: PathBuf,
    cadence: LoopCadence,
    cancel: CancellationToken,
) {
    info!(dir = %dir.display(), "sync backup started");
    let files = Arc::new(files);
    let dir = Arc::new(dir);
    while !cancel.is_cancelled() {
        let (f, d) = (files.clone(), dir.clone());
        let result = tokio::task::spawn_blocking(move || sync_backup(&f, &d)).await;
        let wait = match result {
            Ok(Ok(_)) => cadence.interval,
            Ok(Err(e)) => {
                error!(error = %e, "sync backup failed");
                cadence.cooldown
            }
            Err(e) => {
                error!(error = %e, "sync backup task failed");
                cadence.cooldown
            }
        };
        if !pause(wait, &cancel).await {
            break;
        }
    }
    info!("sync backup stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn uptime_is_hours_with_one_decimal() {
        let start = Utc::now();
        assert_eq!(uptime_hours(start, start), "0.0h");
        assert_eq!(
            uptime_hours(start, start + TimeDelta::minutes(210)),
            "3.5h"
        );
    }

    #[test]
    fn payload_shape() {
        let info = SystemInfo {
            cpu_percent: 12.5,
            memory_percent: 40.0,
            disk_percent: 71.25,
        };
        let payload = heartbeat_payload("1.0h", &info);
        assert_eq!(payload["uptime"], "1.0h");
        assert_eq!(payload["system_info"]["cpu_percent"], 12.5);
        assert_eq!(payload["system_info"]["disk_percent"], 71.25);
    }

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_backup_loop_copies_then_stops() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let file = src.path().join("userData.json");
        std::fs::write(&file, "{}").unwrap();
        let target = dst.path().join("sync");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sync_backup(
            vec![file],
            target.clone(),
            LoopCadence {
                interval: Duration::from_secs(60),
                cooldown: Duration::from_secs(10),
            },
            cancel.clone(),
        ));

        while !target.join("userData.json").exists() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        handle.await.unwrap();
    }
}
