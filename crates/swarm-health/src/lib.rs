//! Service watch for a swarm node.
//!
//! Once a minute the watch probes the local login API, the node's public IP
//! and the worker log, and notifies the operator about:
//! - local API up/down transitions (high priority);
//! - public IP changes, including the first observation;
//! - worker logs silent for more than four hours (high priority, once per
//!   stale timestamp);
//! - new folders or files under the W&B log directory.

#![forbid(unsafe_code)]

pub mod probe;
pub mod wandb;
pub mod watch;

use chrono::Utc;
use std::time::Duration;
use swarm_notify::Notifier;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use probe::{HttpProbe, ServiceProbe, UNKNOWN_IP};
pub use wandb::WandbListing;
pub use watch::{Observation, ServiceWatch, WatchEvent, WatchThresholds};

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchCadence {
    pub interval: Duration,
    pub cooldown: Duration,
}

impl Default for WatchCadence {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Probe, diff, notify; repeat until cancelled.
pub async fn run_watch(
    mut watch: ServiceWatch,
    probe: &dyn ServiceProbe,
    notifier: &dyn Notifier,
    cadence: WatchCadence,
    cancel: CancellationToken,
) {
    info!("service watch started");
    while !cancel.is_cancelled() {
        let wait = match probe.observe().await {
            Ok(obs) => {
                for event in watch.observe(&obs, Utc::now().naive_utc()) {
                    let notification = event.notification();
                    info!(kind = %notification.notification_type, message = %notification.message, "service event");
                    if let Err(e) = notifier.notify(&notification).await {
                        warn!(kind = %notification.notification_type, error = %e, "service notification failed");
                    }
                }
                cadence.interval
            }
            Err(e) => {
                error!(error = %e, "service watch cycle failed");
                cadence.cooldown
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => break,
        }
    }
    info!("service watch stopped");
}
