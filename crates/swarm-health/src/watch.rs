//! Transition detection over successive service observations.

use chrono::{NaiveDateTime, TimeDelta};
use std::collections::BTreeSet;
use std::path::PathBuf;
use swarm_proto::{Notification, Priority};

use crate::wandb::WandbListing;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the probes saw at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub api_alive: bool,
    /// `Unknown` when the lookup failed.
    pub public_ip: String,
    /// Newest timestamp in the worker log, UTC.
    pub last_activity: Option<NaiveDateTime>,
    pub wandb: WandbListing,
}

/// Thresholds for the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchThresholds {
    /// Log silence longer than this is reported.
    pub stale_after: TimeDelta,
}

impl Default for WatchThresholds {
    fn default() -> Self {
        Self {
            stale_after: TimeDelta::minutes(240),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    ApiStatusChanged { alive: bool },
    IpChanged { ip: String },
    StaleLogs { since: NaiveDateTime, after: TimeDelta },
    WandbDetected { new_folders: usize, new_files: usize },
}

impl WatchEvent {
    pub fn notification(&self) -> Notification {
        match self {
            Self::ApiStatusChanged { alive } => Notification::new(
                "api_status_change",
                format!(
                    "API status changed: {}",
                    if *alive { "Online" } else { "Offline" }
                ),
                Priority::High,
            ),
            Self::IpChanged { ip } => {
                Notification::new("ip_change", format!("IP changed: {ip}"), Priority::Normal)
            }
            Self::StaleLogs { since, after } => Notification::new(
                "stale_logs",
                format!(
                    "No new Gensyn log entry since {} UTC (>{} ago)!",
                    since.format(TIMESTAMP_FORMAT),
                    span(*after)
                ),
                Priority::High,
            ),
            Self::WandbDetected {
                new_folders,
                new_files,
            } => Notification::new(
                "wandb_detected",
                format!(
                    "WANDB activity detected: {new_folders} new folders, {new_files} new files"
                ),
                Priority::Normal,
            ),
        }
    }
}

/// `4h` for whole hours, `90m` otherwise.
fn span(d: TimeDelta) -> String {
    let mins = d.num_minutes();
    if mins % 60 == 0 {
        format!("{}h", mins / 60)
    } else {
        format!("{mins}m")
    }
}

/// Remembers the previous observation so only changes are reported.
#[derive(Debug, Clone, Default)]
pub struct ServiceWatch {
    thresholds: WatchThresholds,
    previous_api_alive: Option<bool>,
    previous_ip: Option<String>,
    last_stale_sent: Option<NaiveDateTime>,
    seen_wandb_folders: BTreeSet<PathBuf>,
    seen_wandb_files: BTreeSet<PathBuf>,
}

impl ServiceWatch {
    pub fn new(thresholds: WatchThresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn previous_ip(&self) -> Option<&str> {
        self.previous_ip.as_deref()
    }

    /// Compare `obs` against the last one and return what changed.
    ///
    /// The first API observation only seeds state. The first IP observation
    /// is reported. A stale log is reported once per distinct timestamp and
    /// re-armed as soon as the log is fresh again. W&B entries not seen
    /// before are counted; entries already present at the first observation
    /// count as new.
    pub fn observe(&mut self, obs: &Observation, now: NaiveDateTime) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        if self
            .previous_api_alive
            .is_some_and(|prev| prev != obs.api_alive)
        {
            events.push(WatchEvent::ApiStatusChanged {
                alive: obs.api_alive,
            });
        }
        self.previous_api_alive = Some(obs.api_alive);

        if !obs.public_ip.is_empty() && self.previous_ip.as_deref() != Some(obs.public_ip.as_str()) {
            events.push(WatchEvent::IpChanged {
                ip: obs.public_ip.clone(),
            });
            self.previous_ip = Some(obs.public_ip.clone());
        }

        if let Some(ts) = obs.last_activity {
            if now - ts > self.thresholds.stale_after {
                if self.last_stale_sent != Some(ts) {
                    events.push(WatchEvent::StaleLogs {
                        since: ts,
                        after: self.thresholds.stale_after,
                    });
                    self.last_stale_sent = Some(ts);
                }
            } else {
                self.last_stale_sent = None;
            }
        }

        let new_folders = absorb(&mut self.seen_wandb_folders, &obs.wandb.folders);
        let new_files = absorb(&mut self.seen_wandb_files, &obs.wandb.files);
        if new_folders > 0 || new_files > 0 {
            events.push(WatchEvent::WandbDetected {
                new_folders,
                new_files,
            });
        }

        events
    }
}

/// Add `current` to `seen`; returns how many were not there before.
fn absorb(seen: &mut BTreeSet<PathBuf>, current: &BTreeSet<PathBuf>) -> usize {
    current
        .iter()
        .filter(|path| seen.insert((*path).clone()))
        .count()
}
