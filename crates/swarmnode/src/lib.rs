//! swarmnode — swarm node ops agent
//!
//! Watches a single swarm worker on a VPS: polls the public dashboard for
//! reward increases, watches the local login API, the public IP and the
//! worker log, backs up credential files, and serves operator commands over
//! an authenticated webhook.

#![forbid(unsafe_code)]

pub mod backup;
pub mod commands;
pub mod config;
pub mod error;
pub mod server;
pub mod status;
pub mod tasks;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use swarm_dashboard::{DashboardClient, PeerDirectory};
use swarm_eoa::{EoaCache, RegistryRpc};
use swarm_health::{HttpProbe, ServiceWatch, run_watch};
use swarm_notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier, WebhookClient};
use swarm_proto::{Notification, Priority};
use swarm_peer::{PeerCache, SwarmLog};
use swarm_reward::RewardMonitor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use status::StatusReport;

// ─── Task slots ───────────────────────────────────────────────────────────────

/// Running/stopped state of one background loop.
#[derive(Debug, Default)]
pub struct TaskSlot {
    token: Mutex<Option<CancellationToken>>,
}

impl TaskSlot {
    /// Claim the slot. Returns `None` if the loop is already running.
    pub fn start(&self) -> Option<CancellationToken> {
        let mut slot = self.token.lock();
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(token)
    }

    /// Cancel the running loop. Returns whether one was running.
    pub fn stop(&self) -> bool {
        match self.token.lock().take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }
}

// ─── Node ─────────────────────────────────────────────────────────────────────

/// Shared node state, passed by reference into every command handler.
pub struct SwarmNode {
    pub config: NodeConfig,
    pub started_at: DateTime<Utc>,
    pub peer_cache: Arc<PeerCache>,
    pub directory: Arc<dyn PeerDirectory>,
    pub notifier: Arc<dyn Notifier>,
    /// Present when the outbound webhook is configured.
    pub webhook: Option<Arc<WebhookClient>>,
    /// Present when an RPC endpoint is configured.
    pub eoa: Option<Arc<EoaCache<RegistryRpc>>>,
    pub probe: Arc<HttpProbe>,
    reward_task: TaskSlot,
    watch_task: TaskSlot,
}

impl SwarmNode {
    pub fn new(config: NodeConfig) -> NodeResult<Self> {
        let paths = &config.paths;
        let peer_cache = Arc::new(PeerCache::for_log(&paths.peer_cache, &paths.swarm_log));
        let directory: Arc<dyn PeerDirectory> =
            Arc::new(DashboardClient::new(&config.dashboard_url)?);

        let settings = config.webhook_settings();
        let webhook = if settings.is_configured() {
            Some(Arc::new(WebhookClient::new(settings)?))
        } else {
            None
        };

        let notifier: Arc<dyn Notifier> = match (&webhook, &config.telegram) {
            (Some(client), _) => client.clone(),
            (None, Some(tg)) => Arc::new(TelegramNotifier::new(&tg.bot_token, &tg.chat_id)?),
            (None, None) => {
                warn!("no webhook or chat configured, notifications will only be logged");
                Arc::new(LogNotifier)
            }
        };

        let eoa = match &config.rpc_url {
            Some(url) if !url.is_empty() => {
                let rpc = RegistryRpc::new(url, &config.registry_contract)?;
                Some(Arc::new(EoaCache::new(&paths.eoa_cache, rpc)))
            }
            _ => None,
        };

        let probe = Arc::new(
            HttpProbe::new(
                &config.local_api_url,
                &config.public_ip_url,
                SwarmLog::new(&paths.swarm_log),
            )
            .with_wandb_dir(&paths.wandb_dir),
        );

        Ok(Self {
            config,
            started_at: Utc::now(),
            peer_cache,
            directory,
            notifier,
            webhook,
            eoa,
            probe,
            reward_task: TaskSlot::default(),
            watch_task: TaskSlot::default(),
        })
    }

    pub fn swarm_log(&self) -> SwarmLog {
        SwarmLog::new(&self.config.paths.swarm_log)
    }

    // ── Reward monitor ────────────────────────────────────────────────────

    /// Spawn the reward monitor. Returns `false` if it is already running.
    pub fn start_reward_monitor(&self) -> bool {
        let Some(token) = self.reward_task.start() else {
            return false;
        };
        let monitor = RewardMonitor::new(
            self.peer_cache.clone(),
            self.directory.clone(),
            self.notifier.clone(),
        )
        .with_cadence(self.config.intervals.monitor_cadence());
        tokio::spawn(monitor.run(token));
        true
    }

    pub fn stop_reward_monitor(&self) -> bool {
        self.reward_task.stop()
    }

    pub fn reward_monitor_running(&self) -> bool {
        self.reward_task.is_running()
    }

    // ── Service watch ─────────────────────────────────────────────────────

    /// Spawn the service watch. Returns `false` if it is already running.
    pub fn start_service_watch(&self) -> bool {
        let Some(token) = self.watch_task.start() else {
            return false;
        };
        let probe = self.probe.clone();
        let notifier = self.notifier.clone();
        let cadence = self.config.intervals.watch_cadence();
        let watch = ServiceWatch::new(self.config.intervals.watch_thresholds());
        tokio::spawn(async move {
            run_watch(watch, &*probe, &*notifier, cadence, token).await;
        });
        true
    }

    pub fn stop_service_watch(&self) -> bool {
        self.watch_task.stop()
    }

    pub fn service_watch_running(&self) -> bool {
        self.watch_task.is_running()
    }

    // ── Housekeeping ──────────────────────────────────────────────────────

    /// Spawn the heartbeat (webhook only) and sync backup loops under `cancel`.
    pub fn spawn_housekeeping(&self, cancel: &CancellationToken) {
        let intervals = &self.config.intervals;
        if let Some(webhook) = &self.webhook {
            tokio::spawn(tasks::run_heartbeat(
                webhook.clone(),
                self.started_at,
                intervals.heartbeat_cadence(),
                cancel.child_token(),
            ));
        }
        tokio::spawn(tasks::run_sync_backup(
            self.config.paths.credentials.clone(),
            self.config.paths.sync_backup_dir.clone(),
            intervals.sync_backup_cadence(),
            cancel.child_token(),
        ));
    }

    /// Send one heartbeat now.
    pub async fn heartbeat(&self) -> NodeResult<()> {
        match &self.webhook {
            Some(webhook) => tasks::send_heartbeat(webhook, self.started_at).await,
            None => Err(NotifyError::Disabled.into()),
        }
    }

    /// Archive the credential files; returns the paths written.
    pub async fn backup_now(&self) -> NodeResult<Vec<PathBuf>> {
        let files = self.config.paths.credentials.clone();
        let dir = self.config.paths.archive_backup_dir.clone();
        let written = tokio::task::spawn_blocking(move || {
            backup::archive_backup(&files, &dir, Local::now().naive_local())
        })
        .await??;
        info!(files = written.len(), "credential archive written");
        Ok(written)
    }

    /// Tell the operator the agent is up.
    pub async fn announce_startup(&self) {
        let notification = Notification::new(
            "bot_startup",
            format!("Gensyn Bot started on VPS {}", self.config.vps_name),
            Priority::Normal,
        );
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(error = %e, "startup notification failed");
        }
    }

    /// Raise an `error_alert` on the webhook in the background. No-op
    /// without a webhook.
    pub fn alert_error(&self, error_type: &str, message: &str, context: Value) {
        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        let error_type = error_type.to_string();
        let message = message.to_string();
        tokio::spawn(async move {
            if let Err(e) = webhook.send_error_alert(&error_type, &message, context).await {
                warn!(error = %e, error_type = %error_type, "error alert not delivered");
            }
        });
    }

    /// Stop every loop this node started.
    pub fn shutdown(&self) {
        self.stop_reward_monitor();
        self.stop_service_watch();
        info!("background loops stopped");
    }

    // ── Status ────────────────────────────────────────────────────────────

    /// Probe, read the log and cache, and query the dashboard and registry.
    pub async fn status_report(&self) -> NodeResult<StatusReport> {
        let api_alive = self.probe.api_alive().await;

        let log = self.swarm_log();
        let cache = self.peer_cache.clone();
        let (activity, identity) =
            tokio::task::spawn_blocking(move || (log.activity(), cache.read())).await?;

        let mut report = StatusReport {
            api_alive,
            ..StatusReport::default()
        };
        if let Some(activity) = activity {
            report = report.with_activity(&activity, Utc::now().naive_utc());
        }

        report.peer_name = identity.as_ref().and_then(|i| i.name()).map(str::to_string);
        report.peer_id = identity.as_ref().and_then(|i| i.id()).map(str::to_string);

        if report.peer_id.is_none() {
            match &report.peer_name {
                Some(name) => match self.directory.resolve_peer(name).await {
                    Ok(resolved) => {
                        report.peer_id = Some(resolved.peer_id);
                        if resolved.peer_name.is_some() {
                            report.peer_name = resolved.peer_name;
                        }
                    }
                    Err(e) => report.problems.push(format!("Peer name lookup failed: {e}")),
                },
                None => report.problems.push("No peer id or name found.".to_string()),
            }
        }

        if let Some(peer_id) = report.peer_id.clone() {
            match self.directory.fetch_rewards(&peer_id).await {
                Ok(snapshot) => {
                    report.reward = Some(snapshot.reward);
                    report.score = Some(snapshot.score);
                    report.online = snapshot.online;
                }
                Err(e) => report.problems.push(format!("Peer id lookup failed: {e}")),
            }
            if let Some(eoa) = &self.eoa {
                let mapping = eoa.lookup(std::slice::from_ref(&peer_id)).await;
                report.eoa = mapping.get(&peer_id).cloned();
            }
        }

        Ok(report)
    }

    /// Push a report to the webhook as `gensyn_status`. No-op without a
    /// webhook; delivery failures are logged.
    pub async fn publish_status(&self, report: &StatusReport) {
        let Some(webhook) = &self.webhook else {
            return;
        };
        let data = serde_json::to_value(report).unwrap_or(Value::Null);
        if let Err(e) = webhook.send_node_status(data).await {
            warn!(error = %e, "status push failed");
        }
    }
}
