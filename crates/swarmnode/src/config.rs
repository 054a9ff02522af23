//! Node configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swarm_dashboard::DEFAULT_DASHBOARD_URL;
use swarm_eoa::DEFAULT_REGISTRY_CONTRACT;
use chrono::TimeDelta;
use swarm_health::{WatchCadence, WatchThresholds};
use swarm_health::probe::{DEFAULT_LOCAL_API_URL, DEFAULT_PUBLIC_IP_URL};
use swarm_notify::WebhookSettings;
use swarm_reward::MonitorCadence;

use crate::error::{NodeError, NodeResult};
use crate::tasks::LoopCadence;

/// Configuration for the swarmnode agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Display name for this VPS
    pub vps_name: String,

    /// Stable identifier, derived from the name by default
    pub vps_id: String,

    /// Shared secret for outbound envelopes and inbound commands
    pub auth_token: String,

    /// Operator webhook receiver
    #[serde(default)]
    pub webhook_url: String,

    #[serde(default)]
    pub webhook_enabled: bool,

    /// Inbound command server bind address
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Chat delivery, used when no webhook is configured
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    /// JSON-RPC endpoint for EOA lookups; lookups are skipped without one
    #[serde(default)]
    pub rpc_url: Option<String>,

    #[serde(default = "default_registry_contract")]
    pub registry_contract: String,

    #[serde(default = "default_local_api_url")]
    pub local_api_url: String,

    #[serde(default = "default_public_ip_url")]
    pub public_ip_url: String,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub intervals: IntervalConfig,

    #[serde(default)]
    pub autostart: AutostartConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Files the agent reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub swarm_log: PathBuf,
    pub peer_cache: PathBuf,
    pub eoa_cache: PathBuf,
    /// Credential files copied by the backups
    pub credentials: Vec<PathBuf>,
    pub sync_backup_dir: PathBuf,
    pub archive_backup_dir: PathBuf,
    /// Watched for new W&B runs
    pub wandb_dir: PathBuf,
    /// Logs readable through `get_logs`, by name
    pub logs: BTreeMap<String, PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let swarm_log = PathBuf::from("/root/rl-swarm/logs/swarm_launcher.log");
        let mut logs = BTreeMap::new();
        logs.insert("gensyn".to_string(), swarm_log.clone());
        Self {
            swarm_log,
            peer_cache: PathBuf::from("/root/gensyn-bot/peer_info.json"),
            eoa_cache: PathBuf::from("/root/gensyn-bot/eoa_cache.json"),
            credentials: vec![
                PathBuf::from("/root/rl-swarm/modal-login/temp-data/userData.json"),
                PathBuf::from("/root/rl-swarm/modal-login/temp-data/userApiKey.json"),
            ],
            sync_backup_dir: PathBuf::from("/root/gensyn-bot/sync-backup"),
            archive_backup_dir: PathBuf::from("/root/gensyn-bot/backup-userdata"),
            wandb_dir: PathBuf::from("/root/rl-swarm/logs/wandb"),
            logs,
        }
    }
}

/// Loop cadences, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub reward_poll_secs: u64,
    pub reward_idle_secs: u64,
    pub reward_cooldown_secs: u64,
    pub watch_secs: u64,
    pub watch_cooldown_secs: u64,
    pub heartbeat_secs: u64,
    pub heartbeat_cooldown_secs: u64,
    pub sync_backup_secs: u64,
    pub sync_backup_cooldown_secs: u64,
    /// Log silence reported by the service watch
    pub stale_log_mins: i64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            reward_poll_secs: 600,
            reward_idle_secs: 10,
            reward_cooldown_secs: 30,
            watch_secs: 60,
            watch_cooldown_secs: 10,
            heartbeat_secs: 300,
            heartbeat_cooldown_secs: 60,
            sync_backup_secs: 60,
            sync_backup_cooldown_secs: 10,
            stale_log_mins: 240,
        }
    }
}

impl IntervalConfig {
    pub fn monitor_cadence(&self) -> MonitorCadence {
        MonitorCadence {
            poll: Duration::from_secs(self.reward_poll_secs),
            idle: Duration::from_secs(self.reward_idle_secs),
            cooldown: Duration::from_secs(self.reward_cooldown_secs),
        }
    }

    pub fn watch_cadence(&self) -> WatchCadence {
        WatchCadence {
            interval: Duration::from_secs(self.watch_secs),
            cooldown: Duration::from_secs(self.watch_cooldown_secs),
        }
    }

    pub fn watch_thresholds(&self) -> WatchThresholds {
        WatchThresholds {
            stale_after: TimeDelta::minutes(self.stale_log_mins),
        }
    }

    pub fn heartbeat_cadence(&self) -> LoopCadence {
        LoopCadence {
            interval: Duration::from_secs(self.heartbeat_secs),
            cooldown: Duration::from_secs(self.heartbeat_cooldown_secs),
        }
    }

    pub fn sync_backup_cadence(&self) -> LoopCadence {
        LoopCadence {
            interval: Duration::from_secs(self.sync_backup_secs),
            cooldown: Duration::from_secs(self.sync_backup_cooldown_secs),
        }
    }
}

/// Loops started by `run` without an explicit command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutostartConfig {
    pub reward_monitor: bool,
    pub service_watch: bool,
}

impl Default for AutostartConfig {
    fn default() -> Self {
        Self {
            reward_monitor: true,
            service_watch: true,
        }
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_dashboard_url() -> String {
    DEFAULT_DASHBOARD_URL.to_string()
}

fn default_registry_contract() -> String {
    DEFAULT_REGISTRY_CONTRACT.to_string()
}

fn default_local_api_url() -> String {
    DEFAULT_LOCAL_API_URL.to_string()
}

fn default_public_ip_url() -> String {
    DEFAULT_PUBLIC_IP_URL.to_string()
}

/// `London Server` → `london-server`.
pub fn vps_id_from_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

impl NodeConfig {
    pub fn load(path: &Path) -> NodeResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| NodeError::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> NodeResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Outbound webhook settings; empty (so disabled) unless enabled.
    pub fn webhook_settings(&self) -> WebhookSettings {
        if !self.webhook_enabled {
            return WebhookSettings::default();
        }
        WebhookSettings {
            url: self.webhook_url.trim_end_matches('/').to_string(),
            vps_name: self.vps_name.clone(),
            vps_id: self.vps_id.clone(),
            auth_token: self.auth_token.clone(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            vps_name: "swarmnode".to_string(),
            vps_id: "swarmnode".to_string(),
            auth_token: String::new(),
            webhook_url: String::new(),
            webhook_enabled: false,
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            telegram: None,
            dashboard_url: default_dashboard_url(),
            rpc_url: None,
            registry_contract: default_registry_contract(),
            local_api_url: default_local_api_url(),
            public_ip_url: default_public_ip_url(),
            paths: PathsConfig::default(),
            intervals: IntervalConfig::default(),
            autostart: AutostartConfig::default(),
        }
    }
}
