//! Command dispatch for operator webhook invocations
//!
//! Every command returns a human-readable string that goes straight back to
//! the operator in `CommandResponse::result`.

use serde_json::Value;
use swarm_health::UNKNOWN_IP;
use swarm_peer::log::tail_lines;
use thiserror::Error;
use tracing::debug;

use crate::SwarmNode;
use crate::backup::describe_files;
use crate::error::NodeError;

pub const DEFAULT_LOG_TYPE: &str = "gensyn";
pub const DEFAULT_LOG_LINES: usize = 50;

/// Every command name accepted by [`handle_command`].
pub const COMMANDS: &[&str] = &[
    "check_ip",
    "node_status",
    "get_logs",
    "start_reward_monitor",
    "stop_reward_monitor",
    "toggle_reward_monitoring",
    "start_monitoring",
    "stop_monitoring",
    "toggle_monitoring",
    "backup_now",
    "get_backup_files",
    "heartbeat",
];

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("invalid parameter: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl CommandError {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

/// Requested direction for a `toggle_*` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    Start,
    Stop,
}

/// `action` = `start`/`stop`; absent means flip the current state.
fn toggle_action(params: &Value, running: bool) -> Result<Toggle, CommandError> {
    match params.get("action").and_then(Value::as_str) {
        Some("start") => Ok(Toggle::Start),
        Some("stop") => Ok(Toggle::Stop),
        Some(other) => Err(CommandError::InvalidParams(format!(
            "action must be start or stop, got {other}"
        ))),
        None if running => Ok(Toggle::Stop),
        None => Ok(Toggle::Start),
    }
}

/// Handle one operator command.
pub async fn handle_command(
    node: &SwarmNode,
    command: &str,
    params: &Value,
) -> Result<String, CommandError> {
    debug!(command, "handling command");

    match command {
        // ── Node ──────────────────────────────────────────────────────────
        "check_ip" => check_ip(node).await,
        "node_status" => {
            let report = node.status_report().await?;
            node.publish_status(&report).await;
            Ok(report.render())
        }
        "get_logs" => get_logs(node, params).await,
        "heartbeat" => {
            node.heartbeat().await?;
            Ok("Heartbeat sent".to_string())
        }

        // ── Reward monitor ────────────────────────────────────────────────
        "start_reward_monitor" => Ok(start_reward(node)),
        "stop_reward_monitor" => Ok(stop_reward(node)),
        "toggle_reward_monitoring" => {
            match toggle_action(params, node.reward_monitor_running())? {
                Toggle::Start => Ok(start_reward(node)),
                Toggle::Stop => Ok(stop_reward(node)),
            }
        }

        // ── Service watch ─────────────────────────────────────────────────
        "start_monitoring" => Ok(start_watch(node)),
        "stop_monitoring" => Ok(stop_watch(node)),
        "toggle_monitoring" => match toggle_action(params, node.service_watch_running())? {
            Toggle::Start => Ok(start_watch(node)),
            Toggle::Stop => Ok(stop_watch(node)),
        },

        // ── Backups ───────────────────────────────────────────────────────
        "backup_now" => {
            let written = node.backup_now().await?;
            Ok(format!("Backup completed: {} files written", written.len()))
        }
        "get_backup_files" => {
            let info = describe_files(&node.config.paths.credentials);
            serde_json::to_string_pretty(&info).map_err(|e| NodeError::from(e).into())
        }

        unknown => Err(CommandError::Unknown(unknown.to_string())),
    }
}

async fn check_ip(node: &SwarmNode) -> Result<String, CommandError> {
    let ip = node.probe.public_ip().await;
    if ip == UNKNOWN_IP {
        return Err(CommandError::Failed(
            "could not determine public IP".to_string(),
        ));
    }
    Ok(format!("Current Public IP: {ip}"))
}

async fn get_logs(node: &SwarmNode, params: &Value) -> Result<String, CommandError> {
    let log_type = params
        .get("log_type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LOG_TYPE);
    let lines = params
        .get("lines")
        .and_then(Value::as_u64)
        .map_or(DEFAULT_LOG_LINES, |n| n as usize);

    let path = node
        .config
        .paths
        .logs
        .get(log_type)
        .cloned()
        .ok_or_else(|| CommandError::InvalidParams(format!("unknown log type: {log_type}")))?;

    let tail = tokio::task::spawn_blocking(move || tail_lines(&path, lines))
        .await
        .map_err(NodeError::from)?
        .map_err(NodeError::from)?;
    Ok(tail.join("\n"))
}

fn start_reward(node: &SwarmNode) -> String {
    if node.start_reward_monitor() {
        "Reward monitoring started".to_string()
    } else {
        "Reward monitoring is already running".to_string()
    }
}

fn stop_reward(node: &SwarmNode) -> String {
    if node.stop_reward_monitor() {
        "Reward monitoring stopped".to_string()
    } else {
        "Reward monitoring is not running".to_string()
    }
}

fn start_watch(node: &SwarmNode) -> String {
    if node.start_service_watch() {
        "Monitoring started".to_string()
    } else {
        "Monitoring is already running".to_string()
    }
}

fn stop_watch(node: &SwarmNode) -> String {
    if node.stop_service_watch() {
        "Monitoring stopped".to_string()
    } else {
        "Monitoring is not running".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use serde_json::json;

    fn node_in(dir: &std::path::Path) -> SwarmNode {
        let mut config = NodeConfig::default();
        config.paths.swarm_log = dir.join("swarm.log");
        config.paths.peer_cache = dir.join("peer_info.json");
        config.paths.credentials = vec![dir.join("userData.json")];
        config.paths.archive_backup_dir = dir.join("archive");
        config.paths.logs.insert("gensyn".to_string(), dir.join("swarm.log"));
        config.local_api_url = "http://127.0.0.1:1".to_string();
        config.public_ip_url = "http://127.0.0.1:1".to_string();
        SwarmNode::new(config).unwrap()
    }

    #[test]
    fn toggle_without_action_flips() {
        assert_eq!(toggle_action(&json!({}), true).unwrap(), Toggle::Stop);
        assert_eq!(toggle_action(&json!({}), false).unwrap(), Toggle::Start);
        assert_eq!(
            toggle_action(&json!({"action": "start"}), true).unwrap(),
            Toggle::Start
        );
        assert!(toggle_action(&json!({"action": "pause"}), true).is_err());
    }

    #[tokio::test]
    async fn unknown_command_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_in(dir.path());
        let err = handle_command(&node, "reboot", &json!({})).await.unwrap_err();
        assert!(err.is_unknown());
    }

    #[tokio::test]
    async fn get_logs_returns_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
        std::fs::write(dir.path().join("swarm.log"), lines.join("\n")).unwrap();
        let node = node_in(dir.path());

        let out = handle_command(&node, "get_logs", &json!({"lines": 3}))
            .await
            .unwrap();
        assert_eq!(out, "line 8\nline 9\nline 10");

        let err = handle_command(&node, "get_logs", &json!({"log_type": "wandb"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn monitor_commands_report_state() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_in(dir.path());
        let empty = json!({});
        let run = |c: &'static str| handle_command(&node, c, &empty);

        assert_eq!(run("start_reward_monitor").await.unwrap(), "Reward monitoring started");
        assert_eq!(
            run("start_reward_monitor").await.unwrap(),
            "Reward monitoring is already running"
        );
        assert_eq!(run("toggle_reward_monitoring").await.unwrap(), "Reward monitoring stopped");
        assert_eq!(run("stop_monitoring").await.unwrap(), "Monitoring is not running");
    }

    #[tokio::test]
    async fn backup_commands() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("userData.json"), "{}").unwrap();
        let node = node_in(dir.path());

        let out = handle_command(&node, "backup_now", &json!({})).await.unwrap();
        assert_eq!(out, "Backup completed: 2 files written");

        let listing = handle_command(&node, "get_backup_files", &json!({}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&listing).unwrap();
        assert_eq!(parsed[0]["file"], "userData.json");
        assert_eq!(parsed[0]["size"], 2);
    }

    #[tokio::test]
    async fn heartbeat_without_webhook_fails() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_in(dir.path());
        let err = handle_command(&node, "heartbeat", &json!({})).await.unwrap_err();
        assert!(matches!(err, CommandError::Node(NodeError::Notify(_))));
    }
}
