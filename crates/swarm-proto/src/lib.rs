//! Shared data types for swarmnode.
//!
//! Defines the peer identity and reward records passed between the monitor
//! crates, and the JSON envelopes exchanged with the operator's webhook
//! receiver.

#![forbid(unsafe_code)]

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ─── Peer identity ────────────────────────────────────────────────────────────

/// The swarm peer this node runs as, discovered from the launcher log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerIdentity {
    #[serde(default)]
    pub peer_name: Option<String>,
    #[serde(default)]
    pub peer_id: Option<String>,
    /// Tolerates foreign or malformed values; they read back as `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PeerIdentity {
    pub fn new(peer_name: impl Into<String>, peer_id: impl Into<String>) -> Self {
        Self {
            peer_name: Some(peer_name.into()),
            peer_id: Some(peer_id.into()),
            updated_at: None,
        }
    }

    /// Peer name, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        non_empty(self.peer_name.as_deref())
    }

    /// Peer id, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        non_empty(self.peer_id.as_deref())
    }

    /// True when at least one of name or id carries a value.
    pub fn is_populated(&self) -> bool {
        self.name().is_some() || self.id().is_some()
    }

    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let Some(text) = raw.as_str() else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc()))
}

// ─── Reward snapshot ──────────────────────────────────────────────────────────

/// Metrics reported by the public dashboard for one peer at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSnapshot {
    pub peer_id: String,
    pub reward: f64,
    /// Win count.
    pub score: f64,
    pub online: bool,
    pub fetched_at: DateTime<Utc>,
}

// ─── Log activity ─────────────────────────────────────────────────────────────

/// Most recent activity markers found near the end of the launcher log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogActivity {
    /// Timestamp of the newest line carrying one, as written (UTC).
    pub timestamp: Option<NaiveDateTime>,
    pub joining: Option<String>,
    pub starting: Option<String>,
}

impl LogActivity {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.joining.is_none() && self.starting.is_none()
    }
}

// ─── Outbound webhook ─────────────────────────────────────────────────────────

/// Kind of message carried by a [`WebhookEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[serde(rename = "gensyn_status")]
    NodeStatus,
    Notification,
    RewardUpdate,
    ErrorAlert,
    Heartbeat,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NodeStatus => "gensyn_status",
            Self::Notification => "notification",
            Self::RewardUpdate => "reward_update",
            Self::ErrorAlert => "error_alert",
            Self::Heartbeat => "heartbeat",
        };
        f.write_str(s)
    }
}

/// Body of every POST to the outbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub vps_name: String,
    pub vps_id: String,
    pub auth_token: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Free-form operator notification (`message_type = notification`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_type: String,
    pub message: String,
    pub priority: Priority,
}

impl Notification {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, priority: Priority) -> Self {
        Self {
            notification_type: kind.into(),
            message: message.into(),
            priority,
        }
    }
}

/// Reward/win increase detected by the reward monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardUpdate {
    pub peer_name: Option<String>,
    pub peer_id: String,
    pub reward: f64,
    pub reward_diff: Option<f64>,
    pub score: f64,
    pub win_diff: Option<f64>,
    pub message: String,
}

// ─── Inbound command webhook ──────────────────────────────────────────────────

/// Body of `POST /webhook/command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Reply to a [`CommandRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub result: String,
    /// Seconds spent executing the handler.
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
    pub vps_id: String,
    pub request_id: Option<String>,
}

// ─── Formatting ───────────────────────────────────────────────────────────────

/// Render a dashboard metric without a trailing `.0` for whole numbers.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
