//! One-shot node status report.

use chrono::NaiveDateTime;
use serde::Serialize;
use swarm_peer::log::{round_number, round_progress};
use swarm_eoa::explorer_url;
use swarm_proto::{LogActivity, escape_html, format_amount};

const MISSING: &str = "—";

/// Everything shown in the status block, gathered by
/// [`SwarmNode::status_report`](crate::SwarmNode::status_report).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub api_alive: bool,
    pub last_activity_mins: Option<i64>,
    pub joining_round: Option<String>,
    pub starting_round: Option<String>,
    pub reward: Option<f64>,
    pub score: Option<f64>,
    pub online: bool,
    pub peer_name: Option<String>,
    pub peer_id: Option<String>,
    pub eoa: Option<String>,
    /// Lookup failures worth showing to the operator.
    pub problems: Vec<String>,
}

impl StatusReport {
    /// Fill the log-derived fields from `activity` as of `now` (UTC).
    pub fn with_activity(mut self, activity: &LogActivity, now: NaiveDateTime) -> Self {
        self.last_activity_mins = activity
            .timestamp
            .map(|ts| (now - ts).num_minutes());
        self.joining_round = activity
            .joining
            .as_deref()
            .map(|j| round_number(j).unwrap_or(j).to_string());
        self.starting_round = activity
            .starting
            .as_deref()
            .map(|s| round_progress(s).unwrap_or(s).to_string());
        self
    }

    pub fn render(&self) -> String {
        let status = if self.api_alive {
            "✅ Running"
        } else {
            "❌ Stopped"
        };
        let last = self
            .last_activity_mins
            .map_or_else(|| MISSING.to_string(), |m| format!("{m}m"));
        let amount = |v: Option<f64>| v.map_or_else(|| "?".to_string(), format_amount);

        let mut lines = vec![
            format!("🌐 Status → {status} ({last})"),
            format!(
                "🐝 Round → {} | {}",
                self.joining_round.as_deref().unwrap_or(MISSING),
                self.starting_round.as_deref().unwrap_or(MISSING)
            ),
            format!(
                "🎁 Reward → {}    🏆 Win → {}",
                amount(self.reward),
                amount(self.score)
            ),
            format!("🧩 Peer → {}", self.peer_name.as_deref().unwrap_or(MISSING)),
            format!("🆔 ID → {}", self.peer_id.as_deref().unwrap_or(MISSING)),
            format!("🏦 EOA → {}", self.eoa.as_deref().unwrap_or("?")),
        ];
        lines.extend(self.problems.iter().cloned());
        lines.join("\n")
    }

    /// `render()` wrapped in `<pre>` for chat clients, followed by an
    /// explorer link when the EOA resolved to an address.
    pub fn to_html(&self) -> String {
        let mut html = format!("<pre>{}</pre>", escape_html(&self.render()));
        if let Some(eoa) = self.eoa.as_deref().filter(|e| e.starts_with("0x")) {
            html.push_str(&format!(
                "\n<a href=\"{}\">View on Explorer</a>",
                escape_html(&explorer_url(eoa))
            ));
        }
        html
    }
}
