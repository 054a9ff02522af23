//! Client for the public swarm dashboard API.
//!
//! Two lookups against `GET /api/v1/peer`:
//! - by `name`, to resolve the peer id of a peer we only know by name;
//! - by `id`, to read the peer's cumulative reward, win count and liveness.
//!
//! Every failure is returned as a typed [`DashboardError`]; callers decide
//! whether to skip the cycle. Nothing here retries.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use swarm_proto::RewardSnapshot;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_DASHBOARD_URL: &str = "https://dashboard.gensyn.ai";
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

const PEER_PATH: &str = "api/v1/peer";

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("dashboard request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("dashboard returned status {0}")]
    Status(StatusCode),

    #[error("malformed dashboard response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("peer record has no usable peerId")]
    MissingPeerId,

    #[error("invalid dashboard url: {0}")]
    Url(#[from] url::ParseError),
}

impl DashboardError {
    /// Network trouble, bad status or a bad payload: worth retrying next cycle.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Url(_))
    }
}

// ─── Lookup results ───────────────────────────────────────────────────────────

/// Result of a peer-by-name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeer {
    pub peer_id: String,
    /// Canonical name as reported by the dashboard, when it sends one.
    pub peer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PeerByName {
    #[serde(rename = "peerId", default)]
    peer_id: Option<String>,
    #[serde(rename = "peerName", default)]
    peer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PeerById {
    #[serde(default)]
    reward: Option<f64>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    online: Option<bool>,
}

/// Reduce a composite `wallet|peer-id` value to the peer id.
///
/// Everything after the last `|` wins; without a `|` the whole value is the id.
/// An empty result means "not resolved".
pub fn split_composite_id(raw: &str) -> Option<&str> {
    let id = raw.rsplit('|').next().unwrap_or(raw);
    (!id.is_empty()).then_some(id)
}

// ─── Directory trait ──────────────────────────────────────────────────────────

/// Peer lookups the reward monitor depends on.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn resolve_peer(&self, peer_name: &str) -> Result<ResolvedPeer, DashboardError>;
    async fn fetch_rewards(&self, peer_id: &str) -> Result<RewardSnapshot, DashboardError>;
}

// ─── HTTP client ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DashboardClient {
    base_url: Url,
    client: reqwest::Client,
}

impl DashboardClient {
    pub fn new(base_url: &str) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self::with_client(Url::parse(base_url)?, client))
    }

    /// `base_url` is treated as a directory: any path prefix on it is kept.
    pub fn with_client(mut base_url: Url, client: reqwest::Client) -> Self {
        if !base_url.path().ends_with('/') {
            let dir = format!("{}/", base_url.path());
            base_url.set_path(&dir);
        }
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET {base}/api/v1/peer?<key>=<value>` with the value form-encoded.
    pub fn peer_url(&self, key: &str, value: &str) -> Result<Url, DashboardError> {
        let mut url = self.base_url.join(PEER_PATH)?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, DashboardError> {
        debug!(%url, "dashboard lookup");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DashboardError::Status(status));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PeerDirectory for DashboardClient {
    async fn resolve_peer(&self, peer_name: &str) -> Result<ResolvedPeer, DashboardError> {
        let record: PeerByName = self.get_json(self.peer_url("name", peer_name)?).await?;
        let raw = record.peer_id.unwrap_or_default();
        let peer_id = split_composite_id(&raw).ok_or(DashboardError::MissingPeerId)?;
        Ok(ResolvedPeer {
            peer_id: peer_id.to_string(),
            peer_name: record.peer_name.filter(|n| !n.is_empty()),
        })
    }

    async fn fetch_rewards(&self, peer_id: &str) -> Result<RewardSnapshot, DashboardError> {
        let record: PeerById = self.get_json(self.peer_url("id", peer_id)?).await?;
        Ok(RewardSnapshot {
            peer_id: peer_id.to_string(),
            reward: record.reward.unwrap_or(0.0),
            score: record.score.unwrap_or(0.0),
            online: record.online.unwrap_or(false),
            fetched_at: Utc::now(),
        })
    }
}
