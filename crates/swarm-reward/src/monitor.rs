//! The reward monitor loop.
//!
//! Each cycle refreshes the peer identity, resolves a missing peer id through
//! the dashboard, polls rewards and notifies on increases. The loop idles
//! quickly while no id is known, polls on a long cadence once it is, and
//! never exits on error; only its [`CancellationToken`] stops it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swarm_dashboard::PeerDirectory;
use swarm_notify::Notifier;
use swarm_peer::IdentityProvider;
use swarm_proto::{PeerIdentity, RewardUpdate};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delta::{Delta, DeltaTracker};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("identity refresh task failed: {0}")]
    Identity(#[from] tokio::task::JoinError),
}

// ─── Pacing ───────────────────────────────────────────────────────────────────

/// Sleeps between cycles.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `duration`. Returns `false` if cancelled first.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorCadence {
    /// Between polls once a peer id is known.
    pub poll: Duration,
    /// Between attempts while no peer id is known.
    pub idle: Duration,
    /// After an unexpected cycle failure.
    pub cooldown: Duration,
}

impl Default for MonitorCadence {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(600),
            idle: Duration::from_secs(10),
            cooldown: Duration::from_secs(30),
        }
    }
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingIdentity,
    AwaitingId,
    Polling,
}

/// In-memory monitor state. Lost when the monitor is stopped.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub peer_name: Option<String>,
    pub peer_id: Option<String>,
    pub tracker: DeltaTracker,
}

impl MonitorState {
    pub fn phase(&self) -> Phase {
        match (&self.peer_name, &self.peer_id) {
            (_, Some(_)) => Phase::Polling,
            (Some(_), None) => Phase::AwaitingId,
            (None, None) => Phase::AwaitingIdentity,
        }
    }

    /// Take only the non-empty fields of a fresh identity.
    fn absorb(&mut self, identity: &PeerIdentity) {
        if let Some(name) = identity.name() {
            self.peer_name = Some(name.to_string());
        }
        if let Some(id) = identity.id() {
            self.peer_id = Some(id.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No peer id yet; nothing polled.
    Unresolved,
    /// The poll failed; state untouched.
    PollFailed,
    /// The poll succeeded, with the increase it produced, if any.
    Polled(Option<Delta>),
}

// ─── Monitor ──────────────────────────────────────────────────────────────────

pub struct RewardMonitor {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn PeerDirectory>,
    notifier: Arc<dyn Notifier>,
    pacer: Arc<dyn Pacer>,
    cadence: MonitorCadence,
    state: MonitorState,
}

impl RewardMonitor {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn PeerDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            identity,
            directory,
            notifier,
            pacer: Arc::new(TokioPacer),
            cadence: MonitorCadence::default(),
            state: MonitorState::default(),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_cadence(mut self, cadence: MonitorCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("reward monitor started");
        while !cancel.is_cancelled() {
            let wait = match self.cycle().await {
                Ok(CycleOutcome::Unresolved) => self.cadence.idle,
                Ok(_) => self.cadence.poll,
                Err(e) => {
                    error!(error = %e, "reward monitor cycle failed");
                    self.cadence.cooldown
                }
            };
            if !self.pacer.pause(wait, &cancel).await {
                break;
            }
        }
        info!("reward monitor stopped");
    }

    /// One pass: identity, resolution, poll, notify.
    pub async fn cycle(&mut self) -> Result<CycleOutcome, MonitorError> {
        let provider = Arc::clone(&self.identity);
        if let Some(identity) = tokio::task::spawn_blocking(move || provider.current()).await? {
            self.state.absorb(&identity);
        }

        if self.state.peer_id.is_none() {
            self.resolve().await;
        }

        let Some(peer_id) = self.state.peer_id.clone() else {
            debug!(phase = ?self.state.phase(), "peer id unknown, idling");
            return Ok(CycleOutcome::Unresolved);
        };

        let snapshot = match self.directory.fetch_rewards(&peer_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(peer_id = %peer_id, error = %e, "reward poll failed");
                return Ok(CycleOutcome::PollFailed);
            }
        };
        debug!(
            peer_id = %peer_id,
            reward = snapshot.reward,
            score = snapshot.score,
            online = snapshot.online,
            "reward poll"
        );

        let delta = self.state.tracker.observe(snapshot.reward, snapshot.score);
        if let Some(delta) = &delta {
            self.announce(&peer_id, delta).await;
        }
        Ok(CycleOutcome::Polled(delta))
    }

    async fn resolve(&mut self) {
        let Some(name) = self.state.peer_name.clone() else {
            return;
        };
        match self.directory.resolve_peer(&name).await {
            Ok(resolved) => {
                info!(peer_name = %name, peer_id = %resolved.peer_id, "resolved peer id");
                self.state.peer_id = Some(resolved.peer_id);
            }
            Err(e) => {
                warn!(peer_name = %name, error = %e, "peer id resolution failed");
            }
        }
    }

    async fn announce(&self, peer_id: &str, delta: &Delta) {
        let update = RewardUpdate {
            peer_name: self.state.peer_name.clone(),
            peer_id: peer_id.to_string(),
            reward: delta.reward,
            reward_diff: delta.reward_diff,
            score: delta.score,
            win_diff: delta.win_diff,
            message: delta.message(),
        };
        info!(peer_id = %peer_id, message = %update.message, "reward increased");
        if let Err(e) = self.notifier.reward_update(&update).await {
            error!(peer_id = %peer_id, error = %e, "reward notification failed");
        }
    }
}
