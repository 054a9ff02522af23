//! Operator notifications for swarmnode.
//!
//! Provides the [`Notifier`] seam used by the monitor loops, with three
//! deliveries:
//! - [`WebhookClient`]: authenticated JSON envelope POSTed to the operator's
//!   webhook receiver, retried with exponential backoff;
//! - [`TelegramNotifier`]: plain chat message through the Bot API;
//! - [`LogNotifier`]: no delivery configured, log only.

#![forbid(unsafe_code)]

pub mod telegram;
pub mod webhook;

use async_trait::async_trait;
use swarm_proto::{Notification, RewardUpdate};
use thiserror::Error;
use tracing::info;

pub use telegram::TelegramNotifier;
pub use webhook::{RetryPolicy, WebhookClient, WebhookSettings};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel is not configured")]
    Disabled,

    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("delivery failed after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("invalid notification url: {0}")]
    Url(#[from] url::ParseError),
}

/// Where monitor loops send what they find.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn reward_update(&self, update: &RewardUpdate) -> Result<(), NotifyError>;
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Used when neither a webhook nor a chat is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn reward_update(&self, update: &RewardUpdate) -> Result<(), NotifyError> {
        info!(peer_id = %update.peer_id, message = %update.message, "reward update (no channel configured)");
        Ok(())
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            kind = %notification.notification_type,
            message = %notification.message,
            "notification (no channel configured)"
        );
        Ok(())
    }
}
