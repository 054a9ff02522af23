//! Outbound webhook delivery.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use swarm_proto::{MessageType, Notification, RewardUpdate, WebhookEnvelope};
use tracing::{error, info, warn};

use crate::{Notifier, NotifyError};

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity and destination for outbound webhook calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    pub vps_name: String,
    pub vps_id: String,
    pub auth_token: String,
}

impl WebhookSettings {
    /// All four fields are required before anything is sent.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
            && !self.vps_name.is_empty()
            && !self.vps_id.is_empty()
            && !self.auth_token.is_empty()
    }
}

/// Attempt count and backoff base; attempt `n` (0-based) is followed by a
/// `base_delay * 2^n` pause unless it was the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    settings: WebhookSettings,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(settings: WebhookSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            settings,
            retry: RetryPolicy::default(),
            client,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_configured()
    }

    pub fn settings(&self) -> &WebhookSettings {
        &self.settings
    }

    pub fn envelope(&self, message_type: MessageType, data: Value) -> WebhookEnvelope {
        WebhookEnvelope {
            timestamp: Utc::now(),
            message_type,
            vps_name: self.settings.vps_name.clone(),
            vps_id: self.settings.vps_id.clone(),
            auth_token: self.settings.auth_token.clone(),
            data,
        }
    }

    /// Wrap `data` in an envelope and deliver it.
    pub async fn send(&self, message_type: MessageType, data: Value) -> Result<(), NotifyError> {
        if !self.is_enabled() {
            return Err(NotifyError::Disabled);
        }
        let envelope = self.envelope(message_type, data);
        self.deliver(&envelope).await
    }

    /// POST an envelope; success means HTTP 200.
    pub async fn deliver(&self, envelope: &WebhookEnvelope) -> Result<(), NotifyError> {
        let user_agent = format!("swarmnode-webhook/{}", self.settings.vps_id);

        for attempt in 0..self.retry.attempts {
            let result = self
                .client
                .post(&self.settings.url)
                .header(USER_AGENT, &user_agent)
                .json(envelope)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    info!(message_type = %envelope.message_type, attempt = attempt + 1, "webhook delivered");
                    return Ok(());
                }
                Ok(resp) => {
                    warn!(
                        message_type = %envelope.message_type,
                        status = %resp.status(),
                        attempt = attempt + 1,
                        "webhook rejected"
                    );
                }
                Err(e) => {
                    warn!(
                        message_type = %envelope.message_type,
                        error = %e,
                        attempt = attempt + 1,
                        "webhook send error"
                    );
                }
            }

            if attempt + 1 < self.retry.attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        error!(
            message_type = %envelope.message_type,
            attempts = self.retry.attempts,
            "webhook delivery exhausted retries"
        );
        Err(NotifyError::Exhausted {
            attempts: self.retry.attempts,
        })
    }

    pub async fn send_heartbeat(&self, data: Value) -> Result<(), NotifyError> {
        self.send(MessageType::Heartbeat, data).await
    }

    pub async fn send_node_status(&self, data: Value) -> Result<(), NotifyError> {
        self.send(MessageType::NodeStatus, data).await
    }

    pub async fn send_error_alert(
        &self,
        error_type: &str,
        error_message: &str,
        context: Value,
    ) -> Result<(), NotifyError> {
        self.send(
            MessageType::ErrorAlert,
            json!({
                "error_type": error_type,
                "error_message": error_message,
                "context": context,
            }),
        )
        .await
    }
}

#[async_trait]
impl Notifier for WebhookClient {
    async fn reward_update(&self, update: &RewardUpdate) -> Result<(), NotifyError> {
        let data = serde_json::to_value(update).unwrap_or(Value::Null);
        self.send(MessageType::RewardUpdate, data).await
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let data = serde_json::to_value(notification).unwrap_or(Value::Null);
        self.send(MessageType::Notification, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use swarm_proto::Priority;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(url: String) -> WebhookSettings {
        WebhookSettings {
            url,
            vps_name: "london-1".to_string(),
            vps_id: "london-1".to_string(),
            auth_token: "s3cret".to_string(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }

    fn client(server: &MockServer) -> WebhookClient {
        WebhookClient::new(settings(format!("{}/webhook/swarm", server.uri())))
            .expect("client")
            .with_retry(fast_retry())
    }

    #[test]
    fn default_backoff_doubles_from_one_second() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay_after(0), Duration::from_secs(1));
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn settings_require_every_field() {
        assert!(settings("http://x".to_string()).is_configured());
        let mut s = settings("http://x".to_string());
        s.auth_token.clear();
        assert!(!s.is_configured());
        assert!(!WebhookSettings::default().is_configured());
    }

    #[tokio::test]
    async fn three_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/swarm"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let started = Instant::now();
        let err = client(&server)
            .send(MessageType::Heartbeat, json!({"uptime": "1.0h"}))
            .await
            .unwrap_err();

        assert!(matches!(err, NotifyError::Exhausted { attempts: 3 }));
        // 10ms + 20ms between the three attempts.
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn success_on_second_attempt_stops_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        client(&server)
            .send(MessageType::Notification, json!({"message": "hi"}))
            .await
            .expect("delivered");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_200_success_codes_count_as_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = client(&server)
            .send(MessageType::Heartbeat, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn envelope_carries_identity_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("user-agent", "swarmnode-webhook/london-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let update = RewardUpdate {
            peer_name: Some("alpha wolf".to_string()),
            peer_id: "Qm123".to_string(),
            reward: 150.0,
            reward_diff: Some(50.0),
            score: 3.0,
            win_diff: None,
            message: "🎁 reward 150+50".to_string(),
        };
        client(&server).reward_update(&update).await.expect("delivered");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["message_type"], "reward_update");
        assert_eq!(body["vps_name"], "london-1");
        assert_eq!(body["vps_id"], "london-1");
        assert_eq!(body["auth_token"], "s3cret");
        assert_eq!(body["data"]["reward_diff"], 50.0);
        assert!(body["data"]["win_diff"].is_null());
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn unconfigured_client_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut s = settings(server.uri());
        s.vps_id.clear();
        let client = WebhookClient::new(s).expect("client");
        let err = client
            .notify(&Notification::new("test", "hello", Priority::Normal))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Disabled));
    }
}
