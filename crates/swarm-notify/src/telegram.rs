//! Telegram Bot API delivery.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use swarm_proto::{Notification, Priority, RewardUpdate, escape_html};
use tracing::{debug, warn};
use url::Url;

use crate::{Notifier, NotifyError};

pub const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    api_base: Url,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_api_base(TELEGRAM_API, bot_token, chat_id)
    }

    pub fn with_api_base(
        api_base: &str,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        let api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        Ok(Self {
            api_base,
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            client,
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// `{api_base}/bot{token}/{method}`, keeping any path prefix on the base.
    /// The token is pushed as one segment so its `:` never reads as a scheme.
    fn method_url(&self, method: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&format!("bot{}", self.bot_token))
                .push(method);
        }
        url
    }

    /// Send an HTML-formatted message to the configured chat. Callers escape
    /// any untrusted text.
    pub async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        if self.bot_token.is_empty() || self.chat_id.is_empty() {
            return Err(NotifyError::Disabled);
        }
        let url = self.method_url("sendMessage");
        let resp = self
            .client
            .post(url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(status = %status, chat_id = %self.chat_id, "telegram rejected message");
            return Err(NotifyError::Status(status));
        }
        debug!(chat_id = %self.chat_id, "telegram message sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn reward_update(&self, update: &RewardUpdate) -> Result<(), NotifyError> {
        let who = update.peer_name.as_deref().unwrap_or(&update.peer_id);
        let text = format!("{}: {}", escape_html(who), escape_html(&update.message));
        self.send_message(&text).await
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = escape_html(&notification.message);
        let text = match notification.priority {
            Priority::High => format!("⚠️ {message}"),
            Priority::Normal => message,
        };
        self.send_message(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn notifier(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::with_api_base(&server.uri(), "123:abc", "-1001").expect("notifier")
    }

    #[tokio::test]
    async fn reward_update_posts_to_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let update = RewardUpdate {
            peer_name: Some("alpha wolf".to_string()),
            peer_id: "Qm1".to_string(),
            reward: 10.0,
            reward_diff: Some(2.0),
            score: 1.0,
            win_diff: None,
            message: "🎁 reward 10+2".to_string(),
        };
        notifier(&server).await.reward_update(&update).await.expect("sent");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["chat_id"], "-1001");
        assert_eq!(body["text"], "alpha wolf: 🎁 reward 10+2");
        assert_eq!(body["parse_mode"], "HTML");
    }

    #[tokio::test]
    async fn high_priority_is_flagged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        notifier(&server)
            .await
            .notify(&Notification::new("stale_logs", "no log activity", Priority::High))
            .await
            .expect("sent");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["text"], "⚠️ no log activity");
    }

    #[tokio::test]
    async fn api_base_path_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tg/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let n = TelegramNotifier::with_api_base(&format!("{}/tg/", server.uri()), "123:abc", "-1001")
            .expect("notifier");
        n.send_message("hi").await.expect("sent");
    }

    #[test]
    fn token_with_colon_stays_in_the_path() {
        let n = TelegramNotifier::new("123456:AAF-x_y", "-1001").expect("notifier");
        assert_eq!(
            n.method_url("sendMessage").as_str(),
            "https://api.telegram.org/bot123456:AAF-x_y/sendMessage"
        );
    }

    #[tokio::test]
    async fn markup_in_text_is_escaped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let update = RewardUpdate {
            peer_name: Some("<b>wolf</b>".to_string()),
            peer_id: "Qm1".to_string(),
            reward: 10.0,
            reward_diff: Some(2.0),
            score: 1.0,
            win_diff: None,
            message: "reward 10 & rising".to_string(),
        };
        notifier(&server).await.reward_update(&update).await.expect("sent");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["text"], "&lt;b&gt;wolf&lt;/b&gt;: reward 10 &amp; rising");
    }

    #[tokio::test]
    async fn rejected_message_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = notifier(&server).await.send_message("hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(StatusCode::FORBIDDEN)));
    }

    #[tokio::test]
    async fn missing_chat_is_disabled() {
        let n = TelegramNotifier::new("123:abc", "").expect("notifier");
        assert!(matches!(n.send_message("x").await, Err(NotifyError::Disabled)));
    }
}
