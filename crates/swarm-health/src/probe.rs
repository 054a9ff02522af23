//! HTTP and log probes behind the service watch.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use swarm_peer::SwarmLog;
use tracing::debug;

use crate::HealthError;
use crate::wandb::{self, WandbListing};
use crate::watch::Observation;

pub const DEFAULT_LOCAL_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_PUBLIC_IP_URL: &str = "https://api.ipify.org";
pub const UNKNOWN_IP: &str = "Unknown";

const LOCAL_API_TIMEOUT: Duration = Duration::from_secs(3);
const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(10);
const LOGIN_PAGE_MARKER: &str = "Sign in to Gensyn";

/// Source of [`Observation`]s.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn observe(&self) -> Result<Observation, HealthError>;
}

#[derive(Debug, Clone)]
pub struct HttpProbe {
    local_api_url: String,
    public_ip_url: String,
    log: SwarmLog,
    wandb_dir: Option<PathBuf>,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(
        local_api_url: impl Into<String>,
        public_ip_url: impl Into<String>,
        log: SwarmLog,
    ) -> Self {
        Self {
            local_api_url: local_api_url.into(),
            public_ip_url: public_ip_url.into(),
            log,
            wandb_dir: None,
            client: reqwest::Client::new(),
        }
    }

    /// Also list the W&B log directory on every observation.
    pub fn with_wandb_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.wandb_dir = Some(dir.into());
        self
    }

    /// The local login API is up when it serves its sign-in page.
    pub async fn api_alive(&self) -> bool {
        let resp = self
            .client
            .get(&self.local_api_url)
            .timeout(LOCAL_API_TIMEOUT)
            .send()
            .await;
        match resp {
            Ok(resp) => resp
                .text()
                .await
                .is_ok_and(|body| body.contains(LOGIN_PAGE_MARKER)),
            Err(e) => {
                debug!(url = %self.local_api_url, error = %e, "local api unreachable");
                false
            }
        }
    }

    /// Public IPv4 as seen by the lookup service, or `Unknown`.
    pub async fn public_ip(&self) -> String {
        let resp = self
            .client
            .get(&self.public_ip_url)
            .timeout(PUBLIC_IP_TIMEOUT)
            .send()
            .await;
        let body = match resp {
            Ok(resp) => resp.text().await,
            Err(e) => Err(e),
        };
        match body {
            Ok(body) => body.trim().to_string(),
            Err(e) => {
                debug!(url = %self.public_ip_url, error = %e, "public ip lookup failed");
                UNKNOWN_IP.to_string()
            }
        }
    }
}

#[async_trait]
impl ServiceProbe for HttpProbe {
    async fn observe(&self) -> Result<Observation, HealthError> {
        let api_alive = self.api_alive().await;
        let public_ip = self.public_ip().await;
        let log = self.log.clone();
        let wandb_dir = self.wandb_dir.clone();
        let (activity, wandb) = tokio::task::spawn_blocking(move || {
            let listing = wandb_dir.as_deref().map(wandb::scan).unwrap_or_default();
            (log.activity(), listing)
        })
        .await?;
        Ok(Observation {
            api_alive,
            public_ip,
            last_activity: activity.and_then(|a| a.timestamp),
            wandb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn login_page_means_alive() {
        let api = serve("<html><h1>Sign in to Gensyn</h1></html>").await;
        let probe = HttpProbe::new(api.uri(), "http://127.0.0.1:1", SwarmLog::new("/nonexistent"));
        assert!(probe.api_alive().await);

        let other = serve("<html>maintenance</html>").await;
        let probe = HttpProbe::new(other.uri(), "http://127.0.0.1:1", SwarmLog::new("/nonexistent"));
        assert!(!probe.api_alive().await);
    }

    #[tokio::test]
    async fn unreachable_services_degrade() {
        let probe = HttpProbe::new(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            SwarmLog::new("/nonexistent"),
        );
        let obs = probe.observe().await.unwrap();
        assert!(!obs.api_alive);
        assert_eq!(obs.public_ip, UNKNOWN_IP);
        assert_eq!(obs.last_activity, None);
        assert!(obs.wandb.is_empty());
    }

    #[tokio::test]
    async fn observation_lists_wandb_runs() {
        let dir = tempfile::tempdir().unwrap();
        let wandb = dir.path().join("wandb");
        std::fs::create_dir_all(wandb.join("run-1")).unwrap();
        std::fs::write(wandb.join("run-1").join("output.log"), "step 1").unwrap();

        let probe = HttpProbe::new("http://127.0.0.1:1", "http://127.0.0.1:1", SwarmLog::new("/nonexistent"))
            .with_wandb_dir(&wandb);
        let obs = probe.observe().await.unwrap();
        assert_eq!(obs.wandb.folders.len(), 1);
        assert!(obs.wandb.files.contains(&wandb.join("run-1").join("output.log")));
    }

    #[tokio::test]
    async fn observation_combines_ip_and_log() {
        let ip = serve("203.0.113.7\n").await;
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("swarm_launcher.log");
        std::fs::write(&log, "[2024-03-01 09:30:00,555][swarm][INFO] - Joining round: 9\n").unwrap();

        let probe = HttpProbe::new("http://127.0.0.1:1", ip.uri(), SwarmLog::new(&log));
        let obs = probe.observe().await.unwrap();
        assert_eq!(obs.public_ip, "203.0.113.7");
        assert_eq!(
            obs.last_activity.map(|t| t.to_string()),
            Some("2024-03-01 09:30:00".to_string())
        );
    }
}
