//! Log → cache → dashboard → delta → webhook, against mocked HTTP endpoints.

use serde_json::json;
use std::sync::Arc;
use swarm_dashboard::DashboardClient;
use swarm_notify::{RetryPolicy, WebhookClient, WebhookSettings};
use swarm_peer::PeerCache;
use swarm_proto::PeerIdentity;
use swarm_reward::{CycleOutcome, RewardMonitor};
use swarmnode_tests::swarm_log_text;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn dashboard() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/peer"))
        .and(query_param("name", "sly loud alpaca"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"peerId": "0xWALLET|QmPeer", "peerName": "sly loud alpaca"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/peer"))
        .and(query_param("id", "QmPeer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reward": 100, "score": 2, "online": true})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/peer"))
        .and(query_param("id", "QmPeer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reward": 150, "score": 2, "online": true})))
        .with_priority(2)
        .mount(&server)
        .await;
    server
}

fn webhook_for(server: &MockServer) -> Arc<WebhookClient> {
    let settings = WebhookSettings {
        url: format!("{}/hook", server.uri()),
        vps_name: "Test Box".to_string(),
        vps_id: "test-box".to_string(),
        auth_token: "s3cret".to_string(),
    };
    Arc::new(
        WebhookClient::new(settings)
            .unwrap()
            .with_retry(RetryPolicy {
                attempts: 1,
                ..RetryPolicy::default()
            }),
    )
}

#[tokio::test]
async fn first_increase_reaches_the_webhook() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("swarm_launcher.log");
    // The id in the log is ignored because the cache already names the peer.
    std::fs::write(&log, swarm_log_text("sly loud alpaca", "QmFromLog")).unwrap();
    let cache_path = dir.path().join("peer_info.json");
    std::fs::write(
        &cache_path,
        serde_json::to_string(&json!({"peer_name": "sly loud alpaca", "peer_id": ""})).unwrap(),
    )
    .unwrap();

    let dash = dashboard().await;
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "message_type": "reward_update",
            "vps_id": "test-box",
            "data": {"peer_id": "QmPeer", "reward": 150.0, "reward_diff": 50.0},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hook)
        .await;

    let mut monitor = RewardMonitor::new(
        Arc::new(PeerCache::for_log(&cache_path, &log)),
        Arc::new(DashboardClient::new(&dash.uri()).unwrap()),
        webhook_for(&hook),
    );

    // Baseline poll: resolves the name, records 100/2, nothing to announce.
    let first = monitor.cycle().await.unwrap();
    assert_eq!(first, CycleOutcome::Polled(None));
    assert_eq!(monitor.state().peer_id.as_deref(), Some("QmPeer"));

    // Reward grows by 50, wins unchanged: one reward_update envelope.
    let second = monitor.cycle().await.unwrap();
    let CycleOutcome::Polled(Some(delta)) = second else {
        panic!("expected a delta, got {second:?}");
    };
    assert_eq!(delta.reward_diff, Some(50.0));
    assert_eq!(delta.win_diff, None);
    assert_eq!(delta.message(), "🎁 reward 150+50");
}

#[tokio::test]
async fn empty_cache_is_filled_from_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("swarm_launcher.log");
    std::fs::write(&log, swarm_log_text("sly loud alpaca", "QmPeer")).unwrap();
    let cache_path = dir.path().join("peer_info.json");

    let cache = PeerCache::for_log(&cache_path, &log);
    let identity = cache.read().unwrap();
    assert_eq!(identity.name(), Some("sly loud alpaca"));
    assert_eq!(identity.id(), Some("QmPeer"));

    let stored: PeerIdentity =
        serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
    assert_eq!(stored.id(), Some("QmPeer"));

    // A later log with another peer does not override a valid cache.
    std::fs::write(&log, swarm_log_text("other peer", "QmOther")).unwrap();
    assert_eq!(cache.read().unwrap().id(), Some("QmPeer"));
}
