//! Shared fixtures for the swarmnode integration tests.

#![forbid(unsafe_code)]

use serde_json::{Value, json};
use std::path::Path;
use swarmnode::config::NodeConfig;
use wiremock::{Request, ResponseTemplate};

/// Address that is not listening; probes against it fail fast.
pub const CLOSED_URL: &str = "http://127.0.0.1:1";

/// A launcher log announcing `peer_name`/`peer_id`, with one round marker pair.
pub fn swarm_log_text(peer_name: &str, peer_id: &str) -> String {
    [
        "[2024-03-01 09:00:00,001][swarm][INFO] - Booting worker".to_string(),
        format!(
            "[2024-03-01 09:00:02,417][swarm][INFO] - 🐱 Hello 🐈 [{peer_name}] 🦮 [{peer_id}]!"
        ),
        "[2024-03-01 09:10:00,000][swarm][INFO] - Joining round: 812".to_string(),
        "[2024-03-01 09:11:00,000][swarm][INFO] - Starting round: 812/0".to_string(),
    ]
    .join("\n")
}

/// Node config with every path inside `dir` and every remote endpoint closed.
pub fn node_config(dir: &Path) -> NodeConfig {
    let mut config = NodeConfig {
        vps_name: "Test Box".to_string(),
        vps_id: "test-box".to_string(),
        auth_token: "s3cret".to_string(),
        listen_host: "127.0.0.1".to_string(),
        listen_port: 0,
        dashboard_url: CLOSED_URL.to_string(),
        local_api_url: CLOSED_URL.to_string(),
        public_ip_url: CLOSED_URL.to_string(),
        ..NodeConfig::default()
    };
    let paths = &mut config.paths;
    paths.swarm_log = dir.join("swarm_launcher.log");
    paths.peer_cache = dir.join("peer_info.json");
    paths.eoa_cache = dir.join("eoa_cache.json");
    paths.credentials = vec![dir.join("userData.json"), dir.join("userApiKey.json")];
    paths.sync_backup_dir = dir.join("sync-backup");
    paths.archive_backup_dir = dir.join("backup-userdata");
    paths.wandb_dir = dir.join("wandb");
    paths.logs.insert("gensyn".to_string(), paths.swarm_log.clone());
    config
}

/// ABI encoding of a one-element `address[]`, as `eth_call` returns it.
pub fn single_address_result(address_hex: &str) -> String {
    let word = |tail: &str| format!("{tail:0>64}");
    format!(
        "0x{}{}{}",
        word("20"),
        word("1"),
        word(address_hex.trim_start_matches("0x"))
    )
}

/// JSON-RPC responder returning `result` under the caller's request id.
pub fn rpc_result(result: String) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
    move |req: &Request| {
        let id = serde_json::from_slice::<Value>(&req.body)
            .map(|body| body["id"].clone())
            .unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_result_is_three_words() {
        let data = single_address_result("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
        assert_eq!(data.len(), 2 + 3 * 64);
        assert!(data.ends_with("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
    }
}
