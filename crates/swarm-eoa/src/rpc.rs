//! `getEoa(string[])` against the registry contract.

use alloy::primitives::Address;
use alloy::providers::RootProvider;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{EoaError, EoaSource};

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

alloy::sol! {
    #[sol(rpc)]
    interface IPeerRegistry {
        function getEoa(string[] peerIds) external view returns (address[]);
    }
}

#[derive(Debug, Clone)]
pub struct RegistryRpc {
    contract: Address,
    provider: RootProvider,
}

impl RegistryRpc {
    pub fn new(rpc_url: &str, contract: &str) -> Result<Self, EoaError> {
        let url: Url = rpc_url.parse()?;
        let contract = contract.parse::<Address>().map_err(|e| EoaError::Address {
            address: contract.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            contract,
            provider: RootProvider::new_http(url),
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }
}

#[async_trait]
impl EoaSource for RegistryRpc {
    async fn get_eoa(&self, peer_ids: &[String]) -> Result<Vec<String>, EoaError> {
        debug!(contract = %self.contract, count = peer_ids.len(), "getEoa call");
        let registry = IPeerRegistry::new(self.contract, self.provider.clone());
        let call = registry.getEoa(peer_ids.to_vec());
        let addresses = tokio::time::timeout(RPC_TIMEOUT, call.call())
            .await
            .map_err(|_| EoaError::Timeout(RPC_TIMEOUT))??;
        Ok(addresses.iter().map(|a| a.to_checksum(None)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_REGISTRY_CONTRACT;
    use alloy::primitives::hex;
    use alloy::sol_types::SolCall;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const ADDRESS: &str = "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

    /// ABI encoding of a one-element `address[]`.
    fn address_array_result() -> String {
        let word = |tail: &str| format!("{tail:0>64}");
        format!("0x{}{}{}", word("20"), word("1"), word(ADDRESS))
    }

    /// Answer each JSON-RPC request with `reply`, echoing its id.
    fn echo_id(reply: Value) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
        move |req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap_or_default();
            let mut out = reply.clone();
            out["jsonrpc"] = json!("2.0");
            out["id"] = body["id"].clone();
            ResponseTemplate::new(200).set_body_json(out)
        }
    }

    #[test]
    fn contract_address_is_validated() {
        let rpc = RegistryRpc::new("http://rpc.local", DEFAULT_REGISTRY_CONTRACT).unwrap();
        assert_eq!(rpc.contract().to_checksum(None), DEFAULT_REGISTRY_CONTRACT);

        let err = RegistryRpc::new("http://rpc.local", "0xFaD7").unwrap_err();
        assert!(matches!(err, EoaError::Address { .. }));
        assert!(matches!(
            RegistryRpc::new("not a url", DEFAULT_REGISTRY_CONTRACT),
            Err(EoaError::Url(_))
        ));
    }

    #[tokio::test]
    async fn decodes_and_checksums_eth_call_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_call"})))
            .respond_with(echo_id(json!({"result": address_array_result()})))
            .expect(1)
            .mount(&server)
            .await;

        let rpc = RegistryRpc::new(&server.uri(), DEFAULT_REGISTRY_CONTRACT).unwrap();
        let eoas = rpc.get_eoa(&["Qm1".to_string()]).await.unwrap();
        assert_eq!(eoas, vec!["0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string()]);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let to = body["params"][0]["to"].as_str().unwrap();
        assert_eq!(to.to_lowercase(), DEFAULT_REGISTRY_CONTRACT.to_lowercase());
        let input = body["params"][0]["input"]
            .as_str()
            .or_else(|| body["params"][0]["data"].as_str())
            .unwrap();
        let selector = format!("0x{}", hex::encode(IPeerRegistry::getEoaCall::SELECTOR));
        assert!(input.starts_with(&selector), "{input}");
    }

    #[tokio::test]
    async fn rpc_fault_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(echo_id(json!({
                "error": {"code": -32000, "message": "execution reverted"},
            })))
            .mount(&server)
            .await;

        let rpc = RegistryRpc::new(&server.uri(), DEFAULT_REGISTRY_CONTRACT).unwrap();
        let err = rpc.get_eoa(&["Qm1".to_string()]).await.unwrap_err();
        assert!(matches!(err, EoaError::Call(_)));
        assert!(err.to_string().contains("execution reverted"), "{err}");
    }
}
