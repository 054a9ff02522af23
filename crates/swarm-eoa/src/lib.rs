//! Peer id → EOA address lookups.
//!
//! The swarm registry contract maps each peer id to the externally owned
//! account that registered it. Lookups go through [`EoaCache`], which keeps
//! one day's worth of answers on disk; misses are served by an [`EoaSource`],
//! in production [`RegistryRpc`] calling `getEoa(string[])` through an alloy
//! HTTP provider.

#![forbid(unsafe_code)]

pub mod cache;
pub mod rpc;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use cache::{EoaCache, EoaCacheDoc};
pub use rpc::RegistryRpc;

/// Registry contract on the swarm testnet.
pub const DEFAULT_REGISTRY_CONTRACT: &str = "0xFaD7C5e93f28257429569B854151A1B8DCD404c2";

const EXPLORER_BASE: &str = "https://gensyn-testnet.explorer.alchemy.com";

#[derive(Debug, Error)]
pub enum EoaError {
    #[error("invalid contract address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("getEoa call failed: {0}")]
    Call(#[from] alloy::contract::Error),

    #[error("getEoa call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid rpc url: {0}")]
    Url(#[from] url::ParseError),
}

/// Resolves peer ids to addresses, in request order.
#[async_trait]
pub trait EoaSource: Send + Sync {
    async fn get_eoa(&self, peer_ids: &[String]) -> Result<Vec<String>, EoaError>;
}

/// Block explorer page for an address.
pub fn explorer_url(address: &str) -> String {
    format!("{EXPLORER_BASE}/address/{address}?tab=internal_txns")
}
