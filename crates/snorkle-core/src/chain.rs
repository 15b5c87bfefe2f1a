//! Chain RPC boundary
//!
//! `ChainClient` abstracts the explorer REST API the executor consults for
//! program sources, imports and existence checks. Only the request/response
//! JSON contract is modelled; response bodies stay as `serde_json::Value`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::errors::{RpcError, SnorkleResult};
use crate::types::Network;

/// Public Provable explorer API
pub const DEFAULT_ENDPOINT_URL: &str = "https://api.explorer.provable.com/v1";

/// Local devnet node
pub const DEVNET_ENDPOINT_URL: &str = "http://localhost:3030";

// ----------------------------------------------------------------------------
// Endpoint
// ----------------------------------------------------------------------------

/// Base URL plus network segment; every REST path hangs off `{base}/{network}/`
///
/// Deserialization goes through `ChainEndpoint::new`, so an endpoint read from
/// a frame or a config file is held to the same http(s) rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawEndpoint")]
pub struct ChainEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub network: Network,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEndpoint {
    base_url: String,
    #[serde(default)]
    network: Network,
}

impl TryFrom<RawEndpoint> for ChainEndpoint {
    type Error = RpcError;

    fn try_from(raw: RawEndpoint) -> Result<Self, Self::Error> {
        ChainEndpoint::new(raw.base_url, raw.network)
    }
}

impl ChainEndpoint {
    /// Create an endpoint, rejecting anything that is not an absolute http(s) URL
    pub fn new(base_url: impl Into<String>, network: Network) -> Result<Self, RpcError> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url).map_err(|e| RpcError::InvalidEndpoint {
            reason: format!("{}: {}", base_url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RpcError::InvalidEndpoint {
                reason: format!("{}: URL must start with http:// or https://", base_url),
            });
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            network,
        })
    }

    /// Provable explorer endpoint for the given network
    pub fn provable(network: Network) -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT_URL.to_string(),
            network,
        }
    }

    /// Local devnet endpoint for the given network
    pub fn devnet(network: Network) -> Self {
        Self {
            base_url: DEVNET_ENDPOINT_URL.to_string(),
            network,
        }
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// `{base}/{network}`
    pub fn network_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.network)
    }

    /// Join a relative REST path onto the network URL
    pub fn url(&self, path: &str) -> Result<Url, RpcError> {
        let full = format!("{}/{}", self.network_url(), path.trim_start_matches('/'));
        Url::parse(&full).map_err(|e| RpcError::InvalidEndpoint {
            reason: format!("{}: {}", full, e),
        })
    }

    pub fn latest_block_url(&self) -> Result<Url, RpcError> {
        self.url("latest/block")
    }

    pub fn latest_height_url(&self) -> Result<Url, RpcError> {
        self.url("latest/height")
    }

    pub fn block_by_height_url(&self, height: u64) -> Result<Url, RpcError> {
        self.url(&format!("block/{}", height))
    }

    pub fn block_by_hash_url(&self, hash: &str) -> Result<Url, RpcError> {
        self.url(&format!("block/{}", hash))
    }

    pub fn program_url(&self, program_id: &str) -> Result<Url, RpcError> {
        self.url(&format!("program/{}", program_id))
    }

    pub fn mappings_url(&self, program_id: &str) -> Result<Url, RpcError> {
        self.url(&format!("program/{}/mappings", program_id))
    }

    pub fn mapping_value_url(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> Result<Url, RpcError> {
        self.url(&format!("program/{}/mapping/{}/{}", program_id, mapping, key))
    }

    pub fn transaction_url(&self, transaction_id: &str) -> Result<Url, RpcError> {
        self.url(&format!("transaction/{}", transaction_id))
    }
}

impl Default for ChainEndpoint {
    fn default() -> Self {
        Self::provable(Network::default())
    }
}

// ----------------------------------------------------------------------------
// Client Traits
// ----------------------------------------------------------------------------

/// Read access to one chain REST endpoint
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Endpoint this client talks to
    fn endpoint(&self) -> &ChainEndpoint;

    async fn latest_block(&self) -> SnorkleResult<serde_json::Value>;

    async fn latest_height(&self) -> SnorkleResult<u64>;

    async fn block_by_height(&self, height: u64) -> SnorkleResult<serde_json::Value>;

    async fn block_by_hash(&self, hash: &str) -> SnorkleResult<serde_json::Value>;

    /// Source text of a deployed program
    async fn program(&self, program_id: &str) -> SnorkleResult<String>;

    async fn mapping_names(&self, program_id: &str) -> SnorkleResult<Vec<String>>;

    /// Value stored under `key`, or `None` when the key is absent
    async fn mapping_value(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> SnorkleResult<Option<serde_json::Value>>;

    async fn transaction(&self, transaction_id: &str) -> SnorkleResult<serde_json::Value>;
}

/// Factory producing a client for a given endpoint
///
/// Handlers resolve the endpoint per request and ask the connector for a client,
/// so no request can redirect another one's traffic.
pub trait ChainConnector: Send + Sync {
    fn connect(&self, endpoint: &ChainEndpoint) -> SnorkleResult<Arc<dyn ChainClient>>;
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
