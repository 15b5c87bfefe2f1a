//! HTTP chain client
//!
//! `ChainClient` over the explorer REST API using `reqwest`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use snorkle_core::{ChainClient, ChainConnector, ChainEndpoint, RpcError, SnorkleResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct HttpChainClient {
    endpoint: ChainEndpoint,
    client: Client,
}

impl HttpChainClient {
    pub fn new(endpoint: ChainEndpoint, client: Client) -> Self {
        Self { endpoint, client }
    }

    async fn get_json(&self, url: reqwest::Url) -> SnorkleResult<Value> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RpcError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RpcError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| RpcError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| {
            RpcError::MalformedJson {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn malformed(url: &reqwest::Url, reason: &str) -> RpcError {
    RpcError::MalformedJson {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    fn endpoint(&self) -> &ChainEndpoint {
        &self.endpoint
    }

    async fn latest_block(&self) -> SnorkleResult<Value> {
        self.get_json(self.endpoint.latest_block_url()?).await
    }

    async fn latest_height(&self) -> SnorkleResult<u64> {
        let url = self.endpoint.latest_height_url()?;
        let value = self.get_json(url.clone()).await?;
        value
            .as_u64()
            .ok_or_else(|| malformed(&url, "block height is not an unsigned integer").into())
    }

    async fn block_by_height(&self, height: u64) -> SnorkleResult<Value> {
        self.get_json(self.endpoint.block_by_height_url(height)?).await
    }

    async fn block_by_hash(&self, hash: &str) -> SnorkleResult<Value> {
        self.get_json(self.endpoint.block_by_hash_url(hash)?).await
    }

    async fn program(&self, program_id: &str) -> SnorkleResult<String> {
        let url = self.endpoint.program_url(program_id)?;
        match self.get_json(url.clone()).await? {
            Value::String(source) => Ok(source),
            _ => Err(malformed(&url, "program source is not a string").into()),
        }
    }

    async fn mapping_names(&self, program_id: &str) -> SnorkleResult<Vec<String>> {
        let url = self.endpoint.mappings_url(program_id)?;
        let value = self.get_json(url.clone()).await?;
        serde_json::from_value(value).map_err(|e| malformed(&url, &e.to_string()).into())
    }

    async fn mapping_value(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> SnorkleResult<Option<Value>> {
        let value = self
            .get_json(self.endpoint.mapping_value_url(program_id, mapping, key)?)
            .await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn transaction(&self, transaction_id: &str) -> SnorkleResult<Value> {
        self.get_json(self.endpoint.transaction_url(transaction_id)?).await
    }
}

/// Hands out `HttpChainClient`s sharing one connection pool
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new(request_timeout: Duration) -> SnorkleResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::InvalidEndpoint {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Client for `endpoint` without going through the trait object
    pub fn client_for(&self, endpoint: &ChainEndpoint) -> HttpChainClient {
        HttpChainClient::new(endpoint.clone(), self.client.clone())
    }
}

impl ChainConnector for HttpConnector {
    fn connect(&self, endpoint: &ChainEndpoint) -> SnorkleResult<Arc<dyn ChainClient>> {
        Ok(Arc::new(self.client_for(endpoint)))
    }
}
