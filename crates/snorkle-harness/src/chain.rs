//! In-memory chain
//!
//! `MockConnector` owns a shared program/mapping store; every client it hands
//! out reads from that store and counts the lookups it serves.

use async_trait::async_trait;
use serde_json::{json, Value};
use snorkle_core::{ChainClient, ChainConnector, ChainEndpoint, RpcError, SnorkleResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ChainState {
    programs: HashMap<String, String>,
    mappings: HashMap<(String, String, String), Value>,
    transactions: HashMap<String, Value>,
    program_lookups: HashMap<String, usize>,
    connections: Vec<ChainEndpoint>,
}

type SharedState = Arc<Mutex<ChainState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ChainState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: SharedState,
    height: Arc<AtomicU64>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `source` under `program_id`
    pub fn with_program(self, program_id: &str, source: &str) -> Self {
        self.add_program(program_id, source);
        self
    }

    pub fn add_program(&self, program_id: &str, source: &str) {
        lock(&self.state)
            .programs
            .insert(program_id.to_string(), source.to_string());
    }

    pub fn set_mapping(&self, program_id: &str, mapping: &str, key: &str, value: Value) {
        lock(&self.state).mappings.insert(
            (program_id.to_string(), mapping.to_string(), key.to_string()),
            value,
        );
    }

    pub fn add_transaction(&self, transaction_id: &str, body: Value) {
        lock(&self.state)
            .transactions
            .insert(transaction_id.to_string(), body);
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// How many times `program_id` was looked up
    pub fn program_lookups(&self, program_id: &str) -> usize {
        lock(&self.state)
            .program_lookups
            .get(program_id)
            .copied()
            .unwrap_or(0)
    }

    /// Every endpoint a client was requested for, in order
    pub fn connections(&self) -> Vec<ChainEndpoint> {
        lock(&self.state).connections.clone()
    }
}

impl ChainConnector for MockConnector {
    fn connect(&self, endpoint: &ChainEndpoint) -> SnorkleResult<Arc<dyn ChainClient>> {
        lock(&self.state).connections.push(endpoint.clone());
        Ok(Arc::new(MockChainClient {
            endpoint: endpoint.clone(),
            state: Arc::clone(&self.state),
            height: Arc::clone(&self.height),
        }))
    }
}

pub struct MockChainClient {
    endpoint: ChainEndpoint,
    state: SharedState,
    height: Arc<AtomicU64>,
}

impl MockChainClient {
    fn not_found(&self, path: &str) -> RpcError {
        RpcError::Http {
            url: format!("{}/{}", self.endpoint.network_url(), path),
            status: 404,
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn endpoint(&self) -> &ChainEndpoint {
        &self.endpoint
    }

    async fn latest_block(&self) -> SnorkleResult<Value> {
        self.block_by_height(self.height.load(Ordering::SeqCst)).await
    }

    async fn latest_height(&self) -> SnorkleResult<u64> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn block_by_height(&self, height: u64) -> SnorkleResult<Value> {
        if height > self.height.load(Ordering::SeqCst) {
            return Err(self.not_found(&format!("block/{}", height)).into());
        }
        Ok(json!({ "header": { "metadata": { "height": height } } }))
    }

    async fn block_by_hash(&self, hash: &str) -> SnorkleResult<Value> {
        Err(self.not_found(&format!("block/{}", hash)).into())
    }

    async fn program(&self, program_id: &str) -> SnorkleResult<String> {
        let mut state = lock(&self.state);
        *state
            .program_lookups
            .entry(program_id.to_string())
            .or_insert(0) += 1;
        match state.programs.get(program_id) {
            Some(source) => Ok(source.clone()),
            None => Err(self.not_found(&format!("program/{}", program_id)).into()),
        }
    }

    async fn mapping_names(&self, program_id: &str) -> SnorkleResult<Vec<String>> {
        let state = lock(&self.state);
        if !state.programs.contains_key(program_id) {
            return Err(self.not_found(&format!("program/{}/mappings", program_id)).into());
        }
        let mut names: Vec<String> = state
            .mappings
            .keys()
            .filter(|(program, _, _)| program == program_id)
            .map(|(_, mapping, _)| mapping.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn mapping_value(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> SnorkleResult<Option<Value>> {
        let state = lock(&self.state);
        Ok(state
            .mappings
            .get(&(program_id.to_string(), mapping.to_string(), key.to_string()))
            .cloned())
    }

    async fn transaction(&self, transaction_id: &str) -> SnorkleResult<Value> {
        let state = lock(&self.state);
        match state.transactions.get(transaction_id) {
            Some(body) => Ok(body.clone()),
            None => Err(self.not_found(&format!("transaction/{}", transaction_id)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snorkle_core::{Network, SnorkleError};

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let connector = MockConnector::new();
        let client = connector.connect(&ChainEndpoint::default()).unwrap();

        match client.program("missing.aleo").await {
            Err(SnorkleError::Rpc(err)) => assert!(err.is_not_found()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(connector.program_lookups("missing.aleo"), 1);
    }

    #[tokio::test]
    async fn test_clients_share_state() {
        let connector = MockConnector::new();
        let first = connector.connect(&ChainEndpoint::devnet(Network::Testnet)).unwrap();
        connector.add_program("a.aleo", "program a.aleo;");

        assert_eq!(first.program("a.aleo").await.unwrap(), "program a.aleo;");
        assert_eq!(connector.connections().len(), 1);
    }

    #[tokio::test]
    async fn test_mappings() {
        let connector = MockConnector::new().with_program("token.aleo", "program token.aleo;");
        connector.set_mapping("token.aleo", "balances", "aleo1x", json!("10u64"));
        let client = connector.connect(&ChainEndpoint::default()).unwrap();

        assert_eq!(client.mapping_names("token.aleo").await.unwrap(), vec!["balances"]);
        assert_eq!(
            client.mapping_value("token.aleo", "balances", "aleo1x").await.unwrap(),
            Some(json!("10u64"))
        );
        assert_eq!(
            client.mapping_value("token.aleo", "balances", "aleo1y").await.unwrap(),
            None
        );
    }
}
