//! Bridge Builder API
//!
//! Wires an SDK and a chain connector into a running executor task plus a
//! client bridge, and hands back a handle that owns both tasks.

use snorkle_core::{
    create_request_channel, create_response_channel, AleoSdk, ChainConnector, SnorkleConfig,
    SnorkleError, SnorkleResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bridge::ClientBridge;
use crate::context::ExecutorContext;
use crate::executor::{ExecutorState, ExecutorTask};
use crate::registry::OperationRegistry;

// ----------------------------------------------------------------------------
// Bridge Builder
// ----------------------------------------------------------------------------

pub struct BridgeBuilder {
    sdk: Arc<dyn AleoSdk>,
    connector: Arc<dyn ChainConnector>,
    config: SnorkleConfig,
    registry: OperationRegistry,
}

impl BridgeBuilder {
    pub fn new(sdk: Arc<dyn AleoSdk>, connector: Arc<dyn ChainConnector>) -> Self {
        Self {
            sdk,
            connector,
            config: SnorkleConfig::default(),
            registry: OperationRegistry::with_default_handlers(),
        }
    }

    pub fn with_config(mut self, config: SnorkleConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default registry
    pub fn with_registry(mut self, registry: OperationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Spawn the executor and the response pump
    pub async fn build_and_start(self) -> SnorkleResult<BridgeHandle> {
        self.config
            .validate()
            .map_err(|reason| SnorkleError::Configuration { reason })?;

        info!(
            "Starting Snorkle bridge against {}",
            self.config.network.endpoint.network_url()
        );

        let (request_sender, request_receiver) = create_request_channel(&self.config.channels);
        let (response_sender, response_receiver) = create_response_channel(&self.config.channels);

        let context = ExecutorContext::new(
            self.sdk,
            self.connector,
            self.config.network.endpoint.clone(),
        );
        let (executor, state) = ExecutorTask::new(
            self.registry,
            context,
            self.config.executor.clone(),
            request_receiver,
            response_sender,
        );

        let executor_handle = tokio::spawn(executor.run());
        let (bridge, pump_handle) =
            ClientBridge::spawn(request_sender, response_receiver, self.config.bridge.clone());

        Ok(BridgeHandle {
            bridge,
            state,
            executor_handle: Some(executor_handle),
            pump_handle: Some(pump_handle),
        })
    }
}

// ----------------------------------------------------------------------------
// Bridge Handle
// ----------------------------------------------------------------------------

/// Owner of a running executor and its bridge
pub struct BridgeHandle {
    bridge: ClientBridge,
    state: watch::Receiver<ExecutorState>,
    executor_handle: Option<JoinHandle<SnorkleResult<()>>>,
    pump_handle: Option<JoinHandle<()>>,
}

impl BridgeHandle {
    pub fn bridge(&self) -> ClientBridge {
        self.bridge.clone()
    }

    pub fn executor_state(&self) -> ExecutorState {
        self.state.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ExecutorState> {
        self.state.clone()
    }

    pub async fn wait_ready(&self) -> SnorkleResult<()> {
        self.bridge.wait_ready().await
    }

    pub fn is_running(&self) -> bool {
        self.executor_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the executor; every outstanding call fails with a transport error
    pub async fn shutdown(&mut self) -> SnorkleResult<()> {
        info!("Shutting down Snorkle bridge");

        if let Some(handle) = self.executor_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.pump_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        }

        info!("Snorkle bridge shut down");
        Ok(())
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.executor_handle.take() {
            handle.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Convenience Functions
// ----------------------------------------------------------------------------

/// Start a bridge with the default registry and the given configuration
pub async fn start_bridge(
    sdk: Arc<dyn AleoSdk>,
    connector: Arc<dyn ChainConnector>,
    config: SnorkleConfig,
) -> SnorkleResult<BridgeHandle> {
    BridgeBuilder::new(sdk, connector)
        .with_config(config)
        .build_and_start()
        .await
}
