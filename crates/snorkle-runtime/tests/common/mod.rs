//! Shared wiring for the bridge integration tests

#![allow(dead_code)]

use snorkle_core::{AleoSdk, SnorkleConfig, SnorkleResult};
use snorkle_harness::{MockConnector, MockSdk};
use snorkle_runtime::{BridgeBuilder, BridgeHandle, ClientBridge, OperationRegistry};
use std::sync::Arc;

pub struct TestHarness {
    pub sdk: Arc<MockSdk>,
    pub chain: MockConnector,
    pub handle: BridgeHandle,
}

impl TestHarness {
    /// Start a bridge with the testing configuration without waiting for readiness
    pub async fn start(sdk: MockSdk, chain: MockConnector) -> Self {
        Self::start_with(sdk, chain, SnorkleConfig::testing(), OperationRegistry::with_default_handlers())
            .await
            .expect("testing configuration should be valid")
    }

    /// Start and wait for the executor to report ready
    pub async fn ready(sdk: MockSdk, chain: MockConnector) -> Self {
        let harness = Self::start(sdk, chain).await;
        harness
            .handle
            .wait_ready()
            .await
            .expect("mock SDK should initialize");
        harness
    }

    pub async fn start_with(
        sdk: MockSdk,
        chain: MockConnector,
        config: SnorkleConfig,
        registry: OperationRegistry,
    ) -> SnorkleResult<Self> {
        let sdk = Arc::new(sdk);
        let handle = BridgeBuilder::new(
            Arc::clone(&sdk) as Arc<dyn AleoSdk>,
            Arc::new(chain.clone()),
        )
        .with_config(config)
        .with_registry(registry)
        .build_and_start()
        .await?;

        Ok(Self { sdk, chain, handle })
    }

    pub fn bridge(&self) -> ClientBridge {
        self.handle.bridge()
    }
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("snorkle_runtime=debug")
        .with_test_writer()
        .try_init();
}
