//! Snorkle Runtime
//!
//! Runs Aleo operations off the caller's task:
//! - `ExecutorTask`: background task that initializes the SDK and serves operation frames
//! - `ClientBridge`: foreground async API with per-call correlation, timeouts and cancellation
//! - `OperationRegistry` and the eight operation handlers
//! - `ExecutorContext` with the single-slot program key cache
//! - `HttpConnector` / `SidecarSdk`: concrete chain RPC and SDK collaborators
//!
//! ```rust,no_run
//! use snorkle_core::SnorkleConfig;
//! use snorkle_runtime::{BridgeBuilder, HttpConnector, SidecarSdk};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SnorkleConfig::default();
//! let sdk = Arc::new(SidecarSdk::spawn("snorkle-sdk-host", &[])?);
//! let connector = Arc::new(HttpConnector::new(config.network.request_timeout)?);
//!
//! let handle = BridgeBuilder::new(sdk, connector)
//!     .with_config(config)
//!     .build_and_start()
//!     .await?;
//! handle.wait_ready().await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod builder;
pub mod context;
pub mod executor;
pub mod handlers;
pub mod http;
pub mod registry;
pub mod sidecar;

pub use bridge::{ClientBridge, Correlator, PendingCall, Readiness};
pub use builder::{start_bridge, BridgeBuilder, BridgeHandle};
pub use context::{ExecutorContext, ProgramCache};
pub use executor::{ExecutorState, ExecutorTask};
pub use http::{HttpChainClient, HttpConnector};
pub use registry::{OperationHandler, OperationRegistry};
pub use sidecar::SidecarSdk;

// Re-export core types for convenience
pub use snorkle_core::{
    OperationKind, OperationOutput, OperationRequest, OperationResult, SnorkleConfig,
    SnorkleError, SnorkleResult,
};
