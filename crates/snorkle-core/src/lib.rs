//! Snorkle Core
//!
//! Foundational types shared by every Snorkle crate:
//! - `operation`: the closed set of bridge operations, their typed payloads and results
//! - `wire`: the JSON message protocol spoken between the client bridge and the executor
//! - `sdk` / `chain`: the opaque collaborator boundaries (Aleo SDK, chain REST API)
//! - `config`: runtime configuration with presets and validation
//! - `errors`: the unified error type
//!
//! Nothing in this crate performs cryptography or network I/O; it only describes
//! the shapes that flow across the bridge.

pub mod chain;
pub mod channel;
pub mod config;
pub mod errors;
pub mod operation;
pub mod sdk;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use chain::{ChainClient, ChainConnector, ChainEndpoint, DEFAULT_ENDPOINT_URL, DEVNET_ENDPOINT_URL};
pub use channel::{create_request_channel, create_response_channel, Frame, FrameReceiver, FrameSender};
pub use config::{BridgeConfig, ChannelConfig, ExecutorConfig, NetworkConfig, SnorkleConfig};
pub use errors::{ErrorClass, RpcError, SnorkleError, SnorkleResult};
pub use operation::{
    credits_from_microcredits, DeployParams, DeploymentFeeParams, ExecuteLocalParams,
    ExecuteOnChainParams, ExecutionFeeParams, FeeOptions, JoinParams, LocalExecution,
    OperationKind, OperationOutput, OperationRequest, OperationResult, SplitParams,
    TransferParams, FEE_DISPLAY_SURCHARGE_CREDITS, MICROCREDITS_PER_CREDIT,
};
pub use sdk::{AccountKeys, AleoSdk, FunctionCall, Imports, KeyPair, LocalRun, ProgramInfo};
pub use types::{CorrelationId, KeyMaterial, Network, TransferType};
pub use wire::{ExecutorMessage, FrameError, ToExecutor};
