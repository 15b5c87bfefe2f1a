//! Client Bridge
//!
//! Foreground handle to the executor. Each call gets a fresh correlation id,
//! is encoded to a frame and sent to the executor; a response pump decodes the
//! executor's frames and settles the matching pending call through the
//! correlator.

pub mod correlator;

use snorkle_core::{
    BridgeConfig, CorrelationId, DeployParams, DeploymentFeeParams, ExecuteLocalParams,
    ExecuteOnChainParams, ExecutionFeeParams, ExecutorMessage, FrameReceiver, FrameSender,
    JoinParams, LocalExecution, OperationKind, OperationOutput, OperationRequest, SnorkleError,
    SnorkleResult, SplitParams, ToExecutor, TransferParams,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use correlator::{CallReceiver, Correlator};

// ----------------------------------------------------------------------------
// Readiness
// ----------------------------------------------------------------------------

/// Executor readiness as seen from the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
    Closed,
}

// ----------------------------------------------------------------------------
// Client Bridge
// ----------------------------------------------------------------------------

struct BridgeInner {
    request_sender: FrameSender,
    correlator: Arc<Correlator>,
    readiness: watch::Receiver<Readiness>,
    config: BridgeConfig,
}

/// Cheap-to-clone handle for submitting operations
#[derive(Clone)]
pub struct ClientBridge {
    inner: Arc<BridgeInner>,
}

impl ClientBridge {
    /// Create a bridge over the given frame channels and spawn its response pump
    pub fn spawn(
        request_sender: FrameSender,
        response_receiver: FrameReceiver,
        config: BridgeConfig,
    ) -> (Self, JoinHandle<()>) {
        let correlator = Arc::new(Correlator::new());
        let (readiness_sender, readiness) = watch::channel(Readiness::Pending);

        let pump = tokio::spawn(pump_responses(
            response_receiver,
            Arc::clone(&correlator),
            readiness_sender,
        ));

        let bridge = Self {
            inner: Arc::new(BridgeInner {
                request_sender,
                correlator,
                readiness,
                config,
            }),
        };
        (bridge, pump)
    }

    pub fn readiness(&self) -> Readiness {
        self.inner.readiness.borrow().clone()
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Wait until the executor reports ready, bounded by the configured ready timeout
    pub async fn wait_ready(&self) -> SnorkleResult<()> {
        let limit = self.inner.config.ready_timeout;
        let mut readiness = self.inner.readiness.clone();

        let outcome = tokio::time::timeout(limit, async {
            loop {
                match readiness.borrow_and_update().clone() {
                    Readiness::Ready => return Ok(()),
                    Readiness::Failed(reason) => {
                        return Err(SnorkleError::transport(format!(
                            "SDK initialization failed: {}",
                            reason
                        )))
                    }
                    Readiness::Closed => return Err(SnorkleError::transport("Executor stopped")),
                    Readiness::Pending => {}
                }
                if readiness.changed().await.is_err() {
                    return Err(SnorkleError::transport("Executor stopped"));
                }
            }
        })
        .await;

        outcome.unwrap_or(Err(SnorkleError::Timeout {
            duration_ms: limit.as_millis() as u64,
        }))
    }

    /// Send a request without waiting for its result
    pub async fn submit(&self, request: OperationRequest) -> SnorkleResult<PendingCall> {
        let (id, receiver) = self.inner.correlator.register()?;
        let kind = request.kind();

        let frame = match (ToExecutor::Operation { correlation_id: id, request }).encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.inner.correlator.abandon(id);
                return Err(e);
            }
        };

        if self.inner.request_sender.send(frame).await.is_err() {
            self.inner.correlator.abandon(id);
            return Err(SnorkleError::transport("Executor is not accepting requests"));
        }

        debug!("Submitted {} {}", kind, id);
        Ok(PendingCall {
            id,
            kind,
            receiver,
            bridge: self.clone(),
        })
    }

    /// Submit a request and wait for its result, applying the default timeout
    pub async fn call(&self, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        let pending = self.submit(request).await?;
        match self.inner.config.default_timeout {
            Some(limit) => pending.wait_timeout(limit).await,
            None => pending.wait().await,
        }
    }

    /// Submit a request and wait at most `limit` for its result
    pub async fn call_with_timeout(
        &self,
        request: OperationRequest,
        limit: Duration,
    ) -> SnorkleResult<OperationOutput> {
        self.submit(request).await?.wait_timeout(limit).await
    }

    async fn send_cancel(&self, id: CorrelationId) -> SnorkleResult<()> {
        let frame = ToExecutor::Cancel { correlation_id: id }.encode()?;
        self.inner
            .request_sender
            .send(frame)
            .await
            .map_err(|_| SnorkleError::transport("Executor is not accepting requests"))
    }

    // ---- Typed Operations ----

    /// Deploy a program; returns the transaction id
    pub async fn deploy(&self, params: DeployParams) -> SnorkleResult<String> {
        expect_transaction(self.call(OperationRequest::Deploy(params)).await?, OperationKind::Deploy)
    }

    pub async fn execute_local(&self, params: ExecuteLocalParams) -> SnorkleResult<LocalExecution> {
        match self.call(OperationRequest::ExecuteLocal(params)).await? {
            OperationOutput::ExecuteLocal { outputs } => Ok(outputs),
            other => Err(unexpected(OperationKind::ExecuteLocal, &other)),
        }
    }

    /// Execute a deployed program's function; returns the transaction id
    pub async fn execute_on_chain(&self, params: ExecuteOnChainParams) -> SnorkleResult<String> {
        expect_transaction(
            self.call(OperationRequest::ExecuteOnChain(params)).await?,
            OperationKind::ExecuteOnChain,
        )
    }

    /// Execution fee estimate in credits
    pub async fn estimate_execution_fee(&self, params: ExecutionFeeParams) -> SnorkleResult<f64> {
        expect_fee(
            self.call(OperationRequest::EstimateExecutionFee(params)).await?,
            OperationKind::EstimateExecutionFee,
        )
    }

    /// Deployment fee estimate in credits
    pub async fn estimate_deployment_fee(&self, params: DeploymentFeeParams) -> SnorkleResult<f64> {
        expect_fee(
            self.call(OperationRequest::EstimateDeploymentFee(params)).await?,
            OperationKind::EstimateDeploymentFee,
        )
    }

    pub async fn transfer(&self, params: TransferParams) -> SnorkleResult<String> {
        expect_transaction(self.call(OperationRequest::Transfer(params)).await?, OperationKind::Transfer)
    }

    pub async fn split(&self, params: SplitParams) -> SnorkleResult<String> {
        expect_transaction(self.call(OperationRequest::Split(params)).await?, OperationKind::Split)
    }

    pub async fn join(&self, params: JoinParams) -> SnorkleResult<String> {
        expect_transaction(self.call(OperationRequest::Join(params)).await?, OperationKind::Join)
    }
}

fn unexpected(expected: OperationKind, output: &OperationOutput) -> SnorkleError {
    SnorkleError::protocol(format!(
        "expected a {} result, got {}",
        expected.completion_tag(),
        output.kind().completion_tag()
    ))
}

fn expect_transaction(output: OperationOutput, expected: OperationKind) -> SnorkleResult<String> {
    if output.kind() != expected {
        return Err(unexpected(expected, &output));
    }
    output
        .transaction_id()
        .map(str::to_string)
        .ok_or_else(|| unexpected(expected, &output))
}

fn expect_fee(output: OperationOutput, expected: OperationKind) -> SnorkleResult<f64> {
    if output.kind() != expected {
        return Err(unexpected(expected, &output));
    }
    output.fee_credits().ok_or_else(|| unexpected(expected, &output))
}

// ----------------------------------------------------------------------------
// Pending Call
// ----------------------------------------------------------------------------

/// A submitted request whose result has not been consumed yet
pub struct PendingCall {
    id: CorrelationId,
    kind: OperationKind,
    receiver: CallReceiver,
    bridge: ClientBridge,
}

impl core::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PendingCall {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Wait for the result with no time limit
    pub async fn wait(self) -> SnorkleResult<OperationOutput> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(SnorkleError::transport("Result channel dropped")))
    }

    /// Wait at most `limit`; on expiry the call is abandoned and the executor told to abort it
    pub async fn wait_timeout(mut self, limit: Duration) -> SnorkleResult<OperationOutput> {
        match tokio::time::timeout(limit, &mut self.receiver).await {
            Ok(delivered) => {
                delivered.unwrap_or_else(|_| Err(SnorkleError::transport("Result channel dropped")))
            }
            Err(_) => {
                warn!("{} {} timed out after {:?}", self.kind, self.id, limit);
                self.bridge.inner.correlator.abandon(self.id);
                if let Err(e) = self.bridge.send_cancel(self.id).await {
                    debug!("Could not send cancel for {}: {}", self.id, e);
                }
                Err(SnorkleError::Timeout {
                    duration_ms: limit.as_millis() as u64,
                })
            }
        }
    }

    /// Ask the executor to abort this call; `wait` then yields `Aborted`
    pub async fn cancel(&self) -> SnorkleResult<()> {
        self.bridge.send_cancel(self.id).await
    }
}

// ----------------------------------------------------------------------------
// Response Pump
// ----------------------------------------------------------------------------

async fn pump_responses(
    mut response_receiver: FrameReceiver,
    correlator: Arc<Correlator>,
    readiness: watch::Sender<Readiness>,
) {
    while let Some(frame) = response_receiver.recv().await {
        match ExecutorMessage::decode(&frame) {
            Ok(ExecutorMessage::Ready) => {
                info!("Executor ready");
                readiness.send_replace(Readiness::Ready);
            }
            Ok(ExecutorMessage::Failed { reason }) => {
                error!("Executor failed to start: {}", reason);
                readiness.send_replace(Readiness::Failed(reason.clone()));
                let failed = correlator.fail_all(&format!("SDK initialization failed: {}", reason));
                debug!("Rejected {} pending call(s)", failed);
            }
            Ok(ExecutorMessage::Result { correlation_id, result }) => {
                debug!("Settling {}", correlation_id);
                correlator.settle(correlation_id, result);
            }
            Err(e) => match e.correlation_id() {
                Some(id) => {
                    warn!("Undecodable result for {}: {}", id, e);
                    correlator.settle(id, e.to_result());
                }
                None => warn!("Dropping undecodable response frame: {}", e),
            },
        }
    }

    readiness.send_if_modified(|state| {
        if matches!(state, Readiness::Failed(_)) {
            false
        } else {
            *state = Readiness::Closed;
            true
        }
    });
    let failed = correlator.fail_all("Executor stopped");
    if failed > 0 {
        error!("Executor stopped with {} call(s) outstanding", failed);
    }
}
