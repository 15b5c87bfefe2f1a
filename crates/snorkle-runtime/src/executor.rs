//! Background Executor
//!
//! A single tokio task that owns the operation registry and the executor
//! context. It initializes the SDK, buffers requests that arrive before the SDK
//! is ready, then serves request frames by running handlers concurrently and
//! posting exactly one terminal frame per request.
//!
//! ```text
//! Uninitialized → Initializing → Ready ⇄ Busy
//!                      ↓                  ↓
//!                    Failed            Stopped
//! ```

use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use snorkle_core::{
    CorrelationId, ExecutorConfig, ExecutorMessage, FrameReceiver, FrameSender, OperationKind,
    OperationRequest, OperationResult, SnorkleError, SnorkleResult, ToExecutor,
};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::context::ExecutorContext;
use crate::registry::OperationRegistry;

const CANCELLED_BY_CALLER: &str = "cancelled by caller";

// ----------------------------------------------------------------------------
// Executor State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Uninitialized,
    Initializing,
    /// Serving requests, none in flight
    Ready,
    /// Serving requests, `in_flight` handlers running
    Busy { in_flight: usize },
    /// SDK initialization failed
    Failed { reason: String },
    Stopped,
}

impl ExecutorState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ExecutorState::Ready | ExecutorState::Busy { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Failed { .. } | ExecutorState::Stopped)
    }
}

type Completion = (CorrelationId, OperationKind, OperationResult, Duration);

// ----------------------------------------------------------------------------
// Executor Task
// ----------------------------------------------------------------------------

pub struct ExecutorTask {
    registry: Arc<OperationRegistry>,
    context: Arc<ExecutorContext>,
    config: ExecutorConfig,
    request_receiver: FrameReceiver,
    response_sender: FrameSender,
    state_sender: watch::Sender<ExecutorState>,
    /// Decoded requests waiting for a free handler slot, in arrival order
    queued: VecDeque<(CorrelationId, OperationRequest)>,
    aborts: HashMap<CorrelationId, AbortHandle>,
}

impl ExecutorTask {
    pub fn new(
        registry: OperationRegistry,
        context: ExecutorContext,
        config: ExecutorConfig,
        request_receiver: FrameReceiver,
        response_sender: FrameSender,
    ) -> (Self, watch::Receiver<ExecutorState>) {
        let (state_sender, state_receiver) = watch::channel(ExecutorState::Uninitialized);
        let task = Self {
            registry: Arc::new(registry),
            context: Arc::new(context),
            config,
            request_receiver,
            response_sender,
            state_sender,
            queued: VecDeque::new(),
            aborts: HashMap::new(),
        };
        (task, state_receiver)
    }

    pub fn context(&self) -> Arc<ExecutorContext> {
        Arc::clone(&self.context)
    }

    /// Run the executor until the bridge drops its request sender
    pub async fn run(mut self) -> SnorkleResult<()> {
        info!("Executor task starting");
        self.set_state(ExecutorState::Initializing);

        if !self.initialize().await? {
            self.set_state(ExecutorState::Stopped);
            return Ok(());
        }

        self.post(ExecutorMessage::Ready).await?;
        self.set_state(ExecutorState::Ready);
        info!("Executor ready; replaying {} buffered request(s)", self.queued.len());

        let mut in_flight: FuturesUnordered<BoxFuture<'static, Completion>> = FuturesUnordered::new();

        loop {
            self.start_queued(&mut in_flight).await?;
            self.update_load(in_flight.len());

            tokio::select! {
                Some((id, kind, result, elapsed)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.aborts.remove(&id);
                    info!("{} {} finished in {} ms", kind, id, elapsed.as_millis());
                    self.post(ExecutorMessage::Result { correlation_id: id, result }).await?;
                }
                frame = self.request_receiver.recv() => match frame {
                    Some(frame) => self.accept(&frame, in_flight.len()).await?,
                    None => {
                        debug!("Request channel closed, abandoning {} in-flight operation(s)", in_flight.len());
                        for handle in self.aborts.values() {
                            handle.abort();
                        }
                        break;
                    }
                },
            }
        }

        self.set_state(ExecutorState::Stopped);
        info!("Executor task stopped");
        Ok(())
    }

    // ---- Startup ----

    /// Initialize the SDK while buffering inbound requests
    ///
    /// Returns `Ok(false)` when the bridge went away before initialization finished.
    async fn initialize(&mut self) -> SnorkleResult<bool> {
        let context = Arc::clone(&self.context);
        let init = context.sdk().initialize();
        tokio::pin!(init);

        let outcome = loop {
            tokio::select! {
                outcome = &mut init => break outcome,
                frame = self.request_receiver.recv() => match frame {
                    Some(frame) => self.buffer_pre_ready(&frame).await?,
                    None => return Ok(false),
                },
            }
        };

        match outcome {
            Ok(()) => Ok(true),
            Err(e) => {
                let reason = e.to_string();
                error!("SDK initialization failed: {}", reason);
                self.set_state(ExecutorState::Failed { reason: reason.clone() });
                let _ = self.post(ExecutorMessage::Failed { reason: reason.clone() }).await;
                Err(SnorkleError::transport(format!("SDK initialization failed: {}", reason)))
            }
        }
    }

    async fn buffer_pre_ready(&mut self, frame: &str) -> SnorkleResult<()> {
        match ToExecutor::decode(frame) {
            Ok(ToExecutor::Operation { correlation_id, request }) => {
                if self.queued.len() >= self.config.pre_ready_buffer {
                    warn!("Pre-ready buffer full, rejecting {}", correlation_id);
                    let error = SnorkleError::Overloaded {
                        reason: format!(
                            "{} requests already waiting for the SDK to initialize",
                            self.queued.len()
                        ),
                    };
                    return self.post_result(correlation_id, OperationResult::from_error(&error)).await;
                }
                debug!("Buffering {} until the SDK is ready", correlation_id);
                self.queued.push_back((correlation_id, request));
                Ok(())
            }
            Ok(ToExecutor::Cancel { correlation_id }) => self.cancel(correlation_id).await,
            Err(e) => self.reject_frame(e).await,
        }
    }

    // ---- Request Handling ----

    /// Queue a request behind the ones already waiting
    ///
    /// Frames are still read while every handler slot is busy so cancels
    /// keep arriving. Once `max_queued` requests are waiting, new ones are
    /// rejected as overloaded.
    async fn accept(&mut self, frame: &str, in_flight: usize) -> SnorkleResult<()> {
        match ToExecutor::decode(frame) {
            Ok(ToExecutor::Operation { correlation_id, request }) => {
                let saturated = in_flight >= self.config.max_in_flight;
                if saturated && self.queued.len() >= self.config.max_queued {
                    warn!("Request queue full, rejecting {}", correlation_id);
                    let error = SnorkleError::Overloaded {
                        reason: format!(
                            "{} requests already waiting for a free handler",
                            self.queued.len()
                        ),
                    };
                    return self.post_result(correlation_id, OperationResult::from_error(&error)).await;
                }
                debug!("Received {} {}", request.kind(), correlation_id);
                self.queued.push_back((correlation_id, request));
                Ok(())
            }
            Ok(ToExecutor::Cancel { correlation_id }) => self.cancel(correlation_id).await,
            Err(e) => self.reject_frame(e).await,
        }
    }

    async fn reject_frame(&self, error: snorkle_core::FrameError) -> SnorkleResult<()> {
        match error.correlation_id() {
            Some(id) => {
                warn!("Rejecting frame {}: {}", id, error);
                self.post_result(id, error.to_result()).await
            }
            None => {
                warn!("Dropping undecodable frame: {}", error);
                Ok(())
            }
        }
    }

    async fn cancel(&mut self, id: CorrelationId) -> SnorkleResult<()> {
        if let Some(handle) = self.aborts.get(&id) {
            debug!("Aborting in-flight {}", id);
            handle.abort();
            return Ok(());
        }

        let before = self.queued.len();
        self.queued.retain(|(queued_id, _)| *queued_id != id);
        if self.queued.len() < before {
            debug!("Dropping queued {}", id);
            return self
                .post_result(id, OperationResult::Aborted { reason: CANCELLED_BY_CALLER.into() })
                .await;
        }

        debug!("Cancel for {} arrived after it finished", id);
        Ok(())
    }

    async fn start_queued(
        &mut self,
        in_flight: &mut FuturesUnordered<BoxFuture<'static, Completion>>,
    ) -> SnorkleResult<()> {
        while in_flight.len() < self.config.max_in_flight {
            let Some((id, request)) = self.queued.pop_front() else {
                break;
            };

            let kind = request.kind();
            let handler = match self.registry.lookup(kind) {
                Ok(handler) => handler,
                Err(e) => {
                    warn!("No handler for {} {}", kind, id);
                    self.post_result(id, OperationResult::from_error(&e)).await?;
                    continue;
                }
            };

            let (abort_handle, registration) = AbortHandle::new_pair();
            self.aborts.insert(id, abort_handle);

            let context = Arc::clone(&self.context);
            let operation = async move {
                let started = Instant::now();
                let work = AssertUnwindSafe(handler.handle(&context, request)).catch_unwind();
                let result = match Abortable::new(work, registration).await {
                    Ok(Ok(outcome)) => {
                        if let Err(e) = &outcome {
                            warn!("{} {} failed: {}", kind, id, e);
                        }
                        OperationResult::from(outcome)
                    }
                    Ok(Err(_panic)) => {
                        error!("{} handler panicked while serving {}", kind, id);
                        OperationResult::from_error(&SnorkleError::operation(format!(
                            "{} handler panicked",
                            kind
                        )))
                    }
                    Err(_aborted) => OperationResult::Aborted {
                        reason: CANCELLED_BY_CALLER.into(),
                    },
                };
                (id, kind, result, started.elapsed())
            };
            in_flight.push(operation.boxed());
        }
        Ok(())
    }

    // ---- Output ----

    async fn post_result(&self, id: CorrelationId, result: OperationResult) -> SnorkleResult<()> {
        self.post(ExecutorMessage::Result { correlation_id: id, result }).await
    }

    async fn post(&self, message: ExecutorMessage) -> SnorkleResult<()> {
        let frame = message.encode()?;
        self.response_sender
            .send(frame)
            .await
            .map_err(|_| SnorkleError::transport("Bridge stopped listening for responses"))
    }

    fn update_load(&self, in_flight: usize) {
        let state = if in_flight == 0 {
            ExecutorState::Ready
        } else {
            ExecutorState::Busy { in_flight }
        };
        self.state_sender.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    fn set_state(&self, state: ExecutorState) {
        debug!("Executor state → {:?}", state);
        self.state_sender.send_replace(state);
    }
}
