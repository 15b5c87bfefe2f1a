//! Result Correlator
//!
//! Maps each outstanding correlation id to the one-shot sender its caller is
//! waiting on. An entry is removed exactly once: when its result arrives, when
//! the caller gives up, or when the executor goes away.

use dashmap::DashMap;
use snorkle_core::{CorrelationId, OperationOutput, OperationResult, SnorkleError, SnorkleResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub type CallSender = oneshot::Sender<SnorkleResult<OperationOutput>>;
pub type CallReceiver = oneshot::Receiver<SnorkleResult<OperationOutput>>;

#[derive(Debug, Default)]
pub struct Correlator {
    next_id: AtomicU64,
    pending: DashMap<CorrelationId, CallSender>,
    closed: RwLock<Option<String>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and park a sender under it
    ///
    /// Fails once the correlator has been closed by `fail_all`.
    pub fn register(&self) -> SnorkleResult<(CorrelationId, CallReceiver)> {
        if let Some(reason) = self.closed_reason() {
            return Err(SnorkleError::transport(reason));
        }

        let id = CorrelationId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (sender, receiver) = oneshot::channel();
        self.pending.insert(id, sender);

        // fail_all may have drained between the check and the insert
        if let Some(reason) = self.closed_reason() {
            self.pending.remove(&id);
            return Err(SnorkleError::transport(reason));
        }

        Ok((id, receiver))
    }

    /// Deliver a terminal result; false when no caller is waiting under `id`
    pub fn settle(&self, id: CorrelationId, result: OperationResult) -> bool {
        match self.pending.remove(&id) {
            Some((_, sender)) => {
                if sender.send(result.into_output()).is_err() {
                    debug!("Caller for {} stopped waiting before its result arrived", id);
                }
                true
            }
            None => {
                warn!("Dropping result for unknown correlation id {}", id);
                false
            }
        }
    }

    /// Forget a call without settling it
    pub fn abandon(&self, id: CorrelationId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Reject every pending call with a transport error and refuse new ones
    pub fn fail_all(&self, reason: &str) -> usize {
        {
            let mut closed = self.closed.write().unwrap_or_else(|e| e.into_inner());
            if closed.is_none() {
                *closed = Some(reason.to_string());
            }
        }

        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, sender)) = self.pending.remove(&id) {
                let _ = sender.send(Err(SnorkleError::transport(reason)));
                failed += 1;
            }
        }
        failed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed_reason().is_some()
    }

    fn closed_reason(&self) -> Option<String> {
        self.closed.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
