//! Operation Registry
//!
//! Static mapping from `OperationKind` to the handler that serves it. The
//! executor consults it once per request; a kind with no entry is answered with
//! an `UnknownOperation` error and no handler runs.

use async_trait::async_trait;
use snorkle_core::{
    OperationKind, OperationOutput, OperationRequest, SnorkleError, SnorkleResult,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::ExecutorContext;
use crate::handlers::{
    DeployHandler, DeploymentFeeHandler, ExecuteLocalHandler, ExecuteOnChainHandler,
    ExecutionFeeHandler, JoinHandler, SplitHandler, TransferHandler,
};

/// Serves one operation kind
#[async_trait]
pub trait OperationHandler: Send + Sync {
    fn kind(&self) -> OperationKind;

    async fn handle(
        &self,
        ctx: &ExecutorContext,
        request: OperationRequest,
    ) -> SnorkleResult<OperationOutput>;
}

#[derive(Clone, Default)]
pub struct OperationRegistry {
    handlers: HashMap<OperationKind, Arc<dyn OperationHandler>>,
}

impl OperationRegistry {
    /// Empty registry; every lookup fails until handlers are registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving all eight operations
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DeployHandler));
        registry.register(Arc::new(ExecuteLocalHandler));
        registry.register(Arc::new(ExecuteOnChainHandler));
        registry.register(Arc::new(ExecutionFeeHandler));
        registry.register(Arc::new(DeploymentFeeHandler));
        registry.register(Arc::new(TransferHandler));
        registry.register(Arc::new(SplitHandler));
        registry.register(Arc::new(JoinHandler));
        registry
    }

    /// Register a handler under its own kind, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn OperationHandler>) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.insert(handler.kind(), handler)
    }

    pub fn unregister(&mut self, kind: OperationKind) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.remove(&kind)
    }

    pub fn lookup(&self, kind: OperationKind) -> SnorkleResult<Arc<dyn OperationHandler>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| SnorkleError::UnknownOperation {
                operation: kind.request_tag().to_string(),
            })
    }

    pub fn contains(&self, kind: OperationKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl core::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snorkle_core::ErrorClass;

    #[test]
    fn test_default_registry_serves_every_kind() {
        let registry = OperationRegistry::with_default_handlers();
        assert_eq!(registry.len(), OperationKind::ALL.len());
        for kind in OperationKind::ALL {
            let handler = registry.lookup(kind).expect("Failed to find handler");
            assert_eq!(handler.kind(), kind);
        }
    }

    #[test]
    fn test_lookup_of_unregistered_kind() {
        let mut registry = OperationRegistry::with_default_handlers();
        registry.unregister(OperationKind::Join);

        let err = match registry.lookup(OperationKind::Join) {
            Err(err) => err,
            Ok(_) => panic!("join handler should be gone"),
        };
        assert_eq!(err.class(), ErrorClass::UnknownOperation);
        assert!(err.to_string().contains("ALEO_JOIN"));
        assert!(registry.contains(OperationKind::Split));
    }
}
