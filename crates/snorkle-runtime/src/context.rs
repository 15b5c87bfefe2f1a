//! Executor Context
//!
//! Everything a handler may touch: the SDK, a connector for chain clients, the
//! default endpoint and the program cache. The context is owned by the executor
//! task and shared with in-flight handlers through an `Arc`.

use snorkle_core::{
    AleoSdk, ChainClient, ChainConnector, ChainEndpoint, FunctionCall, Imports, KeyPair,
    ProgramInfo, SnorkleResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// ----------------------------------------------------------------------------
// Program Cache
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct CachedProgram {
    source: String,
    keys: HashMap<String, KeyPair>,
}

/// Single-slot cache of synthesized keys
///
/// The slot is keyed by the exact program source text and holds one key pair
/// per function. Storing keys for a different source evicts the slot.
#[derive(Debug, Default)]
pub struct ProgramCache {
    slot: Mutex<Option<CachedProgram>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedProgram>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, source: &str, function: &str) -> Option<KeyPair> {
        self.lock()
            .as_ref()
            .filter(|cached| cached.source == source)
            .and_then(|cached| cached.keys.get(function).cloned())
    }

    pub fn insert(&self, source: &str, function: &str, keys: KeyPair) {
        let mut slot = self.lock();
        match slot.as_mut() {
            Some(cached) if cached.source == source => {
                cached.keys.insert(function.to_string(), keys);
            }
            _ => {
                let mut functions = HashMap::new();
                functions.insert(function.to_string(), keys);
                *slot = Some(CachedProgram {
                    source: source.to_string(),
                    keys: functions,
                });
            }
        }
    }

    /// Source text currently occupying the slot
    pub fn cached_source(&self) -> Option<String> {
        self.lock().as_ref().map(|cached| cached.source.clone())
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }
}

// ----------------------------------------------------------------------------
// Executor Context
// ----------------------------------------------------------------------------

pub struct ExecutorContext {
    sdk: Arc<dyn AleoSdk>,
    connector: Arc<dyn ChainConnector>,
    default_endpoint: ChainEndpoint,
    cache: ProgramCache,
}

impl ExecutorContext {
    pub fn new(
        sdk: Arc<dyn AleoSdk>,
        connector: Arc<dyn ChainConnector>,
        default_endpoint: ChainEndpoint,
    ) -> Self {
        Self {
            sdk,
            connector,
            default_endpoint,
            cache: ProgramCache::new(),
        }
    }

    pub fn sdk(&self) -> &dyn AleoSdk {
        self.sdk.as_ref()
    }

    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    pub fn default_endpoint(&self) -> &ChainEndpoint {
        &self.default_endpoint
    }

    /// The request's own endpoint, or the default one
    pub fn resolve_endpoint(&self, requested: Option<&ChainEndpoint>) -> ChainEndpoint {
        requested.unwrap_or(&self.default_endpoint).clone()
    }

    pub fn chain(&self, endpoint: &ChainEndpoint) -> SnorkleResult<Arc<dyn ChainClient>> {
        self.connector.connect(endpoint)
    }

    /// Cached keys for `call`, synthesizing and caching them on a miss
    pub async fn keys_for(&self, call: &FunctionCall<'_>) -> SnorkleResult<KeyPair> {
        if let Some(keys) = self.cache.get(call.program, call.function) {
            debug!("Reusing cached keys for {}/{}", call.program_id, call.function);
            return Ok(keys);
        }

        debug!("Synthesizing keys for {}/{}", call.program_id, call.function);
        let keys = self.sdk.synthesize_keys(call).await?;
        self.cache.insert(call.program, call.function, keys.clone());
        Ok(keys)
    }

    /// Fetch every transitive import of `program` from the chain
    ///
    /// Each program id is fetched once even when several programs import it.
    pub async fn resolve_imports(
        &self,
        chain: &dyn ChainClient,
        program: &ProgramInfo,
    ) -> SnorkleResult<Imports> {
        let mut imports = Imports::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: Vec<String> = program.imports.clone();

        while let Some(id) = queue.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let source = chain.program(&id).await?;
            let info = self.sdk.parse_program(&source).await?;
            queue.extend(info.imports.into_iter().filter(|i| !seen.contains(i)));
            imports.insert(id, source);
        }

        Ok(imports)
    }
}
