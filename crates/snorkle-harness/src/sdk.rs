//! In-memory `AleoSdk`
//!
//! Parses a toy subset of program text (`import`, `program`, `function`,
//! `mapping` lines), fabricates keys and transaction ids, and records what it
//! was asked to do so tests can assert on it.
//!
//! Accounts follow a toy scheme that keeps one suffix across the chain of
//! derivations: `APrivateKey1<s>` -> `AViewKey1<s>` -> `aleo1<s>`.

use async_trait::async_trait;
use snorkle_core::{
    AleoSdk, ChainEndpoint, FeeOptions, FunctionCall, Imports, KeyPair, LocalRun, ProgramInfo,
    SnorkleError, SnorkleResult, TransferType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// A transaction the mock "broadcast"
#[derive(Debug, Clone, PartialEq)]
pub struct PostedTransaction {
    pub kind: &'static str,
    pub transaction_id: String,
    pub endpoint: String,
    pub detail: String,
}

pub struct MockSdk {
    init_calls: AtomicUsize,
    synthesize_calls: AtomicUsize,
    next_transaction: AtomicU64,
    init_failure: Option<String>,
    init_delay: Duration,
    function_delays: HashMap<String, Duration>,
    jitter_ms: u64,
    panic_on: Option<String>,
    produce_execution: bool,
    execution_fee: AtomicU64,
    deployment_fee: AtomicU64,
    posted: Mutex<Vec<PostedTransaction>>,
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSdk {
    pub fn new() -> Self {
        Self {
            init_calls: AtomicUsize::new(0),
            synthesize_calls: AtomicUsize::new(0),
            next_transaction: AtomicU64::new(1),
            init_failure: None,
            init_delay: Duration::ZERO,
            function_delays: HashMap::new(),
            jitter_ms: 0,
            panic_on: None,
            produce_execution: true,
            execution_fee: AtomicU64::new(1_000),
            deployment_fee: AtomicU64::new(2_500_000),
            posted: Mutex::new(Vec::new()),
        }
    }

    /// Make `initialize` fail with `reason`
    pub fn with_init_failure(mut self, reason: &str) -> Self {
        self.init_failure = Some(reason.to_string());
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Sleep for `delay` whenever `function` is run or executed
    pub fn with_function_delay(mut self, function: &str, delay: Duration) -> Self {
        self.function_delays.insert(function.to_string(), delay);
        self
    }

    /// Add up to `max_ms` of random latency to every run and broadcast
    pub fn with_jitter(mut self, max_ms: u64) -> Self {
        self.jitter_ms = max_ms;
        self
    }

    /// Panic when `function` is run locally
    pub fn panicking_on(mut self, function: &str) -> Self {
        self.panic_on = Some(function.to_string());
        self
    }

    /// Local runs report no execution transcript
    pub fn without_execution(mut self) -> Self {
        self.produce_execution = false;
        self
    }

    pub fn with_execution_fee(self, microcredits: u64) -> Self {
        self.execution_fee.store(microcredits, Ordering::SeqCst);
        self
    }

    pub fn with_deployment_fee(self, microcredits: u64) -> Self {
        self.deployment_fee.store(microcredits, Ordering::SeqCst);
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn synthesize_calls(&self) -> usize {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    pub fn posted(&self) -> Vec<PostedTransaction> {
        self.lock_posted().clone()
    }

    fn lock_posted(&self) -> MutexGuard<'_, Vec<PostedTransaction>> {
        self.posted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_work(&self, function: &str) {
        let mut delay = self.function_delays.get(function).copied().unwrap_or_default();
        if self.jitter_ms > 0 {
            delay += Duration::from_millis(fastrand::u64(0..=self.jitter_ms));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn post(&self, kind: &'static str, endpoint: &ChainEndpoint, detail: String) -> String {
        let n = self.next_transaction.fetch_add(1, Ordering::SeqCst);
        let transaction_id = format!("at1{}{:04}", kind, n);
        debug!("Mock SDK posted {} to {}", transaction_id, endpoint.network_url());
        self.lock_posted().push(PostedTransaction {
            kind,
            transaction_id: transaction_id.clone(),
            endpoint: endpoint.network_url(),
            detail,
        });
        transaction_id
    }
}

pub const PRIVATE_KEY_PREFIX: &str = "APrivateKey1";
pub const VIEW_KEY_PREFIX: &str = "AViewKey1";
pub const ADDRESS_PREFIX: &str = "aleo1";
const SIGNATURE_PREFIX: &str = "sign1";
const RECORD_PREFIX: &str = "record1";

fn account_suffix<'a>(value: &'a str, prefix: &str, what: &str) -> SnorkleResult<&'a str> {
    match value.strip_prefix(prefix) {
        Some(suffix) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Ok(suffix)
        }
        _ => Err(SnorkleError::sdk(format!("invalid {}: {}", what, value))),
    }
}

fn toy_signature(suffix: &str, message: &str) -> String {
    let digest = message
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    format!("{}{}{:08x}", SIGNATURE_PREFIX, suffix, digest)
}

/// Record ciphertext the mock can decrypt with the view key of `address`
pub fn toy_record_ciphertext(address: &str, plaintext: &str) -> String {
    let owner = address.strip_prefix(ADDRESS_PREFIX).unwrap_or(address);
    format!("{}{}:{}", RECORD_PREFIX, owner, plaintext)
}

/// Parse the toy program grammar
pub fn parse_toy_program(source: &str) -> SnorkleResult<ProgramInfo> {
    let mut id = None;
    let mut functions = Vec::new();
    let mut imports = Vec::new();
    let mut mappings = Vec::new();

    for line in source.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("program ") {
            id = Some(rest.trim_end_matches(';').trim().to_string());
        } else if let Some(rest) = line.strip_prefix("import ") {
            imports.push(rest.trim_end_matches(';').trim().to_string());
        } else if let Some(rest) = line.strip_prefix("function ") {
            functions.push(rest.trim_end_matches(':').trim().to_string());
        } else if let Some(rest) = line.strip_prefix("mapping ") {
            mappings.push(rest.trim_end_matches(':').trim().to_string());
        }
    }

    match id {
        Some(id) if id.ends_with(".aleo") => Ok(ProgramInfo {
            id,
            functions,
            imports,
            mappings,
        }),
        _ => Err(SnorkleError::sdk("program declaration not found")),
    }
}

#[async_trait]
impl AleoSdk for MockSdk {
    async fn initialize(&self) -> SnorkleResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        match &self.init_failure {
            Some(reason) => Err(SnorkleError::sdk(reason.clone())),
            None => Ok(()),
        }
    }

    async fn parse_program(&self, source: &str) -> SnorkleResult<ProgramInfo> {
        parse_toy_program(source)
    }

    async fn synthesize_keys(&self, call: &FunctionCall<'_>) -> SnorkleResult<KeyPair> {
        let n = self.synthesize_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(KeyPair {
            proving_key: format!("prover:{}/{}#{}", call.program_id, call.function, n),
            verifying_key: format!("verifier:{}/{}#{}", call.program_id, call.function, n),
        })
    }

    async fn run_local(&self, call: &FunctionCall<'_>, keys: &KeyPair) -> SnorkleResult<LocalRun> {
        if self.panic_on.as_deref() == Some(call.function) {
            panic!("mock SDK asked to panic in {}", call.function);
        }
        self.simulate_work(call.function).await;

        let execution = self
            .produce_execution
            .then(|| format!("execution:{}", keys.verifying_key));
        Ok(LocalRun {
            outputs: call.inputs.to_vec(),
            execution,
        })
    }

    async fn verify_execution(
        &self,
        execution: &str,
        verifying_key: &str,
        _program: &str,
        function: &str,
    ) -> SnorkleResult<()> {
        if execution == format!("execution:{}", verifying_key) {
            Ok(())
        } else {
            Err(SnorkleError::sdk(format!("Execution of {} failed verification", function)))
        }
    }

    async fn execute(
        &self,
        endpoint: &ChainEndpoint,
        call: &FunctionCall<'_>,
        fee: &FeeOptions,
        _keys: &KeyPair,
    ) -> SnorkleResult<String> {
        self.simulate_work(call.function).await;
        Ok(self.post(
            "execute",
            endpoint,
            format!("{}/{} fee={}", call.program_id, call.function, fee.fee),
        ))
    }

    async fn estimate_execution_fee(
        &self,
        _endpoint: &ChainEndpoint,
        call: &FunctionCall<'_>,
        _keys: &KeyPair,
    ) -> SnorkleResult<u64> {
        self.simulate_work(call.function).await;
        Ok(self.execution_fee.load(Ordering::SeqCst))
    }

    async fn estimate_deployment_fee(&self, _program: &str, _imports: &Imports) -> SnorkleResult<u64> {
        Ok(self.deployment_fee.load(Ordering::SeqCst))
    }

    async fn deploy(
        &self,
        endpoint: &ChainEndpoint,
        program: &str,
        imports: &Imports,
        fee: &FeeOptions,
        _private_key: &str,
    ) -> SnorkleResult<String> {
        let info = parse_toy_program(program)?;
        let imported: Vec<&str> = imports.keys().map(String::as_str).collect();
        Ok(self.post(
            "deploy",
            endpoint,
            format!("{} imports=[{}] fee={}", info.id, imported.join(","), fee.fee),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        endpoint: &ChainEndpoint,
        amount_credits: f64,
        recipient: &str,
        transfer_type: TransferType,
        _amount_record: Option<&str>,
        _fee: &FeeOptions,
        _private_key: &str,
    ) -> SnorkleResult<String> {
        self.simulate_work("").await;
        Ok(self.post(
            "transfer",
            endpoint,
            format!("{} {} to {}", transfer_type, amount_credits, recipient),
        ))
    }

    async fn split(
        &self,
        endpoint: &ChainEndpoint,
        split_amount: f64,
        _record: &str,
        _private_key: &str,
    ) -> SnorkleResult<String> {
        self.simulate_work("").await;
        Ok(self.post("split", endpoint, format!("split {}", split_amount)))
    }

    async fn join(
        &self,
        endpoint: &ChainEndpoint,
        _record_one: &str,
        _record_two: &str,
        _fee: &FeeOptions,
        _private_key: &str,
    ) -> SnorkleResult<String> {
        self.simulate_work("").await;
        Ok(self.post("join", endpoint, "join".to_string()))
    }

    async fn generate_private_key(&self) -> SnorkleResult<String> {
        let suffix: String = (0..40).map(|_| fastrand::alphanumeric()).collect();
        Ok(format!("{}{}", PRIVATE_KEY_PREFIX, suffix))
    }

    async fn view_key_from_private_key(&self, private_key: &str) -> SnorkleResult<String> {
        let suffix = account_suffix(private_key, PRIVATE_KEY_PREFIX, "private key")?;
        Ok(format!("{}{}", VIEW_KEY_PREFIX, suffix))
    }

    async fn address_from_private_key(&self, private_key: &str) -> SnorkleResult<String> {
        let suffix = account_suffix(private_key, PRIVATE_KEY_PREFIX, "private key")?;
        Ok(format!("{}{}", ADDRESS_PREFIX, suffix))
    }

    async fn address_from_view_key(&self, view_key: &str) -> SnorkleResult<String> {
        let suffix = account_suffix(view_key, VIEW_KEY_PREFIX, "view key")?;
        Ok(format!("{}{}", ADDRESS_PREFIX, suffix))
    }

    async fn sign_message(&self, private_key: &str, message: &str) -> SnorkleResult<String> {
        let suffix = account_suffix(private_key, PRIVATE_KEY_PREFIX, "private key")?;
        Ok(toy_signature(suffix, message))
    }

    async fn verify_message(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> SnorkleResult<bool> {
        let suffix = account_suffix(address, ADDRESS_PREFIX, "address")?;
        if !signature.starts_with(SIGNATURE_PREFIX) {
            return Err(SnorkleError::sdk(format!("invalid signature: {}", signature)));
        }
        Ok(signature == toy_signature(suffix, message))
    }

    async fn decrypt_record(&self, view_key: &str, ciphertext: &str) -> SnorkleResult<String> {
        let suffix = account_suffix(view_key, VIEW_KEY_PREFIX, "view key")?;
        let (owner, plaintext) = ciphertext
            .strip_prefix(RECORD_PREFIX)
            .and_then(|rest| rest.split_once(':'))
            .ok_or_else(|| SnorkleError::sdk("invalid record ciphertext"))?;
        if owner != suffix {
            return Err(SnorkleError::sdk("record is not owned by this view key"));
        }
        Ok(plaintext.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{program_source, HELLO_PROGRAM};

    #[test]
    fn test_parse_hello_program() {
        let info = parse_toy_program(HELLO_PROGRAM).unwrap();
        assert_eq!(info.id, "hello_hello.aleo");
        assert_eq!(info.functions, vec!["hello", "goodbye"]);
        assert!(info.imports.is_empty());
    }

    #[test]
    fn test_parse_imports() {
        let source = program_source("child.aleo", &["main"], &["parent.aleo", "credits.aleo"]);
        let info = parse_toy_program(&source).unwrap();
        assert_eq!(info.imports, vec!["parent.aleo", "credits.aleo"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_toy_program("not a program").is_err());
    }

    #[tokio::test]
    async fn test_init_failure_and_counters() {
        let sdk = MockSdk::new().with_init_failure("no threads");
        assert!(sdk.initialize().await.is_err());
        assert_eq!(sdk.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_posted_transactions_are_recorded() {
        let sdk = MockSdk::new();
        let endpoint = ChainEndpoint::default();
        let fee = FeeOptions {
            fee: 0.1,
            private_fee: false,
            fee_record: None,
        };
        let id = sdk
            .join(&endpoint, "r1", "r2", &fee, "key")
            .await
            .unwrap();

        let posted = sdk.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].transaction_id, id);
        assert_eq!(posted[0].kind, "join");
    }

    #[tokio::test]
    async fn test_account_derivation_chain() {
        let sdk = MockSdk::new();
        let account = sdk.derive_account("APrivateKey1abc").await.unwrap();
        assert_eq!(account.view_key, "AViewKey1abc");
        assert_eq!(account.address, "aleo1abc");
        assert_eq!(
            sdk.address_from_view_key(&account.view_key).await.unwrap(),
            account.address
        );

        assert!(sdk.derive_account("not-a-key").await.is_err());

        let generated = sdk.generate_account().await.unwrap();
        assert!(generated.private_key.starts_with(PRIVATE_KEY_PREFIX));
        assert_ne!(generated.private_key, sdk.generate_private_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_signatures_verify_only_for_signer_and_message() {
        let sdk = MockSdk::new();
        let signature = sdk.sign_message("APrivateKey1abc", "hello").await.unwrap();

        assert!(sdk.verify_message("aleo1abc", "hello", &signature).await.unwrap());
        assert!(!sdk.verify_message("aleo1abc", "hullo", &signature).await.unwrap());
        assert!(!sdk.verify_message("aleo1xyz", "hello", &signature).await.unwrap());
        assert!(sdk.verify_message("aleo1abc", "hello", "garbage").await.is_err());
    }

    #[tokio::test]
    async fn test_record_decryption_requires_owner_view_key() {
        let sdk = MockSdk::new();
        let ciphertext = toy_record_ciphertext("aleo1abc", "{ microcredits: 5u64.private }");

        assert_eq!(
            sdk.decrypt_record("AViewKey1abc", &ciphertext).await.unwrap(),
            "{ microcredits: 5u64.private }"
        );
        assert!(sdk.decrypt_record("AViewKey1xyz", &ciphertext).await.is_err());
        assert!(sdk.decrypt_record("AViewKey1abc", "record").await.is_err());
    }
}
