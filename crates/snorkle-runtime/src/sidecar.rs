//! Sidecar SDK adapter
//!
//! Implements `AleoSdk` by talking to an external SDK host process over
//! newline-delimited JSON on stdin/stdout:
//!
//! ```text
//! → {"id": 1, "method": "parseProgram", "params": {...}}
//! ← {"id": 1, "result": {...}}            or  {"id": 1, "error": "message"}
//! ```
//!
//! Requests are multiplexed: several handlers may have calls outstanding at
//! once and responses are routed back by id.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snorkle_core::{
    AleoSdk, ChainEndpoint, FeeOptions, FunctionCall, Imports, KeyPair, LocalRun, ProgramInfo,
    SnorkleError, SnorkleResult, TransferType,
};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

type Reply = Result<Value, String>;

#[derive(Debug, Serialize)]
struct SidecarRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct SidecarResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

// ----------------------------------------------------------------------------
// Reply Table
// ----------------------------------------------------------------------------

/// Outstanding requests by id
///
/// Once closed, every parked request has been failed and no new one is
/// accepted, so a request either gets its reply or an error.
#[derive(Debug, Default)]
struct ReplyTable {
    pending: DashMap<u64, oneshot::Sender<Reply>>,
    closed: RwLock<Option<String>>,
}

impl ReplyTable {
    fn register(
        self: &Arc<Self>,
        id: u64,
    ) -> Result<(PendingReply, oneshot::Receiver<Reply>), String> {
        if let Some(reason) = self.closed_reason() {
            return Err(reason);
        }

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(id, sender);
        let guard = PendingReply {
            table: Arc::clone(self),
            id,
        };

        // close may have drained between the check and the insert
        if let Some(reason) = self.closed_reason() {
            return Err(reason);
        }

        Ok((guard, receiver))
    }

    fn route(&self, response: SidecarResponse) {
        let Some((_, sender)) = self.pending.remove(&response.id) else {
            warn!("SDK sidecar answered unknown request {}", response.id);
            return;
        };
        let reply = match (response.result, response.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        let _ = sender.send(reply);
    }

    /// Fail everything parked and refuse new requests
    fn close(&self, reason: &str) -> usize {
        {
            let mut closed = self.closed.write().unwrap_or_else(|e| e.into_inner());
            if closed.is_none() {
                *closed = Some(reason.to_string());
            }
        }

        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, sender)) = self.pending.remove(&id) {
                let _ = sender.send(Err(reason.to_string()));
                failed += 1;
            }
        }
        failed
    }

    fn closed_reason(&self) -> Option<String> {
        self.closed.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Drops the table entry of a request whose caller stopped waiting
struct PendingReply {
    table: Arc<ReplyTable>,
    id: u64,
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.pending.remove(&self.id);
    }
}

// ----------------------------------------------------------------------------
// Sidecar Process
// ----------------------------------------------------------------------------

pub struct SidecarSdk {
    next_id: AtomicU64,
    replies: Arc<ReplyTable>,
    stdin_sender: mpsc::UnboundedSender<String>,
    child: Mutex<Child>,
}

impl SidecarSdk {
    /// Launch `program` with `args` and attach to its stdin/stdout
    pub fn spawn(program: &str, args: &[String]) -> SnorkleResult<Self> {
        info!("Starting SDK sidecar '{}'", program);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SnorkleError::sdk(format!("Failed to start SDK sidecar '{}': {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SnorkleError::sdk("SDK sidecar has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SnorkleError::sdk("SDK sidecar has no stdout"))?;

        let replies = Arc::new(ReplyTable::default());
        let (stdin_sender, mut stdin_receiver) = mpsc::unbounded_channel::<String>();

        // Spawn stdin writer
        let writer_replies = Arc::clone(&replies);
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = stdin_receiver.recv().await {
                if let Err(e) = stdin.write_all(format!("{}\n", line).as_bytes()).await {
                    error!("Failed to write to SDK sidecar stdin: {}", e);
                    writer_replies.close(&format!("SDK sidecar stdin failed: {}", e));
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    error!("Failed to flush SDK sidecar stdin: {}", e);
                    writer_replies.close(&format!("SDK sidecar stdin failed: {}", e));
                    break;
                }
            }
        });

        // Spawn stdout reader
        let reader_replies = Arc::clone(&replies);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.starts_with('{') {
                    debug!("SDK sidecar: {}", line);
                    continue;
                }
                match serde_json::from_str::<SidecarResponse>(&line) {
                    Ok(response) => reader_replies.route(response),
                    Err(e) => warn!("Ignoring malformed SDK sidecar line: {}", e),
                }
            }

            let failed = reader_replies.close("SDK sidecar exited");
            warn!("SDK sidecar closed its stdout; failed {} pending requests", failed);
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            replies,
            stdin_sender,
            child: Mutex::new(child),
        })
    }

    /// Whether the sidecar process is still running
    pub async fn is_alive(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    pub async fn stop(&self) -> SnorkleResult<()> {
        self.child.lock().await.kill().await?;
        Ok(())
    }

    /// Requests still waiting for the host to answer
    pub fn pending_requests(&self) -> usize {
        self.replies.pending.len()
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> SnorkleResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&SidecarRequest { id, method, params })?;

        let (_entry, receiver) = self.replies.register(id).map_err(SnorkleError::sdk)?;

        if self.stdin_sender.send(line).is_err() {
            self.replies.close("SDK sidecar stdin writer stopped");
            return Err(SnorkleError::sdk("SDK sidecar is not running"));
        }

        let reply = receiver
            .await
            .map_err(|_| SnorkleError::sdk("SDK sidecar dropped the request"))?;
        let value = reply.map_err(SnorkleError::sdk)?;
        Ok(serde_json::from_value(value)?)
    }
}

fn fee_params(fee: &FeeOptions) -> Value {
    json!({
        "fee": fee.fee,
        "privateFee": fee.private_fee,
        "feeRecord": fee.fee_record,
    })
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
        base.extend(extra);
    }
    base
}

#[async_trait]
impl AleoSdk for SidecarSdk {
    async fn initialize(&self) -> SnorkleResult<()> {
        let _: Value = self.request("initialize", json!({})).await?;
        Ok(())
    }

    async fn parse_program(&self, source: &str) -> SnorkleResult<ProgramInfo> {
        self.request("parseProgram", json!({ "program": source })).await
    }

    async fn synthesize_keys(&self, call: &FunctionCall<'_>) -> SnorkleResult<KeyPair> {
        self.request("synthesizeKeys", serde_json::to_value(call)?).await
    }

    async fn run_local(&self, call: &FunctionCall<'_>, keys: &KeyPair) -> SnorkleResult<LocalRun> {
        let params = merge(serde_json::to_value(call)?, json!({ "keys": keys }));
        self.request("run", params).await
    }

    async fn verify_execution(
        &self,
        execution: &str,
        verifying_key: &str,
        program: &str,
        function: &str,
    ) -> SnorkleResult<()> {
        let verified: bool = self
            .request(
                "verifyExecution",
                json!({
                    "execution": execution,
                    "verifyingKey": verifying_key,
                    "program": program,
                    "function": function,
                }),
            )
            .await?;
        if verified {
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
        keys: &KeyPair,
    ) -> SnorkleResult<String> {
        let params = merge(
            merge(serde_json::to_value(call)?, fee_params(fee)),
            json!({ "endpoint": endpoint, "keys": keys }),
        );
        self.request("execute", params).await
    }

    async fn estimate_execution_fee(
        &self,
        endpoint: &ChainEndpoint,
        call: &FunctionCall<'_>,
        keys: &KeyPair,
    ) -> SnorkleResult<u64> {
        let params = merge(
            serde_json::to_value(call)?,
            json!({ "endpoint": endpoint, "keys": keys }),
        );
        self.request("estimateExecutionFee", params).await
    }

    async fn estimate_deployment_fee(&self, program: &str, imports: &Imports) -> SnorkleResult<u64> {
        self.request(
            "estimateDeploymentFee",
            json!({ "program": program, "imports": imports }),
        )
        .await
    }

    async fn deploy(
        &self,
        endpoint: &ChainEndpoint,
        program: &str,
        imports: &Imports,
        fee: &FeeOptions,
        private_key: &str,
    ) -> SnorkleResult<String> {
        let params = merge(
            json!({
                "endpoint": endpoint,
                "program": program,
                "imports": imports,
                "privateKey": private_key,
            }),
            fee_params(fee),
        );
        self.request("deploy", params).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        endpoint: &ChainEndpoint,
        amount_credits: f64,
        recipient: &str,
        transfer_type: TransferType,
        amount_record: Option<&str>,
        fee: &FeeOptions,
        private_key: &str,
    ) -> SnorkleResult<String> {
        let params = merge(
            json!({
                "endpoint": endpoint,
                "amountCredits": amount_credits,
                "recipient": recipient,
                "transferType": transfer_type,
                "amountRecord": amount_record,
                "privateKey": private_key,
            }),
            fee_params(fee),
        );
        self.request("transfer", params).await
    }

    async fn split(
        &self,
        endpoint: &ChainEndpoint,
        split_amount: f64,
        record: &str,
        private_key: &str,
    ) -> SnorkleResult<String> {
        self.request(
            "split",
            json!({
                "endpoint": endpoint,
                "splitAmount": split_amount,
                "record": record,
                "privateKey": private_key,
            }),
        )
        .await
    }

    async fn join(
        &self,
        endpoint: &ChainEndpoint,
        record_one: &str,
        record_two: &str,
        fee: &FeeOptions,
        private_key: &str,
    ) -> SnorkleResult<String> {
        let params = merge(
            json!({
                "endpoint": endpoint,
                "recordOne": record_one,
                "recordTwo": record_two,
                "privateKey": private_key,
            }),
            fee_params(fee),
        );
        self.request("join", params).await
    }

    async fn generate_private_key(&self) -> SnorkleResult<String> {
        self.request("generatePrivateKey", json!({})).await
    }

    async fn view_key_from_private_key(&self, private_key: &str) -> SnorkleResult<String> {
        self.request("viewKeyFromPrivateKey", json!({ "privateKey": private_key }))
            .await
    }

    async fn address_from_private_key(&self, private_key: &str) -> SnorkleResult<String> {
        self.request("addressFromPrivateKey", json!({ "privateKey": private_key }))
            .await
    }

    async fn address_from_view_key(&self, view_key: &str) -> SnorkleResult<String> {
        self.request("addressFromViewKey", json!({ "viewKey": view_key }))
            .await
    }

    async fn sign_message(&self, private_key: &str, message: &str) -> SnorkleResult<String> {
        self.request(
            "signMessage",
            json!({ "privateKey": private_key, "message": message }),
        )
        .await
    }

    async fn verify_message(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> SnorkleResult<bool> {
        self.request(
            "verifyMessage",
            json!({ "address": address, "message": message, "signature": signature }),
        )
        .await
    }

    async fn decrypt_record(&self, view_key: &str, ciphertext: &str) -> SnorkleResult<String> {
        self.request(
            "decryptRecord",
            json!({ "viewKey": view_key, "ciphertext": ciphertext }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Host that answers every request with `{"id": <id>, "result": true}`
    fn echo_host() -> SidecarSdk {
        let script = r#"sed -u 's/^{"id":\([0-9]*\).*$/{"id":\1,"result":true}/'"#;
        SidecarSdk::spawn("sh", &["-c".to_string(), script.to_string()])
            .expect("Failed to start echo host")
    }

    #[test]
    fn test_route_reply() {
        let table = Arc::new(ReplyTable::default());
        let (_entry, mut receiver) = table.register(7).unwrap();

        table.route(SidecarResponse {
            id: 7,
            result: None,
            error: Some("bad program".into()),
        });

        assert_eq!(receiver.try_recv().unwrap(), Err("bad program".to_string()));
        assert!(table.pending.is_empty());
    }

    #[test]
    fn test_dropped_request_releases_its_entry() {
        let table = Arc::new(ReplyTable::default());
        let (entry, _receiver) = table.register(1).unwrap();
        assert_eq!(table.pending.len(), 1);

        drop(entry);
        assert!(table.pending.is_empty());
    }

    #[test]
    fn test_closed_table_fails_parked_and_new_requests() {
        let table = Arc::new(ReplyTable::default());
        let (_entry, mut receiver) = table.register(1).unwrap();

        assert_eq!(table.close("SDK sidecar exited"), 1);
        assert_eq!(
            receiver.try_recv().unwrap(),
            Err("SDK sidecar exited".to_string())
        );
        assert_eq!(
            table.register(2).err(),
            Some("SDK sidecar exited".to_string())
        );
        assert!(table.pending.is_empty());
    }

    #[test]
    fn test_merge_params() {
        let merged = merge(json!({"program": "p"}), json!({"fee": 1.0}));
        assert_eq!(merged, json!({"program": "p", "fee": 1.0}));
    }

    #[tokio::test]
    async fn test_requests_fail_after_host_exits() {
        let sdk = SidecarSdk::spawn("true", &[]).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            sdk.parse_program("program hello.aleo;"),
        )
        .await;
        assert!(matches!(outcome, Ok(Err(SnorkleError::Sdk { .. }))));
        assert_eq!(sdk.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_request_fails_when_host_exits() {
        let script = "read request; exit 0".to_string();
        let sdk = SidecarSdk::spawn("sh", &["-c".to_string(), script]).unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            sdk.address_from_view_key("AViewKey1abc"),
        )
        .await;
        assert!(matches!(outcome, Ok(Err(SnorkleError::Sdk { .. }))));
    }

    #[tokio::test]
    async fn test_abandoned_request_leaves_no_entry() {
        let sdk = SidecarSdk::spawn("sh", &["-c".to_string(), "cat > /dev/null".to_string()])
            .unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            sdk.sign_message("APrivateKey1abc", "hello"),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(sdk.pending_requests(), 0);
        assert!(sdk.is_alive().await);

        sdk.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_replies_are_routed_by_id() {
        let sdk = echo_host();

        let (first, second) = tokio::join!(
            sdk.verify_message("aleo1abc", "hello", "sign1abc"),
            sdk.verify_message("aleo1def", "bye", "sign1def"),
        );
        assert!(first.unwrap());
        assert!(second.unwrap());
        assert_eq!(sdk.pending_requests(), 0);
    }
}
