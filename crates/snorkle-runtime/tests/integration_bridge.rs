//! Integration Tests for the Client Bridge and Executor
//!
//! Drives a real executor task and client bridge over their frame channels,
//! with the mock SDK and mock chain from the harness standing in for the Aleo
//! toolchain and the explorer API.

mod common;

use async_trait::async_trait;
use common::{init_test_logging, TestHarness};
use snorkle_core::{
    ChainEndpoint, DeploymentFeeParams, ErrorClass, ExecuteLocalParams, ExecuteOnChainParams,
    ExecutionFeeParams, ExecutorConfig, Network, OperationKind, OperationOutput, OperationRequest, SnorkleConfig,
    SnorkleError, SnorkleResult, TransferType,
};
use snorkle_harness::{
    deploy_request, execute_local_request, execute_on_chain_request, join_request, program_source,
    split_request, transfer_request, MockConnector, MockSdk, HELLO_PROGRAM, TEST_PRIVATE_KEY,
};
use snorkle_runtime::{ExecutorContext, ExecutorState, OperationHandler, OperationRegistry, Readiness};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn local_params(program: &str, function: &str, inputs: &[&str]) -> ExecuteLocalParams {
    match execute_local_request(program, function, inputs) {
        OperationRequest::ExecuteLocal(params) => params,
        _ => unreachable!(),
    }
}

fn assert_class(result: SnorkleResult<OperationOutput>, expected: ErrorClass) -> SnorkleError {
    let err = result.expect_err("operation should fail");
    assert_eq!(err.class(), expected, "unexpected error: {}", err);
    err
}

async fn wait_for_state(harness: &TestHarness, predicate: impl Fn(&ExecutorState) -> bool) {
    let mut state = harness.handle.state_receiver();
    timeout(Duration::from_secs(2), state.wait_for(|s| predicate(s)))
        .await
        .expect("executor should reach the expected state")
        .expect("executor state channel should stay open");
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_bridge_becomes_ready() {
    init_test_logging();
    let harness = TestHarness::start(
        MockSdk::new().with_init_delay(Duration::from_millis(50)),
        MockConnector::new(),
    )
    .await;

    assert_eq!(harness.bridge().readiness(), Readiness::Pending);
    harness.handle.wait_ready().await.unwrap();

    assert_eq!(harness.bridge().readiness(), Readiness::Ready);
    assert!(harness.handle.executor_state().is_ready());
    assert!(harness.handle.is_running());
    assert_eq!(harness.sdk.init_calls(), 1);
}

#[tokio::test]
async fn test_requests_before_ready_are_buffered() {
    let harness = TestHarness::start(
        MockSdk::new().with_init_delay(Duration::from_millis(200)),
        MockConnector::new(),
    )
    .await;
    let bridge = harness.bridge();

    let first = bridge.submit(transfer_request(1.0, TransferType::Public)).await.unwrap();
    let second = bridge.submit(split_request(0.5)).await.unwrap();
    assert_eq!(bridge.readiness(), Readiness::Pending);

    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();
    assert_eq!(first.kind(), OperationKind::Transfer);
    assert_eq!(second.kind(), OperationKind::Split);

    let mut posted: Vec<&str> = harness.sdk.posted().iter().map(|t| t.kind).collect();
    posted.sort();
    assert_eq!(posted, vec!["split", "transfer"]);
}

#[tokio::test]
async fn test_pre_ready_overflow_is_rejected() {
    let harness = TestHarness::start(
        MockSdk::new().with_init_delay(Duration::from_millis(300)),
        MockConnector::new(),
    )
    .await;
    let bridge = harness.bridge();
    let capacity = SnorkleConfig::testing().executor.pre_ready_buffer;

    let mut pending = Vec::new();
    for _ in 0..=capacity {
        pending.push(bridge.submit(transfer_request(1.0, TransferType::Public)).await.unwrap());
    }

    let mut results = Vec::new();
    for call in pending {
        results.push(call.wait().await);
    }

    let (accepted, rejected): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    assert_eq!(accepted.len(), capacity);
    assert_eq!(rejected.len(), 1);
    assert_class(rejected.into_iter().next().unwrap(), ErrorClass::Overloaded);
}

#[tokio::test]
async fn test_init_failure_rejects_every_call() {
    let harness = TestHarness::start(
        MockSdk::new()
            .with_init_delay(Duration::from_millis(100))
            .with_init_failure("thread pool unavailable"),
        MockConnector::new(),
    )
    .await;
    let bridge = harness.bridge();

    let early = bridge.submit(split_request(1.0)).await.unwrap();
    let err = early.wait().await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("thread pool unavailable"));

    let err = harness.handle.wait_ready().await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(bridge.readiness(), Readiness::Failed(_)));

    wait_for_state(&harness, |s| matches!(s, ExecutorState::Failed { .. })).await;
    assert!(bridge.submit(split_request(1.0)).await.unwrap_err().is_transport());
    assert!(harness.sdk.posted().is_empty());
}

#[tokio::test]
async fn test_shutdown_fails_pending_calls() {
    let program = program_source("slow.aleo", &["crawl"], &[]);
    let mut harness = TestHarness::ready(
        MockSdk::new().with_function_delay("crawl", Duration::from_secs(5)),
        MockConnector::new(),
    )
    .await;
    let bridge = harness.bridge();

    let pending = bridge
        .submit(execute_local_request(&program, "crawl", &["1u32"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    harness.handle.shutdown().await.unwrap();

    let err = timeout(Duration::from_secs(1), pending.wait())
        .await
        .expect("pending call should settle on shutdown")
        .unwrap_err();
    assert!(err.is_transport());
    assert!(!harness.handle.is_running());
    assert!(bridge.submit(split_request(1.0)).await.unwrap_err().is_transport());
    assert_eq!(bridge.readiness(), Readiness::Closed);
}

// ----------------------------------------------------------------------------
// Correlation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_every_call_settles_exactly_once() {
    let harness = TestHarness::ready(MockSdk::new().with_jitter(20), MockConnector::new()).await;
    let bridge = harness.bridge();

    let mut tasks = Vec::new();
    for i in 0..24 {
        let bridge = bridge.clone();
        tasks.push(tokio::spawn(async move {
            bridge
                .transfer(match transfer_request(1.0 + i as f64, TransferType::Public) {
                    OperationRequest::Transfer(params) => params,
                    _ => unreachable!(),
                })
                .await
        }));
    }

    let mut transactions = HashSet::new();
    for task in tasks {
        transactions.insert(task.await.unwrap().unwrap());
    }

    assert_eq!(transactions.len(), 24);
    assert_eq!(harness.sdk.posted().len(), 24);
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_results_arrive_out_of_order() {
    let program = program_source("race.aleo", &["slow", "fast"], &[]);
    let harness = TestHarness::ready(
        MockSdk::new().with_function_delay("slow", Duration::from_millis(400)),
        MockConnector::new(),
    )
    .await;
    let bridge = harness.bridge();

    let slow = bridge
        .submit(execute_local_request(&program, "slow", &["1u32"]))
        .await
        .unwrap();
    let fast = bridge
        .submit(execute_local_request(&program, "fast", &["2u32"]))
        .await
        .unwrap();
    assert!(slow.id() < fast.id());

    let fast = timeout(Duration::from_millis(200), fast.wait())
        .await
        .expect("fast call should not wait behind the slow one")
        .unwrap();
    assert_eq!(bridge.pending_calls(), 1);

    let slow = slow.wait().await.unwrap();
    match (slow, fast) {
        (OperationOutput::ExecuteLocal { outputs: slow }, OperationOutput::ExecuteLocal { outputs: fast }) => {
            assert_eq!(slow.outputs, vec!["1u32"]);
            assert_eq!(fast.outputs, vec!["2u32"]);
        }
        other => panic!("unexpected outputs {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_abandons_and_aborts_the_operation() {
    let program = program_source("slow.aleo", &["crawl"], &[]);
    let harness = TestHarness::ready(
        MockSdk::new().with_function_delay("crawl", Duration::from_secs(5)),
        MockConnector::new().with_program("slow.aleo", &program),
    )
    .await;
    let bridge = harness.bridge();

    let err = bridge
        .call_with_timeout(
            execute_on_chain_request("slow.aleo", "crawl", &["1u32"]),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SnorkleError::Timeout { duration_ms: 100 }));
    assert_eq!(bridge.pending_calls(), 0);

    wait_for_state(&harness, |s| *s == ExecutorState::Ready).await;
    assert!(harness.sdk.posted().is_empty());

    // The bridge keeps serving after a timeout
    bridge.split(match split_request(1.0) {
        OperationRequest::Split(params) => params,
        _ => unreachable!(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_cancel_yields_aborted() {
    let program = program_source("slow.aleo", &["crawl"], &[]);
    let harness = TestHarness::ready(
        MockSdk::new().with_function_delay("crawl", Duration::from_secs(5)),
        MockConnector::new(),
    )
    .await;

    let pending = harness
        .bridge()
        .submit(execute_local_request(&program, "crawl", &[]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    pending.cancel().await.unwrap();

    let err = timeout(Duration::from_secs(1), pending.wait())
        .await
        .expect("cancelled call should settle")
        .unwrap_err();
    assert!(matches!(err, SnorkleError::Aborted { .. }));
}

// ----------------------------------------------------------------------------
// Saturation
// ----------------------------------------------------------------------------

/// One handler slot, so everything after the first request has to wait
async fn single_slot_harness(sdk: MockSdk, chain: MockConnector, max_queued: usize) -> TestHarness {
    let config = SnorkleConfig::testing().with_executor(ExecutorConfig {
        pre_ready_buffer: 4,
        max_in_flight: 1,
        max_queued,
    });
    let harness = TestHarness::start_with(sdk, chain, config, OperationRegistry::with_default_handlers())
        .await
        .unwrap();
    harness.handle.wait_ready().await.unwrap();
    harness
}

#[tokio::test]
async fn test_waiting_requests_start_in_arrival_order() {
    let program = program_source("slow.aleo", &["crawl"], &[]);
    let harness = single_slot_harness(
        MockSdk::new().with_function_delay("crawl", Duration::from_millis(300)),
        MockConnector::new().with_program("slow.aleo", &program),
        8,
    )
    .await;
    let bridge = harness.bridge();

    let slow = bridge
        .submit(execute_on_chain_request("slow.aleo", "crawl", &["1u32"]))
        .await
        .unwrap();
    let first = bridge.submit(split_request(1.0)).await.unwrap();
    let second = bridge.submit(split_request(2.0)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.sdk.posted().is_empty(), "splits must wait for the slot");
    assert_eq!(harness.handle.executor_state(), ExecutorState::Busy { in_flight: 1 });

    second.wait().await.unwrap();
    first.wait().await.unwrap();
    slow.wait().await.unwrap();

    let posted: Vec<(&str, String)> = harness
        .sdk
        .posted()
        .into_iter()
        .map(|t| (t.kind, t.detail))
        .collect();
    assert_eq!(posted.len(), 3);
    assert_eq!(posted[0].0, "execute");
    assert_eq!(posted[1], ("split", "split 1".to_string()));
    assert_eq!(posted[2], ("split", "split 2".to_string()));
}

#[tokio::test]
async fn test_requests_past_the_queue_bound_are_overloaded() {
    let program = program_source("slow.aleo", &["crawl"], &[]);
    let harness = single_slot_harness(
        MockSdk::new().with_function_delay("crawl", Duration::from_secs(5)),
        MockConnector::new().with_program("slow.aleo", &program),
        2,
    )
    .await;
    let bridge = harness.bridge();

    let running = bridge
        .submit(execute_on_chain_request("slow.aleo", "crawl", &["1u32"]))
        .await
        .unwrap();
    let cancelled = bridge.submit(split_request(1.0)).await.unwrap();
    let kept = bridge.submit(split_request(2.0)).await.unwrap();
    let overflow = bridge.submit(split_request(3.0)).await.unwrap();

    let rejected = timeout(Duration::from_secs(1), overflow.wait())
        .await
        .expect("overflow should be rejected without waiting for a slot");
    assert_class(rejected, ErrorClass::Overloaded);

    // Cancels still get through while the slot is busy
    cancelled.cancel().await.unwrap();
    let err = timeout(Duration::from_secs(1), cancelled.wait())
        .await
        .expect("queued call should settle on cancel")
        .unwrap_err();
    assert!(matches!(err, SnorkleError::Aborted { .. }));

    let retried = bridge.submit(split_request(4.0)).await.unwrap();
    running.cancel().await.unwrap();
    assert!(matches!(running.wait().await, Err(SnorkleError::Aborted { .. })));

    kept.wait().await.unwrap();
    retried.wait().await.unwrap();
    let details: Vec<String> = harness.sdk.posted().into_iter().map(|t| t.detail).collect();
    assert_eq!(details, vec!["split 2", "split 4"]);
    assert_eq!(bridge.pending_calls(), 0);
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unregistered_operation_is_rejected_without_running() {
    let mut registry = OperationRegistry::with_default_handlers();
    registry.unregister(OperationKind::Split);

    let harness = TestHarness::start_with(
        MockSdk::new(),
        MockConnector::new(),
        SnorkleConfig::testing(),
        registry,
    )
    .await
    .unwrap();
    harness.handle.wait_ready().await.unwrap();

    let err = assert_class(
        harness.bridge().call(split_request(1.0)).await,
        ErrorClass::UnknownOperation,
    );
    assert!(err.to_string().contains("ALEO_SPLIT"));
    assert!(harness.sdk.posted().is_empty());

    // Other kinds still work
    harness.bridge().call(join_request()).await.unwrap();
}

struct FixedSplit;

#[async_trait]
impl OperationHandler for FixedSplit {
    fn kind(&self) -> OperationKind {
        OperationKind::Split
    }

    async fn handle(&self, _ctx: &ExecutorContext, _request: OperationRequest) -> SnorkleResult<OperationOutput> {
        Ok(OperationOutput::Split {
            transaction_id: "at1fixed".into(),
        })
    }
}

#[tokio::test]
async fn test_registered_handler_replaces_default() {
    let mut registry = OperationRegistry::with_default_handlers();
    assert!(registry.register(std::sync::Arc::new(FixedSplit)).is_some());

    let harness = TestHarness::start_with(
        MockSdk::new(),
        MockConnector::new(),
        SnorkleConfig::testing(),
        registry,
    )
    .await
    .unwrap();

    let output = harness.bridge().call(split_request(1.0)).await.unwrap();
    assert_eq!(output.transaction_id(), Some("at1fixed"));
    assert!(harness.sdk.posted().is_empty());
}

// ----------------------------------------------------------------------------
// Operations
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_execute_local_returns_verified_execution() {
    let harness = TestHarness::ready(MockSdk::new(), MockConnector::new()).await;

    let result = harness
        .bridge()
        .execute_local(local_params(HELLO_PROGRAM, "hello", &["5u32", "5u32"]))
        .await
        .unwrap();

    assert_eq!(result.outputs, vec!["5u32", "5u32"]);
    assert!(result.execution.starts_with("execution:verifier:hello_hello.aleo/hello"));
}

#[tokio::test]
async fn test_execute_local_without_execution_transcript() {
    let harness = TestHarness::ready(MockSdk::new().without_execution(), MockConnector::new()).await;

    let result = harness
        .bridge()
        .execute_local(local_params(HELLO_PROGRAM, "goodbye", &["1u32"]))
        .await
        .unwrap();
    assert_eq!(result.execution, "");
}

#[tokio::test]
async fn test_missing_function_is_reported() {
    let harness = TestHarness::ready(MockSdk::new(), MockConnector::new()).await;

    let err = assert_class(
        harness
            .bridge()
            .call(execute_local_request(HELLO_PROGRAM, "missing", &[]))
            .await,
        ErrorClass::Operation,
    );
    assert_eq!(
        err.to_string(),
        "Program hello_hello.aleo does not contain function missing"
    );
    assert_eq!(harness.sdk.synthesize_calls(), 0);
}

#[tokio::test]
async fn test_keys_are_cached_per_program_source() {
    let other = program_source("other.aleo", &["hello"], &[]);
    let harness = TestHarness::ready(MockSdk::new(), MockConnector::new()).await;
    let bridge = harness.bridge();

    bridge.execute_local(local_params(HELLO_PROGRAM, "hello", &["1u32"])).await.unwrap();
    bridge.execute_local(local_params(HELLO_PROGRAM, "hello", &["2u32"])).await.unwrap();
    assert_eq!(harness.sdk.synthesize_calls(), 1);

    bridge.execute_local(local_params(HELLO_PROGRAM, "goodbye", &["1u32"])).await.unwrap();
    bridge.execute_local(local_params(HELLO_PROGRAM, "hello", &["3u32"])).await.unwrap();
    assert_eq!(harness.sdk.synthesize_calls(), 2);

    // A different source evicts the slot
    bridge.execute_local(local_params(&other, "hello", &["1u32"])).await.unwrap();
    bridge.execute_local(local_params(HELLO_PROGRAM, "hello", &["1u32"])).await.unwrap();
    assert_eq!(harness.sdk.synthesize_calls(), 4);
}

#[tokio::test]
async fn test_fee_estimates_are_converted_to_credits() {
    let harness = TestHarness::ready(
        MockSdk::new()
            .with_execution_fee(1_000)
            .with_deployment_fee(2_500_000),
        MockConnector::new().with_program("hello_hello.aleo", HELLO_PROGRAM),
    )
    .await;
    let bridge = harness.bridge();

    let execution_fee = bridge
        .estimate_execution_fee(ExecutionFeeParams {
            program_id: "hello_hello.aleo".into(),
            function: "hello".into(),
            inputs: vec!["1u32".into(), "2u32".into()],
            private_key: TEST_PRIVATE_KEY.into(),
            endpoint: None,
        })
        .await
        .unwrap();
    assert!((execution_fee - 0.011).abs() < 1e-9);

    let deployment_fee = bridge
        .estimate_deployment_fee(DeploymentFeeParams {
            program: HELLO_PROGRAM.into(),
            endpoint: None,
        })
        .await
        .unwrap();
    assert!((deployment_fee - 2.51).abs() < 1e-9);
}

#[tokio::test]
async fn test_deploying_an_existing_program_posts_nothing() {
    let harness = TestHarness::ready(
        MockSdk::new(),
        MockConnector::new().with_program("hello_hello.aleo", HELLO_PROGRAM),
    )
    .await;

    let err = assert_class(
        harness.bridge().call(deploy_request(HELLO_PROGRAM, 1.0)).await,
        ErrorClass::Operation,
    );
    assert_eq!(err.to_string(), "Program hello_hello.aleo already exists on the network");
    assert!(harness.sdk.posted().is_empty());
}

#[tokio::test]
async fn test_deploy_rejects_unparseable_program() {
    let harness = TestHarness::ready(MockSdk::new(), MockConnector::new()).await;

    let err = assert_class(
        harness.bridge().call(deploy_request("garbage", 1.0)).await,
        ErrorClass::Operation,
    );
    assert_eq!(
        err.to_string(),
        "Invalid program, ensure the program is valid and try again."
    );
}

#[tokio::test]
async fn test_deploy_fetches_each_import_once() {
    let grandparent = program_source("grandparent.aleo", &["base"], &[]);
    let parent = program_source("parent.aleo", &["middle"], &["grandparent.aleo"]);
    let child = program_source("child.aleo", &["main"], &["parent.aleo", "grandparent.aleo"]);

    let chain = MockConnector::new()
        .with_program("grandparent.aleo", &grandparent)
        .with_program("parent.aleo", &parent);
    let harness = TestHarness::ready(MockSdk::new(), chain).await;

    let transaction_id = harness
        .bridge()
        .deploy(match deploy_request(&child, 2.0) {
            OperationRequest::Deploy(params) => params,
            _ => unreachable!(),
        })
        .await
        .unwrap();

    let posted = harness.sdk.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].transaction_id, transaction_id);
    assert!(posted[0].detail.contains("imports=[grandparent.aleo,parent.aleo]"));
    assert_eq!(harness.chain.program_lookups("grandparent.aleo"), 1);
    assert_eq!(harness.chain.program_lookups("parent.aleo"), 1);
}

#[tokio::test]
async fn test_request_endpoint_does_not_leak_into_later_requests() {
    let chain = MockConnector::new().with_program("hello_hello.aleo", HELLO_PROGRAM);
    let harness = TestHarness::ready(MockSdk::new(), chain).await;
    let bridge = harness.bridge();
    let mainnet = ChainEndpoint::new("http://node.example:3030/", Network::Mainnet).unwrap();

    bridge
        .execute_on_chain(ExecuteOnChainParams {
            program_id: "hello_hello.aleo".into(),
            function: "hello".into(),
            inputs: vec!["1u32".into(), "1u32".into()],
            private_key: TEST_PRIVATE_KEY.into(),
            fee: 0.2,
            private_fee: false,
            fee_record: None,
            endpoint: Some(mainnet.clone()),
        })
        .await
        .unwrap();
    bridge.call(execute_on_chain_request("hello_hello.aleo", "hello", &["1u32", "1u32"])).await.unwrap();

    let posted = harness.sdk.posted();
    assert_eq!(posted[0].endpoint, "http://node.example:3030/mainnet");
    assert_eq!(
        posted[1].endpoint,
        SnorkleConfig::testing().network.endpoint.network_url()
    );
    assert!(harness.chain.connections().contains(&mainnet));
}

#[tokio::test]
async fn test_invalid_amounts_are_validation_errors() {
    let harness = TestHarness::ready(MockSdk::new(), MockConnector::new()).await;
    let bridge = harness.bridge();

    assert_class(
        bridge.call(transfer_request(0.0, TransferType::Private)).await,
        ErrorClass::Validation,
    );
    assert_class(bridge.call(split_request(-1.0)).await, ErrorClass::Validation);
    assert_class(bridge.call(deploy_request(HELLO_PROGRAM, -1.0)).await, ErrorClass::Validation);
    assert!(harness.sdk.posted().is_empty());
}

#[tokio::test]
async fn test_handler_panic_becomes_operation_error() {
    let program = program_source("boom.aleo", &["explode", "calm"], &[]);
    let harness = TestHarness::ready(MockSdk::new().panicking_on("explode"), MockConnector::new()).await;
    let bridge = harness.bridge();

    assert_class(
        bridge.call(execute_local_request(&program, "explode", &[])).await,
        ErrorClass::Operation,
    );

    // The executor survives the panic
    bridge.call(execute_local_request(&program, "calm", &[])).await.unwrap();
    assert!(harness.handle.is_running());
}
