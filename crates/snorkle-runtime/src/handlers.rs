//! Operation Handlers
//!
//! One handler per operation kind. Handlers validate their payload, resolve the
//! endpoint for their own request, and delegate all cryptographic work to the
//! SDK. Error messages raised here are shown to the user verbatim.

use async_trait::async_trait;
use snorkle_core::{
    credits_from_microcredits, ChainClient, DeployParams, DeploymentFeeParams, ExecuteLocalParams,
    ExecuteOnChainParams, ExecutionFeeParams, FeeOptions, FunctionCall, JoinParams,
    LocalExecution, OperationKind, OperationOutput, OperationRequest, ProgramInfo, SnorkleError,
    SnorkleResult, SplitParams, TransferParams,
};
use tracing::{debug, info};

use crate::context::ExecutorContext;
use crate::registry::OperationHandler;

const INVALID_PROGRAM: &str = "Invalid program, ensure the program is valid and try again.";

// ----------------------------------------------------------------------------
// Shared Checks
// ----------------------------------------------------------------------------

fn mismatched(expected: OperationKind, request: &OperationRequest) -> SnorkleError {
    SnorkleError::protocol(format!(
        "{} handler received a {} request",
        expected,
        request.kind()
    ))
}

fn ensure_function(program: &ProgramInfo, function: &str) -> SnorkleResult<()> {
    if program.has_function(function) {
        Ok(())
    } else {
        Err(SnorkleError::operation(format!(
            "Program {} does not contain function {}",
            program.id, function
        )))
    }
}

fn ensure_positive(field: &str, value: f64) -> SnorkleResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SnorkleError::validation(format!(
            "{} must be a number greater than 0, got {}",
            field, value
        )))
    }
}

fn ensure_fee(fee: &FeeOptions) -> SnorkleResult<()> {
    if !fee.fee.is_finite() || fee.fee < 0.0 {
        return Err(SnorkleError::validation(format!(
            "fee must be a non-negative number, got {}",
            fee.fee
        )));
    }
    Ok(())
}

/// Source text and parse result of a program deployed on chain
async fn fetch_program(
    ctx: &ExecutorContext,
    chain: &dyn ChainClient,
    program_id: &str,
) -> SnorkleResult<(String, ProgramInfo)> {
    let source = chain.program(program_id).await?;
    let info = ctx.sdk().parse_program(&source).await?;
    Ok((source, info))
}

// ----------------------------------------------------------------------------
// Deploy
// ----------------------------------------------------------------------------

pub struct DeployHandler;

impl DeployHandler {
    async fn deploy(&self, ctx: &ExecutorContext, params: DeployParams) -> SnorkleResult<OperationOutput> {
        let fee = params.fee_options();
        ensure_fee(&fee)?;

        let program = ctx
            .sdk()
            .parse_program(&params.program)
            .await
            .map_err(|_| SnorkleError::operation(INVALID_PROGRAM))?;

        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let chain = ctx.chain(&endpoint)?;

        // Any lookup failure counts as "not deployed yet"
        match chain.program(&program.id).await {
            Ok(_) => {
                return Err(SnorkleError::operation(format!(
                    "Program {} already exists on the network",
                    program.id
                )));
            }
            Err(e) => debug!("Program {} not found on {} ({}), deploying", program.id, endpoint.network_url(), e),
        }

        let imports = ctx.resolve_imports(chain.as_ref(), &program).await?;
        let transaction_id = ctx
            .sdk()
            .deploy(&endpoint, &params.program, &imports, &fee, &params.private_key)
            .await?;

        info!("Deployment transaction {} created for {}", transaction_id, program.id);
        Ok(OperationOutput::Deploy { transaction_id })
    }
}

#[async_trait]
impl OperationHandler for DeployHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Deploy
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::Deploy(params) => self.deploy(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

// ----------------------------------------------------------------------------
// Local Execution
// ----------------------------------------------------------------------------

pub struct ExecuteLocalHandler;

impl ExecuteLocalHandler {
    async fn execute(&self, ctx: &ExecutorContext, params: ExecuteLocalParams) -> SnorkleResult<OperationOutput> {
        let program = ctx.sdk().parse_program(&params.program).await?;
        ensure_function(&program, &params.function)?;

        let chain = ctx.chain(ctx.default_endpoint())?;
        let imports = ctx.resolve_imports(chain.as_ref(), &program).await?;

        let call = FunctionCall {
            program: &params.program,
            program_id: &program.id,
            function: &params.function,
            inputs: &params.inputs,
            private_key: &params.private_key,
            imports: &imports,
        };
        let keys = ctx.keys_for(&call).await?;
        let run = ctx.sdk().run_local(&call, &keys).await?;

        let execution = match run.execution {
            Some(execution) => {
                ctx.sdk()
                    .verify_execution(&execution, &keys.verifying_key, &params.program, &params.function)
                    .await?;
                debug!("Execution of {}/{} verified", program.id, params.function);
                execution
            }
            None => String::new(),
        };

        Ok(OperationOutput::ExecuteLocal {
            outputs: LocalExecution {
                outputs: run.outputs,
                execution,
            },
        })
    }
}

#[async_trait]
impl OperationHandler for ExecuteLocalHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::ExecuteLocal
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::ExecuteLocal(params) => self.execute(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

// ----------------------------------------------------------------------------
// On-chain Execution
// ----------------------------------------------------------------------------

pub struct ExecuteOnChainHandler;

impl ExecuteOnChainHandler {
    async fn execute(&self, ctx: &ExecutorContext, params: ExecuteOnChainParams) -> SnorkleResult<OperationOutput> {
        let fee = params.fee_options();
        ensure_fee(&fee)?;

        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let chain = ctx.chain(&endpoint)?;
        let (source, program) = fetch_program(ctx, chain.as_ref(), &params.program_id).await?;
        ensure_function(&program, &params.function)?;

        let imports = ctx.resolve_imports(chain.as_ref(), &program).await?;
        let call = FunctionCall {
            program: &source,
            program_id: &program.id,
            function: &params.function,
            inputs: &params.inputs,
            private_key: &params.private_key,
            imports: &imports,
        };
        let keys = ctx.keys_for(&call).await?;
        let transaction_id = ctx.sdk().execute(&endpoint, &call, &fee, &keys).await?;

        info!("Execution transaction {} created for {}/{}", transaction_id, program.id, params.function);
        Ok(OperationOutput::ExecuteOnChain { transaction_id })
    }
}

#[async_trait]
impl OperationHandler for ExecuteOnChainHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::ExecuteOnChain
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::ExecuteOnChain(params) => self.execute(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

// ----------------------------------------------------------------------------
// Fee Estimation
// ----------------------------------------------------------------------------

pub struct ExecutionFeeHandler;

impl ExecutionFeeHandler {
    async fn estimate(&self, ctx: &ExecutorContext, params: ExecutionFeeParams) -> SnorkleResult<OperationOutput> {
        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let chain = ctx.chain(&endpoint)?;
        let (source, program) = fetch_program(ctx, chain.as_ref(), &params.program_id).await?;
        ensure_function(&program, &params.function)?;

        let imports = ctx.resolve_imports(chain.as_ref(), &program).await?;
        let call = FunctionCall {
            program: &source,
            program_id: &program.id,
            function: &params.function,
            inputs: &params.inputs,
            private_key: &params.private_key,
            imports: &imports,
        };
        let keys = ctx.keys_for(&call).await?;
        let microcredits = ctx.sdk().estimate_execution_fee(&endpoint, &call, &keys).await?;

        info!("Execution fee estimate for {}/{}: {} microcredits", program.id, params.function, microcredits);
        Ok(OperationOutput::ExecutionFee {
            credits: credits_from_microcredits(microcredits),
        })
    }
}

#[async_trait]
impl OperationHandler for ExecutionFeeHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::EstimateExecutionFee
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::EstimateExecutionFee(params) => self.estimate(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

pub struct DeploymentFeeHandler;

impl DeploymentFeeHandler {
    async fn estimate(&self, ctx: &ExecutorContext, params: DeploymentFeeParams) -> SnorkleResult<OperationOutput> {
        let program = ctx.sdk().parse_program(&params.program).await?;
        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let chain = ctx.chain(&endpoint)?;
        let imports = ctx.resolve_imports(chain.as_ref(), &program).await?;

        let microcredits = ctx.sdk().estimate_deployment_fee(&params.program, &imports).await?;

        info!("Deployment fee estimate for {}: {} microcredits", program.id, microcredits);
        Ok(OperationOutput::DeploymentFee {
            credits: credits_from_microcredits(microcredits),
        })
    }
}

#[async_trait]
impl OperationHandler for DeploymentFeeHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::EstimateDeploymentFee
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::EstimateDeploymentFee(params) => self.estimate(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

// ----------------------------------------------------------------------------
// Credits Transfers
// ----------------------------------------------------------------------------

pub struct TransferHandler;

impl TransferHandler {
    async fn transfer(&self, ctx: &ExecutorContext, params: TransferParams) -> SnorkleResult<OperationOutput> {
        ensure_positive("amount", params.amount_credits)?;
        let fee = params.fee_options();
        ensure_fee(&fee)?;

        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let transaction_id = ctx
            .sdk()
            .transfer(
                &endpoint,
                params.amount_credits,
                &params.recipient,
                params.transfer_type,
                params.amount_record.as_deref(),
                &fee,
                &params.private_key,
            )
            .await?;

        info!("Transfer transaction {} created ({})", transaction_id, params.transfer_type);
        Ok(OperationOutput::Transfer { transaction_id })
    }
}

#[async_trait]
impl OperationHandler for TransferHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Transfer
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::Transfer(params) => self.transfer(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

pub struct SplitHandler;

impl SplitHandler {
    async fn split(&self, ctx: &ExecutorContext, params: SplitParams) -> SnorkleResult<OperationOutput> {
        ensure_positive("split amount", params.split_amount)?;

        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let transaction_id = ctx
            .sdk()
            .split(&endpoint, params.split_amount, &params.record, &params.private_key)
            .await?;

        info!("Split transaction {} created", transaction_id);
        Ok(OperationOutput::Split { transaction_id })
    }
}

#[async_trait]
impl OperationHandler for SplitHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Split
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::Split(params) => self.split(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}

pub struct JoinHandler;

impl JoinHandler {
    async fn join(&self, ctx: &ExecutorContext, params: JoinParams) -> SnorkleResult<OperationOutput> {
        let fee = params.fee_options();
        ensure_fee(&fee)?;

        let endpoint = ctx.resolve_endpoint(params.endpoint.as_ref());
        let transaction_id = ctx
            .sdk()
            .join(&endpoint, &params.record_one, &params.record_two, &fee, &params.private_key)
            .await?;

        info!("Join transaction {} created", transaction_id);
        Ok(OperationOutput::Join { transaction_id })
    }
}

#[async_trait]
impl OperationHandler for JoinHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Join
    }

    async fn handle(&self, ctx: &ExecutorContext, request: OperationRequest) -> SnorkleResult<OperationOutput> {
        match request {
            OperationRequest::Join(params) => self.join(ctx, params).await,
            other => Err(mismatched(self.kind(), &other)),
        }
    }
}
