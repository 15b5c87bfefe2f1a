//! Fixture programs, keys and request builders

use snorkle_core::{
    DeployParams, DeploymentFeeParams, ExecuteLocalParams, ExecuteOnChainParams,
    ExecutionFeeParams, JoinParams, OperationRequest, SplitParams, TransferParams, TransferType,
};

pub const TEST_PRIVATE_KEY: &str = "APrivateKey1zkpTestOnlyKeyDoNotUse";
pub const TEST_VIEW_KEY: &str = "AViewKey1zkpTestOnlyKeyDoNotUse";
pub const TEST_ADDRESS: &str = "aleo1zkpTestOnlyKeyDoNotUse";
pub const TEST_RECORD: &str = "{ owner: aleo1zkpTestOnlyKeyDoNotUse.private, microcredits: 5000000u64.private }";

pub const HELLO_PROGRAM: &str = "\
program hello_hello.aleo;

function hello:
    input r0 as u32.public;
    input r1 as u32.private;
    add r0 r1 into r2;
    output r2 as u32.private;

function goodbye:
    input r0 as u32.public;
    output r0 as u32.private;
";

/// Minimal program text that the mock SDK's parser understands
pub fn program_source(id: &str, functions: &[&str], imports: &[&str]) -> String {
    let mut source = String::new();
    for import in imports {
        source.push_str(&format!("import {};\n", import));
    }
    source.push_str(&format!("program {};\n", id));
    for function in functions {
        source.push_str(&format!("\nfunction {}:\n    input r0 as u32.public;\n    output r0 as u32.private;\n", function));
    }
    source
}

pub fn execute_local_request(program: &str, function: &str, inputs: &[&str]) -> OperationRequest {
    OperationRequest::ExecuteLocal(ExecuteLocalParams {
        program: program.to_string(),
        function: function.to_string(),
        inputs: inputs.iter().map(|i| i.to_string()).collect(),
        private_key: TEST_PRIVATE_KEY.to_string(),
    })
}

pub fn deploy_request(program: &str, fee: f64) -> OperationRequest {
    OperationRequest::Deploy(DeployParams {
        program: program.to_string(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        fee,
        private_fee: false,
        fee_record: None,
        endpoint: None,
    })
}

pub fn execute_on_chain_request(program_id: &str, function: &str, inputs: &[&str]) -> OperationRequest {
    OperationRequest::ExecuteOnChain(ExecuteOnChainParams {
        program_id: program_id.to_string(),
        function: function.to_string(),
        inputs: inputs.iter().map(|i| i.to_string()).collect(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        fee: 0.5,
        private_fee: false,
        fee_record: None,
        endpoint: None,
    })
}

pub fn execution_fee_request(program_id: &str, function: &str, inputs: &[&str]) -> OperationRequest {
    OperationRequest::EstimateExecutionFee(ExecutionFeeParams {
        program_id: program_id.to_string(),
        function: function.to_string(),
        inputs: inputs.iter().map(|i| i.to_string()).collect(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        endpoint: None,
    })
}

pub fn deployment_fee_request(program: &str) -> OperationRequest {
    OperationRequest::EstimateDeploymentFee(DeploymentFeeParams {
        program: program.to_string(),
        endpoint: None,
    })
}

pub fn transfer_request(amount_credits: f64, transfer_type: TransferType) -> OperationRequest {
    OperationRequest::Transfer(TransferParams {
        amount_credits,
        recipient: TEST_ADDRESS.to_string(),
        transfer_type,
        amount_record: None,
        fee: 0.1,
        private_fee: false,
        fee_record: None,
        private_key: TEST_PRIVATE_KEY.to_string(),
        endpoint: None,
    })
}

pub fn split_request(split_amount: f64) -> OperationRequest {
    OperationRequest::Split(SplitParams {
        split_amount,
        record: TEST_RECORD.to_string(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        endpoint: None,
    })
}

pub fn join_request() -> OperationRequest {
    OperationRequest::Join(JoinParams {
        record_one: TEST_RECORD.to_string(),
        record_two: TEST_RECORD.to_string(),
        fee: 0.1,
        private_fee: false,
        fee_record: None,
        private_key: TEST_PRIVATE_KEY.to_string(),
        endpoint: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use snorkle_core::OperationKind;

    #[test]
    fn test_program_source_layout() {
        let source = program_source("child.aleo", &["main"], &["parent.aleo"]);
        assert!(source.starts_with("import parent.aleo;\nprogram child.aleo;"));
        assert!(source.contains("function main:"));
    }

    #[test]
    fn test_builders_produce_matching_kinds() {
        assert_eq!(deploy_request(HELLO_PROGRAM, 1.0).kind(), OperationKind::Deploy);
        assert_eq!(split_request(1.0).kind(), OperationKind::Split);
        assert_eq!(join_request().kind(), OperationKind::Join);
        assert_eq!(
            transfer_request(1.0, TransferType::Public).kind(),
            OperationKind::Transfer
        );
    }
}
