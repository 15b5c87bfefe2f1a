//! Bridge operations
//!
//! The closed set of operations the executor understands, the typed payload
//! each one carries, and the terminal result posted for it. Request and output
//! enums are internally tagged so that the JSON form matches the wire protocol
//! directly: `{"type": "ALEO_DEPLOY", "program": ..., ...}`.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::chain::ChainEndpoint;
use crate::errors::{ErrorClass, SnorkleError, SnorkleResult};
use crate::types::TransferType;

/// Microcredits in one Aleo credit
pub const MICROCREDITS_PER_CREDIT: u64 = 1_000_000;

/// Flat amount added to every fee estimate before it is shown to the caller
pub const FEE_DISPLAY_SURCHARGE_CREDITS: f64 = 0.01;

/// Convert an SDK fee estimate to the credits figure reported to callers
pub fn credits_from_microcredits(microcredits: u64) -> f64 {
    microcredits as f64 / MICROCREDITS_PER_CREDIT as f64 + FEE_DISPLAY_SURCHARGE_CREDITS
}

// ----------------------------------------------------------------------------
// Operation Kinds
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Deploy,
    ExecuteLocal,
    ExecuteOnChain,
    EstimateExecutionFee,
    EstimateDeploymentFee,
    Transfer,
    Split,
    Join,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Deploy,
        OperationKind::ExecuteLocal,
        OperationKind::ExecuteOnChain,
        OperationKind::EstimateExecutionFee,
        OperationKind::EstimateDeploymentFee,
        OperationKind::Transfer,
        OperationKind::Split,
        OperationKind::Join,
    ];

    /// `type` tag of the request frame
    pub fn request_tag(&self) -> &'static str {
        match self {
            OperationKind::Deploy => "ALEO_DEPLOY",
            OperationKind::ExecuteLocal => "ALEO_EXECUTE_PROGRAM_LOCAL",
            OperationKind::ExecuteOnChain => "ALEO_EXECUTE_PROGRAM_ON_CHAIN",
            OperationKind::EstimateExecutionFee => "ALEO_ESTIMATE_EXECUTION_FEE",
            OperationKind::EstimateDeploymentFee => "ALEO_ESTIMATE_DEPLOYMENT_FEE",
            OperationKind::Transfer => "ALEO_TRANSFER",
            OperationKind::Split => "ALEO_SPLIT",
            OperationKind::Join => "ALEO_JOIN",
        }
    }

    /// `type` tag of the success frame
    pub fn completion_tag(&self) -> &'static str {
        match self {
            OperationKind::Deploy => "DEPLOY_TRANSACTION_COMPLETED",
            OperationKind::ExecuteLocal => "OFFLINE_EXECUTION_COMPLETED",
            OperationKind::ExecuteOnChain => "EXECUTION_TRANSACTION_COMPLETED",
            OperationKind::EstimateExecutionFee => "EXECUTION_FEE_ESTIMATION_COMPLETED",
            OperationKind::EstimateDeploymentFee => "DEPLOYMENT_FEE_ESTIMATION_COMPLETED",
            OperationKind::Transfer => "TRANSFER_TRANSACTION_COMPLETED",
            OperationKind::Split => "SPLIT_TRANSACTION_COMPLETED",
            OperationKind::Join => "JOIN_TRANSACTION_COMPLETED",
        }
    }

    pub fn from_request_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.request_tag() == tag)
    }

    pub fn from_completion_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.completion_tag() == tag)
    }

    /// Short name used in logs and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deploy => "deploy",
            OperationKind::ExecuteLocal => "execute-local",
            OperationKind::ExecuteOnChain => "execute-on-chain",
            OperationKind::EstimateExecutionFee => "estimate-execution-fee",
            OperationKind::EstimateDeploymentFee => "estimate-deployment-fee",
            OperationKind::Transfer => "transfer",
            OperationKind::Split => "split",
            OperationKind::Join => "join",
        }
    }

    /// Whether the operation broadcasts a transaction
    pub fn is_transaction(&self) -> bool {
        matches!(
            self,
            OperationKind::Deploy
                | OperationKind::ExecuteOnChain
                | OperationKind::Transfer
                | OperationKind::Split
                | OperationKind::Join
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = SnorkleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.request_tag() == s)
            .ok_or_else(|| SnorkleError::UnknownOperation {
                operation: s.to_string(),
            })
    }
}

// ----------------------------------------------------------------------------
// Payloads
// ----------------------------------------------------------------------------

/// Fee settings shared by every transaction-producing operation
#[derive(Debug, Clone, PartialEq)]
pub struct FeeOptions {
    /// Fee in credits
    pub fee: f64,
    pub private_fee: bool,
    pub fee_record: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployParams {
    pub program: String,
    pub private_key: String,
    pub fee: f64,
    #[serde(default)]
    pub private_fee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteLocalParams {
    #[serde(rename = "localProgram")]
    pub program: String,
    #[serde(rename = "aleoFunction")]
    pub function: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOnChainParams {
    #[serde(rename = "remoteProgram")]
    pub program_id: String,
    #[serde(rename = "aleoFunction")]
    pub function: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub private_key: String,
    pub fee: f64,
    #[serde(default)]
    pub private_fee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFeeParams {
    #[serde(rename = "remoteProgram")]
    pub program_id: String,
    #[serde(rename = "aleoFunction")]
    pub function: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentFeeParams {
    pub program: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    pub amount_credits: f64,
    pub recipient: String,
    #[serde(rename = "transfer_type")]
    pub transfer_type: TransferType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_record: Option<String>,
    pub fee: f64,
    #[serde(default)]
    pub private_fee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_record: Option<String>,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitParams {
    pub split_amount: f64,
    pub record: String,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    pub record_one: String,
    pub record_two: String,
    pub fee: f64,
    #[serde(default)]
    pub private_fee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_record: Option<String>,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ChainEndpoint>,
}

macro_rules! impl_fee_options {
    ($($params:ty),* $(,)?) => {
        $(
            impl $params {
                pub fn fee_options(&self) -> FeeOptions {
                    FeeOptions {
                        fee: self.fee,
                        private_fee: self.private_fee,
                        fee_record: self.fee_record.clone(),
                    }
                }
            }
        )*
    };
}

impl_fee_options!(DeployParams, ExecuteOnChainParams, TransferParams, JoinParams);

// ----------------------------------------------------------------------------
// Requests
// ----------------------------------------------------------------------------

/// A request for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationRequest {
    #[serde(rename = "ALEO_DEPLOY")]
    Deploy(DeployParams),
    #[serde(rename = "ALEO_EXECUTE_PROGRAM_LOCAL")]
    ExecuteLocal(ExecuteLocalParams),
    #[serde(rename = "ALEO_EXECUTE_PROGRAM_ON_CHAIN")]
    ExecuteOnChain(ExecuteOnChainParams),
    #[serde(rename = "ALEO_ESTIMATE_EXECUTION_FEE")]
    EstimateExecutionFee(ExecutionFeeParams),
    #[serde(rename = "ALEO_ESTIMATE_DEPLOYMENT_FEE")]
    EstimateDeploymentFee(DeploymentFeeParams),
    #[serde(rename = "ALEO_TRANSFER")]
    Transfer(TransferParams),
    #[serde(rename = "ALEO_SPLIT")]
    Split(SplitParams),
    #[serde(rename = "ALEO_JOIN")]
    Join(JoinParams),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Deploy(_) => OperationKind::Deploy,
            OperationRequest::ExecuteLocal(_) => OperationKind::ExecuteLocal,
            OperationRequest::ExecuteOnChain(_) => OperationKind::ExecuteOnChain,
            OperationRequest::EstimateExecutionFee(_) => OperationKind::EstimateExecutionFee,
            OperationRequest::EstimateDeploymentFee(_) => OperationKind::EstimateDeploymentFee,
            OperationRequest::Transfer(_) => OperationKind::Transfer,
            OperationRequest::Split(_) => OperationKind::Split,
            OperationRequest::Join(_) => OperationKind::Join,
        }
    }

    /// Endpoint override carried by the request, if any
    pub fn endpoint(&self) -> Option<&ChainEndpoint> {
        match self {
            OperationRequest::Deploy(p) => p.endpoint.as_ref(),
            OperationRequest::ExecuteLocal(_) => None,
            OperationRequest::ExecuteOnChain(p) => p.endpoint.as_ref(),
            OperationRequest::EstimateExecutionFee(p) => p.endpoint.as_ref(),
            OperationRequest::EstimateDeploymentFee(p) => p.endpoint.as_ref(),
            OperationRequest::Transfer(p) => p.endpoint.as_ref(),
            OperationRequest::Split(p) => p.endpoint.as_ref(),
            OperationRequest::Join(p) => p.endpoint.as_ref(),
        }
    }
}

// ----------------------------------------------------------------------------
// Outputs & Results
// ----------------------------------------------------------------------------

/// Outputs of a local run plus its execution transcript (empty when none)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalExecution {
    pub outputs: Vec<String>,
    #[serde(default)]
    pub execution: String,
}

/// Successful value of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationOutput {
    #[serde(rename = "DEPLOY_TRANSACTION_COMPLETED")]
    Deploy {
        #[serde(rename = "deployTransaction")]
        transaction_id: String,
    },
    #[serde(rename = "OFFLINE_EXECUTION_COMPLETED")]
    ExecuteLocal { outputs: LocalExecution },
    #[serde(rename = "EXECUTION_TRANSACTION_COMPLETED")]
    ExecuteOnChain {
        #[serde(rename = "executeTransaction")]
        transaction_id: String,
    },
    #[serde(rename = "EXECUTION_FEE_ESTIMATION_COMPLETED")]
    ExecutionFee {
        #[serde(rename = "executionFee")]
        credits: f64,
    },
    #[serde(rename = "DEPLOYMENT_FEE_ESTIMATION_COMPLETED")]
    DeploymentFee {
        #[serde(rename = "deploymentFee")]
        credits: f64,
    },
    #[serde(rename = "TRANSFER_TRANSACTION_COMPLETED")]
    Transfer {
        #[serde(rename = "transferTransaction")]
        transaction_id: String,
    },
    #[serde(rename = "SPLIT_TRANSACTION_COMPLETED")]
    Split {
        #[serde(rename = "splitTransaction")]
        transaction_id: String,
    },
    #[serde(rename = "JOIN_TRANSACTION_COMPLETED")]
    Join {
        #[serde(rename = "joinTransaction")]
        transaction_id: String,
    },
}

impl OperationOutput {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationOutput::Deploy { .. } => OperationKind::Deploy,
            OperationOutput::ExecuteLocal { .. } => OperationKind::ExecuteLocal,
            OperationOutput::ExecuteOnChain { .. } => OperationKind::ExecuteOnChain,
            OperationOutput::ExecutionFee { .. } => OperationKind::EstimateExecutionFee,
            OperationOutput::DeploymentFee { .. } => OperationKind::EstimateDeploymentFee,
            OperationOutput::Transfer { .. } => OperationKind::Transfer,
            OperationOutput::Split { .. } => OperationKind::Split,
            OperationOutput::Join { .. } => OperationKind::Join,
        }
    }

    /// Transaction id for operations that broadcast one
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            OperationOutput::Deploy { transaction_id }
            | OperationOutput::ExecuteOnChain { transaction_id }
            | OperationOutput::Transfer { transaction_id }
            | OperationOutput::Split { transaction_id }
            | OperationOutput::Join { transaction_id } => Some(transaction_id),
            _ => None,
        }
    }

    /// Fee estimate in credits for the estimation operations
    pub fn fee_credits(&self) -> Option<f64> {
        match self {
            OperationOutput::ExecutionFee { credits } | OperationOutput::DeploymentFee { credits } => {
                Some(*credits)
            }
            _ => None,
        }
    }
}

/// Terminal outcome of one request
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Completed(OperationOutput),
    Error { message: String, class: ErrorClass },
    Aborted { reason: String },
}

impl OperationResult {
    pub fn from_error(error: &SnorkleError) -> Self {
        OperationResult::Error {
            message: error.to_string(),
            class: error.class(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, OperationResult::Completed(_))
    }

    /// Convert to the caller-facing result
    pub fn into_output(self) -> Result<OperationOutput, SnorkleError> {
        match self {
            OperationResult::Completed(output) => Ok(output),
            OperationResult::Error { message, class } => {
                Err(SnorkleError::Rejected { class, message })
            }
            OperationResult::Aborted { reason } => Err(SnorkleError::Aborted { reason }),
        }
    }
}

impl From<SnorkleResult<OperationOutput>> for OperationResult {
    fn from(result: SnorkleResult<OperationOutput>) -> Self {
        match result {
            Ok(output) => OperationResult::Completed(output),
            Err(error) => OperationResult::from_error(&error),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tags_are_unique_and_reversible() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_request_tag(kind.request_tag()), Some(kind));
            assert_eq!(OperationKind::from_completion_tag(kind.completion_tag()), Some(kind));
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert_eq!(OperationKind::from_request_tag("ALEO_MINT"), None);
    }

    #[test]
    fn test_request_serializes_with_wire_field_names() {
        let request = OperationRequest::ExecuteLocal(ExecuteLocalParams {
            program: "program hello.aleo;".into(),
            function: "main".into(),
            inputs: vec!["1u32".into(), "2u32".into()],
            private_key: "APrivateKey1zkp".into(),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "ALEO_EXECUTE_PROGRAM_LOCAL");
        assert_eq!(value["localProgram"], "program hello.aleo;");
        assert_eq!(value["aleoFunction"], "main");
        assert_eq!(value["privateKey"], "APrivateKey1zkp");
    }

    #[test]
    fn test_transfer_accepts_original_field_names() {
        let value = json!({
            "type": "ALEO_TRANSFER",
            "amountCredits": 1.5,
            "recipient": "aleo1xyz",
            "transfer_type": "public",
            "fee": 0.2,
            "privateFee": false,
            "privateKey": "APrivateKey1zkp"
        });
        let request: OperationRequest = serde_json::from_value(value).unwrap();
        match request {
            OperationRequest::Transfer(params) => {
                assert_eq!(params.transfer_type, TransferType::Public);
                assert_eq!(params.amount_record, None);
                assert_eq!(params.endpoint, None);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_fee_conversion() {
        assert_eq!(credits_from_microcredits(2_500_000), 2.5 + 0.01);
        assert_eq!(credits_from_microcredits(0), 0.01);
    }

    #[test]
    fn test_output_serialization() {
        let output = OperationOutput::ExecutionFee { credits: 1.01 };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value, json!({"type": "EXECUTION_FEE_ESTIMATION_COMPLETED", "executionFee": 1.01}));

        let local = OperationOutput::ExecuteLocal {
            outputs: LocalExecution {
                outputs: vec!["3u32".into()],
                execution: String::new(),
            },
        };
        let value = serde_json::to_value(&local).unwrap();
        assert_eq!(value["outputs"]["outputs"][0], "3u32");
        assert_eq!(value["outputs"]["execution"], "");
    }

    #[test]
    fn test_error_result_keeps_class() {
        let result = OperationResult::Error {
            message: "Unknown operation: ALEO_MINT".into(),
            class: ErrorClass::UnknownOperation,
        };
        let err = result.into_output().unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnknownOperation);
        assert_eq!(err.to_string(), "Unknown operation: ALEO_MINT");
    }
}
