//! Wire protocol
//!
//! Every frame is a JSON object with a `type` tag. Requests and results carry a
//! `correlationId` alongside their camelCase payload fields:
//!
//! ```text
//! bridge → executor   ALEO_* { correlationId, ...params }
//!                     CANCEL { correlationId }
//! executor → bridge   ALEO_WORKER_READY
//!                     WORKER_FAILED { reason }
//!                     *_COMPLETED { correlationId, ...output }
//!                     ERROR { correlationId, errorMessage, errorClass }
//!                     ABORTED { correlationId, reason }
//! ```

use serde_json::{json, Map, Value};

use crate::errors::{ErrorClass, SnorkleError};
use crate::operation::{OperationKind, OperationOutput, OperationRequest, OperationResult};
use crate::types::CorrelationId;

pub const READY_TAG: &str = "ALEO_WORKER_READY";
pub const FAILED_TAG: &str = "WORKER_FAILED";
pub const ERROR_TAG: &str = "ERROR";
pub const ABORTED_TAG: &str = "ABORTED";
pub const CANCEL_TAG: &str = "CANCEL";

const TYPE_FIELD: &str = "type";
const CORRELATION_FIELD: &str = "correlationId";

// ----------------------------------------------------------------------------
// Frame Errors
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("Malformed frame: {reason}")]
    Malformed { reason: String },

    #[error("Frame of type {tag} has no correlation id")]
    MissingCorrelation { tag: String },

    #[error("Unknown operation: {tag}")]
    UnknownType { correlation_id: CorrelationId, tag: String },

    #[error("Invalid payload: {reason}")]
    InvalidPayload { correlation_id: CorrelationId, reason: String },
}

impl FrameError {
    /// Correlation id recovered from the frame, if it was readable
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            FrameError::UnknownType { correlation_id, .. }
            | FrameError::InvalidPayload { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        }
    }

    /// Error result to post back for a request frame that failed to decode
    pub fn to_result(&self) -> OperationResult {
        let class = match self {
            FrameError::UnknownType { .. } => ErrorClass::UnknownOperation,
            _ => ErrorClass::Protocol,
        };
        OperationResult::Error {
            message: self.to_string(),
            class,
        }
    }
}

impl From<FrameError> for SnorkleError {
    fn from(error: FrameError) -> Self {
        SnorkleError::protocol(error.to_string())
    }
}

// ----------------------------------------------------------------------------
// Bridge → Executor
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ToExecutor {
    Operation {
        correlation_id: CorrelationId,
        request: OperationRequest,
    },
    Cancel {
        correlation_id: CorrelationId,
    },
}

impl ToExecutor {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            ToExecutor::Operation { correlation_id, .. } | ToExecutor::Cancel { correlation_id } => {
                *correlation_id
            }
        }
    }

    pub fn encode(&self) -> Result<String, SnorkleError> {
        let value = match self {
            ToExecutor::Operation {
                correlation_id,
                request,
            } => with_correlation(serde_json::to_value(request)?, *correlation_id)?,
            ToExecutor::Cancel { correlation_id } => json!({
                TYPE_FIELD: CANCEL_TAG,
                CORRELATION_FIELD: correlation_id,
            }),
        };
        Ok(serde_json::to_string(&value)?)
    }

    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let (tag, object) = parse_object(frame)?;
        let correlation_id = read_correlation(&object, &tag)?;

        if tag == CANCEL_TAG {
            return Ok(ToExecutor::Cancel { correlation_id });
        }
        if OperationKind::from_request_tag(&tag).is_none() {
            return Err(FrameError::UnknownType { correlation_id, tag });
        }

        let request = serde_json::from_value(Value::Object(object)).map_err(|e| {
            FrameError::InvalidPayload {
                correlation_id,
                reason: e.to_string(),
            }
        })?;
        Ok(ToExecutor::Operation {
            correlation_id,
            request,
        })
    }
}

// ----------------------------------------------------------------------------
// Executor → Bridge
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorMessage {
    /// SDK initialized; requests are now served
    Ready,
    /// SDK initialization failed; the executor has stopped
    Failed { reason: String },
    /// Terminal result for one request
    Result {
        correlation_id: CorrelationId,
        result: OperationResult,
    },
}

impl ExecutorMessage {
    pub fn encode(&self) -> Result<String, SnorkleError> {
        let value = match self {
            ExecutorMessage::Ready => json!({ TYPE_FIELD: READY_TAG }),
            ExecutorMessage::Failed { reason } => json!({
                TYPE_FIELD: FAILED_TAG,
                "reason": reason,
            }),
            ExecutorMessage::Result {
                correlation_id,
                result,
            } => match result {
                OperationResult::Completed(output) => {
                    with_correlation(serde_json::to_value(output)?, *correlation_id)?
                }
                OperationResult::Error { message, class } => json!({
                    TYPE_FIELD: ERROR_TAG,
                    CORRELATION_FIELD: correlation_id,
                    "errorMessage": message,
                    "errorClass": class,
                }),
                OperationResult::Aborted { reason } => json!({
                    TYPE_FIELD: ABORTED_TAG,
                    CORRELATION_FIELD: correlation_id,
                    "reason": reason,
                }),
            },
        };
        Ok(serde_json::to_string(&value)?)
    }

    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let (tag, object) = parse_object(frame)?;

        match tag.as_str() {
            READY_TAG => Ok(ExecutorMessage::Ready),
            FAILED_TAG => Ok(ExecutorMessage::Failed {
                reason: read_string(&object, "reason").unwrap_or_default(),
            }),
            ERROR_TAG => {
                let correlation_id = read_correlation(&object, &tag)?;
                let class = object
                    .get("errorClass")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or(ErrorClass::Operation);
                Ok(ExecutorMessage::Result {
                    correlation_id,
                    result: OperationResult::Error {
                        message: read_string(&object, "errorMessage").unwrap_or_default(),
                        class,
                    },
                })
            }
            ABORTED_TAG => {
                let correlation_id = read_correlation(&object, &tag)?;
                Ok(ExecutorMessage::Result {
                    correlation_id,
                    result: OperationResult::Aborted {
                        reason: read_string(&object, "reason").unwrap_or_default(),
                    },
                })
            }
            _ => {
                let correlation_id = read_correlation(&object, &tag)?;
                if OperationKind::from_completion_tag(&tag).is_none() {
                    return Err(FrameError::UnknownType { correlation_id, tag });
                }
                let output: OperationOutput = serde_json::from_value(Value::Object(object))
                    .map_err(|e| FrameError::InvalidPayload {
                        correlation_id,
                        reason: e.to_string(),
                    })?;
                Ok(ExecutorMessage::Result {
                    correlation_id,
                    result: OperationResult::Completed(output),
                })
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn with_correlation(value: Value, correlation_id: CorrelationId) -> Result<Value, SnorkleError> {
    match value {
        Value::Object(mut object) => {
            object.insert(CORRELATION_FIELD.to_string(), json!(correlation_id));
            Ok(Value::Object(object))
        }
        other => Err(SnorkleError::protocol(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn parse_object(frame: &str) -> Result<(String, Map<String, Value>), FrameError> {
    let value: Value = serde_json::from_str(frame).map_err(|e| FrameError::Malformed {
        reason: e.to_string(),
    })?;
    let Value::Object(object) = value else {
        return Err(FrameError::Malformed {
            reason: "frame is not a JSON object".into(),
        });
    };
    let tag = read_string(&object, TYPE_FIELD).ok_or_else(|| FrameError::Malformed {
        reason: "frame has no type tag".into(),
    })?;
    Ok((tag, object))
}

fn read_correlation(object: &Map<String, Value>, tag: &str) -> Result<CorrelationId, FrameError> {
    object
        .get(CORRELATION_FIELD)
        .and_then(Value::as_u64)
        .map(CorrelationId::new)
        .ok_or_else(|| FrameError::MissingCorrelation {
            tag: tag.to_string(),
        })
}

fn read_string(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
