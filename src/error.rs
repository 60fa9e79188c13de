//! Session error taxonomy
//!
//! Every transport or network failure is converted into one of these at the
//! boundary where it occurs. None of them terminate the process.

use serde_json::Value;
use thiserror::Error;

/// Fallback shown when a start failure carries nothing readable
pub const DEFAULT_START_FAILURE: &str = "Failed to start call. Please try again.";

/// A required identifier was missing at `start()`. Fail-fast, no transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("userId is required to generate an interview")]
    MissingUserId,
    #[error("Voice workflow ID is missing. Please check your environment variables.")]
    MissingWorkflowId,
    #[error("Interviewer ID is missing. Please check your environment variables.")]
    MissingInterviewerId,
}

/// The transport handle could not be constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportInitError {
    #[error("voice web token is not configured")]
    MissingCredential,
}

/// The transport's asynchronous start call was rejected.
///
/// Built from whatever shape the transport handed back; see [`TransportStartError::from_raw`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to start call: {message}")]
pub struct TransportStartError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<String>,
}

impl TransportStartError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Best-effort extraction of `message`, `code` and `status` from an
    /// arbitrary error payload. A nested `error` object wins over top-level
    /// fields, a scalar `error` becomes the message.
    pub fn from_raw(raw: &Value) -> Self {
        let details = ErrorDetails::extract(raw);
        let message = details
            .message
            .or_else(|| details.code.clone())
            .or_else(|| match raw {
                Value::Object(map) if !map.is_empty() => Some(raw.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| DEFAULT_START_FAILURE.to_string());

        Self {
            message,
            code: details.code,
            status: details.status,
        }
    }
}

/// The transport emitted an `error` event after starting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Call error: {message}")]
pub struct TransportRuntimeError {
    pub message: String,
    pub code: Option<String>,
}

impl TransportRuntimeError {
    pub fn from_raw(raw: &Value) -> Self {
        let details = ErrorDetails::extract(raw);
        Self {
            message: details
                .message
                .unwrap_or_else(|| "voice call reported an error".to_string()),
            code: details.code,
        }
    }
}

/// The post-session feedback dispatch did not produce a feedback record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackDispatchError {
    #[error("interviewId is required to generate feedback")]
    MissingInterviewId,
    #[error("userId is required to generate feedback")]
    MissingUserId,
    #[error("feedback service reported failure")]
    Rejected,
    #[error("feedback service returned success without a feedback id")]
    MissingFeedbackId,
    #[error("feedback service did not answer within {0} seconds")]
    TimedOut(u64),
}

/// Fields pulled out of a heterogeneous error payload
#[derive(Debug, Default)]
struct ErrorDetails {
    message: Option<String>,
    code: Option<String>,
    status: Option<String>,
}

impl ErrorDetails {
    fn extract(raw: &Value) -> Self {
        match raw {
            Value::String(s) if !s.trim().is_empty() => Self {
                message: Some(s.clone()),
                ..Self::default()
            },
            Value::Object(map) => {
                let top = Self {
                    message: map.get("message").and_then(scalar_text),
                    code: map.get("code").and_then(scalar_text),
                    status: map
                        .get("status")
                        .and_then(scalar_text)
                        .or_else(|| map.get("statusText").and_then(scalar_text)),
                };
                match map.get("error") {
                    Some(nested @ Value::Object(_)) => {
                        let inner = Self::extract(nested);
                        Self {
                            message: inner.message.or(top.message),
                            code: inner.code.or(top.code),
                            status: inner.status.or(top.status),
                        }
                    }
                    Some(scalar) => Self {
                        message: scalar_text(scalar).or(top.message),
                        ..top
                    },
                    None => top,
                }
            }
            _ => Self::default(),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
