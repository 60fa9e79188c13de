//! API request and response types

use crate::state_machine::{CallTargets, SessionContext, SessionMode};
use serde::{Deserialize, Serialize};

/// Request to open a call session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub mode: SessionMode,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub interview_id: Option<String>,
    /// Set when retaking an interview that already has feedback
    pub feedback_id: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

impl CreateSessionRequest {
    pub fn into_context(self, targets: CallTargets) -> SessionContext {
        SessionContext {
            mode: self.mode,
            user_id: self.user_id,
            user_name: self.user_name,
            interview_id: self.interview_id,
            feedback_id: self.feedback_id,
            questions: self.questions,
            targets,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Response for queued session commands
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for relayed transport events
#[derive(Debug, Serialize)]
pub struct RelayResponse {
    /// Listeners that received the event
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
