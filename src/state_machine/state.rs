//! Call session state types

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Call lifecycle
// ============================================================================

/// Lifecycle of the live voice call.
///
/// `Inactive -> Connecting -> Active -> Finished`. `Finished` is terminal; a new
/// call needs a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Inactive,
    Connecting,
    Active,
    Finished,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Finished)
    }

    /// A call is live while the transport may still be carrying audio
    pub fn is_live(self) -> bool {
        matches!(self, CallState::Connecting | CallState::Active)
    }
}

/// Where the user goes once the session is over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationIntent {
    NavigateHome,
    NavigateToFeedback {
        interview_id: String,
        feedback_id: String,
    },
}

impl NavigationIntent {
    /// Route the hosting UI should push
    pub fn path(&self) -> String {
        match self {
            NavigationIntent::NavigateHome => "/".to_string(),
            NavigationIntent::NavigateToFeedback { interview_id, .. } => {
                format!("/interview/{interview_id}/feedback")
            }
        }
    }
}

/// Post-session dispatcher progress. Moves forward only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchStatus {
    #[default]
    Idle,
    /// Feedback request in flight
    Pending { interview_id: String },
    Resolved { intent: NavigationIntent },
}

/// Full machine state, broadcast to clients on every change
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub call: CallState,
    pub is_agent_speaking: bool,
    pub dispatch: DispatchStatus,
    /// Incremented by every accepted start; stale connect timeouts carry an older value
    pub connect_attempt: u32,
    /// Most recent user-visible failure, cleared on the next start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished with the post-session outcome decided; nothing further can happen
    pub fn is_settled(&self) -> bool {
        self.call.is_terminal() && matches!(self.dispatch, DispatchStatus::Resolved { .. })
    }

    #[cfg(test)]
    pub fn with_call(mut self, call: CallState) -> Self {
        self.call = call;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchStatus) -> Self {
        self.dispatch = dispatch;
        self
    }
}

// ============================================================================
// Session configuration
// ============================================================================

/// Fixed at session creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Talk through a new interview script; nothing is scored
    Generate,
    /// Conduct an existing interview and score it afterwards
    Interview,
}

/// Opaque call target identifiers supplied by configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallTargets {
    /// Workflow used by `Generate` sessions
    pub workflow_id: Option<String>,
    /// Interviewer agent used by `Interview` sessions
    pub interviewer_id: String,
}

/// Who is practicing and what they practice. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub mode: SessionMode,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub interview_id: Option<String>,
    pub feedback_id: Option<String>,
    pub questions: Vec<String>,
    pub targets: CallTargets,
}

/// What the transport is asked to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub target: String,
    pub variable_values: BTreeMap<String, String>,
}

impl SessionContext {
    pub fn new(mode: SessionMode, targets: CallTargets) -> Self {
        Self {
            mode,
            user_id: None,
            user_name: None,
            interview_id: None,
            feedback_id: None,
            questions: Vec::new(),
            targets,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_interview(mut self, interview_id: impl Into<String>) -> Self {
        self.interview_id = Some(interview_id.into());
        self
    }

    pub fn with_questions(mut self, questions: Vec<String>) -> Self {
        self.questions = questions;
        self
    }

    /// Check everything `start()` needs and build the mode-specific call
    /// parameters. No transport call may happen when this fails.
    pub fn call_request(&self) -> Result<CallRequest, ConfigurationError> {
        match self.mode {
            SessionMode::Generate => {
                let user_id = non_blank(self.user_id.as_deref())
                    .ok_or(ConfigurationError::MissingUserId)?;
                let workflow_id = non_blank(self.targets.workflow_id.as_deref())
                    .ok_or(ConfigurationError::MissingWorkflowId)?;
                let user_name = non_blank(self.user_name.as_deref()).unwrap_or("User");

                let mut variable_values = BTreeMap::new();
                variable_values.insert("username".to_string(), user_name.to_string());
                variable_values.insert("userid".to_string(), user_id.to_string());
                Ok(CallRequest {
                    target: workflow_id.to_string(),
                    variable_values,
                })
            }
            SessionMode::Interview => {
                let interviewer_id = non_blank(Some(self.targets.interviewer_id.as_str()))
                    .ok_or(ConfigurationError::MissingInterviewerId)?;

                let mut variable_values = BTreeMap::new();
                variable_values.insert("questions".to_string(), format_questions(&self.questions));
                Ok(CallRequest {
                    target: interviewer_id.to_string(),
                    variable_values,
                })
            }
        }
    }
}

/// One `- question` line per question, in order, newline separated
pub fn format_questions(questions: &[String]) -> String {
    questions
        .iter()
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
