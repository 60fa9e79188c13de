//! Effects produced by state transitions

use super::state::{CallRequest, NavigationIntent};
use crate::error::FeedbackDispatchError;
use crate::transcript::TranscriptRole;

/// Side-effect intents executed by the runtime after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the transport to start the call (async, reports back via events)
    StartCall { request: CallRequest, attempt: u32 },

    /// Ask the transport to stop the call
    StopCall,

    /// Arm the connect timeout for a start attempt
    ScheduleConnectTimeout { attempt: u32 },

    /// Append a finalized utterance to the transcript
    AppendTranscript {
        role: TranscriptRole,
        content: String,
    },

    /// Invoke the feedback collaborator with the full transcript
    RequestFeedback {
        interview_id: String,
        user_id: String,
        feedback_id: Option<String>,
    },

    /// Record a non-fatal dispatch failure
    LogDispatchFailure { error: FeedbackDispatchError },

    /// Hand a navigation intent to the hosting UI
    Navigate { intent: NavigationIntent },

    /// Broadcast the new state to connected clients
    NotifyState,

    /// Surface a message to the user
    NotifyError { message: String },
}

impl Effect {
    pub fn navigate_home() -> Self {
        Effect::Navigate {
            intent: NavigationIntent::NavigateHome,
        }
    }

    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::NotifyError {
            message: message.into(),
        }
    }
}
