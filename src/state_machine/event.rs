//! Events that drive a call session

use crate::error::{FeedbackDispatchError, TransportRuntimeError, TransportStartError};
use crate::transcript::TranscriptRole;

/// Result of a feedback dispatch as seen by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Created { feedback_id: String },
    Failed { error: FeedbackDispatchError },
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User commands
    StartRequested,
    DisconnectRequested,

    // Transport callbacks
    CallStarted,
    CallEnded,
    TranscriptReceived {
        role: TranscriptRole,
        content: String,
    },
    SpeechStarted,
    SpeechEnded,
    TransportFailed {
        error: TransportRuntimeError,
    },

    // Completions of work the runtime started
    StartFailed {
        attempt: u32,
        error: TransportStartError,
    },
    ConnectTimedOut {
        attempt: u32,
    },
    FeedbackResolved {
        outcome: FeedbackOutcome,
    },
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::StartRequested => "start_requested",
            Event::DisconnectRequested => "disconnect_requested",
            Event::CallStarted => "call_started",
            Event::CallEnded => "call_ended",
            Event::TranscriptReceived { .. } => "transcript_received",
            Event::SpeechStarted => "speech_started",
            Event::SpeechEnded => "speech_ended",
            Event::TransportFailed { .. } => "transport_failed",
            Event::StartFailed { .. } => "start_failed",
            Event::ConnectTimedOut { .. } => "connect_timed_out",
            Event::FeedbackResolved { .. } => "feedback_resolved",
        }
    }
}
