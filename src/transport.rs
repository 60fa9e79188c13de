//! Voice call transport boundary
//!
//! The live call is an external, untrusted event source. Everything it emits is
//! parsed here into typed [`TransportEvent`]s and normalized into state machine
//! [`Event`]s before it reaches the session runtime.

mod hub;
mod relay;

pub use hub::{EventHub, Subscription};
pub use relay::{RelayCommand, RelayTransport};

use crate::error::TransportRuntimeError;
use crate::state_machine::Event;
use crate::transcript::TranscriptRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Options passed along with a start command
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    pub variable_values: BTreeMap<String, String>,
}

/// Whether a transcript segment may still change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    Partial,
    Final,
}

/// Content messages carried by a `message` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransportMessage {
    Transcript {
        #[serde(rename = "transcriptType")]
        transcript_type: TranscriptType,
        role: TranscriptRole,
        transcript: String,
    },
    /// Function calls, status updates, model output and whatever else the agent sends
    #[serde(other)]
    Other,
}

/// Events a call transport emits, in wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransportEvent {
    CallStart,
    CallEnd,
    Message { message: TransportMessage },
    SpeechStart,
    SpeechEnd,
    /// Error payloads have no fixed shape
    Error {
        #[serde(default)]
        error: Value,
    },
}

impl TransportEvent {
    /// Convert into a state machine event. Returns `None` for messages that
    /// never reach the transcript (partials, non-transcript messages).
    pub fn into_event(self) -> Option<Event> {
        match self {
            TransportEvent::CallStart => Some(Event::CallStarted),
            TransportEvent::CallEnd => Some(Event::CallEnded),
            TransportEvent::SpeechStart => Some(Event::SpeechStarted),
            TransportEvent::SpeechEnd => Some(Event::SpeechEnded),
            TransportEvent::Message {
                message:
                    TransportMessage::Transcript {
                        transcript_type: TranscriptType::Final,
                        role,
                        transcript,
                    },
            } => Some(Event::TranscriptReceived {
                role,
                content: transcript,
            }),
            TransportEvent::Message { .. } => None,
            TransportEvent::Error { error } => Some(Event::TransportFailed {
                error: TransportRuntimeError::from_raw(&error),
            }),
        }
    }
}
