//! Session transcript accumulation
//!
//! Finalized utterances in the order the transport finalized them. Lives
//! exactly as long as the owning session runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    System,
    /// The AI interviewer. Voice transports and the feedback service call it `assistant`.
    #[serde(rename = "assistant", alias = "agent")]
    Agent,
}

/// One finalized utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub content: String,
    pub finalized_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(role: TranscriptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            finalized_at: Utc::now(),
        }
    }
}

/// Append-only, order-preserving transcript. Never deduplicates or merges.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn last_entry(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
