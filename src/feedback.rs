//! Feedback generation collaborator
//!
//! Scores a finished interview transcript. Failures never propagate: every
//! problem collapses to `success: false` so the dispatcher can send the user home.

use crate::runtime::FeedbackClient;
use crate::transcript::{TranscriptEntry, TranscriptRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One line of the transcript as the feedback service sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackTranscriptLine {
    pub role: TranscriptRole,
    pub content: String,
}

impl From<&TranscriptEntry> for FeedbackTranscriptLine {
    fn from(entry: &TranscriptEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub interview_id: String,
    pub user_id: String,
    pub transcript: Vec<FeedbackTranscriptLine>,
    /// Existing record to overwrite when retaking an interview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_id: Option<String>,
}

impl FeedbackResponse {
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn created(feedback_id: impl Into<String>) -> Self {
        Self {
            success: true,
            feedback_id: Some(feedback_id.into()),
        }
    }
}

/// Feedback service reached over HTTP
pub struct HttpFeedbackClient {
    client: Client,
    endpoint: String,
}

impl HttpFeedbackClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl FeedbackClient for HttpFeedbackClient {
    async fn create_feedback(&self, request: &FeedbackRequest) -> FeedbackResponse {
        let response = match self.client.post(&self.endpoint).json(request).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, interview_id = %request.interview_id, "Feedback request failed");
                return FeedbackResponse::failed();
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                status = %status,
                interview_id = %request.interview_id,
                "Feedback service returned error status"
            );
            return FeedbackResponse::failed();
        }

        match response.json::<FeedbackResponse>().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Feedback service returned unreadable body");
                FeedbackResponse::failed()
            }
        }
    }
}

/// Stand-in used when no feedback service is configured
pub struct UnconfiguredFeedbackClient;

#[async_trait]
impl FeedbackClient for UnconfiguredFeedbackClient {
    async fn create_feedback(&self, request: &FeedbackRequest) -> FeedbackResponse {
        tracing::warn!(
            interview_id = %request.interview_id,
            "FEEDBACK_URL is not set; feedback cannot be generated"
        );
        FeedbackResponse::failed()
    }
}
