//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::feedback::{FeedbackRequest, FeedbackResponse};
use crate::transport::{StartOptions, Subscription, TransportEvent};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// One live voice call. Owned by exactly one session runtime.
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Start the call. Rejections come back in whatever shape the transport
    /// produces; the runtime normalizes them.
    async fn start(&self, target: &str, options: StartOptions) -> Result<(), Value>;

    /// Stop the call. Never fails.
    fn stop(&self);

    /// Attach a listener. Events arrive in emission order until the returned
    /// subscription is dropped.
    fn subscribe(&self, sink: mpsc::Sender<TransportEvent>) -> Subscription;
}

/// Client for the feedback generation service
#[async_trait]
pub trait FeedbackClient: Send + Sync {
    /// Score a transcript. Failures are reported as `success: false`, never as errors.
    async fn create_feedback(&self, request: &FeedbackRequest) -> FeedbackResponse;
}
