//! Mock implementations for testing
//!
//! These mocks enable integration testing without a browser or a feedback
//! service.

use super::traits::*;
use crate::feedback::{FeedbackRequest, FeedbackResponse};
use crate::runtime::{SessionRuntime, SessionSnapshot, SessionTimeouts, SessionUpdate};
use crate::state_machine::{
    CallState, CallTargets, Event, NavigationIntent, SessionContext, SessionMode,
};
use crate::transport::{EventHub, StartOptions, Subscription, TransportEvent};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Transport
// ============================================================================

/// Outcome of one `start` call, optionally held back
struct QueuedStart {
    delay: Option<Duration>,
    result: Result<(), Value>,
}

/// Mock voice transport. Tests drive the far end with [`MockTransport::emit`].
pub struct MockTransport {
    hub: Arc<EventHub>,
    start_results: Mutex<VecDeque<QueuedStart>>,
    /// Record of all start calls
    pub starts: Mutex<Vec<(String, StartOptions)>>,
    stops: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            hub: EventHub::new(),
            start_results: Mutex::new(VecDeque::new()),
            starts: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        }
    }

    /// Make the next `start` fail with this raw rejection
    pub fn queue_start_error(&self, raw: Value) {
        self.start_results.lock().unwrap().push_back(QueuedStart {
            delay: None,
            result: Err(raw),
        });
    }

    /// Make the next `start` reject only after `delay`
    pub fn queue_slow_start_error(&self, delay: Duration, raw: Value) {
        self.start_results.lock().unwrap().push_back(QueuedStart {
            delay: Some(delay),
            result: Err(raw),
        });
    }

    pub async fn emit(&self, event: TransportEvent) -> usize {
        self.hub.emit(event).await
    }

    pub fn recorded_starts(&self) -> Vec<(String, StartOptions)> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallTransport for MockTransport {
    async fn start(&self, target: &str, options: StartOptions) -> Result<(), Value> {
        self.starts
            .lock()
            .unwrap()
            .push((target.to_string(), options));
        let queued = self.start_results.lock().unwrap().pop_front();
        match queued {
            Some(QueuedStart { delay, result }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(()),
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self, sink: mpsc::Sender<TransportEvent>) -> Subscription {
        self.hub.subscribe(sink)
    }
}

// ============================================================================
// Mock Feedback Client
// ============================================================================

/// Mock feedback service returning queued responses; fails when the queue is empty
pub struct MockFeedbackClient {
    responses: Mutex<VecDeque<FeedbackResponse>>,
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<FeedbackRequest>>,
}

impl MockFeedbackClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold every response back for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&self, response: FeedbackResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn recorded_requests(&self) -> Vec<FeedbackRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockFeedbackClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackClient for MockFeedbackClient {
    async fn create_feedback(&self, request: &FeedbackRequest) -> FeedbackResponse {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(FeedbackResponse::failed)
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_rx: broadcast::Receiver<SessionUpdate>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub transport: Arc<MockTransport>,
    pub feedback: Arc<MockFeedbackClient>,
    pub shutdown: CancellationToken,
    pub runtime_handle: tokio::task::JoinHandle<()>,
}

pub struct TestRuntimeBuilder {
    context: SessionContext,
    transport: Option<MockTransport>,
    feedback: Option<MockFeedbackClient>,
    timeouts: SessionTimeouts,
}

impl TestRuntime {
    /// Interview session for user `u1` on interview `i1` with instant mocks
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder {
            context: interview_context(),
            transport: None,
            feedback: None,
            timeouts: SessionTimeouts::default(),
        }
    }

    pub async fn send(&self, event: Event) {
        self.event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    /// Play the far end of the call
    pub async fn emit(&self, event: TransportEvent) {
        self.transport.emit(event).await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Wait until the session reaches `expected`
    pub async fn wait_for_call(&self, expected: CallState, timeout: Duration) -> bool {
        let mut rx = self.snapshot_rx.clone();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|s| s.state.call == expected))
            .await
            .map(|r| r.is_ok());
        matches!(reached, Ok(true))
    }

    /// Wait for the next navigation update
    pub async fn wait_for_navigate(
        &mut self,
        timeout: Duration,
    ) -> Option<(NavigationIntent, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SessionUpdate::Navigate { intent, path })) => return Some((intent, path)),
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                _ => continue,
            }
        }
        None
    }

    /// Wait for the next error update
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SessionUpdate::Error { message })) => return Some(message),
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                _ => continue,
            }
        }
        None
    }

    /// Start the call and bring it up to `Active`
    pub async fn connect(&self) {
        self.send(Event::StartRequested).await;
        assert!(
            self.wait_for_call(CallState::Connecting, Duration::from_secs(2))
                .await
        );
        self.emit(TransportEvent::CallStart).await;
        assert!(
            self.wait_for_call(CallState::Active, Duration::from_secs(2))
                .await
        );
    }
}

impl TestRuntimeBuilder {
    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    pub fn transport(mut self, transport: MockTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn feedback(mut self, feedback: MockFeedbackClient) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn build(self) -> TestRuntime {
        let transport = Arc::new(self.transport.unwrap_or_default());
        let feedback = Arc::new(self.feedback.unwrap_or_default());

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::new(
            "test-session",
            self.context.mode,
        ));
        let shutdown = CancellationToken::new();

        let runtime = SessionRuntime::new(
            "test-session",
            self.context,
            transport.clone(),
            feedback.clone(),
            self.timeouts,
            event_rx,
            event_tx.clone(),
            broadcast_tx,
            snapshot_tx,
            shutdown.clone(),
        );

        let runtime_handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            event_tx,
            broadcast_rx,
            snapshot_rx,
            transport,
            feedback,
            shutdown,
            runtime_handle,
        }
    }
}

pub fn test_targets() -> CallTargets {
    CallTargets {
        workflow_id: Some("wf-1".to_string()),
        interviewer_id: "interviewer".to_string(),
    }
}

pub fn interview_context() -> SessionContext {
    SessionContext::new(SessionMode::Interview, test_targets())
        .with_user("u1", "Ada")
        .with_interview("i1")
        .with_questions(vec!["Q1".to_string(), "Q2".to_string()])
}

pub fn generate_context() -> SessionContext {
    SessionContext::new(SessionMode::Generate, test_targets()).with_user("u1", "Ada")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportStartError;
    use crate::state_machine::DispatchStatus;
    use crate::transcript::TranscriptRole;
    use crate::transport::{TranscriptType, TransportMessage};
    use serde_json::json;

    const WAIT: Duration = Duration::from_secs(2);

    fn final_line(role: TranscriptRole, text: &str) -> TransportEvent {
        TransportEvent::Message {
            message: TransportMessage::Transcript {
                transcript_type: TranscriptType::Final,
                role,
                transcript: text.to_string(),
            },
        }
    }

    fn partial_line(role: TranscriptRole, text: &str) -> TransportEvent {
        TransportEvent::Message {
            message: TransportMessage::Transcript {
                transcript_type: TranscriptType::Partial,
                role,
                transcript: text.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_mock_feedback_client() {
        let mock = MockFeedbackClient::new();
        mock.queue_response(FeedbackResponse::created("f1"));
        let request = FeedbackRequest {
            interview_id: "i1".to_string(),
            user_id: "u1".to_string(),
            transcript: vec![],
            feedback_id: None,
        };

        assert_eq!(
            mock.create_feedback(&request).await,
            FeedbackResponse::created("f1")
        );
        // Queue exhausted
        assert_eq!(
            mock.create_feedback(&request).await,
            FeedbackResponse::failed()
        );
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    /// Generate mode never scores: call end goes straight home
    #[tokio::test]
    async fn test_generate_session_returns_home() {
        let mut rt = TestRuntime::new().context(generate_context()).build();
        rt.connect().await;

        rt.emit(final_line(TranscriptRole::Agent, "Hello Ada")).await;
        rt.emit(TransportEvent::CallEnd).await;

        let (intent, path) = rt.wait_for_navigate(WAIT).await.unwrap();
        assert_eq!(intent, NavigationIntent::NavigateHome);
        assert_eq!(path, "/");

        let starts = rt.transport.recorded_starts();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].0, "wf-1");
        assert_eq!(starts[0].1.variable_values["username"], "Ada");
        assert_eq!(starts[0].1.variable_values["userid"], "u1");
        assert!(rt.feedback.recorded_requests().is_empty());
        assert_eq!(rt.snapshot().state.call, CallState::Finished);
    }

    #[tokio::test]
    async fn test_interview_feedback_success_navigates_to_feedback() {
        let feedback = MockFeedbackClient::new();
        feedback.queue_response(FeedbackResponse::created("f1"));
        let mut rt = TestRuntime::new().feedback(feedback).build();
        rt.connect().await;

        rt.emit(final_line(TranscriptRole::Agent, "Hi")).await;
        rt.emit(partial_line(TranscriptRole::User, "Hel")).await;
        rt.emit(final_line(TranscriptRole::User, "Hello")).await;
        rt.emit(TransportEvent::CallEnd).await;

        let (intent, path) = rt.wait_for_navigate(WAIT).await.unwrap();
        assert_eq!(
            intent,
            NavigationIntent::NavigateToFeedback {
                interview_id: "i1".to_string(),
                feedback_id: "f1".to_string(),
            }
        );
        assert_eq!(path, "/interview/i1/feedback");

        let starts = rt.transport.recorded_starts();
        assert_eq!(starts[0].0, "interviewer");
        assert_eq!(starts[0].1.variable_values["questions"], "- Q1\n- Q2");

        let requests = rt.feedback.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].interview_id, "i1");
        assert_eq!(requests[0].user_id, "u1");
        let lines: Vec<_> = requests[0]
            .transcript
            .iter()
            .map(|l| (l.role, l.content.as_str()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (TranscriptRole::Agent, "Hi"),
                (TranscriptRole::User, "Hello")
            ]
        );

        let snapshot = rt.snapshot();
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.last_message.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_interview_feedback_failure_returns_home() {
        let feedback = MockFeedbackClient::new();
        feedback.queue_response(FeedbackResponse::failed());
        let mut rt = TestRuntime::new().feedback(feedback).build();
        rt.connect().await;
        rt.emit(TransportEvent::CallEnd).await;

        let (intent, _) = rt.wait_for_navigate(WAIT).await.unwrap();
        assert_eq!(intent, NavigationIntent::NavigateHome);
        assert_eq!(
            rt.snapshot().state.dispatch,
            DispatchStatus::Resolved {
                intent: NavigationIntent::NavigateHome
            }
        );
    }

    #[tokio::test]
    async fn test_retake_passes_existing_feedback_id() {
        let feedback = MockFeedbackClient::new();
        feedback.queue_response(FeedbackResponse::created("f0"));
        let mut context = interview_context();
        context.feedback_id = Some("f0".to_string());
        let mut rt = TestRuntime::new()
            .context(context)
            .feedback(feedback)
            .build();
        rt.connect().await;
        rt.emit(TransportEvent::CallEnd).await;

        assert!(rt.wait_for_navigate(WAIT).await.is_some());
        assert_eq!(
            rt.feedback.recorded_requests()[0].feedback_id.as_deref(),
            Some("f0")
        );
    }

    #[tokio::test]
    async fn test_duplicate_call_end_dispatches_once() {
        let feedback = MockFeedbackClient::new();
        feedback.queue_response(FeedbackResponse::created("f1"));
        feedback.queue_response(FeedbackResponse::created("f2"));
        let mut rt = TestRuntime::new().feedback(feedback).build();
        rt.connect().await;

        rt.emit(TransportEvent::CallEnd).await;
        rt.emit(TransportEvent::CallEnd).await;

        assert!(rt.wait_for_navigate(WAIT).await.is_some());
        assert!(rt
            .wait_for_navigate(Duration::from_millis(200))
            .await
            .is_none());
        assert_eq!(rt.feedback.recorded_requests().len(), 1);
    }

    /// A transport error aborts the call: no feedback, no navigation
    #[tokio::test]
    async fn test_transport_error_aborts_without_dispatch() {
        let mut rt = TestRuntime::new().build();
        rt.connect().await;

        rt.emit(TransportEvent::Error {
            error: json!({ "message": "ICE connection failed" }),
        })
        .await;

        assert!(rt.wait_for_call(CallState::Inactive, WAIT).await);
        let message = rt.wait_for_error(WAIT).await.unwrap();
        assert!(message.contains("ICE connection failed"));
        assert!(rt
            .wait_for_navigate(Duration::from_millis(200))
            .await
            .is_none());
        assert!(rt.feedback.recorded_requests().is_empty());
        assert_eq!(rt.snapshot().state.dispatch, DispatchStatus::Idle);
    }

    #[tokio::test]
    async fn test_start_failure_returns_to_inactive() {
        let transport = MockTransport::new();
        transport.queue_start_error(json!({ "error": { "message": "Invalid key" }, "status": 401 }));
        let mut rt = TestRuntime::new().transport(transport).build();

        rt.send(Event::StartRequested).await;

        // The error is published after the state change
        let expected = TransportStartError::new("Invalid key").to_string();
        assert_eq!(rt.wait_for_error(WAIT).await.as_deref(), Some(expected.as_str()));
        let snapshot = rt.snapshot();
        assert_eq!(snapshot.state.call, CallState::Inactive);
        assert_eq!(snapshot.state.last_error.as_deref(), Some(expected.as_str()));

        // Retry is allowed after a failed start
        rt.send(Event::StartRequested).await;
        assert!(rt.wait_for_call(CallState::Connecting, WAIT).await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rt.transport.recorded_starts().len(), 2);
    }

    /// A rejection that arrives after its attempt timed out must not abort the retry
    #[tokio::test]
    async fn test_late_start_failure_ignored_after_retry() {
        let transport = MockTransport::new();
        transport.queue_slow_start_error(
            Duration::from_millis(300),
            json!({ "message": "attempt 1 rejected late" }),
        );
        let timeouts = SessionTimeouts {
            connect: Duration::from_millis(100),
            ..SessionTimeouts::default()
        };
        let mut rt = TestRuntime::new()
            .transport(transport)
            .timeouts(timeouts)
            .build();

        rt.send(Event::StartRequested).await;
        let timed_out = rt.wait_for_error(WAIT).await.unwrap();
        assert!(timed_out.contains("Timed out"));
        assert_eq!(rt.snapshot().state.call, CallState::Inactive);

        rt.connect().await;
        assert_eq!(rt.snapshot().state.connect_attempt, 2);

        // Outlast the first attempt's rejection
        tokio::time::sleep(Duration::from_millis(400)).await;
        let state = rt.snapshot().state;
        assert_eq!(state.call, CallState::Active);
        assert_eq!(state.connect_attempt, 2);
        assert!(state.last_error.is_none());
        assert!(rt
            .wait_for_error(Duration::from_millis(100))
            .await
            .is_none());
        assert_eq!(rt.transport.recorded_starts().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_configuration_never_reaches_transport() {
        let context = SessionContext::new(SessionMode::Generate, test_targets());
        let mut rt = TestRuntime::new().context(context).build();

        rt.send(Event::StartRequested).await;
        assert!(rt.wait_for_error(WAIT).await.is_some());
        assert!(rt.transport.recorded_starts().is_empty());
        assert_eq!(rt.snapshot().state.call, CallState::Inactive);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        // Keep the session unsettled while the second disconnect lands
        let feedback = MockFeedbackClient::new().with_delay(Duration::from_millis(100));
        let mut rt = TestRuntime::new().feedback(feedback).build();
        rt.connect().await;

        rt.send(Event::DisconnectRequested).await;
        rt.send(Event::DisconnectRequested).await;

        assert!(rt.wait_for_navigate(WAIT).await.is_some());
        assert!(rt
            .wait_for_navigate(Duration::from_millis(200))
            .await
            .is_none());
        assert_eq!(rt.transport.stop_count(), 1);
        assert_eq!(rt.feedback.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout_returns_to_inactive() {
        let timeouts = SessionTimeouts {
            connect: Duration::from_millis(50),
            ..SessionTimeouts::default()
        };
        let mut rt = TestRuntime::new().timeouts(timeouts).build();

        rt.send(Event::StartRequested).await;
        assert!(rt.wait_for_error(WAIT).await.is_some());
        assert_eq!(rt.snapshot().state.call, CallState::Inactive);
        assert_eq!(rt.transport.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout_ignored_once_active() {
        let timeouts = SessionTimeouts {
            connect: Duration::from_millis(50),
            ..SessionTimeouts::default()
        };
        let rt = TestRuntime::new().timeouts(timeouts).build();
        rt.connect().await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rt.snapshot().state.call, CallState::Active);
        assert_eq!(rt.transport.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_feedback_timeout_returns_home() {
        let feedback = MockFeedbackClient::new().with_delay(Duration::from_secs(5));
        feedback.queue_response(FeedbackResponse::created("f1"));
        let timeouts = SessionTimeouts {
            feedback: Duration::from_millis(50),
            ..SessionTimeouts::default()
        };
        let mut rt = TestRuntime::new()
            .feedback(feedback)
            .timeouts(timeouts)
            .build();
        rt.connect().await;
        rt.emit(TransportEvent::CallEnd).await;

        let (intent, _) = rt.wait_for_navigate(WAIT).await.unwrap();
        assert_eq!(intent, NavigationIntent::NavigateHome);
    }

    /// The agent's sign-off can arrive after a user disconnect
    #[tokio::test]
    async fn test_closing_line_after_disconnect_is_kept() {
        let feedback = MockFeedbackClient::new().with_delay(Duration::from_millis(200));
        feedback.queue_response(FeedbackResponse::created("f1"));
        let mut rt = TestRuntime::new().feedback(feedback).build();
        rt.connect().await;
        rt.emit(final_line(TranscriptRole::User, "That's all from me")).await;

        rt.send(Event::DisconnectRequested).await;
        assert!(rt.wait_for_call(CallState::Finished, WAIT).await);
        rt.emit(final_line(TranscriptRole::Agent, "Thanks, goodbye")).await;

        let mut rx = rt.snapshot_rx.clone();
        tokio::time::timeout(
            WAIT,
            rx.wait_for(|s| s.last_message.as_deref() == Some("Thanks, goodbye")),
        )
        .await
        .unwrap()
        .unwrap();

        let (intent, _) = rt.wait_for_navigate(WAIT).await.unwrap();
        assert_eq!(
            intent,
            NavigationIntent::NavigateToFeedback {
                interview_id: "i1".to_string(),
                feedback_id: "f1".to_string(),
            }
        );
        let snapshot = rt.snapshot();
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[1].role, TranscriptRole::Agent);
        assert_eq!(rt.feedback.recorded_requests().len(), 1);
        assert_eq!(rt.transport.stop_count(), 1);
    }

    /// Once the outcome is resolved the runtime exits on its own
    #[tokio::test]
    async fn test_runtime_ends_once_settled() {
        let mut rt = TestRuntime::new().context(generate_context()).build();
        rt.connect().await;
        rt.emit(TransportEvent::CallEnd).await;

        assert!(rt.wait_for_navigate(WAIT).await.is_some());
        tokio::time::timeout(WAIT, &mut rt.runtime_handle)
            .await
            .unwrap()
            .unwrap();
        assert!(rt.event_tx.is_closed());
        assert_eq!(rt.snapshot().state.call, CallState::Finished);
    }

    #[tokio::test]
    async fn test_speech_flags_follow_transport() {
        let rt = TestRuntime::new().build();
        rt.connect().await;

        rt.emit(TransportEvent::SpeechStart).await;
        let mut rx = rt.snapshot_rx.clone();
        tokio::time::timeout(WAIT, rx.wait_for(|s| s.state.is_agent_speaking))
            .await
            .unwrap()
            .unwrap();

        rt.emit(TransportEvent::SpeechEnd).await;
        tokio::time::timeout(WAIT, rx.wait_for(|s| !s.state.is_agent_speaking))
            .await
            .unwrap()
            .unwrap();
    }

    /// Tearing down while feedback is in flight drops the late result quietly
    #[tokio::test]
    async fn test_teardown_during_feedback() {
        let feedback = MockFeedbackClient::new().with_delay(Duration::from_millis(100));
        feedback.queue_response(FeedbackResponse::created("f1"));
        let mut rt = TestRuntime::new().feedback(feedback).build();
        rt.connect().await;
        rt.emit(TransportEvent::CallEnd).await;
        assert!(rt.wait_for_call(CallState::Finished, WAIT).await);

        rt.shutdown.cancel();
        tokio::time::timeout(WAIT, &mut rt.runtime_handle)
            .await
            .unwrap()
            .unwrap();

        // Let the feedback task finish against a closed runtime
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rt.feedback.recorded_requests().len(), 1);
        assert!(rt
            .wait_for_navigate(Duration::from_millis(100))
            .await
            .is_none());
        // Finished calls are not stopped again
        assert_eq!(rt.transport.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_stops_live_call() {
        let rt = TestRuntime::new().build();
        rt.connect().await;

        rt.shutdown.cancel();
        tokio::time::timeout(WAIT, rt.runtime_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rt.transport.stop_count(), 1);
    }
}
