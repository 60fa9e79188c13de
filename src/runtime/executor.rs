//! Call session runtime executor

use super::traits::{CallTransport, FeedbackClient};
use super::{SessionSnapshot, SessionTimeouts, SessionUpdate};
use crate::error::{FeedbackDispatchError, TransportStartError};
use crate::feedback::{FeedbackRequest, FeedbackResponse, FeedbackTranscriptLine};
use crate::state_machine::{
    transition, CallRequest, Effect, Event, FeedbackOutcome, SessionContext, SessionState,
};
use crate::transcript::{Transcript, TranscriptEntry};
use crate::transport::{StartOptions, Subscription, TransportEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Capacity of the transport listener channel
const TRANSPORT_CHANNEL_CAPACITY: usize = 64;

/// Drives one call session: owns the transport, the transcript and the state,
/// and executes the effects produced by `transition`.
pub struct SessionRuntime<T, F>
where
    T: CallTransport + ?Sized + 'static,
    F: FeedbackClient + ?Sized + 'static,
{
    session_id: String,
    context: SessionContext,
    state: SessionState,
    transcript: Transcript,
    transport: Arc<T>,
    feedback: Arc<F>,
    timeouts: SessionTimeouts,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    /// Detaches from the transport when dropped
    subscription: Option<Subscription>,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    shutdown: CancellationToken,
}

impl<T, F> SessionRuntime<T, F>
where
    T: CallTransport + ?Sized + 'static,
    F: FeedbackClient + ?Sized + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        context: SessionContext,
        transport: Arc<T>,
        feedback: Arc<F>,
        timeouts: SessionTimeouts,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionUpdate>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        let subscription = transport.subscribe(transport_tx);
        Self {
            session_id: session_id.into(),
            context,
            state: SessionState::new(),
            transcript: Transcript::new(),
            transport,
            feedback,
            timeouts,
            event_rx,
            event_tx,
            transport_rx,
            subscription: Some(subscription),
            broadcast_tx,
            snapshot_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.session_id,
            mode = ?self.context.mode,
            "Starting call session runtime"
        );

        // Commands and transport callbacks are each handled in arrival order
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    self.teardown();
                    break;
                }
                Some(event) = self.event_rx.recv() => {
                    self.process_event(event);
                }
                Some(raw) = self.transport_rx.recv() => {
                    match raw.into_event() {
                        Some(event) => self.process_event(event),
                        None => tracing::trace!(session_id = %self.session_id, "Ignoring non-final transport message"),
                    }
                }
                else => break,
            }

            // Clients navigate away once the outcome is known
            if self.state.is_settled() {
                tracing::debug!(session_id = %self.session_id, "Session settled");
                self.teardown();
                break;
            }
        }

        tracing::info!(session_id = %self.session_id, "Call session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let event_name = event.name();
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                // Rejected commands are user-facing (e.g. missing configuration)
                tracing::warn!(session_id = %self.session_id, event = event_name, error = %e, "Transition rejected");
                let _ = self.broadcast_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        if result.is_noop(&self.state) {
            tracing::debug!(
                session_id = %self.session_id,
                event = event_name,
                call = ?self.state.call,
                "Event ignored in current state"
            );
            return;
        }

        let previous = std::mem::replace(&mut self.state, result.new_state);
        if previous.call != self.state.call {
            tracing::info!(
                session_id = %self.session_id,
                event = event_name,
                from = ?previous.call,
                to = ?self.state.call,
                "Call state changed"
            );
            if self.state.call.is_terminal() {
                tracing::info!(
                    session_id = %self.session_id,
                    transcript_lines = self.transcript.len(),
                    "Call finished"
                );
            }
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    /// Execute an effect. Anything that waits is spawned and reports back with an event.
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartCall { request, attempt } => self.spawn_start(request, attempt),

            Effect::StopCall => self.transport.stop(),

            Effect::ScheduleConnectTimeout { attempt } => {
                let event_tx = self.event_tx.clone();
                let delay = self.timeouts.connect;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // Runtime may be gone; nothing to time out then
                    let _ = event_tx.send(Event::ConnectTimedOut { attempt }).await;
                });
            }

            Effect::AppendTranscript { role, content } => {
                let entry = TranscriptEntry::new(role, content);
                self.transcript.append(entry.clone());
                let last_message = self.transcript.last_entry().map(|e| e.content.clone());
                self.snapshot_tx.send_modify(|snapshot| {
                    snapshot.transcript.push(entry.clone());
                    snapshot.last_message = last_message;
                });
                let _ = self.broadcast_tx.send(SessionUpdate::Transcript { entry });
            }

            Effect::RequestFeedback {
                interview_id,
                user_id,
                feedback_id,
            } => {
                if self.transcript.is_empty() {
                    tracing::warn!(session_id = %self.session_id, "Requesting feedback for an empty transcript");
                }
                let request = FeedbackRequest {
                    interview_id,
                    user_id,
                    transcript: self
                        .transcript
                        .entries()
                        .iter()
                        .map(FeedbackTranscriptLine::from)
                        .collect(),
                    feedback_id,
                };
                self.spawn_feedback(request);
            }

            Effect::LogDispatchFailure { error } => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %error,
                    "Error saving feedback, returning home"
                );
            }

            Effect::Navigate { intent } => {
                tracing::info!(session_id = %self.session_id, path = %intent.path(), "Session navigation");
                let _ = self.broadcast_tx.send(SessionUpdate::Navigate {
                    path: intent.path(),
                    intent,
                });
            }

            Effect::NotifyState => {
                let state = self.state.clone();
                self.snapshot_tx
                    .send_modify(|snapshot| snapshot.state = state.clone());
                let _ = self.broadcast_tx.send(SessionUpdate::StateChange { state });
            }

            Effect::NotifyError { message } => {
                let _ = self.broadcast_tx.send(SessionUpdate::Error { message });
            }
        }
    }

    fn spawn_start(&self, request: CallRequest, attempt: u32) {
        let transport = Arc::clone(&self.transport);
        let event_tx = self.event_tx.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            tracing::info!(
                session_id = %session_id,
                attempt,
                target = %request.target,
                variables = ?request.variable_values.keys().collect::<Vec<_>>(),
                "Starting voice call"
            );
            let options = StartOptions {
                variable_values: request.variable_values,
            };
            if let Err(raw) = transport.start(&request.target, options).await {
                let error = TransportStartError::from_raw(&raw);
                tracing::error!(
                    session_id = %session_id,
                    attempt,
                    message = %error.message,
                    code = ?error.code,
                    status = ?error.status,
                    raw = %raw,
                    "Error starting voice call"
                );
                if event_tx
                    .send(Event::StartFailed { attempt, error })
                    .await
                    .is_err()
                {
                    tracing::debug!(session_id = %session_id, "Session closed before start failure was reported");
                }
            }
        });
    }

    fn spawn_feedback(&self, request: FeedbackRequest) {
        let feedback = Arc::clone(&self.feedback);
        let event_tx = self.event_tx.clone();
        let session_id = self.session_id.clone();
        let limit = self.timeouts.feedback;

        tokio::spawn(async move {
            tracing::info!(
                session_id = %session_id,
                interview_id = %request.interview_id,
                lines = request.transcript.len(),
                "Generating feedback"
            );
            let outcome =
                match tokio::time::timeout(limit, feedback.create_feedback(&request)).await {
                    Ok(response) => outcome_from_response(response),
                    Err(_) => FeedbackOutcome::Failed {
                        error: FeedbackDispatchError::TimedOut(limit.as_secs()),
                    },
                };

            // The hosting screen may have been torn down meanwhile
            if event_tx
                .send(Event::FeedbackResolved { outcome })
                .await
                .is_err()
            {
                tracing::debug!(session_id = %session_id, "Session closed before feedback resolved; dropping result");
            }
        });
    }

    fn teardown(&mut self) {
        if self.state.call.is_live() {
            tracing::info!(session_id = %self.session_id, "Stopping live call on teardown");
            self.transport.stop();
        }
        self.subscription.take();
    }
}

fn outcome_from_response(response: FeedbackResponse) -> FeedbackOutcome {
    match response {
        FeedbackResponse {
            success: true,
            feedback_id: Some(feedback_id),
        } if !feedback_id.is_empty() => FeedbackOutcome::Created { feedback_id },
        FeedbackResponse { success: true, .. } => FeedbackOutcome::Failed {
            error: FeedbackDispatchError::MissingFeedbackId,
        },
        FeedbackResponse { success: false, .. } => FeedbackOutcome::Failed {
            error: FeedbackDispatchError::Rejected,
        },
    }
}
