//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same new
//! state and effect list. All I/O happens in the runtime.

use super::event::FeedbackOutcome;
use super::state::{CallState, DispatchStatus, NavigationIntent, SessionMode};
use super::{Effect, Event, SessionContext, SessionState};
use crate::error::{ConfigurationError, FeedbackDispatchError};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// Keep the current state, produce nothing
    pub fn unchanged(state: &SessionState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// True when the event was absorbed without any observable consequence
    pub fn is_noop(&self, previous: &SessionState) -> bool {
        self.effects.is_empty() && &self.new_state == previous
    }
}

/// Commands that cannot be honored in the current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("A call is already in progress")]
    AlreadyStarted,
    #[error("This session has finished; start a new session to call again")]
    SessionFinished,
    #[error("No call to disconnect")]
    NotConnected,
}

/// Pure transition function
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state.call, event) {
        // ============================================================
        // Terminal state: dispatcher completion and late transcript only
        // ============================================================
        (CallState::Finished, Event::FeedbackResolved { outcome }) => {
            Ok(resolve_dispatch(state, outcome))
        }

        (CallState::Finished, Event::StartRequested) => Err(TransitionError::SessionFinished),

        // Closing utterances can land after the call is over
        (_, Event::TranscriptReceived { role, content }) => Ok(TransitionResult::unchanged(state)
            .with_effect(Effect::AppendTranscript { role, content })),

        // Duplicate call-end, repeated disconnect, late errors and speech
        (CallState::Finished, _) => Ok(TransitionResult::unchanged(state)),

        // ============================================================
        // User commands
        // ============================================================
        (CallState::Inactive, Event::StartRequested) => {
            let request = context.call_request()?;
            let attempt = state.connect_attempt + 1;
            let new_state = SessionState {
                call: CallState::Connecting,
                is_agent_speaking: false,
                dispatch: DispatchStatus::Idle,
                connect_attempt: attempt,
                last_error: None,
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::NotifyState)
                .with_effect(Effect::StartCall { request, attempt })
                .with_effect(Effect::ScheduleConnectTimeout { attempt }))
        }

        (_, Event::StartRequested) => Err(TransitionError::AlreadyStarted),

        (CallState::Connecting | CallState::Active, Event::DisconnectRequested) => {
            let finished = enter_finished(state, context);
            Ok(TransitionResult::new(finished.new_state)
                .with_effect(Effect::StopCall)
                .with_effects(finished.effects))
        }

        (CallState::Inactive, Event::DisconnectRequested) => Err(TransitionError::NotConnected),

        // ============================================================
        // Transport lifecycle
        // ============================================================
        (CallState::Connecting, Event::CallStarted) => {
            let new_state = SessionState {
                call: CallState::Active,
                ..state.clone()
            };
            Ok(TransitionResult::new(new_state).with_effect(Effect::NotifyState))
        }

        // Stray confirmation outside a connect attempt
        (_, Event::CallStarted) => Ok(TransitionResult::unchanged(state)),

        // Authoritative from any live or aborted state
        (_, Event::CallEnded) => Ok(enter_finished(state, context)),

        (_, Event::TransportFailed { error }) => {
            let message = error.to_string();
            let new_state = SessionState {
                call: CallState::Inactive,
                is_agent_speaking: false,
                last_error: Some(message.clone()),
                ..state.clone()
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::NotifyState)
                .with_effect(Effect::notify_error(message)))
        }

        (CallState::Connecting | CallState::Active, Event::StartFailed { attempt, error })
            if attempt == state.connect_attempt =>
        {
            let message = error.to_string();
            let new_state = SessionState {
                call: CallState::Inactive,
                is_agent_speaking: false,
                last_error: Some(message.clone()),
                ..state.clone()
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::NotifyState)
                .with_effect(Effect::notify_error(message)))
        }

        // Late rejection from an attempt that was already abandoned
        (_, Event::StartFailed { .. }) => Ok(TransitionResult::unchanged(state)),

        (CallState::Connecting, Event::ConnectTimedOut { attempt })
            if attempt == state.connect_attempt =>
        {
            let message = "Timed out connecting to the interviewer. Please try again.".to_string();
            let new_state = SessionState {
                call: CallState::Inactive,
                is_agent_speaking: false,
                last_error: Some(message.clone()),
                ..state.clone()
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::StopCall)
                .with_effect(Effect::NotifyState)
                .with_effect(Effect::notify_error(message)))
        }

        (_, Event::ConnectTimedOut { .. }) => Ok(TransitionResult::unchanged(state)),

        // ============================================================
        // Speech
        // ============================================================
        (_, Event::SpeechStarted) => Ok(set_speaking(state, true)),

        (_, Event::SpeechEnded) => Ok(set_speaking(state, false)),

        // Dispatch only runs once Finished
        (_, Event::FeedbackResolved { .. }) => Ok(TransitionResult::unchanged(state)),
    }
}

/// The dispatcher edge. Only reachable from non-terminal states, so it fires
/// at most once per session.
fn enter_finished(state: &SessionState, context: &SessionContext) -> TransitionResult {
    let finished = SessionState {
        call: CallState::Finished,
        is_agent_speaking: false,
        ..state.clone()
    };

    let dispatch = match context.mode {
        SessionMode::Generate => Ok(None),
        SessionMode::Interview => match (&context.interview_id, &context.user_id) {
            (None, _) => Err(FeedbackDispatchError::MissingInterviewId),
            (_, None) => Err(FeedbackDispatchError::MissingUserId),
            (Some(interview_id), Some(user_id)) => Ok(Some((interview_id, user_id))),
        },
    };

    match dispatch {
        Ok(Some((interview_id, user_id))) => TransitionResult::new(
            finished.with_dispatch(DispatchStatus::Pending {
                interview_id: interview_id.clone(),
            }),
        )
        .with_effect(Effect::NotifyState)
        .with_effect(Effect::RequestFeedback {
            interview_id: interview_id.clone(),
            user_id: user_id.clone(),
            feedback_id: context.feedback_id.clone(),
        }),
        Ok(None) => go_home(finished, None),
        Err(error) => go_home(finished, Some(error)),
    }
}

fn resolve_dispatch(state: &SessionState, outcome: FeedbackOutcome) -> TransitionResult {
    let DispatchStatus::Pending { interview_id } = &state.dispatch else {
        return TransitionResult::unchanged(state);
    };

    match outcome {
        FeedbackOutcome::Created { feedback_id } => {
            let intent = NavigationIntent::NavigateToFeedback {
                interview_id: interview_id.clone(),
                feedback_id,
            };
            TransitionResult::new(state.clone().with_dispatch(DispatchStatus::Resolved {
                intent: intent.clone(),
            }))
            .with_effect(Effect::NotifyState)
            .with_effect(Effect::Navigate { intent })
        }
        FeedbackOutcome::Failed { error } => go_home(state.clone(), Some(error)),
    }
}

fn go_home(state: SessionState, failure: Option<FeedbackDispatchError>) -> TransitionResult {
    let resolved = state.with_dispatch(DispatchStatus::Resolved {
        intent: NavigationIntent::NavigateHome,
    });
    let mut result = TransitionResult::new(resolved).with_effect(Effect::NotifyState);
    if let Some(error) = failure {
        result = result.with_effect(Effect::LogDispatchFailure { error });
    }
    result.with_effect(Effect::navigate_home())
}

fn set_speaking(state: &SessionState, speaking: bool) -> TransitionResult {
    if state.is_agent_speaking == speaking {
        return TransitionResult::unchanged(state);
    }
    let new_state = SessionState {
        is_agent_speaking: speaking,
        ..state.clone()
    };
    TransitionResult::new(new_state).with_effect(Effect::NotifyState)
}
