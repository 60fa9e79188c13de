//! Call session state machine
//!
//! Elm-style: a pure `transition` maps (state, event) to a new state plus a
//! list of effects; the runtime executes the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Event, FeedbackOutcome};
pub use state::{
    CallRequest, CallState, CallTargets, DispatchStatus, NavigationIntent, SessionContext,
    SessionMode, SessionState,
};
pub use transition::{transition, TransitionError, TransitionResult};
