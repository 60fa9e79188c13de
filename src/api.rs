//! HTTP API for interview call sessions

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::SessionManager;
use crate::state_machine::CallTargets;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    /// Call targets every new session is configured with
    pub targets: CallTargets,
}

impl AppState {
    pub fn new(sessions: SessionManager, targets: CallTargets) -> Self {
        Self {
            sessions: Arc::new(sessions),
            targets,
        }
    }
}
