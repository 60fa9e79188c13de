//! Runtime for executing call sessions
//!
//! One [`SessionRuntime`] task per session. The manager keeps the handles the
//! HTTP layer needs: the event inbox, the update broadcast, the latest
//! snapshot and the relay transport the browser talks to. A runtime ends once
//! its session has settled and its handle is dropped with it.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::error::TransportInitError;
use crate::state_machine::{Event, NavigationIntent, SessionContext, SessionMode, SessionState};
use crate::transcript::TranscriptEntry;
use crate::transport::RelayTransport;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = SessionRuntime<RelayTransport, dyn FeedbackClient>;

/// How long a session waits on its collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// `start` issued but the call never came up
    pub connect: Duration,
    /// Feedback generation after the call finished
    pub feedback: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            feedback: Duration::from_secs(60),
        }
    }
}

/// Everything an observer needs to render a session from scratch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub mode: SessionMode,
    pub state: SessionState,
    pub transcript: Vec<TranscriptEntry>,
    /// Most recent finalized line, if any
    pub last_message: Option<String>,
}

impl SessionSnapshot {
    fn new(session_id: &str, mode: SessionMode) -> Self {
        Self {
            session_id: session_id.to_string(),
            mode,
            state: SessionState::new(),
            transcript: Vec::new(),
            last_message: None,
        }
    }
}

/// Updates pushed to session observers
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    StateChange {
        state: SessionState,
    },
    Transcript {
        entry: TranscriptEntry,
    },
    Navigate {
        intent: NavigationIntent,
        path: String,
    },
    Error {
        message: String,
    },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SessionUpdate>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub relay: Arc<RelayTransport>,
    pub context: SessionContext,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }
}

type SessionMap = Arc<RwLock<HashMap<String, SessionHandle>>>;

/// Manager for all call session runtimes
pub struct SessionManager {
    web_token: Option<String>,
    timeouts: SessionTimeouts,
    feedback: Arc<dyn FeedbackClient>,
    sessions: SessionMap,
}

impl SessionManager {
    pub fn new(
        web_token: Option<String>,
        timeouts: SessionTimeouts,
        feedback: Arc<dyn FeedbackClient>,
    ) -> Self {
        Self {
            web_token,
            timeouts,
            feedback,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawn a runtime for a new session and return its id.
    ///
    /// Fails when the voice transport cannot be constructed; no session is
    /// registered in that case.
    pub async fn create(&self, context: SessionContext) -> Result<String, TransportInitError> {
        let relay = Arc::new(RelayTransport::new(self.web_token.as_deref())?);
        let session_id = uuid::Uuid::new_v4().to_string();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::new(&session_id, context.mode));
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            session_id.clone(),
            context.clone(),
            Arc::clone(&relay),
            Arc::clone(&self.feedback),
            self.timeouts,
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            snapshot_tx,
            shutdown.clone(),
        );

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionHandle {
                event_tx,
                broadcast_tx,
                snapshot_rx,
                relay,
                context,
                shutdown,
            },
        );

        let sessions = Arc::clone(&self.sessions);
        let id = session_id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            // Already gone if the session was torn down explicitly
            if sessions.write().await.remove(&id).is_some() {
                tracing::info!(session_id = %id, "Settled session released");
            }
            tracing::info!(session_id = %id, "Call session runtime finished");
        });

        Ok(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Send an event to a session
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), String> {
        let handle = self
            .get(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {session_id}"))?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Subscribe to session updates
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionUpdate>), String> {
        let handle = self
            .get(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {session_id}"))?;
        // Subscribe before reading the snapshot so nothing falls in between
        let rx = handle.broadcast_tx.subscribe();
        Ok((handle.snapshot(), rx))
    }

    /// Tear down a session. Stops a live call and drops any late results.
    pub async fn remove(&self, session_id: &str) -> bool {
        match self.sessions.write().await.remove(session_id) {
            Some(handle) => {
                handle.shutdown.cancel();
                tracing::info!(session_id = %session_id, "Session torn down");
                true
            }
            None => false,
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(sessions) = self.sessions.try_read() {
            for handle in sessions.values() {
                handle.shutdown.cancel();
            }
        }
    }
}
