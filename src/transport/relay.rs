//! Browser-relayed call transport
//!
//! The voice SDK runs in the user's browser. Start/stop commands are pushed to
//! the browser over the session stream; the browser posts the call's events
//! back, which are emitted to subscribers through the [`EventHub`].

use super::hub::{EventHub, Subscription};
use super::{StartOptions, TransportEvent};
use crate::error::TransportInitError;
use crate::runtime::CallTransport;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Commands the browser-side call client must execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RelayCommand {
    Start {
        /// Web token the browser SDK authenticates with
        public_key: String,
        target: String,
        options: StartOptions,
    },
    Stop,
}

/// Call transport whose far end is the browser
pub struct RelayTransport {
    public_key: String,
    hub: Arc<EventHub>,
    commands: broadcast::Sender<RelayCommand>,
}

impl RelayTransport {
    /// Fails when no web token is configured; the browser could never start a call.
    pub fn new(web_token: Option<&str>) -> Result<Self, TransportInitError> {
        let public_key = web_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TransportInitError::MissingCredential)?;
        let (commands, _) = broadcast::channel(16);
        Ok(Self {
            public_key: public_key.to_string(),
            hub: EventHub::new(),
            commands,
        })
    }

    /// Stream of commands for an attached browser client
    pub fn commands(&self) -> broadcast::Receiver<RelayCommand> {
        self.commands.subscribe()
    }

    /// Forward an event reported by the browser to subscribers
    pub async fn emit(&self, event: TransportEvent) -> usize {
        self.hub.emit(event).await
    }
}

#[async_trait]
impl CallTransport for RelayTransport {
    async fn start(&self, target: &str, options: StartOptions) -> Result<(), Value> {
        let command = RelayCommand::Start {
            public_key: self.public_key.clone(),
            target: target.to_string(),
            options,
        };
        self.commands.send(command).map(|_| ()).map_err(|_| {
            json!({
                "message": "No browser client is attached to this session",
                "code": "client_not_attached"
            })
        })
    }

    fn stop(&self) {
        if self.commands.send(RelayCommand::Stop).is_err() {
            tracing::debug!("Stop requested with no browser client attached");
        }
    }

    fn subscribe(&self, sink: mpsc::Sender<TransportEvent>) -> Subscription {
        self.hub.subscribe(sink)
    }
}
