//! Server-Sent Events support
//!
//! A session stream carries two things: updates for the UI, and relay
//! commands for the browser-side call client.

use crate::runtime::{SessionSnapshot, SessionUpdate};
use crate::transport::RelayCommand;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Build the SSE stream: the snapshot first, then updates and commands as
/// they happen.
pub fn sse_stream(
    snapshot: SessionSnapshot,
    updates_rx: broadcast::Receiver<SessionUpdate>,
    commands_rx: broadcast::Receiver<RelayCommand>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&snapshot)) });

    let updates = BroadcastStream::new(updates_rx).filter_map(|result| match result {
        Ok(update) => Some(Ok(update_event(update))),
        Err(_) => None, // Skip lagged messages
    });

    let commands = BroadcastStream::new(commands_rx).filter_map(|result| match result {
        Ok(command) => Some(Ok(command_event(&command))),
        Err(_) => None,
    });

    let combined = init.chain(futures::stream::select(updates, commands));

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &SessionSnapshot) -> Event {
    let data = json!({
        "type": "init",
        "snapshot": snapshot,
    });
    Event::default().event("init").data(data.to_string())
}

fn command_event(command: &RelayCommand) -> Event {
    let data = json!({
        "type": "command",
        "command": command,
    });
    Event::default().event("command").data(data.to_string())
}

fn update_event(update: SessionUpdate) -> Event {
    let (event_type, data) = match update {
        SessionUpdate::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state
            }),
        ),
        SessionUpdate::Transcript { entry } => (
            "transcript",
            json!({
                "type": "transcript",
                "entry": entry
            }),
        ),
        SessionUpdate::Navigate { intent, path } => (
            "navigate",
            json!({
                "type": "navigate",
                "intent": intent,
                "path": path
            }),
        ),
        SessionUpdate::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
