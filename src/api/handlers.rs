//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateSessionRequest, CreateSessionResponse, ErrorResponse, QueuedResponse, RelayResponse,
    SuccessResponse,
};
use super::AppState;
use crate::runtime::{SessionHandle, SessionSnapshot};
use crate::state_machine::Event;
use crate::transport::TransportEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/start", post(start_call))
        .route("/api/sessions/:id/disconnect", post(disconnect_call))
        // Browser call client reporting back
        .route("/api/sessions/:id/transport-events", post(relay_event))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn session(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

// ============================================================
// Session lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let context = req.into_context(state.targets.clone());
    let session_id = state.sessions.create(context).await.map_err(|e| {
        tracing::error!(error = %e, "Voice transport unavailable");
        AppError::Unavailable(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    ))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session(&state, &id).await?.snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.sessions.remove(&id).await {
        return Err(AppError::NotFound(format!("Session not found: {id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session(&state, &id).await?;
    // Commands first: `start` is rejected while no client listens
    let commands_rx = handle.relay.commands();
    let (snapshot, updates_rx) = state
        .sessions
        .subscribe(&id)
        .await
        .map_err(AppError::NotFound)?;

    Ok(sse_stream(snapshot, updates_rx, commands_rx))
}

// ============================================================
// User actions
// ============================================================

async fn start_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let handle = session(&state, &id).await?;

    // Surface configuration problems synchronously; the runtime would only
    // report them on the stream
    handle
        .context
        .call_request()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .sessions
        .send_event(&id, Event::StartRequested)
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn disconnect_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    session(&state, &id).await?;
    state
        .sessions
        .send_event(&id, Event::DisconnectRequested)
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn relay_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(event): Json<TransportEvent>,
) -> Result<Json<RelayResponse>, AppError> {
    let handle = session(&state, &id).await?;
    let delivered = handle.relay.emit(event).await;
    Ok(Json(RelayResponse { delivered }))
}

async fn get_version() -> &'static str {
    concat!("interview-coach ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    /// A required external collaborator cannot be used
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
