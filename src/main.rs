//! Interview Coach - voice interview practice sessions
//!
//! A Rust backend implementing the call-session state machine that drives a
//! voice interview and hands the finished transcript to feedback generation.

mod api;
mod config;
mod error;
mod feedback;
mod runtime;
mod state_machine;
mod transcript;
mod transport;

use api::{create_router, AppState};
use config::AppConfig;
use feedback::{HttpFeedbackClient, UnconfiguredFeedbackClient};
use runtime::{FeedbackClient, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_coach=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    if config.web_token.is_none() {
        tracing::warn!("VAPI_WEB_TOKEN is not set; sessions cannot be created");
    }
    if config.targets.workflow_id.is_none() {
        tracing::warn!("VAPI_WORKFLOW_ID is not set; generate sessions will not start");
    }

    let feedback: Arc<dyn FeedbackClient> = match &config.feedback_url {
        Some(url) => {
            tracing::info!(url = %url, "Using feedback service");
            Arc::new(HttpFeedbackClient::new(url.as_str())?)
        }
        None => {
            tracing::warn!("FEEDBACK_URL is not set; interview feedback will always fail");
            Arc::new(UnconfiguredFeedbackClient)
        }
    };

    let sessions = SessionManager::new(config.web_token.clone(), config.timeouts, feedback);
    let state = AppState::new(sessions, config.targets.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Interview Coach server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
