//! Process configuration read from the environment

use crate::runtime::SessionTimeouts;
use crate::state_machine::CallTargets;
use std::time::Duration;

/// Interviewer agent used when `VAPI_INTERVIEWER_ID` is unset
pub const DEFAULT_INTERVIEWER_ID: &str = "interviewer";

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Public web token handed to the browser call client
    pub web_token: Option<String>,
    pub targets: CallTargets,
    /// Feedback service endpoint; feedback always fails when unset
    pub feedback_url: Option<String>,
    pub timeouts: SessionTimeouts,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map_or(default, Duration::from_secs)
        };
        let defaults = SessionTimeouts::default();

        Self {
            port: get("INTERVIEW_COACH_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            web_token: get("VAPI_WEB_TOKEN"),
            targets: CallTargets {
                workflow_id: get("VAPI_WORKFLOW_ID"),
                interviewer_id: get("VAPI_INTERVIEWER_ID")
                    .unwrap_or_else(|| DEFAULT_INTERVIEWER_ID.to_string()),
            },
            feedback_url: get("FEEDBACK_URL"),
            timeouts: SessionTimeouts {
                connect: secs("CONNECT_TIMEOUT_SECS", defaults.connect),
                feedback: secs("FEEDBACK_TIMEOUT_SECS", defaults.feedback),
            },
        }
    }
}
