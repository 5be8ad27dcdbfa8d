//! Coaching sentences from a local Ollama server.

mod dto;
pub mod handlers;
pub mod ollama;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use thiserror::Error;

use crate::state::AppState;

pub use ollama::OllamaCoach;

/// Text sent in place of feedback when none could be generated.
pub const UNAVAILABLE_TEXT: &str = "unavailable";

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response")]
    Empty,
}

/// Result of a feedback attempt. Failure is a normal value here, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Available { text: String },
    Unavailable { reason: String },
}

impl FeedbackOutcome {
    pub fn text(&self) -> &str {
        match self {
            FeedbackOutcome::Available { text } => text,
            FeedbackOutcome::Unavailable { .. } => UNAVAILABLE_TEXT,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            FeedbackOutcome::Available { .. } => "ok",
            FeedbackOutcome::Unavailable { .. } => "unavailable",
        }
    }
}

impl From<FeedbackError> for FeedbackOutcome {
    fn from(e: FeedbackError) -> Self {
        FeedbackOutcome::Unavailable { reason: e.to_string() }
    }
}

/// Models the server reports as installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub models: Vec<String>,
    pub model_available: bool,
}

#[async_trait]
pub trait CoachingService: Send + Sync {
    /// Produces feedback for `prompt` within the configured bound. Never fails.
    async fn generate(&self, prompt: &str) -> FeedbackOutcome;

    /// Asks the server which models it has, giving up after `timeout`.
    async fn probe(&self, timeout: Duration) -> Result<ModelCatalog, FeedbackError>;
}

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::routes())
}
