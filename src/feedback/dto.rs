use serde::{Deserialize, Serialize};

use crate::summaries::dto::Summary;

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateResponse {
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TagModel {
    pub name: String,
}

/// A summary with coaching text attached. Always served with 200.
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    #[serde(flatten)]
    pub summary: Summary,
    pub feedback: String,
    pub feedback_status: &'static str,
}
