use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::dto::{ChatResponse, GenerateResponse, TagsResponse};
use super::{CoachingService, FeedbackError, FeedbackOutcome, ModelCatalog};
use crate::config::OllamaConfig;

const SYSTEM_PROMPT: &str =
    "You are a helpful nutrition coach. Provide concise, actionable advice.";
const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 100;

/// Talks to Ollama: OpenAI-compatible chat first, native generate as fallback.
pub struct OllamaCoach {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaCoach {
    pub fn new(cfg: &OllamaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build Ollama http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            timeout: cfg.timeout,
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, FeedbackError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedbackError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedbackError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| FeedbackError::Malformed(e.to_string()))
    }

    async fn chat(&self, prompt: &str) -> Result<String, FeedbackError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        let resp: ChatResponse = self.post("/v1/chat/completions", body).await?;
        let text = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FeedbackError::Malformed("no choices".into()))?;
        non_empty(text)
    }

    async fn generate_native(&self, prompt: &str) -> Result<String, FeedbackError> {
        let body = json!({
            "model": self.model,
            "prompt": format!("You are a helpful nutrition coach. {prompt}"),
            "stream": false,
            "options": { "temperature": TEMPERATURE, "num_predict": MAX_TOKENS },
        });
        let resp: GenerateResponse = self.post("/api/generate", body).await?;
        non_empty(resp.response)
    }

    async fn chat_or_fallback(&self, prompt: &str) -> Result<String, FeedbackError> {
        match self.chat(prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(error = %e, "chat endpoint failed; falling back to /api/generate");
                self.generate_native(prompt).await
            }
        }
    }
}

fn non_empty(text: String) -> Result<String, FeedbackError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FeedbackError::Empty);
    }
    Ok(text.to_string())
}

#[async_trait]
impl CoachingService for OllamaCoach {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> FeedbackOutcome {
        let result = match tokio::time::timeout(self.timeout, self.chat_or_fallback(prompt)).await
        {
            Ok(r) => r,
            Err(_) => Err(FeedbackError::Timeout(self.timeout)),
        };
        match result {
            Ok(text) => {
                debug!(chars = text.len(), "feedback generated");
                FeedbackOutcome::Available { text }
            }
            Err(e) => {
                warn!(error = %e, "feedback unavailable");
                e.into()
            }
        }
    }

    async fn probe(&self, timeout: Duration) -> Result<ModelCatalog, FeedbackError> {
        let request = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(timeout)
            .send();
        let resp = request.await.map_err(|e| {
            if e.is_timeout() {
                FeedbackError::Timeout(timeout)
            } else {
                FeedbackError::Transport(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedbackError::Status(status.as_u16()));
        }
        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| FeedbackError::Malformed(e.to_string()))?;
        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        Ok(ModelCatalog {
            model_available: models.iter().any(|m| *m == self.model),
            models,
        })
    }
}
