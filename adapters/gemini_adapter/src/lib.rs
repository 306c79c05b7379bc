use std::time::Duration;

use insight_core::error::InsightError;
use insight_core::ports::{AnswerGenerator, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Answer generator backed by the Generative Language `generateContent` endpoint
pub struct GeminiGenerator {
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiGenerator {
    pub fn new(base_url: String, model: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InsightError::Connectivity(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

impl AnswerGenerator for GeminiGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint();
        debug!(model = %self.model, "POST {url}");

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    InsightError::ExternalService(format!("request timed out: {e}"))
                } else {
                    InsightError::Connectivity(e.to_string())
                }
            })?;

        let status = res.status();
        let text = res
            .text()
            .map_err(|e| InsightError::ExternalService(e.to_string()))?;

        if !status.is_success() {
            warn!("model call returned {status}");
            return Err(InsightError::ExternalService(format!(
                "{status}: {}",
                error_message(&text)
            )));
        }

        extract_text(&text)
    }
}

pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ]
    })
}

/// Concatenates the text parts of the first candidate
pub fn extract_text(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| InsightError::ExternalService(format!("unreadable model response: {e}")))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(InsightError::ExternalService(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| InsightError::ExternalService("model returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(InsightError::ExternalService(format!(
            "model returned no text (finish reason: {reason})"
        )));
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
