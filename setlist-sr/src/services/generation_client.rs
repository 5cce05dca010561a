//! Generation Service client
//!
//! Asks a chat-completions endpoint for song suggestions matching the
//! caller's prompt. Model output is text, so parsing is deliberately
//! forgiving: fenced code blocks, an envelope object, or prose around the
//! array are all accepted, and malformed entries are skipped rather than
//! failing the batch. Only a response with no recognizable JSON array at all
//! is an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use setlist_common::{Candidate, SongRef};

use crate::config::GenerationConfig;

const USER_AGENT: &str = "Setlist/0.1.0 (https://github.com/setlist/setlist)";

/// Suggestion batches can take a while on slow models
const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "You are a music curator. Respond with a JSON array only, no prose. \
Each element is an object: {\"title\": \"...\", \"artist\": \"...\", \"year\": 1974, \"reason\": \"...\"}. \
The year and reason fields are optional.";

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One suggestion request: prompt plus accumulated steering
#[derive(Debug, Clone)]
pub struct SuggestionRequest {
    /// Natural-language prompt from the caller
    pub prompt: String,
    /// How many suggestions to ask for
    pub desired_count: u32,
    /// Songs the model must not suggest again
    pub exclusions: Vec<SongRef>,
    /// Availability feedback from the previous pass
    pub feedback: Option<String>,
}

/// Suggestion seam; mocked in tests
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, request: &SuggestionRequest)
        -> Result<Vec<Candidate>, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Generation Service API client
pub struct GenerationClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SuggestionSource for GenerationClient {
    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<Candidate>, GenerationError> {
        let user_message = build_user_message(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &user_message },
            ],
            temperature: 0.8,
        };

        tracing::debug!(
            desired = request.desired_count,
            exclusions = request.exclusions.len(),
            "Requesting suggestions from generation service"
        );

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ApiError(status.as_u16(), error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| {
                GenerationError::ParseError("response contained no choices".to_string())
            })?;

        let candidates = parse_suggestions(content)?;
        tracing::info!(returned = candidates.len(), "Generation service returned candidates");
        Ok(candidates)
    }
}

/// Compose the user message: prompt, count, avoid-list, availability feedback
fn build_user_message(request: &SuggestionRequest) -> String {
    let mut message = format!(
        "{}\n\nSuggest {} songs.",
        request.prompt.trim(),
        request.desired_count
    );

    if !request.exclusions.is_empty() {
        message.push_str("\n\nDo not suggest any of these songs:\n");
        for song in &request.exclusions {
            message.push_str(&format!("- \"{}\" by {}\n", song.title, song.artist));
        }
    }

    if let Some(feedback) = &request.feedback {
        message.push('\n');
        message.push_str(feedback);
    }

    message
}

/// Pull a candidate list out of whatever text the model produced
pub fn parse_suggestions(content: &str) -> Result<Vec<Candidate>, GenerationError> {
    let cleaned = strip_code_fences(content);

    let values = suggestion_values(cleaned)
        .or_else(|| bracket_substring(cleaned).and_then(suggestion_values))
        .ok_or_else(|| {
            GenerationError::ParseError("no JSON array of suggestions found".to_string())
        })?;

    let total = values.len();
    let candidates: Vec<Candidate> = values.iter().filter_map(candidate_from_value).collect();

    let skipped = total - candidates.len();
    if skipped > 0 {
        tracing::warn!(skipped, total, "Skipped malformed suggestion entries");
    }

    Ok(candidates)
}

/// Interpret text as a suggestion array, bare or wrapped in an envelope object
fn suggestion_values(text: &str) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("suggestions") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// The outermost `[...]` span, for responses with prose around the array
fn bracket_substring(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Drop a Markdown code fence, with or without an info string
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(index) => &rest[index + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// One entry to a Candidate; None when title or artist is missing or blank
fn candidate_from_value(value: &Value) -> Option<Candidate> {
    let title = value.get("title")?.as_str()?.trim();
    let artist = value.get("artist")?.as_str()?.trim();
    if title.is_empty() || artist.is_empty() {
        return None;
    }

    Some(Candidate {
        title: title.to_string(),
        artist: artist.to_string(),
        year: value.get("year").and_then(year_from_value),
        reason: value
            .get("reason")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
    })
}

/// Models emit years as numbers or strings interchangeably
fn year_from_value(value: &Value) -> Option<i32> {
    if let Some(number) = value.as_i64() {
        return i32::try_from(number).ok();
    }
    value.as_str().and_then(|text| text.trim().parse().ok())
}
