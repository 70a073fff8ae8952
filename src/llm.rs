//! LLM completion provider abstraction.
//!
//! Mirrors the embedding-provider dispatch: `openai` calls
//! `POST /v1/chat/completions`, `ollama` calls `POST /api/chat`, and
//! `disabled` errors immediately. Remote calls use a bounded timeout with
//! the same exponential-backoff retry policy as the embedding providers
//! (429/5xx/network → retry, other 4xx → fail immediately).
//!
//! Also extracts regulation-style citations from a reply (`RN 465`,
//! `Lei 9.656`, `Cláusula 14`) for display alongside the answer.

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::LlmConfig;

/// Maximum citations returned per reply.
const MAX_CITATIONS: usize = 5;

/// A role-tagged message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request a completion for an ordered list of messages.
///
/// Returns the generated text. Provider failures propagate after retries
/// are exhausted — never an empty or fabricated reply.
pub async fn complete(config: &LlmConfig, messages: &[ChatMessage]) -> Result<String> {
    match config.provider.as_str() {
        "openai" => complete_openai(config, messages).await,
        "ollama" => complete_ollama(config, messages).await,
        "disabled" => bail!("LLM provider is disabled. Set [llm] provider in config."),
        other => bail!("Unknown llm provider: {}", other),
    }
}

async fn complete_openai(config: &LlmConfig, messages: &[ChatMessage]) -> Result<String> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("llm.model required"))?;

    let url = config
        .url
        .as_deref()
        .unwrap_or("https://api.openai.com/v1/chat/completions");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": messages,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_openai_chat_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "OpenAI API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
}

fn parse_openai_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

    if content.trim().is_empty() {
        bail!("Empty completion from model");
    }

    Ok(content.to_string())
}

async fn complete_ollama(config: &LlmConfig, messages: &[ChatMessage]) -> Result<String> {
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("llm.model required"))?;

    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": false,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(format!("{}/api/chat", url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_ollama_chat_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Ollama API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Ollama API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama completion failed after retries")))
}

fn parse_ollama_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))?;

    if content.trim().is_empty() {
        bail!("Empty completion from model");
    }

    Ok(content.to_string())
}

// ============ Citation extraction ============

fn citation_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)\bRN\s*\d+").unwrap(),
            Regex::new(r"(?i)\bRI\s*\d+").unwrap(),
            Regex::new(r"(?i)\bLei\s*\d+\.?\d*").unwrap(),
            Regex::new(r"(?i)\bCláusula\s*\d+").unwrap(),
        ]
    })
}

/// Extract regulation-style citations from a reply.
///
/// Normative references (`RN`, `RI`) are upper-cased; duplicates are dropped
/// keeping first-seen order; at most [`MAX_CITATIONS`] are returned.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut seen = Vec::new();

    for (i, pattern) in citation_patterns().iter().enumerate() {
        for m in pattern.find_iter(text) {
            let normalized = if i < 2 {
                m.as_str().to_uppercase()
            } else {
                m.as_str().to_string()
            };
            if !seen.contains(&normalized) {
                seen.push(normalized);
            }
        }
    }

    seen.truncate(MAX_CITATIONS);
    seen
}
