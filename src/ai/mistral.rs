//! Mistral chat.completions client.
//!
//! reqwest errors are stripped of their URL before they reach logs or messages.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::error::ProviderError;
use super::provider::{non_empty, CallRequest, TextGenerator};
use crate::util::trunc_for_log;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

#[derive(Clone)]
pub struct MistralClient {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl MistralClient {
  pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
    let base_url = base_url.trim_end_matches('/').to_string();
    Self { client, api_key, base_url }
  }
}

#[async_trait]
impl TextGenerator for MistralClient {
  #[instrument(level = "debug", skip(self, req), fields(%model, prompt_len = req.prompt.len()))]
  async fn generate(&self, model: &str, req: &CallRequest) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let body = ChatCompletionRequest {
      model,
      messages: vec![
        ChatMessageReq { role: "system", content: &req.system_prompt },
        ChatMessageReq { role: "user", content: &req.prompt },
      ],
      temperature: req.temperature,
      max_tokens: req.max_tokens,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "dialectic-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&body).send().await
      .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      warn!(target: "ai", %model, status = status.as_u16(), body = %trunc_for_log(&body, 300), "Mistral HTTP error");
      return Err(ProviderError::Http { status: status.as_u16(), body });
    }

    let parsed: ChatCompletionResponse = res.json().await
      .map_err(|e| ProviderError::Decode(e.without_url().to_string()))?;
    if let Some(usage) = &parsed.usage {
      debug!(target: "ai", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Mistral usage");
    }

    let text = parsed.choices.into_iter().next().and_then(|c| c.message.content);
    non_empty(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessageReq<'a>>,
  temperature: f32,
  max_tokens: u32,
}
#[derive(Serialize)]
struct ChatMessageReq<'a> { role: &'static str, content: &'a str }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { #[serde(default)] content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}
