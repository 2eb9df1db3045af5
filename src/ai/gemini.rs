//! Google Generative Language client (Gemma / Gemini models).
//!
//! The API has no separate system role for Gemma, so the system prompt and the
//! user prompt travel as one text part separated by a blank line.
//! The key is sent as the `key` query parameter; reqwest errors are stripped of
//! their URL before they reach logs or messages.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::error::ProviderError;
use super::provider::{non_empty, CallRequest, TextGenerator};
use crate::util::trunc_for_log;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl GeminiClient {
  pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
    let base_url = base_url.trim_end_matches('/').to_string();
    Self { client, api_key, base_url }
  }
}

#[async_trait]
impl TextGenerator for GeminiClient {
  #[instrument(level = "debug", skip(self, req), fields(%model, prompt_len = req.prompt.len()))]
  async fn generate(&self, model: &str, req: &CallRequest) -> Result<String, ProviderError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, model);
    let body = GenerateContentRequest {
      contents: vec![Content {
        parts: vec![PartReq { text: format!("{}\n\n{}", req.system_prompt, req.prompt) }],
      }],
      generation_config: GenerationConfig {
        temperature: req.temperature,
        max_output_tokens: req.max_tokens,
      },
    };

    let res = self.client.post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, "dialectic-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&body).send().await
      .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      warn!(target: "ai", %model, status = status.as_u16(), body = %trunc_for_log(&body, 300), "Gemini HTTP error");
      return Err(ProviderError::Http { status: status.as_u16(), body });
    }

    let parsed: GenerateContentResponse = res.json().await
      .map_err(|e| ProviderError::Decode(e.without_url().to_string()))?;
    if let Some(usage) = &parsed.usage_metadata {
      debug!(target: "ai", prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, "Gemini usage");
    }

    non_empty(parsed.text())
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content { parts: Vec<PartReq> }
#[derive(Serialize)]
struct PartReq { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<CandidateResp>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct CandidateResp { #[serde(default)] content: Option<ContentResp> }
#[derive(Deserialize)]
struct ContentResp { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
}

impl GenerateContentResponse {
  /// Text parts of the first candidate, concatenated. `None` if the path is absent.
  fn text(self) -> Option<String> {
    let content = self.candidates.into_iter().next()?.content?;
    let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() { None } else { Some(texts.concat()) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(reqwest::Client::new(), "test-gemini-key".into(), format!("{}/v1beta", server.uri()))
  }

  #[tokio::test]
  async fn sends_combined_prompt_and_reads_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1beta/models/gemma-3-27b-it:generateContent"))
      .and(query_param("key", "test-gemini-key"))
      .and(body_partial_json(json!({
        "contents": [{ "parts": [{ "text": "You are a philosophy tutor\n\nExplain dialectics" }] }],
        "generationConfig": { "temperature": 0.4, "maxOutputTokens": 2048 }
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": "Dialectics " }, { "text": "is..." }] } }],
        "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 3 }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let req = CallRequest::new("Explain dialectics", "You are a philosophy tutor");
    let text = client_for(&server).generate("gemma-3-27b-it", &req).await.unwrap();
    assert_eq!(text, "Dialectics is...");
  }

  #[tokio::test]
  async fn non_success_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
      .mount(&server)
      .await;

    let req = CallRequest::new("p", "s");
    let err = client_for(&server).generate("gemini-2.5-flash", &req).await.unwrap_err();
    assert_eq!(err, ProviderError::Http { status: 429, body: "RESOURCE_EXHAUSTED".into() });
  }

  #[tokio::test]
  async fn missing_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
      .mount(&server)
      .await;

    let req = CallRequest::new("p", "s");
    let err = client_for(&server).generate("gemini-2.5-flash", &req).await.unwrap_err();
    assert_eq!(err, ProviderError::EmptyResponse);
  }

  #[tokio::test]
  async fn candidate_without_content_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "finishReason": "SAFETY" }]
      })))
      .mount(&server)
      .await;

    let req = CallRequest::new("p", "s");
    let err = client_for(&server).generate("gemini-2.5-flash", &req).await.unwrap_err();
    assert_eq!(err, ProviderError::EmptyResponse);
  }
}
