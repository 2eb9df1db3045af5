//! The seam between the fallback policy and the HTTP clients.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::error::ProviderError;

pub const DEFAULT_TEMPERATURE: f32 = 0.4;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Remote text-generation services we know how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
  /// Google Generative Language API (Gemma, Gemini).
  Gemini,
  /// Mistral La Plateforme.
  Mistral,
}

impl ProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProviderKind::Gemini => "gemini",
      ProviderKind::Mistral => "mistral",
    }
  }
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One text-completion request. Shared unchanged by every candidate of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
  pub prompt: String,
  pub system_prompt: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

impl CallRequest {
  pub fn new(prompt: impl Into<String>, system_prompt: impl Into<String>) -> Self {
    Self {
      prompt: prompt.into(),
      system_prompt: system_prompt.into(),
      temperature: DEFAULT_TEMPERATURE,
      max_tokens: DEFAULT_MAX_TOKENS,
    }
  }

  pub fn with_temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }

  pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
    self.max_tokens = max_tokens;
    self
  }
}

/// A provider client able to run one completion against a named model.
///
/// Implementations return the model text with leading and trailing whitespace
/// trimmed and the interior untouched. An empty or whitespace-only payload
/// must be reported as [`ProviderError::EmptyResponse`], not as `Ok("")`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  async fn generate(&self, model: &str, req: &CallRequest) -> Result<String, ProviderError>;
}

/// Shared by both clients: trim the edges and reject empty output.
pub(crate) fn non_empty(text: Option<String>) -> Result<String, ProviderError> {
  match text.map(|t| t.trim().to_string()) {
    Some(t) if !t.is_empty() => Ok(t),
    _ => Err(ProviderError::EmptyResponse),
  }
}
