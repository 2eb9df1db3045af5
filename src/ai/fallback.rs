//! Sequential multi-provider fallback.
//!
//! Candidates are tried strictly one after another in the order of
//! [`CANDIDATES`]. The first non-empty text wins. Each failure is classified
//! with the candidate's [`RateLimitRule`]; the classification is logged and
//! decides whether a gated candidate right after it is attempted.
//!
//! Nothing is remembered between calls: every call starts from candidate one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::classify::RateLimitRule;
use super::error::{Attempt, FallbackError, Outcome, ProviderError};
use super::gemini::GeminiClient;
use super::mistral::MistralClient;
use super::provider::{CallRequest, ProviderKind, TextGenerator};
use crate::config::AiSettings;

/// When a candidate is eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
  Always,
  /// Only right after the previous table entry failed with a rate-limit classification.
  AfterRateLimit,
}

impl Gate {
  /// `previous` is the attempt made for the table entry directly before this
  /// one, or `None` if that entry was not attempted.
  pub fn admits(&self, previous: Option<&Attempt>) -> bool {
    match self {
      Gate::Always => true,
      Gate::AfterRateLimit => previous.is_some_and(Attempt::rate_limited),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
  pub provider: ProviderKind,
  pub model: &'static str,
  pub classify: RateLimitRule,
  pub gate: Gate,
}

/// Priority order: cheapest first, highest availability last.
pub const CANDIDATES: [Candidate; 5] = [
  Candidate {
    provider: ProviderKind::Gemini,
    model: "gemma-3-27b-it",
    classify: RateLimitRule::GeminiRateLimit,
    gate: Gate::Always,
  },
  Candidate {
    provider: ProviderKind::Mistral,
    model: "mistral-large-latest",
    classify: RateLimitRule::MistralCapacity,
    gate: Gate::Always,
  },
  Candidate {
    provider: ProviderKind::Mistral,
    model: "mistral-small-latest",
    classify: RateLimitRule::MistralCapacity,
    gate: Gate::AfterRateLimit,
  },
  Candidate {
    provider: ProviderKind::Gemini,
    model: "gemini-2.5-flash",
    classify: RateLimitRule::GeminiQuota,
    gate: Gate::Always,
  },
  Candidate {
    provider: ProviderKind::Gemini,
    model: "gemini-2.0-flash-exp",
    classify: RateLimitRule::GeminiQuota,
    gate: Gate::AfterRateLimit,
  },
];

/// A successful completion and the attempts it took to get there.
#[derive(Debug, Clone)]
pub struct Completion {
  pub text: String,
  pub provider: ProviderKind,
  pub model: &'static str,
  pub attempts: Vec<Attempt>,
}

#[derive(Clone)]
pub struct FallbackCaller {
  gemini: Option<Arc<dyn TextGenerator>>,
  mistral: Option<Arc<dyn TextGenerator>>,
  timeout: Duration,
}

impl FallbackCaller {
  pub fn new(
    gemini: Option<Arc<dyn TextGenerator>>,
    mistral: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
  ) -> Self {
    Self { gemini, mistral, timeout }
  }

  /// Build both HTTP clients from settings. A provider without a key is left out.
  pub fn from_settings(settings: &AiSettings) -> Result<Self, reqwest::Error> {
    let http = reqwest::Client::builder().build()?;

    let gemini = settings.gemini_api_key.clone().map(|key| {
      Arc::new(GeminiClient::new(http.clone(), key, settings.gemini_base_url.clone())) as Arc<dyn TextGenerator>
    });
    let mistral = settings.mistral_api_key.clone().map(|key| {
      Arc::new(MistralClient::new(http.clone(), key, settings.mistral_base_url.clone())) as Arc<dyn TextGenerator>
    });

    Ok(Self::new(gemini, mistral, settings.timeout))
  }

  pub fn is_configured(&self, provider: ProviderKind) -> bool {
    self.client_for(provider).is_some()
  }

  fn client_for(&self, provider: ProviderKind) -> Option<&Arc<dyn TextGenerator>> {
    match provider {
      ProviderKind::Gemini => self.gemini.as_ref(),
      ProviderKind::Mistral => self.mistral.as_ref(),
    }
  }

  pub async fn generate(&self, req: &CallRequest) -> Result<Completion, FallbackError> {
    self.generate_with_cancel(req, &CancellationToken::new()).await
  }

  /// Like [`generate`](Self::generate), but `cancel` aborts the candidate in
  /// flight and skips the rest.
  #[instrument(level = "info", skip_all, fields(prompt_len = req.prompt.len(), system_len = req.system_prompt.len()))]
  pub async fn generate_with_cancel(
    &self,
    req: &CallRequest,
    cancel: &CancellationToken,
  ) -> Result<Completion, FallbackError> {
    if req.prompt.trim().is_empty() {
      return Err(FallbackError::InvalidRequest("prompt must not be empty"));
    }
    if req.system_prompt.trim().is_empty() {
      return Err(FallbackError::InvalidRequest("system prompt must not be empty"));
    }

    let mut attempts: Vec<Attempt> = Vec::new();
    let mut skipped: Vec<&Candidate> = Vec::new();
    // Index into `attempts` of the table entry just before the current one.
    let mut previous: Option<usize> = None;

    for cand in CANDIDATES.iter() {
      let prev = previous.take().map(|i| &attempts[i]);
      if !cand.gate.admits(prev) {
        debug!(target: "ai", provider = %cand.provider, model = cand.model, "Gate closed; skipping sub-fallback");
        continue;
      }
      let Some(client) = self.client_for(cand.provider) else {
        debug!(target: "ai", provider = %cand.provider, model = cand.model, "Provider not configured; skipping");
        skipped.push(cand);
        continue;
      };
      if cancel.is_cancelled() {
        warn!(target: "ai", attempts = attempts.len(), "AI request cancelled");
        return Err(FallbackError::Cancelled { attempts });
      }

      info!(target: "ai", provider = %cand.provider, model = cand.model, "Attempting AI candidate");
      let started = Instant::now();
      let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          warn!(target: "ai", provider = %cand.provider, model = cand.model, "AI request cancelled in flight");
          return Err(FallbackError::Cancelled { attempts });
        }
        r = tokio::time::timeout(self.timeout, client.generate(cand.model, req)) => {
          r.unwrap_or_else(|_| Err(ProviderError::Timeout(self.timeout)))
        }
      };
      let elapsed = started.elapsed();

      match result {
        Ok(text) => {
          info!(target: "ai", provider = %cand.provider, model = cand.model, ?elapsed, text_len = text.len(), "AI candidate succeeded");
          attempts.push(Attempt { provider: cand.provider, model: cand.model, outcome: Outcome::Succeeded });
          return Ok(Completion { text, provider: cand.provider, model: cand.model, attempts });
        }
        Err(error) => {
          let rate_limited = cand.classify.matches(&error);
          if rate_limited {
            warn!(target: "ai", provider = %cand.provider, model = cand.model, ?elapsed, error = %error, "AI candidate rate limited or out of quota");
          } else {
            warn!(target: "ai", provider = %cand.provider, model = cand.model, ?elapsed, error = %error, "AI candidate failed");
          }
          attempts.push(Attempt {
            provider: cand.provider,
            model: cand.model,
            outcome: Outcome::Failed { error, rate_limited },
          });
          previous = Some(attempts.len() - 1);
        }
      }
    }

    if attempts.is_empty() {
      attempts = skipped
        .into_iter()
        .map(|c| Attempt {
          provider: c.provider,
          model: c.model,
          outcome: Outcome::Failed { error: ProviderError::NotConfigured, rate_limited: false },
        })
        .collect();
    }

    let last_error = attempts.last().and_then(Attempt::failed).map(ToString::to_string);
    error!(target: "ai", attempts = attempts.len(), last_error = ?last_error, "All AI candidates failed");
    Err(FallbackError::Exhausted { attempts })
  }
}
