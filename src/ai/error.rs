//! Error types for provider calls and the fallback sequence.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::provider::ProviderKind;
use crate::util::trunc_for_log;

/// Cap for one attempt's error text inside the aggregated message.
const ATTEMPT_DETAIL_MAX: usize = 300;

/// User-facing summary placed in front of every aggregated failure.
pub const ALL_UNAVAILABLE_MESSAGE: &str =
  "Tất cả dịch vụ AI hiện không khả dụng. Vui lòng thử lại sau.";

/// Why a single candidate did not produce usable text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
  #[error("API key not configured")]
  NotConfigured,
  #[error("HTTP {status}: {body}")]
  Http { status: u16, body: String },
  #[error("Request timeout after {}s", .0.as_secs())]
  Timeout(Duration),
  #[error("API returned empty response")]
  EmptyResponse,
  #[error("Transport error: {0}")]
  Transport(String),
  #[error("Invalid response body: {0}")]
  Decode(String),
}

impl ProviderError {
  /// HTTP status when the provider answered with a non-2xx response.
  pub fn status(&self) -> Option<u16> {
    match self {
      ProviderError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// What happened to one candidate during a fallback sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Succeeded,
  Failed { error: ProviderError, rate_limited: bool },
}

/// One entry of the per-call diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
  pub provider: ProviderKind,
  pub model: &'static str,
  pub outcome: Outcome,
}

impl Attempt {
  pub fn failed(&self) -> Option<&ProviderError> {
    match &self.outcome {
      Outcome::Failed { error, .. } => Some(error),
      Outcome::Succeeded => None,
    }
  }

  pub fn rate_limited(&self) -> bool {
    matches!(self.outcome, Outcome::Failed { rate_limited: true, .. })
  }
}

impl fmt::Display for Attempt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.outcome {
      Outcome::Succeeded => write!(f, "{}/{}: ok", self.provider, self.model),
      Outcome::Failed { error, .. } => write!(f, "{}/{}: {}", self.provider, self.model, single_line(&error.to_string())),
    }
  }
}

/// Errors surfaced by [`super::FallbackCaller`].
#[derive(Debug, Error)]
pub enum FallbackError {
  /// Rejected before any network I/O.
  #[error("Invalid AI request: {0}")]
  InvalidRequest(&'static str),
  /// Every attempted candidate failed (or none was configured).
  #[error("{}", render_exhausted(.attempts))]
  Exhausted { attempts: Vec<Attempt> },
  /// The caller cancelled the sequence.
  #[error("AI request cancelled after {} attempt(s)", .attempts.len())]
  Cancelled { attempts: Vec<Attempt> },
}

impl FallbackError {
  pub fn attempts(&self) -> &[Attempt] {
    match self {
      FallbackError::InvalidRequest(_) => &[],
      FallbackError::Exhausted { attempts } | FallbackError::Cancelled { attempts } => attempts,
    }
  }
}

/// Collapse whitespace runs (newlines included) to one space and cap the length.
fn single_line(text: &str) -> String {
  let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
  trunc_for_log(&joined, ATTEMPT_DETAIL_MAX)
}

fn render_exhausted(attempts: &[Attempt]) -> String {
  let mut out = String::from(ALL_UNAVAILABLE_MESSAGE);
  for a in attempts {
    out.push('\n');
    out.push_str(&a.to_string());
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exhausted_message_lists_attempts_in_order_after_prefix() {
    let err = FallbackError::Exhausted {
      attempts: vec![
        Attempt {
          provider: ProviderKind::Gemini,
          model: "gemma-3-27b-it",
          outcome: Outcome::Failed { error: ProviderError::EmptyResponse, rate_limited: false },
        },
        Attempt {
          provider: ProviderKind::Mistral,
          model: "mistral-large-latest",
          outcome: Outcome::Failed {
            error: ProviderError::Http { status: 429, body: "slow down".into() },
            rate_limited: true,
          },
        },
      ],
    };

    let msg = err.to_string();
    let lines: Vec<&str> = msg.lines().collect();
    assert_eq!(lines[0], ALL_UNAVAILABLE_MESSAGE);
    assert_eq!(lines[1], "gemini/gemma-3-27b-it: API returned empty response");
    assert_eq!(lines[2], "mistral/mistral-large-latest: HTTP 429: slow down");
    assert_eq!(lines.len(), 3);
  }

  #[test]
  fn multi_line_bodies_stay_on_one_line_per_attempt() {
    let body = "{\n  \"error\": {\n    \"code\": 500\n  }\n}".to_string();
    let attempts: Vec<Attempt> = ["gemma-3-27b-it", "gemini-2.5-flash"]
      .into_iter()
      .map(|model| Attempt {
        provider: ProviderKind::Gemini,
        model,
        outcome: Outcome::Failed {
          error: ProviderError::Http { status: 500, body: body.clone() },
          rate_limited: false,
        },
      })
      .collect();
    let err = FallbackError::Exhausted { attempts };

    let msg = err.to_string();
    assert_eq!(msg.lines().count(), 3);
    assert_eq!(
      msg.lines().nth(1),
      Some(r#"gemini/gemma-3-27b-it: HTTP 500: { "error": { "code": 500 } }"#)
    );
  }

  #[test]
  fn long_bodies_are_capped_in_attempt_lines() {
    let attempt = Attempt {
      provider: ProviderKind::Mistral,
      model: "mistral-large-latest",
      outcome: Outcome::Failed {
        error: ProviderError::Http { status: 502, body: "x".repeat(5000) },
        rate_limited: false,
      },
    };
    let line = attempt.to_string();
    assert!(line.len() < 400, "line was {} bytes", line.len());
    assert!(line.starts_with("mistral/mistral-large-latest: HTTP 502: xxx"));
  }

  #[test]
  fn timeout_message_carries_seconds() {
    let e = ProviderError::Timeout(Duration::from_secs(120));
    assert_eq!(e.to_string(), "Request timeout after 120s");
    assert_eq!(e.status(), None);
  }
}
