//! Rate-limit and quota heuristics.
//!
//! A structured HTTP 429 always counts. Otherwise we look for text fragments
//! providers are known to put in their error bodies. Timeouts never count.

use super::error::ProviderError;

/// Which fragment list applies to a candidate's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitRule {
  /// Google quota exhaustion or capacity errors.
  GeminiRateLimit,
  /// Mistral 429 or service-tier capacity errors.
  MistralCapacity,
  /// Google quota exhaustion only.
  GeminiQuota,
}

const GEMINI_RATE_LIMIT_MARKERS: &[&str] =
  &["429", "quota", "RESOURCE_EXHAUSTED", "service_tier_capacity_exceeded"];
const GEMINI_QUOTA_MARKERS: &[&str] = &["429", "quota", "RESOURCE_EXHAUSTED"];
// Compared lowercased.
const MISTRAL_CAPACITY_MARKERS: &[&str] =
  &["429", "service tier capacity exceeded", "service_tier_capacity_exceeded"];

impl RateLimitRule {
  pub fn matches(&self, err: &ProviderError) -> bool {
    if matches!(err, ProviderError::Timeout(_) | ProviderError::NotConfigured) {
      return false;
    }
    if err.status() == Some(429) {
      return true;
    }

    let text = err.to_string();
    match self {
      RateLimitRule::GeminiRateLimit => contains_any(&text, GEMINI_RATE_LIMIT_MARKERS),
      RateLimitRule::GeminiQuota => contains_any(&text, GEMINI_QUOTA_MARKERS),
      RateLimitRule::MistralCapacity => {
        contains_any(&text, MISTRAL_CAPACITY_MARKERS)
          || contains_any(&text.to_lowercase(), MISTRAL_CAPACITY_MARKERS)
      }
    }
  }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
  needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn http(status: u16, body: &str) -> ProviderError {
    ProviderError::Http { status, body: body.into() }
  }

  #[test]
  fn status_429_is_rate_limited_for_every_rule() {
    for rule in [RateLimitRule::GeminiRateLimit, RateLimitRule::MistralCapacity, RateLimitRule::GeminiQuota] {
      assert!(rule.matches(&http(429, "")), "{rule:?}");
    }
  }

  #[test]
  fn gemini_fragments() {
    let r = RateLimitRule::GeminiRateLimit;
    assert!(r.matches(&http(403, "{\"status\": \"RESOURCE_EXHAUSTED\"}")));
    assert!(r.matches(&http(400, "You exceeded your current quota")));
    assert!(r.matches(&http(503, "service_tier_capacity_exceeded")));
    assert!(!r.matches(&http(500, "internal error")));

    // Quota rule does not include the capacity marker.
    assert!(!RateLimitRule::GeminiQuota.matches(&http(503, "service_tier_capacity_exceeded")));
    assert!(RateLimitRule::GeminiQuota.matches(&http(400, "quota exceeded for metric")));
  }

  #[test]
  fn mistral_fragments_are_case_insensitive() {
    let r = RateLimitRule::MistralCapacity;
    assert!(r.matches(&http(503, "Service Tier Capacity Exceeded for this model")));
    assert!(r.matches(&http(400, "{\"code\":\"SERVICE_TIER_CAPACITY_EXCEEDED\"}")));
    assert!(!r.matches(&http(500, "internal error")));
    assert!(!r.matches(&http(400, "quota")));
  }

  #[test]
  fn timeouts_are_never_rate_limits() {
    let t = ProviderError::Timeout(Duration::from_secs(429));
    assert!(!RateLimitRule::GeminiRateLimit.matches(&t));
    assert!(!RateLimitRule::MistralCapacity.matches(&t));
    assert!(!RateLimitRule::GeminiQuota.matches(&t));
  }

  #[test]
  fn transport_text_can_still_match() {
    let e = ProviderError::Transport("upstream said 429".into());
    assert!(RateLimitRule::GeminiQuota.matches(&e));
    assert!(!RateLimitRule::GeminiQuota.matches(&ProviderError::EmptyResponse));
  }
}
