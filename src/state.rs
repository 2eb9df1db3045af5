//! Application state: the AI fallback caller and the prompt set.
//!
//! Requests share this read-only; nothing here is mutated after startup.

use tracing::{info, instrument, warn};

use crate::ai::{FallbackCaller, ProviderKind};
use crate::config::{load_agent_config_from_env, AiSettings, Prompts};

#[derive(Clone)]
pub struct AppState {
    pub ai: FallbackCaller,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load prompt overrides, read AI settings, build provider clients.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, reqwest::Error> {
        let prompts = load_agent_config_from_env()
            .map(|c| c.prompts)
            .unwrap_or_default();

        let settings = AiSettings::from_env();
        let ai = FallbackCaller::from_settings(&settings)?;

        let gemini = ai.is_configured(ProviderKind::Gemini);
        let mistral = ai.is_configured(ProviderKind::Mistral);
        if gemini || mistral {
            info!(target: "dialectic_backend", gemini, mistral, timeout_secs = settings.timeout.as_secs(), "AI providers configured.");
        } else {
            warn!(target: "dialectic_backend", "No AI provider key set (GEMINI_API_KEY/GOOGLE_API_KEY, MISTRAL_API_KEY). AI endpoints will return 503.");
        }

        Ok(Self::new(ai, prompts))
    }

    pub fn new(ai: FallbackCaller, prompts: Prompts) -> Self {
        Self { ai, prompts }
    }
}
