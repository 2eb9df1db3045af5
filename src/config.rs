//! Runtime configuration.
//!
//! - `AiSettings`: provider keys, base URLs and the per-call timeout, from env.
//! - `AgentConfig`: prompt overrides loaded from the TOML file at AGENT_CONFIG_PATH.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::ai::{gemini, mistral};

/// Either name may hold the Google key; the first non-empty one wins.
pub const GEMINI_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];
pub const MISTRAL_KEY_VAR: &str = "MISTRAL_API_KEY";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct AiSettings {
  pub gemini_api_key: Option<String>,
  pub mistral_api_key: Option<String>,
  pub gemini_base_url: String,
  pub mistral_base_url: String,
  pub timeout: Duration,
}

impl AiSettings {
  pub fn from_env() -> Self {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Build settings from any variable source. Empty values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let gemini_api_key = GEMINI_KEY_VARS.iter().find_map(|name| get(*name));
    let mistral_api_key = get(MISTRAL_KEY_VAR);
    let gemini_base_url = get("GEMINI_BASE_URL").unwrap_or_else(|| gemini::DEFAULT_BASE_URL.into());
    let mistral_base_url = get("MISTRAL_BASE_URL").unwrap_or_else(|| mistral::DEFAULT_BASE_URL.into());
    let timeout_secs = match get("AI_TIMEOUT_SECS") {
      Some(raw) => match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
          error!(target: "dialectic_backend", value = %raw, "Invalid AI_TIMEOUT_SECS; using default");
          DEFAULT_TIMEOUT_SECS
        }
      },
      None => DEFAULT_TIMEOUT_SECS,
    };

    Self {
      gemini_api_key,
      mistral_api_key,
      gemini_base_url,
      mistral_base_url,
      timeout: Duration::from_secs(timeout_secs),
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts for the AI-backed helpers. Templates use `{key}` placeholders.
/// Any field missing from TOML keeps its default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Concept explainer
  pub explain_system: String,
  pub explain_user_template: String,
  // Question bank generator
  pub questions_system: String,
  pub questions_user_template: String,
  // Lesson quiz generator
  pub quiz_system: String,
  pub quiz_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      explain_system: "Bạn là trợ giảng triết học Mác - Lênin. Giải thích ngắn gọn, chính xác, có ví dụ thực tế. Trả lời bằng tiếng Việt.".into(),
      explain_user_template: "Giải thích khái niệm: {concept}\nNgữ cảnh bài học: {context}".into(),
      questions_system: "Bạn là người soạn câu hỏi trắc nghiệm triết học Mác - Lênin. CHỈ trả về JSON hợp lệ, không thêm lời dẫn.".into(),
      questions_user_template: "Soạn {count} câu hỏi trắc nghiệm về chủ đề \"{topic}\", độ khó {difficulty}. Trả về một mảng JSON, mỗi phần tử có dạng {\"question\": string, \"options\": [4 string], \"correctAnswer\": số thứ tự 0-3, \"explanation\": string}.".into(),
      quiz_system: "Bạn là người soạn bài kiểm tra cho khóa học triết học Mác - Lênin. Chỉ dùng nội dung bài học được cung cấp. CHỈ trả về JSON hợp lệ.".into(),
      quiz_user_template: "Bài học: {title}\nNội dung:\n{content}\n\nSoạn bài kiểm tra {count} câu, độ khó {difficulty}. Trả về JSON {\"title\": string, \"questions\": [{\"question\": string, \"options\": [4 string], \"correctAnswer\": 0-3, \"explanation\": string}]}.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "dialectic_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "dialectic_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "dialectic_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}
