//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Explaining a concept (plain text)
//!   - Generating a bank of multiple-choice questions for a topic
//!   - Generating a quiz from a lesson's content
//!
//! Every call goes through the fallback caller; model output is parsed leniently
//! and each question is validated before it reaches a client.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::ai::{CallRequest, Completion, FallbackError};
use crate::domain::{Difficulty, Quiz, QuizQuestion};
use crate::state::AppState;
use crate::util::{extract_json_span, fill_template, trunc_for_log};

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const MAX_QUESTION_COUNT: usize = 20;
const GENERATION_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LogicError {
  #[error("{0}")]
  InvalidInput(&'static str),
  #[error(transparent)]
  Ai(#[from] FallbackError),
  #[error("AI returned unusable content: {0}")]
  BadModelOutput(String),
}

pub fn clamp_count(count: Option<usize>) -> usize {
  count.unwrap_or(DEFAULT_QUESTION_COUNT).clamp(1, MAX_QUESTION_COUNT)
}

#[instrument(level = "info", skip(state, concept, context), fields(concept_len = concept.len(), has_context = context.is_some()))]
pub async fn explain_concept(state: &AppState, concept: &str, context: Option<&str>) -> Result<Completion, LogicError> {
  let concept = concept.trim();
  if concept.is_empty() {
    return Err(LogicError::InvalidInput("concept must not be empty"));
  }
  let context = context.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("(không có)");

  let user = fill_template(&state.prompts.explain_user_template, &[("concept", concept), ("context", context)]);
  let req = CallRequest::new(user, state.prompts.explain_system.clone());
  let out = state.ai.generate(&req).await?;
  info!(target: "dialectic_backend", provider = %out.provider, model = out.model, attempts = out.attempts.len(), text_len = out.text.len(), "Concept explained");
  Ok(out)
}

#[instrument(level = "info", skip(state, topic), fields(topic_len = topic.len(), ?difficulty))]
pub async fn generate_questions(
  state: &AppState,
  topic: &str,
  count: Option<usize>,
  difficulty: Difficulty,
) -> Result<Vec<QuizQuestion>, LogicError> {
  let topic = topic.trim();
  if topic.is_empty() {
    return Err(LogicError::InvalidInput("topic must not be empty"));
  }
  let count = clamp_count(count);
  let count_s = count.to_string();

  let user = fill_template(
    &state.prompts.questions_user_template,
    &[("count", &count_s), ("topic", topic), ("difficulty", difficulty.prompt_label())],
  );
  let req = CallRequest::new(user, state.prompts.questions_system.clone())
    .with_temperature(0.7)
    .with_max_tokens(GENERATION_MAX_TOKENS);
  let out = state.ai.generate(&req).await?;

  let mut questions = parse_questions(&out.text).map_err(LogicError::BadModelOutput)?;
  questions.truncate(count);
  info!(target: "quiz", provider = %out.provider, model = out.model, attempts = out.attempts.len(), requested = count, got = questions.len(), "Questions generated");
  Ok(questions)
}

#[instrument(level = "info", skip(state, title, content), fields(title_len = title.len(), content_len = content.len(), ?difficulty))]
pub async fn generate_quiz(
  state: &AppState,
  title: &str,
  content: &str,
  count: Option<usize>,
  difficulty: Difficulty,
) -> Result<Quiz, LogicError> {
  let title = title.trim();
  let content = content.trim();
  if title.is_empty() {
    return Err(LogicError::InvalidInput("lessonTitle must not be empty"));
  }
  if content.is_empty() {
    return Err(LogicError::InvalidInput("lessonContent must not be empty"));
  }
  let count = clamp_count(count);
  let count_s = count.to_string();

  let user = fill_template(
    &state.prompts.quiz_user_template,
    &[("title", title), ("content", content), ("count", &count_s), ("difficulty", difficulty.prompt_label())],
  );
  let req = CallRequest::new(user, state.prompts.quiz_system.clone())
    .with_temperature(0.5)
    .with_max_tokens(GENERATION_MAX_TOKENS);
  let out = state.ai.generate(&req).await?;

  let (generated_title, mut questions) = parse_quiz(&out.text).map_err(LogicError::BadModelOutput)?;
  questions.truncate(count);
  let quiz = Quiz {
    id: Uuid::new_v4(),
    title: generated_title.unwrap_or_else(|| format!("Kiểm tra: {}", title)),
    difficulty,
    questions,
  };
  info!(target: "quiz", quiz_id = %quiz.id, provider = %out.provider, model = out.model, questions = quiz.questions.len(), "Quiz generated");
  Ok(quiz)
}

// -------- Parsing model output --------

/// Parse a JSON array of questions out of free-form model text.
/// Invalid items are dropped; an empty result is an error.
pub fn parse_questions(text: &str) -> Result<Vec<QuizQuestion>, String> {
  let span = extract_json_span(text, '[', ']').ok_or_else(|| "no JSON array in response".to_string())?;
  let items: Vec<serde_json::Value> =
    serde_json::from_str(span).map_err(|e| format!("JSON parse error: {}", e))?;
  keep_valid(items)
}

/// Parse `{ "title", "questions": [...] }`, or a bare questions array.
pub fn parse_quiz(text: &str) -> Result<(Option<String>, Vec<QuizQuestion>), String> {
  #[derive(Deserialize)]
  struct Gen {
    #[serde(default)] title: Option<String>,
    questions: Vec<serde_json::Value>,
  }

  if let Some(span) = extract_json_span(text, '{', '}') {
    if let Ok(gen) = serde_json::from_str::<Gen>(span) {
      let title = gen.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
      return Ok((title, keep_valid(gen.questions)?));
    }
  }
  parse_questions(text).map(|qs| (None, qs))
}

fn keep_valid(items: Vec<serde_json::Value>) -> Result<Vec<QuizQuestion>, String> {
  let total = items.len();
  let mut out = Vec::with_capacity(total);
  for (i, item) in items.into_iter().enumerate() {
    match serde_json::from_value::<QuizQuestion>(item) {
      Ok(q) => match q.problem() {
        None => out.push(trimmed(q)),
        Some(why) => warn!(target: "quiz", index = i, reason = why, question = %trunc_for_log(&q.question, 80), "Dropping generated question"),
      },
      Err(e) => warn!(target: "quiz", index = i, error = %e, "Dropping malformed generated question"),
    }
  }
  if out.is_empty() {
    return Err(format!("none of {} generated questions were valid", total));
  }
  Ok(out)
}

fn trimmed(q: QuizQuestion) -> QuizQuestion {
  QuizQuestion {
    question: q.question.trim().to_string(),
    options: q.options.iter().map(|o| o.trim().to_string()).collect(),
    correct_answer: q.correct_answer,
    explanation: q.explanation.trim().to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ai::error::ProviderError;
  use crate::ai::provider::TextGenerator;
  use crate::ai::FallbackCaller;
  use crate::config::Prompts;
  use async_trait::async_trait;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  const TWO_QUESTIONS: &str = r#"```json
[
  {"question": " Ai là người sáng lập chủ nghĩa duy vật biện chứng? ", "options": ["Marx và Engels", "Hegel", "Kant", "Feuerbach"], "correctAnswer": 0, "explanation": "Marx và Engels."},
  {"question": "Quy luật nào là hạt nhân của phép biện chứng?", "options": ["Lượng - chất", "Mâu thuẫn", "Phủ định của phủ định", "Nhân quả"], "correctAnswer": 1}
]
```"#;

  /// Answers every call with the same text and keeps the last request.
  struct Canned {
    text: &'static str,
    last: Mutex<Option<CallRequest>>,
  }

  #[async_trait]
  impl TextGenerator for Canned {
    async fn generate(&self, _model: &str, req: &CallRequest) -> Result<String, ProviderError> {
      *self.last.lock().unwrap() = Some(req.clone());
      Ok(self.text.to_string())
    }
  }

  fn state_with(text: &'static str) -> (AppState, Arc<Canned>) {
    let canned = Arc::new(Canned { text, last: Mutex::new(None) });
    let ai = FallbackCaller::new(Some(canned.clone() as Arc<dyn TextGenerator>), None, Duration::from_secs(5));
    (AppState::new(ai, Prompts::default()), canned)
  }

  #[test]
  fn parses_fenced_array_and_trims() {
    let qs = parse_questions(TWO_QUESTIONS).unwrap();
    assert_eq!(qs.len(), 2);
    assert_eq!(qs[0].question, "Ai là người sáng lập chủ nghĩa duy vật biện chứng?");
    assert_eq!(qs[1].correct_answer, 1);
    assert_eq!(qs[1].explanation, "");
  }

  #[test]
  fn drops_invalid_items_but_keeps_good_ones() {
    let text = r#"[
      {"question": "Q1", "options": ["a","b","c","d"], "correctAnswer": 9},
      {"question": "Q2", "options": ["a","b"], "correctAnswer": 0},
      {"nope": true},
      {"question": "Q3", "options": ["a","b","c","d"], "correctAnswer": 2}
    ]"#;
    let qs = parse_questions(text).unwrap();
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].question, "Q3");
  }

  #[test]
  fn rejects_output_without_valid_questions() {
    assert!(parse_questions("Xin lỗi, tôi không thể.").is_err());
    assert!(parse_questions(r#"[{"question": "", "options": ["a","b","c","d"], "correctAnswer": 0}]"#).is_err());
  }

  #[test]
  fn quiz_parser_accepts_object_or_bare_array() {
    let obj = r#"{"title": "Phép biện chứng", "questions": [{"question": "Q", "options": ["a","b","c","d"], "correctAnswer": 3}]}"#;
    let (title, qs) = parse_quiz(obj).unwrap();
    assert_eq!(title.as_deref(), Some("Phép biện chứng"));
    assert_eq!(qs.len(), 1);

    let (title, qs) = parse_quiz(TWO_QUESTIONS).unwrap();
    assert_eq!(title, None);
    assert_eq!(qs.len(), 2);
  }

  #[test]
  fn count_is_clamped() {
    assert_eq!(clamp_count(None), 5);
    assert_eq!(clamp_count(Some(0)), 1);
    assert_eq!(clamp_count(Some(100)), 20);
  }

  #[tokio::test]
  async fn questions_prompt_carries_topic_count_and_difficulty() {
    let (state, canned) = state_with(TWO_QUESTIONS);
    let qs = generate_questions(&state, "Phép biện chứng duy vật", Some(1), Difficulty::Hard).await.unwrap();
    assert_eq!(qs.len(), 1);

    let req = canned.last.lock().unwrap().clone().unwrap();
    assert!(req.prompt.contains("Soạn 1 câu hỏi"));
    assert!(req.prompt.contains("Phép biện chứng duy vật"));
    assert!(req.prompt.contains("khó"));
    assert_eq!(req.system_prompt, Prompts::default().questions_system);
    assert_eq!(req.max_tokens, 4096);
  }

  #[tokio::test]
  async fn quiz_falls_back_to_lesson_title() {
    let (state, _) = state_with(TWO_QUESTIONS);
    let quiz = generate_quiz(&state, "Bài 3", "Nội dung về mâu thuẫn.", None, Difficulty::Easy).await.unwrap();
    assert_eq!(quiz.title, "Kiểm tra: Bài 3");
    assert_eq!(quiz.questions.len(), 2);
    assert_eq!(quiz.difficulty, Difficulty::Easy);
  }

  #[tokio::test]
  async fn bad_model_output_is_reported() {
    let (state, _) = state_with("Tôi không biết.");
    let err = generate_questions(&state, "Vật chất", None, Difficulty::Medium).await.unwrap_err();
    assert!(matches!(err, LogicError::BadModelOutput(_)));
  }

  #[tokio::test]
  async fn explain_fills_default_context_and_rejects_blank_concept() {
    let (state, canned) = state_with("Vật chất là phạm trù triết học...");
    let out = explain_concept(&state, "Vật chất", None).await.unwrap();
    assert_eq!(out.text, "Vật chất là phạm trù triết học...");
    let req = canned.last.lock().unwrap().clone().unwrap();
    assert!(req.prompt.contains("(không có)"));
    assert_eq!(req.temperature, 0.4);

    let err = explain_concept(&state, "   ", None).await.unwrap_err();
    assert!(matches!(err, LogicError::InvalidInput(_)));
  }
}
