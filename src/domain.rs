//! Domain models for AI-generated learning content.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  /// Label used inside prompts.
  pub fn prompt_label(&self) -> &'static str {
    match self {
      Difficulty::Easy => "dễ",
      Difficulty::Medium => "trung bình",
      Difficulty::Hard => "khó",
    }
  }
}

/// Multiple-choice question. `correct_answer` indexes into `options`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: usize,
  #[serde(default)]
  pub explanation: String,
}

pub const OPTIONS_PER_QUESTION: usize = 4;

impl QuizQuestion {
  /// Why the question is unusable, if it is.
  pub fn problem(&self) -> Option<&'static str> {
    if self.question.trim().is_empty() {
      Some("empty question text")
    } else if self.options.len() != OPTIONS_PER_QUESTION {
      Some("expected exactly four options")
    } else if self.options.iter().any(|o| o.trim().is_empty()) {
      Some("empty option")
    } else if self.correct_answer >= self.options.len() {
      Some("correctAnswer out of range")
    } else {
      None
    }
  }
}

/// A quiz generated for one lesson.
#[derive(Clone, Debug, Serialize)]
pub struct Quiz {
  pub id: Uuid,
  pub title: String,
  pub difficulty: Difficulty,
  pub questions: Vec<QuizQuestion>,
}
