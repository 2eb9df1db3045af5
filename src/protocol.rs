//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::ai::ProviderKind;
use crate::domain::{Difficulty, QuizQuestion};

#[derive(Debug, Deserialize)]
pub struct ExplainIn {
    pub concept: String,
    #[serde(default)]
    pub context: Option<String>,
}
#[derive(Debug, Serialize)]
pub struct ExplainOut {
    pub text: String,
    pub provider: ProviderKind,
    pub model: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsIn {
    pub topic: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub difficulty: Difficulty,
}
#[derive(Debug, Serialize)]
pub struct QuestionsOut {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizIn {
    pub lesson_title: String,
    pub lesson_content: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub providers: ProvidersOut,
}
#[derive(Serialize)]
pub struct ProvidersOut {
    pub gemini: bool,
    pub mistral: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}
