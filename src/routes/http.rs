//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs basic parameter and result info.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, FromRequest, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument, warn};

use crate::ai::{FallbackError, ProviderKind};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

/// JSON body extractor whose rejections answer with `ErrorOut` like every other error.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Errors mapped onto HTTP responses.
pub enum ApiError {
  /// The request body could not be read as the endpoint's JSON input.
  Body(JsonRejection),
  Logic(LogicError),
}

impl From<LogicError> for ApiError {
  fn from(e: LogicError) -> Self {
    ApiError::Logic(e)
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::Body(rejection)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::Body(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
      ApiError::Logic(e) => {
        let status = match &e {
          LogicError::InvalidInput(_) | LogicError::Ai(FallbackError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
          LogicError::Ai(FallbackError::Exhausted { .. } | FallbackError::Cancelled { .. }) => StatusCode::SERVICE_UNAVAILABLE,
          LogicError::BadModelOutput(_) => StatusCode::BAD_GATEWAY,
        };
        (status, e.to_string())
      }
    };
    if status.is_server_error() {
      error!(target: "dialectic_backend", %status, error = %message, "AI request failed");
    } else {
      warn!(target: "dialectic_backend", %status, error = %message, "Rejected request");
    }
    (status, Json(ErrorOut { error: message })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    providers: ProvidersOut {
      gemini: state.ai.is_configured(ProviderKind::Gemini),
      mistral: state.ai.is_configured(ProviderKind::Mistral),
    },
  })
}

#[instrument(level = "info", skip(state, body), fields(concept_len = body.concept.len()))]
pub async fn http_post_explain(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<ExplainIn>,
) -> Result<Json<ExplainOut>, ApiError> {
  let out = explain_concept(&state, &body.concept, body.context.as_deref()).await?;
  info!(target: "dialectic_backend", provider = %out.provider, model = out.model, "HTTP explain served");
  Ok(Json(ExplainOut { text: out.text, provider: out.provider, model: out.model }))
}

#[instrument(level = "info", skip(state, body), fields(topic_len = body.topic.len(), count = ?body.count, difficulty = ?body.difficulty))]
pub async fn http_post_questions(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<QuestionsIn>,
) -> Result<Json<QuestionsOut>, ApiError> {
  let questions = generate_questions(&state, &body.topic, body.count, body.difficulty).await?;
  info!(target: "quiz", count = questions.len(), "HTTP questions served");
  Ok(Json(QuestionsOut { questions }))
}

#[instrument(level = "info", skip(state, body), fields(content_len = body.lesson_content.len(), count = ?body.count, difficulty = ?body.difficulty))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<QuizIn>,
) -> Result<impl IntoResponse, ApiError> {
  let quiz = generate_quiz(&state, &body.lesson_title, &body.lesson_content, body.count, body.difficulty).await?;
  info!(target: "quiz", quiz_id = %quiz.id, questions = quiz.questions.len(), "HTTP quiz served");
  Ok(Json(quiz))
}
