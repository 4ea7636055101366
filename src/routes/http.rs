//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; session errors map onto 400/404/409/500.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::errors::SessionError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// `SessionError` rendered as `{ "error": ... }` with a matching status code.
#[derive(Debug)]
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      SessionError::EmptyTeamName | SessionError::EmptyRoster => StatusCode::BAD_REQUEST,
      SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
      SessionError::InvalidPhase { .. } | SessionError::NotFinished => StatusCode::CONFLICT,
      SessionError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(target: "session", %status, error = %self.0, "Request rejected");
    (status, Json(ErrorOut { error: self.0.to_string() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "debug", skip(state))]
pub async fn http_get_clock(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ClockOut { now: logic::clock_now(&state) })
}

#[instrument(level = "info", skip(state, body), fields(team = %body.name, roster_len = body.participants.len()))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateSessionIn>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
  let view = logic::create_session(&state, &body.name, &body.participants).await?;
  info!(target: "session", id = %view.id, roster = view.participants.len(), "HTTP session created");
  Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::get_session(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_select_next(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<SessionView> {
  let view = logic::select_next(&state, &id).await?;
  info!(target: "session", %id, participant = ?view.current_participant.as_ref().map(|p| &p.name), "HTTP next participant served");
  Ok(Json(view))
}

#[instrument(level = "debug", skip(state, body), fields(code_len = body.code.len()))]
pub async fn http_update_submission(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<SubmissionIn>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::update_submission(&state, &id, body.code).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_submission(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::reset_submission(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::submit(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_acknowledge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<AcknowledgeOut> {
  let out = logic::acknowledge(&state, &id).await?;
  if out.completed.is_some() {
    info!(target: "session", %id, total = out.session.total_score, "HTTP session completed");
  }
  Ok(Json(out))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_summary(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<crate::domain::CompletedSession> {
  Ok(Json(logic::summary(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  logic::end_session(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}
