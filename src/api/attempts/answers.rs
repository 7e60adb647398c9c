use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTrainee;
use crate::core::state::AppState;
use crate::schemas::attempt::{AnswerSubmit, NavigateAction, NavigateRequest};

/// Records or overwrites one answer; last write wins until submission.
pub(in crate::api::attempts) async fn set_answer(
    Path((attempt_id, question_id)): Path<(String, String)>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSubmit>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let answered =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            session
                .set_answer(&question_id, payload.answer)
                .map_err(super::map_session_error)?;
            Ok(session.answers().len())
        })
        .await?;

    Ok(Json(serde_json::json!({ "success": true, "answered": answered })))
}

/// Moves the question pointer; never touches recorded answers.
pub(in crate::api::attempts) async fn navigate(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let current_index =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            let index = match payload.action {
                NavigateAction::Next => session.next_question(),
                NavigateAction::Previous => session.previous_question(),
                NavigateAction::Jump => {
                    let index = payload.index.ok_or_else(|| {
                        ApiError::BadRequest("index is required for jump".to_string())
                    })?;
                    session.jump_to(index)
                }
            };
            index.map_err(super::map_session_error)
        })
        .await?;

    Ok(Json(serde_json::json!({ "current_index": current_index })))
}

/// Suspends the countdown. Integrity monitoring stays armed while paused.
pub(in crate::api::attempts) async fn pause_attempt(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let remaining =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            session.pause().map_err(super::map_session_error)?;
            Ok(session.time_remaining_seconds())
        })
        .await?;

    Ok(Json(serde_json::json!({ "status": "paused", "time_remaining_seconds": remaining })))
}

pub(in crate::api::attempts) async fn resume_attempt(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let remaining =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            session.resume().map_err(super::map_session_error)?;
            Ok(session.time_remaining_seconds())
        })
        .await?;

    Ok(Json(serde_json::json!({ "status": "in_progress", "time_remaining_seconds": remaining })))
}
