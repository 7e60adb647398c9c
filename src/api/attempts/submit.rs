use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTrainee;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::AttemptResultResponse;
use crate::services::attempt_finalize;

/// Manual submission. The trainee's confirmation dialog is the client's
/// concern; by the time this endpoint is called the decision is final.
pub(in crate::api::attempts) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = primitive_now_utc();
    let result =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            session.submit_manual(now).map(Clone::clone).map_err(super::map_session_error)
        })
        .await?;

    tracing::info!(attempt_id = %attempt_id, trainee_id = %trainee.id, "Attempt submitted manually");

    let persisted = attempt_finalize::finalize_and_release(&state, &result).await;

    Ok(Json(serde_json::json!({
        "result": AttemptResultResponse::from_result(&result),
        "result_persisted": persisted,
    })))
}

/// Read-only result view. Serves the durable record when it exists, falling
/// back to the optimistic in-memory result while the write is still retrying.
pub(in crate::api::attempts) async fn attempt_result(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let record = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    if let Some(record) = record {
        if record.trainee_id != trainee.id {
            return Err(ApiError::Forbidden("Access denied"));
        }
        if record.status == AttemptStatus::Completed {
            return Ok(Json(AttemptResultResponse::from_db(record)));
        }
    }

    let pending = state
        .sessions()
        .with_session(&attempt_id, |session| {
            if session.trainee_id() != trainee.id {
                return Err(ApiError::Forbidden("Access denied"));
            }
            Ok(session.result().map(AttemptResultResponse::from_result))
        })
        .await
        .transpose()?
        .flatten();

    match pending {
        Some(result) => Ok(Json(result)),
        None => Err(ApiError::NotFound("No finalized result for this attempt".to_string())),
    }
}
