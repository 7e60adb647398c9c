use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTrainee;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::attempt::AttemptResultResponse;
use crate::services::attempt_finalize;
use crate::services::integrity::{self, IntegritySignal};

/// Receives a browser-level signal (visibility, key combo, context menu).
/// The first signal that classifies as a violation force-submits the attempt;
/// anything else is acknowledged and discarded.
pub(in crate::api::attempts) async fn report_event(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
    Json(signal): Json<IntegritySignal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(reason) = integrity::classify_signal(&signal) else {
        return Ok(Json(serde_json::json!({ "violation": false })));
    };

    let now = primitive_now_utc();
    let forced_result =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            if session.report_violation(reason, now) {
                Ok(session.result().cloned())
            } else {
                Ok(None)
            }
        })
        .await?;

    let Some(result) = forced_result else {
        // Latched already, or the attempt is terminal; nothing more to force.
        return Ok(Json(serde_json::json!({ "violation": false })));
    };

    tracing::info!(
        attempt_id = %attempt_id,
        trainee_id = %trainee.id,
        reason = reason.as_str(),
        "Integrity violation forced submission"
    );

    let persisted = attempt_finalize::finalize_and_release(&state, &result).await;

    Ok(Json(serde_json::json!({
        "violation": true,
        "reason": reason.as_str(),
        "result": AttemptResultResponse::from_result(&result),
        "result_persisted": persisted,
    })))
}
