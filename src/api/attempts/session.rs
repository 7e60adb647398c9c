use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTrainee;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::attempt::{
    ActiveAttemptResponse, AttemptResultResponse, CbtExamView, StartAttemptRequest,
};
use crate::schemas::exam::ExamSummaryResponse;
use crate::services::attempt_finalize;
use crate::services::attempt_session::AttemptSession;
use crate::services::exam_loader::{self, LoadError, LoadOutcome};
use crate::services::integrity::{self, WindowMetrics};
use crate::services::session_registry::RegistryError;

/// What the CBT screen renders on open: the active exam, the trainee's prior
/// result, or a blocking configuration error.
pub(in crate::api::attempts) async fn load_exam(
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
) -> Result<Json<CbtExamView>, ApiError> {
    match exam_loader::load(state.db(), &trainee).await {
        Ok(LoadOutcome::Available { exam, .. }) => {
            Ok(Json(CbtExamView::Available { exam: ExamSummaryResponse::from_db(&exam) }))
        }
        Ok(LoadOutcome::AlreadyTaken { exam, record }) => Ok(Json(CbtExamView::AlreadyTaken {
            exam: ExamSummaryResponse::from_db(&exam),
            result: AttemptResultResponse::from_db(record),
        })),
        Err(err) => Err(map_load_error(err)),
    }
}

/// `not_started -> in_progress`: creates the attempt stub and the in-memory
/// session, fixing this attempt's question selection.
pub(in crate::api::attempts) async fn start_attempt(
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<ActiveAttemptResponse>), ApiError> {
    if !payload.confirmed {
        return Err(ApiError::BadRequest(
            "Starting the exam must be explicitly confirmed".to_string(),
        ));
    }

    // Re-entry after a page refresh: hand back the live session unchanged.
    if let Some(attempt_id) = state.sessions().attempt_id_for_trainee(&trainee.id).await {
        let response =
            super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
                Ok(super::session_to_response(session))
            })
            .await?;
        return Ok((StatusCode::OK, Json(response)));
    }

    let (exam, questions, selection_seed) = match exam_loader::load(state.db(), &trainee).await {
        Ok(LoadOutcome::Available { exam, questions, selection_seed }) => {
            (exam, questions, selection_seed)
        }
        Ok(LoadOutcome::AlreadyTaken { .. }) => {
            return Err(ApiError::Conflict("This exam has already been taken".to_string()));
        }
        Err(err) => return Err(map_load_error(err)),
    };

    let attempt_id = Uuid::new_v4().to_string();
    let exam_id = exam.id.clone();
    let question_ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
    let question_ids_json = serde_json::json!(question_ids);

    // Reserve the registry slot first so a full service never leaves an
    // in-progress stub behind.
    let session =
        AttemptSession::new(attempt_id.clone(), trainee.id.clone(), exam, questions);
    state.sessions().insert(session).await.map_err(|err| match err {
        RegistryError::AtCapacity => ApiError::ServiceUnavailable(
            "Exam service is temporarily at capacity. Try again in a few minutes.".to_string(),
        ),
    })?;

    let now = primitive_now_utc();
    let stub = repositories::attempts::create_stub(
        state.db(),
        repositories::attempts::CreateStub {
            id: &attempt_id,
            exam_id: &exam_id,
            trainee_id: &trainee.id,
            trainee_name: &trainee.full_name,
            trainee_email: &trainee.email,
            question_ids: question_ids_json,
            selection_seed,
            started_at: now,
            created_at: now,
            updated_at: now,
        },
    )
    .await;

    let inserted = match stub {
        Ok(inserted) => inserted,
        Err(err) => {
            state.sessions().remove(&attempt_id).await;
            return Err(ApiError::internal(err, "Failed to create attempt stub"));
        }
    };

    if !inserted {
        state.sessions().remove(&attempt_id).await;
        return Err(ApiError::Conflict("An attempt already exists for this exam".to_string()));
    }

    let response = super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
        session.begin(now).map_err(super::map_session_error)?;
        Ok(super::session_to_response(session))
    })
    .await?;

    metrics::counter!("attempts_started_total").increment(1);
    tracing::info!(attempt_id = %attempt_id, trainee_id = %trainee.id, "Attempt started");

    Ok((StatusCode::CREATED, Json(response)))
}

/// Restores the live session after a page refresh.
pub(in crate::api::attempts) async fn current_attempt(
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
) -> Result<Json<ActiveAttemptResponse>, ApiError> {
    let Some(attempt_id) = state.sessions().attempt_id_for_trainee(&trainee.id).await else {
        return Err(ApiError::NotFound("No attempt in progress".to_string()));
    };

    let response = super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
        Ok(super::session_to_response(session))
    })
    .await?;

    Ok(Json(response))
}

/// The 1 Hz client heartbeat: echoes the countdown and screens the reported
/// window dimensions for the docked-devtools heuristic.
pub(in crate::api::attempts) async fn heartbeat(
    Path(attempt_id): Path<String>,
    CurrentTrainee(trainee): CurrentTrainee,
    State(state): State<AppState>,
    Json(window_metrics): Json<WindowMetrics>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interval = state.settings().attempt().heartbeat_interval_seconds.max(1);
    let rate_key = format!("hb:{attempt_id}");
    let allowed = match state.redis().rate_limit(&rate_key, 1, interval).await {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "Failed to check heartbeat rate limit");
            true
        }
    };
    if !allowed {
        return Err(ApiError::TooManyRequests("Heartbeat rate limit exceeded"));
    }

    let now = primitive_now_utc();
    let violation = integrity::evaluate_window_metrics(&window_metrics);

    let (forced_result, status, remaining) =
        super::with_owned_session(&state, &attempt_id, &trainee.id, |session| {
            let forced = violation
                .filter(|&reason| session.report_violation(reason, now))
                .and_then(|_| session.result().cloned());
            Ok((forced, session.status().as_str(), session.time_remaining_seconds()))
        })
        .await?;

    if let Some(result) = forced_result {
        let persisted = attempt_finalize::finalize_and_release(&state, &result).await;
        return Ok(Json(serde_json::json!({
            "violation": true,
            "reason": result.violation_reason,
            "result": AttemptResultResponse::from_result(&result),
            "result_persisted": persisted,
        })));
    }

    Ok(Json(serde_json::json!({
        "violation": false,
        "status": status,
        "time_remaining_seconds": remaining,
    })))
}

fn map_load_error(err: LoadError) -> ApiError {
    match err {
        LoadError::NoActiveExam => {
            ApiError::NotFound("No active exam is currently available".to_string())
        }
        LoadError::NoQuestionsForSubjects | LoadError::BankTooSmall { .. } => {
            ApiError::Conflict(err.to_string())
        }
        LoadError::Db(err) => ApiError::internal(err, "Failed to load exam"),
    }
}
