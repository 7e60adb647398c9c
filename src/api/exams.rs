use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::ExamStatus;
use crate::repositories;
use crate::schemas::exam::{ExamCreate, ExamListResponse, ExamResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_exam).get(list_exams))
        .route("/:exam_id", get(get_exam).delete(delete_exam))
        .route("/:exam_id/activate", post(activate_exam))
        .route("/:exam_id/deactivate", post(deactivate_exam))
}

async fn create_exam(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    validate_payload(&payload)?;

    // Refuse a definition the question bank can never satisfy; activation is
    // still the moment the exam goes live.
    let available =
        repositories::questions::count_by_subjects(state.db(), &payload.subjects)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    if available < payload.total_questions as i64 {
        return Err(ApiError::BadRequest(format!(
            "Question bank has {available} questions for the configured subjects but the exam \
             requests {}",
            payload.total_questions
        )));
    }

    let now = primitive_now_utc();
    let exam = repositories::exams::create(
        state.db(),
        repositories::exams::CreateExam {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            description: payload.description.as_deref(),
            duration_minutes: payload.duration_minutes,
            passing_score: payload.passing_score,
            subjects: serde_json::json!(payload.subjects),
            randomize_questions: payload.randomize_questions,
            total_questions: payload.total_questions,
            status: ExamStatus::Draft,
            created_by: &admin.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    Ok((StatusCode::CREATED, Json(ExamResponse::from_db(exam))))
}

#[derive(Debug, Deserialize)]
struct ListExamsQuery {
    #[serde(default)]
    status: Option<ExamStatus>,
    #[serde(default)]
    skip: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
}

async fn list_exams(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListExamsQuery>,
) -> Result<Json<ExamListResponse>, ApiError> {
    let exams = repositories::exams::list(
        state.db(),
        query.status,
        query.skip.unwrap_or(0),
        query.limit.unwrap_or(100),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(ExamListResponse { items: exams.into_iter().map(ExamResponse::from_db).collect() }))
}

async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;
    Ok(Json(ExamResponse::from_db(exam)))
}

/// Makes this exam the single active one, archiving any previous active exam.
async fn activate_exam(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;
    if exam.status != ExamStatus::Draft {
        return Err(ApiError::BadRequest("Only draft exams can be activated".to_string()));
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let displaced = repositories::exams::archive_active(&mut *tx, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to archive active exam"))?;

    let activated = repositories::exams::activate(&mut *tx, &exam_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to activate exam"))?;
    if !activated {
        return Err(ApiError::Conflict("Exam is no longer a draft".to_string()));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    if displaced > 0 {
        tracing::info!(exam_id, displaced, "Activated exam, archiving previous active exam");
    } else {
        tracing::info!(exam_id, "Activated exam");
    }

    let exam = fetch_exam(&state, &exam_id).await?;
    Ok(Json(ExamResponse::from_db(exam)))
}

async fn deactivate_exam(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let archived = repositories::exams::archive(state.db(), &exam_id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to archive exam"))?;
    if !archived {
        return Err(ApiError::BadRequest("Exam is not active".to_string()));
    }

    let exam = fetch_exam(&state, &exam_id).await?;
    Ok(Json(ExamResponse::from_db(exam)))
}

async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;
    if exam.status != ExamStatus::Draft {
        return Err(ApiError::BadRequest(
            "Only draft exams can be deleted; deactivate instead".to_string(),
        ));
    }

    let deleted = repositories::exams::delete_draft(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;
    if !deleted {
        return Err(ApiError::Conflict("Exam is no longer a draft".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_exam(
    state: &AppState,
    exam_id: &str,
) -> Result<crate::db::models::Exam, ApiError> {
    repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}
