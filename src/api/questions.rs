use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Question;
use crate::db::types::QuestionKind;
use crate::repositories;
use crate::schemas::question::{
    QuestionBulkCreate, QuestionCreate, QuestionListResponse, QuestionResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_question).get(list_questions))
        .route("/bulk", post(create_questions_bulk))
        .route("/:question_id", axum::routing::delete(delete_question))
}

async fn create_question(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    validate_payload(&payload)?;
    validate_question_shape(&payload)?;

    let question = insert_question(&state, &admin.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question))))
}

async fn create_questions_bulk(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionBulkCreate>,
) -> Result<(StatusCode, Json<QuestionListResponse>), ApiError> {
    validate_payload(&payload)?;
    for question in &payload.questions {
        validate_question_shape(question)?;
    }

    let mut created = Vec::with_capacity(payload.questions.len());
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    let now = primitive_now_utc();

    for question in &payload.questions {
        let inserted = repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                subject: &question.subject,
                topic: &question.topic,
                prompt: &question.prompt,
                kind: question.kind,
                options: serde_json::json!(question.options),
                correct_answer: &question.correct_answer,
                difficulty: question.difficulty,
                created_by: &admin.id,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
        created.push(QuestionResponse::from_db(inserted));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((StatusCode::CREATED, Json(QuestionListResponse { items: created })))
}

#[derive(Debug, Deserialize)]
struct ListQuestionsQuery {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    skip: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
}

async fn list_questions(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    let questions = repositories::questions::list(
        state.db(),
        query.subject.as_deref(),
        query.skip.unwrap_or(0),
        query.limit.unwrap_or(100),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    Ok(Json(QuestionListResponse {
        items: questions.into_iter().map(QuestionResponse::from_db).collect(),
    }))
}

async fn delete_question(
    Path(question_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::questions::delete_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Question not found".to_string()))
    }
}

/// Kind-specific shape rules the derive validators cannot express.
fn validate_question_shape(question: &QuestionCreate) -> Result<(), ApiError> {
    match question.kind {
        QuestionKind::MultipleChoice => {
            if question.options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "multiple_choice questions need at least two options".to_string(),
                ));
            }
            if !question.options.iter().any(|option| option == &question.correct_answer) {
                return Err(ApiError::BadRequest(
                    "correct_answer must be one of the options".to_string(),
                ));
            }
        }
        QuestionKind::TrueFalse => {
            let answer = question.correct_answer.trim();
            if answer != "true" && answer != "false" {
                return Err(ApiError::BadRequest(
                    "true_false questions must have 'true' or 'false' as the answer".to_string(),
                ));
            }
        }
        QuestionKind::FillBlank => {
            if !question.options.is_empty() {
                return Err(ApiError::BadRequest(
                    "fill_blank questions must not define options".to_string(),
                ));
            }
        }
    }

    Ok(())
}

async fn insert_question(
    state: &AppState,
    admin_id: &str,
    payload: &QuestionCreate,
) -> Result<Question, ApiError> {
    repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            subject: &payload.subject,
            topic: &payload.topic,
            prompt: &payload.prompt,
            kind: payload.kind,
            options: serde_json::json!(payload.options),
            correct_answer: &payload.correct_answer,
            difficulty: payload.difficulty,
            created_by: admin_id,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))
}
