use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, trainee_id, trainee_name, trainee_email, status, question_ids, \
    selection_seed, answers, correct_count, wrong_count, unanswered_count, \
    percentage, is_passed, auto_submitted, violation_reason, started_at, ended_at, \
    time_spent_minutes, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// The retake-prevention lookup: at most one row exists per (exam, trainee).
pub(crate) async fn find_by_exam_and_trainee(
    pool: &PgPool,
    exam_id: &str,
    trainee_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE exam_id = $1 AND trainee_id = $2"
    ))
    .bind(exam_id)
    .bind(trainee_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateStub<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) trainee_id: &'a str,
    pub(crate) trainee_name: &'a str,
    pub(crate) trainee_email: &'a str,
    pub(crate) question_ids: serde_json::Value,
    pub(crate) selection_seed: Option<i64>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Inserts the provisional in-progress row. `false` means the unique
/// (exam_id, trainee_id) key already has a row, i.e. the trainee lost a
/// start race or already took this exam.
pub(crate) async fn create_stub(
    executor: impl sqlx::PgExecutor<'_>,
    stub: CreateStub<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (
            id, exam_id, trainee_id, trainee_name, trainee_email, status,
            question_ids, selection_seed, started_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        ON CONFLICT DO NOTHING",
    )
    .bind(stub.id)
    .bind(stub.exam_id)
    .bind(stub.trainee_id)
    .bind(stub.trainee_name)
    .bind(stub.trainee_email)
    .bind(AttemptStatus::InProgress)
    .bind(stub.question_ids)
    .bind(stub.selection_seed)
    .bind(stub.started_at)
    .bind(stub.created_at)
    .bind(stub.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) struct FinalizeAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) answers: &'a HashMap<String, String>,
    pub(crate) correct_count: i32,
    pub(crate) wrong_count: i32,
    pub(crate) unanswered_count: i32,
    pub(crate) percentage: i32,
    pub(crate) is_passed: bool,
    pub(crate) auto_submitted: bool,
    pub(crate) violation_reason: Option<&'a str>,
    pub(crate) ended_at: PrimitiveDateTime,
    pub(crate) time_spent_minutes: i32,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// The exactly-once result write: the status guard makes a second finalize
/// for the same attempt a no-op, reported as `false`.
pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    params: FinalizeAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts SET
            status = $1, answers = $2, correct_count = $3, wrong_count = $4,
            unanswered_count = $5, percentage = $6, is_passed = $7,
            auto_submitted = $8, violation_reason = $9, ended_at = $10,
            time_spent_minutes = $11, updated_at = $12
         WHERE id = $13 AND status = $14",
    )
    .bind(AttemptStatus::Completed)
    .bind(Json(params.answers))
    .bind(params.correct_count)
    .bind(params.wrong_count)
    .bind(params.unanswered_count)
    .bind(params.percentage)
    .bind(params.is_passed)
    .bind(params.auto_submitted)
    .bind(params.violation_reason)
    .bind(params.ended_at)
    .bind(params.time_spent_minutes)
    .bind(params.updated_at)
    .bind(params.id)
    .bind(AttemptStatus::InProgress)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StaleAttemptRow {
    pub(crate) id: String,
    pub(crate) trainee_id: String,
    pub(crate) question_ids: Json<Vec<String>>,
    pub(crate) passing_score: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
}

/// In-progress rows whose countdown (plus grace) has fully elapsed. These are
/// orphans left behind by a process crash; live sessions are finalized by the
/// tick loop well before the grace period expires.
pub(crate) async fn list_stale_in_progress(
    pool: &PgPool,
    now: PrimitiveDateTime,
    grace_seconds: i64,
) -> Result<Vec<StaleAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, StaleAttemptRow>(
        "SELECT a.id, a.trainee_id, a.question_ids, e.passing_score, a.started_at,
                e.duration_minutes
         FROM attempts a
         JOIN exams e ON e.id = a.exam_id
         WHERE a.status = $1
           AND a.started_at + make_interval(mins => e.duration_minutes, secs => $2) < $3",
    )
    .bind(AttemptStatus::InProgress)
    .bind(grace_seconds as f64)
    .bind(now)
    .fetch_all(pool)
    .await
}
