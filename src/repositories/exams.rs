use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamStatus;

pub(crate) const COLUMNS: &str = "\
    id, title, description, duration_minutes, passing_score, subjects, \
    randomize_questions, total_questions, status, created_by, activated_at, \
    created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// The single currently active exam, if any. Uniqueness is backed by a partial
/// unique index on status = 'active'.
pub(crate) async fn find_active(pool: &PgPool) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE status = $1"))
        .bind(ExamStatus::Active)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(
    pool: &PgPool,
    status: Option<ExamStatus>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM exams WHERE TRUE"));

    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Exam>().fetch_all(pool).await
}

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) subjects: serde_json::Value,
    pub(crate) randomize_questions: bool,
    pub(crate) total_questions: i32,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    exam: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, duration_minutes, passing_score, subjects,
            randomize_questions, total_questions, status, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
        RETURNING {COLUMNS}",
    ))
    .bind(exam.id)
    .bind(exam.title)
    .bind(exam.description)
    .bind(exam.duration_minutes)
    .bind(exam.passing_score)
    .bind(exam.subjects)
    .bind(exam.randomize_questions)
    .bind(exam.total_questions)
    .bind(exam.status)
    .bind(exam.created_by)
    .bind(exam.created_at)
    .bind(exam.updated_at)
    .fetch_one(executor)
    .await
}

/// Archives whichever exam is currently active. Returns the number of rows
/// touched so callers can log a takeover.
pub(crate) async fn archive_active(
    executor: impl sqlx::PgExecutor<'_>,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE exams SET status = $1, updated_at = $2 WHERE status = $3")
        .bind(ExamStatus::Archived)
        .bind(now)
        .bind(ExamStatus::Active)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn activate(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exams SET status = $1, activated_at = $2, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(ExamStatus::Active)
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(ExamStatus::Draft)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn archive(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exams SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(ExamStatus::Archived)
    .bind(now)
    .bind(id)
    .bind(ExamStatus::Active)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Drafts that were never activated can be removed outright.
pub(crate) async fn delete_draft(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1 AND status = $2")
        .bind(id)
        .bind(ExamStatus::Draft)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
