use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Question;
use crate::db::types::{DifficultyLevel, QuestionKind};

pub(crate) const COLUMNS: &str = "\
    id, subject, topic, prompt, kind, options, correct_answer, difficulty, \
    created_by, created_at";

/// Bank order is creation order; the loader relies on this being stable.
pub(crate) async fn list_by_subjects(
    pool: &PgPool,
    subjects: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if subjects.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE subject = ANY($1) ORDER BY created_at, id"
    ))
    .bind(subjects)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list(
    pool: &PgPool,
    subject: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM questions WHERE TRUE"));

    if let Some(subject) = subject {
        builder.push(" AND subject = ");
        builder.push_bind(subject);
    }

    builder.push(" ORDER BY created_at, id OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn count_by_subjects(
    pool: &PgPool,
    subjects: &[String],
) -> Result<i64, sqlx::Error> {
    if subjects.is_empty() {
        return Ok(0);
    }

    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE subject = ANY($1)")
        .bind(subjects)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) subject: &'a str,
    pub(crate) topic: &'a str,
    pub(crate) prompt: &'a str,
    pub(crate) kind: QuestionKind,
    pub(crate) options: serde_json::Value,
    pub(crate) correct_answer: &'a str,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    question: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, subject, topic, prompt, kind, options, correct_answer, difficulty,
            created_by, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(question.id)
    .bind(question.subject)
    .bind(question.topic)
    .bind(question.prompt)
    .bind(question.kind)
    .bind(question.options)
    .bind(question.correct_answer)
    .bind(question.difficulty)
    .bind(question.created_by)
    .bind(question.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
