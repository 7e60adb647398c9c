use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, DifficultyLevel, ExamStatus, QuestionKind, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) subjects: Json<Vec<String>>,
    pub(crate) randomize_questions: bool,
    pub(crate) total_questions: i32,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) activated_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) topic: String,
    pub(crate) prompt: String,
    pub(crate) kind: QuestionKind,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_answer: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) trainee_id: String,
    pub(crate) trainee_name: String,
    pub(crate) trainee_email: String,
    pub(crate) status: AttemptStatus,
    pub(crate) question_ids: Json<Vec<String>>,
    pub(crate) selection_seed: Option<i64>,
    pub(crate) answers: Json<HashMap<String, String>>,
    pub(crate) correct_count: Option<i32>,
    pub(crate) wrong_count: Option<i32>,
    pub(crate) unanswered_count: Option<i32>,
    pub(crate) percentage: Option<i32>,
    pub(crate) is_passed: Option<bool>,
    pub(crate) auto_submitted: bool,
    pub(crate) violation_reason: Option<String>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) ended_at: Option<PrimitiveDateTime>,
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
