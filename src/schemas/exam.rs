use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::db::types::ExamStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(alias = "passingScore")]
    #[validate(range(min = 0, max = 100, message = "passing_score must be 0-100"))]
    pub(crate) passing_score: i32,
    #[validate(length(min = 1, message = "at least one subject is required"))]
    pub(crate) subjects: Vec<String>,
    #[serde(default)]
    #[serde(alias = "randomizeQuestions")]
    pub(crate) randomize_questions: bool,
    #[serde(alias = "totalQuestions")]
    #[validate(range(min = 1, message = "total_questions must be positive"))]
    pub(crate) total_questions: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) subjects: Vec<String>,
    pub(crate) randomize_questions: bool,
    pub(crate) total_questions: i32,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) activated_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            duration_minutes: exam.duration_minutes,
            passing_score: exam.passing_score,
            subjects: exam.subjects.0,
            randomize_questions: exam.randomize_questions,
            total_questions: exam.total_questions,
            status: exam.status,
            created_by: exam.created_by,
            activated_at: exam.activated_at.map(format_primitive),
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
        }
    }
}

/// Exam metadata as trainees see it on the CBT screen.
#[derive(Debug, Serialize)]
pub(crate) struct ExamSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) subjects: Vec<String>,
    pub(crate) total_questions: i32,
}

impl ExamSummaryResponse {
    pub(crate) fn from_db(exam: &Exam) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.title.clone(),
            description: exam.description.clone(),
            duration_minutes: exam.duration_minutes,
            passing_score: exam.passing_score,
            subjects: exam.subjects.0.clone(),
            total_questions: exam.total_questions,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamListResponse {
    pub(crate) items: Vec<ExamResponse>,
}
