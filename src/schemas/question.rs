use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Question;
use crate::db::types::{DifficultyLevel, QuestionKind};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub(crate) subject: String,
    #[serde(default)]
    pub(crate) topic: String,
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    pub(crate) kind: QuestionKind,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    #[validate(length(min = 1, message = "correct_answer must not be empty"))]
    pub(crate) correct_answer: String,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionBulkCreate {
    #[validate(length(min = 1, message = "questions must not be empty"), nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) topic: String,
    pub(crate) prompt: String,
    pub(crate) kind: QuestionKind,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) created_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            subject: question.subject,
            topic: question.topic,
            prompt: question.prompt,
            kind: question.kind,
            options: question.options.0,
            correct_answer: question.correct_answer,
            difficulty: question.difficulty,
            created_at: format_primitive(question.created_at),
        }
    }
}

/// What trainees receive during an attempt: the correct answer never leaves
/// the server.
#[derive(Debug, Serialize)]
pub(crate) struct PublicQuestionResponse {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) topic: String,
    pub(crate) prompt: String,
    pub(crate) kind: QuestionKind,
    pub(crate) options: Vec<String>,
}

impl PublicQuestionResponse {
    pub(crate) fn from_db(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            subject: question.subject.clone(),
            topic: question.topic.clone(),
            prompt: question.prompt.clone(),
            kind: question.kind,
            options: question.options.0.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionListResponse {
    pub(crate) items: Vec<QuestionResponse>,
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}
