use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::Attempt;
use crate::schemas::exam::ExamSummaryResponse;
use crate::schemas::question::PublicQuestionResponse;
use crate::services::attempt_session::AttemptResult;

#[derive(Debug, Deserialize)]
pub(crate) struct StartAttemptRequest {
    /// Second step of the two-step start: the client must echo the trainee's
    /// explicit confirmation before an attempt is created.
    #[serde(default)]
    pub(crate) confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerSubmit {
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum NavigateAction {
    Next,
    Previous,
    Jump,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavigateRequest {
    pub(crate) action: NavigateAction,
    #[serde(default)]
    pub(crate) index: Option<usize>,
}

/// What the trainee's CBT screen sees when loading the exam page.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum CbtExamView {
    Available { exam: ExamSummaryResponse },
    AlreadyTaken { exam: ExamSummaryResponse, result: AttemptResultResponse },
}

/// A live session, as returned on start, restore and heartbeat.
#[derive(Debug, Serialize)]
pub(crate) struct ActiveAttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: &'static str,
    pub(crate) exam: ExamSummaryResponse,
    pub(crate) questions: Vec<PublicQuestionResponse>,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) current_index: usize,
    pub(crate) time_remaining_seconds: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: Option<String>,
    pub(crate) correct: i32,
    pub(crate) wrong: i32,
    pub(crate) unanswered: i32,
    pub(crate) percentage: i32,
    pub(crate) is_passed: bool,
    pub(crate) auto_submitted: bool,
    pub(crate) violation_reason: Option<String>,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) started_at: String,
    pub(crate) ended_at: Option<String>,
    pub(crate) time_spent_minutes: Option<i32>,
}

impl AttemptResultResponse {
    pub(crate) fn from_db(attempt: Attempt) -> Self {
        Self {
            attempt_id: attempt.id,
            exam_id: Some(attempt.exam_id),
            correct: attempt.correct_count.unwrap_or(0),
            wrong: attempt.wrong_count.unwrap_or(0),
            unanswered: attempt.unanswered_count.unwrap_or(0),
            percentage: attempt.percentage.unwrap_or(0),
            is_passed: attempt.is_passed.unwrap_or(false),
            auto_submitted: attempt.auto_submitted,
            violation_reason: attempt.violation_reason,
            answers: attempt.answers.0,
            started_at: format_primitive(attempt.started_at),
            ended_at: attempt.ended_at.map(format_primitive),
            time_spent_minutes: attempt.time_spent_minutes,
        }
    }

    /// The optimistic view shown right after submission, before (or while)
    /// the durable write lands.
    pub(crate) fn from_result(result: &AttemptResult) -> Self {
        Self {
            attempt_id: result.attempt_id.clone(),
            exam_id: None,
            correct: result.breakdown.correct,
            wrong: result.breakdown.wrong,
            unanswered: result.breakdown.unanswered,
            percentage: result.breakdown.percentage,
            is_passed: result.is_passed,
            auto_submitted: result.auto_submitted,
            violation_reason: result.violation_reason.map(str::to_string),
            answers: result.answers.clone(),
            started_at: format_primitive(result.started_at),
            ended_at: Some(format_primitive(result.ended_at)),
            time_spent_minutes: Some(result.time_spent_minutes),
        }
    }
}
