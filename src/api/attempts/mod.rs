mod answers;
mod integrity;
mod session;
mod submit;


use axum::routing::{get, post, put};
use axum::Router;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::attempt::ActiveAttemptResponse;
use crate::schemas::exam::ExamSummaryResponse;
use crate::schemas::question::PublicQuestionResponse;
use crate::services::attempt_session::{AttemptSession, SessionError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exam", get(session::load_exam))
        .route("/attempts", post(session::start_attempt))
        .route("/attempts/current", get(session::current_attempt))
        .route("/attempts/:attempt_id/answers/:question_id", put(answers::set_answer))
        .route("/attempts/:attempt_id/navigate", post(answers::navigate))
        .route("/attempts/:attempt_id/pause", post(answers::pause_attempt))
        .route("/attempts/:attempt_id/resume", post(answers::resume_attempt))
        .route("/attempts/:attempt_id/events", post(integrity::report_event))
        .route("/attempts/:attempt_id/heartbeat", post(session::heartbeat))
        .route("/attempts/:attempt_id/submit", post(submit::submit_attempt))
        .route("/attempts/:attempt_id/result", get(submit::attempt_result))
}

/// Runs `f` on the trainee's own live session under the registry lock.
pub(in crate::api::attempts) async fn with_owned_session<T>(
    state: &AppState,
    attempt_id: &str,
    user_id: &str,
    f: impl FnOnce(&mut AttemptSession) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let outcome = state
        .sessions()
        .with_session(attempt_id, |session| {
            if session.trainee_id() != user_id {
                return Err(ApiError::Forbidden("Access denied"));
            }
            f(session)
        })
        .await;

    outcome.ok_or_else(|| ApiError::NotFound("No live session for this attempt".to_string()))?
}

pub(in crate::api::attempts) fn session_to_response(
    session: &AttemptSession,
) -> ActiveAttemptResponse {
    ActiveAttemptResponse {
        attempt_id: session.attempt_id().to_string(),
        status: session.status().as_str(),
        exam: ExamSummaryResponse::from_db(session.exam()),
        questions: session.questions().iter().map(PublicQuestionResponse::from_db).collect(),
        answers: session.answers().clone(),
        current_index: session.current_index(),
        time_remaining_seconds: session.time_remaining_seconds(),
    }
}

pub(in crate::api::attempts) fn map_session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::AlreadyStarted => {
            ApiError::Conflict("Attempt has already started".to_string())
        }
        SessionError::AlreadyCompleted => {
            ApiError::Conflict("Attempt is already completed".to_string())
        }
        SessionError::NotInProgress
        | SessionError::NotPaused
        | SessionError::UnknownQuestion(_)
        | SessionError::IndexOutOfRange { .. } => ApiError::BadRequest(err.to_string()),
    }
}
