use std::collections::HashMap;

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::time::minutes_between_rounded;
use crate::db::models::{Exam, Question};
use crate::services::integrity::ViolationReason;
use crate::services::scoring::{self, ScoreBreakdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
}

impl SessionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitTrigger {
    Manual,
    TimeExpired,
    Violation(ViolationReason),
}

impl SubmitTrigger {
    fn auto_submitted(self) -> bool {
        !matches!(self, Self::Manual)
    }

    fn violation_reason(self) -> Option<&'static str> {
        match self {
            Self::Manual => None,
            Self::TimeExpired => Some("time_expired"),
            Self::Violation(reason) => Some(reason.as_str()),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("attempt has already started")]
    AlreadyStarted,
    #[error("attempt is not in progress")]
    NotInProgress,
    #[error("attempt is not paused")]
    NotPaused,
    #[error("attempt is already completed")]
    AlreadyCompleted,
    #[error("unknown question id: {0}")]
    UnknownQuestion(String),
    #[error("question index {index} out of range for {count} questions")]
    IndexOutOfRange { index: usize, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Countdown not running (not started, paused, or already completed).
    Idle,
    Running { remaining_seconds: u32 },
    Expired,
}

/// Everything `finalize` needs, captured once at submission.
#[derive(Debug, Clone)]
pub(crate) struct AttemptResult {
    pub(crate) attempt_id: String,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) breakdown: ScoreBreakdown,
    pub(crate) is_passed: bool,
    pub(crate) auto_submitted: bool,
    pub(crate) violation_reason: Option<&'static str>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) ended_at: PrimitiveDateTime,
    pub(crate) time_spent_minutes: i32,
}

/// One trainee's in-memory pass through the active exam.
///
/// Owned exclusively by the session registry; every mutation happens under the
/// registry lock, so racing triggers (countdown vs. violation vs. manual
/// submit) serialize onto the submit-once guard below.
pub(crate) struct AttemptSession {
    attempt_id: String,
    trainee_id: String,
    exam: Exam,
    questions: Vec<Question>,
    answers: HashMap<String, String>,
    current_index: usize,
    time_remaining_seconds: u32,
    status: SessionStatus,
    started_at: Option<PrimitiveDateTime>,
    violation_triggered: bool,
    result: Option<AttemptResult>,
    finalize_failures: u32,
}

impl AttemptSession {
    pub(crate) fn new(
        attempt_id: String,
        trainee_id: String,
        exam: Exam,
        questions: Vec<Question>,
    ) -> Self {
        let time_remaining_seconds = (exam.duration_minutes.max(0) as u32) * 60;
        Self {
            attempt_id,
            trainee_id,
            exam,
            questions,
            answers: HashMap::new(),
            current_index: 0,
            time_remaining_seconds,
            status: SessionStatus::NotStarted,
            started_at: None,
            violation_triggered: false,
            result: None,
            finalize_failures: 0,
        }
    }

    pub(crate) fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub(crate) fn trainee_id(&self) -> &str {
        &self.trainee_id
    }

    pub(crate) fn exam(&self) -> &Exam {
        &self.exam
    }

    pub(crate) fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub(crate) fn answers(&self) -> &HashMap<String, String> {
        &self.answers
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn time_remaining_seconds(&self) -> u32 {
        self.time_remaining_seconds
    }

    pub(crate) fn status(&self) -> SessionStatus {
        self.status
    }

    pub(crate) fn result(&self) -> Option<&AttemptResult> {
        self.result.as_ref()
    }

    pub(crate) fn finalize_failures(&self) -> u32 {
        self.finalize_failures
    }

    pub(crate) fn record_finalize_failure(&mut self) {
        self.finalize_failures += 1;
    }

    /// `not_started -> in_progress`. The caller has already persisted the
    /// attempt stub, so a crash from here on is attributable.
    pub(crate) fn begin(&mut self, now: PrimitiveDateTime) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::NotStarted => {
                self.status = SessionStatus::InProgress;
                self.started_at = Some(now);
                Ok(())
            }
            SessionStatus::Completed => Err(SessionError::AlreadyCompleted),
            _ => Err(SessionError::AlreadyStarted),
        }
    }

    pub(crate) fn pause(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::InProgress => {
                self.status = SessionStatus::Paused;
                Ok(())
            }
            SessionStatus::Completed => Err(SessionError::AlreadyCompleted),
            _ => Err(SessionError::NotInProgress),
        }
    }

    pub(crate) fn resume(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Paused => {
                self.status = SessionStatus::InProgress;
                Ok(())
            }
            SessionStatus::Completed => Err(SessionError::AlreadyCompleted),
            _ => Err(SessionError::NotPaused),
        }
    }

    /// Last write wins; earlier answers stay editable until submission.
    pub(crate) fn set_answer(
        &mut self,
        question_id: &str,
        value: String,
    ) -> Result<(), SessionError> {
        self.require_in_progress()?;

        if !self.questions.iter().any(|question| question.id == question_id) {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }

        self.answers.insert(question_id.to_string(), value);
        Ok(())
    }

    pub(crate) fn next_question(&mut self) -> Result<usize, SessionError> {
        self.require_in_progress()?;
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        Ok(self.current_index)
    }

    pub(crate) fn previous_question(&mut self) -> Result<usize, SessionError> {
        self.require_in_progress()?;
        self.current_index = self.current_index.saturating_sub(1);
        Ok(self.current_index)
    }

    pub(crate) fn jump_to(&mut self, index: usize) -> Result<usize, SessionError> {
        self.require_in_progress()?;
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                count: self.questions.len(),
            });
        }
        self.current_index = index;
        Ok(self.current_index)
    }

    /// One countdown step. Exactly one second is deducted per call while
    /// `in_progress`; hitting zero submits within the same call.
    pub(crate) fn tick(&mut self, now: PrimitiveDateTime) -> TickOutcome {
        if self.status != SessionStatus::InProgress {
            return TickOutcome::Idle;
        }

        self.time_remaining_seconds = self.time_remaining_seconds.saturating_sub(1);
        if self.time_remaining_seconds == 0 {
            self.submit(SubmitTrigger::TimeExpired, now);
            return TickOutcome::Expired;
        }

        TickOutcome::Running { remaining_seconds: self.time_remaining_seconds }
    }

    /// First violation wins and forces submission; later signals are ignored.
    /// Monitoring stays armed while paused: only the countdown suspends.
    pub(crate) fn report_violation(
        &mut self,
        reason: ViolationReason,
        now: PrimitiveDateTime,
    ) -> bool {
        if self.violation_triggered {
            return false;
        }
        if !matches!(self.status, SessionStatus::InProgress | SessionStatus::Paused) {
            return false;
        }

        self.violation_triggered = true;
        self.submit(SubmitTrigger::Violation(reason), now);
        true
    }

    pub(crate) fn submit_manual(
        &mut self,
        now: PrimitiveDateTime,
    ) -> Result<&AttemptResult, SessionError> {
        match self.status {
            SessionStatus::InProgress => {
                self.submit(SubmitTrigger::Manual, now);
                self.result.as_ref().ok_or(SessionError::AlreadyCompleted)
            }
            SessionStatus::Completed => Err(SessionError::AlreadyCompleted),
            _ => Err(SessionError::NotInProgress),
        }
    }

    /// The single convergence point for manual submit, countdown expiry and
    /// violations. Idempotent: after the first call the attempt is terminal
    /// and re-entrant calls are no-ops.
    fn submit(&mut self, trigger: SubmitTrigger, now: PrimitiveDateTime) {
        if self.status == SessionStatus::Completed {
            return;
        }

        let breakdown = scoring::score(&self.answers, &self.questions);
        let started_at = self.started_at.unwrap_or(now);

        self.status = SessionStatus::Completed;
        self.result = Some(AttemptResult {
            attempt_id: self.attempt_id.clone(),
            answers: self.answers.clone(),
            breakdown,
            is_passed: breakdown.percentage >= self.exam.passing_score,
            auto_submitted: trigger.auto_submitted(),
            violation_reason: trigger.violation_reason(),
            started_at,
            ended_at: now,
            time_spent_minutes: minutes_between_rounded(started_at, now),
        });
    }

    fn require_in_progress(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::InProgress => Ok(()),
            SessionStatus::Completed => Err(SessionError::AlreadyCompleted),
            _ => Err(SessionError::NotInProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QuestionKind;
    use crate::test_support::fixtures::{exam_definition, question_with_answer};

    fn now() -> PrimitiveDateTime {
        let date = time::Date::from_calendar_date(2025, time::Month::June, 2).unwrap();
        PrimitiveDateTime::new(date, time::Time::from_hms(9, 0, 0).unwrap())
    }

    fn five_question_session(duration_minutes: i32, passing_score: i32) -> AttemptSession {
        let exam = exam_definition("exam-1", duration_minutes, passing_score);
        let questions = (1..=5)
            .map(|n| question_with_answer(&format!("q{n}"), QuestionKind::MultipleChoice, "A"))
            .collect();
        AttemptSession::new("attempt-1".into(), "trainee-1".into(), exam, questions)
    }

    fn started(duration_minutes: i32, passing_score: i32) -> AttemptSession {
        let mut session = five_question_session(duration_minutes, passing_score);
        session.begin(now()).expect("begin");
        session
    }

    #[test]
    fn begin_starts_countdown_at_duration() {
        let mut session = five_question_session(1, 60);
        assert_eq!(session.status(), SessionStatus::NotStarted);
        session.begin(now()).expect("begin");
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.time_remaining_seconds(), 60);
        assert!(session.begin(now()).is_err());
    }

    #[test]
    fn tick_decrements_by_exactly_one_while_in_progress() {
        let mut session = started(1, 60);

        let mut previous = session.time_remaining_seconds();
        for _ in 0..10 {
            let outcome = session.tick(now());
            let remaining = session.time_remaining_seconds();
            assert_eq!(remaining, previous - 1);
            assert_eq!(outcome, TickOutcome::Running { remaining_seconds: remaining });
            previous = remaining;
        }
    }

    #[test]
    fn countdown_reaching_zero_submits_within_one_tick() {
        let mut session = started(1, 60);

        for _ in 0..59 {
            assert!(matches!(session.tick(now()), TickOutcome::Running { .. }));
        }
        assert_eq!(session.tick(now()), TickOutcome::Expired);
        assert_eq!(session.status(), SessionStatus::Completed);

        let result = session.result().expect("result");
        assert!(result.auto_submitted);
        assert_eq!(result.violation_reason, Some("time_expired"));
        assert_eq!(result.breakdown.percentage, 0);
        assert_eq!(result.breakdown.unanswered, 5);

        // Ticks after completion are idle and never resurrect the countdown.
        assert_eq!(session.tick(now()), TickOutcome::Idle);
    }

    #[test]
    fn pause_suspends_countdown_and_resume_restores_it() {
        let mut session = started(2, 60);
        session.tick(now());
        let before_pause = session.time_remaining_seconds();

        session.pause().expect("pause");
        assert_eq!(session.tick(now()), TickOutcome::Idle);
        assert_eq!(session.time_remaining_seconds(), before_pause);

        session.resume().expect("resume");
        session.tick(now());
        assert_eq!(session.time_remaining_seconds(), before_pause - 1);
    }

    #[test]
    fn answers_survive_navigation() {
        let mut session = started(5, 60);

        session.jump_to(2).expect("jump");
        session.set_answer("q3", "A".into()).expect("answer q3");
        session.jump_to(0).expect("back to first");
        session.jump_to(2).expect("forward again");

        assert_eq!(session.answers().get("q3").map(String::as_str), Some("A"));

        session.set_answer("q3", "B".into()).expect("overwrite");
        assert_eq!(session.answers().get("q3").map(String::as_str), Some("B"));
    }

    #[test]
    fn navigation_clamps_at_both_ends() {
        let mut session = started(5, 60);

        assert_eq!(session.previous_question().unwrap(), 0);
        for _ in 0..10 {
            session.next_question().unwrap();
        }
        assert_eq!(session.current_index(), 4);
        assert!(matches!(
            session.jump_to(5),
            Err(SessionError::IndexOutOfRange { index: 5, count: 5 })
        ));
    }

    #[test]
    fn unknown_question_ids_are_rejected() {
        let mut session = started(5, 60);
        assert!(matches!(
            session.set_answer("q99", "A".into()),
            Err(SessionError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn answers_rejected_unless_in_progress() {
        let mut session = five_question_session(5, 60);
        assert!(session.set_answer("q1", "A".into()).is_err());

        session.begin(now()).expect("begin");
        session.pause().expect("pause");
        assert!(session.set_answer("q1", "A".into()).is_err());
    }

    #[test]
    fn manual_submit_scores_sixty_percent_scenario() {
        let mut session = started(1, 60);

        for id in ["q1", "q2", "q3"] {
            session.set_answer(id, "A".into()).expect("correct answer");
        }
        session.set_answer("q4", "B".into()).expect("wrong answer");
        session.set_answer("q5", "C".into()).expect("wrong answer");

        let result = session.submit_manual(now()).expect("submit");
        assert_eq!(result.breakdown.correct, 3);
        assert_eq!(result.breakdown.wrong, 2);
        assert_eq!(result.breakdown.unanswered, 0);
        assert_eq!(result.breakdown.percentage, 60);
        assert!(result.is_passed);
        assert!(!result.auto_submitted);
        assert_eq!(result.violation_reason, None);
    }

    #[test]
    fn violation_forces_submission_and_scores_partial_answers() {
        let mut session = started(5, 60);

        session.set_answer("q1", "A".into()).expect("answer");
        session.set_answer("q2", "A".into()).expect("answer");
        session.jump_to(1).expect("at question 2");

        let forced = session.report_violation(ViolationReason::VisibilityChange, now());
        assert!(forced);
        assert_eq!(session.status(), SessionStatus::Completed);

        let result = session.result().expect("result");
        assert!(result.auto_submitted);
        assert_eq!(result.violation_reason, Some("visibility_change"));
        assert_eq!(result.breakdown.correct, 2);
        assert_eq!(result.breakdown.unanswered, 3);
    }

    #[test]
    fn violation_latch_admits_only_the_first_signal() {
        let mut session = started(5, 60);

        assert!(session.report_violation(ViolationReason::ContextMenu, now()));
        assert!(!session.report_violation(ViolationReason::DevtoolsAccess, now()));

        let result = session.result().expect("result");
        assert_eq!(result.violation_reason, Some("context_menu"));
    }

    #[test]
    fn monitoring_stays_armed_while_paused() {
        let mut session = started(5, 60);
        session.pause().expect("pause");

        assert!(session.report_violation(ViolationReason::ScreenshotAttempt, now()));
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(
            session.result().expect("result").violation_reason,
            Some("screenshot_attempt")
        );
    }

    #[test]
    fn submit_executes_at_most_once_across_racing_triggers() {
        let mut session = started(1, 60);
        session.set_answer("q1", "A".into()).expect("answer");

        // Drain the countdown to zero, which submits...
        for _ in 0..60 {
            session.tick(now());
        }
        let first = session.result().expect("result").clone();

        // ...then deliver the racing triggers queued behind it.
        assert!(!session.report_violation(ViolationReason::VisibilityChange, now()));
        assert!(session.submit_manual(now()).is_err());
        assert_eq!(session.tick(now()), TickOutcome::Idle);

        let result = session.result().expect("result");
        assert_eq!(result.violation_reason, first.violation_reason);
        assert_eq!(result.breakdown, first.breakdown);
        assert_eq!(result.ended_at, first.ended_at);
    }

    #[test]
    fn completed_attempt_state_is_frozen() {
        let mut session = started(5, 0);
        session.submit_manual(now()).expect("submit");

        assert!(session.set_answer("q1", "A".into()).is_err());
        assert!(session.pause().is_err());
        assert!(session.resume().is_err());
        assert!(session.next_question().is_err());
        assert_eq!(session.answers().len(), 0);
    }

    #[test]
    fn zero_percent_passes_only_a_zero_threshold() {
        let mut session = started(5, 0);
        let result = session.submit_manual(now()).expect("submit");
        assert_eq!(result.breakdown.percentage, 0);
        assert!(result.is_passed);

        let mut strict = started(5, 1);
        let result = strict.submit_manual(now()).expect("submit");
        assert!(!result.is_passed);
    }
}
