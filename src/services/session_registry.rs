use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use time::PrimitiveDateTime;
use tokio::sync::Mutex;

use crate::services::attempt_session::{AttemptResult, AttemptSession, SessionStatus};

#[derive(Debug, Error)]
pub(crate) enum RegistryError {
    #[error("exam service is temporarily at capacity")]
    AtCapacity,
}

/// Process-wide owner of live attempt sessions, keyed by attempt id.
///
/// The single mutex is what serializes every session mutation: API handlers,
/// the 1 Hz tick sweep and the finalize retry loop all run their closures
/// under it, so the state machine's submit-once guard is checked-and-set
/// atomically.
#[derive(Clone)]
pub(crate) struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, AttemptSession>>>,
    capacity: usize,
}

impl SessionRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), capacity }
    }

    pub(crate) async fn insert(&self, session: AttemptSession) -> Result<(), RegistryError> {
        let mut sessions = self.inner.lock().await;

        let live = sessions
            .values()
            .filter(|session| session.status() != SessionStatus::Completed)
            .count();
        if live >= self.capacity {
            return Err(RegistryError::AtCapacity);
        }

        sessions.insert(session.attempt_id().to_string(), session);
        Ok(())
    }

    /// Runs `f` on the session under the registry lock. `None` when the
    /// attempt has no live session in this process.
    pub(crate) async fn with_session<T>(
        &self,
        attempt_id: &str,
        f: impl FnOnce(&mut AttemptSession) -> T,
    ) -> Option<T> {
        let mut sessions = self.inner.lock().await;
        sessions.get_mut(attempt_id).map(f)
    }

    pub(crate) async fn attempt_id_for_trainee(&self, trainee_id: &str) -> Option<String> {
        let sessions = self.inner.lock().await;
        sessions
            .values()
            .find(|session| session.trainee_id() == trainee_id)
            .map(|session| session.attempt_id().to_string())
    }

    pub(crate) async fn remove(&self, attempt_id: &str) {
        let mut sessions = self.inner.lock().await;
        sessions.remove(attempt_id);
    }

    /// One countdown step for every running session; returns the results of
    /// sessions whose countdown expired on this sweep.
    pub(crate) async fn tick_all(&self, now: PrimitiveDateTime) -> Vec<AttemptResult> {
        let mut sessions = self.inner.lock().await;
        let mut expired = Vec::new();

        for session in sessions.values_mut() {
            if session.status() != SessionStatus::InProgress {
                continue;
            }
            session.tick(now);
            if session.status() == SessionStatus::Completed {
                if let Some(result) = session.result() {
                    expired.push(result.clone());
                }
            }
        }

        expired
    }

    /// Completed sessions still waiting on a durable write, for the retry
    /// loop. Each entry carries how often finalize has failed so far.
    pub(crate) async fn pending_finalizes(&self) -> Vec<(AttemptResult, u32)> {
        let sessions = self.inner.lock().await;
        sessions
            .values()
            .filter(|session| session.status() == SessionStatus::Completed)
            .filter_map(|session| {
                session.result().map(|result| (result.clone(), session.finalize_failures()))
            })
            .collect()
    }

    pub(crate) async fn record_finalize_failure(&self, attempt_id: &str) {
        let mut sessions = self.inner.lock().await;
        if let Some(session) = sessions.get_mut(attempt_id) {
            session.record_finalize_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::types::QuestionKind;
    use crate::test_support::fixtures::{exam_definition, question_with_answer};

    fn session(attempt_id: &str, trainee_id: &str) -> AttemptSession {
        let exam = exam_definition("exam-1", 1, 60);
        let questions =
            vec![question_with_answer("q1", QuestionKind::MultipleChoice, "A")];
        let mut session = AttemptSession::new(
            attempt_id.to_string(),
            trainee_id.to_string(),
            exam,
            questions,
        );
        session.begin(primitive_now_utc()).expect("begin");
        session
    }

    #[tokio::test]
    async fn capacity_counts_only_live_sessions() {
        let registry = SessionRegistry::new(1);
        registry.insert(session("a1", "t1")).await.expect("first insert");

        let denied = registry.insert(session("a2", "t2")).await;
        assert!(matches!(denied, Err(RegistryError::AtCapacity)));

        // Completing the resident session frees its capacity slot.
        registry
            .with_session("a1", |session| {
                session.submit_manual(primitive_now_utc()).map(|_| ()).expect("submit")
            })
            .await
            .expect("session present");
        registry.insert(session("a2", "t2")).await.expect("second insert");
    }

    #[tokio::test]
    async fn tick_all_reports_expired_sessions_once() {
        let registry = SessionRegistry::new(10);
        registry.insert(session("a1", "t1")).await.expect("insert");

        let now = primitive_now_utc();
        for _ in 0..59 {
            assert!(registry.tick_all(now).await.is_empty());
        }

        let expired = registry.tick_all(now).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].attempt_id, "a1");
        assert_eq!(expired[0].violation_reason, Some("time_expired"));

        // Already-completed sessions do not reappear on later sweeps.
        assert!(registry.tick_all(now).await.is_empty());
    }

    #[tokio::test]
    async fn trainee_lookup_finds_resident_session() {
        let registry = SessionRegistry::new(10);
        registry.insert(session("a1", "t1")).await.expect("insert");

        assert_eq!(registry.attempt_id_for_trainee("t1").await.as_deref(), Some("a1"));
        assert_eq!(registry.attempt_id_for_trainee("t2").await, None);

        registry.remove("a1").await;
        assert_eq!(registry.attempt_id_for_trainee("t1").await, None);
    }
}
