use std::collections::HashMap;

use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::attempt_finalize;

/// Re-drives completed sessions whose durable write has not landed yet. The
/// write keeps its idempotency key, so a race with an in-flight API finalize
/// resolves to a single persisted record.
pub(crate) async fn retry_pending_finalizes(state: &AppState) {
    let pending = state.sessions().pending_finalizes().await;

    for (result, failures) in pending {
        if failures > 0 {
            tracing::warn!(
                attempt_id = %result.attempt_id,
                failures,
                "Retrying unfinalized attempt result"
            );
        }
        attempt_finalize::finalize_and_release(state, &result).await;
    }
}

/// Closes in-progress attempt rows orphaned by a process crash: their
/// countdown (plus grace) has elapsed and no live session exists for them.
/// The trainee's answers died with the process, so the record is finalized
/// with an empty answer map: attributable, zero-scored, and still counting
/// against the one-attempt rule.
pub(crate) async fn close_stale_stub_attempts(state: &AppState) -> Result<()> {
    let grace_seconds = state.settings().attempt().stale_stub_grace_seconds as i64;
    let now = primitive_now_utc();

    let stale = repositories::attempts::list_stale_in_progress(state.db(), now, grace_seconds)
        .await
        .context("Failed to list stale in-progress attempts")?;

    let mut closed: u64 = 0;
    let empty_answers: HashMap<String, String> = HashMap::new();

    for row in stale {
        // A resident session means the tick loop owns this attempt.
        let resident = state.sessions().with_session(&row.id, |_| ()).await.is_some();
        if resident {
            continue;
        }

        let ended_at = row.started_at + Duration::minutes(row.duration_minutes as i64);
        let written = repositories::attempts::finalize(
            state.db(),
            repositories::attempts::FinalizeAttempt {
                id: &row.id,
                answers: &empty_answers,
                correct_count: 0,
                wrong_count: 0,
                unanswered_count: row.question_ids.0.len() as i32,
                percentage: 0,
                is_passed: 0 >= row.passing_score,
                auto_submitted: true,
                violation_reason: Some("session_lost"),
                ended_at,
                time_spent_minutes: row.duration_minutes,
                updated_at: now,
            },
        )
        .await
        .context("Failed to close stale attempt")?;

        if written {
            tracing::warn!(
                attempt_id = %row.id,
                trainee_id = %row.trainee_id,
                "Closed stale in-progress attempt"
            );
            closed += 1;
        }
    }

    metrics::counter!("stale_attempts_closed_total").increment(closed);
    Ok(())
}
