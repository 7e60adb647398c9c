use anyhow::{Context, Result};
use tokio::time::{sleep, Duration};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::attempt_session::AttemptResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeOutcome {
    Written,
    /// The status guard rejected the write: a record for this attempt was
    /// already finalized. Benign, the first write is authoritative.
    AlreadyFinalized,
}

/// Durably writes a completed attempt, retrying transient failures in-line a
/// bounded number of times. The in-memory session is never reverted on
/// failure; the caller leaves it registered so the background retry loop can
/// try again with the same idempotency key.
pub(crate) async fn finalize_with_retry(
    state: &AppState,
    result: &AttemptResult,
) -> Result<FinalizeOutcome> {
    let max_retries = state.settings().attempt().finalize_max_retries;
    let mut last_error = anyhow::anyhow!("finalize was never attempted");

    for attempt_number in 0..=max_retries {
        if attempt_number > 0 {
            sleep(Duration::from_millis(500 * attempt_number as u64)).await;
            metrics::counter!("attempt_finalize_retries_total").increment(1);
        }

        match write_once(state, result).await {
            Ok(outcome) => {
                record_finalized_metrics(result, outcome);
                return Ok(outcome);
            }
            Err(err) => {
                tracing::warn!(
                    attempt_id = %result.attempt_id,
                    retry = attempt_number,
                    error = %err,
                    "Attempt finalize write failed"
                );
                last_error = err;
            }
        }
    }

    metrics::counter!("attempt_finalize_failures_total").increment(1);
    Err(last_error).context("Failed to finalize attempt after bounded retries")
}

/// Finalize and, on success, drop the in-memory session; from that point the
/// persisted record is authoritative. On failure the session stays registered
/// (still terminal, never reverted) so the background loop retries the write
/// with the same idempotency key. Returns whether the record is durable.
pub(crate) async fn finalize_and_release(state: &AppState, result: &AttemptResult) -> bool {
    match finalize_with_retry(state, result).await {
        Ok(_) => {
            state.sessions().remove(&result.attempt_id).await;
            true
        }
        Err(err) => {
            tracing::error!(
                attempt_id = %result.attempt_id,
                error = %err,
                "Attempt result not yet durable; retained for background retry"
            );
            state.sessions().record_finalize_failure(&result.attempt_id).await;
            false
        }
    }
}

async fn write_once(state: &AppState, result: &AttemptResult) -> Result<FinalizeOutcome> {
    let written = repositories::attempts::finalize(
        state.db(),
        repositories::attempts::FinalizeAttempt {
            id: &result.attempt_id,
            answers: &result.answers,
            correct_count: result.breakdown.correct,
            wrong_count: result.breakdown.wrong,
            unanswered_count: result.breakdown.unanswered,
            percentage: result.breakdown.percentage,
            is_passed: result.is_passed,
            auto_submitted: result.auto_submitted,
            violation_reason: result.violation_reason,
            ended_at: result.ended_at,
            time_spent_minutes: result.time_spent_minutes,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .context("Failed to write attempt result")?;

    Ok(if written { FinalizeOutcome::Written } else { FinalizeOutcome::AlreadyFinalized })
}

fn record_finalized_metrics(result: &AttemptResult, outcome: FinalizeOutcome) {
    if outcome != FinalizeOutcome::Written {
        return;
    }

    metrics::counter!("attempts_finalized_total").increment(1);
    if let Some(reason) = result.violation_reason {
        metrics::counter!("attempts_auto_submitted_total", "reason" => reason).increment(1);
    }
}
