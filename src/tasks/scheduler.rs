use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::attempt_finalize;
use crate::tasks::maintenance;

const FINALIZE_RETRY_INTERVAL_SECONDS: u64 = 30;
const STALE_STUB_INTERVAL_SECONDS: u64 = 300;

pub(crate) struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Spawns the background loops that drive every live attempt session: the
/// 1 Hz countdown sweep, the finalize retry loop and the stale-stub closer.
/// They must run in the same process as the session registry.
pub(crate) fn spawn(state: AppState) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![
        tokio::spawn(tick_loop(state.clone(), shutdown_rx.clone())),
        tokio::spawn(finalize_retry_loop(state.clone(), shutdown_rx.clone())),
        tokio::spawn(stale_stub_loop(state, shutdown_rx)),
    ];

    SchedulerHandle { shutdown_tx, handles }
}

impl SchedulerHandle {
    pub(crate) async fn shutdown(self) {
        if self.shutdown_tx.send(true).is_err() {
            tracing::warn!("Failed to broadcast shutdown signal to background tasks");
        }

        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Background task join failed");
            }
        }
    }
}

/// The countdown authority: one second per sweep for every running session.
async fn tick_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let expired = state.sessions().tick_all(primitive_now_utc()).await;
                for result in expired {
                    tracing::info!(
                        attempt_id = %result.attempt_id,
                        "Countdown expired, attempt auto-submitted"
                    );
                    metrics::counter!("attempts_expired_total").increment(1);
                    attempt_finalize::finalize_and_release(&state, &result).await;
                }
            }
        }
    }
}

async fn finalize_retry_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(FINALIZE_RETRY_INTERVAL_SECONDS));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                maintenance::retry_pending_finalizes(&state).await;
            }
        }
    }
}

async fn stale_stub_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(STALE_STUB_INTERVAL_SECONDS));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = maintenance::close_stale_stub_attempts(&state).await {
                    tracing::error!(error = %err, "close_stale_stub_attempts failed");
                }
            }
        }
    }
}
