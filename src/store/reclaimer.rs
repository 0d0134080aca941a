use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::MAX_SWEEP_INTERVAL;
use crate::store::RecordStore;

/// Background task that periodically sweeps expired records out of a store.
///
/// The task is spawned on the current Tokio runtime by [`Reclaimer::spawn`]
/// and runs until [`Reclaimer::stop`] is called or the `Reclaimer` is dropped.
/// Stopping is cooperative: a sweep already in flight runs to completion and
/// the task exits before its next tick.
#[derive(Debug)]
pub struct Reclaimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Reclaimer {
    /// Spawns the sweep loop for `store`, ticking every `interval`.
    ///
    /// The first sweep happens one full `interval` after spawning. Intervals
    /// longer than [`MAX_SWEEP_INTERVAL`] are clamped to it.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime, or if `interval` is zero.
    pub fn spawn<S: RecordStore>(store: S, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let interval = interval.min(MAX_SWEEP_INTERVAL);
        let start = Instant::now() + interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        match store.sweep(OffsetDateTime::now_utc()).await {
                            Ok(0) => {}
                            Ok(removed) => tracing::debug!(removed, "swept expired records"),
                            Err(err) => tracing::error!(err = %err, "failed to sweep expired records"),
                        }
                    }
                }
            }

            tracing::debug!("reclaimer stopped");
        });

        Self { token, task }
    }

    /// Signals the sweep loop to exit. Calling this more than once is a no-op,
    /// and no records are removed by stopping.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the sweep task is still alive. False once it exited after
    /// [`Reclaimer::stop`], or if it died.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
