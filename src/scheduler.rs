//! Background task that advances a target on a fixed period.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Longest period accepted by [`spawn_live_updates`].
pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Something that can be advanced by one update.
///
/// The scheduler and manual callers go through the same method, so a timed
/// firing and a manual trigger do identical work.
pub trait Advance: Send + Sync + 'static {
    fn advance(&self);
}

/// Handle for a running update task.
///
/// Call [`LiveHandle::stop`] to cancel the task. The task also exits on its
/// own once the target has been dropped.
#[derive(Debug)]
pub struct LiveHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    period: Duration,
}

impl LiveHandle {
    /// Stop the recurring updates.
    ///
    /// Work already running inside the task is not interrupted mid-update.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task that calls `target.advance()` every `period`.
///
/// The first firing happens one full period after spawning. The period is
/// clamped to `[1ms, MAX_PERIOD]`. Must be called from within a tokio
/// runtime.
pub fn spawn_live_updates<T: Advance>(target: Weak<T>, period: Duration) -> LiveHandle {
    let period = period.clamp(Duration::from_millis(1), MAX_PERIOD);
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let Some(target) = target.upgrade() else {
                        break;
                    };
                    target.advance();
                }
            }
        }
        debug!("live update task exited");
    });

    LiveHandle {
        stop_tx,
        task,
        period,
    }
}
