//! Periodic expiry sweeping.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use inventory_lock_core::traits::LockBackend;

use crate::manager::LockManager;

/// Background task calling
/// [`cleanup_expired_locks`](LockManager::cleanup_expired_locks) on a fixed
/// interval.
///
/// The first sweep waits a random fraction of the interval so replicas
/// started together do not sweep in lockstep. A failing sweep is logged and
/// the next tick runs as usual. The task stops on [`shutdown`](Self::shutdown)
/// or when the sweeper is dropped.
pub struct LockSweeper {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LockSweeper {
    pub fn spawn<B>(manager: Arc<LockManager<B>>, interval: Duration) -> Self
    where
        B: LockBackend + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));
        let jitter = initial_jitter(period);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + jitter, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            debug!(?period, ?jitter, "lock sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped.changed() => break,
                }

                match manager.cleanup_expired_locks().await {
                    Ok(0) => {}
                    Ok(expired) => info!(expired, "swept expired locks"),
                    Err(e) => warn!(error = %e, "expired lock sweep failed, retrying next tick"),
                }
            }
            debug!("lock sweeper stopped");
        });

        Self {
            stop,
            task: Some(task),
        }
    }

    /// Stops the task and waits for an in-flight sweep to finish.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for LockSweeper {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

fn initial_jitter(period: Duration) -> Duration {
    let max_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
