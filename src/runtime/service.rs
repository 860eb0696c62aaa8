//! Background timers for checkpointing and stale pruning.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::core::{Scheduler, SchedulerError};

/// Timer periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Checkpoint period.
    pub checkpoint_interval: Duration,
    /// Stale-prune period.
    pub prune_interval: Duration,
}

impl TimerSettings {
    /// Periods from configuration.
    pub const fn from_config(cfg: &SchedulerConfig) -> Self {
        Self {
            checkpoint_interval: Duration::from_secs(cfg.checkpoint_interval_secs),
            prune_interval: Duration::from_secs(cfg.prune_interval_secs),
        }
    }
}

/// Runs the checkpoint and prune timers until shut down.
pub struct SchedulerService {
    scheduler: Arc<Scheduler>,
    cancel: CancellationToken,
    timers: Vec<JoinHandle<()>>,
}

impl SchedulerService {
    /// Spawn both timers on the current tokio runtime.
    pub fn start(scheduler: Arc<Scheduler>, settings: TimerSettings) -> Self {
        let cancel = CancellationToken::new();

        let checkpoint = {
            let scheduler = Arc::clone(&scheduler);
            spawn_timer("checkpoint", settings.checkpoint_interval, cancel.clone(), move || {
                let scheduler = Arc::clone(&scheduler);
                async move {
                    // Failures are logged by the scheduler and retried next tick.
                    let _ = scheduler.checkpoint().await;
                }
            })
        };

        let prune = {
            let scheduler = Arc::clone(&scheduler);
            spawn_timer("prune", settings.prune_interval, cancel.clone(), move || {
                let scheduler = Arc::clone(&scheduler);
                async move {
                    if let Err(e) = scheduler.prune_stale() {
                        tracing::warn!("stale prune failed: {}", e);
                    }
                }
            })
        };

        tracing::info!(
            "scheduler timers started (checkpoint every {:?}, prune every {:?})",
            settings.checkpoint_interval,
            settings.prune_interval
        );
        Self {
            scheduler,
            cancel,
            timers: vec![checkpoint, prune],
        }
    }

    /// Token that stops the timers when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the timers, wait for an in-flight tick to finish, and write a
    /// final checkpoint.
    pub async fn shutdown(self) -> Result<usize, SchedulerError> {
        self.cancel.cancel();
        for timer in self.timers {
            if let Err(e) = timer.await {
                tracing::error!("timer task ended abnormally: {}", e);
            }
        }
        let saved = self.scheduler.checkpoint().await?;
        tracing::info!("scheduler stopped after final checkpoint of {} tasks", saved);
        Ok(saved)
    }
}

fn spawn_timer<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("{} timer cancelled", name);
                    break;
                }
                _ = interval.tick() => {}
            }
            // Outside the select: cancellation must not interrupt a running tick.
            tick().await;
        }
    })
}
