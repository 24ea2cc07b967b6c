use super::controller::IngestionController;
use super::phase::CyclePhase;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

/// What one trigger tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    /// A cycle was already in flight in this phase; nothing was queued.
    Deferred(CyclePhase),
}

/// Request one cycle, deferring (not queuing) if the pipeline is busy.
pub fn fire(controller: &IngestionController) -> TriggerOutcome {
    match controller.start_cycle() {
        Ok(()) => {
            info!("Checking for updates...");
            TriggerOutcome::Started
        }
        Err(busy) => {
            info!(phase = %busy.phase, "Load in progress, update deferred...");
            controller.notify_deferred(busy.phase);
            TriggerOutcome::Deferred(busy.phase)
        }
    }
}

/// Running periodic trigger. Dropping the handle also stops the loop.
pub struct TriggerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TriggerHandle {
    /// Stop ticking and wait for the loop to exit. An in-flight cycle keeps running.
    pub async fn stop(self) {
        self.stop.send_replace(true);
        let _ = self.task.await;
    }
}

/// Spawn a loop that fires every `period`, first tick one full period from now.
pub fn spawn(controller: IngestionController, period: Duration) -> TriggerHandle {
    let period = period.max(Duration::from_millis(1));
    let (stop, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "Trigger started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    fire(&controller);
                }
                res = stop_rx.changed() => {
                    let stopped = res.is_err() || *stop_rx.borrow();
                    if stopped {
                        break;
                    }
                }
            }
        }

        info!("Trigger stopped");
    });

    TriggerHandle { stop, task }
}
