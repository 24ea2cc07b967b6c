use super::events::{CycleEvent, CycleFailure};
use super::fetcher::Fetch;
use super::phase::{CyclePhase, CycleState};
use crate::config::IngestConfig;
use crate::db::{Post, StoreHandle};
use crate::error::{BusyError, IngestError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Point-in-time view of the controller for pull-based callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub phase: CyclePhase,
    pub status: &'static str,
    pub progress: u8,
}

/// The in-flight cycle: its task and the switch that asks it to stop.
struct CycleHandle {
    id: u64,
    task: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

struct Inner {
    state: CycleState,
    fetcher: Arc<dyn Fetch>,
    store: StoreHandle,
    events: broadcast::Sender<CycleEvent>,
    pacing: Duration,
    runtime: Handle,
    next_id: AtomicU64,
    /// Held across every Idle transition so a new cycle's events never precede the
    /// previous cycle's final `PhaseChanged(Idle)`.
    slot: Mutex<Option<CycleHandle>>,
}

/// Runs fetch-then-persist cycles, at most one at a time.
///
/// Cloning is cheap and every clone drives the same pipeline, so the trigger and
/// on-demand callers all go through the same busy check.
#[derive(Clone)]
pub struct IngestionController {
    inner: Arc<Inner>,
}

impl IngestionController {
    /// Build a controller whose cycles run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime. Use [`Self::with_runtime`] to pass
    /// the handle explicitly.
    pub fn new(fetcher: Arc<dyn Fetch>, store: StoreHandle, cfg: &IngestConfig) -> Self {
        Self::with_runtime(fetcher, store, cfg, Handle::current())
    }

    /// Build a controller that spawns its cycles on `runtime`, so `start_cycle` can be
    /// called from threads that are not part of any runtime.
    pub fn with_runtime(
        fetcher: Arc<dyn Fetch>,
        store: StoreHandle,
        cfg: &IngestConfig,
        runtime: Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(cfg.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state: CycleState::new(),
                fetcher,
                store,
                events,
                pacing: cfg.save_pacing(),
                runtime,
                next_id: AtomicU64::new(0),
                slot: Mutex::new(None),
            }),
        }
    }

    /// Start a cycle on its own task, or fail with `BusyError` if one is in flight.
    ///
    /// Never queues: a rejected caller is expected to try again later.
    /// Safe to call from any thread.
    pub fn start_cycle(&self) -> Result<(), BusyError> {
        // Hold the slot while spawning so the task cannot release it before it is filled.
        let mut slot = self.inner.lock_slot();
        self.inner.state.try_begin()?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.emit(CycleEvent::PhaseChanged(CyclePhase::Fetching));
        self.inner.emit(CycleEvent::ProgressChanged(0));

        let (cancel, cancel_rx) = watch::channel(false);
        let mut rollback = IdleOnDrop {
            inner: &self.inner,
            armed: true,
        };
        let inner = self.inner.clone();
        let task = self
            .inner
            .runtime
            .spawn(async move { inner.run_cycle(id, cancel_rx).await });
        rollback.armed = false;
        *slot = Some(CycleHandle { id, task, cancel });

        Ok(())
    }

    pub fn current_phase(&self) -> CyclePhase {
        self.inner.state.phase()
    }

    pub fn current_progress(&self) -> u8 {
        self.inner.state.progress()
    }

    pub fn status(&self) -> StatusSnapshot {
        let phase = self.current_phase();
        StatusSnapshot {
            phase,
            status: phase.status_text(),
            progress: self.current_progress(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> &StoreHandle {
        &self.inner.store
    }

    /// Ask the in-flight cycle to stop at its next fetch tick or record boundary.
    ///
    /// Records already committed stay committed. Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.inner.lock_slot().as_ref() {
            Some(handle) => {
                handle.cancel.send_replace(true);
                debug!(cycle = handle.id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Wait for the in-flight cycle, if any, to finish.
    pub async fn join(&self) {
        let handle = self.inner.lock_slot().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.task.await {
                warn!(cycle = handle.id, error = %e, "Cycle task ended abnormally");
            }
        }
    }

    pub(crate) fn notify_deferred(&self, phase: CyclePhase) {
        self.inner.emit(CycleEvent::Deferred(phase));
    }
}

impl Inner {
    fn emit(&self, event: CycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<CycleHandle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return to `Idle` and free the slot if it still belongs to cycle `id`.
    fn finish(&self, id: u64) {
        let mut slot = self.lock_slot();
        self.state.set_phase(CyclePhase::Idle);
        self.emit(CycleEvent::PhaseChanged(CyclePhase::Idle));
        if slot.as_ref().is_some_and(|h| h.id == id) {
            slot.take();
        }
    }

    async fn run_cycle(self: Arc<Self>, id: u64, mut cancel: watch::Receiver<bool>) {
        let started = Instant::now();
        info!(cycle = id, "Ingestion cycle started");

        let mut guard = IdleOnDrop {
            inner: &self,
            armed: true,
        };
        let result = self.fetch_and_save(id, &mut cancel).await;
        guard.armed = false;

        match result {
            Ok(posts) => {
                info!(
                    cycle = id,
                    count = posts.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ingestion cycle completed"
                );
                self.emit(CycleEvent::CycleCompleted(posts));
            }
            Err(e) => {
                let failed_in = self.state.set_phase(CyclePhase::Failed);
                self.emit(CycleEvent::PhaseChanged(CyclePhase::Failed));
                warn!(
                    cycle = id,
                    phase = %failed_in,
                    kind = ?e.kind(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ingestion cycle failed"
                );
                self.emit(CycleEvent::CycleFailed(CycleFailure {
                    kind: e.kind(),
                    message: e.to_string(),
                }));
            }
        }

        self.finish(id);
    }

    async fn fetch_and_save(
        &self,
        id: u64,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Vec<Post>, IngestError> {
        let sink = |value: u8| {
            if self.state.raise_progress(value) {
                self.emit(CycleEvent::ProgressChanged(value));
            }
        };

        let posts = tokio::select! {
            res = self.fetcher.fetch(&sink) => res?,
            () = cancelled(cancel) => return Err(IngestError::Cancelled),
        };

        self.state.set_phase(CyclePhase::Saving);
        self.emit(CycleEvent::PhaseChanged(CyclePhase::Saving));
        debug!(cycle = id, count = posts.len(), "Saving fetched posts");

        self.save(id, &posts, cancel).await?;
        Ok(posts)
    }

    /// One commit per record, paced. A failure leaves earlier records written.
    async fn save(
        &self,
        id: u64,
        posts: &[Post],
        cancel: &watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let written = self
            .store
            .upsert_all(posts, self.pacing, |written, _| {
                let requested = *cancel.borrow();
                if requested {
                    info!(cycle = id, written, "Save cancelled");
                }
                !requested
            })
            .await
            .inspect_err(|e| warn!(cycle = id, error = %e, "Upsert failed"))?;

        if written < posts.len() {
            return Err(IngestError::Cancelled);
        }
        Ok(())
    }
}

/// Returns the pipeline to `Idle` if a cycle unwinds mid-stage or never gets spawned.
struct IdleOnDrop<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.state.set_phase(CyclePhase::Idle);
            self.inner.emit(CycleEvent::PhaseChanged(CyclePhase::Idle));
        }
    }
}

/// Resolves once cancellation is requested; never if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
