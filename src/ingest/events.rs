use crate::db::Post;
use crate::error::ErrorKind;
use crate::ingest::CyclePhase;
use serde::Serialize;

/// Observable output of the controller, fanned out to every subscriber.
///
/// A cycle always reads `PhaseChanged(Fetching)`, its progress, then exactly one of
/// `CycleCompleted` or `CycleFailed`, and ends with `PhaseChanged(Idle)`. Nothing from the
/// next cycle is emitted before that final `Idle`, so a subscriber that wants to start a
/// new cycle should wait for it rather than for the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    /// Emitted on every phase transition, including the transient `Failed`.
    PhaseChanged(CyclePhase),

    /// Fetch progress, 0..=100, strictly increasing within a cycle.
    ProgressChanged(u8),

    /// The cycle persisted every fetched record; carries the fetched batch.
    CycleCompleted(Vec<Post>),

    CycleFailed(CycleFailure),

    /// A trigger tick found a cycle in flight and skipped this round.
    Deferred(CyclePhase),
}

/// Cloneable summary of an `IngestError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleFailure {
    pub kind: ErrorKind,
    pub message: String,
}
