//! Background ingestion: fetch the upstream post list, persist it, report progress.
//!
//! Layout:
//! - `phase.rs`: cycle phase and the atomic phase/progress word
//! - `events.rs`: events fanned out to subscribers
//! - `fetcher.rs`: the `Fetch` seam and its HTTP implementation
//! - `controller.rs`: one-cycle-at-a-time orchestration
//! - `trigger.rs`: periodic cycle requests

pub mod controller;
pub mod events;
pub mod fetcher;
pub mod phase;
pub mod trigger;

pub use controller::{IngestionController, StatusSnapshot};
pub use events::{CycleEvent, CycleFailure};
pub use fetcher::{Fetch, HttpFetcher, ProgressFn, progress_value};
pub use phase::CyclePhase;
pub use trigger::{TriggerHandle, TriggerOutcome};
