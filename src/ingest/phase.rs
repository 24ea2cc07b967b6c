use crate::error::BusyError;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

/// Where the (single) ingestion cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CyclePhase {
    Idle = 0,
    Fetching = 1,
    Saving = 2,
    /// Transient: observed between a failed stage and the return to `Idle`.
    Failed = 3,
}

impl CyclePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CyclePhase::Fetching,
            2 => CyclePhase::Saving,
            3 => CyclePhase::Failed,
            _ => CyclePhase::Idle,
        }
    }

    /// A cycle owns the pipeline in these phases.
    pub fn is_busy(self) -> bool {
        matches!(self, CyclePhase::Fetching | CyclePhase::Saving)
    }

    /// Human status line for the presentation layer.
    pub fn status_text(self) -> &'static str {
        match self {
            CyclePhase::Idle => "Ready",
            CyclePhase::Fetching => "Loading data...",
            CyclePhase::Saving => "Saving data...",
            CyclePhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Saving => "saving",
            CyclePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Phase and progress packed into one word (`phase << 8 | progress`) so that
/// claiming the pipeline and resetting progress happen in a single CAS.
#[derive(Debug)]
pub(crate) struct CycleState {
    word: AtomicU16,
}

fn pack(phase: CyclePhase, progress: u8) -> u16 {
    (u16::from(phase as u8) << 8) | u16::from(progress)
}

fn unpack(word: u16) -> (CyclePhase, u8) {
    let [phase, progress] = word.to_be_bytes();
    (CyclePhase::from_u8(phase), progress)
}

impl CycleState {
    pub(crate) fn new() -> Self {
        Self {
            word: AtomicU16::new(pack(CyclePhase::Idle, 0)),
        }
    }

    pub(crate) fn phase(&self) -> CyclePhase {
        unpack(self.word.load(Ordering::Acquire)).0
    }

    pub(crate) fn progress(&self) -> u8 {
        unpack(self.word.load(Ordering::Acquire)).1
    }

    /// Idle -> Fetching with progress reset to 0. Fails with the observed phase otherwise.
    pub(crate) fn try_begin(&self) -> Result<(), BusyError> {
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                match unpack(word).0 {
                    CyclePhase::Idle => Some(pack(CyclePhase::Fetching, 0)),
                    _ => None,
                }
            })
            .map(|_| ())
            .map_err(|word| BusyError {
                phase: unpack(word).0,
            })
    }

    /// Move to `to`, keeping progress. Returns the phase that was replaced.
    pub(crate) fn set_phase(&self, to: CyclePhase) -> CyclePhase {
        let prev = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some(pack(to, unpack(word).1))
            })
            .unwrap_or_else(|word| word);
        unpack(prev).0
    }

    /// Raise progress to `value` (clamped to 100). Never lowers it.
    /// Returns `true` when the stored value changed.
    pub(crate) fn raise_progress(&self, value: u8) -> bool {
        let value = value.min(100);
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (phase, current) = unpack(word);
                (value > current).then(|| pack(phase, value))
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_claims_only_from_idle() {
        let state = CycleState::new();
        assert_eq!(state.phase(), CyclePhase::Idle);

        state.try_begin().unwrap();
        assert_eq!(state.phase(), CyclePhase::Fetching);
        assert_eq!(
            state.try_begin(),
            Err(BusyError {
                phase: CyclePhase::Fetching
            })
        );

        state.set_phase(CyclePhase::Saving);
        assert_eq!(
            state.try_begin(),
            Err(BusyError {
                phase: CyclePhase::Saving
            })
        );

        state.set_phase(CyclePhase::Failed);
        assert!(state.try_begin().is_err());

        assert_eq!(state.set_phase(CyclePhase::Idle), CyclePhase::Failed);
        assert!(state.try_begin().is_ok());
    }

    #[test]
    fn progress_is_monotonic_and_reset_on_begin() {
        let state = CycleState::new();
        state.try_begin().unwrap();
        assert!(state.raise_progress(40));
        assert!(!state.raise_progress(20));
        assert!(!state.raise_progress(40));
        assert!(state.raise_progress(250));
        assert_eq!(state.progress(), 100);
        assert_eq!(state.phase(), CyclePhase::Fetching);

        state.set_phase(CyclePhase::Idle);
        assert_eq!(state.progress(), 100);
        state.try_begin().unwrap();
        assert_eq!(state.progress(), 0);
    }

    #[test]
    fn only_one_of_many_racers_wins() {
        let state = std::sync::Arc::new(CycleState::new());
        let winners: usize = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.try_begin().is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn status_text_per_phase() {
        assert_eq!(CyclePhase::Idle.status_text(), "Ready");
        assert_eq!(CyclePhase::Fetching.status_text(), "Loading data...");
        assert_eq!(CyclePhase::Saving.status_text(), "Saving data...");
        assert!(!CyclePhase::Failed.is_busy());
        assert!(CyclePhase::Saving.is_busy());
    }
}
