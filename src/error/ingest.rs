use serde::Serialize;
use thiserror::Error as ThisError;

use super::{FetchError, StoreError};
use crate::ingest::CyclePhase;

/// Coarse classification of a failed cycle, carried by `CycleEvent::CycleFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Decode,
    Store,
    Cancelled,
}

/// Returned by `start_cycle` while another cycle is in flight. Benign: the caller skips this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("ingestion cycle already in flight (phase: {phase})")]
pub struct BusyError {
    pub phase: CyclePhase,
}

/// Why a started cycle did not complete.
#[derive(Debug, ThisError)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cycle cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Fetch(e) => e.kind(),
            IngestError::Store(_) => ErrorKind::Store,
            IngestError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
