pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod server;

mod utils;

pub use db::{Post, StoreHandle};
pub use error::PostsyncError;
pub use ingest::{CycleEvent, CyclePhase, IngestionController};
