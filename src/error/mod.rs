mod fetch;
mod ingest;
mod postsync;
mod store;

pub use fetch::FetchError;
pub use ingest::{BusyError, ErrorKind, IngestError};
pub use postsync::{ApiErrorBody, ApiErrorObject, PostsyncError};
pub use store::StoreError;
