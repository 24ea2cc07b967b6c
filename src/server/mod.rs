pub mod router;

pub use router::{PostsyncState, postsync_router};
