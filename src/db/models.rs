use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// One upstream record. Identity is `id`; a later write with the same id replaces `title`.
///
/// Upstream objects carry more fields (`userId`, `body`, ...); they are ignored on decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
}

impl Post {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {} - {}", self.id, self.title)
    }
}
