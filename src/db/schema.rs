//! SQL DDL for initializing the database schema.

/// SQLite schema: one `posts` row per upstream record, keyed by the upstream id.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY,
    title TEXT
);
"#;
