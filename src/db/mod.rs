//! Database module: the `posts` table and the actor that owns it.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: single-owner store actor and its cloneable handle

pub mod actor;
pub mod models;
pub mod schema;

pub use actor::{StoreHandle, spawn};
pub use models::Post;
pub use schema::SQLITE_INIT;
