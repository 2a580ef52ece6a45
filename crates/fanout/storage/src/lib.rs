//! Fan-out Storage Layer
//!
//! The two subscription indexes (by token, by bucketed user) behind storage
//! traits, with a diesel/SQLite backend and an in-memory backend.

mod memory;
mod models;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use models::*;
pub use sqlite::SqliteStorage;
pub use traits::*;

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
