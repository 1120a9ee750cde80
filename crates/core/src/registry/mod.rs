//! Configured endpoints: indexers, downloaders, notification targets.

mod sqlite;
mod types;

pub use sqlite::SqliteRegistry;
pub use types::*;
