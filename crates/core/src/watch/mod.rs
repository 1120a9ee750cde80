//! Scheduled searches (watch entries) and their status machine.

mod sqlite;
mod types;

pub use sqlite::WatchStore;
pub use types::*;
