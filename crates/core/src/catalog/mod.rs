//! Season / round / session entity graph.

mod sqlite;
mod types;

pub use sqlite::{RoundUpsert, SqliteCatalog};
pub use types::*;
