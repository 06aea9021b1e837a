//! Similarity-searchable chunk storage on LanceDB, plus the incremental
//! document indexer that keeps it in sync with a documents directory.

pub mod indexer;
pub mod schema;
pub mod store;
pub mod table;

pub use indexer::Indexer;
pub use store::{is_stale, StoreStats, VectorStore};
