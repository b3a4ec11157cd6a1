pub mod dataset;
pub mod sqlite;
pub mod store;

pub use dataset::Datasets;
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, Store, StoreError};
