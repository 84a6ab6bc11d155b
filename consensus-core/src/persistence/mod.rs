//! Persistence layer (§3, §6): Thread/Turn/Contribution/Decision/Outcome/
//! Subtask/Vote/Summary entities behind a single [`Persistence`] trait, with
//! an always-available in-memory implementation and an optional
//! RocksDB-backed one.

pub mod memory_store;
#[cfg(feature = "rocksdb-store")]
pub mod rocks_store;
pub mod store;
pub mod types;

pub use memory_store::InMemoryPersistence;
#[cfg(feature = "rocksdb-store")]
pub use rocks_store::RocksPersistence;
pub use store::{Persistence, StoreError, StoreResult};
pub use types::*;
