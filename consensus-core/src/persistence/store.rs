//! The persistence contract (§6) and its error type.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    Contribution, Decision, Outcome, Subtask, Summary, Thread, ThreadHistory, ThreadId, Turn,
    TurnId, Vote,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[cfg(feature = "rocksdb-store")]
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The persistence handle the orchestrator consumes (§6 "Consumed
/// collaborators"). Implementations own cascade-delete semantics from Thread
/// downward, except append-only Outcomes, which detach.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn create_thread(&self, thread: &Thread) -> StoreResult<()>;

    async fn create_turn(&self, turn: &Turn) -> StoreResult<()>;

    async fn add_contribution(&self, contribution: &Contribution) -> StoreResult<()>;

    async fn save_decision(&self, decision: &Decision) -> StoreResult<()>;

    async fn save_outcome(&self, outcome: &Outcome) -> StoreResult<()>;

    async fn save_vote(&self, vote: &Vote) -> StoreResult<()>;

    /// Persisted only after decomposition synthesis completes (§3 ownership).
    async fn save_subtasks(&self, subtasks: &[Subtask]) -> StoreResult<()>;

    async fn get_thread_with_history(&self, thread_id: &str) -> StoreResult<ThreadHistory>;

    async fn upsert_turn_summary(&self, turn_id: &TurnId, summary: &Summary) -> StoreResult<()>;

    async fn upsert_thread_summary(
        &self,
        thread_id: &ThreadId,
        summary: &Summary,
    ) -> StoreResult<()>;

    /// Free-text search over question/content fields, newest first.
    async fn search(&self, keyword: &str, limit: usize) -> StoreResult<Vec<Thread>>;

    /// Mark a thread's terminal status (active → complete | failed).
    async fn set_thread_status(
        &self,
        thread_id: &str,
        status: super::types::ThreadStatus,
    ) -> StoreResult<()>;
}
