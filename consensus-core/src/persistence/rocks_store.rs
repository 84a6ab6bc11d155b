//! RocksDB-backed [`Persistence`] implementation, behind the `rocksdb-store`
//! feature, directly generalizing the teacher's column-family state store to
//! this crate's entities.

use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{de::DeserializeOwned, Serialize};

use super::store::{Persistence, StoreError, StoreResult};
use super::types::*;

const CF_THREADS: &str = "threads";
const CF_TURNS: &str = "turns";
const CF_CONTRIBUTIONS: &str = "contributions";
const CF_DECISIONS: &str = "decisions";
const CF_OUTCOMES: &str = "outcomes";
const CF_SUBTASKS: &str = "subtasks";
const CF_VOTES: &str = "votes";
const CF_SUMMARIES: &str = "summaries";

const ALL_CFS: &[&str] = &[
    CF_THREADS,
    CF_TURNS,
    CF_CONTRIBUTIONS,
    CF_DECISIONS,
    CF_OUTCOMES,
    CF_SUBTASKS,
    CF_VOTES,
    CF_SUMMARIES,
];

pub struct RocksPersistence {
    db: RwLock<DB>,
    #[allow(dead_code)]
    path: PathBuf,
}

impl RocksPersistence {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;
        Ok(Self {
            db: RwLock::new(db),
            path,
        })
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Serialization(format!("missing column family {cf_name}")))?;
        let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        db.put_cf(&cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> StoreResult<Option<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Serialization(format!("missing column family {cf_name}")))?;
        match db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => {
                let (value, _) =
                    bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list_values<T: DeserializeOwned>(&self, cf_name: &str, prefix: &str) -> StoreResult<Vec<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Serialization(format!("missing column family {cf_name}")))?;
        let mut values = Vec::new();
        for item in db.prefix_iterator_cf(&cf, prefix.as_bytes()) {
            let (key, bytes) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let (value, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            values.push(value);
        }
        Ok(values)
    }
}

#[async_trait]
impl Persistence for RocksPersistence {
    async fn create_thread(&self, thread: &Thread) -> StoreResult<()> {
        self.put(CF_THREADS, &format!("thread:{}", thread.id), thread)
    }

    async fn create_turn(&self, turn: &Turn) -> StoreResult<()> {
        self.put(
            CF_TURNS,
            &format!("turn:{}:{:04}:{}", turn.thread_id, turn.round_number, turn.id),
            turn,
        )
    }

    async fn add_contribution(&self, contribution: &Contribution) -> StoreResult<()> {
        self.put(
            CF_CONTRIBUTIONS,
            &format!("contrib:{}:{}", contribution.turn_id, contribution.id),
            contribution,
        )
    }

    async fn save_decision(&self, decision: &Decision) -> StoreResult<()> {
        self.put(CF_DECISIONS, &format!("decision:{}", decision.turn_id), decision)
    }

    async fn save_outcome(&self, outcome: &Outcome) -> StoreResult<()> {
        self.put(
            CF_OUTCOMES,
            &format!("outcome:{}:{}", outcome.thread_id, outcome.id),
            outcome,
        )
    }

    async fn save_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.put(
            CF_VOTES,
            &format!("vote:{}:{}", vote.thread_id, vote.model_ref),
            vote,
        )
    }

    async fn save_subtasks(&self, subtasks: &[Subtask]) -> StoreResult<()> {
        for s in subtasks {
            self.put(CF_SUBTASKS, &format!("subtask:{}:{}", s.thread_id, s.label), s)?;
        }
        Ok(())
    }

    async fn get_thread_with_history(&self, thread_id: &str) -> StoreResult<ThreadHistory> {
        let thread: Thread = self
            .get(CF_THREADS, &format!("thread:{thread_id}"))?
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))?;

        let mut turns: Vec<Turn> = self.list_values(CF_TURNS, &format!("turn:{thread_id}:"))?;
        turns.sort_by_key(|t| t.round_number);

        let mut contributions = Vec::new();
        let mut decisions = Vec::new();
        let mut turn_summaries = Vec::new();
        for turn in &turns {
            contributions.extend(self.list_values::<Contribution>(
                CF_CONTRIBUTIONS,
                &format!("contrib:{}:", turn.id),
            )?);
            if let Some(d) = self.get::<Decision>(CF_DECISIONS, &format!("decision:{}", turn.id))? {
                decisions.push(d);
            }
            if let Some(s) = self.get::<Summary>(CF_SUMMARIES, &format!("turn_summary:{}", turn.id))? {
                turn_summaries.push(s);
            }
        }

        let outcomes = self.list_values(CF_OUTCOMES, &format!("outcome:{thread_id}:"))?;
        let thread_summary = self.get(CF_SUMMARIES, &format!("thread_summary:{thread_id}"))?;

        Ok(ThreadHistory {
            thread,
            turns,
            contributions,
            decisions,
            outcomes,
            thread_summary,
            turn_summaries,
        })
    }

    async fn upsert_turn_summary(&self, turn_id: &TurnId, summary: &Summary) -> StoreResult<()> {
        self.put(CF_SUMMARIES, &format!("turn_summary:{turn_id}"), summary)
    }

    async fn upsert_thread_summary(
        &self,
        thread_id: &ThreadId,
        summary: &Summary,
    ) -> StoreResult<()> {
        self.put(CF_SUMMARIES, &format!("thread_summary:{thread_id}"), summary)
    }

    async fn search(&self, keyword: &str, limit: usize) -> StoreResult<Vec<Thread>> {
        let mut all: Vec<Thread> = self.list_values(CF_THREADS, "thread:")?;
        let needle = keyword.to_lowercase();
        all.retain(|t| t.question.to_lowercase().contains(&needle));
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn set_thread_status(&self, thread_id: &str, status: ThreadStatus) -> StoreResult<()> {
        let mut thread: Thread = self
            .get(CF_THREADS, &format!("thread:{thread_id}"))?
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))?;
        thread.status = status;
        self.create_thread(&thread).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_thread_through_rocksdb() {
        let dir = tempdir().unwrap();
        let store = RocksPersistence::open(dir.path().join("test.db")).unwrap();

        let thread = Thread::new("design a cache");
        store.create_thread(&thread).await.unwrap();

        let history = store.get_thread_with_history(&thread.id).await.unwrap();
        assert_eq!(history.thread.question, "design a cache");
    }
}
