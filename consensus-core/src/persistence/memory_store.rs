//! Default in-memory [`Persistence`] implementation: arena-style maps keyed
//! by opaque id, safe for concurrent orchestrator runs in tests and for
//! callers who do not need durability across process restarts.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::store::{Persistence, StoreError, StoreResult};
use super::types::*;

#[derive(Default)]
struct Inner {
    threads: HashMap<ThreadId, Thread>,
    turns: HashMap<TurnId, Turn>,
    turns_by_thread: HashMap<ThreadId, Vec<TurnId>>,
    contributions: HashMap<ContributionId, Contribution>,
    contributions_by_turn: HashMap<TurnId, Vec<ContributionId>>,
    decisions: HashMap<TurnId, Decision>,
    outcomes: HashMap<ThreadId, Vec<Outcome>>,
    votes: HashMap<ThreadId, Vec<Vote>>,
    subtasks: HashMap<ThreadId, Vec<Subtask>>,
    turn_summaries: HashMap<TurnId, Summary>,
    thread_summaries: HashMap<ThreadId, Summary>,
}

/// Arena-backed in-memory store. Never fails on read/write except for
/// not-found lookups; the `RwLock` is never held across an `.await`.
#[derive(Default)]
pub struct InMemoryPersistence {
    inner: RwLock<Inner>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn create_thread(&self, thread: &Thread) -> StoreResult<()> {
        self.write()?.threads.insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn create_turn(&self, turn: &Turn) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.turns.insert(turn.id.clone(), turn.clone());
        inner
            .turns_by_thread
            .entry(turn.thread_id.clone())
            .or_default()
            .push(turn.id.clone());
        Ok(())
    }

    async fn add_contribution(&self, contribution: &Contribution) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .contributions
            .insert(contribution.id.clone(), contribution.clone());
        inner
            .contributions_by_turn
            .entry(contribution.turn_id.clone())
            .or_default()
            .push(contribution.id.clone());
        Ok(())
    }

    async fn save_decision(&self, decision: &Decision) -> StoreResult<()> {
        self.write()?
            .decisions
            .insert(decision.turn_id.clone(), decision.clone());
        Ok(())
    }

    async fn save_outcome(&self, outcome: &Outcome) -> StoreResult<()> {
        self.write()?
            .outcomes
            .entry(outcome.thread_id.clone())
            .or_default()
            .push(outcome.clone());
        Ok(())
    }

    async fn save_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.write()?
            .votes
            .entry(vote.thread_id.clone())
            .or_default()
            .push(vote.clone());
        Ok(())
    }

    async fn save_subtasks(&self, subtasks: &[Subtask]) -> StoreResult<()> {
        if let Some(first) = subtasks.first() {
            self.write()?
                .subtasks
                .insert(first.thread_id.clone(), subtasks.to_vec());
        }
        Ok(())
    }

    async fn get_thread_with_history(&self, thread_id: &str) -> StoreResult<ThreadHistory> {
        let inner = self.read()?;
        let thread = inner
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))?;

        let turn_ids = inner
            .turns_by_thread
            .get(thread_id)
            .cloned()
            .unwrap_or_default();
        let mut turns: Vec<Turn> = turn_ids
            .iter()
            .filter_map(|id| inner.turns.get(id).cloned())
            .collect();
        turns.sort_by_key(|t| t.round_number);

        let mut contributions = Vec::new();
        let mut decisions = Vec::new();
        let mut turn_summaries = Vec::new();
        for turn in &turns {
            if let Some(ids) = inner.contributions_by_turn.get(&turn.id) {
                contributions.extend(ids.iter().filter_map(|id| inner.contributions.get(id).cloned()));
            }
            if let Some(d) = inner.decisions.get(&turn.id) {
                decisions.push(d.clone());
            }
            if let Some(s) = inner.turn_summaries.get(&turn.id) {
                turn_summaries.push(s.clone());
            }
        }

        let outcomes = inner.outcomes.get(thread_id).cloned().unwrap_or_default();
        let thread_summary = inner.thread_summaries.get(thread_id).cloned();

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
        self.write()?
            .turn_summaries
            .insert(turn_id.clone(), summary.clone());
        Ok(())
    }

    async fn upsert_thread_summary(
        &self,
        thread_id: &ThreadId,
        summary: &Summary,
    ) -> StoreResult<()> {
        self.write()?
            .thread_summaries
            .insert(thread_id.clone(), summary.clone());
        Ok(())
    }

    async fn search(&self, keyword: &str, limit: usize) -> StoreResult<Vec<Thread>> {
        let inner = self.read()?;
        let needle = keyword.to_lowercase();
        let mut matches: Vec<Thread> = inner
            .threads
            .values()
            .filter(|t| t.question.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn set_thread_status(&self, thread_id: &str, status: ThreadStatus) -> StoreResult<()> {
        let mut inner = self.write()?;
        let thread = inner
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))?;
        thread.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_thread_and_turn_history() {
        let store = InMemoryPersistence::new();
        let thread = Thread::new("should I use a monolith?");
        store.create_thread(&thread).await.unwrap();

        let turn = Turn::new(thread.id.clone(), 1);
        store.create_turn(&turn).await.unwrap();

        let contribution = Contribution::new(
            turn.id.clone(),
            crate::model::ModelRef::new("acme", "m"),
            ContributionRole::Proposer,
            "a proposal",
            10,
            20,
            0.001,
            50,
        );
        store.add_contribution(&contribution).await.unwrap();

        let history = store.get_thread_with_history(&thread.id).await.unwrap();
        assert_eq!(history.turns.len(), 1);
        assert_eq!(history.contributions.len(), 1);
    }

    #[tokio::test]
    async fn upserting_summary_replaces_not_appends() {
        let store = InMemoryPersistence::new();
        let thread = Thread::new("q");
        store.create_thread(&thread).await.unwrap();

        store
            .upsert_thread_summary(&thread.id, &Summary::new(thread.id.clone(), "v1"))
            .await
            .unwrap();
        store
            .upsert_thread_summary(&thread.id, &Summary::new(thread.id.clone(), "v2"))
            .await
            .unwrap();

        let history = store.get_thread_with_history(&thread.id).await.unwrap();
        assert_eq!(history.thread_summary.unwrap().content, "v2");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_respects_limit() {
        let store = InMemoryPersistence::new();
        for q in ["Monolith vs microservices", "monolith pricing", "unrelated"] {
            store.create_thread(&Thread::new(q)).await.unwrap();
        }
        let results = store.search("MONOLITH", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
