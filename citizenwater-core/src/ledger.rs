//! Reward ledger
//!
//! Per-citizen points and badges, backed by any [`RewardStore`].
//!
//! Every read-modify-write on a citizen's row runs under that citizen's own
//! async mutex, so concurrent updates for one citizen are serialized while
//! different citizens never contend. A lock entry lives only while someone
//! holds or waits on it. Clearing the whole ledger waits for every in-flight
//! update and holds new ones back until it is done.
//!
//! Reads go through get-or-create, so a citizen never observes "not found"
//! from the ledger itself; only [`RewardLedger::find`] and the leaderboard
//! rank can.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::ranker::Leaderboard;
use crate::types::{CitizenId, CitizenReward, RewardAdjustment};

/// Keyed storage for ledger rows
#[async_trait]
pub trait RewardStore: Send + Sync {
    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;

    async fn get(&self, citizen_id: &CitizenId) -> Result<Option<CitizenReward>>;

    /// Insert or replace the row for `reward.citizen_id`
    async fn upsert(&self, reward: &CitizenReward) -> Result<()>;

    /// Remove a row, returning false if it did not exist
    async fn delete(&self, citizen_id: &CitizenId) -> Result<bool>;

    async fn list(&self) -> Result<Vec<CitizenReward>>;

    /// Remove every row, returning how many were removed
    async fn clear(&self) -> Result<usize>;
}

/// Most observations one batch credit may replay
pub const MAX_BATCH_OBSERVATIONS: u32 = 1000;

type CitizenLocks = DashMap<CitizenId, Arc<Mutex<()>>>;

/// Exclusive hold on one citizen's row.
///
/// Dropping it releases the mutex and removes the lock entry once nobody
/// else is holding or waiting on it.
struct CitizenGuard<'a> {
    locks: &'a CitizenLocks,
    citizen_id: CitizenId,
    guard: Option<OwnedMutexGuard<()>>,
    _writers: RwLockReadGuard<'a, ()>,
}

impl Drop for CitizenGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.citizen_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Ledger operations over a reward store
pub struct RewardLedger {
    store: Arc<dyn RewardStore>,
    locks: CitizenLocks,
    /// Held shared by per-citizen writers, exclusively by `clear_all`
    writers: RwLock<()>,
}

impl RewardLedger {
    pub fn new(store: Arc<dyn RewardStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            writers: RwLock::new(()),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    async fn lock(&self, citizen_id: &CitizenId) -> CitizenGuard<'_> {
        let writers = self.writers.read().await;
        let lock = self.locks.entry(citizen_id.clone()).or_default().clone();
        // Built before waiting so a cancelled waiter still prunes the entry
        let mut held = CitizenGuard {
            locks: &self.locks,
            citizen_id: citizen_id.clone(),
            guard: None,
            _writers: writers,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Load the row or a fresh zeroed one, reporting whether it already existed.
    /// Caller must hold the citizen's lock.
    async fn load(&self, citizen_id: &CitizenId) -> Result<(CitizenReward, bool)> {
        Ok(match self.store.get(citizen_id).await? {
            Some(reward) => (reward, true),
            None => (CitizenReward::new(citizen_id.clone()), false),
        })
    }

    /// Read-modify-write under the citizen's lock
    async fn update<F>(&self, citizen_id: &CitizenId, mutate: F) -> Result<CitizenReward>
    where
        F: FnOnce(&mut CitizenReward) -> Result<()> + Send,
    {
        let _guard = self.lock(citizen_id).await;
        let (mut reward, _) = self.load(citizen_id).await?;
        mutate(&mut reward)?;
        self.store.upsert(&reward).await?;
        Ok(reward)
    }

    /// Existing row only, never creates
    pub async fn find(&self, citizen_id: &CitizenId) -> Result<Option<CitizenReward>> {
        self.store.get(citizen_id).await
    }

    pub async fn get_or_create(&self, citizen_id: &CitizenId) -> Result<CitizenReward> {
        self.create_profile(citizen_id).await.map(|(reward, _)| reward)
    }

    /// Get-or-create that reports whether a new row was written
    pub async fn create_profile(&self, citizen_id: &CitizenId) -> Result<(CitizenReward, bool)> {
        let _guard = self.lock(citizen_id).await;
        let (reward, existed) = self.load(citizen_id).await?;
        if !existed {
            self.store.upsert(&reward).await?;
            info!(citizen_id = %citizen_id, "Created reward profile");
        }
        Ok((reward, !existed))
    }

    /// Credit one valid observation (10 points, 20 if complete)
    pub async fn record_observation(
        &self,
        citizen_id: &CitizenId,
        is_complete: bool,
    ) -> Result<CitizenReward> {
        let reward = self
            .update(citizen_id, |reward| {
                if let Some(badge) = reward.apply_observation(is_complete)? {
                    info!(citizen_id = %reward.citizen_id, badge = %badge, "Badge awarded");
                }
                Ok(())
            })
            .await?;

        debug!(
            citizen_id = %citizen_id,
            complete = is_complete,
            total_points = reward.total_points,
            "Recorded observation"
        );
        Ok(reward)
    }

    /// Credit `valid_count` observations, the first `complete_count` of them complete.
    ///
    /// Badges are evaluated after each observation, exactly as if they had
    /// arrived one at a time. At most [`MAX_BATCH_OBSERVATIONS`] are accepted.
    pub async fn record_batch(
        &self,
        citizen_id: &CitizenId,
        valid_count: u32,
        complete_count: u32,
    ) -> Result<CitizenReward> {
        if valid_count > MAX_BATCH_OBSERVATIONS {
            return Err(CoreError::BatchTooLarge {
                max: MAX_BATCH_OBSERVATIONS,
            });
        }

        self.update(citizen_id, |reward| {
            for i in 0..valid_count {
                reward.apply_observation(i < complete_count)?;
            }
            Ok(())
        })
        .await
    }

    /// Raw administrative point adjustment, badges untouched
    pub async fn add_points(&self, citizen_id: &CitizenId, delta: i64) -> Result<CitizenReward> {
        info!(citizen_id = %citizen_id, delta, "Adjusting points");
        self.update(citizen_id, |reward| reward.add_points(delta)).await
    }

    /// Apply an administrative adjustment, badges untouched
    pub async fn process_reward(
        &self,
        citizen_id: &CitizenId,
        adjustment: &RewardAdjustment,
    ) -> Result<CitizenReward> {
        info!(citizen_id = %citizen_id, points = adjustment.points, "Processing reward");
        self.update(citizen_id, |reward| reward.apply_adjustment(adjustment)).await
    }

    pub async fn reset(&self, citizen_id: &CitizenId) -> Result<CitizenReward> {
        info!(citizen_id = %citizen_id, "Resetting rewards");
        self.update(citizen_id, |reward| {
            reward.reset();
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, citizen_id: &CitizenId) -> Result<bool> {
        let _guard = self.lock(citizen_id).await;
        self.store.delete(citizen_id).await
    }

    /// Recompute a row from scratch by replaying valid observations.
    ///
    /// `complete_flags` holds one entry per valid observation, oldest first.
    /// An empty replay leaves any existing row as it is.
    pub async fn rebuild(
        &self,
        citizen_id: &CitizenId,
        complete_flags: &[bool],
    ) -> Result<CitizenReward> {
        if complete_flags.is_empty() {
            return self.get_or_create(citizen_id).await;
        }

        self.update(citizen_id, |reward| {
            reward.reset();
            for &complete in complete_flags {
                reward.apply_observation(complete)?;
            }
            Ok(())
        })
        .await
    }

    /// Remove every row once in-flight updates have finished
    pub async fn clear_all(&self) -> Result<usize> {
        let _writers = self.writers.write().await;
        let removed = self.store.clear().await?;
        info!(removed, "Cleared reward ledger");
        Ok(removed)
    }

    pub async fn snapshot(&self) -> Result<Vec<CitizenReward>> {
        self.store.list().await
    }

    /// Rank the current snapshot
    pub async fn leaderboard(&self) -> Result<Leaderboard> {
        Ok(Leaderboard::new(self.snapshot().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRewardStore;
    use crate::types::Badge;
    use std::time::Duration;
    use tokio::time::timeout;

    fn ledger() -> RewardLedger {
        RewardLedger::new(Arc::new(MemoryRewardStore::new()))
    }

    fn citizen(id: &str) -> CitizenId {
        CitizenId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_create_profile_reports_creation_once() {
        let ledger = ledger();
        let id = citizen("c1");

        let (first, created) = ledger.create_profile(&id).await.unwrap();
        assert!(created);
        let (second, created_again) = ledger.create_profile(&id).await.unwrap();
        assert!(!created_again);
        assert_eq!(first, second);
        assert_eq!(ledger.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_does_not_create() {
        let ledger = ledger();
        assert!(ledger.find(&citizen("ghost")).await.unwrap().is_none());
        assert!(ledger.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_matches_individual_events() {
        let ledger = ledger();
        let batched = citizen("batched");
        let single = citizen("single");

        ledger.record_batch(&batched, 12, 4).await.unwrap();
        for i in 0..12 {
            ledger.record_observation(&single, i < 4).await.unwrap();
        }

        let a = ledger.find(&batched).await.unwrap().unwrap();
        let b = ledger.find(&single).await.unwrap().unwrap();
        assert_eq!(a.total_points, 160);
        assert_eq!(a.total_points, b.total_points);
        assert_eq!(a.badges, b.badges);
        assert_eq!(a.current_badge, Badge::Bronze);
    }

    #[tokio::test]
    async fn test_rebuild_replays_from_zero() {
        let ledger = ledger();
        let id = citizen("c1");
        ledger.add_points(&id, 1000).await.unwrap();

        let rebuilt = ledger.rebuild(&id, &[true, false, true]).await.unwrap();
        assert_eq!(rebuilt.total_points, 50);
        assert_eq!(rebuilt.valid_observations, 3);
        assert_eq!(rebuilt.complete_observations, 2);
        assert!(rebuilt.badges.is_empty());
    }

    #[tokio::test]
    async fn test_empty_rebuild_keeps_row() {
        let ledger = ledger();
        let id = citizen("c1");
        ledger.record_observation(&id, true).await.unwrap();

        let kept = ledger.rebuild(&id, &[]).await.unwrap();
        assert_eq!(kept.total_points, 20);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let ledger = ledger();
        ledger.get_or_create(&citizen("a")).await.unwrap();
        ledger.get_or_create(&citizen("b")).await.unwrap();

        assert!(ledger.delete(&citizen("a")).await.unwrap());
        assert!(!ledger.delete(&citizen("a")).await.unwrap());
        assert_eq!(ledger.clear_all().await.unwrap(), 1);
        assert!(ledger.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let ledger = Arc::new(ledger());
        let id = citizen("busy");

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = Arc::clone(&ledger);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_observation(&id, false).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reward = ledger.find(&id).await.unwrap().unwrap();
        assert_eq!(reward.valid_observations, 50);
        assert_eq!(reward.total_points, 500);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let ledger = ledger();
        let id = citizen("bulk");

        let err = ledger
            .record_batch(&id, MAX_BATCH_OBSERVATIONS + 1, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BatchTooLarge { .. }));
        assert!(ledger.find(&id).await.unwrap().is_none());

        let reward = ledger.record_batch(&id, MAX_BATCH_OBSERVATIONS, 0).await.unwrap();
        assert_eq!(reward.valid_observations, u64::from(MAX_BATCH_OBSERVATIONS));
    }

    #[tokio::test]
    async fn test_overflow_is_an_error_and_keeps_row() {
        let ledger = ledger();
        let id = citizen("ovf");
        ledger.add_points(&id, i64::MAX).await.unwrap();

        let err = ledger.add_points(&id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, CoreError::PointsOutOfRange { .. }));
        tokio_test::assert_err!(ledger.record_observation(&id, true).await);

        let stored = ledger.find(&id).await.unwrap().unwrap();
        assert_eq!(stored.total_points, i64::MAX);
        assert_eq!(stored.valid_observations, 0);
    }

    #[tokio::test]
    async fn test_lock_entries_are_released() {
        let ledger = ledger();
        for i in 0..1000 {
            let id = citizen(&format!("c{}", i));
            ledger.get_or_create(&id).await.unwrap();
            ledger.record_observation(&id, false).await.unwrap();
            ledger.delete(&id).await.unwrap();
        }
        ledger.clear_all().await.unwrap();

        assert!(ledger.snapshot().await.unwrap().is_empty());
        assert!(ledger.locks.is_empty());
    }

    #[tokio::test]
    async fn test_held_citizen_does_not_block_others() {
        let ledger = ledger();
        let busy = citizen("busy");
        let guard = ledger.lock(&busy).await;

        let other = timeout(
            Duration::from_secs(5),
            ledger.record_observation(&citizen("other"), false),
        )
        .await;
        assert_eq!(other.unwrap().unwrap().total_points, 10);

        let same = timeout(
            Duration::from_millis(50),
            ledger.record_observation(&busy, false),
        )
        .await;
        assert!(same.is_err());

        drop(guard);
        let reward = ledger.record_observation(&busy, false).await.unwrap();
        assert_eq!(reward.total_points, 10);
    }

    #[tokio::test]
    async fn test_clear_waits_for_in_flight_updates() {
        let ledger = ledger();
        let id = citizen("c1");
        ledger.get_or_create(&id).await.unwrap();
        let guard = ledger.lock(&id).await;

        let blocked = timeout(Duration::from_millis(50), ledger.clear_all()).await;
        assert!(blocked.is_err());

        drop(guard);
        assert_eq!(ledger.clear_all().await.unwrap(), 1);
        assert!(ledger.locks.is_empty());
    }
}
