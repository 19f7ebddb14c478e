//! In-memory stores
//!
//! DashMap-backed implementations of the storage traits, used by tests and
//! by deployments that run without MongoDB. Contents are lost on restart.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::ledger::RewardStore;
use crate::observations::ObservationStore;
use crate::types::{CitizenId, CitizenReward, Observation};

/// Reward rows keyed by citizen id
pub struct MemoryRewardStore {
    rewards: DashMap<CitizenId, CitizenReward>,
}

impl MemoryRewardStore {
    pub fn new() -> Self {
        Self {
            rewards: DashMap::new(),
        }
    }
}

impl Default for MemoryRewardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RewardStore for MemoryRewardStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, citizen_id: &CitizenId) -> Result<Option<CitizenReward>> {
        Ok(self.rewards.get(citizen_id).map(|r| r.value().clone()))
    }

    async fn upsert(&self, reward: &CitizenReward) -> Result<()> {
        self.rewards.insert(reward.citizen_id.clone(), reward.clone());
        Ok(())
    }

    async fn delete(&self, citizen_id: &CitizenId) -> Result<bool> {
        Ok(self.rewards.remove(citizen_id).is_some())
    }

    async fn list(&self) -> Result<Vec<CitizenReward>> {
        Ok(self.rewards.iter().map(|r| r.value().clone()).collect())
    }

    async fn clear(&self) -> Result<usize> {
        let removed = self.rewards.len();
        self.rewards.clear();
        Ok(removed)
    }
}

/// Observations keyed by id
pub struct MemoryObservationStore {
    observations: DashMap<String, Observation>,
}

impl MemoryObservationStore {
    pub fn new() -> Self {
        Self {
            observations: DashMap::new(),
        }
    }

    /// Matching observations, oldest first
    fn collect_where<F>(&self, keep: F) -> Vec<Observation>
    where
        F: Fn(&Observation) -> bool,
    {
        let mut matched: Vec<Observation> = self
            .observations
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        matched
    }
}

impl Default for MemoryObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationStore for MemoryObservationStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, observation: Observation) -> Result<Observation> {
        self.observations
            .insert(observation.id.clone(), observation.clone());
        Ok(observation)
    }

    async fn get(&self, id: &str) -> Result<Option<Observation>> {
        Ok(self.observations.get(id).map(|o| o.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.observations.remove(id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Observation>> {
        Ok(self.collect_where(|_| true))
    }

    async fn list_by_citizen(&self, citizen_id: &CitizenId) -> Result<Vec<Observation>> {
        Ok(self.collect_where(|o| &o.citizen_id == citizen_id))
    }

    async fn list_valid_by_citizen(&self, citizen_id: &CitizenId) -> Result<Vec<Observation>> {
        Ok(self.collect_where(|o| o.valid && &o.citizen_id == citizen_id))
    }

    async fn list_by_postcode(&self, postcode: &str) -> Result<Vec<Observation>> {
        Ok(self.collect_where(|o| o.postcode == postcode))
    }

    async fn list_valid(&self) -> Result<Vec<Observation>> {
        Ok(self.collect_where(|o| o.valid))
    }

    async fn recent_valid(&self, limit: usize) -> Result<Vec<Observation>> {
        let mut valid = self.collect_where(|o| o.valid);
        valid.reverse();
        valid.truncate(limit);
        Ok(valid)
    }

    async fn count_by_citizen(&self, citizen_id: &CitizenId) -> Result<u64> {
        Ok(self
            .observations
            .iter()
            .filter(|o| &o.citizen_id == citizen_id)
            .count() as u64)
    }

    async fn count_valid_by_citizen(&self, citizen_id: &CitizenId) -> Result<u64> {
        Ok(self
            .observations
            .iter()
            .filter(|o| o.valid && &o.citizen_id == citizen_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn observation(id: &str, citizen: &str, postcode: &str, minute: i64) -> Observation {
        Observation {
            id: id.into(),
            citizen_id: CitizenId::parse(citizen).unwrap(),
            postcode: postcode.into(),
            temperature: Some(10.0),
            ph: None,
            alkalinity: None,
            turbidity: None,
            observations: Vec::new(),
            image_paths: Vec::new(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
                + Duration::minutes(minute),
            valid: true,
            complete: false,
        }
    }

    #[tokio::test]
    async fn test_listings_are_oldest_first() {
        let store = MemoryObservationStore::new();
        store.insert(observation("b", "c1", "AB1", 5)).await.unwrap();
        store.insert(observation("a", "c1", "AB1", 1)).await.unwrap();
        store.insert(observation("c", "c2", "ZZ9", 3)).await.unwrap();

        let ids: Vec<String> = store.list_all().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        let c1 = CitizenId::parse("c1").unwrap();
        assert_eq!(store.list_by_citizen(&c1).await.unwrap().len(), 2);
        assert_eq!(store.count_by_citizen(&c1).await.unwrap(), 2);
        assert_eq!(store.list_by_postcode("ZZ9").await.unwrap()[0].id, "c");
    }

    #[tokio::test]
    async fn test_recent_valid_is_newest_first_and_bounded() {
        let store = MemoryObservationStore::new();
        for minute in 0..8 {
            store
                .insert(observation(&format!("obs-{minute}"), "c1", "AB1", minute))
                .await
                .unwrap();
        }

        let recent = store.recent_valid(5).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].id, "obs-7");
        assert_eq!(recent[4].id, "obs-3");
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let store = MemoryObservationStore::new();
        store.insert(observation("a", "c1", "AB1", 0)).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }
}
