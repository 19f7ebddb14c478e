//! Observation storage abstraction
//!
//! Observations are written once at submission and only ever removed by an
//! explicit delete. Listings come back oldest first, except `recent_valid`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CitizenId, Observation};

/// Number of observations returned by the "recent" listing
pub const RECENT_OBSERVATIONS: usize = 5;

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;

    async fn insert(&self, observation: Observation) -> Result<Observation>;

    async fn get(&self, id: &str) -> Result<Option<Observation>>;

    /// Remove an observation, returning false if it did not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list_all(&self) -> Result<Vec<Observation>>;

    async fn list_by_citizen(&self, citizen_id: &CitizenId) -> Result<Vec<Observation>>;

    async fn list_valid_by_citizen(&self, citizen_id: &CitizenId) -> Result<Vec<Observation>>;

    async fn list_by_postcode(&self, postcode: &str) -> Result<Vec<Observation>>;

    async fn list_valid(&self) -> Result<Vec<Observation>>;

    /// Newest valid observations first
    async fn recent_valid(&self, limit: usize) -> Result<Vec<Observation>>;

    async fn count_by_citizen(&self, citizen_id: &CitizenId) -> Result<u64>;

    async fn count_valid_by_citizen(&self, citizen_id: &CitizenId) -> Result<u64>;
}
