//! MongoDB-backed implementations of the store traits

use async_trait::async_trait;
use bson::doc;
use citizenwater_core::error::Result as CoreResult;
use citizenwater_core::{
    CitizenId, CitizenReward, CoreError, Observation, ObservationStore, RewardStore,
};
use tracing::warn;

use crate::auth::{normalize_email, users, UserRecord, UserStore};
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    ObservationDoc, RewardDoc, UserDoc, OBSERVATION_COLLECTION, REWARD_COLLECTION,
    USER_COLLECTION,
};
use crate::types::ServiceError;

fn storage(err: ServiceError) -> CoreError {
    CoreError::Storage(err.to_string())
}

/// Convert stored documents, skipping any that no longer parse
fn convert_all<D, T>(docs: Vec<D>) -> Vec<T>
where
    T: TryFrom<D, Error = CoreError>,
{
    docs.into_iter()
        .filter_map(|doc| match T::try_from(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping unreadable document: {}", e);
                None
            }
        })
        .collect()
}

// =============================================================================
// Rewards
// =============================================================================

pub struct MongoRewardStore {
    rewards: MongoCollection<RewardDoc>,
}

impl MongoRewardStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self, ServiceError> {
        Ok(Self {
            rewards: mongo.collection(REWARD_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl RewardStore for MongoRewardStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn get(&self, citizen_id: &CitizenId) -> CoreResult<Option<CitizenReward>> {
        self.rewards
            .find_one(doc! { "citizen_id": citizen_id.as_str() })
            .await
            .map_err(storage)?
            .map(CitizenReward::try_from)
            .transpose()
    }

    async fn upsert(&self, reward: &CitizenReward) -> CoreResult<()> {
        self.rewards
            .upsert_one(
                doc! { "citizen_id": reward.citizen_id.as_str() },
                &RewardDoc::from(reward),
            )
            .await
            .map_err(storage)
    }

    async fn delete(&self, citizen_id: &CitizenId) -> CoreResult<bool> {
        self.rewards
            .delete_many(doc! { "citizen_id": citizen_id.as_str() })
            .await
            .map(|deleted| deleted > 0)
            .map_err(storage)
    }

    async fn list(&self) -> CoreResult<Vec<CitizenReward>> {
        let docs = self
            .rewards
            .find_many(doc! {}, doc! { "total_points": -1, "citizen_id": 1 }, None)
            .await
            .map_err(storage)?;
        Ok(convert_all(docs))
    }

    async fn clear(&self) -> CoreResult<usize> {
        self.rewards
            .delete_many(doc! {})
            .await
            .map(|deleted| deleted as usize)
            .map_err(storage)
    }
}

// =============================================================================
// Observations
// =============================================================================

pub struct MongoObservationStore {
    observations: MongoCollection<ObservationDoc>,
}

impl MongoObservationStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self, ServiceError> {
        Ok(Self {
            observations: mongo.collection(OBSERVATION_COLLECTION).await?,
        })
    }

    async fn list(
        &self,
        filter: bson::Document,
        newest_first: bool,
        limit: Option<i64>,
    ) -> CoreResult<Vec<Observation>> {
        let order = if newest_first { -1 } else { 1 };
        let docs = self
            .observations
            .find_many(filter, doc! { "timestamp": order, "observation_id": order }, limit)
            .await
            .map_err(storage)?;
        Ok(convert_all(docs))
    }
}

#[async_trait]
impl ObservationStore for MongoObservationStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn insert(&self, observation: Observation) -> CoreResult<Observation> {
        self.observations
            .insert_one(ObservationDoc::from(observation.clone()))
            .await
            .map_err(storage)?;
        Ok(observation)
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Observation>> {
        self.observations
            .find_one(doc! { "observation_id": id })
            .await
            .map_err(storage)?
            .map(Observation::try_from)
            .transpose()
    }

    async fn delete(&self, id: &str) -> CoreResult<bool> {
        self.observations
            .soft_delete(doc! { "observation_id": id })
            .await
            .map_err(storage)
    }

    async fn list_all(&self) -> CoreResult<Vec<Observation>> {
        self.list(doc! {}, false, None).await
    }

    async fn list_by_citizen(&self, citizen_id: &CitizenId) -> CoreResult<Vec<Observation>> {
        self.list(doc! { "citizen_id": citizen_id.as_str() }, false, None)
            .await
    }

    async fn list_valid_by_citizen(
        &self,
        citizen_id: &CitizenId,
    ) -> CoreResult<Vec<Observation>> {
        self.list(
            doc! { "citizen_id": citizen_id.as_str(), "valid": true },
            false,
            None,
        )
        .await
    }

    async fn list_by_postcode(&self, postcode: &str) -> CoreResult<Vec<Observation>> {
        self.list(doc! { "postcode": postcode }, false, None).await
    }

    async fn list_valid(&self) -> CoreResult<Vec<Observation>> {
        self.list(doc! { "valid": true }, false, None).await
    }

    async fn recent_valid(&self, limit: usize) -> CoreResult<Vec<Observation>> {
        self.list(doc! { "valid": true }, true, Some(limit as i64))
            .await
    }

    async fn count_by_citizen(&self, citizen_id: &CitizenId) -> CoreResult<u64> {
        self.observations
            .count(doc! { "citizen_id": citizen_id.as_str() })
            .await
            .map_err(storage)
    }

    async fn count_valid_by_citizen(&self, citizen_id: &CitizenId) -> CoreResult<u64> {
        self.observations
            .count(doc! { "citizen_id": citizen_id.as_str(), "valid": true })
            .await
            .map_err(storage)
    }
}

// =============================================================================
// Users
// =============================================================================

pub struct MongoUserStore {
    users: MongoCollection<UserDoc>,
}

impl MongoUserStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self, ServiceError> {
        Ok(Self {
            users: mongo.collection(USER_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self
            .users
            .find_one(doc! { "username": username })
            .await?
            .map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self
            .users
            .find_one(doc! { "email": normalize_email(email) })
            .await?
            .map(UserRecord::from))
    }

    async fn insert(&self, user: UserRecord) -> Result<(), ServiceError> {
        if self.username_exists(&user.username).await? {
            return Err(users::username_taken());
        }
        if self.email_exists(&user.email).await? {
            return Err(users::email_taken());
        }
        // The unique indexes still reject a registration racing this one
        self.users.insert_one(UserDoc::from(user)).await
    }
}
