//! Citizen reward document schema

use bson::{doc, oid::ObjectId, Document};
use citizenwater_core::{Badge, CitizenId, CitizenReward, CoreError};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for reward ledger rows
pub const REWARD_COLLECTION: &str = "citizen_rewards";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RewardDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub citizen_id: String,

    pub total_points: i64,

    pub valid_observations: i64,

    pub complete_observations: i64,

    /// Badge names in the order they were earned
    #[serde(default)]
    pub badges: Vec<Badge>,

    #[serde(default)]
    pub current_badge: Badge,
}

impl From<&CitizenReward> for RewardDoc {
    fn from(reward: &CitizenReward) -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            citizen_id: reward.citizen_id.to_string(),
            total_points: reward.total_points,
            valid_observations: reward.valid_observations as i64,
            complete_observations: reward.complete_observations as i64,
            badges: reward.badges.clone(),
            current_badge: reward.current_badge,
        }
    }
}

impl TryFrom<RewardDoc> for CitizenReward {
    type Error = CoreError;

    fn try_from(doc: RewardDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            citizen_id: CitizenId::parse(&doc.citizen_id)?,
            total_points: doc.total_points,
            valid_observations: doc.valid_observations.max(0) as u64,
            complete_observations: doc.complete_observations.max(0) as u64,
            badges: doc.badges,
            current_badge: doc.current_badge,
        })
    }
}

impl IntoIndexes for RewardDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "citizen_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("citizen_id_unique".to_string())
                        .build(),
                ),
            ),
            // Leaderboard order
            (
                doc! { "total_points": -1, "citizen_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("leaderboard_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for RewardDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
