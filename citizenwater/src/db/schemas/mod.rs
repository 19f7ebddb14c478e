//! Database schemas for citizenwater
//!
//! MongoDB document structures for users, observations and reward rows.

mod metadata;
mod observation;
mod reward;
mod user;

pub use metadata::Metadata;
pub use observation::{ObservationDoc, OBSERVATION_COLLECTION};
pub use reward::{RewardDoc, REWARD_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
