//! Cross-service collaborators
//!
//! - Reward feed: observation service to rewards ledger
//! - Observation source: rewards ledger rebuilds from stored observations

pub mod observation_source;
pub mod reward_feed;

pub use observation_source::ObservationSource;
pub use reward_feed::RewardFeed;
