//! Citizen water domain core
//!
//! Observation validation, the per-citizen reward ledger with its badge
//! thresholds, and leaderboard ranking. Storage is abstracted behind the
//! [`RewardStore`] and [`ObservationStore`] traits; in-memory implementations
//! live in [`memory`].

pub mod error;
pub mod ledger;
pub mod memory;
pub mod observations;
pub mod ranker;
pub mod types;
pub mod validator;

pub use error::{CoreError, ValidationFailure};
pub use ledger::{RewardLedger, RewardStore, MAX_BATCH_OBSERVATIONS};
pub use memory::{MemoryObservationStore, MemoryRewardStore};
pub use observations::{ObservationStore, RECENT_OBSERVATIONS};
pub use ranker::{BadgeDistribution, Leaderboard, LeaderboardStatistics, DEFAULT_TOP_N};
pub use types::{
    Badge, CitizenId, CitizenReward, Observation, ObservationSubmission, RewardAdjustment,
};
pub use validator::{check_complete, validate};
