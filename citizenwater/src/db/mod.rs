//! Database layer
//!
//! MongoDB client, document schemas and the MongoDB implementations of the
//! user, observation and reward stores.

pub mod mongo;
pub mod schemas;
pub mod stores;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use stores::{MongoObservationStore, MongoRewardStore, MongoUserStore};
