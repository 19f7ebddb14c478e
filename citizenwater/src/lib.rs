//! Citizenwater - citizen science water quality services
//!
//! One binary, four roles:
//!
//! - **Auth**: registration, login and JWT issuance
//! - **Observations**: submission, validation and queries of water readings
//! - **Rewards**: points, badges and the leaderboard
//! - **Gateway**: one address in front of the other three
//!
//! The `all` role runs auth, observations and rewards together and answers
//! gateway paths locally. Domain logic lives in `citizenwater-core`.

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::{Args, Role};
pub use server::{run, serve, AppState};
pub use types::{Result, ServiceError};
