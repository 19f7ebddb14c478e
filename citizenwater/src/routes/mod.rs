//! HTTP routes for citizenwater

pub mod auth_routes;
pub mod common;
pub mod gateway;
pub mod health;
pub mod observations;
pub mod rewards;

pub use auth_routes::handle_auth_request;
pub use common::{cors_preflight, json_response, not_found_response, BoxBody};
pub use gateway::{forward_request, gateway_health, local_uri};
pub use health::health_check;
pub use observations::handle_observation_request;
pub use rewards::handle_rewards_request;
