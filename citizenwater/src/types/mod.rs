//! Shared types for citizenwater services

pub mod error;

pub use error::{Result, ServiceError};
