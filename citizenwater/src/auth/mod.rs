//! Authentication and authorization
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing with Argon2
//! - User roles for admin-only operations
//! - Account storage

pub mod jwt;
pub mod password;
pub mod roles;
pub mod users;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use roles::UserRole;
pub use users::{normalize_email, MemoryUserStore, UserRecord, UserStore};
