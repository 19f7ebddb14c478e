//! Registered user accounts
//!
//! [`UserStore`] abstracts where accounts live; [`MemoryUserStore`] keeps
//! them in DashMaps and the MongoDB implementation lives in `db::stores`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::auth::UserRole;
use crate::types::ServiceError;

/// A registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub citizen_id: String,
    pub username: String,
    /// Stored lowercased
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// New active citizen account with a freshly generated citizen id
    pub fn new_citizen(
        username: String,
        email: String,
        password_hash: String,
        full_name: Option<String>,
    ) -> Self {
        Self {
            citizen_id: uuid::Uuid::new_v4().to_string(),
            username,
            email: normalize_email(&email),
            password_hash,
            full_name,
            role: UserRole::Citizen,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Emails compare case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, ServiceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError>;

    /// Insert a new account, failing with BadRequest if the username or email is taken
    async fn insert(&self, user: UserRecord) -> Result<(), ServiceError>;

    /// Username first, then email
    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, ServiceError> {
        if let Some(user) = self.find_by_username(login).await? {
            return Ok(Some(user));
        }
        self.find_by_email(login).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, ServiceError> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self.find_by_email(email).await?.is_some())
    }
}

pub(crate) fn username_taken() -> ServiceError {
    ServiceError::BadRequest("Username is already taken".into())
}

pub(crate) fn email_taken() -> ServiceError {
    ServiceError::BadRequest("Email is already registered".into())
}

/// In-memory accounts keyed by username, with an email index
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
    emails: DashMap<String, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self.users.get(username).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        let username = match self.emails.get(&normalize_email(email)) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        self.find_by_username(&username).await
    }

    async fn insert(&self, user: UserRecord) -> Result<(), ServiceError> {
        // Claim the email first so two registrations cannot share it
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(email_taken()),
            Entry::Vacant(slot) => {
                slot.insert(user.username.clone());
            }
        }

        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => {
                self.emails.remove(&user.email);
                Err(username_taken())
            }
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, email: &str) -> UserRecord {
        UserRecord::new_citizen(username.into(), email.into(), "$argon2id$stub".into(), None)
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let store = MemoryUserStore::new();
        store.insert(user("alice", "Alice@Example.org")).await.unwrap();

        assert!(store.find_by_login("alice").await.unwrap().is_some());
        assert!(store.find_by_login("alice@example.org").await.unwrap().is_some());
        assert!(store.find_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let store = MemoryUserStore::new();
        store.insert(user("alice", "alice@example.org")).await.unwrap();

        let dup_name = store.insert(user("alice", "other@example.org")).await;
        assert!(matches!(dup_name, Err(ServiceError::BadRequest(_))));
        // The failed insert must not hold on to the new email
        assert!(!store.email_exists("other@example.org").await.unwrap());

        let dup_email = store.insert(user("alicia", "ALICE@example.org")).await;
        assert!(matches!(dup_email, Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn test_new_citizen_defaults() {
        let record = user("carol", " Carol@Example.org ");
        assert_eq!(record.email, "carol@example.org");
        assert_eq!(record.role, UserRole::Citizen);
        assert!(record.is_active);
        assert!(uuid::Uuid::parse_str(&record.citizen_id).is_ok());
    }
}
