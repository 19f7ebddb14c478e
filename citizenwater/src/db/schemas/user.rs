//! User document schema

use bson::{doc, oid::ObjectId, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::{UserRecord, UserRole};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub citizen_id: String,

    pub username: String,

    /// Lowercased email
    pub email: String,

    /// Argon2 PHC string
    pub password_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl From<UserRecord> for UserDoc {
    fn from(user: UserRecord) -> Self {
        Self {
            _id: None,
            metadata: Metadata {
                created_at: Some(bson::DateTime::from_chrono(user.created_at)),
                ..Metadata::new()
            },
            citizen_id: user.citizen_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

impl From<UserDoc> for UserRecord {
    fn from(doc: UserDoc) -> Self {
        Self {
            citizen_id: doc.citizen_id,
            username: doc.username,
            email: doc.email,
            password_hash: doc.password_hash,
            full_name: doc.full_name,
            role: doc.role,
            is_active: doc.is_active,
            created_at: doc
                .metadata
                .created_at
                .map(|dt| dt.to_chrono())
                .unwrap_or_else(Utc::now),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "citizen_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("citizen_id_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
