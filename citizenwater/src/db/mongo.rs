//! MongoDB client and collection wrapper

use bson::{doc, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::ServiceError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, ServiceError> {
        info!("Connecting to MongoDB database '{}'", db_name);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ServiceError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, ServiceError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection.
///
/// Reads skip soft-deleted documents.
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

fn live(filter: Document) -> Document {
    let mut full_filter = filter;
    full_filter.insert("metadata.is_deleted", doc! { "$ne": true });
    full_filter
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, ServiceError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), ServiceError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<(), ServiceError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        self.inner
            .insert_one(item)
            .await
            .map_err(|e| ServiceError::Database(format!("Insert failed: {}", e)))?;

        Ok(())
    }

    /// Overwrite the fields of the document matching `filter`, inserting it if
    /// absent. `created_at` is only written on insert.
    pub async fn upsert_one(&self, filter: Document, item: &T) -> Result<(), ServiceError> {
        let now = DateTime::now();

        let mut fields = bson::to_document(item)
            .map_err(|e| ServiceError::Internal(format!("Failed to encode document: {}", e)))?;
        fields.remove("_id");
        fields.remove("metadata");
        fields.insert("metadata.is_deleted", false);
        fields.insert("metadata.updated_at", now);

        let update = doc! {
            "$set": fields,
            "$setOnInsert": { "metadata.created_at": now },
        };

        self.inner
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|e| ServiceError::Database(format!("Upsert failed: {}", e)))?;

        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, ServiceError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| ServiceError::Database(format!("Find failed: {}", e)))
    }

    /// Find documents in `sort` order, optionally bounded
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
    ) -> Result<Vec<T>, ServiceError> {
        let mut find = self.inner.find(live(filter)).sort(sort);
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let cursor = find
            .await
            .map_err(|e| ServiceError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    pub async fn count(&self, filter: Document) -> Result<u64, ServiceError> {
        self.inner
            .count_documents(live(filter))
            .await
            .map_err(|e| ServiceError::Database(format!("Count failed: {}", e)))
    }

    /// Mark a document deleted, returning false if no live document matched
    pub async fn soft_delete(&self, filter: Document) -> Result<bool, ServiceError> {
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            }
        };

        let result = self
            .inner
            .update_one(live(filter), update)
            .await
            .map_err(|e| ServiceError::Database(format!("Update failed: {}", e)))?;

        Ok(result.modified_count > 0)
    }

    /// Permanently remove matching documents, returning how many went
    pub async fn delete_many(&self, filter: Document) -> Result<u64, ServiceError> {
        self.inner
            .delete_many(filter)
            .await
            .map(|result| result.deleted_count)
            .map_err(|e| ServiceError::Database(format!("Delete failed: {}", e)))
    }
}
