//! Document store gateway.
//!
//! Handlers only see [`DesignStore`]; the process entry point decides which
//! implementation backs it and hands it over through `AppState`.

use super::MongoDb;
use crate::models::{Design, Revision};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::FindOptions;
use service_core::error::AppError;
use thiserror::Error;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored document no longer matches the revision a write was based on,
    /// or an insert collided with an existing id.
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(anyhow::Error::new(err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            StoreError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

#[async_trait]
pub trait DesignStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Design>, StoreError>;

    async fn create(&self, design: &Design) -> Result<(), StoreError>;

    /// Replace the stored design, provided it still matches `expected`.
    async fn replace(&self, design: &Design, expected: &Revision) -> Result<(), StoreError>;

    /// Remove the design if it is still owned by `user_id`. Returns whether a
    /// document was removed.
    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// All designs owned by `user_id`, newest first.
    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<Design>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

pub struct MongoDesignStore {
    db: MongoDb,
}

impl MongoDesignStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

fn revision_filter(id: &str, expected: &Revision) -> Document {
    let mut filter = doc! { "_id": id, "userId": &expected.user_id };
    match &expected.updated_at {
        Some(updated_at) => filter.insert("updatedAt", updated_at),
        None => filter.insert("updatedAt", doc! { "$exists": false }),
    };
    filter
}

#[async_trait]
impl DesignStore for MongoDesignStore {
    async fn get(&self, id: &str) -> Result<Option<Design>, StoreError> {
        Ok(self.db.designs().find_one(doc! { "_id": id }, None).await?)
    }

    async fn create(&self, design: &Design) -> Result<(), StoreError> {
        match self.db.designs().insert_one(design, None).await {
            Ok(_) => Ok(()),
            Err(e) => match e.kind.as_ref() {
                ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => Err(
                    StoreError::Conflict(format!("Design {} already exists", design.id)),
                ),
                _ => Err(e.into()),
            },
        }
    }

    async fn replace(&self, design: &Design, expected: &Revision) -> Result<(), StoreError> {
        let result = self
            .db
            .designs()
            .replace_one(revision_filter(&design.id, expected), design, None)
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::Conflict(format!(
                "Design {} was modified concurrently",
                design.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let result = self
            .db
            .designs()
            .delete_one(doc! { "_id": id, "userId": user_id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<Design>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();

        let cursor = self
            .db
            .designs()
            .find(doc! { "userId": user_id }, options)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .client()
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::from(e)
            })?;
        Ok(())
    }
}
