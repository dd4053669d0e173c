use crate::models::Design;
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for design-service");

        // Serves the list-my-designs query, newest first
        let owner_index = IndexModel::builder()
            .keys(doc! { "userId": 1, "createdAt": -1 })
            .options(
                IndexOptions::builder()
                    .name("owner_created_lookup".to_string())
                    .build(),
            )
            .build();

        self.designs()
            .create_index(owner_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create owner index on designs collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on designs.(userId, createdAt)");

        Ok(())
    }

    pub fn designs(&self) -> Collection<Design> {
        self.db.collection("designs")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }
}
