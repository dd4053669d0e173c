use super::store::{DesignStore, StoreError};
use crate::models::{Design, Revision};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store for tests and single-node development.
#[derive(Default)]
pub struct InMemoryDesignStore {
    designs: Mutex<HashMap<String, Design>>,
}

impl InMemoryDesignStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Design>>, StoreError> {
        self.designs
            .lock()
            .map_err(|e| StoreError::Database(anyhow::anyhow!("Design store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl DesignStore for InMemoryDesignStore {
    async fn get(&self, id: &str) -> Result<Option<Design>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn create(&self, design: &Design) -> Result<(), StoreError> {
        let mut designs = self.lock()?;
        if designs.contains_key(&design.id) {
            return Err(StoreError::Conflict(format!(
                "Design {} already exists",
                design.id
            )));
        }
        designs.insert(design.id.clone(), design.clone());
        Ok(())
    }

    async fn replace(&self, design: &Design, expected: &Revision) -> Result<(), StoreError> {
        let mut designs = self.lock()?;
        match designs.get_mut(&design.id) {
            Some(current) if current.revision() == *expected => {
                *current = design.clone();
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!(
                "Design {} was modified concurrently",
                design.id
            ))),
        }
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut designs = self.lock()?;
        let owned = designs.get(id).is_some_and(|d| d.user_id == user_id);
        if owned {
            designs.remove(id);
        }
        Ok(owned)
    }

    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<Design>, StoreError> {
        let mut owned: Vec<Design> = self
            .lock()?
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryDesignStore::new();
        let design = Design::new("u1".to_string(), Map::new());

        store.create(&design).await.unwrap();

        assert_eq!(store.get(&design.id).await.unwrap(), Some(design));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let store = InMemoryDesignStore::new();
        let design = Design::new("u1".to_string(), Map::new());

        store.create(&design).await.unwrap();
        assert!(matches!(
            store.create(&design).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_replace_conflicts() {
        let store = InMemoryDesignStore::new();
        let design = Design::new("u1".to_string(), Map::new());
        store.create(&design).await.unwrap();

        let base = design.revision();
        let mut first = design.clone();
        first.merge(Map::new());
        store.replace(&first, &base).await.unwrap();

        // Second writer still holds the pre-update revision
        let mut second = design.clone();
        second.updated_at = Some("2000-01-01T00:00:00.000Z".to_string());
        assert!(matches!(
            store.replace(&second, &base).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.get(&design.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_same_millisecond_writers_conflict() {
        let store = InMemoryDesignStore::new();
        let mut design = Design::new("u1".to_string(), Map::new());
        design.updated_at = Some("2999-01-01T00:00:00.000Z".to_string());
        store.create(&design).await.unwrap();

        // Both writers read the same revision and stamp at the same instant
        let base = design.revision();
        let mut first = design.clone();
        first.merge(serde_json::from_value(serde_json::json!({ "version": 1 })).unwrap());
        let mut second = design.clone();
        second.merge(serde_json::from_value(serde_json::json!({ "version": 2 })).unwrap());
        assert_eq!(first.updated_at, second.updated_at);

        store.replace(&first, &base).await.unwrap();
        assert!(matches!(
            store.replace(&second, &base).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.get(&design.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let store = InMemoryDesignStore::new();
        let design = Design::new("u1".to_string(), Map::new());
        store.create(&design).await.unwrap();

        assert!(!store.delete(&design.id, "u2").await.unwrap());
        assert!(store.get(&design.id).await.unwrap().is_some());

        assert!(store.delete(&design.id, "u1").await.unwrap());
        assert!(store.get(&design.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_owner_filters() {
        let store = InMemoryDesignStore::new();
        for owner in ["u1", "u2", "u1"] {
            store
                .create(&Design::new(owner.to_string(), Map::new()))
                .await
                .unwrap();
        }

        let mine = store.find_by_owner("u1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|d| d.user_id == "u1"));
        assert!(store.find_by_owner("nobody").await.unwrap().is_empty());
    }
}
