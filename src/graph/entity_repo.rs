//! CRUD over entity records, built on the storage adapter.
//!
//! Repository calls are raw storage operations: no uniqueness pre-checks, no
//! observation deduplication. Those invariants belong to the manager, which
//! is the only caller.

use std::sync::Arc;

use crate::error::Result;
use crate::graph::store::StorageAdapter;
use crate::graph::types::Entity;

pub struct EntityRepo<S> {
    store: Arc<S>,
}

impl<S: StorageAdapter> EntityRepo<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Exact-key lookup.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Entity>> {
        self.store.get_entity(name).await
    }

    /// Batch lookup; names with no match are silently omitted.
    pub async fn find_by_names(&self, names: &[String]) -> Result<Vec<Entity>> {
        self.store.get_entities(names).await
    }

    /// Unconditional insert. The caller has already checked that `name` is
    /// unused.
    pub async fn create(&self, entity: &Entity) -> Result<Entity> {
        self.store.put_entity(entity).await?;
        Ok(entity.clone())
    }

    /// Full replace of the observation list. Returns `None` when the entity
    /// no longer exists (lost a race with a concurrent delete).
    pub async fn update_observations(
        &self,
        name: &str,
        observations: Vec<String>,
    ) -> Result<Option<Entity>> {
        let Some(mut entity) = self.store.get_entity(name).await? else {
            return Ok(None);
        };
        entity.observations = observations;
        self.store.put_entity(&entity).await?;
        Ok(Some(entity))
    }

    /// Remove the named entity; reports whether a record was removed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        self.store.delete_entity(name).await
    }

    /// Full scan, used by `readGraph`.
    pub async fn find_all(&self) -> Result<Vec<Entity>> {
        self.store.scan_entities().await
    }

    /// Substring search across name, type, and observations.
    pub async fn search(&self, query: &str) -> Result<Vec<Entity>> {
        self.store.search_entities(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, SqliteAdapter};
    use tempfile::TempDir;

    async fn repo() -> (EntityRepo<SqliteAdapter>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(crate::db::migrate::run_migrations)
            .await
            .unwrap();
        (EntityRepo::new(Arc::new(SqliteAdapter::new(db))), temp_dir)
    }

    fn alice() -> Entity {
        Entity {
            name: "Alice".to_string(),
            entity_type: "person".to_string(),
            observations: vec!["speaks French".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_name() {
        let (repo, _tmp) = repo().await;
        repo.create(&alice()).await.unwrap();

        let found = repo.find_by_name("Alice").await.unwrap().unwrap();
        assert_eq!(found, alice());
        assert!(repo.find_by_name("Bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_names_omits_missing() {
        let (repo, _tmp) = repo().await;
        repo.create(&alice()).await.unwrap();

        let found = repo
            .find_by_names(&["Alice".to_string(), "Ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Alice");
    }

    #[tokio::test]
    async fn test_update_observations_replaces_list() {
        let (repo, _tmp) = repo().await;
        repo.create(&alice()).await.unwrap();

        let updated = repo
            .update_observations("Alice", vec!["moved to Lyon".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.observations, vec!["moved to Lyon"]);

        let reloaded = repo.find_by_name("Alice").await.unwrap().unwrap();
        assert_eq!(reloaded.observations, vec!["moved to Lyon"]);
    }

    #[tokio::test]
    async fn test_update_observations_absent_entity() {
        let (repo, _tmp) = repo().await;
        let result = repo
            .update_observations("Ghost", vec!["x".to_string()])
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let (repo, _tmp) = repo().await;
        repo.create(&alice()).await.unwrap();
        assert!(repo.delete("Alice").await.unwrap());
        assert!(!repo.delete("Alice").await.unwrap());
        assert!(repo.find_by_name("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_matches_all_three_fields() {
        let (repo, _tmp) = repo().await;
        repo.create(&alice()).await.unwrap();
        repo.create(&Entity {
            name: "Bob".to_string(),
            entity_type: "organization".to_string(),
            observations: vec![],
        })
        .await
        .unwrap();

        // by name
        let hits = repo.search("Ali").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Alice");

        // by type
        let hits = repo.search("organiz").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Bob");

        // by observation content
        let hits = repo.search("French").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Alice");

        assert!(repo.search("nothing-here").await.unwrap().is_empty());
    }
}
