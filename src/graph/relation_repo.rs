//! CRUD over directed typed edges, built on the storage adapter.
//!
//! Edges reference entities by name and never duplicate entity data. Edge
//! creation resolves both endpoints first; a missing endpoint is a
//! `EntityNotFound` error which the manager records per-item rather than
//! letting it abort a batch.

use std::sync::Arc;

use crate::error::{GraphmemError, Result};
use crate::graph::store::StorageAdapter;
use crate::graph::types::{Entity, Relation};

pub struct RelationRepo<S> {
    store: Arc<S>,
}

impl<S: StorageAdapter> RelationRepo<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn resolve_endpoint(&self, name: &str) -> Result<Entity> {
        self.store
            .get_entity(name)
            .await?
            .ok_or_else(|| GraphmemError::EntityNotFound(name.to_string()))
    }

    /// Resolve both endpoint entities, failing on the first missing one.
    pub async fn resolve_endpoints(&self, relation: &Relation) -> Result<(Entity, Entity)> {
        let from = self.resolve_endpoint(&relation.from).await?;
        let to = self.resolve_endpoint(&relation.to).await?;
        Ok((from, to))
    }

    /// Insert the edge after resolving both endpoints. The caller has
    /// already checked that the triple is absent.
    pub async fn create(&self, relation: &Relation) -> Result<Relation> {
        self.resolve_endpoints(relation).await?;
        self.store.put_relation(relation).await?;
        Ok(relation.clone())
    }

    /// Exact triple-key lookup.
    pub async fn exists(&self, relation: &Relation) -> Result<bool> {
        self.store.relation_exists(relation).await
    }

    /// Exact triple-key removal; reports whether an edge was removed.
    pub async fn delete(&self, relation: &Relation) -> Result<bool> {
        self.store.delete_relation(relation).await
    }

    /// Cascade helper: remove every edge touching `name` as either endpoint.
    /// Absence of matching edges is not an error.
    pub async fn delete_by_entity(&self, name: &str) -> Result<usize> {
        self.store.delete_relations_of(name).await
    }

    pub async fn find_all(&self) -> Result<Vec<Relation>> {
        self.store.scan_relations().await
    }

    /// Induced subgraph: every stored edge whose `from` AND `to` are both in
    /// `names`.
    pub async fn find_by_entities(&self, names: &[String]) -> Result<Vec<Relation>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.store.scan_relations_within(names).await
    }
}
