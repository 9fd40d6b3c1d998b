//! Storage adapter contract required by the graph repositories.
//!
//! The manager and repositories never talk to a database directly; they go
//! through this capability trait. Backend choice is a configuration-time
//! binding — the shipped implementation is [`crate::db::SqliteAdapter`].

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::types::{Entity, Relation};

/// Durable keyed storage for entity records and directed labeled edges.
///
/// Every method is a potential suspension point; implementations must not
/// require callers to hold locks across calls. Each call is atomic with
/// respect to the underlying engine, and no cross-call transaction is
/// provided.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Exact-key lookup by entity name.
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>>;

    /// Batch lookup; names with no match are silently omitted.
    async fn get_entities(&self, names: &[String]) -> Result<Vec<Entity>>;

    /// Insert or fully replace the record under `entity.name`.
    async fn put_entity(&self, entity: &Entity) -> Result<()>;

    /// Remove the named entity. Returns whether a record was removed.
    async fn delete_entity(&self, name: &str) -> Result<bool>;

    /// Full scan of the entity collection.
    async fn scan_entities(&self) -> Result<Vec<Entity>>;

    /// Every entity whose name, type, or any observation contains `query`
    /// as a literal substring. Broader engine-defined matching is allowed.
    async fn search_entities(&self, query: &str) -> Result<Vec<Entity>>;

    /// Insert an edge. The triple is expected to be absent; a constraint
    /// violation on a duplicate is surfaced as a storage error.
    async fn put_relation(&self, relation: &Relation) -> Result<()>;

    /// Exact triple-key lookup.
    async fn relation_exists(&self, relation: &Relation) -> Result<bool>;

    /// Exact triple-key removal. Returns whether an edge was removed.
    async fn delete_relation(&self, relation: &Relation) -> Result<bool>;

    /// Remove every edge where `name` appears as either endpoint, returning
    /// the number removed. Zero matches is not an error.
    async fn delete_relations_of(&self, name: &str) -> Result<usize>;

    /// Full scan of the relation collection.
    async fn scan_relations(&self) -> Result<Vec<Relation>>;

    /// Every edge whose `from` AND `to` are both members of `names`
    /// (induced subgraph; edges with one endpoint outside are excluded).
    async fn scan_relations_within(&self, names: &[String]) -> Result<Vec<Relation>>;
}
