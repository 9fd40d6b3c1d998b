//! The knowledge graph manager: the nine public operations.
//!
//! All cross-entity invariants live here — entity name uniqueness,
//! referential integrity of edges, observation deduplication, relation
//! triple uniqueness, and cascade deletion. The repositories perform raw
//! storage operations and are never called from outside this module.
//!
//! Create operations are idempotent by construction (pre-check + skip) so
//! that repeated tool invocations from an automated caller never produce
//! duplicate data or errors; delete operations are idempotent by tolerating
//! already-gone inputs. Batch inputs are processed item-by-item: a failure
//! on one item is recorded in the batch report and never aborts siblings.

use std::sync::Arc;

use crate::error::Result;
use crate::graph::batch::{BatchReport, Outcome};
use crate::graph::entity_repo::EntityRepo;
use crate::graph::relation_repo::RelationRepo;
use crate::graph::store::StorageAdapter;
use crate::graph::types::{
    validate_entity_names, validate_names, validate_query, Entity, KnowledgeGraph,
    ObservationAddition, ObservationDeletion, ObservationsAdded, ObservationsDeleted, Relation,
};

pub struct KnowledgeGraphManager<S> {
    entities: EntityRepo<S>,
    relations: RelationRepo<S>,
}

impl<S: StorageAdapter> KnowledgeGraphManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            entities: EntityRepo::new(Arc::clone(&store)),
            relations: RelationRepo::new(store),
        }
    }

    /// Create entities that do not exist yet. An entity whose name is
    /// already taken is skipped — not an error, not an overwrite. Returns
    /// the entities actually created.
    pub async fn create_entities(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        for entity in &entities {
            entity.validate()?;
        }

        let mut report = BatchReport::new();
        for entity in entities {
            let result = self.create_entity(&entity).await;
            report.record("create_entities", entity, result);
        }
        log_counts("create_entities", &report);
        Ok(report.applied())
    }

    async fn create_entity(&self, entity: &Entity) -> Result<Outcome<Entity>> {
        if self.entities.find_by_name(&entity.name).await?.is_some() {
            return Ok(Outcome::Skipped);
        }
        let created = self.entities.create(&entity.deduplicated()).await?;
        Ok(Outcome::Applied(created))
    }

    /// Create relations between existing entities. A missing endpoint is a
    /// per-item failure; an already-present triple is skipped. Returns the
    /// relations actually created.
    pub async fn create_relations(&self, relations: Vec<Relation>) -> Result<Vec<Relation>> {
        for relation in &relations {
            relation.validate()?;
        }

        let mut report = BatchReport::new();
        for relation in relations {
            let result = self.create_relation(&relation).await;
            report.record("create_relations", relation, result);
        }
        log_counts("create_relations", &report);
        Ok(report.applied())
    }

    async fn create_relation(&self, relation: &Relation) -> Result<Outcome<Relation>> {
        self.relations.resolve_endpoints(relation).await?;
        if self.relations.exists(relation).await? {
            return Ok(Outcome::Skipped);
        }
        let created = self.relations.create(relation).await?;
        Ok(Outcome::Applied(created))
    }

    /// Add observation contents to existing entities. Returns one result per
    /// input item listing the contents that were actually new; the list is
    /// empty when the entity is missing or every content was a duplicate.
    pub async fn add_observations(
        &self,
        additions: Vec<ObservationAddition>,
    ) -> Result<Vec<ObservationsAdded>> {
        for addition in &additions {
            addition.validate()?;
        }

        let mut report = BatchReport::new();
        for addition in additions {
            let result = self.add_observation_contents(&addition).await;
            report.record("add_observations", addition, result);
        }
        log_counts("add_observations", &report);

        Ok(report
            .items
            .into_iter()
            .map(|item| match item.outcome {
                Outcome::Applied(added) => added,
                _ => ObservationsAdded {
                    entity_name: item.input.entity_name,
                    added_observations: Vec::new(),
                },
            })
            .collect())
    }

    async fn add_observation_contents(
        &self,
        addition: &ObservationAddition,
    ) -> Result<Outcome<ObservationsAdded>> {
        let Some(entity) = self.entities.find_by_name(&addition.entity_name).await? else {
            return Ok(Outcome::Failed(format!(
                "Entity not found: {}",
                addition.entity_name
            )));
        };

        // Set difference against the stored list, preserving input order and
        // collapsing duplicates within the input itself.
        let mut seen: std::collections::HashSet<&str> =
            entity.observations.iter().map(String::as_str).collect();
        let mut added = Vec::new();
        for content in &addition.contents {
            if seen.insert(content.as_str()) {
                added.push(content.clone());
            }
        }

        if !added.is_empty() {
            let mut observations = entity.observations;
            observations.extend(added.iter().cloned());
            if self
                .entities
                .update_observations(&addition.entity_name, observations)
                .await?
                .is_none()
            {
                // Entity vanished between the read and the write.
                return Ok(Outcome::Failed(format!(
                    "Entity not found: {}",
                    addition.entity_name
                )));
            }
        }

        Ok(Outcome::Applied(ObservationsAdded {
            entity_name: addition.entity_name.clone(),
            added_observations: added,
        }))
    }

    /// Delete specific observations from entities. A missing entity or
    /// absent observation is skipped. Returns one result per input item
    /// listing the observations actually removed.
    pub async fn delete_observations(
        &self,
        deletions: Vec<ObservationDeletion>,
    ) -> Result<Vec<ObservationsDeleted>> {
        for deletion in &deletions {
            deletion.validate()?;
        }

        let mut report = BatchReport::new();
        for deletion in deletions {
            let result = self.delete_observation_contents(&deletion).await;
            report.record("delete_observations", deletion, result);
        }
        log_counts("delete_observations", &report);

        Ok(report
            .items
            .into_iter()
            .map(|item| match item.outcome {
                Outcome::Applied(deleted) => deleted,
                _ => ObservationsDeleted {
                    entity_name: item.input.entity_name,
                    deleted_observations: Vec::new(),
                },
            })
            .collect())
    }

    async fn delete_observation_contents(
        &self,
        deletion: &ObservationDeletion,
    ) -> Result<Outcome<ObservationsDeleted>> {
        let Some(entity) = self.entities.find_by_name(&deletion.entity_name).await? else {
            return Ok(Outcome::Skipped);
        };

        let deleted: Vec<String> = deletion
            .observations
            .iter()
            .filter(|obs| entity.observations.contains(*obs))
            .cloned()
            .collect();
        if deleted.is_empty() {
            return Ok(Outcome::Skipped);
        }

        let remaining: Vec<String> = entity
            .observations
            .into_iter()
            .filter(|obs| !deletion.observations.contains(obs))
            .collect();
        if self
            .entities
            .update_observations(&deletion.entity_name, remaining)
            .await?
            .is_none()
        {
            return Ok(Outcome::Failed(format!(
                "Entity not found: {}",
                deletion.entity_name
            )));
        }

        Ok(Outcome::Applied(ObservationsDeleted {
            entity_name: deletion.entity_name.clone(),
            deleted_observations: deleted,
        }))
    }

    /// Delete entities by name, cascading to every relation that touches
    /// them. Missing names are skipped. Returns the names actually deleted.
    pub async fn delete_entities(&self, names: Vec<String>) -> Result<Vec<String>> {
        validate_entity_names(&names)?;

        let mut report = BatchReport::new();
        for name in names {
            let result = self.delete_entity(&name).await;
            report.record("delete_entities", name, result);
        }
        log_counts("delete_entities", &report);
        Ok(report.applied())
    }

    async fn delete_entity(&self, name: &str) -> Result<Outcome<String>> {
        if self.entities.find_by_name(name).await?.is_none() {
            return Ok(Outcome::Skipped);
        }
        // Cascade before the entity goes, so no dangling edge survives.
        let cascaded = self.relations.delete_by_entity(name).await?;
        if cascaded > 0 {
            log::debug!("delete_entities: cascaded {cascaded} relation(s) of {name}");
        }
        if !self.entities.delete(name).await? {
            return Ok(Outcome::Skipped);
        }
        Ok(Outcome::Applied(name.to_string()))
    }

    /// Delete relations by exact triple. Absent triples are skipped.
    /// Returns the relations actually deleted.
    pub async fn delete_relations(&self, relations: Vec<Relation>) -> Result<Vec<Relation>> {
        for relation in &relations {
            relation.validate()?;
        }

        let mut report = BatchReport::new();
        for relation in relations {
            let result = self.delete_relation(&relation).await;
            report.record("delete_relations", relation, result);
        }
        log_counts("delete_relations", &report);
        Ok(report.applied())
    }

    async fn delete_relation(&self, relation: &Relation) -> Result<Outcome<Relation>> {
        if !self.relations.delete(relation).await? {
            return Ok(Outcome::Skipped);
        }
        Ok(Outcome::Applied(relation.clone()))
    }

    /// Full graph snapshot.
    pub async fn read_graph(&self) -> Result<KnowledgeGraph> {
        let entities = self.entities.find_all().await?;
        let relations = self.relations.find_all().await?;
        Ok(KnowledgeGraph {
            entities,
            relations,
        })
    }

    /// Substring search over entity names, types, and observations, plus the
    /// relations strictly between the matched entities.
    pub async fn search_nodes(&self, query: &str) -> Result<KnowledgeGraph> {
        validate_query(query)?;

        let entities = self.entities.search(query).await?;
        self.neighborhood(entities).await
    }

    /// Look up specific entities by name (missing names silently dropped),
    /// plus the relations strictly between them.
    pub async fn open_nodes(&self, names: Vec<String>) -> Result<KnowledgeGraph> {
        validate_names(&names)?;

        let entities = self.entities.find_by_names(&names).await?;
        self.neighborhood(entities).await
    }

    /// Shared tail of `search_nodes`/`open_nodes`: the induced subgraph over
    /// the given entities, so no returned relation references an entity
    /// absent from the result.
    async fn neighborhood(&self, entities: Vec<Entity>) -> Result<KnowledgeGraph> {
        if entities.is_empty() {
            return Ok(KnowledgeGraph::empty());
        }
        let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        let relations = self.relations.find_by_entities(&names).await?;
        Ok(KnowledgeGraph {
            entities,
            relations,
        })
    }
}

fn log_counts<I, T>(operation: &str, report: &BatchReport<I, T>) {
    let (applied, skipped, failed) = report.counts();
    log::debug!("{operation}: applied={applied} skipped={skipped} failed={failed}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, SqliteAdapter};
    use crate::error::GraphmemError;
    use tempfile::TempDir;

    async fn manager() -> (KnowledgeGraphManager<SqliteAdapter>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(crate::db::migrate::run_migrations)
            .await
            .unwrap();
        (
            KnowledgeGraphManager::new(Arc::new(SqliteAdapter::new(db))),
            temp_dir,
        )
    }

    fn person(name: &str, observations: &[&str]) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: "person".to_string(),
            observations: observations.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn relation(from: &str, to: &str, relation_type: &str) -> Relation {
        Relation {
            from: from.to_string(),
            to: to.to_string(),
            relation_type: relation_type.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_entities_is_idempotent() {
        let (manager, _tmp) = manager().await;

        let first = manager
            .create_entities(vec![person("Alice", &["likes tea"])])
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // Second create with different content: no-op, no overwrite.
        let second = manager
            .create_entities(vec![person("Alice", &["likes coffee"])])
            .await
            .unwrap();
        assert!(second.is_empty());

        let graph = manager.read_graph().await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].observations, vec!["likes tea"]);
    }

    #[tokio::test]
    async fn test_create_entities_dedups_input_observations() {
        let (manager, _tmp) = manager().await;
        let created = manager
            .create_entities(vec![person("Alice", &["x", "x", "y"])])
            .await
            .unwrap();
        assert_eq!(created[0].observations, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_create_entities_duplicate_within_batch() {
        let (manager, _tmp) = manager().await;
        let created = manager
            .create_entities(vec![person("Alice", &["a"]), person("Alice", &["b"])])
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].observations, vec!["a"]);
    }

    #[tokio::test]
    async fn test_validation_error_aborts_whole_call() {
        let (manager, _tmp) = manager().await;
        let err = manager
            .create_entities(vec![person("Alice", &["ok"]), person("", &["bad"])])
            .await
            .unwrap_err();
        assert!(matches!(err, GraphmemError::InvalidInput(_)));

        // Batch was not attempted: nothing stored, not even the valid item.
        let graph = manager.read_graph().await.unwrap();
        assert!(graph.entities.is_empty());
    }

    #[tokio::test]
    async fn test_create_relations_unique_and_missing_endpoint() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &[]), person("Bob", &[])])
            .await
            .unwrap();

        let first = manager
            .create_relations(vec![
                relation("Alice", "Bob", "knows"),
                relation("Alice", "Ghost", "knows"),
            ])
            .await
            .unwrap();
        // Missing endpoint is a per-item failure; the valid sibling applies.
        assert_eq!(first, vec![relation("Alice", "Bob", "knows")]);

        // Identical triple a second time: skipped.
        let second = manager
            .create_relations(vec![relation("Alice", "Bob", "knows")])
            .await
            .unwrap();
        assert!(second.is_empty());

        // Same pair, different type: a distinct relation.
        let third = manager
            .create_relations(vec![relation("Alice", "Bob", "manages")])
            .await
            .unwrap();
        assert_eq!(third.len(), 1);

        let graph = manager.read_graph().await.unwrap();
        assert_eq!(graph.relations.len(), 2);
    }

    #[tokio::test]
    async fn test_add_observations_dedups_preserving_order() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &["x"])])
            .await
            .unwrap();

        let results = manager
            .add_observations(vec![ObservationAddition {
                entity_name: "Alice".to_string(),
                contents: vec!["x".to_string(), "x".to_string(), "y".to_string()],
            }])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].added_observations, vec!["y"]);

        let graph = manager.read_graph().await.unwrap();
        assert_eq!(graph.entities[0].observations, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_add_observations_missing_entity_is_empty_result() {
        let (manager, _tmp) = manager().await;
        let results = manager
            .add_observations(vec![ObservationAddition {
                entity_name: "Ghost".to_string(),
                contents: vec!["x".to_string()],
            }])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_name, "Ghost");
        assert!(results[0].added_observations.is_empty());
    }

    #[tokio::test]
    async fn test_delete_observations_reports_actual_deletions() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &["x", "y", "z"])])
            .await
            .unwrap();

        let results = manager
            .delete_observations(vec![
                ObservationDeletion {
                    entity_name: "Alice".to_string(),
                    observations: vec!["y".to_string(), "missing".to_string()],
                },
                ObservationDeletion {
                    entity_name: "Ghost".to_string(),
                    observations: vec!["x".to_string()],
                },
            ])
            .await
            .unwrap();

        assert_eq!(results[0].deleted_observations, vec!["y"]);
        assert!(results[1].deleted_observations.is_empty());

        let graph = manager.read_graph().await.unwrap();
        assert_eq!(graph.entities[0].observations, vec!["x", "z"]);
    }

    #[tokio::test]
    async fn test_delete_entities_cascades_relations() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &[]), person("Bob", &[])])
            .await
            .unwrap();
        manager
            .create_relations(vec![relation("Alice", "Bob", "knows")])
            .await
            .unwrap();

        let deleted = manager
            .delete_entities(vec!["Alice".to_string(), "Ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, vec!["Alice"]);

        // An empty deletion list is a benign no-op, not a validation error.
        assert!(manager.delete_entities(vec![]).await.unwrap().is_empty());

        let graph = manager.read_graph().await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].name, "Bob");
        assert!(graph.relations.is_empty());
    }

    #[tokio::test]
    async fn test_delete_relations_skips_absent() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &[]), person("Bob", &[])])
            .await
            .unwrap();
        manager
            .create_relations(vec![relation("Alice", "Bob", "knows")])
            .await
            .unwrap();

        let deleted = manager
            .delete_relations(vec![
                relation("Alice", "Bob", "knows"),
                relation("Bob", "Alice", "knows"),
            ])
            .await
            .unwrap();
        assert_eq!(deleted, vec![relation("Alice", "Bob", "knows")]);

        // Deleting again: benign no-op.
        let again = manager
            .delete_relations(vec![relation("Alice", "Bob", "knows")])
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_read_graph_round_trip() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![
                person("Alice", &[]),
                person("Bob", &[]),
                person("Carol", &[]),
            ])
            .await
            .unwrap();
        manager
            .create_relations(vec![
                relation("Alice", "Bob", "knows"),
                relation("Bob", "Carol", "knows"),
            ])
            .await
            .unwrap();
        manager
            .delete_entities(vec!["Carol".to_string()])
            .await
            .unwrap();

        let graph = manager.read_graph().await.unwrap();
        let names: Vec<&str> = graph.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(graph.relations, vec![relation("Alice", "Bob", "knows")]);
    }

    #[tokio::test]
    async fn test_search_nodes_induced_subgraph_scenario() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &[]), person("Bob", &[])])
            .await
            .unwrap();
        manager
            .create_relations(vec![relation("Alice", "Bob", "knows")])
            .await
            .unwrap();

        // Only Bob matches: the edge is excluded even though Bob is an
        // endpoint, because Alice is not in the result set.
        let graph = manager.search_nodes("Bob").await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].name, "Bob");
        assert!(graph.relations.is_empty());

        let graph = manager
            .open_nodes(vec!["Alice".to_string(), "Bob".to_string()])
            .await
            .unwrap();
        assert_eq!(graph.entities.len(), 2);
        assert_eq!(graph.relations, vec![relation("Alice", "Bob", "knows")]);
    }

    #[tokio::test]
    async fn test_search_nodes_no_match_is_empty_graph() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &[])])
            .await
            .unwrap();

        let graph = manager.search_nodes("zebra").await.unwrap();
        assert!(graph.is_empty());

        let err = manager.search_nodes("   ").await.unwrap_err();
        assert!(matches!(err, GraphmemError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_open_nodes_missing_names_silently_dropped() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![person("Alice", &[])])
            .await
            .unwrap();

        let graph = manager
            .open_nodes(vec!["Alice".to_string(), "Ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(graph.entities.len(), 1);

        let graph = manager.open_nodes(vec!["Ghost".to_string()]).await.unwrap();
        assert!(graph.is_empty());

        let err = manager.open_nodes(vec![]).await.unwrap_err();
        assert!(matches!(err, GraphmemError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_every_open_nodes_relation_has_both_endpoints_in_result() {
        let (manager, _tmp) = manager().await;
        manager
            .create_entities(vec![
                person("Alice", &[]),
                person("Bob", &[]),
                person("Carol", &[]),
            ])
            .await
            .unwrap();
        manager
            .create_relations(vec![
                relation("Alice", "Bob", "knows"),
                relation("Bob", "Carol", "knows"),
                relation("Carol", "Alice", "knows"),
            ])
            .await
            .unwrap();

        let graph = manager
            .open_nodes(vec!["Alice".to_string(), "Bob".to_string()])
            .await
            .unwrap();
        let names: std::collections::HashSet<&str> =
            graph.entities.iter().map(|e| e.name.as_str()).collect();
        for rel in &graph.relations {
            assert!(names.contains(rel.from.as_str()));
            assert!(names.contains(rel.to.as_str()));
        }
        assert_eq!(graph.relations, vec![relation("Alice", "Bob", "knows")]);
    }
}
