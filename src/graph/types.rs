//! Data model for the knowledge graph: entities, typed relations, and the
//! observation batch shapes used by the mutation operations.
//!
//! Field names serialize in camelCase (`entityType`, `relationType`, ...) to
//! match the tool surface consumed by MCP clients.

use serde::{Deserialize, Serialize};

use crate::error::{GraphmemError, Result};

/// A named node in the graph with a free-form type label and a deduplicated,
/// insertion-ordered observation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

/// A directed, typed edge between two entities. The `(from, to, relationType)`
/// triple is the identity; it is never stored twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

/// Full graph snapshot: entity list plus relation list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// Request to add observation contents to one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationAddition {
    pub entity_name: String,
    pub contents: Vec<String>,
}

/// Request to delete specific observations from one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDeletion {
    pub entity_name: String,
    pub observations: Vec<String>,
}

/// Per-entity outcome of `addObservations`: the contents that were actually
/// new. Empty when the entity was missing or everything was a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsAdded {
    pub entity_name: String,
    pub added_observations: Vec<String>,
}

/// Per-entity outcome of `deleteObservations`: the observations that were
/// actually present and removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsDeleted {
    pub entity_name: String,
    pub deleted_observations: Vec<String>,
}

impl KnowledgeGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

impl Entity {
    /// Validate the input shape. Observations must each be non-empty; the
    /// list itself may be empty.
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.name, "Entity name cannot be empty")?;
        require_non_empty(&self.entity_type, "Entity type cannot be empty")?;
        for obs in &self.observations {
            require_non_empty(obs, "Observation content cannot be empty")?;
        }
        Ok(())
    }

    /// Copy of this entity with duplicate observations dropped, first
    /// occurrence wins. Stored entities never carry duplicates.
    pub fn deduplicated(&self) -> Entity {
        let mut seen = std::collections::HashSet::new();
        let observations = self
            .observations
            .iter()
            .filter(|o| seen.insert(o.as_str().to_owned()))
            .cloned()
            .collect();
        Entity {
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            observations,
        }
    }
}

impl Relation {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.from, "Relation 'from' field cannot be empty")?;
        require_non_empty(&self.to, "Relation 'to' field cannot be empty")?;
        require_non_empty(&self.relation_type, "Relation type cannot be empty")?;
        Ok(())
    }
}

impl ObservationAddition {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.entity_name, "Entity name cannot be empty")?;
        for content in &self.contents {
            require_non_empty(content, "Observation content cannot be empty")?;
        }
        Ok(())
    }
}

impl ObservationDeletion {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.entity_name, "Entity name cannot be empty")?;
        for obs in &self.observations {
            require_non_empty(obs, "Observation content cannot be empty")?;
        }
        Ok(())
    }
}

/// Validate a search query: must contain at least one non-whitespace char.
pub fn validate_query(query: &str) -> Result<()> {
    require_non_empty(query, "Search query cannot be empty")
}

/// Validate an entity-name list for deletion: the list may be empty, each
/// name may not.
pub fn validate_entity_names(names: &[String]) -> Result<()> {
    for name in names {
        require_non_empty(name, "Entity name cannot be empty")?;
    }
    Ok(())
}

/// Validate a node-name list: non-empty, and each name non-empty.
pub fn validate_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(GraphmemError::InvalidInput(
            "Node names cannot be empty".to_string(),
        ));
    }
    for name in names {
        require_non_empty(name, "Node name cannot be empty")?;
    }
    Ok(())
}

fn require_non_empty(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphmemError::InvalidInput(message.to_string()));
    }
    Ok(())
}
