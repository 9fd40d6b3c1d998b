//! The nine knowledge-graph tools exposed over MCP.
//!
//! Handlers parse the tool arguments, delegate to the graph manager, and
//! render results the way MCP clients expect: created/queried data as
//! pretty-printed JSON, deletions as a short confirmation. Validation
//! errors become `isError` tool results; everything else propagates to the
//! JSON-RPC layer.

use crate::db::Db;
use crate::error::{GraphmemError, Result};
use crate::graph::store::StorageAdapter;
use crate::graph::types::{Entity, ObservationAddition, ObservationDeletion, Relation};
use crate::graph::KnowledgeGraphManager;
use crate::mcp::audit::log_operation;
use crate::mcp::types::{Tool, ToolsCallResult};
use serde::Deserialize;
use serde_json::{json, Value};

/// Get all tool definitions for tools/list
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "create_entities".to_string(),
            description: "Create multiple new entities in the knowledge graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entities": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string", "description": "The name of the entity" },
                                "entityType": { "type": "string", "description": "The type of the entity" },
                                "observations": {
                                    "type": "array",
                                    "items": { "type": "string" },
                                    "description": "An array of observation contents associated with the entity"
                                }
                            },
                            "required": ["name", "entityType", "observations"]
                        }
                    }
                },
                "required": ["entities"]
            }),
        },
        Tool {
            name: "create_relations".to_string(),
            description: "Create multiple new relations between entities in the knowledge graph. Relations should be in active voice".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "from": { "type": "string", "description": "The name of the entity where the relation starts" },
                                "to": { "type": "string", "description": "The name of the entity where the relation ends" },
                                "relationType": { "type": "string", "description": "The type of the relation" }
                            },
                            "required": ["from", "to", "relationType"]
                        }
                    }
                },
                "required": ["relations"]
            }),
        },
        Tool {
            name: "add_observations".to_string(),
            description: "Add new observations to existing entities in the knowledge graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "observations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "entityName": { "type": "string", "description": "The name of the entity to add the observations to" },
                                "contents": {
                                    "type": "array",
                                    "items": { "type": "string" },
                                    "description": "An array of observation contents to add"
                                }
                            },
                            "required": ["entityName", "contents"]
                        }
                    }
                },
                "required": ["observations"]
            }),
        },
        Tool {
            name: "delete_entities".to_string(),
            description: "Delete multiple entities and their associated relations from the knowledge graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entityNames": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "An array of entity names to delete"
                    }
                },
                "required": ["entityNames"]
            }),
        },
        Tool {
            name: "delete_observations".to_string(),
            description: "Delete specific observations from entities in the knowledge graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "deletions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "entityName": { "type": "string", "description": "The name of the entity containing the observations" },
                                "observations": {
                                    "type": "array",
                                    "items": { "type": "string" },
                                    "description": "An array of observations to delete"
                                }
                            },
                            "required": ["entityName", "observations"]
                        }
                    }
                },
                "required": ["deletions"]
            }),
        },
        Tool {
            name: "delete_relations".to_string(),
            description: "Delete multiple relations from the knowledge graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "from": { "type": "string", "description": "The name of the entity where the relation starts" },
                                "to": { "type": "string", "description": "The name of the entity where the relation ends" },
                                "relationType": { "type": "string", "description": "The type of the relation" }
                            },
                            "required": ["from", "to", "relationType"]
                        },
                        "description": "An array of relations to delete"
                    }
                },
                "required": ["relations"]
            }),
        },
        Tool {
            name: "read_graph".to_string(),
            description: "Read the entire knowledge graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "search_nodes".to_string(),
            description: "Search for nodes in the knowledge graph based on a query".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query to match against entity names, types, and observation content" }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "open_nodes".to_string(),
            description: "Open specific nodes in the knowledge graph by their names".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "names": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "An array of entity names to retrieve"
                    }
                },
                "required": ["names"]
            }),
        },
    ]
}

fn parse_params<'a, T: Deserialize<'a>>(arguments: &'a Value) -> Result<T> {
    T::deserialize(arguments)
        .map_err(|e| GraphmemError::McpProtocol(format!("Invalid tool arguments: {e}")))
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<ToolsCallResult> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| GraphmemError::McpProtocol(format!("JSON serialization error: {e}")))?;
    Ok(ToolsCallResult::text(text))
}

/// Record a mutation in the audit table. Audit failures are logged, never
/// surfaced to the caller.
async fn audit(db: &Db, operation: &str, requested: usize, applied: usize, error: Option<&str>) {
    if let Err(e) = log_operation(db, operation, requested, applied, error).await {
        log::warn!("audit log failed for {operation}: {e}");
    }
}

#[derive(Debug, Deserialize)]
struct CreateEntitiesParams {
    entities: Vec<Entity>,
}

pub async fn handle_create_entities<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    db: &Db,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: CreateEntitiesParams = parse_params(arguments)?;
    let requested = params.entities.len();
    match manager.create_entities(params.entities).await {
        Ok(created) => {
            audit(db, "create_entities", requested, created.len(), None).await;
            json_result(&created)
        }
        Err(GraphmemError::InvalidInput(msg)) => {
            audit(db, "create_entities", requested, 0, Some(&msg)).await;
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct CreateRelationsParams {
    relations: Vec<Relation>,
}

pub async fn handle_create_relations<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    db: &Db,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: CreateRelationsParams = parse_params(arguments)?;
    let requested = params.relations.len();
    match manager.create_relations(params.relations).await {
        Ok(created) => {
            audit(db, "create_relations", requested, created.len(), None).await;
            json_result(&created)
        }
        Err(GraphmemError::InvalidInput(msg)) => {
            audit(db, "create_relations", requested, 0, Some(&msg)).await;
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct AddObservationsParams {
    observations: Vec<ObservationAddition>,
}

pub async fn handle_add_observations<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    db: &Db,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: AddObservationsParams = parse_params(arguments)?;
    let requested = params.observations.len();
    match manager.add_observations(params.observations).await {
        Ok(results) => {
            let applied = results
                .iter()
                .filter(|r| !r.added_observations.is_empty())
                .count();
            audit(db, "add_observations", requested, applied, None).await;
            json_result(&results)
        }
        Err(GraphmemError::InvalidInput(msg)) => {
            audit(db, "add_observations", requested, 0, Some(&msg)).await;
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteEntitiesParams {
    #[serde(rename = "entityNames")]
    entity_names: Vec<String>,
}

pub async fn handle_delete_entities<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    db: &Db,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: DeleteEntitiesParams = parse_params(arguments)?;
    let requested = params.entity_names.len();
    match manager.delete_entities(params.entity_names).await {
        Ok(deleted) => {
            audit(db, "delete_entities", requested, deleted.len(), None).await;
            Ok(ToolsCallResult::text("Entities deleted successfully"))
        }
        Err(GraphmemError::InvalidInput(msg)) => {
            audit(db, "delete_entities", requested, 0, Some(&msg)).await;
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteObservationsParams {
    deletions: Vec<ObservationDeletion>,
}

pub async fn handle_delete_observations<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    db: &Db,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: DeleteObservationsParams = parse_params(arguments)?;
    let requested = params.deletions.len();
    match manager.delete_observations(params.deletions).await {
        Ok(results) => {
            let applied = results
                .iter()
                .filter(|r| !r.deleted_observations.is_empty())
                .count();
            audit(db, "delete_observations", requested, applied, None).await;
            Ok(ToolsCallResult::text("Observations deleted successfully"))
        }
        Err(GraphmemError::InvalidInput(msg)) => {
            audit(db, "delete_observations", requested, 0, Some(&msg)).await;
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteRelationsParams {
    relations: Vec<Relation>,
}

pub async fn handle_delete_relations<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    db: &Db,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: DeleteRelationsParams = parse_params(arguments)?;
    let requested = params.relations.len();
    match manager.delete_relations(params.relations).await {
        Ok(deleted) => {
            audit(db, "delete_relations", requested, deleted.len(), None).await;
            Ok(ToolsCallResult::text("Relations deleted successfully"))
        }
        Err(GraphmemError::InvalidInput(msg)) => {
            audit(db, "delete_relations", requested, 0, Some(&msg)).await;
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

pub async fn handle_read_graph<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
) -> Result<ToolsCallResult> {
    let graph = manager.read_graph().await?;
    json_result(&graph)
}

#[derive(Debug, Deserialize)]
struct SearchNodesParams {
    query: String,
}

pub async fn handle_search_nodes<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: SearchNodesParams = parse_params(arguments)?;
    match manager.search_nodes(&params.query).await {
        Ok(graph) => json_result(&graph),
        Err(GraphmemError::InvalidInput(msg)) => {
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct OpenNodesParams {
    names: Vec<String>,
}

pub async fn handle_open_nodes<S: StorageAdapter>(
    manager: &KnowledgeGraphManager<S>,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let params: OpenNodesParams = parse_params(arguments)?;
    match manager.open_nodes(params.names).await {
        Ok(graph) => json_result(&graph),
        Err(GraphmemError::InvalidInput(msg)) => {
            Ok(ToolsCallResult::error(format!("Invalid input: {msg}")))
        }
        Err(e) => Err(e),
    }
}
