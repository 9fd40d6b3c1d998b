//! SQLite implementation of the graph storage adapter.
//!
//! Entities live in one row each with the observation list as a JSON array
//! column; relations are one row per `(from, to, type)` triple. Substring
//! search uses `LIKE` with an escape character, matching observations
//! per-element through `json_each` so JSON escaping never affects matching.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::db::Db;
use crate::error::Result;
use crate::graph::store::StorageAdapter;
use crate::graph::types::{Entity, Relation};

pub struct SqliteAdapter {
    db: Db,
}

impl SqliteAdapter {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The underlying connection manager, for transport-side concerns
    /// (audit logging, schema verification) that sit outside the adapter
    /// contract.
    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let observations_json: String = row.get(2)?;
    let observations = serde_json::from_str(&observations_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Entity {
        name: row.get(0)?,
        entity_type: row.get(1)?,
        observations,
    })
}

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<Relation> {
    Ok(Relation {
        from: row.get(0)?,
        to: row.get(1)?,
        relation_type: row.get(2)?,
    })
}

/// Escape LIKE wildcards so the query matches literally.
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

#[async_trait]
impl StorageAdapter for SqliteAdapter {
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        let name = name.to_string();
        self.db
            .with_connection(move |conn| {
                let entity = conn
                    .query_row(
                        "SELECT name, entity_type, observations FROM entities WHERE name = ?1",
                        params![name],
                        entity_from_row,
                    )
                    .optional()?;
                Ok(entity)
            })
            .await
    }

    async fn get_entities(&self, names: &[String]) -> Result<Vec<Entity>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let names = names.to_vec();
        self.db
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT name, entity_type, observations FROM entities \
                     WHERE name IN ({}) ORDER BY name",
                    placeholders(names.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(names.iter()), entity_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        let name = entity.name.clone();
        let entity_type = entity.entity_type.clone();
        let observations = serde_json::to_string(&entity.observations)
            .map_err(|e| crate::error::GraphmemError::Config(format!("observation encoding: {e}")))?;
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO entities (name, entity_type, observations, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?4) \
                     ON CONFLICT(name) DO UPDATE SET \
                         entity_type = excluded.entity_type, \
                         observations = excluded.observations, \
                         updated_at = excluded.updated_at",
                    params![name, entity_type, observations, now],
                )?;
                Ok(())
            })
            .await
    }

    async fn delete_entity(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.db
            .with_connection(move |conn| {
                let removed = conn.execute("DELETE FROM entities WHERE name = ?1", params![name])?;
                Ok(removed > 0)
            })
            .await
    }

    async fn scan_entities(&self) -> Result<Vec<Entity>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name, entity_type, observations FROM entities ORDER BY name",
                )?;
                let rows = stmt.query_map([], entity_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn search_entities(&self, query: &str) -> Result<Vec<Entity>> {
        let pattern = format!("%{}%", escape_like(query));
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT name, entity_type, observations FROM entities \
                     WHERE name LIKE ?1 ESCAPE '\\' \
                        OR entity_type LIKE ?1 ESCAPE '\\' \
                        OR EXISTS (SELECT 1 FROM json_each(entities.observations) \
                                   WHERE json_each.value LIKE ?1 ESCAPE '\\') \
                     ORDER BY name",
                )?;
                let rows = stmt.query_map(params![pattern], entity_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn put_relation(&self, relation: &Relation) -> Result<()> {
        let relation = relation.clone();
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO relations (from_entity, to_entity, relation_type, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![relation.from, relation.to, relation.relation_type, now],
                )?;
                Ok(())
            })
            .await
    }

    async fn relation_exists(&self, relation: &Relation) -> Result<bool> {
        let relation = relation.clone();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT 1 FROM relations \
                     WHERE from_entity = ?1 AND to_entity = ?2 AND relation_type = ?3",
                )?;
                let exists =
                    stmt.exists(params![relation.from, relation.to, relation.relation_type])?;
                Ok(exists)
            })
            .await
    }

    async fn delete_relation(&self, relation: &Relation) -> Result<bool> {
        let relation = relation.clone();
        self.db
            .with_connection(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM relations \
                     WHERE from_entity = ?1 AND to_entity = ?2 AND relation_type = ?3",
                    params![relation.from, relation.to, relation.relation_type],
                )?;
                Ok(removed > 0)
            })
            .await
    }

    async fn delete_relations_of(&self, name: &str) -> Result<usize> {
        let name = name.to_string();
        self.db
            .with_connection(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM relations WHERE from_entity = ?1 OR to_entity = ?1",
                    params![name],
                )?;
                Ok(removed)
            })
            .await
    }

    async fn scan_relations(&self) -> Result<Vec<Relation>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT from_entity, to_entity, relation_type FROM relations \
                     ORDER BY from_entity, to_entity, relation_type",
                )?;
                let rows = stmt.query_map([], relation_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn scan_relations_within(&self, names: &[String]) -> Result<Vec<Relation>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let names = names.to_vec();
        self.db
            .with_connection(move |conn| {
                let ph = placeholders(names.len());
                let sql = format!(
                    "SELECT from_entity, to_entity, relation_type FROM relations \
                     WHERE from_entity IN ({ph}) AND to_entity IN ({ph}) \
                     ORDER BY from_entity, to_entity, relation_type"
                );
                let mut stmt = conn.prepare(&sql)?;
                let bound = names.iter().chain(names.iter());
                let rows = stmt.query_map(params_from_iter(bound), relation_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }
}
