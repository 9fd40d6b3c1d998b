//! Versioned schema migrations, embedded in the binary and tracked in a
//! `schema_migrations` table so each one is applied exactly once.

use crate::error::{GraphmemError, Result};
use rusqlite::{params, Connection};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_graph_tables",
        sql: "CREATE TABLE IF NOT EXISTS entities (
                  name TEXT PRIMARY KEY,
                  entity_type TEXT NOT NULL,
                  observations TEXT NOT NULL DEFAULT '[]',
                  created_at TEXT NOT NULL,
                  updated_at TEXT NOT NULL
              );

              CREATE TABLE IF NOT EXISTS relations (
                  from_entity TEXT NOT NULL REFERENCES entities(name),
                  to_entity TEXT NOT NULL REFERENCES entities(name),
                  relation_type TEXT NOT NULL,
                  created_at TEXT NOT NULL,
                  PRIMARY KEY (from_entity, to_entity, relation_type)
              );

              CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_entity);
              CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_entity);
              CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);",
    },
    Migration {
        version: 2,
        name: "002_operations_audit",
        sql: "CREATE TABLE IF NOT EXISTS graph_operations (
                  operation_id TEXT PRIMARY KEY,
                  timestamp TEXT NOT NULL,
                  operation TEXT NOT NULL,
                  requested INTEGER NOT NULL,
                  applied INTEGER NOT NULL,
                  error_message TEXT
              );

              CREATE INDEX IF NOT EXISTS idx_operations_timestamp
                  ON graph_operations(timestamp);",
    },
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(GraphmemError::Database)?;
    Ok(names)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!(
            "Applying migration: {} (version {})",
            migration.name,
            migration.version
        );

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    Ok(())
}
