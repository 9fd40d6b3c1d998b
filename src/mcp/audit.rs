//! Mutation audit logging.
//!
//! Every mutating tool call is recorded in `graph_operations` with the
//! requested and applied item counts, so partial application is visible
//! after the fact.

use crate::db::Db;
use crate::error::Result;
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

/// Log a graph mutation to the audit table.
///
/// Returns the generated operation_id (UUID).
pub async fn log_operation(
    db: &Db,
    operation: &str,
    requested: usize,
    applied: usize,
    error_message: Option<&str>,
) -> Result<String> {
    let operation_id = Uuid::new_v4().to_string();
    let timestamp = Utc::now().to_rfc3339();

    let op = operation.to_string();
    let err = error_message.map(String::from);
    let op_id = operation_id.clone();

    db.with_connection(move |conn| {
        conn.execute(
            "INSERT INTO graph_operations ( \
                 operation_id, timestamp, operation, requested, applied, error_message \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![op_id, timestamp, op, requested as i64, applied as i64, err],
        )?;
        Ok::<(), crate::error::GraphmemError>(())
    })
    .await?;

    Ok(operation_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_operation_inserts_row() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(crate::db::migrate::run_migrations)
            .await
            .unwrap();

        let id = log_operation(&db, "create_entities", 3, 2, None)
            .await
            .unwrap();
        assert!(!id.is_empty());

        let (operation, requested, applied): (String, i64, i64) = db
            .with_connection(move |conn| {
                let row = conn.query_row(
                    "SELECT operation, requested, applied FROM graph_operations \
                     WHERE operation_id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
                Ok(row)
            })
            .await
            .unwrap();
        assert_eq!(operation, "create_entities");
        assert_eq!(requested, 3);
        assert_eq!(applied, 2);
    }
}
