use anyhow::Result;
use graphmem::db::{migrate, Db, SqliteAdapter};
use graphmem::mcp::{HttpMcpServer, McpServer};
use graphmem::{Config, KnowledgeGraphManager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level.
    // In MCP server mode all logging goes to stderr (per MCP spec).
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => {
            // MCP server mode (stdio transport)
            run_mcp_server().await?;
        }
        "serve-http" => {
            // HTTP server mode (for custom connectors)
            run_http_server().await?;
        }
        "verify" | _ => {
            // Default: verify database schema and report store health
            run_verification().await?;
        }
    }

    Ok(())
}

/// Open the database, run migrations, and build the MCP server.
fn setup_server(config: &Config) -> (Db, McpServer<SqliteAdapter>) {
    let db = Db::new(config.db_path());
    let store = Arc::new(SqliteAdapter::new(Db::new(config.db_path())));
    let server = McpServer::new(store, Db::new(config.db_path()), config.clone());
    (db, server)
}

/// Run MCP server (stdio transport)
async fn run_mcp_server() -> Result<()> {
    let config = Config::load()?;

    let (db, mut server) = setup_server(&config);
    db.with_connection(migrate::run_migrations).await?;

    server.run().await?;

    Ok(())
}

/// Run HTTP MCP server
async fn run_http_server() -> Result<()> {
    log::info!("Starting GraphMem HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    if !config.http_server.enabled {
        anyhow::bail!("http_server.enabled is false in config.toml");
    }

    let (db, server) = setup_server(&config);
    db.with_connection(migrate::run_migrations).await?;
    log::info!("Database initialized successfully");

    let http_server = HttpMcpServer::new(server)?;
    http_server.run(config.http_server.port).await?;

    Ok(())
}

/// Verify the database schema and report store health
async fn run_verification() -> Result<()> {
    log::info!("GraphMem v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;

    verify_database_schema(&db).await?;

    // Health check: the store must be readable end to end.
    let store = Arc::new(SqliteAdapter::new(Db::new(config.db_path())));
    let manager = KnowledgeGraphManager::new(store);
    let graph = manager.read_graph().await?;
    log::info!(
        "Store healthy: {} entities, {} relations",
        graph.entities.len(),
        graph.relations.len()
    );

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    use graphmem::GraphmemError;

    db.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["entities", "relations", "graph_operations", "schema_migrations"];
        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                return Err(GraphmemError::Config(format!("Missing table: {table}")));
            }
            log::debug!("Table exists: {table}");
        }

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < 2 {
            return Err(GraphmemError::Config(format!(
                "Expected at least 2 migrations, found {}",
                applied.len()
            )));
        }
        log::debug!("{} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(GraphmemError::Config(format!(
                "Journal mode is not WAL: {journal_mode}"
            )));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(GraphmemError::Config("Foreign keys not enabled".to_string()));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(GraphmemError::Config(format!(
                "Database integrity check failed: {integrity}"
            )));
        }
        log::info!("Database integrity: OK");

        Ok(())
    })
    .await?;

    log::info!("Database schema verification complete");
    Ok(())
}
