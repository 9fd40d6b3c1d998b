use anyhow::{Context, Result};
use clap::Parser;
use graphmem::db::{migrate, Db, SqliteAdapter};
use graphmem::graph::types::{Entity, Relation};
use graphmem::{Config, KnowledgeGraphManager};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Import a JSONL graph dump into the GraphMem database")]
struct Args {
    /// JSONL file: one {"type":"entity",...} or {"type":"relation",...} per line
    file: PathBuf,
}

/// One line of the JSONL dump.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Record {
    Entity(Entity),
    Relation(Relation),
}

fn parse_jsonl(content: &str) -> (Vec<Entity>, Vec<Relation>, usize) {
    let mut entities = Vec::new();
    let mut relations = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(Record::Entity(entity)) => entities.push(entity),
            Ok(Record::Relation(relation)) => relations.push(relation),
            Err(e) => {
                log::warn!("Skipping line {}: {e}", line_no + 1);
                skipped += 1;
            }
        }
    }

    (entities, relations, skipped)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;

    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let (entities, relations, skipped) = parse_jsonl(&content);
    log::info!(
        "Found {} entities and {} relations to import ({} malformed lines skipped)",
        entities.len(),
        relations.len(),
        skipped
    );

    let store = Arc::new(SqliteAdapter::new(Db::new(config.db_path())));
    let manager = KnowledgeGraphManager::new(store);

    // Entities first so relation endpoints resolve. Creates are idempotent,
    // so re-importing the same dump is safe.
    if !entities.is_empty() {
        let total = entities.len();
        let created = manager.create_entities(entities).await?;
        log::info!("Imported {} entities ({} already present)", created.len(), total - created.len());
    }

    if !relations.is_empty() {
        let total = relations.len();
        let created = manager.create_relations(relations).await?;
        log::info!("Imported {} relations ({} already present or unresolved)", created.len(), total - created.len());
    }

    log::info!("Import from {} completed", args.file.display());

    Ok(())
}
